//! Common utilities and types shared across the application.

pub mod error;
pub mod messages;
pub mod resources;
pub mod types;
