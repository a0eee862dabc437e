//! Record of users who already received the welcome notice.
//!
//! Stored as `{"discord": [...], "stoat": [...]}` and rewritten in full on
//! every insert.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::common::error::LedgerError;
use crate::common::types::Platform;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    discord: BTreeSet<String>,
    #[serde(default)]
    stoat: BTreeSet<String>,
}

impl LedgerFile {
    fn users(&self, platform: Platform) -> &BTreeSet<String> {
        match platform {
            Platform::Discord => &self.discord,
            Platform::Stoat => &self.stoat,
        }
    }

    fn users_mut(&mut self, platform: Platform) -> &mut BTreeSet<String> {
        match platform {
            Platform::Discord => &mut self.discord,
            Platform::Stoat => &mut self.stoat,
        }
    }
}

/// Persisted set of notified users per platform.
#[derive(Debug)]
pub struct NotificationLedger {
    path: PathBuf,
    state: Mutex<LedgerFile>,
}

impl NotificationLedger {
    /// Load the ledger from `path`.
    ///
    /// A missing file yields an empty ledger; an unreadable or corrupt one is
    /// logged and also treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<LedgerFile>(&data) {
                Ok(file) => {
                    debug!(
                        path = %path.display(),
                        discord = file.discord.len(),
                        stoat = file.stoat.len(),
                        "Notification ledger loaded"
                    );
                    file
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Notification ledger is corrupt, starting empty");
                    LedgerFile::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => LedgerFile::default(),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Notification ledger unreadable, starting empty");
                LedgerFile::default()
            }
        };

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    pub async fn has_notified(&self, platform: Platform, user_id: &str) -> bool {
        self.state.lock().await.users(platform).contains(user_id)
    }

    /// Record `user_id` as notified.
    ///
    /// Returns true only for the call that inserted the user. The file is
    /// rewritten while the ledger lock is held; a failed write is logged and
    /// the in-memory mark kept.
    pub async fn mark_notified(&self, platform: Platform, user_id: &str) -> bool {
        let mut state = self.state.lock().await;
        if !state.users_mut(platform).insert(user_id.to_string()) {
            return false;
        }

        if let Err(e) = persist(&self.path, &state) {
            warn!(platform = %platform, user_id, error = %e, "Failed to persist notification ledger");
        }
        true
    }
}

fn persist(path: &Path, file: &LedgerFile) -> Result<(), LedgerError> {
    let io_err = |source| LedgerError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let data = serde_json::to_string_pretty(file)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, data).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = NotificationLedger::load(dir.path().join("notified.json"));

        assert!(!ledger.has_notified(Platform::Discord, "1").await);
    }

    #[tokio::test]
    async fn test_mark_once_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notified.json");

        let ledger = NotificationLedger::load(&path);
        assert!(ledger.mark_notified(Platform::Stoat, "u1").await);
        assert!(!ledger.mark_notified(Platform::Stoat, "u1").await);
        assert!(!ledger.has_notified(Platform::Discord, "u1").await);

        let reloaded = NotificationLedger::load(&path);
        assert!(reloaded.has_notified(Platform::Stoat, "u1").await);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["stoat"], serde_json::json!(["u1"]));
        assert_eq!(raw["discord"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notified.json");
        std::fs::write(&path, "{not json").unwrap();

        let ledger = NotificationLedger::load(&path);
        assert!(ledger.mark_notified(Platform::Discord, "42").await);
        assert!(NotificationLedger::load(&path).has_notified(Platform::Discord, "42").await);
    }

    #[tokio::test]
    async fn test_reads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notified.json");
        std::fs::write(&path, r#"{"discord": ["7"]}"#).unwrap();

        let ledger = NotificationLedger::load(&path);
        assert!(ledger.has_notified(Platform::Discord, "7").await);
        assert!(!ledger.has_notified(Platform::Stoat, "7").await);
    }

    #[tokio::test]
    async fn test_concurrent_marks_insert_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(NotificationLedger::load(dir.path().join("notified.json")));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.mark_notified(Platform::Discord, "99").await })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
    }
}
