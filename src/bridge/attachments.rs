//! Attachment relay: download into memory under a size cap, hand off for one upload.

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use reqwest::{Client, Url};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::common::error::RelayError;

const FALLBACK_FILENAME: &str = "file";

/// A downloaded attachment waiting for its single upload.
pub struct PendingAttachment {
    pub filename: String,
    pub bytes: Bytes,
}

/// Relay permits reserved for one message.
///
/// Buffers downloaded under these slots must not outlive them. All permits
/// for a message are taken at once so two messages never hold part of the
/// pool while waiting on each other.
#[derive(Debug)]
pub struct UploadSlots {
    count: usize,
    _permit: OwnedSemaphorePermit,
}

impl UploadSlots {
    /// How many attachments may be downloaded under this reservation.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl fmt::Debug for PendingAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAttachment")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Downloads attachment bytes for re-upload on the other platform.
#[derive(Debug, Clone)]
pub struct AttachmentRelay {
    http: Client,
    max_bytes: u64,
    capacity: usize,
    permits: Arc<Semaphore>,
}

impl AttachmentRelay {
    pub fn new(http: Client, max_bytes: u64, max_concurrent: usize) -> Self {
        let capacity = max_concurrent.max(1);
        Self {
            http,
            max_bytes,
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Reserve slots for up to `wanted` attachments, capped at the pool size.
    pub async fn reserve(&self, wanted: usize) -> Result<UploadSlots, RelayError> {
        let count = wanted.min(self.capacity);
        let permit = Arc::clone(&self.permits)
            .acquire_many_owned(count as u32)
            .await
            .map_err(|_| RelayError::Closed)?;
        Ok(UploadSlots {
            count,
            _permit: permit,
        })
    }

    /// Fetch `url` fully into memory.
    ///
    /// Callers hold an [`UploadSlots`] reservation for the download. Fails
    /// with `TooLarge` as soon as the declared or streamed size exceeds the
    /// cap; the body is not read further.
    pub async fn relay(
        &self,
        url: &str,
        preferred_filename: Option<&str>,
    ) -> Result<PendingAttachment, RelayError> {
        let mut response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::FetchFailed {
                status: status.as_u16(),
            });
        }

        if let Some(declared) = response.content_length() {
            check_size(declared, self.max_bytes)?;
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            append_capped(&mut buffer, &chunk, self.max_bytes)?;
        }

        let filename = preferred_filename
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| filename_from_url(url));

        debug!(url, filename = %filename, size = buffer.len(), "Attachment downloaded");

        Ok(PendingAttachment {
            filename,
            bytes: buffer.freeze(),
        })
    }
}

fn check_size(size: u64, limit: u64) -> Result<(), RelayError> {
    if size > limit {
        Err(RelayError::TooLarge { size, limit })
    } else {
        Ok(())
    }
}

fn append_capped(buffer: &mut BytesMut, chunk: &[u8], limit: u64) -> Result<(), RelayError> {
    check_size((buffer.len() + chunk.len()) as u64, limit)?;
    buffer.extend_from_slice(chunk);
    Ok(())
}

/// Last path segment of `url` (query excluded), or `file`.
pub fn filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_relay(max_bytes: u64) -> AttachmentRelay {
        AttachmentRelay::new(Client::new(), max_bytes, 2)
    }

    #[tokio::test]
    async fn test_relay_downloads_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/cat.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 1024]))
            .mount(&server)
            .await;

        let relay = test_relay(4096);
        let url = format!("{}/files/cat.png?size=big", server.uri());
        let pending = relay.relay(&url, None).await.unwrap();

        assert_eq!(pending.filename, "cat.png");
        assert_eq!(pending.bytes.len(), 1024);
    }

    #[tokio::test]
    async fn test_preferred_filename_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .mount(&server)
            .await;

        let relay = test_relay(4096);
        let pending = relay
            .relay(&format!("{}/abc", server.uri()), Some("notes.txt"))
            .await
            .unwrap();
        assert_eq!(pending.filename, "notes.txt");
        assert_eq!(&pending.bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_declared_size_rejected_before_body() {
        let declared: u64 = 30 * 1024 * 1024;
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-length", declared.to_string().as_str())
                    .set_body_bytes(vec![0u8; 16]),
            )
            .mount(&server)
            .await;

        let relay = test_relay(25 * 1024 * 1024);
        let err = relay
            .relay(&format!("{}/video.mp4", server.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::TooLarge { size, .. } if size == declared));
    }

    #[tokio::test]
    async fn test_streamed_body_over_cap_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4096]))
            .mount(&server)
            .await;

        let err = test_relay(1024)
            .relay(&format!("{}/blob.bin", server.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::TooLarge { limit: 1024, .. }));
    }

    #[tokio::test]
    async fn test_fetch_failure_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = test_relay(1024)
            .relay(&format!("{}/gone.png", server.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::FetchFailed { status: 404 }));
    }

    #[tokio::test]
    async fn test_reservation_capped_and_released_on_drop() {
        let relay = AttachmentRelay::new(Client::new(), 16, 2);

        let slots = relay.reserve(5).await.unwrap();
        assert_eq!(slots.count(), 2);
        assert_eq!(relay.permits.available_permits(), 0);

        drop(slots);
        assert_eq!(relay.permits.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_reservation_waits_for_whole_batch() {
        let relay = AttachmentRelay::new(Client::new(), 16, 2);
        let held = relay.reserve(1).await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(50), relay.reserve(2)).await;
        assert!(waiting.is_err());

        drop(held);
        let slots = relay.reserve(2).await.unwrap();
        assert_eq!(slots.count(), 2);
    }

    #[test]
    fn test_streamed_size_capped() {
        let mut buffer = BytesMut::new();
        append_capped(&mut buffer, &[0u8; 8], 10).unwrap();
        let err = append_capped(&mut buffer, &[0u8; 8], 10).unwrap_err();

        assert!(matches!(err, RelayError::TooLarge { size: 16, limit: 10 }));
        assert_eq!(buffer.len(), 8);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://cdn.example/a/b/photo.jpg?ex=1"), "photo.jpg");
        assert_eq!(filename_from_url("https://cdn.example/"), "file");
        assert_eq!(filename_from_url("not a url"), "file");
    }
}
