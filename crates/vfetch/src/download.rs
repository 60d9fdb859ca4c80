//! Download side-effect port

use async_trait::async_trait;
use percent_encoding::percent_decode_str;

use crate::error::BoxError;

/// Injected capability that persists a downloaded blob.
///
/// The platform mechanics (anchor elements and object URLs in the
/// original environment, the filesystem here) live behind this seam so
/// tests can record instead of write.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Persist `blob` under `filename`.
    async fn save(&self, blob: &[u8], filename: &str) -> Result<(), BoxError>;
}

/// Default downloader: writes the blob to `filename` in the current
/// directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDownloader;

#[async_trait]
impl Downloader for FsDownloader {
    async fn save(&self, blob: &[u8], filename: &str) -> Result<(), BoxError> {
        tokio::fs::write(filename, blob).await?;
        tracing::debug!(filename, bytes = blob.len(), "download saved");
        Ok(())
    }
}

/// Extract the filename from a `Content-Disposition` header value,
/// stripping quotes and percent-decoding.
pub(crate) fn content_disposition_filename(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let token = rest.split(';').next()?.trim().trim_matches('"');
    if token.is_empty() {
        return None;
    }
    Some(percent_decode_str(token).decode_utf8_lossy().into_owned())
}
