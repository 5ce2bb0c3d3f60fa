//! In-process content-addressed document store.

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::{DocumentMetadata, UploadError};
use crate::ports::DocumentUploader;

/// Locator scheme of uploaded documents.
pub const LOCATOR_SCHEME: &str = "ipfs://";

/// Compute the locator of `bytes`: `ipfs://<sha256-hex>`.
pub fn content_locator(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{}{}", LOCATOR_SCHEME, hex::encode(digest))
}

/// Uploader keeping documents in memory under their content hash.
///
/// Uploading equal content twice yields the same locator. Uploads of given
/// file names can be made to fail.
#[derive(Default)]
pub struct ContentAddressedUploader {
    objects: RwLock<HashMap<String, (DocumentMetadata, Vec<u8>)>>,
    failing: RwLock<HashSet<String>>,
    attempts: RwLock<Vec<String>>,
}

impl ContentAddressedUploader {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every upload of `file_name`.
    pub fn fail_file(&self, file_name: impl Into<String>) {
        self.failing.write().insert(file_name.into());
    }

    /// Stop rejecting `file_name`.
    pub fn heal_file(&self, file_name: &str) {
        self.failing.write().remove(file_name);
    }

    /// Stored content for a locator.
    pub fn get(&self, locator: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .get(locator)
            .map(|(_, bytes)| bytes.clone())
    }

    /// File names of every upload attempt, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.read().clone()
    }

    /// Number of distinct stored documents.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl DocumentUploader for ContentAddressedUploader {
    async fn upload(
        &self,
        bytes: &[u8],
        metadata: &DocumentMetadata,
    ) -> Result<String, UploadError> {
        self.attempts.write().push(metadata.file_name.clone());

        if bytes.is_empty() {
            return Err(UploadError::EmptyContent);
        }
        if self.failing.read().contains(&metadata.file_name) {
            return Err(UploadError::Network(format!(
                "gateway refused {}",
                metadata.file_name
            )));
        }

        let locator = content_locator(bytes);
        self.objects
            .write()
            .entry(locator.clone())
            .or_insert_with(|| (metadata.clone(), bytes.to_vec()));
        debug!(
            "[uploader] 📦 Stored {} ({} bytes) as {}",
            metadata.file_name,
            bytes.len(),
            locator
        );
        Ok(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str) -> DocumentMetadata {
        DocumentMetadata {
            file_name: name.to_string(),
            content_type: "application/pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn test_equal_content_same_locator() {
        let uploader = ContentAddressedUploader::new();
        let a = uploader.upload(b"hello", &meta("a.pdf")).await.unwrap();
        let b = uploader.upload(b"hello", &meta("b.pdf")).await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(LOCATOR_SCHEME));
        assert_eq!(uploader.len(), 1);
        assert_eq!(uploader.get(&a).as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let uploader = ContentAddressedUploader::new();
        assert_eq!(
            uploader.upload(b"", &meta("a.pdf")).await,
            Err(UploadError::EmptyContent)
        );
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let uploader = ContentAddressedUploader::new();
        uploader.fail_file("msds.pdf");
        assert!(uploader.upload(b"sheet", &meta("msds.pdf")).await.is_err());
        uploader.heal_file("msds.pdf");
        assert!(uploader.upload(b"sheet", &meta("msds.pdf")).await.is_ok());
        assert_eq!(uploader.attempts(), vec!["msds.pdf", "msds.pdf"]);
    }
}
