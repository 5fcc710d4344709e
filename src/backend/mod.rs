//! Translation backend contract.
//! The REST service owns upload, status, result and text translation; the
//! poller and translator only see this trait.

pub mod http;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;

pub use http::HttpBackend;

/// A document selected for translation.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl DocumentFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lower-cased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: DocumentFile,
    pub source_lang: String,
    pub target_lang: String,
    pub use_glossary: bool,
}

/// Backend acknowledgement of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    pub document_id: String,
    pub document_key: String,
    #[serde(default)]
    pub has_glossary: bool,
}

/// Capability pair required by every follow-up call on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobHandle {
    pub document_id: String,
    pub document_key: String,
}

impl From<&UploadReceipt> for JobHandle {
    fn from(r: &UploadReceipt) -> Self {
        Self {
            document_id: r.document_id.clone(),
            document_key: r.document_key.clone(),
        }
    }
}

/// Raw status poll response. `status` is kept as a string so new server
/// phases do not fail decoding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusReport {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub seconds_remaining: Option<u64>,
}

impl StatusReport {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: None,
            seconds_remaining: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextTranslationResponse {
    pub translations: Vec<TextTranslation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextTranslation {
    pub text: String,
}

#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadReceipt, BackendError>;

    async fn status(&self, job: &JobHandle) -> Result<StatusReport, BackendError>;

    async fn result(&self, job: &JobHandle) -> Result<Vec<u8>, BackendError>;

    /// Translate `text` into `target_lang`. Returns `BackendError::Cancelled`
    /// as soon as `cancel` fires.
    async fn translate_text(
        &self,
        text: &str,
        target_lang: &str,
        cancel: &CancellationToken,
    ) -> Result<String, BackendError>;
}
