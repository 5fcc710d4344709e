//! Pre-flight checks run before any network call is made.

use crate::backend::DocumentFile;
use crate::error::JobError;
use crate::language;

/// Extensions the backend accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "pptx"];

/// What the user asked for when pressing "translate".
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub file: DocumentFile,
    pub source_lang: String,
    pub target_lang: String,
    pub use_glossary: bool,
}

/// Glossary extraction needs an explicit source language.
pub fn check_configuration(req: &JobRequest) -> Result<(), JobError> {
    if req.use_glossary && language::is_auto(&req.source_lang) {
        return Err(JobError::Configuration(
            "glossary translation requires an explicit source language".into(),
        ));
    }
    if language::is_auto(&req.target_lang) {
        return Err(JobError::Configuration(
            "target language cannot be auto-detect".into(),
        ));
    }
    Ok(())
}

/// Size and type checks; rejected files never reach the backend.
pub fn check_file(file: &DocumentFile, max_bytes: u64) -> Result<(), JobError> {
    if file.bytes.is_empty() {
        return Err(JobError::Upload("file is empty".into()));
    }
    if file.size() > max_bytes {
        return Err(JobError::Upload(format!(
            "file is too large, maximum size is {} MB",
            max_bytes / (1024 * 1024)
        )));
    }
    match file.extension() {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(JobError::Upload(
            "unsupported file type, only PDF, DOCX and PPTX are supported".into(),
        )),
    }
}

/// Name the translated document is saved under.
pub fn result_file_name(original: &str) -> String {
    let base = std::path::Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");
    format!("translated_{base}")
}
