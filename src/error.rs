use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the pipeline components.
///
/// The first group aborts a run before any page is attempted; the second
/// group is scoped to a single integration record and ends up in its
/// `PageResult`.
#[derive(Debug, Error)]
pub enum PageGenError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("CSV file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("malformed CSV input: {0}")]
    MalformedInput(String),

    #[error("template page {page_id} not found (missing or trashed)")]
    TemplateNotFound { page_id: u64 },

    #[error("WordPress rejected the credentials (HTTP {status}): {message}")]
    AuthenticationError { status: u16, message: String },

    #[error("failed to fetch template page: {0}")]
    TemplateFetch(String),

    #[error("LLM API error: {0}")]
    GenerationApiError(String),

    #[error("generated content is missing fields: {}", .0.join(", "))]
    GenerationIncomplete(Vec<String>),

    #[error("publish failed: {0}")]
    PublishError(String),
}

pub type Result<T> = std::result::Result<T, PageGenError>;
