use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Missing configuration: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Permission denied by Vertex AI: {0}")]
    PermissionDenied(String),

    #[error("Blocked by safety filters: {0}")]
    Blocked(String),

    #[error("Reference file not found at: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid reference image {}: {message}", .path.display())]
    InvalidImage { path: PathBuf, message: String },

    #[error("Vertex AI error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Vertex AI operation failed (code {code}): {message}")]
    Operation { code: i64, message: String },

    #[error("Polling gave up after {attempts} consecutive failures: {last}")]
    PollExhausted { attempts: u32, last: String },

    #[error("Cloud Storage download failed: {0}")]
    Storage(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a failed scene lands in the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    FileNotFound,
    SafetyFilter,
    Other,
}

impl GenerationError {
    /// Errors that make every following scene fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GenerationError::Config(_)
                | GenerationError::Auth(_)
                | GenerationError::PermissionDenied(_)
        )
    }

    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Transport(_) => true,
            GenerationError::Api { status, message } => {
                *status == 429 || *status >= 500 || message.contains("RESOURCE_EXHAUSTED")
            }
            _ => false,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            GenerationError::FileNotFound(_) => FailureKind::FileNotFound,
            GenerationError::Blocked(_) => FailureKind::SafetyFilter,
            GenerationError::Operation { message, .. } if mentions_safety_block(message) => {
                FailureKind::SafetyFilter
            }
            _ => FailureKind::Other,
        }
    }

    /// The API refused the input video of an extension request.
    pub fn is_rejected_input_video(&self) -> bool {
        let message = match self {
            GenerationError::Api { message, .. } | GenerationError::Operation { message, .. } => {
                message
            }
            _ => return false,
        };
        message.contains("Input video must be a video that was generated by VEO")
            || message.contains("Unsupported video height")
    }
}

pub(crate) fn mentions_safety_block(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["blocked", "dangerous content", "sensitive words"]
        .iter()
        .any(|t| lower.contains(t))
}

pub type Result<T> = std::result::Result<T, GenerationError>;
