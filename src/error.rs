//! Error types for chapter reading and segment extraction

/// Result type for mkvtoolnix operations
pub type Result<T> = std::result::Result<T, ExtractorError>;

/// Error types for mkvtoolnix operations
#[derive(thiserror::Error, Debug)]
pub enum ExtractorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not found. Install mkvtoolnix.")]
    ToolNotFound(String),

    #[error("{tool} exited with status {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    #[error("Invalid JSON from mkvmerge: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed tool output: {0}")]
    MalformedOutput(String),
}
