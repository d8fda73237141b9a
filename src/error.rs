use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Image {path} is {width}x{height} ({pixels} pixels), above the limit of {limit}")]
    PixelLimitExceeded {
        path: PathBuf,
        width: u32,
        height: u32,
        pixels: u64,
        limit: u64,
    },

    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },

    #[error("Output {0} missing after write; original kept")]
    CommitVerify(PathBuf),

    #[error("Converted but could not remove original {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid quality value: {0}. Must be between 1 and 100")]
    InvalidQuality(u8),

    #[error("Invalid maximum width: {0}. Use a positive pixel count or 'none'")]
    InvalidMaxWidth(String),

    #[error("Worker count must be at least 1")]
    InvalidWorkers,

    #[error("Root directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Walkdir error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Short, stable names used in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    PixelLimitExceeded,
    Encode,
    CommitVerify,
    Delete,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Decode => "DecodeError",
            ErrorKind::PixelLimitExceeded => "PixelLimitExceeded",
            ErrorKind::Encode => "EncodeError",
            ErrorKind::CommitVerify => "CommitVerifyError",
            ErrorKind::Delete => "DeleteError",
            ErrorKind::Other => "Error",
        };
        f.write_str(name)
    }
}

impl NormalizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NormalizeError::Decode { .. } => ErrorKind::Decode,
            NormalizeError::PixelLimitExceeded { .. } => ErrorKind::PixelLimitExceeded,
            NormalizeError::Encode { .. } => ErrorKind::Encode,
            NormalizeError::CommitVerify(_) => ErrorKind::CommitVerify,
            NormalizeError::Delete { .. } => ErrorKind::Delete,
            _ => ErrorKind::Other,
        }
    }

    /// Only transient codec failures are worth another attempt; a partially
    /// written source decodes fine once the writer is done.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NormalizeError::Decode { .. } | NormalizeError::Encode { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, NormalizeError>;
