use std::path::PathBuf;

use thiserror::Error;

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalyzeError>;

/// Fatal analysis errors surfaced to the caller.
///
/// Per-entry decode failures are not represented here: a class file that
/// fails to parse is logged and skipped without aborting the run.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("WAR 文件不存在: {}", path.display())]
    ArchiveNotFound { path: PathBuf },

    #[error("无法读取 war 包 {}: {message}", path.display())]
    ArchiveOpen { path: PathBuf, message: String },

    #[error("analysis timed out after {limit_secs}s")]
    Timeout { limit_secs: u64 },

    #[error("analysis cancelled by caller")]
    Cancelled,
}

impl AnalyzeError {
    pub fn archive_open(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ArchiveOpen {
            path: path.into(),
            message: message.into(),
        }
    }
}
