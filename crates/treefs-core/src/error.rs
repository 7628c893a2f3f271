//! Error types for TreeFS Core

/// Core filesystem error type
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("invalid path")]
    InvalidPath,
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("not a file")]
    NotAFile,
    #[error("not a symbolic link")]
    NotASymlink,
    #[error("permission denied")]
    PermissionDenied,
    #[error("already exists")]
    AlreadyExists,
    #[error("too many levels of symbolic links")]
    SymlinkLoop,
    #[error("dangling symbolic link: {prefix} -> {target}")]
    DanglingLink { prefix: String, target: String },
    #[error("invalid argument")]
    InvalidArgument,
    #[error("snapshot format error: {0}")]
    Format(String),
}

impl FsError {
    /// Create a new snapshot format error.
    pub fn format<S: Into<String>>(message: S) -> Self {
        Self::Format(message.into())
    }
}

impl From<serde_json::Error> for FsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err.to_string())
    }
}

pub type FsResult<T> = Result<T, FsError>;
