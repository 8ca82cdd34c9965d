use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Backup is empty")]
    EmptyBackup,

    #[error("Unrecognized backup format: {0}")]
    BackupFormat(String),

    #[error("Restore failed: {0}")]
    RestoreFailed(String),

    #[error("Api Error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, GateError>;
