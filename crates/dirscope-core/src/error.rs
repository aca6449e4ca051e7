use thiserror::Error;

/// All errors that can occur in dirscope-core.
#[derive(Debug, Error)]
pub enum DirscopeError {
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Storage(#[from] crate::storage::database::DatabaseError),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Exit codes used by the CLI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    ConfirmRequired = 8,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl DirscopeError {
    /// Map an error to the process exit code the CLI reports for it.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::ItemNotFound(_) => ExitCode::NotFound,
            Self::ValidationError(_) => ExitCode::InvalidArgs,
            _ => ExitCode::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, DirscopeError>;
