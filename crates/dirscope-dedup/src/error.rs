use dirscope_core::DirscopeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("store error: {0}")]
    Store(#[from] DirscopeError),

    #[error("group index {index} out of range ({len} groups)")]
    GroupOutOfRange { index: usize, len: usize },

    #[error("{id} is not a duplicate in group {group}")]
    NotADuplicate { group: usize, id: String },

    #[error("unknown action: {0} (expected merge, variant or keep)")]
    UnknownAction(String),
}

pub type Result<T> = std::result::Result<T, DedupError>;
