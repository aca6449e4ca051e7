pub mod batch;
pub mod error;
pub mod exact;
pub mod grouper;
pub mod merge;
pub mod session;
pub mod similarity;
pub mod types;

pub use batch::{GroupPlan, PlannedWrite, plan_group, process_duplicates};
pub use error::{DedupError, Result};
pub use exact::{exact_key, group_duplicates_for_review, identify_exact_duplicates, remove_exact_duplicates};
pub use grouper::{DEFAULT_SIMILARITY_THRESHOLD, DuplicateFinder};
pub use merge::{MergeResult, merge_records, preview_merge};
pub use session::DedupSession;
pub use similarity::{similarity, token_overlap};
pub use types::{
    DuplicateAction, DuplicateGroup, ProcessingResults, RemovalReport, ReviewGroup, ScoredGroup,
};

#[cfg(feature = "async")]
pub use batch::process_duplicates_async;
