//! Update resolution: which remote version counts, whether it is an
//! update, and which older versions may be installed instead.

mod decider;
mod engine;
mod error;
mod resolver;
mod rollback;
mod version;

pub use decider::{UpdateDecider, UpdateState};
pub use engine::{ComponentStatus, CycleOutcome, CycleReport, DEFAULT_FETCH_TIMEOUT, UpdateEngine};
pub use error::ResolveError;
pub use resolver::{ResolvedVersion, VersionResolver};
pub use rollback::{ROLLBACK_WINDOW, RollbackCatalog, RollbackEntry, RollbackList};
pub use version::{Version, labels_match};
