use roomsync_core::{PageRejection, SyncError};
use thiserror::Error;

/// Outcome of an older-page request that did not insert a page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The cursor refused the request (in flight, cooling down, exhausted or
    /// nothing loaded). Nothing was fetched.
    #[error("older page not eligible: {0:?}")]
    NotEligible(PageRejection),

    /// The fetch failed or the collection is closed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}
