//! Transfer drivers: a single-mirror, single-file fetch and a batch driver
//! that runs many of those concurrently with mirror failover.

mod multi;
mod single;

pub use multi::{download_many, MultiOutcome, PayloadResult};
pub use single::{attempt, demote_error, download, finalize, AttemptOutcome, SingleOutcome};

pub(crate) use crate::external::attempt as external_attempt;
