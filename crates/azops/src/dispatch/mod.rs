//! Change dispatch: turns changed state files into cloud operations.
//!
//! Files are handled strictly in order. Deletions are reported, never applied.

pub mod classify;
pub mod diff;
pub mod dispatcher;
pub mod error;
pub mod report;

pub use classify::{classify, ChangeClass};
pub use diff::{parse_name_status, ChangeSet};
pub use dispatcher::{ChangeDispatcher, DispatchSettings, DEFAULT_OFFER_TYPE};
pub use error::DispatchError;
pub use report::{AppliedChange, ApplyReport, FailedChange, SkipReason, SkippedChange};
