//! Referrals between doctors.
//!
//! `transitions` owns every status change and its side effects; `queries`
//! is the read surface. Both work on a plain `rusqlite::Connection`.

pub mod queries;
pub mod transitions;
pub mod types;

pub use queries::*;
pub use transitions::{accept, cancel, complete, create, decline};
pub use types::*;
