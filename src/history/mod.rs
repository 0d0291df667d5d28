//! Append-only notification audit trail.
//!
//! Every state change a notification goes through is recorded here. The
//! ledger refuses to write an entry whose previous/new status pair is not in
//! the fixed transition table, so replaying a notification's entries in
//! timestamp order always yields a legal state machine walk.

mod ledger;
mod store;
mod types;

pub use ledger::HistoryLedger;
pub use store::{HistoryStore, MemoryHistoryStore};
pub use types::{is_valid_transition, HistoryEntry, HistoryEvent};
