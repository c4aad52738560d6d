//! History ledger
//!
//! Every committed change appends one `HistoryEntry` to a fixed-capacity
//! ring buffer kept per key. Once a key's buffer is full, the slot at
//! `cursor % capacity` is overwritten; the cursor only ever grows.
//!
//! `all` returns storage order. After wraparound that is NOT chronological
//! order; `chronological` rotates the buffer for callers that need it.

mod ledger;

pub use ledger::HistoryLedger;
