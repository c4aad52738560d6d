//! Observability
//!
//! - Structured JSON logging (`Logger`)
//! - Typed directory events (`DirectoryEvent`)
//! - Pluggable event sinks (`EventSink`)
//!
//! Observability is read-only: nothing here influences whether a directory
//! operation succeeds.

mod events;
mod logger;
mod sink;

pub use events::DirectoryEvent;
pub use logger::{Logger, Severity};
pub use sink::{
    deliver, forward, EventRecord, EventSink, FileEventSink, LogEventSink, MemoryEventSink,
};

