//! Event sinks
//!
//! Delivery happens after commit. A failing sink never rolls back a
//! committed change; the failure is logged at ERROR and dropped.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use uuid::Uuid;

use super::events::DirectoryEvent;
use super::logger::{Logger, Severity};

/// An event with a unique id for de-duplication by indexers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub event: DirectoryEvent,
}

impl EventRecord {
    pub fn new(event: DirectoryEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
        }
    }

    /// One JSON line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"id":"{}","event":"{}","error":"{}"}}"#, self.id, self.event, e)
        })
    }
}

/// Receiver of committed directory events.
pub trait EventSink: Send + Sync {
    fn emit(&self, record: &EventRecord) -> io::Result<()>;
}

/// Forwards events to the JSON logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, record: &EventRecord) -> io::Result<()> {
        let mut fields = record.event.fields();
        fields.push(("id".to_string(), record.id.to_string()));
        let borrowed: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Logger::log(Severity::Info, record.event.as_str(), &borrowed);
        Ok(())
    }
}

/// Append-only JSON-lines file, synced per record.
pub struct FileEventSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileEventSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for FileEventSink {
    fn emit(&self, record: &EventRecord) -> io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "event sink lock poisoned"))?;
        writeln!(writer, "{}", record.to_json())?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }
}

/// In-memory sink. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryEventSink {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn events(&self) -> Vec<DirectoryEvent> {
        self.records().into_iter().map(|r| r.event).collect()
    }

    /// Event names in emission order.
    pub fn names(&self) -> Vec<&'static str> {
        self.records().iter().map(|r| r.event.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every buffered record.
    pub fn take(&self) -> Vec<EventRecord> {
        self.records
            .lock()
            .map(|mut r| std::mem::take(&mut *r))
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, record: &EventRecord) -> io::Result<()> {
        self.records
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "event sink lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

/// Deliver `events` to `sink`, logging (not propagating) failures.
pub fn deliver(sink: &dyn EventSink, events: Vec<DirectoryEvent>) {
    forward(sink, events.into_iter().map(EventRecord::new).collect());
}

/// Re-emit already stamped records, keeping their ids.
pub fn forward(sink: &dyn EventSink, records: Vec<EventRecord>) {
    for record in records {
        if let Err(e) = sink.emit(&record) {
            Logger::error(
                "EVENT_DELIVERY_FAILED",
                &[("event", record.event.as_str()), ("error", &e.to_string())],
            );
        }
    }
}
