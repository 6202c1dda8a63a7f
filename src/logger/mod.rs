//! Structured run evidence: append-only JSONL event log.

pub mod jsonl;

pub use jsonl::{EventLog, EventType, LogEntry, Severity};
