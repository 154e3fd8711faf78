//! Lifecycle request audit trail.
//!
//! Every executed lifecycle command leaves one [`AuditRecord`] carrying its
//! request id, target, final status and elapsed time. Records are kept in a
//! bounded ring buffer; the oldest record is dropped when it is full.

use crate::commands::CommandKind;
use crate::core::error::StatusCode;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Audit record severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuditSeverity {
    /// Request succeeded.
    Info,
    /// Request rejected for a caller error.
    Warning,
    /// Request failed in a lower layer or faulted.
    Error,
}

impl AuditSeverity {
    /// Severity for a final status code.
    pub fn for_code(code: StatusCode) -> Self {
        match code {
            StatusCode::Ok => Self::Info,
            StatusCode::InvalidArgument
            | StatusCode::CollectionNotFound
            | StatusCode::InvalidCollectionReference => Self::Warning,
            _ => Self::Error,
        }
    }
}

impl std::fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Outcome of one lifecycle request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Record sequence number, assigned by the log.
    pub record_id: u64,
    /// Timestamp (RFC3339).
    pub timestamp: String,
    /// Request ID for correlation.
    pub request_id: String,
    pub kind: CommandKind,
    pub collection: String,
    pub partition_tags: Vec<String>,
    pub code: StatusCode,
    pub message: String,
    pub severity: AuditSeverity,
    /// Wall time from entry to first return.
    pub elapsed_ms: f64,
}

impl AuditRecord {
    /// Create a record for a finished request.
    pub fn new(
        request_id: impl Into<String>,
        kind: CommandKind,
        collection: impl Into<String>,
        code: StatusCode,
    ) -> Self {
        Self {
            record_id: 0,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id: request_id.into(),
            kind,
            collection: collection.into(),
            partition_tags: Vec::new(),
            code,
            message: String::new(),
            severity: AuditSeverity::for_code(code),
            elapsed_ms: 0.0,
        }
    }

    /// Set partition tags.
    pub fn with_partition_tags(mut self, tags: Vec<String>) -> Self {
        self.partition_tags = tags;
        self
    }

    /// Set the status message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set elapsed time.
    pub fn with_elapsed_ms(mut self, elapsed_ms: f64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Ok
    }

    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Audit log configuration.
#[derive(Debug, Clone)]
pub struct AuditLogConfig {
    /// Maximum records kept in memory.
    pub buffer_size: usize,
    /// Records below this severity are counted but not kept.
    pub min_severity: AuditSeverity,
}

impl Default for AuditLogConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1_024,
            min_severity: AuditSeverity::Info,
        }
    }
}

/// Audit log statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditLogStats {
    pub total_records: u64,
    pub failures: u64,
    pub dropped_records: u64,
    pub buffered: usize,
}

/// Bounded in-memory audit log.
#[derive(Debug)]
pub struct AuditLog {
    config: AuditLogConfig,
    buffer: RwLock<VecDeque<AuditRecord>>,
    next_record_id: AtomicU64,
    total_records: AtomicU64,
    failures: AtomicU64,
    dropped_records: AtomicU64,
}

impl AuditLog {
    /// Create a new audit log.
    pub fn new(config: AuditLogConfig) -> Self {
        Self {
            config,
            buffer: RwLock::new(VecDeque::new()),
            next_record_id: AtomicU64::new(1),
            total_records: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            dropped_records: AtomicU64::new(0),
        }
    }

    /// Create a log keeping at most `buffer_size` records.
    pub fn with_capacity(buffer_size: usize) -> Self {
        Self::new(AuditLogConfig {
            buffer_size,
            ..AuditLogConfig::default()
        })
    }

    /// Append a record, returning its assigned id.
    pub fn record(&self, mut record: AuditRecord) -> u64 {
        record.record_id = self.next_record_id.fetch_add(1, Ordering::Relaxed);
        self.total_records.fetch_add(1, Ordering::Relaxed);
        if !record.is_success() {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }

        let id = record.record_id;
        if record.severity < self.config.min_severity || self.config.buffer_size == 0 {
            return id;
        }

        let mut buffer = self.buffer.write();
        if buffer.len() >= self.config.buffer_size {
            buffer.pop_front();
            self.dropped_records.fetch_add(1, Ordering::Relaxed);
        }
        buffer.push_back(record);
        id
    }

    /// Most recent records, newest first.
    pub fn recent(&self, count: usize) -> Vec<AuditRecord> {
        self.buffer.read().iter().rev().take(count).cloned().collect()
    }

    /// Most recent records for a collection, newest first.
    pub fn by_collection(&self, collection: &str, count: usize) -> Vec<AuditRecord> {
        self.buffer
            .read()
            .iter()
            .rev()
            .filter(|r| r.collection == collection)
            .take(count)
            .cloned()
            .collect()
    }

    /// The record for a request id, if still buffered.
    pub fn by_request(&self, request_id: &str) -> Option<AuditRecord> {
        self.buffer
            .read()
            .iter()
            .rev()
            .find(|r| r.request_id == request_id)
            .cloned()
    }

    /// Most recent failed requests, newest first.
    pub fn failures(&self, count: usize) -> Vec<AuditRecord> {
        self.buffer
            .read()
            .iter()
            .rev()
            .filter(|r| !r.is_success())
            .take(count)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.buffer.write().clear();
    }

    pub fn stats(&self) -> AuditLogStats {
        AuditLogStats {
            total_records: self.total_records.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            dropped_records: self.dropped_records.load(Ordering::Relaxed),
            buffered: self.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.read().is_empty()
    }

    /// Export buffered records as a JSON array, oldest first.
    pub fn export_json(&self) -> String {
        let buffer = self.buffer.read();
        let records: Vec<&AuditRecord> = buffer.iter().collect();
        serde_json::to_string_pretty(&records).unwrap_or_default()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(AuditLogConfig::default())
    }
}
