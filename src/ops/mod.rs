//! Operational concerns: metrics, request audit trail, fault injection.

pub mod audit;
pub mod failpoints;
pub mod observability;

pub use audit::{AuditLog, AuditRecord, AuditSeverity};
pub use failpoints::{FailAction, FailPoints};
pub use observability::{HealthProbe, HealthStatus, MetricsRegistry, TesseraMetrics};
