//! Command executor: the catch-and-convert boundary.
//!
//! [`CommandExecutor::execute`] drives a command through its states, times
//! the whole run, converts any panic into an `Unexpected` status, and
//! records the outcome in the audit log and metrics. Nothing a command does
//! can escape to the caller as a panic.

use crate::commands::{CommandEnv, CommandOutcome, CommandOutput, CommandState, LifecycleCommand};
use crate::core::error::{ErrorClass, TesseraError, TesseraResult};
use crate::core::time::{duration_ms, TimeRecorder};
use crate::ops::audit::{AuditLog, AuditRecord};
use crate::ops::observability::TesseraMetrics;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Drives lifecycle commands against one environment.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    env: CommandEnv,
    audit: Arc<AuditLog>,
    metrics: Arc<TesseraMetrics>,
}

impl CommandExecutor {
    /// Create an executor with its own audit log and metrics.
    pub fn new(env: CommandEnv) -> Self {
        Self {
            env,
            audit: Arc::new(AuditLog::default()),
            metrics: Arc::new(TesseraMetrics::new()),
        }
    }

    /// Record into a shared audit log.
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    /// Record into shared metrics.
    pub fn with_metrics(mut self, metrics: Arc<TesseraMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn env(&self) -> &CommandEnv {
        &self.env
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn metrics(&self) -> &Arc<TesseraMetrics> {
        &self.metrics
    }

    /// Execute a command once.
    ///
    /// A command that already reached a terminal state is not run again;
    /// its recorded outcome is returned.
    pub fn execute(&self, command: &mut dyn LifecycleCommand) -> CommandOutcome {
        if let Some(outcome) = command.core().outcome() {
            tracing::debug!(
                request_id = %outcome.request_id,
                "command already executed; returning recorded outcome"
            );
            return outcome.clone();
        }

        let kind = command.kind();
        let recorder = TimeRecorder::start(command.core().header(kind));
        let header = recorder.header().to_string();

        let result = match panic::catch_unwind(AssertUnwindSafe(|| run(&mut *command, &self.env))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_payload_message(payload);
                tracing::error!(command = %header, panic = %message, "command panicked");
                Err(TesseraError::unexpected(message))
            }
        };
        log_result(&header, &result);

        let elapsed_ms = duration_ms(recorder.finish());
        let outcome = command.core_mut().finish(kind, result, elapsed_ms).clone();

        self.audit.record(
            AuditRecord::new(
                outcome.request_id.clone(),
                kind,
                outcome.collection.clone(),
                outcome.status.code,
            )
            .with_partition_tags(command.core().partition_tags().to_vec())
            .with_message(outcome.status.message.clone())
            .with_elapsed_ms(elapsed_ms),
        );
        self.metrics
            .record_request(kind, outcome.status.code, elapsed_ms);
        if kind.mutates_cache() {
            self.metrics.record_cache_stats(&self.env.cache().stats());
        }
        outcome
    }
}

fn run(command: &mut dyn LifecycleCommand, env: &CommandEnv) -> TesseraResult<CommandOutput> {
    command.core_mut().advance(CommandState::Validating)?;
    let target = command.validate(env)?;

    command.core_mut().advance(CommandState::Executing)?;
    command.apply(env, &target)
}

fn log_result(header: &str, result: &TesseraResult<CommandOutput>) {
    match result {
        Ok(_) => tracing::info!(command = %header, "command succeeded"),
        Err(err) => match err.class() {
            ErrorClass::InvalidArgument
            | ErrorClass::CollectionNotFound
            | ErrorClass::InvalidCollectionReference => {
                tracing::warn!(command = %header, error = %err, "command rejected")
            }
            ErrorClass::UnderlyingFailure | ErrorClass::Unexpected => tracing::error!(
                command = %header,
                error = %err,
                retriable = err.is_retriable(),
                "command failed"
            ),
        },
    }
}

pub(crate) fn panic_payload_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    }
}
