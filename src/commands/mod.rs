//! Lifecycle commands.
//!
//! A lifecycle command is a single-use object representing one client
//! request: load, release or describe the cache residency of a root
//! collection, optionally restricted to some partition tags.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──► Validating ──► Executing ──► Succeeded
//!                 │              │
//!                 └──────────────┴───────► Failed
//! ```
//!
//! Validation checks argument syntax, then asks the metadata accessor for
//! the target's schema and rejects partition sub-collections. Only after
//! validation passes does execution resolve segments and touch the cache,
//! so no failure reached during validation leaves a cache side effect.
//!
//! Commands are driven by the [`CommandExecutor`], the single point that
//! converts panics into `Unexpected` results and records timing.

pub mod describe;
pub mod executor;
pub mod load;
pub mod release;

pub use describe::{DescribeResidencyCommand, PartitionResidency, ResidencyReport};
pub use executor::CommandExecutor;
pub use load::LoadCollectionCommand;
pub use release::ReleaseCollectionCommand;

use crate::cache::controller::{CacheController, ForceReport};
use crate::catalog::accessor::MetadataAccessor;
use crate::catalog::memory::MemoryCatalog;
use crate::catalog::schema::{PartitionTagSet, RootCollection};
use crate::catalog::segments::SegmentEnumerator;
use crate::catalog::validation::{validate_collection_name, validate_partition_tags};
use crate::core::error::{Status, TesseraError, TesseraResult};
use crate::ops::failpoints::FailPoints;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    LoadCollection,
    ReleaseCollection,
    DescribeResidency,
}

impl CommandKind {
    /// Stable snake_case name, used in metric names and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadCollection => "load_collection",
            Self::ReleaseCollection => "release_collection",
            Self::DescribeResidency => "describe_residency",
        }
    }

    /// Whether commands of this kind change cache residency.
    pub fn mutates_cache(self) -> bool {
        !matches!(self, Self::DescribeResidency)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommandState {
    Created,
    Validating,
    Executing,
    Succeeded,
    Failed,
}

impl CommandState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether `next` is a legal transition from this state.
    ///
    /// Transitions only move forward, terminal states are final, and
    /// `Succeeded` is reachable only from `Executing`.
    pub fn can_advance_to(self, next: CommandState) -> bool {
        if self.is_terminal() || next <= self {
            return false;
        }
        match next {
            Self::Succeeded => self == Self::Executing,
            _ => true,
        }
    }
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Request context propagated from the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Request ID for correlation.
    pub request_id: String,

    /// Client identifier, when the front end knows one.
    pub client_id: Option<String>,

    /// Trace ID for distributed tracing.
    pub trace_id: Option<String>,
}

impl RequestContext {
    /// Create a context with a fresh process-unique request id.
    pub fn new() -> Self {
        let seq = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        Self::with_request_id(format!("req-{seq:08}"))
    }

    /// Create a context with a caller-chosen request id.
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            client_id: None,
            trace_id: None,
        }
    }

    /// Set client identifier.
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set trace context.
    pub fn with_trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Collaborators a command runs against.
#[derive(Clone)]
pub struct CommandEnv {
    accessor: Arc<dyn MetadataAccessor>,
    enumerator: Arc<dyn SegmentEnumerator>,
    cache: Arc<CacheController>,
    failpoints: Arc<FailPoints>,
}

impl CommandEnv {
    /// Create an environment from separate collaborators.
    pub fn new(
        accessor: Arc<dyn MetadataAccessor>,
        enumerator: Arc<dyn SegmentEnumerator>,
        cache: Arc<CacheController>,
    ) -> Self {
        Self {
            accessor,
            enumerator,
            cache,
            failpoints: Arc::new(FailPoints::new()),
        }
    }

    /// Create an environment backed by one in-memory catalog.
    pub fn from_catalog(catalog: Arc<MemoryCatalog>, cache: Arc<CacheController>) -> Self {
        Self::new(catalog.clone(), catalog, cache)
    }

    /// Use a shared fail point registry.
    pub fn with_failpoints(mut self, failpoints: Arc<FailPoints>) -> Self {
        self.failpoints = failpoints;
        self
    }

    pub fn accessor(&self) -> &Arc<dyn MetadataAccessor> {
        &self.accessor
    }

    pub fn enumerator(&self) -> &Arc<dyn SegmentEnumerator> {
        &self.enumerator
    }

    pub fn cache(&self) -> &Arc<CacheController> {
        &self.cache
    }

    pub fn failpoints(&self) -> &Arc<FailPoints> {
        &self.failpoints
    }
}

impl std::fmt::Debug for CommandEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEnv")
            .field("cache", &self.cache)
            .field("failpoints", &self.failpoints)
            .finish_non_exhaustive()
    }
}

/// A validated lifecycle target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub collection: RootCollection,
    pub tags: PartitionTagSet,
}

/// Validate arguments and resolve the target root collection.
///
/// Syntax errors are reported before the metadata accessor is called.
pub fn resolve_target(
    env: &CommandEnv,
    collection: &str,
    partition_tags: &[String],
) -> TesseraResult<Target> {
    validate_collection_name(collection)?;
    let tags = validate_partition_tags(partition_tags)?;

    let schema = env.accessor().describe_collection(collection)?;
    let collection = schema.classify().into_lifecycle_target()?;
    Ok(Target { collection, tags })
}

/// Successful command output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandOutput {
    Loaded(ForceReport),
    Released(ForceReport),
    Residency(ResidencyReport),
}

/// Final, caller-facing result of a command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub request_id: String,
    pub kind: CommandKind,
    pub collection: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<CommandOutput>,
    /// Wall time from entry to first return.
    pub elapsed_ms: f64,
}

impl CommandOutcome {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// State shared by every command kind.
#[derive(Debug)]
pub struct CommandCore {
    context: RequestContext,
    collection: String,
    partition_tags: Vec<String>,
    state: CommandState,
    outcome: Option<CommandOutcome>,
}

impl CommandCore {
    pub fn new(
        context: RequestContext,
        collection: impl Into<String>,
        partition_tags: Vec<String>,
    ) -> Self {
        Self {
            context,
            collection: collection.into(),
            partition_tags,
            state: CommandState::Created,
            outcome: None,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Collection name as requested.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Partition tags as requested, before validation.
    pub fn partition_tags(&self) -> &[String] {
        &self.partition_tags
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    /// Recorded outcome, once terminal.
    pub fn outcome(&self) -> Option<&CommandOutcome> {
        self.outcome.as_ref()
    }

    /// Move to `next`, rejecting backward or out-of-order transitions.
    pub fn advance(&mut self, next: CommandState) -> TesseraResult<()> {
        if !self.state.can_advance_to(next) {
            return Err(TesseraError::unexpected(format!(
                "illegal command state transition {:?} -> {:?}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Label used for timing and logs.
    pub fn header(&self, kind: CommandKind) -> String {
        if self.partition_tags.is_empty() {
            format!("{kind}(collection={})", self.collection)
        } else {
            format!(
                "{kind}(collection={}, partitions=[{}])",
                self.collection,
                self.partition_tags.join(", ")
            )
        }
    }

    /// Enter the terminal state for `result` and record the outcome.
    pub(crate) fn finish(
        &mut self,
        kind: CommandKind,
        result: TesseraResult<CommandOutput>,
        elapsed_ms: f64,
    ) -> &CommandOutcome {
        let (state, status, output) = match result {
            Ok(output) => (CommandState::Succeeded, Status::ok(), Some(output)),
            Err(err) => (CommandState::Failed, Status::from_error(&err), None),
        };
        debug_assert!(self.state.can_advance_to(state));
        self.state = state;

        self.outcome.insert(CommandOutcome {
            request_id: self.context.request_id.clone(),
            kind,
            collection: self.collection.clone(),
            status,
            output,
            elapsed_ms,
        })
    }
}

/// A lifecycle command.
///
/// Implementations supply the kind-specific execution step; validation is
/// shared through [`resolve_target`].
pub trait LifecycleCommand: Send {
    fn kind(&self) -> CommandKind;

    fn core(&self) -> &CommandCore;

    fn core_mut(&mut self) -> &mut CommandCore;

    /// Check arguments and resolve the target. Must not touch the cache.
    fn validate(&self, env: &CommandEnv) -> TesseraResult<Target> {
        let core = self.core();
        resolve_target(env, core.collection(), core.partition_tags())
    }

    /// Resolve segments and apply the command to the cache.
    fn apply(&self, env: &CommandEnv, target: &Target) -> TesseraResult<CommandOutput>;

    /// Run through `executor`. A second call returns the recorded outcome.
    fn execute(&mut self, executor: &CommandExecutor) -> CommandOutcome
    where
        Self: Sized,
    {
        executor.execute(self)
    }
}

/// Kind-tagged request, as handed over by a front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRequest {
    pub kind: CommandKind,
    pub collection: String,
    #[serde(default)]
    pub partition_tags: Vec<String>,
}

impl LifecycleRequest {
    pub fn new(kind: CommandKind, collection: impl Into<String>, partition_tags: Vec<String>) -> Self {
        Self {
            kind,
            collection: collection.into(),
            partition_tags,
        }
    }

    /// Build the command object for this request.
    pub fn into_command(self, context: RequestContext) -> Box<dyn LifecycleCommand> {
        match self.kind {
            CommandKind::LoadCollection => Box::new(LoadCollectionCommand::new(
                context,
                self.collection,
                self.partition_tags,
            )),
            CommandKind::ReleaseCollection => Box::new(ReleaseCollectionCommand::new(
                context,
                self.collection,
                self.partition_tags,
            )),
            CommandKind::DescribeResidency => Box::new(DescribeResidencyCommand::new(
                context,
                self.collection,
                self.partition_tags,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_only_move_forward() {
        use CommandState::*;
        assert!(Created.can_advance_to(Validating));
        assert!(Validating.can_advance_to(Executing));
        assert!(Validating.can_advance_to(Failed));
        assert!(Executing.can_advance_to(Succeeded));
        assert!(!Validating.can_advance_to(Succeeded));
        assert!(!Executing.can_advance_to(Validating));
        assert!(!Succeeded.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Failed));
    }

    #[test]
    fn advance_rejects_illegal_transitions() {
        let mut core = CommandCore::new(RequestContext::with_request_id("r1"), "c1", vec![]);
        core.advance(CommandState::Validating).unwrap();
        let err = core.advance(CommandState::Created).unwrap_err();
        assert!(matches!(err, TesseraError::Unexpected { .. }));
        assert_eq!(core.state(), CommandState::Validating);
    }

    #[test]
    fn header_names_collection_and_partitions() {
        let core = CommandCore::new(
            RequestContext::with_request_id("r1"),
            "c1",
            vec!["p1".into(), "p2".into()],
        );
        assert_eq!(
            core.header(CommandKind::ReleaseCollection),
            "release_collection(collection=c1, partitions=[p1, p2])"
        );
    }

    #[test]
    fn request_ids_are_unique() {
        let a = RequestContext::new();
        let b = RequestContext::new();
        assert_ne!(a.request_id, b.request_id);
    }
}
