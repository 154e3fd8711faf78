//! Release a collection's segments from the cache.

use crate::catalog::segments::SegmentId;
use crate::commands::{
    CommandCore, CommandEnv, CommandKind, CommandOutput, LifecycleCommand, RequestContext, Target,
};
use crate::core::error::TesseraResult;
use crate::ops::failpoints;

/// `ReleaseCollection(collection, partition_tags)`.
///
/// Force-releases every segment of the root collection within the tag
/// scope. An empty tag list releases the whole collection. Releasing
/// segments that are not resident succeeds without effect.
#[derive(Debug)]
pub struct ReleaseCollectionCommand {
    core: CommandCore,
}

impl ReleaseCollectionCommand {
    pub fn new(
        context: RequestContext,
        collection: impl Into<String>,
        partition_tags: Vec<String>,
    ) -> Self {
        Self {
            core: CommandCore::new(context, collection, partition_tags),
        }
    }
}

impl LifecycleCommand for ReleaseCollectionCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::ReleaseCollection
    }

    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn apply(&self, env: &CommandEnv, target: &Target) -> TesseraResult<CommandOutput> {
        env.failpoints().eval(failpoints::RELEASE_PANIC)?;

        let segments = env
            .enumerator()
            .segments(&target.collection, &target.tags)?;
        let ids: Vec<SegmentId> = segments.iter().map(|s| s.id).collect();

        env.failpoints().eval(failpoints::RELEASE_CACHE_FAIL)?;
        let report = env.cache().force_release(&ids)?;
        env.failpoints().eval(failpoints::RELEASE_AFTER_CACHE)?;

        tracing::info!(
            collection = %target.collection,
            partitions = %target.tags,
            released = report.changed,
            not_resident = report.unchanged,
            bytes = report.bytes,
            "collection released"
        );
        Ok(CommandOutput::Released(report))
    }
}
