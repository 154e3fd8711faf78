//! Force-load a collection's segments into the cache.

use crate::commands::{
    CommandCore, CommandEnv, CommandKind, CommandOutput, LifecycleCommand, RequestContext, Target,
};
use crate::core::error::TesseraResult;
use crate::ops::failpoints;

/// `LoadCollection(collection, partition_tags)`.
///
/// Force-loads every segment of the root collection within the tag scope,
/// regardless of cache capacity. Loaded segments are held until a release
/// names them.
#[derive(Debug)]
pub struct LoadCollectionCommand {
    core: CommandCore,
}

impl LoadCollectionCommand {
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

impl LifecycleCommand for LoadCollectionCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::LoadCollection
    }

    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn apply(&self, env: &CommandEnv, target: &Target) -> TesseraResult<CommandOutput> {
        env.failpoints().eval(failpoints::LOAD_PANIC)?;

        let segments = env
            .enumerator()
            .segments(&target.collection, &target.tags)?;

        env.failpoints().eval(failpoints::LOAD_CACHE_FAIL)?;
        let report = env.cache().force_load(&segments)?;
        env.failpoints().eval(failpoints::LOAD_AFTER_CACHE)?;

        tracing::info!(
            collection = %target.collection,
            partitions = %target.tags,
            loaded = report.changed,
            already_resident = report.unchanged,
            bytes = report.bytes,
            "collection loaded"
        );
        Ok(CommandOutput::Loaded(report))
    }
}
