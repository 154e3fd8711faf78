//! Report cache residency for a collection.

use crate::catalog::schema::DEFAULT_PARTITION_TAG;
use crate::catalog::segments::SegmentId;
use crate::commands::{
    CommandCore, CommandEnv, CommandKind, CommandOutput, LifecycleCommand, RequestContext, Target,
};
use crate::core::error::TesseraResult;
use crate::ops::failpoints;
use serde::Serialize;

/// Residency of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionResidency {
    pub tag: String,
    pub resident_segments: usize,
    pub total_segments: usize,
    pub resident_bytes: u64,
    pub total_bytes: u64,
}

impl PartitionResidency {
    fn empty(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            resident_segments: 0,
            total_segments: 0,
            resident_bytes: 0,
            total_bytes: 0,
        }
    }

    /// Whether every segment of the partition is resident.
    pub fn is_fully_resident(&self) -> bool {
        self.resident_segments == self.total_segments
    }
}

/// Residency of a collection within a tag scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidencyReport {
    pub collection: String,
    pub partitions: Vec<PartitionResidency>,
    pub resident_segments: usize,
    pub total_segments: usize,
    pub resident_bytes: u64,
}

impl ResidencyReport {
    pub fn partition(&self, tag: &str) -> Option<&PartitionResidency> {
        self.partitions.iter().find(|p| p.tag == tag)
    }

    pub fn is_fully_resident(&self) -> bool {
        self.resident_segments == self.total_segments
    }
}

/// `DescribeResidency(collection, partition_tags)`.
///
/// Read-only: reports per-partition resident and total segment counts.
/// With an empty tag list every partition is listed, the default one
/// first; otherwise the requested tags are listed in request order.
#[derive(Debug)]
pub struct DescribeResidencyCommand {
    core: CommandCore,
}

impl DescribeResidencyCommand {
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

impl LifecycleCommand for DescribeResidencyCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::DescribeResidency
    }

    fn core(&self) -> &CommandCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CommandCore {
        &mut self.core
    }

    fn apply(&self, env: &CommandEnv, target: &Target) -> TesseraResult<CommandOutput> {
        env.failpoints().eval(failpoints::DESCRIBE_PANIC)?;

        let name = target.collection.name();
        let tags: Vec<String> = if target.tags.is_whole_collection() {
            std::iter::once(DEFAULT_PARTITION_TAG.to_string())
                .chain(env.accessor().partition_tags(name)?)
                .collect()
        } else {
            target.tags.tags().to_vec()
        };
        let mut partitions: Vec<PartitionResidency> =
            tags.into_iter().map(PartitionResidency::empty).collect();

        let segments = env
            .enumerator()
            .segments(&target.collection, &target.tags)?;
        let ids: Vec<SegmentId> = segments.iter().map(|s| s.id).collect();
        let resident = env.cache().resident_subset(&ids);

        for segment in &segments {
            let index = match partitions.iter().position(|p| p.tag == segment.partition_tag) {
                Some(index) => index,
                None => {
                    partitions.push(PartitionResidency::empty(segment.partition_tag.clone()));
                    partitions.len() - 1
                }
            };
            let entry = &mut partitions[index];
            entry.total_segments += 1;
            entry.total_bytes = entry.total_bytes.saturating_add(segment.size_bytes);
            if resident.contains(&segment.id) {
                entry.resident_segments += 1;
                entry.resident_bytes = entry.resident_bytes.saturating_add(segment.size_bytes);
            }
        }

        // Recorded sizes are catalog data and may be arbitrarily large.
        let report = ResidencyReport {
            collection: name.to_string(),
            resident_segments: partitions.iter().map(|p| p.resident_segments).sum(),
            total_segments: partitions.iter().map(|p| p.total_segments).sum(),
            resident_bytes: partitions
                .iter()
                .fold(0u64, |total, p| total.saturating_add(p.resident_bytes)),
            partitions,
        };
        Ok(CommandOutput::Residency(report))
    }
}
