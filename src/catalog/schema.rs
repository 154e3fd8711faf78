//! Collection schema and lifecycle eligibility.
//!
//! The metadata store returns a flat [`CollectionSchema`]; a non-empty
//! `owner_collection` marks a partition sub-collection. Before any lifecycle
//! work the schema is classified into a [`Collection`], and only the
//! [`Collection::Root`] variant can produce the [`RootCollection`] that the
//! segment enumerator and lifecycle commands accept.

use crate::core::error::{TesseraError, TesseraResult};
use serde::{Deserialize, Serialize};

/// Tag addressing the untagged partition every root collection has.
pub const DEFAULT_PARTITION_TAG: &str = "_default";

/// Collection schema snapshot returned by the metadata accessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Unique collection name.
    pub name: String,

    /// Owning root collection; set only for partition sub-collections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_collection: Option<String>,

    /// Partition tag within the owner; set only for partition sub-collections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_tag: Option<String>,
}

impl CollectionSchema {
    /// Schema of a root collection.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_collection: None,
            partition_tag: None,
        }
    }

    /// Schema of a partition sub-collection.
    pub fn partition(
        name: impl Into<String>,
        owner: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            owner_collection: Some(owner.into()),
            partition_tag: Some(tag.into()),
        }
    }

    /// The owner, if this schema has a non-empty one.
    pub fn owner(&self) -> Option<&str> {
        self.owner_collection
            .as_deref()
            .filter(|owner| !owner.is_empty())
    }

    /// Whether this schema describes a partition sub-collection.
    pub fn is_partition(&self) -> bool {
        self.owner().is_some()
    }

    /// Classify the schema into a root or partition collection.
    pub fn classify(self) -> Collection {
        match self.owner() {
            Some(owner) => Collection::Partition(PartitionCollection {
                owner: owner.to_string(),
                tag: self.partition_tag.clone().unwrap_or_default(),
                name: self.name,
            }),
            None => Collection::Root(RootCollection { name: self.name }),
        }
    }
}

/// A classified collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection {
    /// Top-level collection; accepts lifecycle operations.
    Root(RootCollection),
    /// Internal partition of a root collection; not directly addressable.
    Partition(PartitionCollection),
}

impl Collection {
    /// Collection name.
    pub fn name(&self) -> &str {
        match self {
            Self::Root(root) => &root.name,
            Self::Partition(partition) => &partition.name,
        }
    }

    /// Obtain the lifecycle target, rejecting partition sub-collections.
    pub fn into_lifecycle_target(self) -> TesseraResult<RootCollection> {
        match self {
            Self::Root(root) => Ok(root),
            Self::Partition(partition) => Err(TesseraError::InvalidCollectionReference {
                collection: partition.name,
                owner: partition.owner,
            }),
        }
    }
}

/// A root collection, the only entity lifecycle operations accept.
///
/// Constructed only by classifying a schema, so holding one proves the
/// ownership check has passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootCollection {
    name: String,
}

impl RootCollection {
    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for RootCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A partition sub-collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionCollection {
    /// Sub-collection name.
    pub name: String,
    /// Owning root collection.
    pub owner: String,
    /// Partition tag within the owner.
    pub tag: String,
}

/// Ordered, duplicate-free partition tags scoping one request.
///
/// An empty set addresses the whole collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionTagSet {
    tags: Vec<String>,
}

impl PartitionTagSet {
    /// Build a tag set, dropping repeats and keeping first-occurrence order.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.into();
            if !out.contains(&tag) {
                out.push(tag);
            }
        }
        Self { tags: out }
    }

    /// The tag set addressing every partition.
    pub fn whole_collection() -> Self {
        Self::default()
    }

    /// Whether the request addresses the whole collection.
    pub fn is_whole_collection(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags in request order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Iterate tags in request order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Whether the set contains a tag.
    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

impl std::fmt::Display for PartitionTagSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.tags.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_owner_is_root() {
        let mut schema = CollectionSchema::root("c1");
        schema.owner_collection = Some(String::new());
        assert!(!schema.is_partition());
        assert!(matches!(schema.classify(), Collection::Root(_)));
    }

    #[test]
    fn partition_is_not_a_lifecycle_target() {
        let schema = CollectionSchema::partition("c1_p1", "c1", "p1");
        let err = schema.classify().into_lifecycle_target().unwrap_err();
        match err {
            TesseraError::InvalidCollectionReference { collection, owner } => {
                assert_eq!(collection, "c1_p1");
                assert_eq!(owner, "c1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tag_set_dedups_in_order() {
        let tags = PartitionTagSet::new(["p2", "p1", "p2", "p3", "p1"]);
        assert_eq!(tags.tags(), &["p2", "p1", "p3"]);
        assert_eq!(tags.to_string(), "[p2, p1, p3]");
        assert!(!tags.is_whole_collection());
        assert!(PartitionTagSet::whole_collection().is_whole_collection());
    }
}
