//! Metadata accessor contract.

use crate::catalog::schema::CollectionSchema;
use crate::core::error::MetaError;

/// Read access to the persistent metadata store.
///
/// Lookups must report a missing collection as [`MetaError::NotFound`] and
/// every other failure as a different variant, so that commands can pick
/// the right status code.
pub trait MetadataAccessor: Send + Sync {
    /// Describe a collection by name.
    fn describe_collection(&self, name: &str) -> Result<CollectionSchema, MetaError>;

    /// Partition tags of a root collection, in creation order.
    ///
    /// The default partition is implicit and not listed.
    fn partition_tags(&self, collection: &str) -> Result<Vec<String>, MetaError>;

    /// Check whether a collection exists.
    fn has_collection(&self, name: &str) -> Result<bool, MetaError> {
        match self.describe_collection(name) {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }
}
