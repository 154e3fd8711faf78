//! Storage layer.
//!
//! Segment payloads live outside the metadata catalog; this module reads
//! them for the cache controller and verifies their recorded checksums.

pub mod segment_store;

pub use segment_store::{
    segment_checksum, FileSegmentStore, MemorySegmentStore, SegmentLoader, StoreFault,
};
