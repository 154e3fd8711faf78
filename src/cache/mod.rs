//! Segment serving cache.
//!
//! - [`residency`] - resident segment set and reader handles
//! - [`eviction`] - LRU victim selection for the ordinary path
//! - [`controller`] - [`CacheController`], the single writer of residency

pub mod controller;
pub mod eviction;
pub mod residency;

pub use controller::{CacheController, CacheStats, ForceReport};
pub use eviction::EvictionReport;
pub use residency::{ResidentSegment, SegmentHandle};
