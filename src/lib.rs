//! Tessera - collection cache-lifecycle control for a segment-serving node.
//!
//! A serving node keeps immutable data segments of collections in a bounded
//! in-memory cache. Tessera is the control path that moves whole
//! collections, or named partitions of them, in and out of that cache:
//! `LoadCollection`, `ReleaseCollection` and `DescribeResidency`. Each
//! request is validated, resolved against catalog metadata, expanded into
//! segments and applied through the cache controller's forced operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 CLI / Runtime::dispatch (front end)             │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Command Executor                          │
//! │   validate → resolve → enumerate → apply │ timing │ audit │ panics │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │                                 │
//! ┌───────────────────────────────┐  ┌──────────────────────────────┐
//! │            Catalog            │  │       Cache Controller       │
//! │ Metadata Accessor │ Segments  │  │ ForceLoad │ ForceRelease │ LRU │
//! └───────────────────────────────┘  └──────────────────────────────┘
//!                                                   │
//!                                  ┌──────────────────────────────┐
//!                                  │   Segment store (files/mem)  │
//!                                  └──────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::runtime`] - Component wiring, preload, background eviction
//! - [`core::time`] - Elapsed-time measurement
//! - [`core::error`] - Error taxonomy and status mapping
//!
//! ## Catalog
//! - [`catalog::schema`] - Collection schemas and partition tag sets
//! - [`catalog::validation`] - Name and tag syntax checks
//! - [`catalog::accessor`] - Metadata accessor seam
//! - [`catalog::segments`] - Segment descriptors and the enumerator seam
//! - [`catalog::memory`] - In-memory catalog
//! - [`catalog::manifest`] - On-disk catalog manifest
//!
//! ## Cache
//! - [`cache::controller`] - Forced and ordinary cache operations
//! - [`cache::residency`] - Resident segment bookkeeping
//! - [`cache::eviction`] - LRU victim selection
//!
//! ## Commands
//! - [`commands`] - Lifecycle commands and request plumbing
//! - [`commands::executor`] - The catch-and-convert execution boundary
//!
//! ## Storage
//! - [`storage::segment_store`] - Segment loaders and checksums
//!
//! ## Operations
//! - [`ops::audit`] - Lifecycle request audit trail
//! - [`ops::observability`] - Metrics and health checks
//! - [`ops::failpoints`] - Named fault injection points
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations
//!
//! # Key Invariants
//!
//! - Lifecycle commands address root collections only; partitions are
//!   selected by tag.
//! - An empty tag list means the whole collection.
//! - Validation failures have no side effects.
//! - A load force-loads regardless of capacity; a release force-releases
//!   regardless of readers.
//! - Nothing a command does escapes the executor as a panic.

// Core infrastructure
pub mod core;

// Catalog metadata
pub mod catalog;

// Serving cache
pub mod cache;

// Lifecycle commands
pub mod commands;

// Segment storage
pub mod storage;

// Operations and observability
pub mod ops;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error, runtime, time};
pub use commands::{CommandExecutor, CommandKind, CommandOutcome, LifecycleRequest};
pub use ops::{audit, failpoints, observability};
