//! Core runtime infrastructure.
//!
//! This module contains the essential components for running Tessera:
//! - [`config`] - Configuration parsing and validation
//! - [`runtime`] - Component wiring, preload, and background eviction
//! - [`time`] - Elapsed-time measurement
//! - [`error`] - Error taxonomy and status mapping

pub mod config;
pub mod error;
pub mod runtime;
pub mod time;
