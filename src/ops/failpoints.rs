//! Named fault-injection points.
//!
//! Commands evaluate fail points at fixed places in their execution. A point
//! does nothing unless armed; an armed point either returns an
//! `Unexpected` error or panics, which exercises the executor's
//! catch-and-convert boundary.

use crate::core::error::{TesseraError, TesseraResult};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Release: fail after segment resolution, before the cache is touched.
pub const RELEASE_CACHE_FAIL: &str = "release_collection.cache_fail";
/// Release: fail after the cache released the segments.
pub const RELEASE_AFTER_CACHE: &str = "release_collection.after_cache";
/// Release: panic inside command execution.
pub const RELEASE_PANIC: &str = "release_collection.panic";
/// Load: fail after segment resolution, before the cache is touched.
pub const LOAD_CACHE_FAIL: &str = "load_collection.cache_fail";
/// Load: fail after the cache loaded the segments.
pub const LOAD_AFTER_CACHE: &str = "load_collection.after_cache";
/// Load: panic inside command execution.
pub const LOAD_PANIC: &str = "load_collection.panic";
/// Describe: panic inside command execution.
pub const DESCRIBE_PANIC: &str = "describe_residency.panic";

/// Every fail point a command evaluates.
pub const ALL: &[&str] = &[
    RELEASE_CACHE_FAIL,
    RELEASE_AFTER_CACHE,
    RELEASE_PANIC,
    LOAD_CACHE_FAIL,
    LOAD_AFTER_CACHE,
    LOAD_PANIC,
    DESCRIBE_PANIC,
];

/// What an armed fail point does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAction {
    /// Return an `Unexpected` error.
    Error,
    /// Panic.
    Panic,
}

/// Registry of armed fail points.
#[derive(Debug, Default)]
pub struct FailPoints {
    armed: RwLock<HashMap<String, FailAction>>,
}

impl FailPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fail point.
    pub fn arm(&self, name: &str, action: FailAction) {
        tracing::warn!(failpoint = name, ?action, "fail point armed");
        self.armed.write().insert(name.to_string(), action);
    }

    /// Disarm a fail point.
    pub fn disarm(&self, name: &str) {
        self.armed.write().remove(name);
    }

    /// Disarm every fail point.
    pub fn clear(&self) {
        self.armed.write().clear();
    }

    pub fn is_armed(&self, name: &str) -> bool {
        self.armed.read().contains_key(name)
    }

    /// Evaluate a fail point.
    pub fn eval(&self, name: &str) -> TesseraResult<()> {
        let action = self.armed.read().get(name).copied();
        match action {
            None => Ok(()),
            Some(FailAction::Error) => Err(TesseraError::unexpected(format!(
                "fail point {name} triggered"
            ))),
            Some(FailAction::Panic) => panic!("fail point {name} triggered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unarmed_points_pass() {
        let points = FailPoints::new();
        for name in ALL {
            assert!(points.eval(name).is_ok());
        }
    }

    #[test]
    fn armed_error_point_returns_unexpected() {
        let points = FailPoints::new();
        points.arm(RELEASE_CACHE_FAIL, FailAction::Error);
        let err = points.eval(RELEASE_CACHE_FAIL).unwrap_err();
        assert!(matches!(err, TesseraError::Unexpected { .. }));
        points.disarm(RELEASE_CACHE_FAIL);
        assert!(points.eval(RELEASE_CACHE_FAIL).is_ok());
    }

    #[test]
    #[should_panic(expected = "fail point load_collection.panic triggered")]
    fn armed_panic_point_panics() {
        let points = FailPoints::new();
        points.arm(LOAD_PANIC, FailAction::Panic);
        let _ = points.eval(LOAD_PANIC);
    }
}
