//! Elapsed-time measurement for request diagnostics.
//!
//! A [`TimeRecorder`] starts timing when it is created and reports when it
//! is finished or dropped, whichever comes first. Because the report also
//! happens on drop, every return path of the timed scope is covered,
//! including early validation failures.

use std::time::{Duration, Instant};

/// Scoped wall-clock timer.
#[derive(Debug)]
pub struct TimeRecorder {
    /// Header identifying the timed work in log output.
    header: String,

    /// When timing started.
    started: Instant,

    /// Set once the measurement has been reported.
    finished: bool,
}

impl TimeRecorder {
    /// Start timing the work described by `header`.
    pub fn start(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            started: Instant::now(),
            finished: false,
        }
    }

    /// Header this recorder was created with.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Time elapsed so far.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop timing and return the total elapsed time.
    pub fn finish(mut self) -> Duration {
        let elapsed = self.started.elapsed();
        self.report(elapsed);
        elapsed
    }

    fn report(&mut self, elapsed: Duration) {
        if self.finished {
            return;
        }
        self.finished = true;
        tracing::debug!(
            header = %self.header,
            elapsed_us = elapsed.as_micros() as u64,
            "timed section complete"
        );
    }
}

impl Drop for TimeRecorder {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        self.report(elapsed);
    }
}

/// Convert a duration to fractional milliseconds.
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}
