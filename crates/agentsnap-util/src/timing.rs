//! RAII-based timing for long-running operations.
//!
//! ```rust,ignore
//! use agentsnap_util::timing::TimingGuard;
//!
//! fn capture() {
//!     let _timing = TimingGuard::capture("~/.agent");
//!     // walk and hash ...
//! }
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// RAII guard that logs the elapsed time of an operation when dropped.
pub struct TimingGuard {
    operation_type: &'static str,
    operation_name: String,
    start: Instant,
    /// At or above this, the completion is logged at info level.
    info_threshold: Duration,
    /// At or above this, the completion is logged as slow.
    warn_threshold: Duration,
}

impl TimingGuard {
    pub fn new(operation_type: &'static str, operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        debug!(
            operation_type = operation_type,
            operation_name = %operation_name,
            "Starting operation"
        );
        Self {
            operation_type,
            operation_name,
            start: Instant::now(),
            info_threshold: Duration::from_millis(250),
            warn_threshold: Duration::from_secs(30),
        }
    }

    /// Guard for a snapshot capture (walk + hash).
    pub fn capture(name: impl Into<String>) -> Self {
        Self::new("capture", name)
    }

    /// Guard for a comparison between two points in time.
    pub fn compare(name: impl Into<String>) -> Self {
        Self::new("compare", name)
    }

    pub fn with_info_threshold(mut self, threshold: Duration) -> Self {
        self.info_threshold = threshold;
        self
    }

    pub fn with_warn_threshold(mut self, threshold: Duration) -> Self {
        self.warn_threshold = threshold;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {:.1}s", ms / 60_000, (ms % 60_000) as f64 / 1000.0)
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let duration = format_duration(elapsed);
        let duration_ms = elapsed.as_millis() as u64;

        if elapsed >= self.warn_threshold {
            warn!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                duration = %duration,
                "Slow operation completed"
            );
        } else if elapsed >= self.info_threshold {
            info!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                duration = %duration,
                "Operation completed"
            );
        } else {
            debug!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                duration = %duration,
                "Operation completed"
            );
        }
    }
}
