//! Cumulative recovery metrics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters for every recovery cycle the orchestrator has run.
///
/// All counters are monotone and owned by the orchestrator; external
/// readers only ever see cloned snapshots.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryMetrics {
    pub total_attempts: u64,
    pub successful_recoveries: u64,
    pub failed_recoveries: u64,
    /// Running mean duration of successful recoveries.
    pub average_recovery_time: Duration,
    /// Recoveries rejected by an open circuit breaker.
    pub circuit_breaker_activations: u64,
    /// Recoveries that applied a degradation strategy.
    pub degradation_activations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_recovery_time: Option<DateTime<Utc>>,
}

impl RecoveryMetrics {
    /// Record a successful recovery and fold its duration into the running
    /// mean.
    pub fn record_success(&mut self, elapsed: Duration) {
        self.successful_recoveries += 1;
        let n = self.successful_recoveries as u128;
        let previous = self.average_recovery_time.as_nanos();
        let updated = (previous * (n - 1) + elapsed.as_nanos()) / n;
        self.average_recovery_time = Duration::from_nanos(updated as u64);
        self.last_recovery_time = Some(Utc::now());
    }

    /// Record a failed recovery.
    pub fn record_failure(&mut self) {
        self.failed_recoveries += 1;
    }

    /// Fraction of attempts that recovered, in `0.0..=1.0` (1.0 with no
    /// attempts).
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            1.0
        } else {
            self.successful_recoveries as f64 / self.total_attempts as f64
        }
    }
}
