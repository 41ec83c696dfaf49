//! Recovery orchestration
//!
//! The orchestrator is the entry point of the resilience stack: callers
//! hand it a classified error and get back a boolean outcome. Internally it
//! sequences degradation (for high-impact failures), runs the error's
//! automatic recovery actions through the per-category circuit breaker, and
//! keeps cumulative metrics. See [`RecoveryOrchestrator`].

pub mod handlers;
pub mod metrics;
pub mod orchestrator;

use std::time::Instant;

use auralis_common::{ErrorCategory, ErrorSeverity};

use crate::context::DeviceProfile;
use crate::degradation::DegradationLevel;

pub use handlers::{DefaultActionHandlers, RecoveryActionHandler};
pub use metrics::RecoveryMetrics;
pub use orchestrator::{RecoveryConfig, RecoveryOrchestrator, RecoveryOrchestratorBuilder};

/// Snapshot taken at the start of one recovery cycle.
///
/// Transient: created when `execute_recovery` begins and dropped when it
/// resolves.
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    /// Whether the triggering error classified itself as retryable.
    pub retryable: bool,
    /// Monotone cycle counter across the orchestrator's lifetime.
    pub attempt_number: u64,
    /// Degradation level observed when the cycle started.
    pub degradation_level: DegradationLevel,
    /// Device capabilities observed when the cycle started.
    pub device: DeviceProfile,
    pub started_at: Instant,
}

impl RecoveryContext {
    /// Time elapsed since this recovery cycle started.
    pub fn total_elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
