//! Recovery and degradation layer for the Auralis client.
//!
//! This crate owns the domain side of the resilience stack:
//! - `context`: device, network, and battery snapshots plus user preferences
//! - `degradation`: the strategy catalog and the engine that applies and
//!   rolls back controlled functionality reductions
//! - `recovery`: the orchestrator that sequences degradation and
//!   breaker-protected recovery actions for a classified error
//!
//! The generic primitives (circuit breaker, retry, error taxonomy) live in
//! `auralis-common`; everything here is built on top of them and wired
//! together by explicit dependency injection.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod context;
pub mod degradation;
pub mod recovery;

// Re-export commonly used types for convenience
// ------------------------
pub use context::{
    CapabilityProvider, DegradationContext, DeviceProfile, MemoryPressure, NetworkCondition,
    StaticCapabilities, UserPreferences,
};
pub use degradation::{
    ActionKind, DegradationChange, DegradationEngine, DegradationLevel, DegradationListener,
    DegradationSnapshot, DegradationStrategy, FallbackAction, FeatureCategory, FnAction,
    StrategyCatalog, SubscriptionId,
};
pub use recovery::{
    RecoveryActionHandler, RecoveryConfig, RecoveryContext, RecoveryMetrics, RecoveryOrchestrator,
};
