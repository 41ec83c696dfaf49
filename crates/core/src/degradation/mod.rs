//! Graceful degradation for the Auralis client
//!
//! When recovery alone cannot restore a subsystem, the client reduces
//! functionality in controlled steps instead of failing outright. This
//! module owns:
//! - the ordered [`DegradationLevel`] ladder and the [`FeatureCategory`] set
//!   strategies can disable
//! - the [`StrategyCatalog`]: built-in strategies keyed by error category
//!   and severity, contextual overrides, and severity fallbacks
//! - the [`DegradationEngine`]: applies strategies all-or-nothing, tracks
//!   the process-wide state, rolls back best-effort, and notifies listeners
//!
//! The level ladder is monotonic while degraded: a strategy that would
//! lower the current level is ignored, and only an explicit
//! [`DegradationEngine::attempt_recovery`] returns the client to full
//! function.

pub mod action;
pub mod engine;
pub mod strategy;

pub use action::{ActionKind, ActionRef, FallbackAction, FnAction};
pub use engine::{
    DegradationChange, DegradationEngine, DegradationListener, DegradationSnapshot, SubscriptionId,
};
pub use strategy::{DegradationLevel, DegradationStrategy, FeatureCategory, StrategyCatalog};
