//! Device, network, and preference snapshots consumed by the recovery core.
//!
//! The platform monitors (battery, network, memory) live outside this
//! workspace; they feed the core through [`CapabilityProvider`]. The core
//! never measures anything itself, it only consumes the snapshot taken at
//! the start of a recovery cycle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use auralis_common::{ErrorCategory, ErrorSeverity};

/// Observed network quality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkCondition {
    Excellent,
    Good,
    Fair,
    Poor,
    Offline,
}

impl NetworkCondition {
    /// Whether the connection is too constrained for full-quality streaming.
    pub fn is_constrained(&self) -> bool {
        matches!(self, Self::Fair | Self::Poor | Self::Offline)
    }
}

/// Observed memory pressure bucket, ordered from relaxed to critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressure {
    Normal,
    Moderate,
    High,
    Critical,
}

/// Point-in-time device capability snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Whether the device class is known to struggle with full quality.
    pub is_low_end: bool,
    /// Battery charge in `0.0..=1.0`, when the platform reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f32>,
    pub network_condition: NetworkCondition,
    pub memory_pressure: MemoryPressure,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            is_low_end: false,
            battery_level: None,
            network_condition: NetworkCondition::Good,
            memory_pressure: MemoryPressure::Normal,
        }
    }
}

/// User preferences that steer strategy selection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Prefer smooth playback over visual or audio quality.
    pub prefer_performance_over_quality: bool,
    /// Allow reducing transfer volume on constrained connections.
    pub allow_data_saving: bool,
    /// Allow switching to cached/offline content when the network drops.
    pub enable_offline_mode: bool,
}

/// Source of device capability snapshots.
///
/// Implemented by the platform monitor layer; the orchestrator takes one
/// snapshot per recovery cycle.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Current device capabilities.
    async fn snapshot(&self) -> DeviceProfile;
}

/// Fixed capability source for defaults and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    profile: DeviceProfile,
}

impl StaticCapabilities {
    pub fn new(profile: DeviceProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl CapabilityProvider for StaticCapabilities {
    async fn snapshot(&self) -> DeviceProfile {
        self.profile.clone()
    }
}

/// Input to one degradation decision.
///
/// Built by the recovery orchestrator from a classified error plus the
/// capability snapshot, or directly by callers that degrade without going
/// through recovery.
#[derive(Debug, Clone)]
pub struct DegradationContext {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    /// Subsystems the triggering error is known to affect.
    pub affected_systems: Vec<String>,
    pub device: DeviceProfile,
    pub preferences: UserPreferences,
}

impl DegradationContext {
    /// Create a context with default device and preferences.
    pub fn new(category: ErrorCategory, severity: ErrorSeverity) -> Self {
        Self {
            category,
            severity,
            affected_systems: Vec::new(),
            device: DeviceProfile::default(),
            preferences: UserPreferences::default(),
        }
    }

    pub fn with_device(mut self, device: DeviceProfile) -> Self {
        self.device = device;
        self
    }

    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn with_affected_systems(mut self, systems: Vec<String>) -> Self {
        self.affected_systems = systems;
        self
    }
}
