//! Degradation levels, feature categories, and the strategy catalog.
//!
//! A strategy bundles the functionality reductions appropriate for one class
//! of failure: which features go dark, which fallback actions run, and what
//! the user is told. The catalog owns the built-in strategies and the
//! selection rules that map a degradation context onto one of them.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use auralis_common::{ErrorCategory, ErrorSeverity};

use crate::context::DegradationContext;

use super::action::{stub, ActionKind, ActionRef};

/// Severity of functionality reduction, totally ordered.
///
/// Degradation never silently moves down this ladder; only explicit
/// recovery resets it to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradationLevel {
    /// Fully operational.
    None,
    /// Cosmetic reductions only.
    Minimal,
    /// Some features disabled.
    Moderate,
    /// Only core functionality guaranteed.
    Severe,
    /// Bare minimum to keep playback alive.
    Critical,
}

impl fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Minimal => write!(f, "minimal"),
            Self::Moderate => write!(f, "moderate"),
            Self::Severe => write!(f, "severe"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Client subsystem that a strategy can disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    AudioEffects,
    Visualization,
    HighQualityAudio,
    Spatialization,
    BackgroundProcessing,
    Recording,
    Streaming,
    UiAnimations,
}

impl FeatureCategory {
    /// Every feature, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::AudioEffects,
        Self::Visualization,
        Self::HighQualityAudio,
        Self::Spatialization,
        Self::BackgroundProcessing,
        Self::Recording,
        Self::Streaming,
        Self::UiAnimations,
    ];
}

/// One catalog entry: the reductions applied for a class of failure.
#[derive(Clone)]
pub struct DegradationStrategy {
    /// Stable identifier used for selection and reporting.
    pub id: String,
    pub level: DegradationLevel,
    pub description: String,
    /// Features unavailable while this strategy is active.
    pub affected_features: HashSet<FeatureCategory>,
    /// Ordered fallback actions; all must succeed for the strategy to
    /// commit.
    pub actions: Vec<ActionRef>,
    /// Shown to the user while the strategy is active.
    pub user_message: String,
    /// Shown to operators and logged.
    pub technical_details: String,
    /// Whether `attempt_recovery` is expected to restore full function.
    pub can_recover: bool,
    /// Estimated user impact, 0 (none) to 100 (unusable).
    pub estimated_impact: u8,
}

impl fmt::Debug for DegradationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DegradationStrategy")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("affected_features", &self.affected_features)
            .field("actions", &self.actions.len())
            .field("estimated_impact", &self.estimated_impact)
            .finish()
    }
}

impl DegradationStrategy {
    /// Start a strategy definition.
    pub fn new<S: Into<String>>(id: S, level: DegradationLevel) -> Self {
        Self {
            id: id.into(),
            level,
            description: String::new(),
            affected_features: HashSet::new(),
            actions: Vec::new(),
            user_message: String::new(),
            technical_details: String::new(),
            can_recover: true,
            estimated_impact: 0,
        }
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn affects(mut self, features: &[FeatureCategory]) -> Self {
        self.affected_features.extend(features.iter().copied());
        self
    }

    pub fn action(mut self, action: ActionRef) -> Self {
        self.actions.push(action);
        self
    }

    pub fn user_message<S: Into<String>>(mut self, message: S) -> Self {
        self.user_message = message.into();
        self
    }

    pub fn technical_details<S: Into<String>>(mut self, details: S) -> Self {
        self.technical_details = details.into();
        self
    }

    pub fn can_recover(mut self, can_recover: bool) -> Self {
        self.can_recover = can_recover;
        self
    }

    pub fn estimated_impact(mut self, impact: u8) -> Self {
        self.estimated_impact = impact.min(100);
        self
    }
}

/// Catalog of degradation strategies plus the selection rules.
#[derive(Debug, Clone)]
pub struct StrategyCatalog {
    strategies: HashMap<String, Arc<DegradationStrategy>>,
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        let mut catalog = Self { strategies: HashMap::new() };
        for strategy in builtin_strategies() {
            catalog.insert(strategy);
        }
        catalog
    }
}

impl StrategyCatalog {
    /// Create an empty catalog (applications that define every strategy
    /// themselves).
    pub fn empty() -> Self {
        Self { strategies: HashMap::new() }
    }

    /// Add or replace a strategy.
    pub fn insert(&mut self, strategy: DegradationStrategy) {
        self.strategies.insert(strategy.id.clone(), Arc::new(strategy));
    }

    /// Look up a strategy by id.
    pub fn get(&self, id: &str) -> Option<Arc<DegradationStrategy>> {
        self.strategies.get(id).cloned()
    }

    /// Number of registered strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Select the strategy for a degradation context.
    ///
    /// Selection order: exact `(category, severity)` match, then contextual
    /// override rules, then the generic severity fallback.
    pub fn select(&self, ctx: &DegradationContext) -> Option<Arc<DegradationStrategy>> {
        if let Some(id) = exact_match(ctx.category, ctx.severity) {
            if let Some(strategy) = self.get(id) {
                return Some(strategy);
            }
        }
        if let Some(id) = contextual_override(ctx) {
            if let Some(strategy) = self.get(id) {
                return Some(strategy);
            }
        }
        self.severity_fallback(ctx)
    }

    fn severity_fallback(&self, ctx: &DegradationContext) -> Option<Arc<DegradationStrategy>> {
        match ctx.severity {
            ErrorSeverity::Critical => self.get("critical_fallback"),
            ErrorSeverity::High => self.get("high_severity_fallback"),
            ErrorSeverity::Medium => {
                if ctx.device.is_low_end {
                    self.get("low_end_device")
                } else {
                    self.get("moderate_fallback")
                }
            }
            ErrorSeverity::Low => self.get(&format!("{}_low", ctx.category.as_str())),
        }
    }
}

/// Exact strategy assignment per (category, severity). A `None` arm falls
/// through to the contextual and severity rules.
fn exact_match(category: ErrorCategory, severity: ErrorSeverity) -> Option<&'static str> {
    use ErrorCategory as C;
    use ErrorSeverity as S;
    match (category, severity) {
        (C::AudioContext, S::Critical) => Some("audio_context_critical"),
        (C::AudioContext, S::High) => Some("audio_context_high"),
        (C::Performance, S::Critical) => Some("performance_critical"),
        (C::Performance, S::High) => Some("performance_high"),
        (C::Resource, S::Critical | S::High) => Some("resource_pressure"),
        (C::Network, S::Critical) => Some("network_outage"),
        (C::Network, S::High) => Some("network_limited"),
        (C::Mobile, S::Critical | S::High) => Some("battery_saver"),
        (
            C::AudioContext
            | C::Performance
            | C::Resource
            | C::Network
            | C::Mobile
            | C::Validation
            | C::Configuration
            | C::Compatibility
            | C::Security
            | C::Unknown,
            _,
        ) => None,
    }
}

/// Preference- and device-driven overrides, checked in declaration order.
fn contextual_override(ctx: &DegradationContext) -> Option<&'static str> {
    if ctx.preferences.enable_offline_mode && ctx.category == ErrorCategory::Network {
        return Some("network_outage");
    }
    if ctx.device.is_low_end && ctx.severity == ErrorSeverity::Medium {
        return Some("low_end_device");
    }
    if ctx.preferences.prefer_performance_over_quality && ctx.category == ErrorCategory::Performance
    {
        return Some("performance_aggressive");
    }
    if ctx.preferences.allow_data_saving
        && ctx.device.network_condition.is_constrained()
        && ctx.category == ErrorCategory::Network
    {
        return Some("network_limited");
    }
    None
}

fn builtin_strategies() -> Vec<DegradationStrategy> {
    use ActionKind as K;
    use FeatureCategory as F;

    let mut strategies = vec![
        DegradationStrategy::new("audio_context_critical", DegradationLevel::Severe)
            .description("Audio context is unusable; fall back to the basic output path")
            .affects(&[F::AudioEffects, F::Spatialization, F::HighQualityAudio])
            .action(stub(K::Fallback, "output_path", "switch to the basic stereo output path"))
            .action(stub(K::Simplify, "mixer_graph", "collapse the mixer graph to passthrough"))
            .user_message("Audio is running in compatibility mode.")
            .technical_details("AudioContext setup failed; basic output path active")
            .estimated_impact(70),
        DegradationStrategy::new("audio_context_high", DegradationLevel::Moderate)
            .description("Audio context is degraded; shed the expensive processing")
            .affects(&[F::AudioEffects, F::Spatialization])
            .action(stub(K::Simplify, "effects_chain", "drop convolution and modulation effects"))
            .action(stub(K::Reduce, "voice_count", "halve the polyphony ceiling"))
            .user_message("Some audio effects are temporarily disabled.")
            .technical_details("AudioContext under pressure; effects chain simplified")
            .estimated_impact(45),
        DegradationStrategy::new("performance_critical", DegradationLevel::Severe)
            .description("Rendering cannot keep up; audio continuity takes priority")
            .affects(&[F::Visualization, F::UiAnimations, F::AudioEffects, F::BackgroundProcessing])
            .action(stub(K::Disable, "visualizer", "stop the visualizer"))
            .action(stub(K::Reduce, "render_frame_rate", "cap rendering at 15 fps"))
            .action(stub(K::Simplify, "effects_chain", "bypass non-essential effects"))
            .user_message("Visuals are paused to keep audio smooth.")
            .technical_details("Sustained frame deadline misses; renderer shed")
            .estimated_impact(65),
        DegradationStrategy::new("performance_high", DegradationLevel::Moderate)
            .description("Rendering is strained; lower the visual load")
            .affects(&[F::Visualization, F::UiAnimations])
            .action(stub(K::Reduce, "render_frame_rate", "cap rendering at 30 fps"))
            .action(stub(K::Simplify, "visualizer", "switch to the lightweight visualizer"))
            .user_message("Visual quality is reduced to keep audio smooth.")
            .technical_details("Frame deadline misses above threshold")
            .estimated_impact(40),
        DegradationStrategy::new("performance_aggressive", DegradationLevel::Severe)
            .description("User prefers performance; shed quality eagerly")
            .affects(&[F::Visualization, F::UiAnimations, F::HighQualityAudio])
            .action(stub(K::Disable, "visualizer", "stop the visualizer"))
            .action(stub(K::Reduce, "render_frame_rate", "cap rendering at 15 fps"))
            .action(stub(K::Reduce, "sample_rate", "drop to the power-saving sample rate"))
            .user_message("Performance mode is on; visuals and audio quality are reduced.")
            .technical_details("performance-over-quality preference active")
            .estimated_impact(55),
        DegradationStrategy::new("resource_pressure", DegradationLevel::Severe)
            .description("Memory or handles are running out; shed background load")
            .affects(&[F::BackgroundProcessing, F::Recording, F::Visualization])
            .action(stub(K::Cache, "sample_library", "evict cold samples from memory"))
            .action(stub(K::Reduce, "buffer_pool", "shrink the audio buffer pool"))
            .action(stub(K::Disable, "background_rendering", "stop off-screen rendering"))
            .user_message("Background features are paused to free memory.")
            .technical_details("Resource exhaustion; background workloads shed")
            .estimated_impact(60),
        DegradationStrategy::new("network_outage", DegradationLevel::Severe)
            .description("Network is gone; serve everything from cache")
            .affects(&[F::Streaming])
            .action(stub(K::Offline, "asset_delivery", "serve assets from the local cache"))
            .action(stub(K::Cache, "playback_queue", "pin the playback queue to cached tracks"))
            .user_message("Working offline with cached content.")
            .technical_details("Network unreachable; offline asset delivery active")
            .estimated_impact(50),
        DegradationStrategy::new("network_limited", DegradationLevel::Moderate)
            .description("Network is constrained; reduce transfer volume")
            .affects(&[F::Streaming])
            .action(stub(K::Reduce, "stream_bitrate", "drop to the low-bitrate stream"))
            .action(stub(K::Fallback, "local_assets", "prefer locally cached assets"))
            .user_message("Streaming quality is reduced due to a slow connection.")
            .technical_details("Constrained network; low-bitrate streams selected")
            .estimated_impact(35),
        DegradationStrategy::new("battery_saver", DegradationLevel::Moderate)
            .description("Battery or thermal limits; cut discretionary work")
            .affects(&[F::Visualization, F::UiAnimations, F::BackgroundProcessing])
            .action(stub(K::Reduce, "render_frame_rate", "cap rendering at 30 fps"))
            .action(stub(K::Disable, "background_rendering", "stop off-screen rendering"))
            .user_message("Battery saver is limiting visual effects.")
            .technical_details("Mobile constraints active; discretionary work shed")
            .estimated_impact(40),
        DegradationStrategy::new("low_end_device", DegradationLevel::Moderate)
            .description("Device class cannot sustain full quality")
            .affects(&[F::Visualization, F::HighQualityAudio, F::UiAnimations])
            .action(stub(K::Simplify, "visualizer", "switch to the lightweight visualizer"))
            .action(stub(K::Reduce, "polyphony", "halve the polyphony ceiling"))
            .user_message("Reduced effects for smoother playback on this device.")
            .technical_details("Low-end device profile; quality ceiling lowered")
            .estimated_impact(45),
        DegradationStrategy::new("critical_fallback", DegradationLevel::Critical)
            .description("Last resort: keep bare playback alive")
            .affects(&FeatureCategory::ALL)
            .action(stub(K::Disable, "non_essential_audio", "disable everything but playback"))
            .action(stub(K::Simplify, "playback_path", "route through the minimal playback path"))
            .action(stub(K::Cache, "session_state", "snapshot session state to cache"))
            .user_message("Running in minimal mode to keep playback alive.")
            .technical_details("Critical failure; minimal mode active")
            .estimated_impact(90),
        DegradationStrategy::new("high_severity_fallback", DegradationLevel::Severe)
            .description("Generic shedding for high-severity failures")
            .affects(&[F::AudioEffects, F::Visualization, F::BackgroundProcessing])
            .action(stub(K::Disable, "visualizer", "stop the visualizer"))
            .action(stub(K::Simplify, "effects_chain", "bypass non-essential effects"))
            .user_message("Some features are temporarily unavailable.")
            .technical_details("High-severity failure; generic shedding applied")
            .estimated_impact(60),
        DegradationStrategy::new("moderate_fallback", DegradationLevel::Moderate)
            .description("Generic shedding for medium-severity failures")
            .affects(&[F::Visualization, F::UiAnimations])
            .action(stub(K::Reduce, "render_frame_rate", "cap rendering at 30 fps"))
            .user_message("Minor features are temporarily limited.")
            .technical_details("Medium-severity failure; visual load reduced")
            .estimated_impact(30),
    ];

    // Per-category minimal strategies for low-severity failures.
    for category in ErrorCategory::ALL {
        strategies.push(
            DegradationStrategy::new(
                format!("{}_low", category.as_str()),
                DegradationLevel::Minimal,
            )
            .description(format!("Cosmetic reductions after a low-severity {category} failure"))
            .affects(&[F::UiAnimations])
            .action(stub(K::Reduce, "transition_effects", "shorten UI transitions"))
            .user_message("Some cosmetic effects are limited.")
            .technical_details("Low-severity failure; cosmetic effects trimmed")
            .estimated_impact(10),
        );
    }

    strategies
}
