//! The recovery orchestrator.
//!
//! Given a classified error, the orchestrator decides whether to degrade,
//! runs the error's automatic recovery actions through the breaker for the
//! error's category, and records the outcome. It is the only component that
//! knows about both the degradation engine and the breaker registry, and it
//! never lets an internal failure escape: `execute_recovery` always
//! resolves to a boolean.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use auralis_common::resilience::{
    CircuitBreakerConfig, CircuitBreakerMetrics, CircuitBreakerRegistry, RetryConfig,
};
use auralis_common::{
    ClassifiedError, ErrorCategory, ErrorSeverity, RecoveryAction, RecoveryActionKind,
};

use crate::context::{CapabilityProvider, DegradationContext, StaticCapabilities};
use crate::degradation::{DegradationEngine, DegradationSnapshot};

use super::handlers::{DefaultActionHandlers, RecoveryActionHandler};
use super::metrics::RecoveryMetrics;
use super::RecoveryContext;

/// Orchestrator-level configuration.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Timeout for an action that does not declare an estimated time.
    pub default_action_timeout: Duration,
    /// Backoff applied between recovery actions after the first. This is
    /// independent of the per-category breaker's retry policy.
    pub backoff: RetryConfig,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            default_action_timeout: Duration::from_secs(10),
            backoff: RetryConfig {
                max_retries: 0,
                base_delay: Duration::from_millis(250),
                max_delay: Duration::from_secs(5),
                multiplier: 2.0,
                jitter: true,
            },
        }
    }
}

/// Internal outcome of an action walk that found no working remediation.
/// Runs through the category breaker so failed recoveries count against it.
#[derive(Debug, Error)]
#[error("all {attempted} automatic recovery actions failed for {category}")]
struct ActionRunError {
    category: ErrorCategory,
    severity: ErrorSeverity,
    attempted: usize,
    retryable: bool,
}

impl ClassifiedError for ActionRunError {
    fn category(&self) -> ErrorCategory {
        self.category
    }

    fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn is_retryable(&self) -> bool {
        self.retryable
    }
}

/// Sequences degradation and breaker-protected recovery for classified
/// errors.
pub struct RecoveryOrchestrator {
    registry: Arc<CircuitBreakerRegistry>,
    degradation: Arc<DegradationEngine>,
    capabilities: Arc<dyn CapabilityProvider>,
    handlers: Arc<dyn RecoveryActionHandler>,
    config: RecoveryConfig,
    metrics: Mutex<RecoveryMetrics>,
    attempt_counter: AtomicU64,
}

impl RecoveryOrchestrator {
    /// Create an orchestrator over explicit collaborators with default
    /// handlers and configuration.
    pub fn new(
        registry: Arc<CircuitBreakerRegistry>,
        degradation: Arc<DegradationEngine>,
        capabilities: Arc<dyn CapabilityProvider>,
    ) -> Self {
        let handlers = Arc::new(DefaultActionHandlers::new(Arc::clone(&degradation)));
        Self {
            registry,
            degradation,
            capabilities,
            handlers,
            config: RecoveryConfig::default(),
            metrics: Mutex::new(RecoveryMetrics::default()),
            attempt_counter: AtomicU64::new(0),
        }
    }

    /// Create a builder for configuring the orchestrator.
    pub fn builder() -> RecoveryOrchestratorBuilder {
        RecoveryOrchestratorBuilder::default()
    }

    /// Attempt automatic recovery for a classified error.
    ///
    /// Never fails: every internal error is folded into the boolean outcome
    /// plus metrics and logs.
    pub async fn execute_recovery<E>(&self, error: &E) -> bool
    where
        E: ClassifiedError,
    {
        self.with_metrics(|metrics| metrics.total_attempts += 1);

        if !error.is_recoverable() {
            warn!(
                category = %error.category(),
                severity = %error.severity(),
                "error reports itself non-recoverable; recovery skipped"
            );
            self.with_metrics(RecoveryMetrics::record_failure);
            return false;
        }

        let started = Instant::now();
        let attempt_number = self.attempt_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let context = RecoveryContext {
            category: error.category(),
            severity: error.severity(),
            retryable: error.is_retryable(),
            attempt_number,
            degradation_level: self.degradation.current_level().await,
            device: self.capabilities.snapshot().await,
            started_at: started,
        };
        debug!(
            category = %context.category,
            severity = %context.severity,
            attempt = attempt_number,
            "starting recovery cycle"
        );

        let succeeded = self.run_recovery(error, &context).await;

        let elapsed = started.elapsed();
        self.with_metrics(|metrics| {
            if succeeded {
                metrics.record_success(elapsed);
            } else {
                metrics.record_failure();
            }
        });
        if succeeded {
            info!(category = %context.category, ?elapsed, "recovery succeeded");
        } else {
            warn!(category = %context.category, ?elapsed, "recovery failed");
        }
        succeeded
    }

    /// Cumulative recovery metrics snapshot.
    pub fn metrics(&self) -> RecoveryMetrics {
        self.with_metrics(|metrics| metrics.clone())
    }

    /// Metrics for every breaker the orchestrator has created.
    pub fn circuit_breaker_metrics(&self) -> Vec<CircuitBreakerMetrics> {
        self.registry.all_metrics()
    }

    /// Snapshot of the degradation engine state.
    pub async fn degradation_snapshot(&self) -> DegradationSnapshot {
        self.degradation.snapshot().await
    }

    /// The degradation engine this orchestrator drives.
    pub fn degradation(&self) -> &Arc<DegradationEngine> {
        &self.degradation
    }

    /// The breaker registry this orchestrator populates.
    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    /// Reset metrics, every breaker, and the degradation state.
    pub async fn reset(&self) {
        self.with_metrics(|metrics| *metrics = RecoveryMetrics::default());
        self.registry.reset_all();
        self.degradation.attempt_recovery().await;
        info!("recovery orchestrator reset");
    }

    async fn run_recovery<E>(&self, error: &E, context: &RecoveryContext) -> bool
    where
        E: ClassifiedError,
    {
        let category = context.category;
        let severity = context.severity;

        // High-impact failures degrade before recovery is attempted, so the
        // client is already in a safe configuration if every action fails.
        if matches!(severity, ErrorSeverity::High | ErrorSeverity::Critical)
            || matches!(category, ErrorCategory::Performance | ErrorCategory::Resource)
        {
            let degradation_ctx = DegradationContext::new(category, severity)
                .with_affected_systems(affected_systems_for(category))
                .with_device(context.device.clone());
            if self.degradation.apply_degradation(&degradation_ctx).await {
                self.with_metrics(|metrics| metrics.degradation_activations += 1);
            }
        }

        let breaker_name = format!("{}_recovery", category.as_str());
        let breaker =
            match self.registry.get_or_create(&breaker_name, breaker_config_for(category)) {
                Ok(breaker) => breaker,
                Err(err) => {
                    warn!("cannot configure breaker '{breaker_name}': {err}");
                    return false;
                }
            };

        let mut actions: Vec<RecoveryAction> =
            error.recovery_actions().into_iter().filter(|action| action.automatic).collect();
        actions.sort_by_key(|action| action.priority);
        if actions.is_empty() {
            debug!(category = %category, "no automatic recovery actions attached");
        }

        match breaker.execute(|| self.run_actions(&actions, context)).await {
            Ok(()) => true,
            Err(err) if err.is_circuit_open() => {
                self.with_metrics(|metrics| metrics.circuit_breaker_activations += 1);
                warn!("breaker '{breaker_name}' is open; recovery rejected");
                false
            }
            Err(err) => {
                warn!("recovery through '{breaker_name}' failed: {err}");
                false
            }
        }
    }

    /// Walk the actions in order; the first success wins. Exponential
    /// backoff runs between actions after the first, and every dispatch is
    /// bounded by the action's estimated time or the configured default.
    async fn run_actions(
        &self,
        actions: &[RecoveryAction],
        context: &RecoveryContext,
    ) -> Result<(), ActionRunError> {
        for (index, action) in actions.iter().enumerate() {
            if index > 0 {
                let delay = self.config.backoff.delay_for_attempt(index as u32);
                debug!("backing off {delay:?} before next recovery action");
                tokio::time::sleep(delay).await;
            }

            let timeout = action.estimated_time.unwrap_or(self.config.default_action_timeout);
            match tokio::time::timeout(timeout, self.dispatch(action, context)).await {
                Ok(true) => {
                    info!("recovery action '{}' ({}) succeeded", action.description, action.kind);
                    return Ok(());
                }
                Ok(false) => {
                    warn!("recovery action '{}' ({}) failed", action.description, action.kind);
                }
                Err(_) => {
                    warn!("recovery action '{}' timed out after {timeout:?}", action.description);
                }
            }
        }

        Err(ActionRunError {
            category: context.category,
            severity: context.severity,
            attempted: actions.len(),
            retryable: context.retryable && !actions.is_empty(),
        })
    }

    async fn dispatch(&self, action: &RecoveryAction, context: &RecoveryContext) -> bool {
        match action.kind {
            RecoveryActionKind::Retry => self.handlers.retry(action, context).await,
            RecoveryActionKind::Fallback => self.handlers.fallback(action, context).await,
            RecoveryActionKind::Degrade => self.handlers.degrade(action, context).await,
            RecoveryActionKind::Abort => self.handlers.abort(action, context).await,
            RecoveryActionKind::Reload => self.handlers.reload(action, context).await,
        }
    }

    fn with_metrics<R>(&self, f: impl FnOnce(&mut RecoveryMetrics) -> R) -> R {
        match self.metrics.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => {
                warn!("recovery metrics lock poisoned");
                f(&mut poisoned.into_inner())
            }
        }
    }
}

/// Builder for wiring an orchestrator; any omitted collaborator gets a
/// fresh default instance.
#[derive(Default)]
pub struct RecoveryOrchestratorBuilder {
    registry: Option<Arc<CircuitBreakerRegistry>>,
    degradation: Option<Arc<DegradationEngine>>,
    capabilities: Option<Arc<dyn CapabilityProvider>>,
    handlers: Option<Arc<dyn RecoveryActionHandler>>,
    config: Option<RecoveryConfig>,
}

impl RecoveryOrchestratorBuilder {
    pub fn registry(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn degradation(mut self, degradation: Arc<DegradationEngine>) -> Self {
        self.degradation = Some(degradation);
        self
    }

    pub fn capabilities(mut self, capabilities: Arc<dyn CapabilityProvider>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn handlers(mut self, handlers: Arc<dyn RecoveryActionHandler>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    pub fn config(mut self, config: RecoveryConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> RecoveryOrchestrator {
        let registry = self.registry.unwrap_or_else(|| Arc::new(CircuitBreakerRegistry::new()));
        let degradation = self.degradation.unwrap_or_else(|| Arc::new(DegradationEngine::new()));
        let capabilities = self
            .capabilities
            .unwrap_or_else(|| Arc::new(StaticCapabilities::default()) as Arc<dyn CapabilityProvider>);
        let handlers = self
            .handlers
            .unwrap_or_else(|| Arc::new(DefaultActionHandlers::new(Arc::clone(&degradation))) as _);

        RecoveryOrchestrator {
            registry,
            degradation,
            capabilities,
            handlers,
            config: self.config.unwrap_or_default(),
            metrics: Mutex::new(RecoveryMetrics::default()),
            attempt_counter: AtomicU64::new(0),
        }
    }
}

/// Breaker configuration per error category.
///
/// Thresholds reflect how noisy and how recoverable each category is:
/// network failures are frequent and usually transient, security failures
/// trip immediately and are never retried.
fn breaker_config_for(category: ErrorCategory) -> CircuitBreakerConfig {
    use ErrorCategory as C;
    let (failure_threshold, recovery_timeout, max_retries) = match category {
        C::Network => (6, Duration::from_secs(120), 3),
        C::AudioContext => (4, Duration::from_secs(45), 2),
        C::Performance => (5, Duration::from_secs(60), 2),
        C::Resource => (5, Duration::from_secs(90), 2),
        C::Mobile => (4, Duration::from_secs(60), 2),
        C::Compatibility => (3, Duration::from_secs(60), 1),
        C::Validation | C::Configuration => (2, Duration::from_secs(30), 0),
        C::Security => (1, Duration::from_secs(5), 0),
        C::Unknown => (3, Duration::from_secs(60), 1),
    };
    CircuitBreakerConfig {
        failure_threshold,
        recovery_timeout,
        retry: RetryConfig { max_retries, ..Default::default() },
        ..Default::default()
    }
}

/// Subsystems a failure in each category is assumed to affect.
fn affected_systems_for(category: ErrorCategory) -> Vec<String> {
    use ErrorCategory as C;
    let systems: &[&str] = match category {
        C::AudioContext => &["audio_pipeline", "effects_chain"],
        C::Performance => &["renderer", "scheduler"],
        C::Resource => &["sample_library", "buffer_pool"],
        C::Network => &["asset_delivery", "streaming"],
        C::Mobile => &["power_management", "background_audio"],
        C::Validation => &["input_pipeline"],
        C::Configuration => &["settings"],
        C::Compatibility => &["codec_support"],
        C::Security => &["session"],
        C::Unknown => &["client"],
    };
    systems.iter().map(|s| (*s).to_string()).collect()
}
