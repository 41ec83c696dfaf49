//! The degradation engine: applies, tracks, and rolls back strategies.
//!
//! One engine instance owns the process-wide degradation state. Apply and
//! recovery run inside a single async critical section so a partial apply
//! can never interleave with a partial rollback. Listeners are notified
//! outside the critical section, after state has been committed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::context::{DegradationContext, MemoryPressure};

use super::action::ActionRef;
use super::strategy::{DegradationLevel, DegradationStrategy, FeatureCategory, StrategyCatalog};

/// Typed change event delivered to subscribed listeners.
#[derive(Debug, Clone)]
pub struct DegradationChange {
    pub previous_level: DegradationLevel,
    pub current_level: DegradationLevel,
    /// Strategy that caused the change; `None` for recovery resets.
    pub strategy_id: Option<String>,
    /// Features unavailable after the change, sorted for stable reporting.
    pub disabled_features: Vec<FeatureCategory>,
}

/// Observer of degradation state changes.
pub trait DegradationListener: Send + Sync {
    fn on_change(&self, change: &DegradationChange);
}

/// Handle returned by [`DegradationEngine::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Serializable snapshot of the current degradation state.
#[derive(Debug, Clone, Serialize)]
pub struct DegradationSnapshot {
    pub current_level: DegradationLevel,
    pub active_strategies: Vec<String>,
    pub disabled_features: Vec<FeatureCategory>,
    pub applied_actions: usize,
    pub last_update: DateTime<Utc>,
    pub recovery_attempts: u32,
}

struct AppliedAction {
    strategy_id: String,
    action: ActionRef,
}

struct EngineState {
    current_level: DegradationLevel,
    active_strategies: Vec<Arc<DegradationStrategy>>,
    disabled_features: HashSet<FeatureCategory>,
    applied_actions: Vec<AppliedAction>,
    last_update: DateTime<Utc>,
    recovery_attempts: u32,
}

impl EngineState {
    fn new() -> Self {
        Self {
            current_level: DegradationLevel::None,
            active_strategies: Vec::new(),
            disabled_features: HashSet::new(),
            applied_actions: Vec::new(),
            last_update: Utc::now(),
            recovery_attempts: 0,
        }
    }
}

type ListenerEntry = (u64, Arc<dyn DegradationListener>);

/// Engine owning the process-wide degradation state.
pub struct DegradationEngine {
    catalog: RwLock<StrategyCatalog>,
    state: AsyncMutex<EngineState>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_subscription: AtomicU64,
}

impl Default for DegradationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DegradationEngine {
    /// Create an engine with the built-in strategy catalog.
    pub fn new() -> Self {
        Self::with_catalog(StrategyCatalog::default())
    }

    /// Create an engine with a custom catalog.
    pub fn with_catalog(catalog: StrategyCatalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            state: AsyncMutex::new(EngineState::new()),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Add or replace a strategy in the catalog.
    pub fn register_strategy(&self, strategy: DegradationStrategy) {
        match self.catalog.write() {
            Ok(mut catalog) => catalog.insert(strategy),
            Err(poisoned) => {
                warn!("degradation catalog lock poisoned");
                poisoned.into_inner().insert(strategy);
            }
        }
    }

    /// Select and apply the strategy for `ctx`.
    ///
    /// Returns true when the strategy committed, or when it was discarded as
    /// a no-op because it would lower the current level (degradation never
    /// silently downgrades; only [`attempt_recovery`](Self::attempt_recovery)
    /// resets it). Returns false when no strategy matched or any fallback
    /// action failed, in which case no state was changed.
    pub async fn apply_degradation(&self, ctx: &DegradationContext) -> bool {
        let selected = match self.catalog.read() {
            Ok(catalog) => catalog.select(ctx),
            Err(poisoned) => {
                warn!("degradation catalog lock poisoned");
                poisoned.into_inner().select(ctx)
            }
        };
        let Some(strategy) = selected else {
            debug!(
                category = %ctx.category,
                severity = %ctx.severity,
                "no degradation strategy matches context"
            );
            return false;
        };

        let mut state = self.state.lock().await;

        if state.current_level == DegradationLevel::Critical {
            debug!("already at critical degradation; discarding '{}'", strategy.id);
            return true;
        }
        if strategy.level < state.current_level {
            debug!(
                "strategy '{}' ({}) would downgrade current level ({}); ignoring",
                strategy.id, strategy.level, state.current_level
            );
            return true;
        }

        // Contextual widening: copy the catalog entry's feature set, never
        // mutate it.
        let mut affected = strategy.affected_features.clone();
        if ctx.device.memory_pressure >= MemoryPressure::High {
            affected.insert(FeatureCategory::BackgroundProcessing);
        }

        let results = join_all(strategy.actions.iter().map(|action| action.apply())).await;
        let failed = results.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            warn!(
                "strategy '{}' not applied: {}/{} fallback actions failed",
                strategy.id,
                failed,
                results.len()
            );
            return false;
        }

        let previous = state.current_level;
        state.current_level = strategy.level;
        state.active_strategies = vec![Arc::clone(&strategy)];
        state.disabled_features.extend(affected.iter().copied());
        state.applied_actions.extend(strategy.actions.iter().map(|action| AppliedAction {
            strategy_id: strategy.id.clone(),
            action: Arc::clone(action),
        }));
        state.last_update = Utc::now();

        let change = DegradationChange {
            previous_level: previous,
            current_level: state.current_level,
            strategy_id: Some(strategy.id.clone()),
            disabled_features: sorted(&state.disabled_features),
        };
        drop(state);

        info!(
            strategy = %strategy.id,
            level = %change.current_level,
            "degradation applied"
        );
        self.notify(&change);
        true
    }

    /// Roll back applied actions in reverse order and reset to full
    /// function.
    ///
    /// Rollback is best-effort, not transactional: individual rollback
    /// failures and actions without rollback are logged and skipped, and the
    /// state is reset to `None` unconditionally so the client always gets a
    /// path back to full functionality.
    pub async fn attempt_recovery(&self) -> bool {
        let mut state = self.state.lock().await;
        state.recovery_attempts += 1;

        for applied in state.applied_actions.iter().rev() {
            if !applied.action.supports_rollback() {
                debug!(
                    "action '{}' from '{}' has no rollback; skipping",
                    applied.action.target(),
                    applied.strategy_id
                );
                continue;
            }
            if !applied.action.rollback().await {
                warn!(
                    "rollback of '{}' from '{}' failed",
                    applied.action.target(),
                    applied.strategy_id
                );
            }
        }

        let previous = state.current_level;
        state.current_level = DegradationLevel::None;
        state.active_strategies.clear();
        state.disabled_features.clear();
        state.applied_actions.clear();
        state.last_update = Utc::now();

        let change = DegradationChange {
            previous_level: previous,
            current_level: DegradationLevel::None,
            strategy_id: None,
            disabled_features: Vec::new(),
        };
        drop(state);

        info!(previous = %change.previous_level, "degradation recovered");
        self.notify(&change);
        true
    }

    /// Current degradation level.
    pub async fn current_level(&self) -> DegradationLevel {
        self.state.lock().await.current_level
    }

    /// Whether a feature is currently available.
    pub async fn is_feature_available(&self, feature: FeatureCategory) -> bool {
        !self.state.lock().await.disabled_features.contains(&feature)
    }

    /// Message describing the active limitation, or empty when fully
    /// operational.
    pub async fn user_message(&self) -> String {
        let state = self.state.lock().await;
        state
            .active_strategies
            .first()
            .map(|strategy| strategy.user_message.clone())
            .unwrap_or_default()
    }

    /// Serializable snapshot of the current state.
    pub async fn snapshot(&self) -> DegradationSnapshot {
        let state = self.state.lock().await;
        DegradationSnapshot {
            current_level: state.current_level,
            active_strategies: state
                .active_strategies
                .iter()
                .map(|strategy| strategy.id.clone())
                .collect(),
            disabled_features: sorted(&state.disabled_features),
            applied_actions: state.applied_actions.len(),
            last_update: state.last_update,
            recovery_attempts: state.recovery_attempts,
        }
    }

    /// Subscribe to degradation change events.
    pub fn subscribe(&self, listener: Arc<dyn DegradationListener>) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.lock_listeners().push((id, listener));
        SubscriptionId(id)
    }

    /// Remove a listener; returns whether it was registered.
    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription.0);
        listeners.len() != before
    }

    fn notify(&self, change: &DegradationChange) {
        let listeners: Vec<Arc<dyn DegradationListener>> =
            self.lock_listeners().iter().map(|(_, listener)| Arc::clone(listener)).collect();
        for listener in listeners {
            listener.on_change(change);
        }
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<ListenerEntry>> {
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("degradation listener lock poisoned");
                poisoned.into_inner()
            }
        }
    }
}

fn sorted(features: &HashSet<FeatureCategory>) -> Vec<FeatureCategory> {
    let mut features: Vec<_> = features.iter().copied().collect();
    features.sort();
    features
}
