//! Fallback actions executed when a degradation strategy is applied.
//!
//! An action is one concrete behavior change (disable the visualizer, pin
//! the playback queue to cache, switch asset delivery offline). Actions are
//! fallible and report success as a boolean; a strategy only commits when
//! every one of its actions succeeded. Rollback is optional and best-effort.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of behavior change an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Turn a feature off entirely.
    Disable,
    /// Lower a quality or rate parameter.
    Reduce,
    /// Switch to an alternative implementation.
    Fallback,
    /// Replace a complex path with a simpler one.
    Simplify,
    /// Serve from or pin to the local cache.
    Cache,
    /// Switch to offline operation.
    Offline,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disable => write!(f, "disable"),
            Self::Reduce => write!(f, "reduce"),
            Self::Fallback => write!(f, "fallback"),
            Self::Simplify => write!(f, "simplify"),
            Self::Cache => write!(f, "cache"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// One fallback behavior a strategy can apply and, optionally, roll back.
#[async_trait]
pub trait FallbackAction: Send + Sync {
    /// What kind of change this action performs.
    fn kind(&self) -> ActionKind;

    /// The subsystem or parameter this action targets.
    fn target(&self) -> &str;

    /// Operator-facing description.
    fn description(&self) -> &str;

    /// Perform the change. Returns whether it took effect.
    async fn apply(&self) -> bool;

    /// Whether this action can undo itself.
    fn supports_rollback(&self) -> bool {
        false
    }

    /// Undo the change. Only called when `supports_rollback` is true;
    /// failures are logged by the engine, never fatal.
    async fn rollback(&self) -> bool {
        true
    }
}

/// Shared handle to a fallback action.
pub type ActionRef = Arc<dyn FallbackAction>;

type ActionFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Closure-backed action, the integration vehicle for applications and
/// tests.
#[derive(Clone)]
pub struct FnAction {
    kind: ActionKind,
    target: String,
    description: String,
    apply: ActionFn,
    rollback: Option<ActionFn>,
}

impl FnAction {
    /// Create an action from an apply closure.
    pub fn new<T, D, F>(kind: ActionKind, target: T, description: D, apply: F) -> Self
    where
        T: Into<String>,
        D: Into<String>,
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            kind,
            target: target.into(),
            description: description.into(),
            apply: Arc::new(apply),
            rollback: None,
        }
    }

    /// Attach a rollback closure.
    pub fn with_rollback<F>(mut self, rollback: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.rollback = Some(Arc::new(rollback));
        self
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> ActionRef {
        Arc::new(self)
    }
}

impl fmt::Debug for FnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("has_rollback", &self.rollback.is_some())
            .finish()
    }
}

#[async_trait]
impl FallbackAction for FnAction {
    fn kind(&self) -> ActionKind {
        self.kind
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn apply(&self) -> bool {
        (self.apply)()
    }

    fn supports_rollback(&self) -> bool {
        self.rollback.is_some()
    }

    async fn rollback(&self) -> bool {
        match &self.rollback {
            Some(rollback) => rollback(),
            None => true,
        }
    }
}

/// Catalog stub: records the intended change and reports success. The
/// application replaces these with real integrations via custom strategies.
pub(crate) fn stub<T, D>(kind: ActionKind, target: T, description: D) -> ActionRef
where
    T: Into<String>,
    D: Into<String>,
{
    let target = target.into();
    let description = description.into();
    let log_target = target.clone();
    FnAction::new(kind, target, description, move || {
        debug!("applying {log_target} fallback");
        true
    })
    .into_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_fn_action_apply_and_rollback() {
        let applied = Arc::new(AtomicBool::new(false));
        let rolled_back = Arc::new(AtomicBool::new(false));

        let applied_clone = Arc::clone(&applied);
        let rolled_back_clone = Arc::clone(&rolled_back);
        let action = FnAction::new(ActionKind::Disable, "visualizer", "disable visuals", move || {
            applied_clone.store(true, Ordering::SeqCst);
            true
        })
        .with_rollback(move || {
            rolled_back_clone.store(true, Ordering::SeqCst);
            true
        });

        assert!(action.supports_rollback());
        assert!(action.apply().await);
        assert!(applied.load(Ordering::SeqCst));
        assert!(action.rollback().await);
        assert!(rolled_back.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_fn_action_without_rollback() {
        let action = FnAction::new(ActionKind::Reduce, "frame_rate", "halve frame rate", || true);
        assert!(!action.supports_rollback());
        // Default rollback is a no-op success
        assert!(action.rollback().await);
    }

    #[tokio::test]
    async fn test_stub_actions_succeed() {
        let action = stub(ActionKind::Cache, "playback_queue", "pin queue to cache");
        assert_eq!(action.kind(), ActionKind::Cache);
        assert_eq!(action.target(), "playback_queue");
        assert!(action.apply().await);
    }

    #[tokio::test]
    async fn test_failing_action_reports_failure() {
        let action = FnAction::new(ActionKind::Offline, "asset_delivery", "go offline", || false);
        assert!(!action.apply().await);
    }
}
