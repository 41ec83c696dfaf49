//! Per-kind recovery action handlers.
//!
//! The orchestrator dispatches each automatic recovery action to the
//! handler method matching its kind. The default implementation wires the
//! `degrade` kind into the degradation engine and treats the remaining
//! kinds as integration stubs the application overrides with a custom
//! [`RecoveryActionHandler`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use auralis_common::RecoveryAction;

use crate::context::DegradationContext;
use crate::degradation::DegradationEngine;

use super::RecoveryContext;

/// Executes one recovery action per kind.
///
/// Every method returns whether the action succeeded; the orchestrator
/// stops at the first success.
#[async_trait]
pub trait RecoveryActionHandler: Send + Sync {
    async fn retry(&self, action: &RecoveryAction, context: &RecoveryContext) -> bool;
    async fn fallback(&self, action: &RecoveryAction, context: &RecoveryContext) -> bool;
    async fn degrade(&self, action: &RecoveryAction, context: &RecoveryContext) -> bool;
    async fn abort(&self, action: &RecoveryAction, context: &RecoveryContext) -> bool;
    async fn reload(&self, action: &RecoveryAction, context: &RecoveryContext) -> bool;
}

/// Default handlers: `degrade` goes through the degradation engine, the
/// rest log the requested remediation and report success.
pub struct DefaultActionHandlers {
    degradation: Arc<DegradationEngine>,
}

impl DefaultActionHandlers {
    pub fn new(degradation: Arc<DegradationEngine>) -> Self {
        Self { degradation }
    }
}

#[async_trait]
impl RecoveryActionHandler for DefaultActionHandlers {
    async fn retry(&self, action: &RecoveryAction, context: &RecoveryContext) -> bool {
        debug!(
            category = %context.category,
            "retry remediation: {}",
            action.description
        );
        true
    }

    async fn fallback(&self, action: &RecoveryAction, context: &RecoveryContext) -> bool {
        info!(
            category = %context.category,
            "fallback remediation: {}",
            action.description
        );
        true
    }

    async fn degrade(&self, _action: &RecoveryAction, context: &RecoveryContext) -> bool {
        let ctx = DegradationContext::new(context.category, context.severity)
            .with_device(context.device.clone());
        self.degradation.apply_degradation(&ctx).await
    }

    async fn abort(&self, action: &RecoveryAction, context: &RecoveryContext) -> bool {
        info!(
            category = %context.category,
            "abort remediation: {}",
            action.description
        );
        true
    }

    async fn reload(&self, action: &RecoveryAction, context: &RecoveryContext) -> bool {
        info!(
            category = %context.category,
            "reload remediation: {}",
            action.description
        );
        true
    }
}
