//! Error taxonomy for the Auralis resilience layer
//!
//! Every failure the resilience layer handles arrives already classified:
//! the audio engine, asset loader, and platform monitors attach a category,
//! a severity, and an ordered list of recovery actions before handing the
//! error over. This module defines that vocabulary plus the
//! `ClassifiedError` trait the rest of the workspace consumes.
//!
//! # Architecture
//!
//! 1. **`ErrorCategory` / `ErrorSeverity`**: closed enums describing where an
//!    error came from and how bad it is. Matches over these are exhaustive
//!    everywhere they are consumed, so adding a category is a compile-time
//!    event rather than a runtime fallback.
//!
//! 2. **`RecoveryAction`**: one concrete remediation step attached to an
//!    error instance. The kind is a closed enum; there are no stringly-typed
//!    action payloads.
//!
//! 3. **`ClassifiedError` trait**: the interface between error producers and
//!    the resilience core. The circuit breaker only looks at
//!    `is_retryable()`; the recovery orchestrator looks at everything.
//!
//! Module-specific error types should implement `ClassifiedError` directly.
//! `ClientError` is the ready-made carrier for collaborators that classify
//! errors outside this crate and only need a typed container.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Logical source of a failure.
///
/// Categories group errors that share a breaker instance and recovery
/// posture, not errors that share a root cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Audio context creation, resume, or routing failures.
    AudioContext,
    /// Frame deadline misses, scheduler overload, render latency.
    Performance,
    /// Memory, handle, or buffer exhaustion.
    Resource,
    /// Asset fetches and streaming transport.
    Network,
    /// Mobile platform constraints (battery, thermal, backgrounding).
    Mobile,
    /// Rejected input or state that failed validation.
    Validation,
    /// Bad or missing configuration.
    Configuration,
    /// Missing platform or codec capability.
    Compatibility,
    /// Integrity or permission violations.
    Security,
    /// Anything the producer could not classify.
    Unknown,
}

impl ErrorCategory {
    /// Stable snake_case name, used for breaker naming and log fields.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AudioContext => "audio_context",
            Self::Performance => "performance",
            Self::Resource => "resource",
            Self::Network => "network",
            Self::Mobile => "mobile",
            Self::Validation => "validation",
            Self::Configuration => "configuration",
            Self::Compatibility => "compatibility",
            Self::Security => "security",
            Self::Unknown => "unknown",
        }
    }

    /// All categories, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::AudioContext,
        Self::Performance,
        Self::Resource,
        Self::Network,
        Self::Mobile,
        Self::Validation,
        Self::Configuration,
        Self::Compatibility,
        Self::Security,
        Self::Unknown,
    ];
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a classified error.
///
/// The ordering is total (`Low < Medium < High < Critical`) and drives both
/// degradation decisions and strategy fallback selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Cosmetic or recoverable without user impact.
    Low,
    /// Degraded but operational.
    Medium,
    /// Failure requiring recovery action.
    High,
    /// Core functionality at risk.
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Kind of remediation step a recovery action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryActionKind {
    /// Re-run the failed operation.
    Retry,
    /// Switch to an alternative implementation or asset.
    Fallback,
    /// Reduce functionality through the degradation engine.
    Degrade,
    /// Stop the failing operation cleanly.
    Abort,
    /// Reinitialize the affected subsystem.
    Reload,
}

impl fmt::Display for RecoveryActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "retry"),
            Self::Fallback => write!(f, "fallback"),
            Self::Degrade => write!(f, "degrade"),
            Self::Abort => write!(f, "abort"),
            Self::Reload => write!(f, "reload"),
        }
    }
}

/// One concrete remediation step attached to an error instance.
///
/// The recovery orchestrator walks an error's automatic actions in order and
/// stops at the first one that succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAction {
    /// What this step does.
    pub kind: RecoveryActionKind,
    /// Operator-facing description of the step.
    pub description: String,
    /// Whether the orchestrator may run this step without user involvement.
    pub automatic: bool,
    /// Lower runs first among actions of the same error.
    pub priority: u8,
    /// Expected duration, used to bound the step's execution time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<Duration>,
}

impl RecoveryAction {
    /// Create an automatic action with default priority.
    pub fn automatic<S: Into<String>>(kind: RecoveryActionKind, description: S) -> Self {
        Self {
            kind,
            description: description.into(),
            automatic: true,
            priority: 50,
            estimated_time: None,
        }
    }

    /// Create a manual action (surfaced to the user, never run by the
    /// orchestrator).
    pub fn manual<S: Into<String>>(kind: RecoveryActionKind, description: S) -> Self {
        Self {
            kind,
            description: description.into(),
            automatic: false,
            priority: 50,
            estimated_time: None,
        }
    }

    /// Set the ordering priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the expected duration for this step.
    pub fn with_estimated_time(mut self, estimated_time: Duration) -> Self {
        self.estimated_time = Some(estimated_time);
        self
    }
}

/// Classification interface between error producers and the resilience core.
///
/// Implementors promise that the classification is stable for the lifetime
/// of the error value: the breaker and the orchestrator may consult it more
/// than once per recovery cycle.
pub trait ClassifiedError: std::error::Error {
    /// Logical source of the failure.
    fn category(&self) -> ErrorCategory;

    /// How bad the failure is.
    fn severity(&self) -> ErrorSeverity;

    /// Whether automatic recovery should be attempted at all.
    fn is_recoverable(&self) -> bool;

    /// Whether re-running the failed operation can plausibly succeed.
    fn is_retryable(&self) -> bool;

    /// Ordered remediation steps for this error. May be empty.
    fn recovery_actions(&self) -> Vec<RecoveryAction> {
        Vec::new()
    }

    /// Whether this error demands immediate operator attention.
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}

/// Ready-made classified error for collaborators outside this crate.
///
/// The resilience core never classifies errors itself; producers that do
/// their own classification wrap the result in a `ClientError` and hand it
/// over.
#[derive(Debug, Clone)]
pub struct ClientError {
    category: ErrorCategory,
    severity: ErrorSeverity,
    message: String,
    recoverable: bool,
    retryable: bool,
    actions: Vec<RecoveryAction>,
}

impl ClientError {
    /// Create a classified error. Recoverability and retryability start from
    /// category defaults and can be overridden with the builder methods.
    pub fn new<S: Into<String>>(
        category: ErrorCategory,
        severity: ErrorSeverity,
        message: S,
    ) -> Self {
        let retryable = default_retryable(category);
        Self {
            category,
            severity,
            message: message.into(),
            recoverable: category != ErrorCategory::Security,
            retryable,
            actions: Vec::new(),
        }
    }

    /// Shorthand for a network error.
    pub fn network<S: Into<String>>(severity: ErrorSeverity, message: S) -> Self {
        Self::new(ErrorCategory::Network, severity, message)
    }

    /// Shorthand for an audio-context error.
    pub fn audio_context<S: Into<String>>(severity: ErrorSeverity, message: S) -> Self {
        Self::new(ErrorCategory::AudioContext, severity, message)
    }

    /// Shorthand for a performance error.
    pub fn performance<S: Into<String>>(severity: ErrorSeverity, message: S) -> Self {
        Self::new(ErrorCategory::Performance, severity, message)
    }

    /// Shorthand for a resource-exhaustion error.
    pub fn resource<S: Into<String>>(severity: ErrorSeverity, message: S) -> Self {
        Self::new(ErrorCategory::Resource, severity, message)
    }

    /// Override whether automatic recovery is allowed.
    pub fn recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Override whether retrying the operation can succeed.
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Attach an ordered list of recovery actions.
    pub fn with_actions(mut self, actions: Vec<RecoveryAction>) -> Self {
        self.actions = actions;
        self
    }

    /// Append a single recovery action.
    pub fn with_action(mut self, action: RecoveryAction) -> Self {
        self.actions.push(action);
        self
    }

    /// The producer-supplied message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.category, self.severity, self.message)
    }
}

impl std::error::Error for ClientError {}

impl ClassifiedError for ClientError {
    fn category(&self) -> ErrorCategory {
        self.category
    }

    fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn recovery_actions(&self) -> Vec<RecoveryAction> {
        self.actions.clone()
    }
}

/// Category default for retryability; producers can always override.
const fn default_retryable(category: ErrorCategory) -> bool {
    match category {
        ErrorCategory::AudioContext
        | ErrorCategory::Performance
        | ErrorCategory::Resource
        | ErrorCategory::Network
        | ErrorCategory::Mobile => true,
        ErrorCategory::Validation
        | ErrorCategory::Configuration
        | ErrorCategory::Compatibility
        | ErrorCategory::Security
        | ErrorCategory::Unknown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates the severity ordering used for degradation decisions.
    ///
    /// Assertions:
    /// - Ensures `Low < Medium < High < Critical` holds.
    #[test]
    fn test_severity_total_order() {
        assert!(ErrorSeverity::Low < ErrorSeverity::Medium);
        assert!(ErrorSeverity::Medium < ErrorSeverity::High);
        assert!(ErrorSeverity::High < ErrorSeverity::Critical);
    }

    #[test]
    fn test_category_names_are_stable() {
        assert_eq!(ErrorCategory::AudioContext.as_str(), "audio_context");
        assert_eq!(ErrorCategory::Network.as_str(), "network");
        assert_eq!(ErrorCategory::ALL.len(), 10);
    }

    #[test]
    fn test_client_error_display() {
        let err = ClientError::network(ErrorSeverity::High, "asset fetch failed");
        assert_eq!(err.to_string(), "[network/HIGH] asset fetch failed");
    }

    /// Validates category defaults for retryability and recoverability.
    ///
    /// Assertions:
    /// - Network errors default to retryable and recoverable.
    /// - Security errors default to neither.
    /// - Builder overrides win over defaults.
    #[test]
    fn test_client_error_category_defaults() {
        let net = ClientError::network(ErrorSeverity::Medium, "timeout");
        assert!(net.is_retryable());
        assert!(net.is_recoverable());

        let sec = ClientError::new(ErrorCategory::Security, ErrorSeverity::Critical, "bad origin");
        assert!(!sec.is_retryable());
        assert!(!sec.is_recoverable());

        let overridden = ClientError::network(ErrorSeverity::Low, "once only").retryable(false);
        assert!(!overridden.is_retryable());
    }

    #[test]
    fn test_recovery_action_ordering_metadata() {
        let action = RecoveryAction::automatic(RecoveryActionKind::Retry, "retry fetch")
            .with_priority(10)
            .with_estimated_time(Duration::from_secs(2));
        assert!(action.automatic);
        assert_eq!(action.priority, 10);
        assert_eq!(action.estimated_time, Some(Duration::from_secs(2)));

        let manual = RecoveryAction::manual(RecoveryActionKind::Reload, "reload the page");
        assert!(!manual.automatic);
    }

    #[test]
    fn test_is_critical_follows_severity() {
        let err = ClientError::performance(ErrorSeverity::Critical, "render stalled");
        assert!(err.is_critical());
        let err = ClientError::performance(ErrorSeverity::High, "frame drops");
        assert!(!err.is_critical());
    }

    #[test]
    fn test_category_serde_round_trip() {
        let json = serde_json::to_string(&ErrorCategory::AudioContext).expect("serialize");
        assert_eq!(json, "\"audio_context\"");
        let back: ErrorCategory = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, ErrorCategory::AudioContext);
    }
}
