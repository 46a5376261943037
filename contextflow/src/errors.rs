//! Error types for the contextflow crate.
//!
//! Failures local to a single context manager are isolated from the
//! rest of the mechanism wherever the protocol allows it; the types
//! here describe the cases that do surface to callers.

use thiserror::Error;

/// The main error type for contextflow operations.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A manager failed while activating a captured value during
    /// reactivation. Scopes activated earlier in the same attempt
    /// have already been rolled back when this is returned.
    #[error("context manager '{manager}' failed to activate: {source}")]
    Activation {
        /// The manager's stable identity.
        manager: String,
        /// The underlying failure reported by the manager.
        #[source]
        source: anyhow::Error,
    },

    /// A captured value did not have the type the manager expects.
    ///
    /// This can only happen when a manager's `id()` is not unique
    /// across managers with different value types, or when a captured
    /// value was tampered with between capture and reactivation.
    #[error("captured value for context manager '{manager}' has an unexpected type")]
    ValueType {
        /// The manager's stable identity.
        manager: String,
    },

    /// One or more scopes failed while a reactivation was being
    /// closed. All scopes were still attempted; this reports what
    /// went wrong.
    #[error("{0}")]
    Close(#[from] CloseReport),
}

/// Report of a best-effort close sweep that encountered failures.
///
/// The first failure is the one surfaced; the remaining ones were
/// logged as they occurred and are retained here by manager identity.
#[derive(Debug, Error)]
#[error("failed to close {failed} of {total} scopes (first failure in manager '{first_manager}': {first_message})")]
pub struct CloseReport {
    /// Number of scopes whose close failed.
    pub failed: usize,
    /// Total number of scopes in the sweep.
    pub total: usize,
    /// Identity of the first manager whose scope failed to close.
    pub first_manager: String,
    /// Message describing the first failure.
    pub first_message: String,
    /// Identities of every manager whose scope failed to close, in
    /// the order the failures were observed.
    pub failures: Vec<String>,
}

impl CloseReport {
    /// Creates a report from the first observed failure.
    #[must_use]
    pub fn new(
        total: usize,
        first_manager: impl Into<String>,
        first_message: impl Into<String>,
    ) -> Self {
        let first_manager = first_manager.into();
        Self {
            failed: 1,
            total,
            first_manager: first_manager.clone(),
            first_message: first_message.into(),
            failures: vec![first_manager],
        }
    }

    /// Records an additional failure beyond the first.
    pub fn record(&mut self, manager: impl Into<String>) {
        self.failed += 1;
        self.failures.push(manager.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_report_counts() {
        let mut report = CloseReport::new(3, "locale", "close hook panicked");
        report.record("security");

        assert_eq!(report.failed, 2);
        assert_eq!(report.total, 3);
        assert_eq!(report.failures, vec!["locale", "security"]);
        assert!(report.to_string().contains("2 of 3"));
        assert!(report.to_string().contains("locale"));
    }

    #[test]
    fn test_activation_error_display() {
        let err = ContextError::Activation {
            manager: "trace".to_string(),
            source: anyhow::anyhow!("span store unavailable"),
        };

        let text = err.to_string();
        assert!(text.contains("trace"));
        assert!(text.contains("span store unavailable"));
    }

    #[test]
    fn test_value_type_error_display() {
        let err = ContextError::ValueType {
            manager: "locale".to_string(),
        };
        assert!(err.to_string().contains("unexpected type"));
    }
}
