//! Immutable snapshots of the ambient context.

use chrono::{DateTime, Utc};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ContextError;
use crate::manager::{global_registry, ErasedContextManager, ManagerRegistry};
use crate::scope::{ContextValue, ScopedContext};

use super::panic_message;
use super::reactivation::Reactivation;

pub(crate) struct SnapshotEntry {
    pub(crate) manager: Arc<dyn ErasedContextManager>,
    pub(crate) value: Option<ContextValue>,
}

/// An immutable capture of every registered manager's active value at
/// one instant on one thread.
///
/// Captured once, reactivatable many times, from any thread,
/// arbitrarily later. Capturing has no side effect on the capturing
/// thread's active state, and cloning shares the captured entries.
#[derive(Clone)]
pub struct ContextSnapshot {
    id: Uuid,
    captured_at: DateTime<Utc>,
    entries: Arc<Vec<SnapshotEntry>>,
}

impl ContextSnapshot {
    /// Captures the calling thread's active values across every
    /// manager in the process-wide registry.
    ///
    /// A manager that fails or panics while reporting its value is
    /// recorded as absent and logged; a single bad integration never
    /// aborts the capture. An empty registry yields a valid, empty
    /// snapshot whose reactivation is a no-op.
    #[must_use]
    pub fn capture() -> Self {
        Self::capture_with(&global_registry())
    }

    /// Captures against an explicit registry.
    #[must_use]
    pub fn capture_with(registry: &ManagerRegistry) -> Self {
        let entries: Vec<SnapshotEntry> = registry
            .all()
            .into_iter()
            .map(|manager| {
                let value = match catch_unwind(AssertUnwindSafe(|| manager.active_value_erased()))
                {
                    Ok(Ok(value)) => value,
                    Ok(Err(error)) => {
                        warn!(
                            manager = manager.id(),
                            error = %error,
                            "context manager failed during capture; recording absent value"
                        );
                        None
                    }
                    Err(payload) => {
                        warn!(
                            manager = manager.id(),
                            message = %panic_message(payload.as_ref()),
                            "context manager panicked during capture; recording absent value"
                        );
                        None
                    }
                };
                SnapshotEntry { manager, value }
            })
            .collect();

        let snapshot = Self {
            id: Uuid::new_v4(),
            captured_at: Utc::now(),
            entries: Arc::new(entries),
        };
        debug!(
            snapshot_id = %snapshot.id,
            managers = snapshot.len(),
            "captured context snapshot"
        );
        snapshot
    }

    /// The snapshot's identity, for log correlation.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the snapshot was captured.
    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Number of managers captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no managers were registered at capture time.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identities of the captured managers, in capture order.
    #[must_use]
    pub fn manager_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.manager.id().to_string())
            .collect()
    }

    /// Re-applies the captured values on the calling thread.
    ///
    /// Managers activate in capture order; closing the returned
    /// [`Reactivation`] undoes them in reverse order, restoring
    /// whatever was active on this thread before the call.
    ///
    /// # Errors
    ///
    /// If any manager fails to activate, every scope created earlier
    /// in this attempt is closed again (in reverse order, failures
    /// logged) and the original activation error is returned; no
    /// partial reactivation state is left behind.
    pub fn reactivate(&self) -> Result<Reactivation, ContextError> {
        let mut activated: Vec<(String, ScopedContext)> = Vec::with_capacity(self.entries.len());

        for entry in self.entries.iter() {
            let manager_id = entry.manager.id().to_string();
            let attempt = catch_unwind(AssertUnwindSafe(|| {
                entry.manager.activate_erased(entry.value.clone())
            }));
            let result = match attempt {
                Ok(result) => result,
                Err(payload) => Err(ContextError::Activation {
                    manager: manager_id.clone(),
                    source: anyhow::anyhow!(
                        "context manager panicked during activate: {}",
                        panic_message(payload.as_ref())
                    ),
                }),
            };

            match result {
                Ok(scope) => activated.push((manager_id, scope)),
                Err(error) => {
                    rollback(&mut activated);
                    return Err(error);
                }
            }
        }

        Ok(Reactivation::new(self.id, activated))
    }

    /// Returns a serializable summary of this snapshot for
    /// diagnostics: its id, capture time, and which managers had a
    /// value to capture.
    #[must_use]
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id.to_string(),
            "captured_at": self.captured_at.to_rfc3339(),
            "managers": self
                .entries
                .iter()
                .map(|entry| {
                    serde_json::json!({
                        "id": entry.manager.id(),
                        "captured": entry.value.is_some(),
                    })
                })
                .collect::<Vec<_>>(),
        })
    }
}

/// Closes already-activated scopes in reverse order after a failed
/// reactivation attempt. Secondary failures are logged and never stop
/// the remaining rollback.
fn rollback(activated: &mut Vec<(String, ScopedContext)>) {
    for (manager, scope) in activated.drain(..).rev() {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| scope.close())) {
            warn!(
                manager = %manager,
                message = %panic_message(payload.as_ref()),
                "scope close failed while rolling back a reactivation"
            );
        }
    }
}

impl std::fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSnapshot")
            .field("id", &self.id)
            .field("captured_at", &self.captured_at)
            .field("managers", &self.manager_ids())
            .finish()
    }
}
