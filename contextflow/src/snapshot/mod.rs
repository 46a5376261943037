//! Snapshot capture and cross-thread reactivation.
//!
//! This module provides:
//! - Immutable snapshots of every registered manager's active value
//! - Reactivations that re-apply a snapshot and undo it in reverse

mod capture;
mod reactivation;

pub use capture::ContextSnapshot;
pub use reactivation::Reactivation;

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked with a non-string payload".to_string()
    }
}
