//! Notification sink for lifecycle events
//!
//! Delivery is fire-and-forget: services call [`dispatch`], which logs and
//! swallows sink failures; a failed delivery never fails the transition.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::rag::Rag;

/// Events pushed to the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// A case's derived health moved into red
    CaseHealthChanged {
        case_id: String,
        reference: String,
        previous: Rag,
        current: Rag,
    },
    /// An approval step was signed
    ApprovalSigned {
        workflow_id: String,
        owner_id: String,
        step: usize,
        signer: String,
        complete: bool,
    },
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// External notification channel (email, chat, webhook)
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Emits notifications as tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(notification).map_err(|e| NotifyError(e.to_string()))?;
        info!(target: "qct::notify", %payload, "notification");
        Ok(())
    }
}

/// Send a notification, logging instead of propagating failures
pub fn dispatch(sink: &dyn NotificationSink, notification: Notification) {
    if let Err(e) = sink.notify(&notification) {
        warn!(error = %e, ?notification, "notification dropped");
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_dispatch_swallows_failures() {
        dispatch(
            &FailingSink,
            Notification::ApprovalSigned {
                workflow_id: "APV-1".into(),
                owner_id: "CASE-1".into(),
                step: 0,
                signer: "qa".into(),
                complete: false,
            },
        );
    }

    #[test]
    fn test_dispatch_delivers() {
        let sink = RecordingSink::default();
        dispatch(
            &sink,
            Notification::CaseHealthChanged {
                case_id: "CASE-1".into(),
                reference: "MET-NC-2025-001".into(),
                previous: Rag::Amber,
                current: Rag::Red,
            },
        );
        assert_eq!(sink.received.lock().unwrap().len(), 1);
    }
}
