//! Subscription Trigger (C8): enqueues `(file-id, version)` and wakes the
//! external subscription worker. §4.7 step 8. The worker itself is out of
//! scope (§1); this is only the trigger.

use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct SubscriptionEvent {
    pub file_id: String,
    pub file_version: i32,
}

/// A channel-backed trigger. The subscription worker (external to this
/// crate) owns the receiving half; this gateway only ever sends.
#[derive(Clone)]
pub struct SubscriptionTrigger {
    tx: mpsc::UnboundedSender<SubscriptionEvent>,
}

impl SubscriptionTrigger {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SubscriptionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueues the event and "wakes" the worker; an unbounded mpsc send is
    /// itself the wake-up, there is no separate signal to raise.
    pub fn enqueue(&self, file_id: impl Into<String>, file_version: i32) {
        let _ = self.tx.send(SubscriptionEvent {
            file_id: file_id.into(),
            file_version,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_is_observed_by_receiver() {
        let (trigger, mut rx) = SubscriptionTrigger::new();
        trigger.enqueue("X90/X1", 2);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.file_id, "X90/X1");
        assert_eq!(event.file_version, 2);
    }
}
