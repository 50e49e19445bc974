// Progressive readiness primitive.
//
// Every subsystem that publishes its own one-shot readiness signal (the
// camera monitor's "first sweep complete", the mediamtx controller's
// "config fetched + monitor ready + circuit closed") wraps one of these
// instead of hand-rolling a watch channel. A subscriber that registers
// after the signal already fired observes `true` immediately — `tokio`'s
// `watch` channel gives us that for free.

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Readiness {
    sender: watch::Sender<bool>,
}
impl Readiness {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self { sender }
    }

    pub fn signal_ready(&self) {
        // idempotent: firing twice is a caller bug upstream (each subsystem
        // reaches "ready" exactly once) but must never panic a hot path.
        let _ = self.sender.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
    }

    pub fn is_ready(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> ReadinessReceiver {
        ReadinessReceiver {
            receiver: self.sender.subscribe(),
        }
    }
}
impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessReceiver {
    receiver: watch::Receiver<bool>,
}
impl ReadinessReceiver {
    pub fn is_ready(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the signal has fired. Resolves immediately if it
    /// already had, per the try-then-subscribe contract.
    pub async fn wait(&mut self) {
        if *self.receiver.borrow() {
            return;
        }
        while !*self.receiver.borrow_and_update() {
            if self.receiver.changed().await.is_err() {
                // sender dropped without ever firing: treat as permanently
                // not-ready rather than hanging the caller forever.
                return;
            }
        }
    }
}

#[cfg(test)]
mod test_readiness {
    use super::Readiness;
    use std::time::Duration;

    #[tokio::test]
    async fn late_subscriber_sees_ready_immediately() {
        let readiness = Readiness::new();
        readiness.signal_ready();

        let mut receiver = readiness.subscribe();
        tokio::time::timeout(Duration::from_millis(50), receiver.wait())
            .await
            .expect("should resolve immediately");
    }

    #[tokio::test]
    async fn early_subscriber_waits_for_signal() {
        let readiness = Readiness::new();
        let mut receiver = readiness.subscribe();

        assert!(!receiver.is_ready());

        let readiness_clone = readiness.clone();
        let waiter = tokio::spawn(async move {
            receiver.wait().await;
            receiver.is_ready()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        readiness_clone.signal_ready();

        assert!(waiter.await.unwrap());
    }
}
