//! One-shot cancellation signal shared between the manager and a worker

use tokio::sync::watch;

/// Owner side: held by the manager's worker handle
#[derive(Debug)]
pub(crate) struct CancelSignal {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Fire the signal; safe to call repeatedly from any thread
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> Cancelled {
        Cancelled {
            rx: self.tx.subscribe(),
        }
    }
}

/// Worker side: resolves once the signal fires or its owner is dropped
#[derive(Debug)]
pub(crate) struct Cancelled {
    rx: watch::Receiver<bool>,
}

impl Cancelled {
    pub async fn wait(&mut self) {
        // An error means the sender is gone, which counts as cancellation
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let signal = CancelSignal::new();
        let mut cancelled = signal.subscribe();

        let waiter = tokio::spawn(async move { cancelled.wait().await });
        signal.cancel();
        signal.cancel();

        assert!(signal.is_cancelled());
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_signal_counts_as_cancel() {
        let signal = CancelSignal::new();
        let mut cancelled = signal.subscribe();
        drop(signal);

        timeout(Duration::from_secs(1), cancelled.wait())
            .await
            .expect("dropped owner should cancel");
    }

    #[tokio::test]
    async fn test_uncancelled_stays_pending() {
        let signal = CancelSignal::new();
        let mut cancelled = signal.subscribe();

        assert!(timeout(Duration::from_millis(50), cancelled.wait())
            .await
            .is_err());
        assert!(!signal.is_cancelled());
    }
}
