//! Run-wide cancellation

use phylopipe_core::{PhyloError, PhyloResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation flag backed by a `watch` channel.
///
/// Every clone observes the same flag. Racing a future against
/// [`CancelSignal::cancelled`] drops it when the signal fires, which kills
/// any child process it owns and aborts in-flight HTTP requests.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the signal has fired
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // the sender lives as long as any clone of the signal, so this only
        // errors if the signal itself is gone
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `future` unless the signal fires first
    pub async fn guard<T, F>(&self, future: F) -> PhyloResult<T>
    where
        F: Future<Output = PhyloResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(PhyloError::Cancelled),
            result = future => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_clones_share_the_flag() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_cancelled());
        signal.trigger();
        assert!(clone.is_cancelled());
        clone.cancelled().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_abandons_slow_future() {
        let signal = CancelSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger();
        });

        let result: PhyloResult<()> = signal
            .guard(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(PhyloError::Cancelled)));
    }

    #[tokio::test]
    async fn test_guard_passes_result_through() {
        let signal = CancelSignal::new();
        let value = signal.guard(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
