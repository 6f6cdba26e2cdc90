//! Trailing-edge debouncing.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Runs an action once a stream of values has been quiet for `delay`.
///
/// Every [`push`](Debouncer::push) restarts the timer; when it expires the
/// action runs with the most recent value. Values pushed while the action
/// runs start a new window.
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Start the debouncer. Must be called inside a tokio runtime.
    pub fn new<F, Fut>(delay: Duration, mut action: F) -> Self
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<T>();
        let task = tokio::spawn(async move {
            while let Some(mut latest) = rx.recv().await {
                loop {
                    tokio::select! {
                        next = rx.recv() => match next {
                            Some(value) => latest = value,
                            None => return,
                        },
                        _ = tokio::time::sleep(delay) => break,
                    }
                }
                action(latest).await;
            }
        });
        Self { tx, task }
    }

    pub fn push(&self, value: T) {
        // Fails only after cancel(), when nothing should fire anyway.
        let _ = self.tx.send(value);
    }

    /// Drop any pending value and stop firing.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    fn recording(delay: Duration) -> (Debouncer<u32>, Arc<Mutex<Vec<u32>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);
        let debouncer = Debouncer::new(delay, move |value| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().push(value);
            }
        });
        (debouncer, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_with_last_value() {
        let (debouncer, calls) = recording(Duration::from_millis(500));

        for value in 0..10 {
            debouncer.push(value);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(calls.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(*calls.lock(), vec![9]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_fire_separately() {
        let (debouncer, calls) = recording(Duration::from_millis(100));

        debouncer.push(1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        debouncer.push(2);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(*calls.lock(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_value() {
        let (debouncer, calls) = recording(Duration::from_millis(100));

        debouncer.push(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        debouncer.cancel();
        debouncer.push(2);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(calls.lock().is_empty());
    }
}
