//! New-block watcher
//!
//! Forwards block notifications from a `ChainClient` subscription to a
//! callback, one at a time and in arrival order.

use crate::{
    client::ChainClient,
    error::{ChainError, WatchError},
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

type BlockCallback = Arc<dyn Fn(u64) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&ChainError) + Send + Sync>;

struct ActiveSubscription {
    /// Held while a callback runs; false once stop() has begun
    open: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

/// Owns at most one block subscription
#[derive(Default)]
pub struct ChainEventWatcher {
    active: Option<ActiveSubscription>,
}

impl ChainEventWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes and forwards each block number to `on_block`
    pub async fn start<F>(&mut self, client: &dyn ChainClient, on_block: F) -> Result<(), WatchError>
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.start_with_errors(client, on_block, |_| {}).await
    }

    /// Like `start`, also reporting transport errors and subscription loss to `on_error`
    ///
    /// Errors are not retried and the subscription is not re-established;
    /// once the stream ends, no further blocks arrive until stop/start.
    pub async fn start_with_errors<F, E>(
        &mut self,
        client: &dyn ChainClient,
        on_block: F,
        on_error: E,
    ) -> Result<(), WatchError>
    where
        F: Fn(u64) + Send + Sync + 'static,
        E: Fn(&ChainError) + Send + Sync + 'static,
    {
        if self.active.is_some() {
            return Err(WatchError::AlreadyWatching);
        }

        let mut stream = client.subscribe_blocks().await?;
        let on_block: BlockCallback = Arc::new(on_block);
        let on_error: ErrorCallback = Arc::new(on_error);
        let open = Arc::new(Mutex::new(true));
        let gate = Arc::clone(&open);
        let client_name = client.client_name();

        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                let open = gate.lock().await;
                if !*open {
                    return;
                }
                match item {
                    Ok(block_number) => {
                        tracing::trace!(block_number, "New block");
                        on_block(block_number);
                    }
                    Err(e) => {
                        tracing::warn!(client = client_name, error = %e, "Block subscription error");
                        on_error(&e);
                    }
                }
            }

            let open = gate.lock().await;
            if *open {
                tracing::warn!(client = client_name, "Block subscription ended");
                on_error(&ChainError::Subscription("block stream ended".to_string()));
            }
        });

        tracing::info!(client = client_name, "Watching for new blocks");
        self.active = Some(ActiveSubscription { open, task });
        Ok(())
    }

    /// Unsubscribes; no callback runs after this returns
    ///
    /// Safe to call when not watching.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        // waits out a callback in progress
        *active.open.lock().await = false;
        active.task.abort();
        // the stream (and with it the subscription) is dropped with the task
        if let Err(e) = active.task.await {
            if !e.is_cancelled() {
                tracing::warn!(error = %e, "Block watcher task failed");
            }
        }
        tracing::info!("Stopped watching blocks");
    }

    /// True while a subscription is held and its stream has not ended
    pub fn is_watching(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }
}

impl Drop for ChainEventWatcher {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockChainClient;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_forwards_blocks_in_order() {
        let client = MockChainClient::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut watcher = ChainEventWatcher::new();
        watcher
            .start(&client, move |n| {
                let _ = tx.send(n);
            })
            .await
            .unwrap();
        assert!(watcher.is_watching());

        for n in [100, 101, 102, 104] {
            assert!(client.emit_block(n));
        }
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(rx.recv().await.unwrap());
        }
        assert_eq!(seen, vec![100, 101, 102, 104]);

        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_stop_unsubscribes_and_is_idempotent() {
        let client = MockChainClient::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut watcher = ChainEventWatcher::new();
        watcher
            .start(&client, move |n| {
                let _ = tx.send(n);
            })
            .await
            .unwrap();
        client.emit_block(1);
        assert_eq!(rx.recv().await, Some(1));

        watcher.stop().await;
        assert!(!watcher.is_watching());
        assert!(!client.has_subscriber());
        assert!(!client.emit_block(2));
        // callback dropped with the task, so the channel closes
        assert_eq!(rx.recv().await, None);

        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_single_subscription_per_watcher() {
        let client = MockChainClient::new();
        let mut watcher = ChainEventWatcher::new();

        watcher.start(&client, |_| {}).await.unwrap();
        let err = watcher.start(&client, |_| {}).await.unwrap_err();
        assert!(matches!(err, WatchError::AlreadyWatching));
        assert_eq!(client.subscribe_count(), 1);

        watcher.stop().await;
        watcher.start(&client, |_| {}).await.unwrap();
        assert_eq!(client.subscribe_count(), 2);
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_reported() {
        let client = MockChainClient::new();
        client.fail_subscriptions("websocket refused");

        let mut watcher = ChainEventWatcher::new();
        let err = watcher.start(&client, |_| {}).await.unwrap_err();
        assert!(matches!(err, WatchError::Subscribe(ChainError::Subscription(_))));
        assert!(!watcher.is_watching());
    }

    #[tokio::test]
    async fn test_stop_after_panicking_callback() {
        let client = MockChainClient::new();
        let mut watcher = ChainEventWatcher::new();
        watcher
            .start(&client, |n| {
                if n == 13 {
                    panic!("callback failed on block {}", n);
                }
            })
            .await
            .unwrap();

        client.emit_block(13);
        for _ in 0..10 {
            if !watcher.is_watching() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!watcher.is_watching());

        watcher.stop().await;
        assert!(!client.has_subscriber());
    }

    #[tokio::test]
    async fn test_transport_errors_and_loss_go_to_error_callback() {
        let client = MockChainClient::new();
        let (block_tx, mut blocks) = mpsc::unbounded_channel();
        let (err_tx, mut errors) = mpsc::unbounded_channel();

        let mut watcher = ChainEventWatcher::new();
        watcher
            .start_with_errors(
                &client,
                move |n| {
                    let _ = block_tx.send(n);
                },
                move |e| {
                    let _ = err_tx.send(e.to_string());
                },
            )
            .await
            .unwrap();

        client.emit_error("frame dropped");
        client.emit_block(7);
        assert!(errors.recv().await.unwrap().contains("frame dropped"));
        assert_eq!(blocks.recv().await, Some(7));

        client.drop_subscription();
        assert!(errors.recv().await.unwrap().contains("ended"));

        watcher.stop().await;
    }
}
