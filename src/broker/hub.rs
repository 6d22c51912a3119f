//! Broker Hub
//!
//! Fans each published value out to every registered subscriber. One
//! producer publishes into a bounded inbox; a dispatch task drains it and
//! pushes a clone into each subscriber's drop-oldest queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::queue::{SubscriberId, SubscriberQueue, Subscription};

type Registry<T> = Arc<RwLock<HashMap<SubscriberId, Arc<SubscriberQueue<T>>>>>;

/// Configuration for the broker
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Capacity of the inbound publish queue
    pub publish_capacity: usize,
    /// Capacity of each subscriber's queue before the oldest value is dropped
    pub subscriber_capacity: usize,
    /// Maximum number of concurrent subscribers
    pub max_subscribers: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            publish_capacity: 64,
            subscriber_capacity: 16,
            max_subscribers: 1000,
        }
    }
}

enum Dispatch<T> {
    Idle(mpsc::Receiver<T>),
    Running {
        shutdown: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Publish/subscribe hub for values of type `T`
pub struct Broker<T> {
    subscribers: Registry<T>,
    inbox: mpsc::Sender<T>,
    dispatch: Mutex<Dispatch<T>>,
    stopped: AtomicBool,
    config: BrokerConfig,
}

impl<T> Broker<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an idle broker. Values published before [`start`](Self::start)
    /// wait in the inbox.
    pub fn new(config: BrokerConfig) -> Self {
        let (inbox, rx) = mpsc::channel(config.publish_capacity.max(1));
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            inbox,
            dispatch: Mutex::new(Dispatch::Idle(rx)),
            stopped: AtomicBool::new(false),
            config,
        }
    }

    /// Spawn the dispatch task
    pub async fn start(&self) -> Result<(), BrokerError> {
        let mut dispatch = self.dispatch.lock().await;
        let inbox = match std::mem::replace(&mut *dispatch, Dispatch::Stopped) {
            Dispatch::Idle(inbox) => inbox,
            Dispatch::Running { shutdown, handle } => {
                *dispatch = Dispatch::Running { shutdown, handle };
                return Err(BrokerError::AlreadyStarted);
            }
            Dispatch::Stopped => return Err(BrokerError::AlreadyStopped),
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(dispatch_loop(
            inbox,
            Arc::clone(&self.subscribers),
            shutdown_rx,
        ));
        *dispatch = Dispatch::Running {
            shutdown: shutdown_tx,
            handle,
        };

        tracing::info!(
            subscriber_capacity = self.config.subscriber_capacity,
            max_subscribers = self.config.max_subscribers,
            "Broker started"
        );
        Ok(())
    }

    /// Halt dispatch and close every subscription.
    ///
    /// Only the first call has an effect; later calls return
    /// [`BrokerError::AlreadyStopped`].
    pub async fn stop(&self) -> Result<(), BrokerError> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            tracing::warn!("Broker stop requested twice");
            return Err(BrokerError::AlreadyStopped);
        }

        let previous = std::mem::replace(&mut *self.dispatch.lock().await, Dispatch::Stopped);
        if let Dispatch::Running { shutdown, handle } = previous {
            let _ = shutdown.send(());
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Broker dispatch task failed");
            }
        }

        let mut subscribers = self.subscribers.write().await;
        for queue in subscribers.values() {
            queue.close();
        }
        let closed = subscribers.len();
        subscribers.clear();

        tracing::info!(closed_subscriptions = closed, "Broker stopped");
        Ok(())
    }

    /// Hand `value` to the dispatch task without waiting.
    ///
    /// After [`stop`](Self::stop), or when the inbox is full, the value is
    /// dropped with a warning and an error is returned.
    pub fn publish(&self, value: T) -> Result<(), BrokerError> {
        if self.stopped.load(Ordering::Acquire) {
            tracing::warn!("Dropping value published after broker stop");
            return Err(BrokerError::Stopped);
        }

        match self.inbox.try_send(value) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    capacity = self.config.publish_capacity,
                    "Broker inbox full, dropping value"
                );
                Err(BrokerError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("Dropping value published after broker stop");
                Err(BrokerError::Stopped)
            }
        }
    }

    /// Register a new subscriber.
    ///
    /// It receives only values dispatched after this call returns.
    pub async fn subscribe(&self) -> Result<Subscription<T>, BrokerError> {
        let mut subscribers = self.subscribers.write().await;
        // Checked under the lock so stop() cannot miss a late registration
        if self.stopped.load(Ordering::Acquire) {
            return Err(BrokerError::Stopped);
        }
        if subscribers.len() >= self.config.max_subscribers {
            return Err(BrokerError::TooManySubscribers(self.config.max_subscribers));
        }

        let id = Uuid::new_v4();
        let queue = Arc::new(SubscriberQueue::new(self.config.subscriber_capacity));
        subscribers.insert(id, Arc::clone(&queue));

        tracing::info!(subscriber_id = %id, "Subscriber registered");
        Ok(Subscription::new(id, queue))
    }

    /// Remove `subscription`; returns whether it was registered.
    pub async fn unsubscribe(&self, subscription: &Subscription<T>) -> bool {
        self.unsubscribe_id(subscription.id()).await
    }

    /// Remove the subscription with `id`; returns whether it was registered.
    ///
    /// Anything still queued for it is discarded.
    pub async fn unsubscribe_id(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(&id);
        match removed {
            Some(queue) => {
                queue.close_and_clear();
                tracing::info!(subscriber_id = %id, "Subscriber removed");
                true
            }
            None => false,
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.dispatch.lock().await, Dispatch::Running { .. })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }
}

async fn dispatch_loop<T: Clone>(
    mut inbox: mpsc::Receiver<T>,
    subscribers: Registry<T>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let value = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            value = inbox.recv() => match value {
                Some(value) => value,
                None => break,
            },
        };

        // Read lock: registrations wait until this fan-out is done
        let current = subscribers.read().await;
        let mut overflowed = 0usize;
        for queue in current.values() {
            if !queue.push(value.clone()) {
                overflowed += 1;
            }
        }

        if overflowed > 0 {
            tracing::debug!(
                subscribers = current.len(),
                overflowed,
                "Slow subscribers dropped their oldest value"
            );
        } else {
            tracing::trace!(subscribers = current.len(), "Dispatched value");
        }
    }

    tracing::debug!("Broker dispatch loop exited");
}

/// Errors that can occur in the broker
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Too many subscribers (limit: {0})")]
    TooManySubscribers(usize),

    #[error("Broker inbox is full")]
    QueueFull,

    #[error("Broker is stopped")]
    Stopped,

    #[error("Broker already started")]
    AlreadyStarted,

    #[error("Broker already stopped")]
    AlreadyStopped,
}
