use std::{
    any::type_name,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Observer callback for events of type `E`.
///
/// Callbacks run on a dedicated task per listener, never while orchestrator
/// locks are held, so a listener may freely call back into the orchestrator.
pub trait Listener<E>: Send + Sync {
    fn on_event(&self, event: &E) -> anyhow::Result<()>;

    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// Adapter turning a closure into a [`Listener`].
pub struct FnListener<F> {
    name: &'static str,
    f: F,
}

impl<F> fmt::Debug for FnListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnListener").field("name", &self.name).finish()
    }
}

impl<E, F> Listener<E> for FnListener<F>
where
    F: Fn(&E) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &E) -> anyhow::Result<()> {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Wrap a closure as a named listener.
pub fn listener_fn<E, F>(name: &'static str, f: F) -> Arc<dyn Listener<E>>
where
    E: 'static,
    F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnListener { name, f })
}

/// Lightweight in-process event bus that fans out notifications to any
/// number of observers. Delivery order per publisher is the publish order;
/// a failing or panicking listener only affects itself.
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
    capacity: usize,
    shutdown: CancellationToken,
    next_listener_id: AtomicU64,
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("event_type", &type_name::<E>())
            .field("channel_capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl<E> EventBus<E>
where
    E: Clone + Send + 'static,
{
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            capacity: capacity.max(1),
            shutdown: CancellationToken::new(),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// Publish to every current subscriber. Having no subscribers is fine.
    pub fn publish(&self, event: E) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Attach a callback listener. Every event published after this call
    /// returns is delivered to it, in publish order.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register_listener(
        &self,
        listener: Arc<dyn Listener<E>>,
    ) -> ListenerHandle {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let mut rx = self.sender.subscribe();
        let token = self.shutdown.child_token();
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => deliver(id, listener.as_ref(), &event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                target: "rampart::events",
                                listener_id = id,
                                listener = listener.name(),
                                "listener lagged, skipped {skipped} events"
                            );
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            debug!(target: "rampart::events", listener_id = id, "listener detached");
        });

        ListenerHandle { id, token, task }
    }

    /// Detach every registered listener.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

fn deliver<E>(id: u64, listener: &dyn Listener<E>, event: &E) {
    match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(
                target: "rampart::events",
                listener_id = id,
                listener = listener.name(),
                error = %err,
                "listener failed to handle event"
            );
        }
        Err(_) => {
            warn!(
                target: "rampart::events",
                listener_id = id,
                listener = listener.name(),
                "listener panicked while handling event"
            );
        }
    }
}

/// Registration returned by [`EventBus::register_listener`].
#[derive(Debug)]
pub struct ListenerHandle {
    id: u64,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }

    /// Stop delivering events to this listener and wait for its task to exit.
    pub async fn unregister(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}
