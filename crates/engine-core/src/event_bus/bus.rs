use model::events::Event;
use std::{
    collections::HashMap,
    marker::PhantomData,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

type Subscribers<E> = HashMap<u64, mpsc::Sender<Arc<E>>>;

#[derive(Debug)]
struct Registry<E> {
    subscribers: Subscribers<E>,
    next_id: u64,
}

/// Fan-out of one event type to bounded per-subscriber channels.
///
/// Publishing never blocks: a full channel drops the event for that
/// subscriber. Dropping a receiver unsubscribes it; the sender is pruned on
/// the next publish.
#[derive(Debug, Clone)]
pub struct EventBus<E> {
    registry: Arc<Mutex<Registry<E>>>,
    capacity: usize,
    _event: PhantomData<fn(E)>,
}

impl<E: Event> EventBus<E> {
    pub fn new(capacity: usize) -> Self {
        EventBus {
            registry: Arc::new(Mutex::new(Registry {
                subscribers: HashMap::new(),
                next_id: 0,
            })),
            capacity: capacity.max(1),
            _event: PhantomData,
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry<E>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> mpsc::Receiver<Arc<E>> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut registry = self.registry();

        let subscriber_id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(subscriber_id, sender);

        debug!(
            event_type = std::any::type_name::<E>(),
            subscriber_id = subscriber_id,
            "Subscribed to event"
        );

        receiver
    }

    pub fn publish(&self, event: E) {
        let event_type = event.event_type();
        let event = Arc::new(event);
        let mut registry = self.registry();

        if registry.subscribers.is_empty() {
            debug!(event_type, "No subscribers for event");
            return;
        }

        registry
            .subscribers
            .retain(|subscriber_id, sender| match sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        event_type,
                        subscriber_id = subscriber_id,
                        "Dropped event for slow subscriber (channel full)"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(
                        event_type,
                        subscriber_id = subscriber_id,
                        "Pruned closed subscriber"
                    );
                    false
                }
            });
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().subscribers.len()
    }

    pub fn clear(&self) {
        self.registry().subscribers.clear();
        debug!("Cleared all subscriptions from EventBus");
    }
}
