use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use claycoins_types::models::ChatMessage;

/// Messages kept for sessions that join late.
pub const REPLAY_CAPACITY: usize = 50;

/// Fans accepted chat messages out to every live subscriber.
///
/// Each subscriber owns a bounded queue. Publishing never waits: a full or
/// closed queue gets its subscriber dropped from the registry, and nobody
/// else notices.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    state: Mutex<HubState>,
    subscriber_buffer: usize,
}

struct HubState {
    replay: VecDeque<ChatMessage>,
    subscribers: HashMap<Uuid, mpsc::Sender<ChatMessage>>,
}

impl HubInner {
    // Critical sections never panic, but a poisoned lock still holds
    // consistent data.
    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BroadcastHub {
    pub fn new(subscriber_buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                state: Mutex::new(HubState {
                    replay: VecDeque::with_capacity(REPLAY_CAPACITY),
                    subscribers: HashMap::new(),
                }),
                subscriber_buffer: subscriber_buffer.max(1),
            }),
        }
    }

    /// Start a new subscription. It yields the replay buffer first (oldest
    /// first), then every message published after this call.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.inner.subscriber_buffer);

        // Snapshot and register under one lock so nothing published
        // concurrently is either missed or seen twice.
        let backlog = {
            let mut state = self.inner.state();
            state.subscribers.insert(id, tx);
            state.replay.clone()
        };

        debug!("Subscriber {} joined with {} replayed messages", id, backlog.len());
        Subscription {
            id,
            backlog,
            rx,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `message` to every subscriber and remember it for late
    /// joiners. Returns how many subscribers it was queued for.
    pub fn publish(&self, message: ChatMessage) -> usize {
        let mut state = self.inner.state();

        if state.replay.len() == REPLAY_CAPACITY {
            state.replay.pop_front();
        }
        state.replay.push_back(message.clone());

        let mut delivered = 0;
        state.subscribers.retain(|id, tx| match tx.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("Subscriber {} fell behind, dropping it", id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Subscriber {} already gone", id);
                false
            }
        });

        delivered
    }

    /// Forget a message so later subscribers do not replay it. Subscribers
    /// that already received it are unaffected.
    pub fn retract(&self, message_id: i64) -> bool {
        let mut state = self.inner.state();
        let before = state.replay.len();
        state.replay.retain(|m| m.message_id != message_id);
        state.replay.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state().subscribers.len()
    }

    pub fn replay_len(&self) -> usize {
        self.inner.state().replay.len()
    }
}

/// A live, infinite feed of chat messages. Dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    backlog: VecDeque<ChatMessage>,
    rx: mpsc::Receiver<ChatMessage>,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next message. `None` means the hub dropped this subscriber (it fell
    /// behind) or the hub itself is gone.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        if let Some(message) = self.backlog.pop_front() {
            return Some(message);
        }
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.state().subscribers.remove(&self.id);
        }
    }
}
