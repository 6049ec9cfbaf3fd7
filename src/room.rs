//! In-process chat backend. Used for offline runs and as the test double for
//! the event loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::TransportError;
use crate::models::Message;
use crate::transport::{PushSink, Subscription, Transport};

struct Subscriber {
    room_id: String,
    sink: PushSink,
}

type Subscribers = Arc<Mutex<HashMap<String, Subscriber>>>;

#[derive(Clone, Default)]
pub struct LocalRoom {
    history: Arc<RwLock<HashMap<String, Vec<Message>>>>, // room_id -> messages
    subscribers: Subscribers,                            // subscription id -> sink
    clock: Arc<AtomicU64>,
    offline: Arc<AtomicBool>,
    duplicate_delivery: Arc<AtomicBool>,
}

fn lock(subscribers: &Subscribers) -> MutexGuard<'_, HashMap<String, Subscriber>> {
    subscribers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalRoom {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with [`TransportError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Pushes every message twice, as an at-least-once channel may.
    pub fn set_duplicate_delivery(&self, enabled: bool) {
        self.duplicate_delivery.store(enabled, Ordering::SeqCst);
    }

    /// Fails every open push channel, as a dropped connection would.
    pub fn drop_subscribers(&self) {
        let dropped: Vec<Subscriber> = lock(&self.subscribers).drain().map(|(_, s)| s).collect();
        info!("dropping {} push subscribers", dropped.len());
        for subscriber in dropped {
            subscriber.sink.on_error(TransportError::Closed);
        }
    }

    pub fn subscriber_count(&self, room_id: &str) -> usize {
        lock(&self.subscribers)
            .values()
            .filter(|s| s.room_id == room_id)
            .count()
    }

    /// Stores and broadcasts a message exactly as given.
    pub async fn post(&self, message: Message) {
        {
            let mut history = self.history.write().await;
            history
                .entry(message.room_id.clone())
                .or_default()
                .push(message.clone());
        }
        self.broadcast(&message);
    }

    /// Stores a message without pushing it to anyone, e.g. one posted while
    /// a client was disconnected.
    pub async fn post_silently(&self, message: Message) {
        let mut history = self.history.write().await;
        history
            .entry(message.room_id.clone())
            .or_default()
            .push(message);
    }

    fn broadcast(&self, message: &Message) {
        let copies = if self.duplicate_delivery.load(Ordering::SeqCst) {
            2
        } else {
            1
        };
        let subscribers = lock(&self.subscribers);
        for subscriber in subscribers.values() {
            if subscriber.room_id == message.room_id {
                for _ in 0..copies {
                    subscriber.sink.on_message(message.clone());
                }
            }
        }
    }

    fn ensure_online(&self) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("local room is offline".into()));
        }
        Ok(())
    }

    /// Wall-clock milliseconds, forced to increase strictly.
    fn next_timestamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        let previous = self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }
}

#[async_trait]
impl Transport for LocalRoom {
    async fn fetch_history(&self, room_id: &str) -> Result<Vec<Message>, TransportError> {
        self.ensure_online()?;
        let history = self.history.read().await;
        Ok(history.get(room_id).cloned().unwrap_or_default())
    }

    async fn subscribe(
        &self,
        room_id: &str,
        sink: PushSink,
    ) -> Result<Subscription, TransportError> {
        self.ensure_online()?;
        let id = Uuid::new_v4().to_string();
        lock(&self.subscribers).insert(
            id.clone(),
            Subscriber {
                room_id: room_id.to_string(),
                sink,
            },
        );
        debug!("subscriber {id} joined room {room_id}");

        let subscribers = Arc::clone(&self.subscribers);
        Ok(Subscription::new(move || {
            lock(&subscribers).remove(&id);
            debug!("subscriber {id} released");
        }))
    }

    async fn submit(
        &self,
        room_id: &str,
        content: &str,
        recipient_email: Option<&str>,
        sender_email: &str,
    ) -> Result<Message, TransportError> {
        self.ensure_online()?;
        if content.trim().is_empty() {
            return Err(TransportError::Rejected("content must not be empty".into()));
        }
        let message = Message {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            content: content.to_string(),
            created_at: self.next_timestamp(),
            sender_display: None,
            sender_email: Some(sender_email.to_string()),
            recipient_email: recipient_email.map(str::to_owned),
        };
        self.post(message.clone()).await;
        Ok(message)
    }
}
