// Event surface of the bridge: tagged payloads pushed to UI subscribers
// Fire-and-forget; listeners attached after an emit never see it

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::message::FcmMessage;
use super::{FcmError, FcmResult, now_millis};

/// Event tags as they appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    TokenReceived,
    TokenRefresh,
    TokenError,
    TopicChanged,
    TokenDeleted,
    MessageReceived,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::TokenReceived,
        EventKind::TokenRefresh,
        EventKind::TokenError,
        EventKind::TopicChanged,
        EventKind::TokenDeleted,
        EventKind::MessageReceived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TokenReceived => "tokenReceived",
            EventKind::TokenRefresh => "tokenRefresh",
            EventKind::TokenError => "tokenError",
            EventKind::TopicChanged => "topicChanged",
            EventKind::TokenDeleted => "tokenDeleted",
            EventKind::MessageReceived => "messageReceived",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = FcmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FcmError::invalid_argument("event", format!("unknown event `{}`", s)))
    }
}

/// Payload of `tokenReceived` and `tokenRefresh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEvent {
    pub token: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl TokenEvent {
    pub fn now(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            timestamp: now_millis(),
        }
    }
}

/// Payload of `tokenError`. Carries no timestamp, unlike the other token events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenErrorEvent {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicAction {
    Subscribed,
    Unsubscribed,
}

/// Payload of `topicChanged`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEvent {
    pub topic: String,
    pub action: TopicAction,
}

/// Payload of `tokenDeleted`; `action` is always `"deleted"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDeletedEvent {
    pub action: String,
}

impl Default for TokenDeletedEvent {
    fn default() -> Self {
        Self {
            action: "deleted".to_string(),
        }
    }
}

/// Payload of `messageReceived`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceivedEvent {
    #[serde(flatten)]
    pub message: FcmMessage,
    /// Set only when the message is replayed from a background notification tap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_background: Option<bool>,
}

impl MessageReceivedEvent {
    pub fn foreground(message: FcmMessage) -> Self {
        Self {
            message,
            from_background: None,
        }
    }

    pub fn from_background(message: FcmMessage) -> Self {
        Self {
            message,
            from_background: Some(true),
        }
    }
}

/// A tagged event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FcmEvent {
    TokenReceived(TokenEvent),
    TokenRefresh(TokenEvent),
    TokenError(TokenErrorEvent),
    TopicChanged(TopicEvent),
    TokenDeleted(TokenDeletedEvent),
    MessageReceived(MessageReceivedEvent),
}

impl FcmEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            FcmEvent::TokenReceived(_) => EventKind::TokenReceived,
            FcmEvent::TokenRefresh(_) => EventKind::TokenRefresh,
            FcmEvent::TokenError(_) => EventKind::TokenError,
            FcmEvent::TopicChanged(_) => EventKind::TopicChanged,
            FcmEvent::TokenDeleted(_) => EventKind::TokenDeleted,
            FcmEvent::MessageReceived(_) => EventKind::MessageReceived,
        }
    }

    pub fn token_error(error: impl Into<String>) -> Self {
        FcmEvent::TokenError(TokenErrorEvent {
            error: error.into(),
        })
    }

    pub fn topic_changed(topic: impl Into<String>, action: TopicAction) -> Self {
        FcmEvent::TopicChanged(TopicEvent {
            topic: topic.into(),
            action,
        })
    }

    /// Wire payload without the tag
    pub fn payload(&self) -> FcmResult<Value> {
        let value = match self {
            FcmEvent::TokenReceived(event) | FcmEvent::TokenRefresh(event) => {
                serde_json::to_value(event)?
            },
            FcmEvent::TokenError(event) => serde_json::to_value(event)?,
            FcmEvent::TopicChanged(event) => serde_json::to_value(event)?,
            FcmEvent::TokenDeleted(event) => serde_json::to_value(event)?,
            FcmEvent::MessageReceived(event) => serde_json::to_value(event)?,
        };
        Ok(value)
    }

    /// Rebuild an event from its tag and wire payload
    pub fn from_payload(kind: EventKind, payload: Value) -> FcmResult<Self> {
        let event = match kind {
            EventKind::TokenReceived => FcmEvent::TokenReceived(serde_json::from_value(payload)?),
            EventKind::TokenRefresh => FcmEvent::TokenRefresh(serde_json::from_value(payload)?),
            EventKind::TokenError => FcmEvent::TokenError(serde_json::from_value(payload)?),
            EventKind::TopicChanged => FcmEvent::TopicChanged(serde_json::from_value(payload)?),
            EventKind::TokenDeleted => FcmEvent::TokenDeleted(serde_json::from_value(payload)?),
            EventKind::MessageReceived => {
                FcmEvent::MessageReceived(serde_json::from_value(payload)?)
            },
        };
        Ok(event)
    }
}

type Listener = Arc<dyn Fn(&FcmEvent) + Send + Sync>;

struct EmitterInner {
    listeners: DashMap<EventKind, Vec<(u64, Listener)>>,
    next_id: AtomicU64,
    // Serializes deliveries so same-tag events reach listeners in emission order.
    // Reentrant so a listener may emit.
    delivery: ReentrantMutex<()>,
    deferred: Mutex<Option<mpsc::UnboundedSender<Deferred>>>,
}

enum Deferred {
    Emit(FcmEvent),
    Flush(oneshot::Sender<()>),
}

impl EmitterInner {
    fn remove(&self, kind: EventKind, id: u64) {
        if let Some(mut entry) = self.listeners.get_mut(&kind) {
            entry.retain(|(listener_id, _)| *listener_id != id);
        }
    }
}

/// Delivers events to whichever listeners are registered for the tag right now
#[derive(Clone)]
pub struct EventEmitter {
    inner: Arc<EmitterInner>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                listeners: DashMap::new(),
                next_id: AtomicU64::new(1),
                delivery: ReentrantMutex::new(()),
                deferred: Mutex::new(None),
            }),
        }
    }

    /// Register a listener; it stays registered until the returned handle is
    /// dropped or unsubscribed
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&FcmEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.remove(kind, id);
            }
        })
    }

    /// Deliver `event` and return how many listeners saw it
    pub fn emit(&self, event: FcmEvent) -> usize {
        let _ordered = self.inner.delivery.lock();
        let kind = event.kind();

        // Snapshot so listeners can (un)subscribe without holding the map shard
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .get(&kind)
            .map(|entry| entry.iter().map(|(_, listener)| Arc::clone(listener)).collect())
            .unwrap_or_default();

        tracing::debug!(event = %kind, listeners = listeners.len(), "emitting event");

        for listener in &listeners {
            listener(&event);
        }
        listeners.len()
    }

    /// Deliver `event` from the emitter's own drain task, after the current
    /// task has moved on. Deferred events keep their queue order. Outside a
    /// tokio runtime the event is delivered right away.
    pub fn emit_deferred(&self, event: FcmEvent) {
        if let Err(Deferred::Emit(event)) = self.enqueue(Deferred::Emit(event)) {
            self.emit(event);
        }
    }

    /// Wait until every event deferred so far has been delivered
    pub async fn flush(&self) {
        let (done, delivered) = oneshot::channel();
        if self.enqueue(Deferred::Flush(done)).is_ok() {
            let _ = delivered.await;
        }
    }

    fn enqueue(&self, item: Deferred) -> Result<(), Deferred> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Err(item);
        };
        let mut queue = self.inner.deferred.lock();
        let item = match queue.as_ref() {
            Some(sender) => match sender.send(item) {
                Ok(()) => return Ok(()),
                // Drain task went away with its runtime
                Err(mpsc::error::SendError(item)) => item,
            },
            None => item,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        runtime.spawn(drain_deferred(Arc::downgrade(&self.inner), receiver));
        let queued = sender.send(item).map_err(|mpsc::error::SendError(item)| item);
        *queue = Some(sender);
        queued
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .listeners
            .get(&kind)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }
}

async fn drain_deferred(inner: Weak<EmitterInner>, mut queue: mpsc::UnboundedReceiver<Deferred>) {
    while let Some(item) = queue.recv().await {
        match item {
            Deferred::Emit(event) => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                EventEmitter { inner }.emit(event);
            },
            Deferred::Flush(done) => {
                let _ = done.send(());
            },
        }
    }
}

/// Disposable listener handle; dropping it unlistens
pub struct Subscription {
    unlisten: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new<F>(unlisten: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            unlisten: Some(Box::new(unlisten)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the listener registered for the lifetime of the emitter
    pub fn detach(mut self) {
        self.unlisten = None;
    }

    pub fn is_active(&self) -> bool {
        self.unlisten.is_some()
    }

    fn release(&mut self) {
        if let Some(unlisten) = self.unlisten.take() {
            unlisten();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
