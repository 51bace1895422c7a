// Native deliveries (token rotations, messages, taps) funnelled through one
// queue and applied one at a time, in arrival order

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::dispatcher::CommandDispatcher;
use super::message::FcmMessage;
use super::provider::operation;
use super::receiver::BackgroundReceiver;
use super::{FcmError, FcmResult};

/// Native listener names the host subscribes to
pub mod listener {
    pub const TOKEN_REFRESH: &str = "tokenRefresh";
    pub const TOKEN_ERROR: &str = "tokenError";
    pub const MESSAGE_RECEIVED: &str = "messageReceived";

    pub const ALL: [&str; 3] = [TOKEN_REFRESH, TOKEN_ERROR, MESSAGE_RECEIVED];
}

/// A callback from the native push SDK
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    /// Rotated token, or the SDK's failure to produce one
    TokenRefresh(FcmResult<String>),
    Message(FcmMessage),
    /// Tap on a notification raised while in background
    Opened(BTreeMap<String, String>),
}

#[derive(Deserialize)]
struct NativeToken {
    token: String,
}

#[derive(Deserialize)]
struct NativeTokenError {
    #[serde(default)]
    error: String,
}

#[derive(Deserialize)]
struct NativeOpened {
    #[serde(default)]
    data: Option<BTreeMap<String, String>>,
    /// Serialized extras attached to the tapped notification
    #[serde(default)]
    message: Option<String>,
}

impl NativeOpened {
    fn into_extras(self) -> BTreeMap<String, String> {
        if let Some(data) = self.data {
            return data;
        }
        self.message
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }
}

impl NativeEvent {
    /// Decode the payload delivered on native listener `event`
    pub fn decode(event: &str, payload: Value) -> FcmResult<Self> {
        match event {
            listener::TOKEN_REFRESH => {
                let outcome = serde_json::from_value::<NativeToken>(payload)
                    .map(|native| native.token)
                    .map_err(FcmError::from);
                Ok(NativeEvent::TokenRefresh(outcome))
            },
            listener::TOKEN_ERROR => {
                let message = serde_json::from_value::<NativeTokenError>(payload)
                    .map(|native| native.error)
                    .unwrap_or_default();
                Ok(NativeEvent::TokenRefresh(Err(FcmError::provider(
                    operation::GET_TOKEN,
                    message,
                ))))
            },
            listener::MESSAGE_RECEIVED => {
                let tapped = payload
                    .get("fromBackground")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if tapped {
                    let extras = serde_json::from_value::<NativeOpened>(payload)
                        .map(NativeOpened::into_extras)
                        .unwrap_or_default();
                    Ok(NativeEvent::Opened(extras))
                } else {
                    Ok(NativeEvent::Message(serde_json::from_value(payload)?))
                }
            },
            other => Err(FcmError::bridge(format!("unknown native event `{}`", other))),
        }
    }
}

/// Sending half, cloned into every native listener
#[derive(Clone)]
pub struct InboundQueue {
    sender: mpsc::UnboundedSender<NativeEvent>,
}

impl InboundQueue {
    /// Queue an event; false once the pump has stopped
    pub fn push(&self, event: NativeEvent) -> bool {
        self.sender
            .send(event)
            .inspect_err(|_| tracing::warn!("inbound pump stopped, native event dropped"))
            .is_ok()
    }

    /// Decode and queue a raw listener payload
    pub fn push_payload(&self, event: &str, payload: Value) -> bool {
        match NativeEvent::decode(event, payload) {
            Ok(decoded) => self.push(decoded),
            Err(error) => {
                tracing::warn!(event, error = %error, "malformed native event");
                false
            },
        }
    }
}

/// Receiving half. A single pump owns the order in which native events
/// reach the receiver and dispatcher.
pub struct InboundPump {
    events: mpsc::UnboundedReceiver<NativeEvent>,
    dispatcher: Arc<CommandDispatcher>,
    receiver: Arc<BackgroundReceiver>,
}

pub fn inbound_channel(
    dispatcher: Arc<CommandDispatcher>,
    receiver: Arc<BackgroundReceiver>,
) -> (InboundQueue, InboundPump) {
    let (sender, events) = mpsc::unbounded_channel();
    (
        InboundQueue { sender },
        InboundPump {
            events,
            dispatcher,
            receiver,
        },
    )
}

impl InboundPump {
    /// Apply events until every queue handle is dropped
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.apply(event).await;
        }
        tracing::debug!("inbound queue closed");
    }

    async fn apply(&self, event: NativeEvent) {
        match event {
            NativeEvent::TokenRefresh(outcome) => {
                self.dispatcher.handle_token_refresh(outcome).await;
            },
            NativeEvent::Message(message) => {
                let delivery = self.receiver.on_message_received(message).await;
                tracing::debug!(?delivery, "native message handled");
            },
            NativeEvent::Opened(extras) => {
                self.receiver.on_notification_opened(extras).await;
            },
        }
    }
}
