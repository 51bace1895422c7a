// UI-side client: each command as a typed async call, each event tag as a
// typed subscription. Talks to the dispatcher through a `Bridge`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::dispatcher::{CommandDispatcher, SuccessResult, TopicResult};
use super::events::{
    EventKind, MessageReceivedEvent, Subscription, TokenDeletedEvent, TokenErrorEvent, TokenEvent,
    TopicEvent,
};
use super::message::FcmMessage;
use super::permission::PermissionStatus;
use super::{BoxFuture, FcmError, FcmResult};

/// Handler receiving an event's wire payload
pub type PayloadHandler = Box<dyn Fn(Value) + Send + Sync>;

/// Transport carrying named commands and named events
pub trait Bridge: Send + Sync {
    fn invoke<'a>(&'a self, command: &'a str, args: Value) -> BoxFuture<'a, FcmResult<Value>>;

    fn listen(&self, kind: EventKind, handler: PayloadHandler) -> FcmResult<Subscription>;
}

/// In-process bridge straight into a dispatcher. Payloads still go through
/// their JSON wire form.
#[derive(Clone)]
pub struct LocalBridge {
    dispatcher: Arc<CommandDispatcher>,
}

impl LocalBridge {
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl Bridge for LocalBridge {
    fn invoke<'a>(&'a self, command: &'a str, args: Value) -> BoxFuture<'a, FcmResult<Value>> {
        Box::pin(async move { self.dispatcher.invoke(command, &args).await })
    }

    fn listen(&self, kind: EventKind, handler: PayloadHandler) -> FcmResult<Subscription> {
        let subscription = self.dispatcher.emitter().subscribe(kind, move |event| {
            match event.payload() {
                Ok(payload) => handler(payload),
                Err(error) => tracing::warn!(event = %kind, error = %error, "unencodable event payload"),
            }
        });
        Ok(subscription)
    }
}

pub struct FcmClient<B: Bridge> {
    bridge: B,
}

impl<B: Bridge> FcmClient<B> {
    pub fn new(bridge: B) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub async fn get_token(&self) -> FcmResult<String> {
        self.call("getToken", Value::Null).await
    }

    pub async fn subscribe_to_topic(&self, topic: &str) -> FcmResult<TopicResult> {
        self.call("subscribeToTopic", json!({ "topic": topic })).await
    }

    pub async fn unsubscribe_from_topic(&self, topic: &str) -> FcmResult<TopicResult> {
        self.call("unsubscribeFromTopic", json!({ "topic": topic }))
            .await
    }

    pub async fn are_notifications_enabled(&self) -> FcmResult<bool> {
        self.call("areNotificationsEnabled", Value::Null).await
    }

    pub async fn request_notification_permission(&self) -> FcmResult<bool> {
        self.call("requestNotificationPermission", Value::Null).await
    }

    pub async fn delete_token(&self) -> FcmResult<SuccessResult> {
        self.call("deleteToken", Value::Null).await
    }

    pub async fn get_last_message(&self) -> FcmResult<Option<FcmMessage>> {
        self.call("getLastMessage", Value::Null).await
    }

    pub async fn check_permissions(&self) -> FcmResult<PermissionStatus> {
        self.call("checkPermissions", Value::Null).await
    }

    pub async fn request_permissions(&self) -> FcmResult<PermissionStatus> {
        self.call("requestPermissions", Value::Null).await
    }

    pub fn on_token_received<F>(&self, handler: F) -> FcmResult<Subscription>
    where
        F: Fn(TokenEvent) + Send + Sync + 'static,
    {
        self.typed_listener(EventKind::TokenReceived, handler)
    }

    pub fn on_token_refresh<F>(&self, handler: F) -> FcmResult<Subscription>
    where
        F: Fn(TokenEvent) + Send + Sync + 'static,
    {
        self.typed_listener(EventKind::TokenRefresh, handler)
    }

    pub fn on_token_error<F>(&self, handler: F) -> FcmResult<Subscription>
    where
        F: Fn(TokenErrorEvent) + Send + Sync + 'static,
    {
        self.typed_listener(EventKind::TokenError, handler)
    }

    pub fn on_topic_changed<F>(&self, handler: F) -> FcmResult<Subscription>
    where
        F: Fn(TopicEvent) + Send + Sync + 'static,
    {
        self.typed_listener(EventKind::TopicChanged, handler)
    }

    pub fn on_token_deleted<F>(&self, handler: F) -> FcmResult<Subscription>
    where
        F: Fn(TokenDeletedEvent) + Send + Sync + 'static,
    {
        self.typed_listener(EventKind::TokenDeleted, handler)
    }

    pub fn on_message_received<F>(&self, handler: F) -> FcmResult<Subscription>
    where
        F: Fn(MessageReceivedEvent) + Send + Sync + 'static,
    {
        self.typed_listener(EventKind::MessageReceived, handler)
    }

    async fn call<T: DeserializeOwned>(&self, command: &str, args: Value) -> FcmResult<T> {
        let value = self.bridge.invoke(command, args).await?;
        serde_json::from_value(value).map_err(|e| {
            FcmError::bridge(format!("unexpected `{}` result: {}", command, e))
        })
    }

    fn typed_listener<T, F>(&self, kind: EventKind, handler: F) -> FcmResult<Subscription>
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.bridge.listen(
            kind,
            Box::new(move |payload| match serde_json::from_value::<T>(payload) {
                Ok(event) => handler(event),
                Err(error) => {
                    tracing::warn!(event = %kind, error = %error, "dropping malformed event payload")
                },
            }),
        )
    }
}
