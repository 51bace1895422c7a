// Command dispatcher: named bridge commands -> provider calls -> resolve/reject
// Commands are independent; none retries, none is cancellable once issued

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;

use super::config::FcmConfig;
use super::events::{EventEmitter, FcmEvent, TokenDeletedEvent, TokenEvent, TopicAction};
use super::message::FcmMessage;
use super::permission::{PermissionShim, PermissionStatus};
use super::provider::{NotificationProvider, Topic, operation};
use super::store::Preferences;
use super::token::SharedTokenState;
use super::trace::CommandTrace;
use super::{BoxFuture, FcmError, FcmResult};

/// Result of `subscribeToTopic` / `unsubscribeFromTopic`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicResult {
    pub topic: String,
    pub success: bool,
}

/// Result of `deleteToken`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResult {
    pub success: bool,
}

/// A parsed bridge command with its typed arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    GetToken,
    SubscribeToTopic { topic: Topic },
    UnsubscribeFromTopic { topic: Topic },
    AreNotificationsEnabled,
    RequestNotificationPermission,
    DeleteToken,
    GetLastMessage,
    CheckPermissions,
    RequestPermissions,
}

impl BridgeCommand {
    /// Parse a command name (camelCase wire name or snake_case handler name)
    /// and its JSON arguments. Argument errors surface here, before any
    /// vendor call.
    pub fn parse(name: &str, args: &Value) -> FcmResult<Self> {
        let command = match name {
            "getToken" | "get_token" => BridgeCommand::GetToken,
            "subscribeToTopic" | "subscribe_to_topic" => BridgeCommand::SubscribeToTopic {
                topic: topic_argument(args)?,
            },
            "unsubscribeFromTopic" | "unsubscribe_from_topic" => {
                BridgeCommand::UnsubscribeFromTopic {
                    topic: topic_argument(args)?,
                }
            },
            "areNotificationsEnabled" | "are_notifications_enabled" => {
                BridgeCommand::AreNotificationsEnabled
            },
            "requestNotificationPermission" | "request_notification_permission" => {
                BridgeCommand::RequestNotificationPermission
            },
            "deleteToken" | "delete_token" => BridgeCommand::DeleteToken,
            "getLastMessage" | "get_last_message" => BridgeCommand::GetLastMessage,
            "checkPermissions" | "check_permissions" => BridgeCommand::CheckPermissions,
            "requestPermissions" | "request_permissions" => BridgeCommand::RequestPermissions,
            other => {
                return Err(FcmError::invalid_argument(
                    "command",
                    format!("unknown command `{}`", other),
                ));
            },
        };
        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BridgeCommand::GetToken => "getToken",
            BridgeCommand::SubscribeToTopic { .. } => "subscribeToTopic",
            BridgeCommand::UnsubscribeFromTopic { .. } => "unsubscribeFromTopic",
            BridgeCommand::AreNotificationsEnabled => "areNotificationsEnabled",
            BridgeCommand::RequestNotificationPermission => "requestNotificationPermission",
            BridgeCommand::DeleteToken => "deleteToken",
            BridgeCommand::GetLastMessage => "getLastMessage",
            BridgeCommand::CheckPermissions => "checkPermissions",
            BridgeCommand::RequestPermissions => "requestPermissions",
        }
    }
}

fn topic_argument(args: &Value) -> FcmResult<Topic> {
    match args.get("topic") {
        Some(Value::String(raw)) => Topic::parse(raw),
        Some(Value::Null) | None => Err(FcmError::invalid_argument(
            "topic",
            "missing required argument",
        )),
        Some(_) => Err(FcmError::invalid_argument("topic", "expected a string")),
    }
}

pub struct CommandDispatcher {
    provider: Arc<dyn NotificationProvider>,
    emitter: EventEmitter,
    tokens: SharedTokenState,
    preferences: Arc<Preferences>,
    permissions: PermissionShim,
    timeout: Duration,
    fetch_token_on_start: bool,
}

impl CommandDispatcher {
    pub fn new(
        provider: Arc<dyn NotificationProvider>,
        emitter: EventEmitter,
        tokens: SharedTokenState,
        preferences: Arc<Preferences>,
        config: &FcmConfig,
    ) -> Self {
        let permissions = PermissionShim::new(
            Arc::clone(&provider),
            config.permission_flow,
            config.command_timeout(),
        );
        Self {
            provider,
            emitter,
            tokens,
            preferences,
            permissions,
            timeout: config.command_timeout(),
            fetch_token_on_start: config.fetch_token_on_start,
        }
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Wait for the events of already resolved commands to be delivered
    pub async fn flush_events(&self) {
        self.emitter.flush().await
    }

    pub fn permissions(&self) -> &PermissionShim {
        &self.permissions
    }

    /// Last token seen by this process; `None` after a delete
    pub fn current_token(&self) -> Option<String> {
        self.tokens.lock().current().map(str::to_string)
    }

    /// Route a named command from the bridge and encode its result
    pub async fn invoke(&self, name: &str, args: &Value) -> FcmResult<Value> {
        let command = BridgeCommand::parse(name, args).inspect_err(|error| {
            tracing::warn!(command = name, error = %error, "rejected command arguments");
        })?;
        self.dispatch(command).await
    }

    pub async fn dispatch(&self, command: BridgeCommand) -> FcmResult<Value> {
        let value = match command {
            BridgeCommand::GetToken => serde_json::to_value(self.get_token().await?)?,
            BridgeCommand::SubscribeToTopic { topic } => {
                serde_json::to_value(self.subscribe(topic).await?)?
            },
            BridgeCommand::UnsubscribeFromTopic { topic } => {
                serde_json::to_value(self.unsubscribe(topic).await?)?
            },
            BridgeCommand::AreNotificationsEnabled => {
                serde_json::to_value(self.are_notifications_enabled().await)?
            },
            BridgeCommand::RequestNotificationPermission => {
                serde_json::to_value(self.request_notification_permission().await)?
            },
            BridgeCommand::DeleteToken => serde_json::to_value(self.delete_token().await?)?,
            BridgeCommand::GetLastMessage => serde_json::to_value(self.get_last_message().await)?,
            BridgeCommand::CheckPermissions => {
                serde_json::to_value(self.check_permissions().await)?
            },
            BridgeCommand::RequestPermissions => {
                serde_json::to_value(self.request_permissions().await)?
            },
        };
        Ok(value)
    }

    pub async fn get_token(&self) -> FcmResult<String> {
        traced("getToken", async {
            let token = self.bounded(operation::GET_TOKEN, self.provider.fetch_token()).await?;
            self.remember_token(&token).await;
            Ok(token)
        })
        .await
    }

    pub async fn subscribe_to_topic(&self, topic: &str) -> FcmResult<TopicResult> {
        let topic = Topic::parse(topic)?;
        self.subscribe(topic).await
    }

    pub async fn unsubscribe_from_topic(&self, topic: &str) -> FcmResult<TopicResult> {
        let topic = Topic::parse(topic)?;
        self.unsubscribe(topic).await
    }

    async fn subscribe(&self, topic: Topic) -> FcmResult<TopicResult> {
        traced("subscribeToTopic", async {
            self.bounded(operation::SUBSCRIBE, self.provider.subscribe_to_topic(&topic))
                .await?;
            let result = TopicResult {
                topic: topic.to_string(),
                success: true,
            };
            // Delivered only after this command has resolved
            self.emitter
                .emit_deferred(FcmEvent::topic_changed(topic.as_str(), TopicAction::Subscribed));
            Ok(result)
        })
        .await
    }

    async fn unsubscribe(&self, topic: Topic) -> FcmResult<TopicResult> {
        traced("unsubscribeFromTopic", async {
            self.bounded(
                operation::UNSUBSCRIBE,
                self.provider.unsubscribe_from_topic(&topic),
            )
            .await?;
            let result = TopicResult {
                topic: topic.to_string(),
                success: true,
            };
            self.emitter.emit_deferred(FcmEvent::topic_changed(
                topic.as_str(),
                TopicAction::Unsubscribed,
            ));
            Ok(result)
        })
        .await
    }

    /// Never fails; any OS error reads as disabled
    pub async fn are_notifications_enabled(&self) -> bool {
        let trace = CommandTrace::start("areNotificationsEnabled");
        let enabled = self
            .permissions
            .are_notifications_enabled()
            .instrument(trace.span())
            .await;
        trace.finish::<_, FcmError>(&Ok(enabled));
        enabled
    }

    pub async fn request_notification_permission(&self) -> bool {
        let trace = CommandTrace::start("requestNotificationPermission");
        let granted = self
            .permissions
            .request_notification_permission()
            .instrument(trace.span())
            .await;
        trace.finish::<_, FcmError>(&Ok(granted));
        granted
    }

    pub async fn check_permissions(&self) -> PermissionStatus {
        self.permissions.check_permissions().await
    }

    pub async fn request_permissions(&self) -> PermissionStatus {
        self.permissions.request_permissions().await
    }

    /// Delete the token at the vendor, forget it locally and announce it.
    /// Deleting when no token was ever fetched is a vendor no-op and still
    /// announces.
    pub async fn delete_token(&self) -> FcmResult<SuccessResult> {
        traced("deleteToken", async {
            self.bounded(operation::DELETE_TOKEN, self.provider.delete_token())
                .await?;
            self.tokens.lock().clear();
            if let Err(error) = self.preferences.set_token(None).await {
                tracing::warn!(error = %error, "failed to clear persisted token");
            }
            let result = SuccessResult { success: true };
            self.emitter
                .emit_deferred(FcmEvent::TokenDeleted(TokenDeletedEvent::default()));
            Ok(result)
        })
        .await
    }

    pub async fn get_last_message(&self) -> Option<FcmMessage> {
        self.preferences.last_message()
    }

    /// Startup fetch: announce the token, or the failure as `tokenError`
    pub async fn announce_token(&self) {
        if !self.fetch_token_on_start {
            return;
        }
        match self.bounded(operation::GET_TOKEN, self.provider.fetch_token()).await {
            Ok(token) => {
                self.remember_token(&token).await;
                self.emitter.emit(FcmEvent::TokenReceived(TokenEvent::now(token)));
            },
            Err(error) => {
                tracing::warn!(error = %error, "initial token fetch failed");
                self.emitter.emit(FcmEvent::token_error(error.to_string()));
            },
        }
    }

    /// Outcome of the provider's own token refresh listener
    pub async fn handle_token_refresh(&self, outcome: FcmResult<String>) {
        match outcome {
            Ok(token) => {
                let refreshed = self.tokens.lock().observe_refresh(&token);
                match refreshed {
                    Some(event) => {
                        self.persist_token(&token).await;
                        self.emitter.emit(FcmEvent::TokenRefresh(event));
                    },
                    None => tracing::debug!("token refresh reported an unchanged token"),
                }
            },
            Err(error) => {
                let message = match error {
                    FcmError::Provider { message, .. } if !message.is_empty() => message,
                    FcmError::Provider { .. } => "Token refresh failed".to_string(),
                    other => other.to_string(),
                };
                self.emitter.emit(FcmEvent::token_error(message));
            },
        }
    }

    async fn remember_token(&self, token: &str) {
        self.tokens.lock().observe_fetch(token);
        if self.preferences.token().as_deref() != Some(token) {
            self.persist_token(token).await;
        }
    }

    async fn persist_token(&self, token: &str) {
        if let Err(error) = self.preferences.set_token(Some(token.to_string())).await {
            tracing::warn!(error = %error, "failed to persist token");
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: BoxFuture<'_, FcmResult<T>>,
    ) -> FcmResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FcmError::TimedOut {
                operation: operation.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

async fn traced<T, F>(command: &'static str, body: F) -> FcmResult<T>
where
    F: Future<Output = FcmResult<T>>,
{
    let trace = CommandTrace::start(command);
    let outcome = body.instrument(trace.span()).await;
    trace.finish(&outcome);
    outcome
}
