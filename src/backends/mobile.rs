// Mobile backend: forwards provider calls to the native Android/iOS plugin
// and feeds native deliveries back into the receiver

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tauri::Runtime;
use tauri::ipc::{Channel, InvokeResponseBody};
use tauri::plugin::{PluginApi, PluginHandle, mobile::PluginInvokeError};

use crate::components::inbound::{inbound_channel, listener};
use crate::components::{
    BackgroundReceiver, BoxFuture, CommandDispatcher, FcmError, FcmResult, LocalNotification,
    LocalNotifier, NotificationProvider, PermissionState, PermissionStatus, Topic,
    provider::operation,
};

#[cfg(target_os = "ios")]
tauri::ios_plugin_binding!(init_plugin_fcm);

#[cfg(target_os = "android")]
const ANDROID_PLUGIN_PACKAGE: &str = "app.tauri.plugin.fcm";
#[cfg(target_os = "android")]
const ANDROID_PLUGIN_CLASS: &str = "FcmPlugin";

/// Register the native plugin for the current mobile target
pub fn register<R: Runtime, C: serde::de::DeserializeOwned>(
    api: &PluginApi<R, C>,
) -> FcmResult<PluginHandle<R>> {
    #[cfg(target_os = "android")]
    let handle = api.register_android_plugin(ANDROID_PLUGIN_PACKAGE, ANDROID_PLUGIN_CLASS);
    #[cfg(target_os = "ios")]
    let handle = api.register_ios_plugin(init_plugin_fcm);

    handle.map_err(|e| FcmError::bridge(format!("failed to register native plugin: {}", e)))
}

#[derive(Serialize)]
struct TopicArgs<'a> {
    topic: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenResponse {
    Bare(String),
    Wrapped { token: String },
}

impl TokenResponse {
    fn into_token(self) -> String {
        match self {
            TokenResponse::Bare(token) | TokenResponse::Wrapped { token } => token,
        }
    }
}

/// Native rejections already read `Failed to <operation>: <reason>`; keep only
/// the reason so it is not wrapped twice
fn rejection(operation: &'static str, error: PluginInvokeError) -> FcmError {
    let message = match error {
        PluginInvokeError::InvokeRejected(response) => response
            .message
            .unwrap_or_else(|| "unknown native error".to_string()),
        other => other.to_string(),
    };
    let prefix = format!("Failed to {}: ", operation);
    let message = message
        .strip_prefix(&prefix)
        .map(str::to_string)
        .unwrap_or(message);
    FcmError::provider(operation, message)
}

pub struct MobileProvider<R: Runtime> {
    handle: PluginHandle<R>,
}

impl<R: Runtime> MobileProvider<R> {
    pub fn new(handle: PluginHandle<R>) -> Self {
        Self { handle }
    }

    async fn run<T, P>(&self, operation: &'static str, command: &str, payload: P) -> FcmResult<T>
    where
        T: serde::de::DeserializeOwned,
        P: Serialize,
    {
        self.handle
            .run_mobile_plugin_async(command, payload)
            .await
            .map_err(|e| rejection(operation, e))
    }

    async fn post_notification(
        &self,
        operation: &'static str,
        command: &str,
    ) -> FcmResult<PermissionState> {
        let status: PermissionStatus = self
            .run(operation, command, ())
            .await
            .map_err(|error| FcmError::PermissionUnavailable {
                message: error.to_string(),
            })?;
        Ok(status.post_notification)
    }
}

impl<R: Runtime> NotificationProvider for MobileProvider<R> {
    fn platform(&self) -> &'static str {
        std::env::consts::OS
    }

    fn fetch_token(&self) -> BoxFuture<'_, FcmResult<String>> {
        Box::pin(async move {
            let response: TokenResponse = self.run(operation::GET_TOKEN, "getToken", ()).await?;
            Ok(response.into_token())
        })
    }

    fn subscribe_to_topic<'a>(&'a self, topic: &'a Topic) -> BoxFuture<'a, FcmResult<()>> {
        Box::pin(async move {
            let _: Value = self
                .run(
                    operation::SUBSCRIBE,
                    "subscribeToTopic",
                    TopicArgs {
                        topic: topic.as_str(),
                    },
                )
                .await?;
            Ok(())
        })
    }

    fn unsubscribe_from_topic<'a>(&'a self, topic: &'a Topic) -> BoxFuture<'a, FcmResult<()>> {
        Box::pin(async move {
            let _: Value = self
                .run(
                    operation::UNSUBSCRIBE,
                    "unsubscribeFromTopic",
                    TopicArgs {
                        topic: topic.as_str(),
                    },
                )
                .await?;
            Ok(())
        })
    }

    fn delete_token(&self) -> BoxFuture<'_, FcmResult<()>> {
        Box::pin(async move {
            let _: Value = self.run(operation::DELETE_TOKEN, "deleteToken", ()).await?;
            Ok(())
        })
    }

    fn notification_permission(&self) -> BoxFuture<'_, FcmResult<PermissionState>> {
        Box::pin(self.post_notification(operation::CHECK_PERMISSION, "checkPermissions"))
    }

    fn request_notification_permission(&self) -> BoxFuture<'_, FcmResult<PermissionState>> {
        Box::pin(self.post_notification(operation::REQUEST_PERMISSION, "requestPermissions"))
    }
}

/// Local notifications raised by the native side on the configured channel
pub struct MobileNotifier<R: Runtime> {
    handle: PluginHandle<R>,
}

impl<R: Runtime> MobileNotifier<R> {
    pub fn new(handle: PluginHandle<R>) -> Self {
        Self { handle }
    }
}

impl<R: Runtime> LocalNotifier for MobileNotifier<R> {
    fn show<'a>(&'a self, notification: &'a LocalNotification) -> BoxFuture<'a, FcmResult<()>> {
        Box::pin(async move {
            let _: Value = self
                .handle
                .run_mobile_plugin_async("showNotification", notification)
                .await
                .map_err(|e| rejection(operation::SHOW_NOTIFICATION, e))?;
            Ok(())
        })
    }

    fn is_available(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { true })
    }
}

#[derive(Serialize)]
struct RegisterListener {
    event: &'static str,
    handler: Channel<Value>,
}

fn decode(body: InvokeResponseBody) -> Option<Value> {
    let decoded = match body {
        InvokeResponseBody::Json(json) => serde_json::from_str(&json),
        InvokeResponseBody::Raw(bytes) => serde_json::from_slice(&bytes),
    };
    decoded
        .inspect_err(|error| tracing::warn!(error = %error, "undecodable native event"))
        .ok()
}

/// Subscribe to the native token and message callbacks. Topic, delete and
/// initial token events are raised by the dispatcher itself, so only the
/// OS-driven callbacks are forwarded. Every callback goes through one queue
/// so deliveries are applied in the order the native side made them.
pub fn forward_native_events<R: Runtime>(
    handle: &PluginHandle<R>,
    dispatcher: Arc<CommandDispatcher>,
    receiver: Arc<BackgroundReceiver>,
) -> FcmResult<()> {
    let (queue, pump) = inbound_channel(dispatcher, receiver);
    tauri::async_runtime::spawn(pump.run());

    for event in listener::ALL {
        let queue = queue.clone();
        let handler = Channel::new(move |body| {
            if let Some(payload) = decode(body) {
                queue.push_payload(event, payload);
            }
            Ok(())
        });
        handle
            .run_mobile_plugin::<()>("registerListener", RegisterListener { event, handler })
            .map_err(|e| FcmError::bridge(format!("failed to listen for `{}`: {}", event, e)))?;
    }
    Ok(())
}
