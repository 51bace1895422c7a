// Seams to the vendor push SDK and to the OS notification service
// One implementation per target, chosen at build time (see backends)

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::permission::PermissionState;
use super::{BoxFuture, FcmError, FcmResult};

/// FCM topic grammar
static TOPIC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9\-_.~%]{1,900}$").expect("topic pattern")
});

const TOPIC_PREFIX: &str = "/topics/";

/// Operation labels used in [`FcmError::Provider`], matching the rejection texts
/// the webview side sees (`Failed to <operation>: ...`)
pub mod operation {
    pub const GET_TOKEN: &str = "get FCM token";
    pub const SUBSCRIBE: &str = "subscribe to topic";
    pub const UNSUBSCRIBE: &str = "unsubscribe from topic";
    pub const DELETE_TOKEN: &str = "delete FCM token";
    pub const CHECK_PERMISSION: &str = "check notification status";
    pub const REQUEST_PERMISSION: &str = "request notification permission";
    pub const SHOW_NOTIFICATION: &str = "show notification";
}

/// Validated topic name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Validate a topic; a leading `/topics/` is accepted and stripped.
    /// Surrounding whitespace is rejected, not trimmed.
    pub fn parse(raw: &str) -> FcmResult<Self> {
        let name = raw.strip_prefix(TOPIC_PREFIX).unwrap_or(raw);
        if name.is_empty() {
            return Err(FcmError::invalid_argument("topic", "topic must not be empty"));
        }
        if !TOPIC_PATTERN.is_match(name) {
            return Err(FcmError::invalid_argument(
                "topic",
                format!("`{}` is not a valid topic name", name),
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Topic::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// The vendor push SDK, reduced to the operations the bridge needs.
///
/// Each call is one-shot: no retry, no backoff, no timeout (the dispatcher
/// bounds them). Vendor error objects become [`FcmError::Provider`] with a
/// human-readable message.
pub trait NotificationProvider: Send + Sync {
    /// Platform label used in logs
    fn platform(&self) -> &'static str;

    fn fetch_token(&self) -> BoxFuture<'_, FcmResult<String>>;

    fn subscribe_to_topic<'a>(&'a self, topic: &'a Topic) -> BoxFuture<'a, FcmResult<()>>;

    fn unsubscribe_from_topic<'a>(&'a self, topic: &'a Topic) -> BoxFuture<'a, FcmResult<()>>;

    fn delete_token(&self) -> BoxFuture<'_, FcmResult<()>>;

    /// Live read of the OS notification setting
    fn notification_permission(&self) -> BoxFuture<'_, FcmResult<PermissionState>>;

    /// Show the OS prompt when possible and report the outcome
    fn request_notification_permission(&self) -> BoxFuture<'_, FcmResult<PermissionState>>;
}

/// A local OS notification raised for a message that arrived in background
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNotification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub channel_id: String,
    pub channel_name: String,
    /// Data payload handed back when the user taps the notification
    pub extras: BTreeMap<String, String>,
}

/// OS notification service
pub trait LocalNotifier: Send + Sync {
    fn show<'a>(&'a self, notification: &'a LocalNotification) -> BoxFuture<'a, FcmResult<()>>;

    /// Whether the service is reachable; used as the desktop permission signal
    fn is_available(&self) -> BoxFuture<'_, bool>;
}
