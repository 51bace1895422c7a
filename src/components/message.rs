// Push message DTOs as they travel over the bridge

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Display block of a push message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub sound: Option<String>,
    pub tag: Option<String>,
    pub click_action: Option<String>,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_click_action(mut self, click_action: impl Into<String>) -> Self {
        self.click_action = Some(click_action.into());
        self
    }
}

/// A delivered push message.
///
/// `data` is a string-to-string map with unique keys; a message without a
/// `notification` block is a data-only message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FcmMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationPayload>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub sent_time: Option<i64>,
    /// Seconds
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl FcmMessage {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            ..Self::default()
        }
    }

    pub fn with_notification(mut self, notification: NotificationPayload) -> Self {
        self.notification = Some(notification);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_sender(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_sent_time(mut self, sent_time: i64) -> Self {
        self.sent_time = Some(sent_time);
        self
    }

    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn is_data_only(&self) -> bool {
        self.notification.is_none()
    }

    /// Message rebuilt from a tapped notification's extras
    pub fn from_extras(data: BTreeMap<String, String>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}
