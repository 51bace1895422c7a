//! Tests for components/message.rs

use serde_json::json;
use tauri_plugin_fcm::{FcmMessage, NotificationPayload};

#[test]
fn test_native_message_shape_decodes() {
    let message: FcmMessage = serde_json::from_value(json!({
        "notification": {
            "title": "Hello",
            "body": "World",
            "clickAction": "OPEN_CHAT"
        },
        "data": {"chatId": "42"},
        "messageId": "0:1700000000",
        "from": "/topics/news",
        "sentTime": 1_700_000_000_000_i64,
        "ttl": 2419200
    }))
    .unwrap();

    let notification = message.notification.as_ref().unwrap();
    assert_eq!(notification.title.as_deref(), Some("Hello"));
    assert_eq!(notification.click_action.as_deref(), Some("OPEN_CHAT"));
    assert_eq!(message.data.get("chatId").map(String::as_str), Some("42"));
    assert_eq!(message.from.as_deref(), Some("/topics/news"));
    assert_eq!(message.ttl, Some(2419200));
    assert!(!message.is_data_only());
}

#[test]
fn test_data_only_message() {
    let message: FcmMessage = serde_json::from_value(json!({"data": {"sync": "1"}})).unwrap();
    assert!(message.is_data_only());
    assert!(message.message_id.is_none());

    let encoded = serde_json::to_value(&message).unwrap();
    assert!(encoded.get("notification").is_none());
}

#[test]
fn test_builder_and_extras() {
    let message = FcmMessage::new("m-7")
        .with_notification(NotificationPayload::new("t", "b").with_icon("mail-unread"))
        .with_data("a", "1")
        .with_data("a", "2")
        .with_sender("sender-id")
        .with_sent_time(10)
        .with_ttl(60);

    // Keys are unique; the last write wins
    assert_eq!(message.data.len(), 1);
    assert_eq!(message.data["a"], "2");
    assert_eq!(
        message.notification.as_ref().and_then(|n| n.icon.as_deref()),
        Some("mail-unread")
    );

    let rebuilt = FcmMessage::from_extras(message.data.clone());
    assert!(rebuilt.is_data_only());
    assert_eq!(rebuilt.data, message.data);
}
