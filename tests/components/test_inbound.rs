//! Tests for components/inbound.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tauri_plugin_fcm::{
    EventKind, FcmError, FcmEvent, FcmMessage, NativeEvent, inbound_channel,
};

use super::support::{EventRecorder, MockProvider, foreground_service};

#[test]
fn test_decode_token_callbacks() {
    assert_eq!(
        NativeEvent::decode("tokenRefresh", json!({"token": "abc"})).unwrap(),
        NativeEvent::TokenRefresh(Ok("abc".into()))
    );

    let error = NativeEvent::decode("tokenError", json!({"error": "SERVICE_NOT_AVAILABLE"})).unwrap();
    assert!(matches!(
        error,
        NativeEvent::TokenRefresh(Err(FcmError::Provider { ref message, .. })) if message == "SERVICE_NOT_AVAILABLE"
    ));
}

#[test]
fn test_decode_message_and_tap() {
    let message = NativeEvent::decode(
        "messageReceived",
        json!({"messageId": "m-1", "data": {"k": "v"}}),
    )
    .unwrap();
    assert_eq!(
        message,
        NativeEvent::Message(FcmMessage::new("m-1").with_data("k", "v"))
    );

    let tap = NativeEvent::decode(
        "messageReceived",
        json!({"fromBackground": true, "data": {"orderId": "991"}}),
    )
    .unwrap();
    let extras = BTreeMap::from([("orderId".to_string(), "991".to_string())]);
    assert_eq!(tap, NativeEvent::Opened(extras.clone()));

    // Extras stashed by the native side as a serialized string
    let stashed = NativeEvent::decode(
        "messageReceived",
        json!({"fromBackground": true, "message": "{\"orderId\":\"991\"}"}),
    )
    .unwrap();
    assert_eq!(stashed, NativeEvent::Opened(extras));

    assert!(NativeEvent::decode("somethingElse", json!({})).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pump_applies_events_in_arrival_order() {
    let service = foreground_service(MockProvider::new("tok"), None).await;
    let recorder = EventRecorder::attach(&service);
    let (queue, pump) = inbound_channel(
        Arc::clone(service.dispatcher()),
        Arc::clone(service.receiver()),
    );
    let running = tokio::spawn(pump.run());

    for n in 0..32 {
        assert!(queue.push_payload("messageReceived", json!({"messageId": format!("m-{}", n)})));
    }
    queue.push(NativeEvent::TokenRefresh(Ok("first".into())));
    queue.push(NativeEvent::TokenRefresh(Ok("second".into())));
    assert!(!queue.push_payload("messageReceived", json!({"data": 7})));
    drop(queue);
    running.await.unwrap();

    let ids: Vec<String> = recorder
        .of_kind(EventKind::MessageReceived)
        .into_iter()
        .filter_map(|event| match event {
            FcmEvent::MessageReceived(received) => received.message.message_id,
            _ => None,
        })
        .collect();
    let expected: Vec<String> = (0..32).map(|n| format!("m-{}", n)).collect();
    assert_eq!(ids, expected);

    let last = service.dispatcher().get_last_message().await.unwrap();
    assert_eq!(last.message_id.as_deref(), Some("m-31"));

    let refreshed: Vec<_> = recorder
        .of_kind(EventKind::TokenRefresh)
        .iter()
        .map(|event| event.payload().unwrap()["token"].clone())
        .collect();
    assert_eq!(refreshed, vec![json!("first"), json!("second")]);
    assert_eq!(service.dispatcher().current_token().as_deref(), Some("second"));
    assert_eq!(service.preferences().token().as_deref(), Some("second"));
}
