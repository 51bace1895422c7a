//! Tests for components/events.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use tauri_plugin_fcm::{
    EventEmitter, EventKind, FcmEvent, FcmMessage, MessageReceivedEvent, TokenEvent, TopicAction,
};

fn counter(emitter: &EventEmitter, kind: EventKind) -> (Arc<AtomicUsize>, tauri_plugin_fcm::Subscription) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let subscription = emitter.subscribe(kind, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (count, subscription)
}

#[test]
fn test_event_kind_wire_names() {
    assert_eq!(EventKind::TokenReceived.to_string(), "tokenReceived");
    assert_eq!(EventKind::MessageReceived.as_str(), "messageReceived");
    assert_eq!("topicChanged".parse::<EventKind>().ok(), Some(EventKind::TopicChanged));
    assert!("token_received".parse::<EventKind>().is_err());
    assert_eq!(serde_json::to_value(EventKind::TokenDeleted).unwrap(), json!("tokenDeleted"));
}

#[test]
fn test_emit_reaches_only_matching_tag() {
    let emitter = EventEmitter::new();
    let (refreshes, _a) = counter(&emitter, EventKind::TokenRefresh);
    let (errors, _b) = counter(&emitter, EventKind::TokenError);

    let delivered = emitter.emit(FcmEvent::TokenRefresh(TokenEvent::now("t1")));

    assert_eq!(delivered, 1);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dropping_subscription_unlistens() {
    let emitter = EventEmitter::new();
    let (count, subscription) = counter(&emitter, EventKind::TokenDeleted);
    assert_eq!(emitter.listener_count(EventKind::TokenDeleted), 1);

    drop(subscription);
    assert_eq!(emitter.listener_count(EventKind::TokenDeleted), 0);
    assert_eq!(emitter.emit(FcmEvent::TokenDeleted(Default::default())), 0);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_detached_subscription_stays_registered() {
    let emitter = EventEmitter::new();
    let (count, subscription) = counter(&emitter, EventKind::TokenError);
    subscription.detach();

    emitter.emit(FcmEvent::token_error("boom"));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_late_listener_misses_earlier_events() {
    let emitter = EventEmitter::new();
    emitter.emit(FcmEvent::token_error("nobody listening"));

    let (count, _subscription) = counter(&emitter, EventKind::TokenError);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_listener_may_emit_and_unsubscribe_reentrantly() {
    let emitter = EventEmitter::new();
    let (errors, _errors_sub) = counter(&emitter, EventKind::TokenError);

    let chained = emitter.clone();
    let _refresh_sub = emitter.subscribe(EventKind::TokenRefresh, move |_| {
        chained.emit(FcmEvent::token_error("follow-up"));
    });

    emitter.emit(FcmEvent::TokenRefresh(TokenEvent::now("t2")));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[test]
fn test_payload_shapes() {
    let token = FcmEvent::TokenReceived(TokenEvent {
        token: "abc".into(),
        timestamp: 42,
    });
    assert_eq!(token.payload().unwrap(), json!({"token": "abc", "timestamp": 42}));

    let error = FcmEvent::token_error("Token refresh failed");
    assert_eq!(error.payload().unwrap(), json!({"error": "Token refresh failed"}));

    let topic = FcmEvent::topic_changed("news", TopicAction::Unsubscribed);
    assert_eq!(
        topic.payload().unwrap(),
        json!({"topic": "news", "action": "unsubscribed"})
    );

    let deleted = FcmEvent::TokenDeleted(Default::default());
    assert_eq!(deleted.payload().unwrap(), json!({"action": "deleted"}));
}

#[test]
fn test_message_payload_is_flat_with_optional_background_flag() {
    let message = FcmMessage::new("m-1").with_data("k", "v");

    let foreground = FcmEvent::MessageReceived(MessageReceivedEvent::foreground(message.clone()));
    let payload = foreground.payload().unwrap();
    assert_eq!(payload["messageId"], json!("m-1"));
    assert_eq!(payload["data"], json!({"k": "v"}));
    assert!(payload.get("fromBackground").is_none());
    assert!(payload.get("message").is_none());

    let replayed = FcmEvent::MessageReceived(MessageReceivedEvent::from_background(message));
    let payload = replayed.payload().unwrap();
    assert_eq!(payload["fromBackground"], json!(true));

    let rebuilt = FcmEvent::from_payload(EventKind::MessageReceived, payload).unwrap();
    assert_eq!(rebuilt, replayed);
}

#[tokio::test]
async fn test_deferred_events_arrive_later_and_in_order() {
    let emitter = EventEmitter::new();
    let topics = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen = Arc::clone(&topics);
    let _listener = emitter.subscribe(EventKind::TopicChanged, move |event| {
        if let FcmEvent::TopicChanged(topic) = event {
            seen.lock().push(topic.topic.clone());
        }
    });

    for name in ["a", "b", "c"] {
        emitter.emit_deferred(FcmEvent::topic_changed(name, TopicAction::Subscribed));
    }
    assert!(topics.lock().is_empty());

    emitter.flush().await;
    assert_eq!(topics.lock().clone(), vec!["a", "b", "c"]);
}

#[test]
fn test_deferred_emit_without_runtime_is_immediate() {
    let emitter = EventEmitter::new();
    let (count, _listener) = counter(&emitter, EventKind::TokenDeleted);

    emitter.emit_deferred(FcmEvent::TokenDeleted(Default::default()));

    assert_eq!(count.load(Ordering::SeqCst), 1);
    tokio_test::block_on(emitter.flush());
}
