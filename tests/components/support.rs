//! Shared fixtures: a scriptable provider, a recording notifier and an event
//! recorder

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tauri_plugin_fcm::components::provider::operation;
use tauri_plugin_fcm::{
    BoxFuture, EventKind, FcmConfig, FcmError, FcmEvent, FcmResult, FcmService, LocalNotification,
    LocalNotifier, NotificationProvider, PermissionState, Subscription, Topic,
};

/// Vendor stand-in. A delete rotates the token the way the real SDK does.
pub struct MockProvider {
    token: Mutex<Result<String, String>>,
    topic_failure: Mutex<Option<String>>,
    delete_failure: Mutex<Option<String>>,
    permission: Mutex<Result<PermissionState, String>>,
    request_outcome: Mutex<PermissionState>,
    delay: Mutex<Option<Duration>>,
    topics: Mutex<Vec<String>>,
    rotations: AtomicUsize,
    pub token_calls: AtomicUsize,
    pub topic_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub request_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(token: &str) -> Arc<Self> {
        Arc::new(Self {
            token: Mutex::new(Ok(token.to_string())),
            topic_failure: Mutex::new(None),
            delete_failure: Mutex::new(None),
            permission: Mutex::new(Ok(PermissionState::Granted)),
            request_outcome: Mutex::new(PermissionState::Granted),
            delay: Mutex::new(None),
            topics: Mutex::new(Vec::new()),
            rotations: AtomicUsize::new(0),
            token_calls: AtomicUsize::new(0),
            topic_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            request_calls: AtomicUsize::new(0),
        })
    }

    pub fn failing_token(message: &str) -> Arc<Self> {
        let provider = Self::new("unused");
        provider.fail_token(message);
        provider
    }

    pub fn set_token(&self, token: &str) {
        *self.token.lock() = Ok(token.to_string());
    }

    pub fn fail_token(&self, message: &str) {
        *self.token.lock() = Err(message.to_string());
    }

    pub fn fail_topics(&self, message: &str) {
        *self.topic_failure.lock() = Some(message.to_string());
    }

    pub fn fail_delete(&self, message: &str) {
        *self.delete_failure.lock() = Some(message.to_string());
    }

    pub fn set_permission(&self, state: PermissionState) {
        *self.permission.lock() = Ok(state);
    }

    pub fn fail_permission(&self, message: &str) {
        *self.permission.lock() = Err(message.to_string());
    }

    pub fn set_request_outcome(&self, state: PermissionState) {
        *self.request_outcome.lock() = state;
    }

    /// Every vendor call waits this long before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn subscribed_topics(&self) -> Vec<String> {
        self.topics.lock().clone()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn topic_outcome(&self, operation: &str) -> FcmResult<()> {
        let failure = self.topic_failure.lock().clone();
        match failure {
            Some(message) => Err(FcmError::provider(operation, message)),
            None => Ok(()),
        }
    }
}

impl NotificationProvider for MockProvider {
    fn platform(&self) -> &'static str {
        "mock"
    }

    fn fetch_token(&self) -> BoxFuture<'_, FcmResult<String>> {
        Box::pin(async move {
            self.pause().await;
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self.token.lock().clone();
            outcome.map_err(|message| FcmError::provider(operation::GET_TOKEN, message))
        })
    }

    fn subscribe_to_topic<'a>(&'a self, topic: &'a Topic) -> BoxFuture<'a, FcmResult<()>> {
        Box::pin(async move {
            self.pause().await;
            self.topic_calls.fetch_add(1, Ordering::SeqCst);
            self.topic_outcome(operation::SUBSCRIBE)?;
            self.topics.lock().push(topic.to_string());
            Ok(())
        })
    }

    fn unsubscribe_from_topic<'a>(&'a self, topic: &'a Topic) -> BoxFuture<'a, FcmResult<()>> {
        Box::pin(async move {
            self.pause().await;
            self.topic_calls.fetch_add(1, Ordering::SeqCst);
            self.topic_outcome(operation::UNSUBSCRIBE)?;
            self.topics.lock().retain(|t| t != topic.as_str());
            Ok(())
        })
    }

    fn delete_token(&self) -> BoxFuture<'_, FcmResult<()>> {
        Box::pin(async move {
            self.pause().await;
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            let failure = self.delete_failure.lock().clone();
            if let Some(message) = failure {
                return Err(FcmError::provider(operation::DELETE_TOKEN, message));
            }
            let rotation = self.rotations.fetch_add(1, Ordering::SeqCst) + 1;
            let mut token = self.token.lock();
            let rotated = token
                .as_ref()
                .ok()
                .map(|current| format!("{}-r{}", current, rotation));
            if let Some(rotated) = rotated {
                *token = Ok(rotated);
            }
            Ok(())
        })
    }

    fn notification_permission(&self) -> BoxFuture<'_, FcmResult<PermissionState>> {
        Box::pin(async move {
            self.pause().await;
            let outcome = self.permission.lock().clone();
            outcome.map_err(|message| FcmError::PermissionUnavailable { message })
        })
    }

    fn request_notification_permission(&self) -> BoxFuture<'_, FcmResult<PermissionState>> {
        Box::pin(async move {
            self.pause().await;
            self.request_calls.fetch_add(1, Ordering::SeqCst);
            let failure = self.permission.lock().clone().err();
            match failure {
                Some(message) => Err(FcmError::PermissionUnavailable { message }),
                None => Ok(*self.request_outcome.lock()),
            }
        })
    }
}

/// Local notifier that records instead of showing
#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<LocalNotification>>,
    unavailable: AtomicBool,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn shown(&self) -> Vec<LocalNotification> {
        self.shown.lock().clone()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl LocalNotifier for RecordingNotifier {
    fn show<'a>(&'a self, notification: &'a LocalNotification) -> BoxFuture<'a, FcmResult<()>> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(FcmError::provider(
                    operation::SHOW_NOTIFICATION,
                    "notification service crashed",
                ));
            }
            self.shown.lock().push(notification.clone());
            Ok(())
        })
    }

    fn is_available(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { !self.unavailable.load(Ordering::SeqCst) })
    }
}

/// Collects every emitted event in order
pub struct EventRecorder {
    events: Arc<Mutex<Vec<FcmEvent>>>,
    _subscriptions: Vec<Subscription>,
}

impl EventRecorder {
    pub fn attach(service: &FcmService) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let events = Arc::clone(&events);
                service
                    .emitter()
                    .subscribe(kind, move |event| events.lock().push(event.clone()))
            })
            .collect();
        Self {
            events,
            _subscriptions: subscriptions,
        }
    }

    pub fn events(&self) -> Vec<FcmEvent> {
        self.events.lock().clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<FcmEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.kind() == kind)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

pub fn test_config() -> FcmConfig {
    FcmConfig::default().with_command_timeout(Duration::from_secs(5))
}

/// Service over the mock provider, with the UI in foreground
pub async fn foreground_service(
    provider: Arc<MockProvider>,
    notifier: Option<Arc<RecordingNotifier>>,
) -> FcmService {
    service_with(provider, notifier, test_config(), true).await
}

pub async fn service_with(
    provider: Arc<MockProvider>,
    notifier: Option<Arc<RecordingNotifier>>,
    config: FcmConfig,
    foreground: bool,
) -> FcmService {
    let notifier = notifier.map(|n| n as Arc<dyn LocalNotifier>);
    let service = FcmService::builder()
        .provider(provider)
        .notifier(notifier)
        .config(config)
        .build()
        .await
        .expect("service builds");
    service.visibility().set_foreground(foreground);
    service
}
