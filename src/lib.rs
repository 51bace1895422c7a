//! Firebase Cloud Messaging bridge for webview-hosted applications
//!
//! Exposes token retrieval, topic subscriptions, permission checks and message
//! delivery to a UI layer as named commands and named events. The
//! [`components`] module holds the bridge contract (DTOs, dispatcher, receiver,
//! typed client); [`backends`] holds the per-platform providers and local
//! notifiers. With the `tauri` feature the whole thing is packaged as a Tauri
//! plugin named `fcm`.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Instrument;

pub mod backends;
pub mod components;

#[cfg(feature = "tauri")]
mod plugin;

#[cfg(feature = "tauri")]
pub use plugin::{FcmExt, init, init_with_config};

pub use backends::BackendFactory;
pub use components::*;

/// One wired-up bridge: dispatcher, background receiver and the state they share
#[derive(Clone)]
pub struct FcmService {
    dispatcher: Arc<CommandDispatcher>,
    receiver: Arc<BackgroundReceiver>,
    emitter: EventEmitter,
    preferences: Arc<Preferences>,
    visibility: AppVisibility,
    config: FcmConfig,
}

impl FcmService {
    pub fn builder() -> FcmServiceBuilder {
        FcmServiceBuilder::default()
    }

    /// Startup work once the UI is listening: announce the token (or
    /// `tokenError`), then replay a tapped background notification, once
    pub async fn initialize(&self) {
        async {
            self.dispatcher.announce_token().await;
            if self.receiver.replay_pending_launch().await {
                tracing::info!("replayed notification tap from background");
            }
        }
        .instrument(tracing::info_span!("fcm_initialize"))
        .await
    }

    /// Typed client talking to this service in-process
    pub fn client(&self) -> FcmClient<LocalBridge> {
        FcmClient::new(LocalBridge::new(Arc::clone(&self.dispatcher)))
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    pub fn receiver(&self) -> &Arc<BackgroundReceiver> {
        &self.receiver
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    pub fn preferences(&self) -> &Arc<Preferences> {
        &self.preferences
    }

    pub fn visibility(&self) -> &AppVisibility {
        &self.visibility
    }

    pub fn config(&self) -> &FcmConfig {
        &self.config
    }
}

/// Builder for [`FcmService`]. Anything left unset falls back to the desktop
/// provider, the OS notifier and in-memory preferences.
#[derive(Default)]
pub struct FcmServiceBuilder {
    provider: Option<Arc<dyn NotificationProvider>>,
    notifier: Option<Option<Arc<dyn LocalNotifier>>>,
    preferences: Option<Arc<Preferences>>,
    store_path: Option<PathBuf>,
    visibility: Option<AppVisibility>,
    emitter: Option<EventEmitter>,
    config: FcmConfig,
}

impl FcmServiceBuilder {
    pub fn provider(mut self, provider: Arc<dyn NotificationProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Local notifier for background deliveries; `None` disables them
    pub fn notifier(mut self, notifier: Option<Arc<dyn LocalNotifier>>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn preferences(mut self, preferences: Arc<Preferences>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Persist preferences to this file; ignored when `preferences` is set
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    pub fn visibility(mut self, visibility: AppVisibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn config(mut self, config: FcmConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn build(self) -> FcmResult<FcmService> {
        let config = self.config;

        let preferences = match (self.preferences, self.store_path) {
            (Some(preferences), _) => preferences,
            (None, Some(path)) => Arc::new(Preferences::open(path).await?),
            (None, None) => Arc::new(Preferences::in_memory()),
        };

        let notifier = self
            .notifier
            .unwrap_or_else(|| BackendFactory::local_notifier(&config));
        let provider = self
            .provider
            .unwrap_or_else(|| BackendFactory::desktop_provider(notifier.clone()));

        let emitter = self.emitter.unwrap_or_default();
        let visibility = self.visibility.unwrap_or_default();
        let tokens: SharedTokenState = Arc::new(Mutex::new(TokenState::new(preferences.token())));

        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&provider),
            emitter.clone(),
            Arc::clone(&tokens),
            Arc::clone(&preferences),
            &config,
        ));
        let receiver = Arc::new(BackgroundReceiver::new(
            emitter.clone(),
            tokens,
            Arc::clone(&preferences),
            notifier,
            visibility.clone(),
            &config,
        ));

        tracing::debug!(
            platform = provider.platform(),
            persistent = preferences.path().is_some(),
            "fcm service built"
        );

        Ok(FcmService {
            dispatcher,
            receiver,
            emitter,
            preferences,
            visibility,
            config,
        })
    }
}
