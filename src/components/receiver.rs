// Background delivery receiver
// Entry point for messages and token rotations pushed by the OS, possibly while
// no UI is loaded. Independent of the dispatcher's command lifecycle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::config::FcmConfig;
use super::events::{EventEmitter, FcmEvent, MessageReceivedEvent};
use super::message::FcmMessage;
use super::provider::{LocalNotification, LocalNotifier};
use super::store::Preferences;
use super::token::SharedTokenState;

/// Foreground/background classification of the UI, set by the host
#[derive(Debug, Clone, Default)]
pub struct AppVisibility(Arc<AtomicBool>);

impl AppVisibility {
    pub fn new(foreground: bool) -> Self {
        Self(Arc::new(AtomicBool::new(foreground)))
    }

    pub fn is_foreground(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set_foreground(&self, foreground: bool) {
        let previous = self.0.swap(foreground, Ordering::AcqRel);
        if previous != foreground {
            tracing::debug!(foreground, "app visibility changed");
        }
    }
}

/// What the receiver did with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Forwarded as `messageReceived`
    Emitted,
    /// Raised as a local OS notification
    Notified,
    /// Stored only: data-only message in background, or no notifier
    Stored,
}

pub struct BackgroundReceiver {
    emitter: EventEmitter,
    tokens: SharedTokenState,
    preferences: Arc<Preferences>,
    notifier: Option<Arc<dyn LocalNotifier>>,
    visibility: AppVisibility,
    channel_id: String,
    channel_name: String,
    // Payload most recently replayed at launch; a later tap on it is a repeat
    replayed: Mutex<Option<BTreeMap<String, String>>>,
}

impl BackgroundReceiver {
    pub fn new(
        emitter: EventEmitter,
        tokens: SharedTokenState,
        preferences: Arc<Preferences>,
        notifier: Option<Arc<dyn LocalNotifier>>,
        visibility: AppVisibility,
        config: &FcmConfig,
    ) -> Self {
        Self {
            emitter,
            tokens,
            preferences,
            notifier,
            visibility,
            channel_id: config.channel_id.clone(),
            channel_name: config.channel_name.clone(),
            replayed: Mutex::new(None),
        }
    }

    pub fn visibility(&self) -> &AppVisibility {
        &self.visibility
    }

    /// Store the message as the last one, then either forward it to the UI or
    /// raise an OS notification for it
    pub async fn on_message_received(&self, message: FcmMessage) -> Delivery {
        if let Err(error) = self.preferences.set_last_message(message.clone()).await {
            tracing::warn!(error = %error, "failed to persist last message");
        }

        if self.visibility.is_foreground() {
            self.emitter
                .emit(FcmEvent::MessageReceived(MessageReceivedEvent::foreground(message)));
            return Delivery::Emitted;
        }

        let Some(notification) = message.notification.as_ref() else {
            tracing::debug!(message_id = ?message.message_id, "data-only message stored while in background");
            return Delivery::Stored;
        };
        let Some(notifier) = self.notifier.as_ref() else {
            tracing::warn!("no local notifier available, background message stored only");
            return Delivery::Stored;
        };

        let local = LocalNotification {
            title: notification.title.clone().unwrap_or_default(),
            body: notification.body.clone().unwrap_or_default(),
            icon: notification.icon.clone(),
            channel_id: self.channel_id.clone(),
            channel_name: self.channel_name.clone(),
            extras: message.data.clone(),
        };

        if let Err(error) = notifier.show(&local).await {
            tracing::warn!(error = %error, "failed to raise local notification");
            return Delivery::Stored;
        }

        // Replayed once when the UI comes back through the tap
        if let Err(error) = self.preferences.set_pending_launch(message.data).await {
            tracing::warn!(error = %error, "failed to stash notification extras");
        }
        Delivery::Notified
    }

    /// Token rotation delivered through the background channel. Persists the
    /// token; announces it only in foreground and only if it changed.
    pub async fn on_new_token(&self, token: String) -> bool {
        if let Err(error) = self.preferences.set_token(Some(token.clone())).await {
            tracing::warn!(error = %error, "failed to persist rotated token");
        }

        if !self.visibility.is_foreground() {
            return false;
        }

        let refreshed = self.tokens.lock().observe_refresh(&token);
        match refreshed {
            Some(event) => {
                self.emitter.emit(FcmEvent::TokenRefresh(event));
                true
            },
            None => false,
        }
    }

    /// The user tapped a background notification and the UI is up again.
    /// Returns false when the tap was already delivered by the launch replay.
    pub async fn on_notification_opened(&self, extras: BTreeMap<String, String>) -> bool {
        self.visibility.set_foreground(true);
        let stashed = self
            .preferences
            .take_pending_launch()
            .await
            .inspect_err(|error| {
                tracing::warn!(error = %error, "failed to clear pending launch payload")
            })
            .ok()
            .flatten();

        let replayed = self.replayed.lock().take();
        if stashed.is_none() && replayed.as_ref() == Some(&extras) {
            tracing::debug!("notification tap already replayed at launch");
            return false;
        }
        self.emit_from_background(extras);
        true
    }

    /// Replay the stashed tap payload once, if there is one
    pub async fn replay_pending_launch(&self) -> bool {
        match self.preferences.take_pending_launch().await {
            Ok(Some(extras)) => {
                *self.replayed.lock() = Some(extras.clone());
                self.emit_from_background(extras);
                true
            },
            Ok(None) => false,
            Err(error) => {
                tracing::warn!(error = %error, "failed to read pending launch payload");
                false
            },
        }
    }

    fn emit_from_background(&self, extras: BTreeMap<String, String>) {
        let event = MessageReceivedEvent::from_background(FcmMessage::from_extras(extras));
        self.emitter.emit(FcmEvent::MessageReceived(event));
    }
}
