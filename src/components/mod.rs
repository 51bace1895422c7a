// Bridge contract components: DTOs, events, permissions, dispatcher and receiver
// Shared by every host integration; nothing in here depends on a particular runtime

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Serialize, Serializer};

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod inbound;
pub mod message;
pub mod permission;
pub mod provider;
pub mod receiver;
pub mod store;
pub mod token;
pub mod trace;

pub use client::{Bridge, FcmClient, LocalBridge, PayloadHandler};
pub use config::FcmConfig;
pub use dispatcher::{BridgeCommand, CommandDispatcher, SuccessResult, TopicResult};
pub use events::{
    EventEmitter, EventKind, FcmEvent, MessageReceivedEvent, Subscription, TokenDeletedEvent,
    TokenErrorEvent, TokenEvent, TopicAction, TopicEvent,
};
pub use inbound::{InboundPump, InboundQueue, NativeEvent, inbound_channel};
pub use message::{FcmMessage, NotificationPayload};
pub use permission::{PermissionFlow, PermissionShim, PermissionState, PermissionStatus};
pub use provider::{LocalNotification, LocalNotifier, NotificationProvider, Topic};
pub use receiver::{AppVisibility, BackgroundReceiver, Delivery};
pub use store::{Preferences, StoredState};
pub use token::{SharedTokenState, TokenState};
pub use trace::{CommandTrace, CorrelationId};

/// Boxed future returned by the object-safe provider and notifier traits
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error taxonomy of the bridge.
///
/// Display strings are what a rejected command carries across the bridge, so
/// the provider variant keeps the `Failed to <operation>: <message>` shape the
/// webview side already matches on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FcmError {
    /// Vendor SDK call failed; the message is passed through verbatim
    #[error("Failed to {operation}: {message}")]
    Provider { operation: String, message: String },

    /// Missing or malformed command argument, raised before any vendor call
    #[error("Invalid argument `{field}`: {message}")]
    InvalidArgument { field: String, message: String },

    /// OS permission API missing or threw
    #[error("Notification permission unavailable: {message}")]
    PermissionUnavailable { message: String },

    /// Vendor callback did not arrive within the configured timeout
    #[error("Timed out waiting to {operation} after {timeout:?}")]
    TimedOut { operation: String, timeout: Duration },

    /// Push messaging is not available on this target
    #[error("FCM is not supported on {platform}")]
    Unsupported { platform: String },

    /// Preference store could not be read or written
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Transport between client and dispatcher failed
    #[error("Bridge error: {message}")]
    Bridge { message: String },
}

impl FcmError {
    pub fn provider(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn bridge(message: impl Into<String>) -> Self {
        Self::Bridge {
            message: message.into(),
        }
    }

    /// Whether this error means the caller gave up waiting on the vendor
    pub fn is_timeout(&self) -> bool {
        matches!(self, FcmError::TimedOut { .. })
    }
}

// Rejections cross the bridge as plain strings
impl Serialize for FcmError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<serde_json::Error> for FcmError {
    fn from(error: serde_json::Error) -> Self {
        FcmError::bridge(format!("malformed payload: {}", error))
    }
}

/// Result alias used throughout the crate
pub type FcmResult<T> = Result<T, FcmError>;

/// Milliseconds since the Unix epoch, the timestamp unit of token events
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
