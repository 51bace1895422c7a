// Notification permission shim
// Always a live read from the provider; failures degrade to a negative answer

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::provider::NotificationProvider;
use super::{FcmError, FcmResult};

/// Three-valued permission state, driven by OS settings outside this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not decided yet; asking will show the OS prompt
    Prompt,
}

impl PermissionState {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionState::Granted)
    }
}

/// Per-category answer of `checkPermissions` / `requestPermissions`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionStatus {
    pub post_notification: PermissionState,
    /// Reported granted by convention
    pub internet: PermissionState,
    /// Reported granted by convention
    pub wake_lock: PermissionState,
}

impl PermissionStatus {
    pub fn new(post_notification: PermissionState) -> Self {
        Self {
            post_notification,
            internet: PermissionState::Granted,
            wake_lock: PermissionState::Granted,
        }
    }
}

/// Who owns the notification permission prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionFlow {
    /// The provider prompts and reports the real outcome
    #[default]
    Provider,
    /// The host runs its own prompt; `requestNotificationPermission` answers
    /// `true` without touching the OS
    Host,
}

#[derive(Clone)]
pub struct PermissionShim {
    provider: Arc<dyn NotificationProvider>,
    flow: PermissionFlow,
    timeout: Duration,
}

impl PermissionShim {
    pub fn new(provider: Arc<dyn NotificationProvider>, flow: PermissionFlow, timeout: Duration) -> Self {
        Self {
            provider,
            flow,
            timeout,
        }
    }

    pub fn flow(&self) -> PermissionFlow {
        self.flow
    }

    /// Live read of the notification permission; never fails
    pub async fn current_state(&self) -> PermissionState {
        let outcome = self.bounded(self.provider.notification_permission()).await;
        degrade("check", outcome, PermissionState::Denied)
    }

    pub async fn are_notifications_enabled(&self) -> bool {
        self.current_state().await.is_granted()
    }

    pub async fn check_permissions(&self) -> PermissionStatus {
        PermissionStatus::new(self.current_state().await)
    }

    /// Ask for the permission. Under [`PermissionFlow::Host`] the current state
    /// is reported instead, as `prompt` when not yet granted.
    pub async fn request_permissions(&self) -> PermissionStatus {
        let state = match self.flow {
            PermissionFlow::Provider => {
                let outcome = self
                    .bounded(self.provider.request_notification_permission())
                    .await;
                degrade("request", outcome, PermissionState::Denied)
            },
            PermissionFlow::Host => match self.current_state().await {
                PermissionState::Granted => PermissionState::Granted,
                _ => PermissionState::Prompt,
            },
        };
        PermissionStatus::new(state)
    }

    pub async fn request_notification_permission(&self) -> bool {
        match self.flow {
            PermissionFlow::Provider => self.request_permissions().await.post_notification.is_granted(),
            PermissionFlow::Host => {
                tracing::debug!("permission prompt owned by host, reporting granted");
                true
            },
        }
    }

    async fn bounded(
        &self,
        call: super::BoxFuture<'_, FcmResult<PermissionState>>,
    ) -> FcmResult<PermissionState> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FcmError::TimedOut {
                operation: "query notification permission".to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

fn degrade(
    operation: &str,
    outcome: FcmResult<PermissionState>,
    fallback: PermissionState,
) -> PermissionState {
    match outcome {
        Ok(state) => state,
        Err(error) => {
            tracing::debug!(operation, error = %error, "permission unavailable, degrading");
            fallback
        },
    }
}
