// Desktop provider: there is no push SDK on desktop targets, so every vendor
// operation rejects. Permission follows the local notification service.

use std::sync::Arc;

use crate::components::{
    BoxFuture, FcmError, FcmResult, LocalNotifier, NotificationProvider, PermissionState, Topic,
};

pub struct DesktopProvider {
    notifier: Option<Arc<dyn LocalNotifier>>,
}

impl DesktopProvider {
    pub fn new(notifier: Option<Arc<dyn LocalNotifier>>) -> Self {
        Self { notifier }
    }

    fn unsupported<T>() -> FcmResult<T> {
        Err(FcmError::Unsupported {
            platform: "desktop".to_string(),
        })
    }

    async fn local_permission(&self) -> FcmResult<PermissionState> {
        match &self.notifier {
            Some(notifier) if notifier.is_available().await => Ok(PermissionState::Granted),
            Some(_) => Ok(PermissionState::Denied),
            None => Err(FcmError::PermissionUnavailable {
                message: format!("no notification service on {}", std::env::consts::OS),
            }),
        }
    }
}

impl NotificationProvider for DesktopProvider {
    fn platform(&self) -> &'static str {
        std::env::consts::OS
    }

    fn fetch_token(&self) -> BoxFuture<'_, FcmResult<String>> {
        Box::pin(async { Self::unsupported() })
    }

    fn subscribe_to_topic<'a>(&'a self, _topic: &'a Topic) -> BoxFuture<'a, FcmResult<()>> {
        Box::pin(async { Self::unsupported() })
    }

    fn unsubscribe_from_topic<'a>(&'a self, _topic: &'a Topic) -> BoxFuture<'a, FcmResult<()>> {
        Box::pin(async { Self::unsupported() })
    }

    fn delete_token(&self) -> BoxFuture<'_, FcmResult<()>> {
        Box::pin(async { Self::unsupported() })
    }

    fn notification_permission(&self) -> BoxFuture<'_, FcmResult<PermissionState>> {
        Box::pin(self.local_permission())
    }

    // Desktop daemons have no prompt; asking is the same as reading
    fn request_notification_permission(&self) -> BoxFuture<'_, FcmResult<PermissionState>> {
        Box::pin(self.local_permission())
    }
}
