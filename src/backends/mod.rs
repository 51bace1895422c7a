// Platform backends
// Desktop targets get a rejecting provider plus whatever local notifier the OS
// offers; mobile targets forward to the native plugin through the host.

pub mod desktop;
pub mod image_utils;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(all(feature = "tauri", any(target_os = "android", target_os = "ios")))]
pub mod mobile;

use std::sync::Arc;

use crate::components::{FcmConfig, LocalNotifier, NotificationProvider};

/// Factory for the backends available on the current OS
pub struct BackendFactory;

impl BackendFactory {
    /// Local notification service for this OS, if there is one
    #[allow(unused_variables)]
    pub fn local_notifier(config: &FcmConfig) -> Option<Arc<dyn LocalNotifier>> {
        #[cfg(target_os = "linux")]
        {
            Some(Arc::new(linux::LinuxNotifier::new(config)))
        }

        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }

    /// Provider used where no push SDK exists
    pub fn desktop_provider(
        notifier: Option<Arc<dyn LocalNotifier>>,
    ) -> Arc<dyn NotificationProvider> {
        Arc::new(desktop::DesktopProvider::new(notifier))
    }
}
