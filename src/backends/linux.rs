// Linux local notifications over the freedesktop D-Bus Notifications service

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OnceCell;
use zbus::Connection;
use zbus::zvariant::Value;

use super::image_utils;
use crate::components::{
    BoxFuture, FcmConfig, FcmError, FcmResult, LocalNotification, LocalNotifier,
    provider::operation,
};

#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    /// Send a notification to the desktop notification daemon
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: Vec<&str>,
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn get_server_information(&self) -> zbus::Result<(String, String, String, String)>;
}

/// Daemon decides how long the popup stays
const EXPIRE_DEFAULT: i32 = -1;

const URGENCY_NORMAL: u8 = 1;

pub struct LinuxNotifier {
    connection: Arc<OnceCell<Connection>>,
    app_name: String,
}

impl LinuxNotifier {
    pub fn new(config: &FcmConfig) -> Self {
        Self {
            connection: Arc::new(OnceCell::new()),
            app_name: config.app_name.clone(),
        }
    }

    async fn get_connection(&self) -> FcmResult<Connection> {
        self.connection
            .get_or_try_init(|| async {
                Connection::session().await.map_err(|e| {
                    FcmError::provider(
                        operation::SHOW_NOTIFICATION,
                        format!("failed to connect to D-Bus session: {}", e),
                    )
                })
            })
            .await
            .cloned()
    }

    async fn proxy(&self) -> FcmResult<NotificationsProxy<'static>> {
        let connection = self.get_connection().await?;
        NotificationsProxy::new(&connection).await.map_err(|e| {
            FcmError::provider(
                operation::SHOW_NOTIFICATION,
                format!("failed to create D-Bus proxy: {}", e),
            )
        })
    }

    fn hints<'a>(&self, notification: &'a LocalNotification) -> HashMap<&'static str, Value<'a>> {
        let mut hints = HashMap::new();
        hints.insert("urgency", Value::U8(URGENCY_NORMAL));
        hints.insert("category", Value::from("im.received"));
        hints.insert("x-fcm-channel", Value::from(notification.channel_id.as_str()));
        hints
    }

    async fn deliver(&self, notification: &LocalNotification) -> FcmResult<u32> {
        let proxy = self.proxy().await?;

        let app_icon = match notification.icon.as_deref() {
            Some(icon) => image_utils::resolve_icon(icon)
                .await
                .map(|resolved| resolved.as_app_icon())
                .unwrap_or_default(),
            None => String::new(),
        };

        let actions = vec!["default", notification.channel_name.as_str()];

        let id = proxy
            .notify(
                &self.app_name,
                0,
                &app_icon,
                &notification.title,
                &notification.body,
                actions,
                self.hints(notification),
                EXPIRE_DEFAULT,
            )
            .await
            .map_err(|e| {
                FcmError::provider(
                    operation::SHOW_NOTIFICATION,
                    format!("D-Bus notify failed: {}", e),
                )
            })?;
        Ok(id)
    }
}

impl LocalNotifier for LinuxNotifier {
    fn show<'a>(&'a self, notification: &'a LocalNotification) -> BoxFuture<'a, FcmResult<()>> {
        Box::pin(async move {
            let id = self.deliver(notification).await?;
            tracing::debug!(
                notification_id = id,
                channel = %notification.channel_id,
                extras = notification.extras.len(),
                "local notification raised"
            );
            Ok(())
        })
    }

    fn is_available(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let proxy = match self.proxy().await {
                Ok(proxy) => proxy,
                Err(error) => {
                    tracing::debug!(error = %error, "notification service unreachable");
                    return false;
                },
            };
            match proxy.get_server_information().await {
                Ok((name, vendor, version, _)) => {
                    tracing::trace!(%name, %vendor, %version, "notification server found");
                    true
                },
                Err(error) => {
                    tracing::debug!(error = %error, "notification server did not answer");
                    false
                },
            }
        })
    }
}
