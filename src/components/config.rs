// Plugin configuration, read from `plugins.fcm` in the host config or built in code

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::permission::PermissionFlow;

pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_STORE_FILE_NAME: &str = "fcm_prefs.json";
pub const DEFAULT_CHANNEL_ID: &str = "fcm_default_channel";
pub const DEFAULT_CHANNEL_NAME: &str = "FCM Channel";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FcmConfig {
    /// Upper bound on every vendor call
    pub command_timeout_ms: u64,
    pub store_file_name: String,
    pub channel_id: String,
    pub channel_name: String,
    /// Application name shown by desktop notification daemons
    pub app_name: String,
    pub permission_flow: PermissionFlow,
    /// Fetch the token during `initialize` and announce it
    pub fetch_token_on_start: bool,
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            store_file_name: DEFAULT_STORE_FILE_NAME.to_string(),
            channel_id: DEFAULT_CHANNEL_ID.to_string(),
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            app_name: "FCM".to_string(),
            permission_flow: PermissionFlow::default(),
            fetch_token_on_start: true,
        }
    }
}

impl FcmConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_permission_flow(mut self, flow: PermissionFlow) -> Self {
        self.permission_flow = flow;
        self
    }

    pub fn with_channel(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.channel_id = id.into();
        self.channel_name = name.into();
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn with_store_file_name(mut self, name: impl Into<String>) -> Self {
        self.store_file_name = name.into();
        self
    }

    pub fn with_fetch_token_on_start(mut self, fetch: bool) -> Self {
        self.fetch_token_on_start = fetch;
        self
    }
}
