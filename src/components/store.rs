// Scoped key/value preferences: last message, last token, pending tap payload
// Backed by a JSON file in the app data directory, or memory only

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::message::FcmMessage;
use super::{FcmError, FcmResult};

/// Everything the plugin persists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredState {
    #[serde(default)]
    pub last_message: Option<FcmMessage>,
    #[serde(default)]
    pub fcm_token: Option<String>,
    /// Extras of the last background notification, replayed once on launch
    #[serde(default)]
    pub pending_launch: Option<BTreeMap<String, String>>,
}

pub struct Preferences {
    path: Option<PathBuf>,
    state: Mutex<StoredState>,
    // Keeps file writes in the same order as the in-memory updates
    write_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("path", &self.path)
            .finish()
    }
}

impl Preferences {
    /// Preferences that live only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoredState::default()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Load preferences from `path`. A missing file starts empty; an unreadable
    /// one is logged and replaced on the next write.
    pub async fn open(path: impl Into<PathBuf>) -> FcmResult<Self> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<StoredState>(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "discarding corrupt preferences");
                    StoredState::default()
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredState::default(),
            Err(e) => {
                return Err(FcmError::storage(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            },
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn snapshot(&self) -> StoredState {
        self.state.lock().clone()
    }

    pub fn last_message(&self) -> Option<FcmMessage> {
        self.state.lock().last_message.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.lock().fcm_token.clone()
    }

    /// Overwrite the last message
    pub async fn set_last_message(&self, message: FcmMessage) -> FcmResult<()> {
        self.update(|state| state.last_message = Some(message)).await
    }

    pub async fn set_token(&self, token: Option<String>) -> FcmResult<()> {
        self.update(|state| state.fcm_token = token).await
    }

    pub async fn set_pending_launch(&self, extras: BTreeMap<String, String>) -> FcmResult<()> {
        self.update(|state| state.pending_launch = Some(extras)).await
    }

    /// Remove and return the pending tap payload
    pub async fn take_pending_launch(&self) -> FcmResult<Option<BTreeMap<String, String>>> {
        if self.state.lock().pending_launch.is_none() {
            return Ok(None);
        }
        self.update(|state| state.pending_launch.take()).await
    }

    async fn update<F, R>(&self, apply: F) -> FcmResult<R>
    where
        F: FnOnce(&mut StoredState) -> R,
    {
        let _writer = self.write_lock.lock().await;
        let (result, snapshot) = {
            let mut state = self.state.lock();
            let result = apply(&mut state);
            (result, state.clone())
        };
        self.persist(&snapshot).await?;
        Ok(result)
    }

    async fn persist(&self, snapshot: &StoredState) -> FcmResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| FcmError::storage(format!("failed to encode preferences: {}", e)))?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                FcmError::storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        // Write next to the target and rename so readers never see a torn file
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, &bytes)
            .await
            .map_err(|e| FcmError::storage(format!("failed to write {}: {}", staging.display(), e)))?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| FcmError::storage(format!("failed to replace {}: {}", path.display(), e)))?;

        tracing::trace!(path = ?path, "preferences persisted");
        Ok(())
    }
}
