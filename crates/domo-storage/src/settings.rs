//! Persisted controller settings
//!
//! One storage file holds everything that must survive a restart: the
//! automation flag, the first-motion latch, the assumed switch bank state
//! and the last-motion timestamp.

use chrono::{DateTime, Utc};
use domo_core::SwitchBankState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::{Storage, StorageFile};

const SETTINGS_KEY: &str = "domo.settings";
const SETTINGS_VERSION: u32 = 1;

/// The persisted key set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsData {
    /// Whether the automation rules are enabled
    #[serde(default)]
    pub automation: bool,

    /// First-motion-since-away latch: true means tripped
    #[serde(default)]
    pub first_move: bool,

    /// Assumed state of the RF switch bank
    #[serde(default)]
    pub switches: SwitchBankState,

    /// Timestamp of the last observed motion
    #[serde(default)]
    pub last_motion: Option<DateTime<Utc>>,
}

/// Shared handle over the settings
///
/// The in-memory copy is authoritative; every mutation is written through
/// to storage best-effort. When built with [`Settings::ephemeral`] nothing
/// is persisted at all, matching a disabled save-state switch.
#[derive(Clone)]
pub struct Settings {
    data: Arc<RwLock<SettingsData>>,
    storage: Option<Storage>,
}

impl Settings {
    /// Load settings from storage, falling back to defaults
    ///
    /// A corrupt or unreadable settings file is logged and replaced by
    /// defaults rather than aborting startup.
    pub async fn load(storage: Storage) -> Self {
        let data = match storage.load::<SettingsData>(SETTINGS_KEY).await {
            Ok(Some(file)) => file.data,
            Ok(None) => SettingsData::default(),
            Err(err) => {
                warn!(error = %err, "Failed to load settings, starting from defaults");
                SettingsData::default()
            }
        };

        Self {
            data: Arc::new(RwLock::new(data)),
            storage: Some(storage),
        }
    }

    /// In-memory only settings, nothing survives a restart
    pub fn ephemeral() -> Self {
        Self {
            data: Arc::new(RwLock::new(SettingsData::default())),
            storage: None,
        }
    }

    /// Snapshot of the current settings
    pub async fn snapshot(&self) -> SettingsData {
        self.data.read().await.clone()
    }

    pub async fn automation(&self) -> bool {
        self.data.read().await.automation
    }

    pub async fn first_move(&self) -> bool {
        self.data.read().await.first_move
    }

    pub async fn switches(&self) -> SwitchBankState {
        self.data.read().await.switches
    }

    pub async fn last_motion(&self) -> Option<DateTime<Utc>> {
        self.data.read().await.last_motion
    }

    pub async fn set_automation(&self, enabled: bool) {
        self.update(|d| d.automation = enabled).await;
    }

    pub async fn set_first_move(&self, tripped: bool) {
        self.update(|d| d.first_move = tripped).await;
    }

    pub async fn set_switches(&self, switches: SwitchBankState) {
        self.update(|d| d.switches = switches).await;
    }

    pub async fn set_last_motion(&self, at: DateTime<Utc>) {
        self.update(|d| d.last_motion = Some(at)).await;
    }

    async fn update(&self, f: impl FnOnce(&mut SettingsData)) {
        let snapshot = {
            let mut data = self.data.write().await;
            f(&mut data);
            data.clone()
        };
        self.persist(snapshot).await;
    }

    async fn persist(&self, data: SettingsData) {
        let Some(storage) = &self.storage else {
            return;
        };

        let file = StorageFile::new(SETTINGS_KEY, data, SETTINGS_VERSION);
        if let Err(err) = storage.save(&file).await {
            // In-memory state stays authoritative; the write retries on the
            // next mutation.
            warn!(error = %err, "Failed to persist settings");
        }
    }
}
