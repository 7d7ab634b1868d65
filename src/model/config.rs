use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    pub version: u32,

    /// Cache namespace; all local entries are keyed by workspace and scene.
    #[serde(default = "default_workspace")]
    pub workspace: String,

    #[serde(default)]
    pub remote: Option<RemoteConfig>,

    #[serde(default)]
    pub save: SaveTiming,

    #[serde(default)]
    pub jobs: PollPolicy,

    #[serde(default)]
    pub layout: PinLayout,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            version: 1,
            workspace: default_workspace(),
            remote: None,
            save: SaveTiming::default(),
            jobs: PollPolicy::default(),
            layout: PinLayout::default(),
        }
    }
}

impl SyncConfig {
    /// `CANVEX_BASE_URL` and `CANVEX_WORKSPACE` override the file values.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CANVEX_BASE_URL")
            && !url.trim().is_empty()
        {
            match self.remote.as_mut() {
                Some(remote) => remote.base_url = url.trim().to_string(),
                None => {
                    self.remote = Some(RemoteConfig {
                        base_url: url.trim().to_string(),
                        token: None,
                    })
                }
            }
        }
        if let Ok(ws) = std::env::var("CANVEX_WORKSPACE")
            && !ws.trim().is_empty()
        {
            self.workspace = ws.trim().to_string();
        }
    }
}

fn default_workspace() -> String {
    "public".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveTiming {
    /// Quiet period after an editor change before flushing.
    pub debounce_ms: u64,
    /// Quiet period after an agent-driven change.
    pub urgent_debounce_ms: u64,
    /// Upper bound on how long a change may stay unsaved while debounces keep resetting.
    pub watchdog_ms: u64,
}

impl Default for SaveTiming {
    fn default() -> Self {
        Self {
            debounce_ms: 800,
            urgent_debounce_ms: 150,
            watchdog_ms: 5000,
        }
    }
}

impl SaveTiming {
    pub fn debounce(&self, urgent: bool) -> Duration {
        Duration::from_millis(if urgent {
            self.urgent_debounce_ms
        } else {
            self.debounce_ms
        })
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollPolicy {
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,

    /// Stop polling a scene's jobs when another scene is selected.
    #[serde(default)]
    pub cancel_on_deactivate: bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            max_poll_attempts: 150,
            cancel_on_deactivate: false,
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PinLayout {
    pub gap: f64,
    pub placeholder_width: f64,
    pub placeholder_height: f64,
    pub video_width: f64,
    pub video_height: f64,
    pub note_width: f64,
    pub font_size: f64,
}

impl Default for PinLayout {
    fn default() -> Self {
        Self {
            gap: 40.0,
            placeholder_width: 320.0,
            placeholder_height: 240.0,
            video_width: 384.0,
            video_height: 216.0,
            note_width: 360.0,
            font_size: 16.0,
        }
    }
}
