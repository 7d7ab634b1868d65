use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CacheError, CacheResult, LocalCache, read_json, write_json};
use crate::canonical::Fingerprint;
use crate::model::{ChatMessage, SceneData, SceneId, SceneKey};
use crate::pins::PinBook;

const SCENE_FILE: &str = "scene.json";
const CHAT_FILE: &str = "chat.json";
const PINS_FILE: &str = "pins.json";

/// Last-known document for one scene. `updated_at` is the time of the latest
/// local edit or of the remote copy this entry mirrors.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CachedScene {
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SceneId>,

    #[serde(default)]
    pub title: String,

    pub data: Value,

    pub updated_at: String,

    /// Fingerprint the remote is known to hold, if any save has landed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_fingerprint: Option<Fingerprint>,
}

impl CachedScene {
    pub fn scene_data(&self) -> SceneData {
        SceneData::from_value_lossy(&self.data)
    }
}

impl LocalCache {
    pub fn read_scene(&self, key: &SceneKey) -> CacheResult<Option<CachedScene>> {
        let entry: Option<CachedScene> = read_json(&self.scene_dir(key).join(SCENE_FILE))?;
        Ok(entry.filter(|e| e.version == 1))
    }

    pub fn write_scene(&self, key: &SceneKey, entry: &CachedScene) -> CacheResult<()> {
        write_json(&self.scene_dir(key).join(SCENE_FILE), entry, "scene")
    }

    pub fn read_chat(&self, key: &SceneKey) -> CacheResult<Vec<ChatMessage>> {
        Ok(read_json(&self.scene_dir(key).join(CHAT_FILE))?.unwrap_or_default())
    }

    pub fn write_chat(&self, key: &SceneKey, log: &[ChatMessage]) -> CacheResult<()> {
        write_json(&self.scene_dir(key).join(CHAT_FILE), &log, "chat log")
    }

    pub fn read_pins(&self, key: &SceneKey) -> CacheResult<PinBook> {
        Ok(read_json(&self.scene_dir(key).join(PINS_FILE))?.unwrap_or_default())
    }

    pub fn write_pins(&self, key: &SceneKey, book: &PinBook) -> CacheResult<()> {
        write_json(&self.scene_dir(key).join(PINS_FILE), book, "pins")
    }

    /// Moves every entry under `from` to `to` and removes `from`. Entries that
    /// already exist under `to` are replaced.
    pub fn migrate(&self, from: &SceneKey, to: &SceneKey) -> CacheResult<()> {
        let src = self.scene_dir(from);
        if !src.is_dir() {
            return Ok(());
        }
        let dst = self.scene_dir(to);
        fs::create_dir_all(&dst).map_err(|source| CacheError::Io {
            path: dst.clone(),
            source,
        })?;
        for name in [SCENE_FILE, CHAT_FILE, PINS_FILE] {
            let from_path = src.join(name);
            if !from_path.is_file() {
                continue;
            }
            let to_path = dst.join(name);
            fs::rename(&from_path, &to_path).map_err(|source| CacheError::Io {
                path: to_path.clone(),
                source,
            })?;
        }
        self.clear(from)
    }

    pub fn clear(&self, key: &SceneKey) -> CacheResult<()> {
        let dir = self.scene_dir(key);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path: dir, source }),
        }
    }
}
