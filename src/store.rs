use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::model::{SceneKey, SyncConfig};

mod entries;
pub use self::entries::CachedScene;

/// Failure reading or writing the local cache. Absent entries are not errors;
/// typed reads return `Ok(None)` for them.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cache found at {} (run `canvex init`)", .0.display())]
    Missing(PathBuf),

    #[error("cache already exists at {} (use --force to re-init)", .0.display())]
    Exists(PathBuf),

    #[error("cache io at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache entry {}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialize {what}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Durable per-workspace, per-scene mirror of the last-known document, chat log
/// and pin bookkeeping.
#[derive(Clone, Debug)]
pub struct LocalCache {
    root: PathBuf,
    workspace: String,
}

impl LocalCache {
    pub fn init(root: &Path, force: bool) -> CacheResult<Self> {
        let cfg_path = root.join("config.json");
        if cfg_path.exists() && !force {
            return Err(CacheError::Exists(root.to_path_buf()));
        }
        let ws = root.join("workspaces");
        fs::create_dir_all(&ws).map_err(|source| CacheError::Io { path: ws, source })?;

        let cfg = SyncConfig::default();
        write_json(&cfg_path, &cfg, "config")?;
        Ok(Self {
            root: root.to_path_buf(),
            workspace: cfg.workspace,
        })
    }

    pub fn open(root: &Path) -> CacheResult<Self> {
        if !root.join("config.json").is_file() {
            return Err(CacheError::Missing(root.to_path_buf()));
        }
        let mut cache = Self {
            root: root.to_path_buf(),
            workspace: String::new(),
        };
        cache.workspace = cache.read_config()?.workspace;
        Ok(cache)
    }

    /// Opens `root` if it holds a cache, creating one with defaults otherwise.
    pub fn open_or_init(root: &Path) -> CacheResult<Self> {
        match Self::open(root) {
            Err(CacheError::Missing(_)) => Self::init(root, false),
            other => other,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// Same cache root, different workspace namespace.
    pub fn with_workspace(mut self, workspace: &str) -> Self {
        self.workspace = workspace.to_string();
        self
    }

    pub fn read_config(&self) -> CacheResult<SyncConfig> {
        let path = self.root.join("config.json");
        read_json(&path)?.ok_or(CacheError::Missing(self.root.clone()))
    }

    pub fn write_config(&self, cfg: &SyncConfig) -> CacheResult<()> {
        write_json(&self.root.join("config.json"), cfg, "config")
    }

    fn scene_dir(&self, key: &SceneKey) -> PathBuf {
        self.root
            .join("workspaces")
            .join(path_segment(&self.workspace))
            .join(path_segment(key.cache_segment()))
    }
}

// Scene ids come from the server; anything that is not a plain token is hashed
// so it can never escape the workspace directory.
fn path_segment(raw: &str) -> String {
    let plain = !raw.is_empty()
        && raw.len() <= 128
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if plain {
        raw.to_string()
    } else {
        format!("h-{}", &blake3::hash(raw.as_bytes()).to_hex()[..32])
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> CacheResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: Serialize>(path: &Path, value: &T, what: &'static str) -> CacheResult<()> {
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|source| CacheError::Encode { what, source })?;
    write_atomic(path, &bytes)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> CacheResult<()> {
    let io = |path: &Path| {
        let path = path.to_path_buf();
        move |source| CacheError::Io { path, source }
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io(parent))?;
    }
    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp, bytes).map_err(io(&tmp))?;
    fs::rename(&tmp, path).map_err(io(path))?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
