use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub String);

impl SceneId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Addresses a scene in the session and in the local cache. A scene without a
/// server-assigned id lives under `Draft` until its first successful create.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SceneKey {
    Draft,
    Scene(SceneId),
}

impl SceneKey {
    pub fn scene_id(&self) -> Option<&SceneId> {
        match self {
            SceneKey::Draft => None,
            SceneKey::Scene(id) => Some(id),
        }
    }

    pub fn cache_segment(&self) -> &str {
        match self {
            SceneKey::Draft => "draft",
            SceneKey::Scene(id) => id.as_str(),
        }
    }
}

impl From<SceneId> for SceneKey {
    fn from(id: SceneId) -> Self {
        SceneKey::Scene(id)
    }
}

impl fmt::Display for SceneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_segment())
    }
}

pub fn random_id() -> String {
    let mut bytes = [0u8; 12];
    fill_random(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn random_nonce() -> u32 {
    let mut bytes = [0u8; 4];
    fill_random(&mut bytes);
    u32::from_le_bytes(bytes)
}

fn fill_random(buf: &mut [u8]) {
    if getrandom::getrandom(buf).is_ok() {
        return;
    }

    // Entropy source unavailable: derive bytes from the clock and a process counter.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seed = format!("{}:{}", nanos, COUNTER.fetch_add(1, Ordering::Relaxed));
    let hash = blake3::hash(seed.as_bytes());
    for (dst, src) in buf.iter_mut().zip(hash.as_bytes().iter().cycle()) {
        *dst = *src;
    }
}
