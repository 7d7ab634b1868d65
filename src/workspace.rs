use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::canonical::{self, Fingerprint};
use crate::jobs::{JobRegistry, SelectionStatus, SelectionTracker};
use crate::model::{
    ChatMessage, JobId, JobStatus, SaveState, Scene, SceneData, SceneId, SceneKey, SyncConfig,
};
use crate::pins::PinBook;
use crate::remote::SceneRemote;
use crate::store::{CacheError, CachedScene, LocalCache};
use crate::sync::{Debounce, FlushGate, SaveTracker};

mod chat_turn;
mod doc_ops;
mod lifecycle;
mod media_jobs;
mod recovery;
mod save_pipeline;
mod scene_select;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("a chat turn is already running for scene {0}")]
    ChatBusy(SceneKey),

    #[error("scene {0} is not loaded")]
    UnknownScene(SceneKey),

    #[error("scene {0} has no remote copy yet")]
    Unsaved(SceneKey),

    #[error("the current draft is still being created remotely")]
    DraftBusy,

    #[error("chat turn aborted: {0}")]
    ChatAborted(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Remote(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Change notifications for whoever renders the session.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    SaveState {
        scene: SceneKey,
        state: SaveState,
    },
    SceneChanged {
        scene: SceneKey,
    },
    SceneAdopted {
        from: SceneKey,
        to: SceneId,
    },
    JobStatus {
        scene: SceneId,
        job_id: JobId,
        status: JobStatus,
        label: String,
    },
    SelectionStatus {
        key: String,
        status: SelectionStatus,
    },
}

/// The sync session. Owns all mutable sync state; every operation goes
/// through it. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Workspace {
    inner: Arc<Inner>,
}

struct Inner {
    config: SyncConfig,
    cache: LocalCache,
    remote: Arc<dyn SceneRemote>,
    // Never held across an await.
    state: Mutex<SessionState>,
    events: broadcast::Sender<SyncEvent>,
}

#[derive(Default)]
struct SessionState {
    active: Option<SceneKey>,
    activation: u64,
    scenes: HashMap<SceneKey, SceneSlot>,
    /// Id the last draft was adopted under, so `SceneKey::Draft` handles
    /// held by timers and callers still reach it.
    adopted_draft: Option<SceneId>,
    selections: SelectionTracker,
    jobs: JobRegistry,
    chat_busy: HashSet<SceneKey>,
}

impl SessionState {
    fn resolve(&self, key: &SceneKey) -> SceneKey {
        match (key, self.adopted_draft.as_ref()) {
            (SceneKey::Draft, Some(id)) if !self.scenes.contains_key(&SceneKey::Draft) => {
                SceneKey::Scene(id.clone())
            }
            _ => key.clone(),
        }
    }
}

struct SceneSlot {
    scene: Scene,
    save: SaveTracker,
    gate: FlushGate,
    debounce: Debounce,
    pins: PinBook,
    chat: Vec<ChatMessage>,
    recovered_in: Option<u64>,
}

impl SceneSlot {
    fn new(scene: Scene, save: SaveTracker, pins: PinBook, chat: Vec<ChatMessage>) -> Self {
        Self {
            scene,
            save,
            gate: FlushGate::default(),
            debounce: Debounce::default(),
            pins,
            chat,
            recovered_in: None,
        }
    }

    fn cache_entry(&self) -> CachedScene {
        CachedScene {
            version: 1,
            id: self.scene.id.clone(),
            title: self.scene.title.clone(),
            data: self.scene.data.to_value(),
            updated_at: self.scene.updated_at.clone(),
            saved_fingerprint: self.save.saved().cloned(),
        }
    }
}

impl Workspace {
    pub fn new(config: SyncConfig, cache: LocalCache, remote: Arc<dyn SceneRemote>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                config,
                cache,
                remote,
                state: Mutex::new(SessionState::default()),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &LocalCache {
        &self.inner.cache
    }

    pub fn active(&self) -> Option<SceneKey> {
        self.with_state(|st| st.active.clone())
    }

    pub fn scene(&self, key: &SceneKey) -> Option<Scene> {
        self.with_slot(key, |slot| slot.scene.clone())
    }

    pub fn document(&self, key: &SceneKey) -> Option<SceneData> {
        self.with_slot(key, |slot| slot.scene.data.clone())
    }

    pub fn save_state(&self, key: &SceneKey) -> Option<SaveState> {
        self.with_slot(key, |slot| slot.save.state())
    }

    pub fn saved_fingerprint(&self, key: &SceneKey) -> Option<Fingerprint> {
        self.with_slot(key, |slot| slot.save.saved().cloned()).flatten()
    }

    pub fn pin_book(&self, key: &SceneKey) -> Option<PinBook> {
        self.with_slot(key, |slot| slot.pins.clone())
    }

    pub fn chat_log(&self, key: &SceneKey) -> Vec<ChatMessage> {
        self.with_slot(key, |slot| slot.chat.clone())
            .unwrap_or_default()
    }

    pub fn selection_status(&self, selection: &str) -> SelectionStatus {
        self.with_state(|st| st.selections.status(selection))
    }

    pub fn is_polling(&self, scene: &SceneId, job: &JobId) -> bool {
        self.with_state(|st| st.jobs.is_polling(scene, job))
    }

    pub fn polling_count(&self) -> usize {
        self.with_state(|st| st.jobs.polling_count())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let mut st = self.inner.state.lock();
        f(&mut st)
    }

    fn with_slot<T>(&self, key: &SceneKey, f: impl FnOnce(&mut SceneSlot) -> T) -> Option<T> {
        self.with_state(|st| {
            let key = st.resolve(key);
            st.scenes.get_mut(&key).map(f)
        })
    }

    /// Like `with_slot`, loading the slot from the cache when the session has
    /// not seen the scene yet. Job results for scenes that were never opened
    /// in this session land here.
    fn with_loaded_slot<T>(&self, key: &SceneKey, f: impl FnOnce(&mut SceneSlot) -> T) -> Result<T> {
        if self.with_slot(key, |_| ()).is_none() {
            let slot = self.slot_from_cache(key)?;
            self.with_state(|st| {
                let key = st.resolve(key);
                st.scenes.entry(key).or_insert(slot);
            });
        }
        self.with_slot(key, f)
            .ok_or_else(|| WorkspaceError::UnknownScene(key.clone()))
    }

    fn slot_from_cache(&self, key: &SceneKey) -> Result<SceneSlot> {
        let cache = &self.inner.cache;
        let Some(entry) = cache.read_scene(key)? else {
            return Err(WorkspaceError::UnknownScene(key.clone()));
        };
        let data = canonical::sanitized(&entry.scene_data());
        let fp = canonical::fingerprint(&data);
        let save = match entry.saved_fingerprint.clone() {
            Some(saved) if saved == fp => SaveTracker::adopted_saved(fp),
            saved => SaveTracker::adopted_pending(fp, saved),
        };
        let scene = Scene {
            id: entry.id.clone().or_else(|| key.scene_id().cloned()),
            title: entry.title.clone(),
            data,
            updated_at: entry.updated_at.clone(),
        };
        let pins = self.read_pins_lossy(key);
        let chat = self.read_chat_lossy(key);
        Ok(SceneSlot::new(scene, save, pins, chat))
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn emit_save_state(&self, key: &SceneKey) {
        if let Some(state) = self.save_state(key) {
            let scene = self.with_state(|st| st.resolve(key));
            self.emit(SyncEvent::SaveState { scene, state });
        }
    }

    /// Writes the slot's scene entry; failures are logged, never fatal.
    fn persist_scene(&self, key: &SceneKey) {
        let Some((key, entry)) = self.with_state(|st| {
            let key = st.resolve(key);
            st.scenes.get(&key).map(|s| (key.clone(), s.cache_entry()))
        }) else {
            return;
        };
        if let Err(err) = self.inner.cache.write_scene(&key, &entry) {
            tracing::warn!(scene = %key, error = %err, "cache write failed");
        }
    }

    fn persist_pins(&self, key: &SceneKey) {
        let Some((key, book)) = self.with_state(|st| {
            let key = st.resolve(key);
            st.scenes.get(&key).map(|s| (key.clone(), s.pins.clone()))
        }) else {
            return;
        };
        if let Err(err) = self.inner.cache.write_pins(&key, &book) {
            tracing::warn!(scene = %key, error = %err, "pin cache write failed");
        }
    }

    fn persist_chat(&self, key: &SceneKey) {
        let Some((key, log)) = self.with_state(|st| {
            let key = st.resolve(key);
            st.scenes.get(&key).map(|s| (key.clone(), s.chat.clone()))
        }) else {
            return;
        };
        if let Err(err) = self.inner.cache.write_chat(&key, &log) {
            tracing::warn!(scene = %key, error = %err, "chat cache write failed");
        }
    }

    fn read_scene_lossy(&self, key: &SceneKey) -> Option<CachedScene> {
        match self.inner.cache.read_scene(key) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(scene = %key, error = %err, "ignoring unreadable cache entry");
                None
            }
        }
    }

    fn read_pins_lossy(&self, key: &SceneKey) -> PinBook {
        self.inner.cache.read_pins(key).unwrap_or_else(|err| {
            tracing::warn!(scene = %key, error = %err, "ignoring unreadable pin entry");
            PinBook::default()
        })
    }

    fn read_chat_lossy(&self, key: &SceneKey) -> Vec<ChatMessage> {
        self.inner.cache.read_chat(key).unwrap_or_else(|err| {
            tracing::warn!(scene = %key, error = %err, "ignoring unreadable chat entry");
            Vec::new()
        })
    }
}
