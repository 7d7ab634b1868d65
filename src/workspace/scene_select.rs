use super::*;
use crate::model::is_strictly_newer;
use crate::remote::{RemoteScene, ScenePatch};

impl Workspace {
    pub async fn list_scenes(&self) -> Result<Vec<RemoteScene>> {
        Ok(self.inner.remote.list_scenes().await?)
    }

    /// Activates a remote scene. The remote copy wins unless the local one
    /// (session or cache) is strictly newer, in which case the local copy is
    /// kept and queued for saving. Runs the job recovery pass for this
    /// activation before returning.
    pub async fn select_scene(&self, id: &SceneId) -> Result<SceneKey> {
        let key = SceneKey::Scene(id.clone());
        let remote = match self.inner.remote.get_scene(id).await {
            Ok(scene) => Some(scene),
            Err(err) => {
                tracing::warn!(scene = %id, error = %format!("{:#}", err), "remote copy unavailable");
                None
            }
        };

        let local_wins = self.adopt_selected(&key, remote.as_ref())?;
        let activation = self.activate(&key);
        self.emit(SyncEvent::SceneChanged { scene: key.clone() });
        self.emit_save_state(&key);
        if local_wins {
            tracing::info!(scene = %id, "local copy is newer; keeping it");
            self.schedule_flush(&key, false);
        } else {
            tracing::info!(scene = %id, "remote copy adopted");
        }

        if remote.is_some() {
            if let Err(err) = self.load_chat_history(id).await {
                tracing::warn!(scene = %id, error = %err, "chat history unavailable");
            }
            self.recover(id, activation).await;
        }
        Ok(key)
    }

    /// Installs the winning copy in the session. Returns true when the local
    /// copy won.
    fn adopt_selected(&self, key: &SceneKey, remote: Option<&RemoteScene>) -> Result<bool> {
        // The session copy is as fresh as the cache; prefer it when present.
        let session = self.with_slot(key, |slot| {
            (slot.scene.updated_at.clone(), slot.gate.is_running())
        });
        let cached = match session {
            Some(_) => None,
            None => self.read_scene_lossy(key),
        };

        let Some(remote) = remote else {
            if session.is_some() {
                return Ok(true);
            }
            let slot = self.slot_from_cache(key)?;
            self.with_state(|st| {
                st.scenes.insert(key.clone(), slot);
            });
            return Ok(true);
        };

        let local_stamp = match (&session, &cached) {
            (Some((stamp, _)), _) => Some(stamp.clone()),
            (None, Some(entry)) => Some(entry.updated_at.clone()),
            (None, None) => None,
        };
        let flushing = matches!(session, Some((_, true)));
        let local_wins = flushing
            || local_stamp
                .as_deref()
                .is_some_and(|local| is_strictly_newer(local, &remote.updated_at));

        if local_wins {
            if session.is_none() {
                let slot = self.slot_from_cache(key)?;
                self.with_state(|st| {
                    st.scenes.insert(key.clone(), slot);
                });
            }
            // A clean copy stamped after the remote one still has to be pushed.
            if !flushing {
                self.with_slot(key, |slot| {
                    if !slot.save.is_dirty() {
                        slot.save.mark_unsynced();
                    }
                });
            }
            let dirty = self
                .with_slot(key, |slot| slot.save.is_dirty())
                .unwrap_or(false);
            return Ok(dirty || flushing);
        }

        let data = canonical::sanitized(&SceneData::from_value_lossy(&remote.data));
        let fp = canonical::fingerprint(&data);
        let scene = Scene {
            id: Some(remote.id.clone()),
            title: remote.title.clone(),
            data,
            updated_at: remote.updated_at.clone(),
        };
        let existing = self.with_slot(key, |slot| {
            slot.scene = scene.clone();
            slot.save = SaveTracker::adopted_saved(fp.clone());
        });
        if existing.is_none() {
            let pins = self.read_pins_lossy(key);
            let chat = self.read_chat_lossy(key);
            let slot = SceneSlot::new(scene, SaveTracker::adopted_saved(fp), pins, chat);
            self.with_state(|st| {
                st.scenes.insert(key.clone(), slot);
            });
        }
        self.persist_scene(key);
        Ok(false)
    }

    /// Makes `key` the active scene and starts a new activation. Poll tasks of
    /// the previous scene keep running unless `jobs.cancel_on_deactivate`.
    fn activate(&self, key: &SceneKey) -> u64 {
        let cancel = self.inner.config.jobs.cancel_on_deactivate;
        self.with_state(|st| {
            if let Some(prev) = st.active.replace(key.clone())
                && prev != *key
                && cancel
                && let Some(prev_id) = prev.scene_id()
            {
                let stopped = st.jobs.cancel_scene(prev_id);
                if stopped > 0 {
                    tracing::debug!(scene = %prev_id, stopped, "stopped polls of deactivated scene");
                }
            }
            st.activation += 1;
            st.activation
        })
    }

    /// Starts a fresh, empty draft and makes it active. Any cached draft is
    /// discarded.
    pub fn new_draft(&self, title: &str) -> Result<SceneKey> {
        let busy = self.with_state(|st| {
            st.scenes
                .get(&SceneKey::Draft)
                .is_some_and(|slot| slot.gate.is_running())
        });
        if busy {
            return Err(WorkspaceError::DraftBusy);
        }
        self.inner.cache.clear(&SceneKey::Draft)?;
        let slot = SceneSlot::new(
            Scene::draft(title),
            SaveTracker::default(),
            PinBook::default(),
            Vec::new(),
        );
        self.with_state(|st| {
            st.scenes.insert(SceneKey::Draft, slot);
            st.adopted_draft = None;
        });
        self.activate(&SceneKey::Draft);
        self.persist_scene(&SceneKey::Draft);
        self.emit(SyncEvent::SceneChanged {
            scene: SceneKey::Draft,
        });
        Ok(SceneKey::Draft)
    }

    /// Reopens the cached draft left by an earlier session, if any.
    pub fn restore_draft(&self) -> Result<Option<SceneKey>> {
        if self.read_scene_lossy(&SceneKey::Draft).is_none() {
            return Ok(None);
        }
        let slot = self.slot_from_cache(&SceneKey::Draft)?;
        let dirty = slot.save.is_dirty();
        self.with_state(|st| {
            st.scenes.insert(SceneKey::Draft, slot);
            st.adopted_draft = None;
        });
        self.activate(&SceneKey::Draft);
        self.emit(SyncEvent::SceneChanged {
            scene: SceneKey::Draft,
        });
        if dirty {
            self.schedule_flush(&SceneKey::Draft, false);
        }
        Ok(Some(SceneKey::Draft))
    }

    /// Deletes the remote scene and everything cached for it.
    pub async fn delete_scene(&self, id: &SceneId) -> Result<()> {
        self.inner.remote.delete_scene(id).await?;
        let key = SceneKey::Scene(id.clone());
        self.with_state(|st| {
            st.scenes.remove(&key);
            st.jobs.cancel_scene(id);
            if st.active.as_ref() == Some(&key) {
                st.active = None;
            }
        });
        self.inner.cache.clear(&key)?;
        tracing::info!(scene = %id, "scene deleted");
        Ok(())
    }

    /// Renames a scene. Drafts keep the title for their first save.
    pub async fn rename_scene(&self, key: &SceneKey, title: &str) -> Result<()> {
        let id = self.with_loaded_slot(key, |slot| {
            slot.scene.title = title.to_string();
            slot.scene.id.clone()
        })?;
        self.persist_scene(key);
        let Some(id) = id else {
            return Ok(());
        };
        let patch = ScenePatch {
            title: Some(title.to_string()),
            data: None,
        };
        let saved = self.inner.remote.update_scene(&id, &patch).await?;
        self.with_slot(key, |slot| {
            if !slot.save.is_dirty() {
                slot.scene.updated_at = saved.updated_at.clone();
            }
        });
        self.persist_scene(key);
        Ok(())
    }
}
