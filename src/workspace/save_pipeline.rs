use super::*;
use crate::model::{now_rfc3339, stamp_after};
use crate::remote::ScenePatch;

const ADOPTION_WAIT: std::time::Duration = std::time::Duration::from_millis(50);
const ADOPTION_WAIT_ROUNDS: usize = 100;

impl SceneSlot {
    /// Takes a new document. Returns `(content changed, differs from remote)`.
    pub(super) fn accept(&mut self, data: SceneData) -> (bool, bool) {
        let data = canonical::sanitized(&data);
        let fp = canonical::fingerprint(&data);
        if self.save.current() == Some(&fp) {
            return (false, self.save.is_dirty());
        }
        self.scene.data = data;
        self.scene.updated_at = now_rfc3339();
        let dirty = self.save.record(fp);
        (true, dirty)
    }
}

impl Workspace {
    /// Takes the editor's latest document for `key` and mirrors it to the
    /// cache before returning. Returns true when the remote copy is now stale.
    pub fn record_mutation(&self, key: &SceneKey, data: SceneData) -> Result<bool> {
        let (changed, dirty) = self.with_loaded_slot(key, |slot| slot.accept(data))?;
        if changed {
            self.persist_scene(key);
            self.emit(SyncEvent::SceneChanged {
                scene: self.with_state(|st| st.resolve(key)),
            });
            self.emit_save_state(key);
        }
        Ok(dirty)
    }

    /// Editor change notification: record, then debounce a flush.
    pub fn apply_edit(&self, key: &SceneKey, data: SceneData) -> Result<bool> {
        let dirty = self.record_mutation(key, data)?;
        if dirty {
            self.schedule_flush(key, false);
        }
        Ok(dirty)
    }

    /// Debounces a flush of `key`. Each call restarts the quiet period; the
    /// first call with unsaved changes also arms a watchdog that flushes
    /// regardless once `save.watchdog_ms` has passed.
    pub fn schedule_flush(&self, key: &SceneKey, urgent: bool) {
        let timing = self.inner.config.save.clone();
        let Some((generation, arm)) = self.with_slot(key, |slot| {
            let generation = slot.debounce.schedule();
            let arm = slot.save.is_dirty() && slot.debounce.arm_watchdog();
            (generation, arm)
        }) else {
            return;
        };

        let ws = self.clone();
        let k = key.clone();
        let delay = timing.debounce(urgent);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let current = ws
                .with_slot(&k, |slot| slot.debounce.is_current(generation))
                .unwrap_or(false);
            if current {
                let _ = ws.flush(&k).await;
            }
        });

        if arm {
            let ws = self.clone();
            let k = key.clone();
            let watchdog = timing.watchdog();
            tokio::spawn(async move {
                tokio::time::sleep(watchdog).await;
                let dirty = ws
                    .with_slot(&k, |slot| {
                        slot.debounce.disarm_watchdog();
                        slot.save.is_dirty()
                    })
                    .unwrap_or(false);
                if dirty {
                    tracing::debug!(scene = %k, "save watchdog fired");
                    let _ = ws.flush(&k).await;
                }
            });
        }
    }

    /// Writes the scene to the remote unless it already holds the current
    /// document. Single-flight per scene: a call that arrives while a flush is
    /// running returns at once and the running flush does one more pass.
    /// Failures are reported through the returned state, never as errors.
    pub async fn flush(&self, key: &SceneKey) -> Result<SaveState> {
        let entered = self
            .with_slot(key, |slot| slot.gate.enter())
            .ok_or_else(|| WorkspaceError::UnknownScene(key.clone()))?;
        if entered {
            loop {
                if let Err(err) = self.flush_once(key).await {
                    tracing::warn!(scene = %key, error = %format!("{:#}", err), "flush failed");
                }
                let again = self
                    .with_slot(key, |slot| slot.gate.leave())
                    .unwrap_or(false);
                if !again {
                    break;
                }
            }
        }
        Ok(self.save_state(key).unwrap_or(SaveState::Idle))
    }

    async fn flush_once(&self, key: &SceneKey) -> anyhow::Result<()> {
        let snapshot = self
            .with_slot(key, |slot| {
                if slot.scene.id.is_some() && !slot.save.is_dirty() {
                    slot.save.save_skipped();
                    return None;
                }
                let fp = slot
                    .save
                    .current()
                    .cloned()
                    .unwrap_or_else(|| canonical::fingerprint(&slot.scene.data));
                slot.save.begin_save();
                Some((
                    slot.scene.id.clone(),
                    slot.scene.title.clone(),
                    slot.scene.data.to_value(),
                    fp,
                ))
            })
            .flatten();
        let Some((id, title, data, fp)) = snapshot else {
            return Ok(());
        };
        self.emit_save_state(key);

        let result = match id.as_ref() {
            None => self.inner.remote.create_scene(&title, &data).await,
            Some(id) => {
                let patch = ScenePatch {
                    title: None,
                    data: Some(data),
                };
                self.inner.remote.update_scene(id, &patch).await
            }
        };

        let saved = match result {
            Ok(saved) => saved,
            Err(err) => {
                self.with_slot(key, |slot| slot.save.save_failed());
                self.persist_scene(key);
                self.emit_save_state(key);
                return Err(err);
            }
        };

        if id.is_none() {
            self.adopt_draft(&saved.id);
        }
        let saved_key = SceneKey::Scene(saved.id.clone());
        self.with_slot(&saved_key, |slot| {
            slot.save.save_succeeded(fp);
            slot.scene.updated_at = if slot.save.is_dirty() {
                stamp_after(&saved.updated_at)
            } else {
                saved.updated_at.clone()
            };
        });
        self.persist_scene(&saved_key);
        self.emit_save_state(&saved_key);
        tracing::info!(scene = %saved.id, "scene saved");
        Ok(())
    }

    /// Re-keys the draft slot under its new remote id and moves its cache
    /// entries along with it.
    fn adopt_draft(&self, id: &SceneId) {
        let to = SceneKey::Scene(id.clone());
        let moved = self.with_state(|st| {
            let Some(mut slot) = st.scenes.remove(&SceneKey::Draft) else {
                return false;
            };
            slot.scene.id = Some(id.clone());
            st.scenes.insert(to.clone(), slot);
            st.adopted_draft = Some(id.clone());
            if st.active == Some(SceneKey::Draft) {
                st.active = Some(to.clone());
            }
            if st.chat_busy.remove(&SceneKey::Draft) {
                st.chat_busy.insert(to.clone());
            }
            true
        });
        if !moved {
            return;
        }
        if let Err(err) = self.inner.cache.migrate(&SceneKey::Draft, &to) {
            tracing::warn!(scene = %id, error = %err, "draft cache migration failed");
        }
        tracing::info!(scene = %id, "draft adopted");
        self.emit(SyncEvent::SceneAdopted {
            from: SceneKey::Draft,
            to: id.clone(),
        });
    }

    /// The scene's remote id, creating the remote copy of a draft first.
    pub(super) async fn ensure_remote_id(&self, key: &SceneKey) -> Result<SceneId> {
        let id = self
            .with_loaded_slot(key, |slot| slot.scene.id.clone())?;
        if let Some(id) = id {
            return Ok(id);
        }
        // A flush already in progress may be creating the remote copy; wait
        // for it instead of reporting the scene unsaved.
        for _ in 0..ADOPTION_WAIT_ROUNDS {
            self.flush(key).await?;
            let (id, running) = self
                .with_slot(key, |slot| (slot.scene.id.clone(), slot.gate.is_running()))
                .unwrap_or((None, false));
            if let Some(id) = id {
                return Ok(id);
            }
            if !running {
                break;
            }
            tokio::time::sleep(ADOPTION_WAIT).await;
        }
        Err(WorkspaceError::Unsaved(key.clone()))
    }
}
