use super::*;

impl Workspace {
    /// The page is being hidden: mirror every unsaved scene to the cache,
    /// then try to save them.
    pub async fn on_visibility_lost(&self) {
        self.flush_dirty("visibility lost").await;
    }

    pub async fn on_blur(&self) {
        self.flush_dirty("blur").await;
    }

    /// Connectivity came back; retry whatever is still pending or failed.
    pub async fn on_online(&self) {
        self.flush_dirty("online").await;
    }

    /// Final flush before the session goes away. Poll tasks are stopped;
    /// their jobs are picked up again by recovery next time.
    pub async fn teardown(&self) {
        self.flush_dirty("teardown").await;
        self.with_state(|st| st.jobs.cancel_all());
        tracing::debug!("workspace torn down");
    }

    async fn flush_dirty(&self, reason: &str) {
        let keys: Vec<SceneKey> = self.with_state(|st| {
            let mut keys: Vec<SceneKey> = st
                .scenes
                .iter()
                .filter(|(_, slot)| slot.save.is_dirty())
                .map(|(key, _)| key.clone())
                .collect();
            keys.sort_by_key(|key| key.to_string());
            keys
        });
        if keys.is_empty() {
            return;
        }
        tracing::debug!(reason, scenes = keys.len(), "flushing unsaved scenes");
        for key in &keys {
            self.persist_scene(key);
        }
        for key in &keys {
            if let Err(err) = self.flush(key).await {
                tracing::warn!(scene = %key, error = %err, "flush skipped");
            }
        }
    }
}
