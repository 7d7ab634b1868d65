//! Bookkeeping for asynchronous media jobs: the in-flight poll registry, the
//! per-selection status tracker and the recovery planner.

use std::collections::HashMap;

use tokio::task::AbortHandle;

use crate::model::{JobId, JobKind, JobStatus, MediaKind, SceneId};
use crate::pins::MediaPayload;
use crate::remote::MediaOutput;

mod recovery;
pub use self::recovery::{RecoveryAction, plan_recovery};

pub const QUEUED_LABEL: &str = "Queued…";
pub const TIMEOUT_REASON: &str = "timed out waiting for job";

pub fn status_label(status: JobStatus, media: MediaKind) -> String {
    match status {
        JobStatus::Queued => QUEUED_LABEL.to_string(),
        JobStatus::Running => generating_label(media),
        JobStatus::Succeeded => "Done".to_string(),
        JobStatus::Failed => failure_label("job failed"),
    }
}

pub fn generating_label(media: MediaKind) -> String {
    format!("Generating {}…", media.label())
}

pub fn failure_label(reason: &str) -> String {
    format!("Failed: {}", reason.trim())
}

/// Payloads for a finished job's outputs, keyed by `(job, order)`.
pub fn job_payloads(kind: JobKind, job_id: &JobId, outputs: &[MediaOutput]) -> Vec<MediaPayload> {
    outputs
        .iter()
        .map(|o| MediaPayload {
            media: kind.media(),
            job_id: Some(job_id.clone()),
            ordinal: o.order,
            asset_id: o.asset_id.clone(),
            url: o.url.clone(),
            width: o.width,
            height: o.height,
            mime_type: o.mime_type.clone(),
        })
        .collect()
}

#[derive(Debug)]
struct PollEntry {
    kind: JobKind,
    abort: Option<AbortHandle>,
}

/// Poll tasks currently running, keyed by `(scene, job)`. At most one poll
/// task exists per key.
#[derive(Debug, Default)]
pub struct JobRegistry {
    inflight: HashMap<(SceneId, JobId), PollEntry>,
}

impl JobRegistry {
    /// Reserves the key; false when a poll for it is already running.
    pub fn try_claim(&mut self, scene: &SceneId, job: &JobId, kind: JobKind) -> bool {
        let key = (scene.clone(), job.clone());
        if self.inflight.contains_key(&key) {
            return false;
        }
        self.inflight.insert(key, PollEntry { kind, abort: None });
        true
    }

    /// Records the spawned task so it can be cancelled. Ignored when the task
    /// already finished and released its key.
    pub fn attach(&mut self, scene: &SceneId, job: &JobId, abort: AbortHandle) {
        if let Some(entry) = self.inflight.get_mut(&(scene.clone(), job.clone())) {
            entry.abort = Some(abort);
        }
    }

    pub fn release(&mut self, scene: &SceneId, job: &JobId) {
        self.inflight.remove(&(scene.clone(), job.clone()));
    }

    pub fn is_polling(&self, scene: &SceneId, job: &JobId) -> bool {
        self.inflight.contains_key(&(scene.clone(), job.clone()))
    }

    pub fn polling_count(&self) -> usize {
        self.inflight.len()
    }

    pub fn jobs_for(&self, scene: &SceneId) -> Vec<(JobKind, JobId)> {
        let mut out: Vec<(JobKind, JobId)> = self
            .inflight
            .iter()
            .filter(|((s, _), _)| s == scene)
            .map(|((_, j), e)| (e.kind, j.clone()))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1));
        out
    }

    /// Aborts every poll task for `scene`; returns how many were stopped.
    pub fn cancel_scene(&mut self, scene: &SceneId) -> usize {
        let keys: Vec<(SceneId, JobId)> = self
            .inflight
            .keys()
            .filter(|(s, _)| s == scene)
            .cloned()
            .collect();
        for key in &keys {
            if let Some(entry) = self.inflight.remove(key)
                && let Some(abort) = entry.abort
            {
                abort.abort();
            }
        }
        keys.len()
    }

    pub fn cancel_all(&mut self) {
        for (_, entry) in self.inflight.drain() {
            if let Some(abort) = entry.abort {
                abort.abort();
            }
        }
    }
}

/// Status shown for one selection (the element set a direct action was run
/// on): how many of its jobs are outstanding and the latest status text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionStatus {
    pub pending: u32,
    pub label: Option<String>,
}

#[derive(Debug, Default)]
pub struct SelectionTracker {
    entries: HashMap<String, SelectionStatus>,
}

impl SelectionTracker {
    pub fn begin(&mut self, key: &str) -> SelectionStatus {
        let entry = self.entries.entry(key.to_string()).or_default();
        entry.pending += 1;
        entry.label = Some(QUEUED_LABEL.to_string());
        entry.clone()
    }

    pub fn set_label(&mut self, key: &str, label: &str) -> Option<SelectionStatus> {
        let entry = self.entries.get_mut(key)?;
        entry.label = Some(label.to_string());
        Some(entry.clone())
    }

    /// One job for `key` reached a terminal state.
    pub fn finish(&mut self, key: &str, label: Option<&str>) -> Option<SelectionStatus> {
        let entry = self.entries.get_mut(key)?;
        entry.pending = entry.pending.saturating_sub(1);
        entry.label = label.map(str::to_string);
        Some(entry.clone())
    }

    pub fn status(&self, key: &str) -> SelectionStatus {
        self.entries.get(key).cloned().unwrap_or_default()
    }
}

/// Stable key for a set of selected element ids, independent of order.
pub fn selection_key(element_ids: &[String]) -> String {
    let mut ids: Vec<&str> = element_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.join(",")
}

#[cfg(test)]
#[path = "tests/jobs_tests.rs"]
mod tests;
