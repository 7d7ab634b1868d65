use super::*;
use crate::jobs::{
    QUEUED_LABEL, TIMEOUT_REASON, failure_label, job_payloads, selection_key, status_label,
};
use crate::model::{JobKind, MediaKind, Rect};
use crate::pins::{MediaPayload, Placement};
use crate::remote::{ImageEditRequest, JobTicket, VideoRequest};

const EMPTY_RESULT_REASON: &str = "job finished without a result";

enum JobRequest<'a> {
    ImageEdit(&'a ImageEditRequest),
    Video(&'a VideoRequest),
}

impl JobRequest<'_> {
    fn kind(&self) -> JobKind {
        match self {
            JobRequest::ImageEdit(_) => JobKind::ImageEdit,
            JobRequest::Video(_) => JobKind::Video,
        }
    }
}

/// Where a poll task reports progress.
#[derive(Clone, Debug)]
struct PollTarget {
    scene: SceneId,
    kind: JobKind,
    job: JobId,
    group: Option<String>,
    selection: Option<String>,
}

impl Workspace {
    /// Starts an image edit of the selected elements. A placeholder is
    /// reserved beside `bounds` and filled once the job finishes.
    pub async fn submit_image_edit(
        &self,
        key: &SceneKey,
        req: &ImageEditRequest,
        selection: &[String],
        bounds: Rect,
    ) -> Result<JobId> {
        self.submit_job(key, JobRequest::ImageEdit(req), selection, bounds)
            .await
    }

    /// Starts a video generation from the selected elements.
    pub async fn submit_video(
        &self,
        key: &SceneKey,
        req: &VideoRequest,
        selection: &[String],
        bounds: Rect,
    ) -> Result<JobId> {
        self.submit_job(key, JobRequest::Video(req), selection, bounds)
            .await
    }

    async fn submit_job(
        &self,
        key: &SceneKey,
        req: JobRequest<'_>,
        selection: &[String],
        bounds: Rect,
    ) -> Result<JobId> {
        let id = self.ensure_remote_id(key).await?;
        let key = SceneKey::Scene(id.clone());
        let kind = req.kind();
        let media = kind.media();

        let ph = self.edit_scene(&key, |board| {
            board.create_placeholder(QUEUED_LABEL, media, None, Placement::Beside(bounds))
        })?;
        let sel = selection_key(selection);
        let status = self.with_state(|st| st.selections.begin(&sel));
        self.emit(SyncEvent::SelectionStatus {
            key: sel.clone(),
            status,
        });

        let submitted: anyhow::Result<JobTicket> = match req {
            JobRequest::ImageEdit(req) => self.inner.remote.submit_image_edit(&id, req).await,
            JobRequest::Video(req) => self.inner.remote.submit_video(&id, req).await,
        };
        let ticket = match submitted {
            Ok(ticket) => ticket,
            Err(err) => {
                let label = failure_label(&format!("{:#}", err));
                tracing::warn!(scene = %id, media = media.label(), error = %format!("{:#}", err), "job submission failed");
                self.edit_scene(&key, |board| board.update_placeholder_text(&ph.group, &label))?;
                self.finish_selection(&sel, Some(&label));
                return Err(err.into());
            }
        };

        tracing::info!(scene = %id, job = %ticket.job_id, media = media.label(), "job submitted");
        self.edit_scene(&key, |board| board.tag_placeholder(&ph.group, &ticket.job_id))?;
        self.emit(SyncEvent::JobStatus {
            scene: id.clone(),
            job_id: ticket.job_id.clone(),
            status: ticket.status,
            label: status_label(ticket.status, media),
        });
        self.spawn_poll(PollTarget {
            scene: id,
            kind,
            job: ticket.job_id.clone(),
            group: Some(ph.group),
            selection: Some(sel),
        });
        Ok(ticket.job_id)
    }

    /// Starts polling a job unless a poll for the same `(scene, job)` is
    /// already running. Returns false for the duplicate case.
    pub fn poll(&self, scene: &SceneId, kind: JobKind, job: &JobId, group: Option<String>) -> bool {
        self.spawn_poll(PollTarget {
            scene: scene.clone(),
            kind,
            job: job.clone(),
            group,
            selection: None,
        })
    }

    fn spawn_poll(&self, target: PollTarget) -> bool {
        let claimed = self.with_state(|st| st.jobs.try_claim(&target.scene, &target.job, target.kind));
        if !claimed {
            tracing::debug!(scene = %target.scene, job = %target.job, "already polling");
            return false;
        }
        let ws = self.clone();
        let (scene, job) = (target.scene.clone(), target.job.clone());
        let handle = tokio::spawn(async move {
            ws.poll_until_done(&target).await;
            ws.with_state(|st| st.jobs.release(&target.scene, &target.job));
        });
        self.with_state(|st| st.jobs.attach(&scene, &job, handle.abort_handle()));
        true
    }

    async fn poll_until_done(&self, target: &PollTarget) {
        let policy = self.inner.config.jobs.clone();
        let media = target.kind.media();
        let mut last: Option<JobStatus> = None;

        for attempt in 0..policy.max_poll_attempts {
            if attempt > 0 {
                tokio::time::sleep(policy.interval()).await;
            }
            let snap = match self.inner.remote.job_status(target.kind, &target.job).await {
                Ok(snap) => snap,
                Err(err) => {
                    tracing::warn!(job = %target.job, attempt, error = %format!("{:#}", err), "job status unavailable");
                    continue;
                }
            };
            tracing::debug!(job = %target.job, attempt, status = ?snap.status, "job polled");

            match snap.status {
                JobStatus::Queued | JobStatus::Running => {
                    if last != Some(snap.status) {
                        last = Some(snap.status);
                        self.report_progress(target, snap.status, &status_label(snap.status, media));
                    }
                }
                JobStatus::Succeeded => {
                    let payloads = job_payloads(target.kind, &target.job, &snap.outputs);
                    if payloads.is_empty() {
                        self.fail_job(target, EMPTY_RESULT_REASON);
                    } else {
                        self.complete_job(target, &payloads);
                    }
                    return;
                }
                JobStatus::Failed => {
                    let reason = snap
                        .error
                        .as_deref()
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or("job failed");
                    self.fail_job(target, reason);
                    return;
                }
            }
        }
        tracing::warn!(job = %target.job, attempts = policy.max_poll_attempts, "job poll timed out");
        self.fail_job(target, TIMEOUT_REASON);
    }

    fn report_progress(&self, target: &PollTarget, status: JobStatus, label: &str) {
        if let Some(group) = target.group.as_deref() {
            let key = SceneKey::Scene(target.scene.clone());
            if let Err(err) = self.edit_scene(&key, |board| board.update_placeholder_text(group, label)) {
                tracing::warn!(scene = %target.scene, error = %err, "placeholder not updated");
            }
        }
        if let Some(sel) = target.selection.as_deref()
            && let Some(status) = self.with_state(|st| st.selections.set_label(sel, label))
        {
            self.emit(SyncEvent::SelectionStatus {
                key: sel.to_string(),
                status,
            });
        }
        self.emit(SyncEvent::JobStatus {
            scene: target.scene.clone(),
            job_id: target.job.clone(),
            status,
            label: label.to_string(),
        });
    }

    fn complete_job(&self, target: &PollTarget, payloads: &[MediaPayload]) {
        self.apply_results(&target.scene, target.group.as_deref(), payloads);
        let label = status_label(JobStatus::Succeeded, target.kind.media());
        if let Some(sel) = target.selection.as_deref() {
            self.finish_selection(sel, None);
        }
        tracing::info!(scene = %target.scene, job = %target.job, results = payloads.len(), "job finished");
        self.emit(SyncEvent::JobStatus {
            scene: target.scene.clone(),
            job_id: target.job.clone(),
            status: JobStatus::Succeeded,
            label,
        });
    }

    fn fail_job(&self, target: &PollTarget, reason: &str) {
        let label = failure_label(reason);
        tracing::warn!(scene = %target.scene, job = %target.job, reason, "job failed");
        if let Some(group) = target.group.as_deref() {
            let key = SceneKey::Scene(target.scene.clone());
            if let Err(err) = self.edit_scene(&key, |board| board.update_placeholder_text(group, &label)) {
                tracing::warn!(scene = %target.scene, error = %err, "placeholder not updated");
            }
        }
        if let Some(sel) = target.selection.as_deref() {
            self.finish_selection(sel, Some(&label));
        }
        self.emit(SyncEvent::JobStatus {
            scene: target.scene.clone(),
            job_id: target.job.clone(),
            status: JobStatus::Failed,
            label,
        });
    }

    /// Places a job's results on its scene, whether or not that scene is the
    /// active one.
    pub(super) fn apply_results(&self, scene: &SceneId, group: Option<&str>, payloads: &[MediaPayload]) {
        let key = SceneKey::Scene(scene.clone());
        let applied = self.edit_scene(&key, |board| match group {
            Some(group) => board.resolve_placeholder(group, payloads),
            None => board.insert_results(Placement::Anchored, payloads),
        });
        match applied {
            Ok(outcome) => tracing::debug!(scene = %scene, ?outcome, "job results applied"),
            Err(err) => tracing::warn!(scene = %scene, error = %err, "job results not applied"),
        }
    }

    fn finish_selection(&self, sel: &str, label: Option<&str>) {
        if let Some(status) = self.with_state(|st| st.selections.finish(sel, label)) {
            self.emit(SyncEvent::SelectionStatus {
                key: sel.to_string(),
                status,
            });
        }
    }
}

/// A finished video as listed in the job history, before its detail is
/// fetched.
pub(super) fn listed_video(job: &JobId, url: &str) -> MediaPayload {
    MediaPayload {
        media: MediaKind::Video,
        job_id: Some(job.clone()),
        ordinal: 0,
        asset_id: None,
        url: url.to_string(),
        width: None,
        height: None,
        mime_type: None,
    }
}
