use super::media_jobs::listed_video;
use super::*;
use crate::jobs::{RecoveryAction, failure_label, job_payloads, plan_recovery};
use crate::model::JobKind;
use crate::remote::JobSummary;

impl Workspace {
    /// Reconciles the scene's job history with its document. Runs at most
    /// once per activation; later calls in the same activation are no-ops.
    pub(super) async fn recover(&self, id: &SceneId, activation: u64) {
        let key = SceneKey::Scene(id.clone());
        let first = self
            .with_slot(&key, |slot| {
                if slot.recovered_in == Some(activation) {
                    return false;
                }
                slot.recovered_in = Some(activation);
                true
            })
            .unwrap_or(false);
        if !first {
            return;
        }

        let mut history: Vec<(JobKind, JobSummary)> = Vec::new();
        for kind in [JobKind::ImageEdit, JobKind::Video] {
            match self.inner.remote.job_history(kind, id).await {
                Ok(jobs) => history.extend(jobs.into_iter().map(|job| (kind, job))),
                Err(err) => {
                    tracing::warn!(scene = %id, ?kind, error = %format!("{:#}", err), "job history unavailable");
                }
            }
        }
        let Some(doc) = self.document(&key) else {
            return;
        };
        let actions = plan_recovery(&doc, &history);
        if actions.is_empty() {
            return;
        }
        tracing::info!(scene = %id, jobs = history.len(), actions = actions.len(), "recovering jobs");

        for action in actions {
            if let Err(err) = self.apply_recovery(id, action).await {
                tracing::warn!(scene = %id, error = %err, "recovery step skipped");
            }
        }
    }

    async fn apply_recovery(&self, id: &SceneId, action: RecoveryAction) -> Result<()> {
        let key = SceneKey::Scene(id.clone());
        match action {
            RecoveryAction::TagPlaceholder { group, job_id } => {
                self.edit_scene(&key, |board| board.tag_placeholder(&group, &job_id))?;
            }
            RecoveryAction::ResumePoll {
                kind,
                job_id,
                group,
            } => {
                self.poll(id, kind, &job_id, group);
            }
            RecoveryAction::WriteFailure { group, reason } => {
                let label = failure_label(&reason);
                self.edit_scene(&key, |board| board.update_placeholder_text(&group, &label))?;
            }
            RecoveryAction::InsertResult {
                kind,
                job_id,
                group,
                url,
            } => {
                let payloads = match (kind, url) {
                    (JobKind::Video, Some(url)) => vec![listed_video(&job_id, &url)],
                    _ => {
                        let snap = self.inner.remote.job_status(kind, &job_id).await?;
                        job_payloads(kind, &job_id, &snap.outputs)
                    }
                };
                if payloads.is_empty() {
                    tracing::warn!(scene = %id, job = %job_id, "finished job has no results");
                    return Ok(());
                }
                self.apply_results(id, group.as_deref(), &payloads);
            }
            RecoveryAction::RetirePlaceholder { group } => {
                self.edit_scene(&key, |board| board.retire_placeholder(&group))?;
            }
        }
        Ok(())
    }
}
