use std::collections::{HashMap, VecDeque};

use super::*;
use crate::model::{ElementRole, SceneData, parse_timestamp};
use crate::pins::placeholders;
use crate::remote::JobSummary;

#[derive(Clone, Debug, PartialEq)]
pub enum RecoveryAction {
    /// Bind an untagged placeholder to the job it was matched with.
    TagPlaceholder { group: String, job_id: JobId },
    ResumePoll {
        kind: JobKind,
        job_id: JobId,
        group: Option<String>,
    },
    WriteFailure { group: String, reason: String },
    /// Fetch the job's outputs and insert them. `url` is set when the job
    /// listing already carried the result.
    InsertResult {
        kind: JobKind,
        job_id: JobId,
        group: Option<String>,
        url: Option<String>,
    },
    /// The job's result is already on the document; drop the stale placeholder.
    RetirePlaceholder { group: String },
}

/// Reconciles a scene's job history with the placeholders on its document.
///
/// Jobs are matched to placeholders by job-id tag first. Untagged placeholders
/// are then paired with unreflected jobs of the same media kind, placeholders
/// in document order against jobs in creation order.
pub fn plan_recovery(doc: &SceneData, history: &[(JobKind, JobSummary)]) -> Vec<RecoveryAction> {
    let live = placeholders(doc);
    let mut tagged: HashMap<&JobId, &str> = HashMap::new();
    let mut orphans: HashMap<MediaKind, VecDeque<&str>> = HashMap::new();
    for ph in &live {
        match ph.job_id.as_ref() {
            Some(job) => {
                tagged.insert(job, ph.group.as_str());
            }
            None => orphans
                .entry(ph.media)
                .or_default()
                .push_back(ph.group.as_str()),
        }
    }

    let mut jobs: Vec<&(JobKind, JobSummary)> = history.iter().collect();
    // Undated jobs go last, in listing order.
    jobs.sort_by_key(|(_, j)| {
        match j.created_at.as_deref().and_then(parse_timestamp) {
            Some(t) => (false, t.unix_timestamp_nanos()),
            None => (true, 0),
        }
    });

    let mut actions = Vec::new();
    for (kind, job) in jobs {
        let reflected = is_reflected(doc, job);
        let mut group = tagged.get(&job.id).map(|g| g.to_string());

        if group.is_none() && !reflected {
            group = orphans
                .get_mut(&kind.media())
                .and_then(VecDeque::pop_front)
                .map(str::to_string);
            if let Some(g) = group.as_ref() {
                actions.push(RecoveryAction::TagPlaceholder {
                    group: g.clone(),
                    job_id: job.id.clone(),
                });
            }
        }

        match job.status {
            JobStatus::Queued | JobStatus::Running if !reflected => {
                actions.push(RecoveryAction::ResumePoll {
                    kind: *kind,
                    job_id: job.id.clone(),
                    group,
                });
            }
            JobStatus::Failed => {
                if let Some(group) = group {
                    let reason = job
                        .error
                        .as_deref()
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or("job failed");
                    actions.push(RecoveryAction::WriteFailure {
                        group,
                        reason: reason.to_string(),
                    });
                }
            }
            JobStatus::Succeeded if !reflected => {
                actions.push(RecoveryAction::InsertResult {
                    kind: *kind,
                    job_id: job.id.clone(),
                    group,
                    url: job.result_url.clone().filter(|u| !u.trim().is_empty()),
                });
            }
            _ => {
                if let Some(group) = group {
                    actions.push(RecoveryAction::RetirePlaceholder { group });
                }
            }
        }
    }
    actions
}

// Tombstoned results count: a result the user deleted is still "reflected".
fn is_reflected(doc: &SceneData, job: &JobSummary) -> bool {
    let url = job.result_url.as_deref().filter(|u| !u.is_empty());
    doc.elements.iter().any(|el| match el.role.as_ref() {
        Some(ElementRole::MediaResult {
            job_id, url: el_url, ..
        }) => job_id.as_ref() == Some(&job.id) || url == Some(el_url.as_str()),
        _ => false,
    })
}
