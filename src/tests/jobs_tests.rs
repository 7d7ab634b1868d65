use super::*;
use crate::model::{Element, ElementKind, ElementRole, PinLayout, Rect, SceneData};
use crate::pins::{PinBook, Pinboard, Placement};
use crate::remote::JobSummary;

fn scene(id: &str) -> SceneId {
    SceneId(id.to_string())
}

fn job(id: &str) -> JobId {
    JobId(id.to_string())
}

fn summary(id: &str, status: JobStatus, created_at: &str) -> JobSummary {
    JobSummary {
        id: job(id),
        status,
        error: None,
        num_images: None,
        result_url: None,
        thumbnail_url: None,
        created_at: Some(created_at.to_string()),
        updated_at: None,
    }
}

/// Adds placeholders in order and returns their groups.
fn with_placeholders(doc: &mut SceneData, specs: &[(MediaKind, Option<&str>)]) -> Vec<String> {
    let mut book = PinBook::default();
    let layout = PinLayout::default();
    let mut board = Pinboard::new(doc, &mut book, &layout);
    specs
        .iter()
        .map(|(media, tag)| {
            board
                .create_placeholder("Queued", *media, tag.map(job), Placement::Anchored)
                .group
        })
        .collect()
}

#[test]
fn registry_claims_each_job_once() {
    let mut reg = JobRegistry::default();
    let (s, j) = (scene("s1"), job("j1"));
    assert!(reg.try_claim(&s, &j, JobKind::Video));
    assert!(!reg.try_claim(&s, &j, JobKind::Video));
    assert!(reg.try_claim(&scene("s2"), &j, JobKind::Video));
    assert_eq!(reg.polling_count(), 2);
    assert!(reg.is_polling(&s, &j));

    reg.release(&s, &j);
    assert!(!reg.is_polling(&s, &j));
    assert!(reg.try_claim(&s, &j, JobKind::Video));
}

#[test]
fn jobs_for_lists_one_scene_sorted() {
    let mut reg = JobRegistry::default();
    let s = scene("s1");
    reg.try_claim(&s, &job("b"), JobKind::Video);
    reg.try_claim(&s, &job("a"), JobKind::ImageEdit);
    reg.try_claim(&scene("s2"), &job("c"), JobKind::Video);
    assert_eq!(
        reg.jobs_for(&s),
        vec![(JobKind::ImageEdit, job("a")), (JobKind::Video, job("b"))]
    );
}

#[tokio::test]
async fn cancel_scene_aborts_only_that_scene() {
    let mut reg = JobRegistry::default();
    let (s1, s2) = (scene("s1"), scene("s2"));
    let forever = || tokio::spawn(std::future::pending::<()>());

    reg.try_claim(&s1, &job("a"), JobKind::Video);
    let a = forever();
    reg.attach(&s1, &job("a"), a.abort_handle());
    reg.try_claim(&s2, &job("b"), JobKind::Video);
    let b = forever();
    reg.attach(&s2, &job("b"), b.abort_handle());

    assert_eq!(reg.cancel_scene(&s1), 1);
    assert!(a.await.expect_err("aborted").is_cancelled());
    assert!(reg.is_polling(&s2, &job("b")));
    assert!(!b.is_finished());

    reg.cancel_all();
    assert_eq!(reg.polling_count(), 0);
    assert!(b.await.expect_err("aborted").is_cancelled());
}

#[test]
fn attach_after_release_is_ignored() {
    let mut reg = JobRegistry::default();
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let handle = rt.spawn(async {});
    reg.attach(&scene("s"), &job("j"), handle.abort_handle());
    assert_eq!(reg.polling_count(), 0);
}

#[test]
fn selection_tracker_counts_outstanding_jobs() {
    let mut t = SelectionTracker::default();
    let key = selection_key(&["b".to_string(), "a".to_string()]);
    assert_eq!(t.begin(&key).pending, 1);
    assert_eq!(t.begin(&key).pending, 2);
    assert_eq!(
        t.set_label(&key, "Generating image…").and_then(|s| s.label),
        Some("Generating image…".to_string())
    );

    let after = t.finish(&key, None).expect("known selection");
    assert_eq!(after, SelectionStatus { pending: 1, label: None });
    t.finish(&key, Some("Failed: boom"));
    t.finish(&key, None);
    assert_eq!(t.status(&key).pending, 0);

    assert!(t.finish("unknown", None).is_none());
    assert_eq!(t.status("unknown"), SelectionStatus::default());
}

#[test]
fn selection_key_ignores_order_and_duplicates() {
    let a = selection_key(&["x".to_string(), "y".to_string(), "x".to_string()]);
    let b = selection_key(&["y".to_string(), "x".to_string()]);
    assert_eq!(a, b);
    assert_eq!(a, "x,y");
}

#[test]
fn labels_follow_status() {
    assert_eq!(status_label(JobStatus::Queued, MediaKind::Image), QUEUED_LABEL);
    assert_eq!(
        status_label(JobStatus::Running, MediaKind::Video),
        "Generating video…"
    );
    assert_eq!(failure_label("  boom "), "Failed: boom");
}

#[test]
fn payloads_carry_job_and_order() {
    let outputs = vec![
        MediaOutput {
            order: 0,
            asset_id: Some("a0".to_string()),
            url: "https://x/0.png".to_string(),
            width: Some(512.0),
            height: Some(512.0),
            mime_type: None,
            thumbnail_url: None,
        },
        MediaOutput {
            order: 1,
            asset_id: None,
            url: "https://x/1.png".to_string(),
            width: None,
            height: None,
            mime_type: None,
            thumbnail_url: None,
        },
    ];
    let payloads = job_payloads(JobKind::ImageEdit, &job("j"), &outputs);
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[1].ordinal, 1);
    assert_eq!(payloads[1].job_id, Some(job("j")));
    assert_eq!(payloads[0].media, MediaKind::Image);
}

#[test]
fn tagged_placeholder_resumes_its_job() {
    let mut doc = SceneData::default();
    let groups = with_placeholders(&mut doc, &[(MediaKind::Video, Some("v1"))]);
    let history = vec![(
        JobKind::Video,
        summary("v1", JobStatus::Running, "2026-01-01T00:00:00Z"),
    )];
    assert_eq!(
        plan_recovery(&doc, &history),
        vec![RecoveryAction::ResumePoll {
            kind: JobKind::Video,
            job_id: job("v1"),
            group: Some(groups[0].clone()),
        }]
    );
}

#[test]
fn orphans_pair_with_jobs_by_creation_order() {
    let mut doc = SceneData::default();
    let groups = with_placeholders(
        &mut doc,
        &[(MediaKind::Image, None), (MediaKind::Image, None)],
    );
    // Listed newest first; pairing must still follow creation time.
    let history = vec![
        (
            JobKind::ImageEdit,
            summary("late", JobStatus::Queued, "2026-01-01T00:00:05Z"),
        ),
        (
            JobKind::ImageEdit,
            summary("early", JobStatus::Queued, "2026-01-01T00:00:01Z"),
        ),
    ];
    let actions = plan_recovery(&doc, &history);
    assert_eq!(
        actions,
        vec![
            RecoveryAction::TagPlaceholder {
                group: groups[0].clone(),
                job_id: job("early"),
            },
            RecoveryAction::ResumePoll {
                kind: JobKind::ImageEdit,
                job_id: job("early"),
                group: Some(groups[0].clone()),
            },
            RecoveryAction::TagPlaceholder {
                group: groups[1].clone(),
                job_id: job("late"),
            },
            RecoveryAction::ResumePoll {
                kind: JobKind::ImageEdit,
                job_id: job("late"),
                group: Some(groups[1].clone()),
            },
        ]
    );
}

#[test]
fn undated_jobs_pair_after_dated_ones() {
    let mut doc = SceneData::default();
    let groups = with_placeholders(
        &mut doc,
        &[(MediaKind::Image, None), (MediaKind::Image, None)],
    );
    let undated = JobSummary {
        created_at: None,
        ..summary("undated", JobStatus::Queued, "")
    };
    let history = vec![
        (JobKind::ImageEdit, undated),
        (
            JobKind::ImageEdit,
            summary("dated", JobStatus::Queued, "2026-01-01T00:00:01Z"),
        ),
    ];
    let tags: Vec<(String, JobId)> = plan_recovery(&doc, &history)
        .into_iter()
        .filter_map(|a| match a {
            RecoveryAction::TagPlaceholder { group, job_id } => Some((group, job_id)),
            _ => None,
        })
        .collect();
    assert_eq!(
        tags,
        vec![
            (groups[0].clone(), job("dated")),
            (groups[1].clone(), job("undated")),
        ]
    );
}

#[test]
fn job_rows_without_creation_time_still_parse() {
    let rows: Vec<JobSummary> = serde_json::from_value(serde_json::json!([
        {"id": "a", "status": "QUEUED", "created_at": null},
        {"id": "b", "status": "RUNNING"},
    ]))
    .expect("rows parse");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.created_at.is_none()));
}

#[test]
fn orphans_only_match_same_media() {
    let mut doc = SceneData::default();
    with_placeholders(&mut doc, &[(MediaKind::Image, None)]);
    let history = vec![(
        JobKind::Video,
        summary("v", JobStatus::Running, "2026-01-01T00:00:00Z"),
    )];
    assert_eq!(
        plan_recovery(&doc, &history),
        vec![RecoveryAction::ResumePoll {
            kind: JobKind::Video,
            job_id: job("v"),
            group: None,
        }]
    );
}

#[test]
fn reflected_job_retires_its_placeholder() {
    let mut doc = SceneData::default();
    let groups = with_placeholders(&mut doc, &[(MediaKind::Video, Some("v1"))]);
    let mut result = Element::new(
        ElementKind::Embeddable {
            link: "https://x/v1.mp4".to_string(),
        },
        Rect::new(0.0, 0.0, 384.0, 216.0),
    )
    .with_role(ElementRole::MediaResult {
        media: MediaKind::Video,
        job_id: None,
        ordinal: 0,
        asset_id: None,
        url: "https://x/v1.mp4".to_string(),
    });
    result.tombstone();
    doc.elements.push(result);

    let mut listed = summary("v1", JobStatus::Succeeded, "2026-01-01T00:00:00Z");
    listed.result_url = Some("https://x/v1.mp4".to_string());
    assert_eq!(
        plan_recovery(&doc, &[(JobKind::Video, listed)]),
        vec![RecoveryAction::RetirePlaceholder {
            group: groups[0].clone()
        }]
    );
}

#[test]
fn failed_job_writes_failure_into_placeholder() {
    let mut doc = SceneData::default();
    let groups = with_placeholders(&mut doc, &[(MediaKind::Image, Some("j1"))]);
    let mut failed = summary("j1", JobStatus::Failed, "2026-01-01T00:00:00Z");
    failed.error = Some("content policy".to_string());
    let bare = summary("j2", JobStatus::Failed, "2026-01-01T00:00:01Z");
    assert_eq!(
        plan_recovery(
            &doc,
            &[(JobKind::ImageEdit, failed), (JobKind::ImageEdit, bare)]
        ),
        vec![RecoveryAction::WriteFailure {
            group: groups[0].clone(),
            reason: "content policy".to_string(),
        }]
    );
}

#[test]
fn finished_video_carries_listed_url() {
    let doc = SceneData::default();
    let mut done = summary("v1", JobStatus::Succeeded, "2026-01-01T00:00:00Z");
    done.result_url = Some("https://x/v1.mp4".to_string());
    let image = summary("i1", JobStatus::Succeeded, "2026-01-01T00:00:01Z");
    assert_eq!(
        plan_recovery(
            &doc,
            &[(JobKind::Video, done), (JobKind::ImageEdit, image)]
        ),
        vec![
            RecoveryAction::InsertResult {
                kind: JobKind::Video,
                job_id: job("v1"),
                group: None,
                url: Some("https://x/v1.mp4".to_string()),
            },
            RecoveryAction::InsertResult {
                kind: JobKind::ImageEdit,
                job_id: job("i1"),
                group: None,
                url: None,
            },
        ]
    );
}
