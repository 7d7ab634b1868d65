use axum::extract::Multipart;
use serde_json::{Value, json};

use canvex::model::JobKind;

use super::*;

const DEFAULT_JOB_LIMIT: usize = 50;

#[derive(Debug, serde::Deserialize)]
pub(super) struct VideoRequest {
    #[serde(default)]
    prompt: String,
}

pub(super) async fn submit_image_edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut form: Multipart,
) -> Response {
    if !state.scenes.read().await.contains_key(&id) {
        return not_found();
    }

    let mut has_image = false;
    let mut prompt = String::new();
    let mut cutout = false;
    let mut count = 1u32;
    loop {
        let field = match form.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return bad_request(&format!("invalid multipart body: {}", err)),
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => match field.bytes().await {
                Ok(bytes) => has_image = !bytes.is_empty(),
                Err(err) => return bad_request(&format!("read image: {}", err)),
            },
            "prompt" | "cutout" | "n" | "size" => {
                let Ok(text) = field.text().await else {
                    return bad_request("unreadable form field");
                };
                match name.as_str() {
                    "prompt" => prompt = text,
                    "cutout" => cutout = matches!(text.as_str(), "true" | "1"),
                    "n" => count = text.parse().unwrap_or(0),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    if !has_image {
        return bad_request("image is required");
    }
    if prompt.trim().is_empty() && !cutout {
        return bad_request("prompt or cutout is required");
    }
    if ![1, 2, 4].contains(&count) {
        return bad_request("n must be 1, 2 or 4");
    }
    enqueue(&state, &id, JobKind::ImageEdit, &prompt, count).await
}

pub(super) async fn submit_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<VideoRequest>,
) -> Response {
    if !state.scenes.read().await.contains_key(&id) {
        return not_found();
    }
    if payload.prompt.trim().is_empty() {
        return bad_request("prompt is required");
    }
    enqueue(&state, &id, JobKind::Video, &payload.prompt, 1).await
}

async fn enqueue(state: &AppState, scene: &str, kind: JobKind, prompt: &str, count: u32) -> Response {
    let job = StoredJob::new(scene, kind, prompt, count);
    let body = json!({"job_id": job.id, "status": job.status});
    state.jobs.write().await.push(job);
    (StatusCode::ACCEPTED, Json(body)).into_response()
}

/// Each observation moves the job one step along its scripted lifecycle.
pub(super) async fn image_job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    observe(&state, JobKind::ImageEdit, &job_id).await
}

pub(super) async fn video_job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    observe(&state, JobKind::Video, &job_id).await
}

async fn observe(state: &AppState, kind: JobKind, job_id: &str) -> Response {
    let mut jobs = state.jobs.write().await;
    let Some(job) = jobs.iter_mut().find(|j| j.id == job_id && j.kind == kind) else {
        return not_found();
    };
    let body = job.detail();
    job.advance();
    Json(body).into_response()
}

pub(super) async fn image_job_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    history(&state, JobKind::ImageEdit, &id, &q).await
}

pub(super) async fn video_job_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    history(&state, JobKind::Video, &id, &q).await
}

async fn history(
    state: &AppState,
    kind: JobKind,
    scene: &str,
    q: &HashMap<String, String>,
) -> Response {
    if !state.scenes.read().await.contains_key(scene) {
        return not_found();
    }
    let limit = q
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_JOB_LIMIT);
    let jobs = state.jobs.read().await;
    let mut listed: Vec<Value> = jobs
        .iter()
        .rev()
        .filter(|j| j.scene == scene && j.kind == kind)
        .take(limit)
        .map(StoredJob::summary)
        .collect();
    listed.reverse();
    Json(listed).into_response()
}
