use serde_json::{Value, json};

use canvex::model::{now_rfc3339, random_id};

use super::*;

#[derive(Debug, serde::Deserialize)]
pub(super) struct CreateSceneRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, serde::Deserialize)]
pub(super) struct UpdateSceneRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

pub(super) async fn list_scenes(State(state): State<Arc<AppState>>) -> Response {
    let scenes = state.scenes.read().await;
    let mut out: Vec<&StoredScene> = scenes.values().collect();
    out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    let listed: Vec<Value> = out
        .into_iter()
        .map(|s| {
            json!({
                "id": s.id,
                "title": s.title,
                "created_at": s.created_at,
                "updated_at": s.updated_at,
            })
        })
        .collect();
    Json(listed).into_response()
}

pub(super) async fn create_scene(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSceneRequest>,
) -> Response {
    let now = now_rfc3339();
    let title = if payload.title.trim().is_empty() {
        "Untitled".to_string()
    } else {
        payload.title
    };
    let scene = StoredScene {
        id: random_id(),
        title,
        data: payload.data,
        created_at: now.clone(),
        updated_at: now,
    };
    state
        .scenes
        .write()
        .await
        .insert(scene.id.clone(), scene.clone());
    (StatusCode::CREATED, Json(scene)).into_response()
}

pub(super) async fn get_scene(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.scenes.read().await.get(&id) {
        Some(scene) => Json(scene.clone()).into_response(),
        None => not_found(),
    }
}

pub(super) async fn update_scene(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSceneRequest>,
) -> Response {
    let mut scenes = state.scenes.write().await;
    let Some(scene) = scenes.get_mut(&id) else {
        return not_found();
    };
    if let Some(title) = payload.title {
        scene.title = title;
    }
    if let Some(data) = payload.data {
        scene.data = data;
    }
    scene.updated_at = now_rfc3339();
    Json(scene.clone()).into_response()
}

pub(super) async fn delete_scene(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    if state.scenes.write().await.remove(&id).is_none() {
        return not_found();
    }
    state.messages.write().await.remove(&id);
    state.jobs.write().await.retain(|job| job.scene != id);
    StatusCode::NO_CONTENT.into_response()
}
