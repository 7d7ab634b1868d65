//! HTTP route registration for the development server.

use axum::routing::get;

use super::*;

/// Mount point of the API, matching the production deployment.
pub(super) const API_PREFIX: &str = "/api/excalidraw";

pub(super) fn app_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/scenes/", get(list_scenes).post(create_scene))
        .route(
            "/scenes/:id/",
            get(get_scene).patch(update_scene).delete(delete_scene),
        )
        .route("/scenes/:id/chat/", get(chat_history).post(post_chat))
        .route("/scenes/:id/image-edit/", axum::routing::post(submit_image_edit))
        .route("/scenes/:id/video/", axum::routing::post(submit_video))
        .route("/scenes/:id/image-edit-jobs/", get(image_job_history))
        .route("/scenes/:id/video-jobs/", get(video_job_history))
        .route("/image-edit-jobs/:job_id/", get(image_job_status))
        .route("/video-jobs/:job_id/", get(video_job_status))
        .layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/healthz", get(super::healthz))
        .nest(API_PREFIX, api)
        .with_state(state)
}
