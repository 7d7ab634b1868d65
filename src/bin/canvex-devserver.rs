use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tokio::sync::RwLock;

#[path = "canvex_devserver/types.rs"]
mod types;
use self::types::*;
#[path = "canvex_devserver/http_error.rs"]
mod http_error;
use self::http_error::*;
#[path = "canvex_devserver/handlers_scenes.rs"]
mod handlers_scenes;
use self::handlers_scenes::*;
#[path = "canvex_devserver/handlers_chat.rs"]
mod handlers_chat;
use self::handlers_chat::*;
#[path = "canvex_devserver/handlers_jobs.rs"]
mod handlers_jobs;
use self::handlers_jobs::*;
#[path = "canvex_devserver/routes.rs"]
mod routes;
#[path = "canvex_devserver/runtime.rs"]
mod runtime;

#[tokio::main]
async fn main() {
    if let Err(err) = runtime::run().await {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn require_token(
    State(state): State<Arc<AppState>>,
    req: axum::extract::Request,
    next: Next,
) -> Response {
    let Some(expected) = state.token.as_deref() else {
        return next.run(req).await;
    };
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented != Some(expected) {
        return unauthorized();
    }
    next.run(req).await
}
