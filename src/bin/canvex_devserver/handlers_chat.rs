use std::convert::Infallible;

use axum::body::Body;
use serde_json::{Value, json};

use canvex::model::{ChatMessage, ChatRole, now_rfc3339, random_id};

use super::*;

const DELTA_CHUNK: usize = 24;
const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, serde::Deserialize)]
pub(super) struct ChatRequest {
    content: String,
}

/// Scripted assistant turn. Mentions of "video" or "draw"/"image" produce
/// the matching tool result; "silent" makes the stream end without an
/// answer; "garbled" slips a malformed frame into the stream.
struct ScriptedTurn {
    intent: Option<&'static str>,
    tool: Option<(&'static str, Value)>,
    text: String,
    silent: bool,
    garbled: bool,
}

fn script(scene: &str, content: &str) -> ScriptedTurn {
    let lower = content.to_lowercase();
    let (intent, tool) = if lower.contains("video") {
        let task = random_id();
        (
            Some("video"),
            Some((
                "videotool",
                json!({
                    "task_id": task,
                    "status": "SUCCEEDED",
                    "url": format!("https://assets.invalid/{}.mp4", task),
                    "thumbnail_url": format!("https://assets.invalid/{}.jpg", task),
                    "scene_id": scene,
                }),
            )),
        )
    } else if lower.contains("draw") || lower.contains("image") {
        let asset = random_id();
        (
            Some("image"),
            Some((
                "imagetool",
                json!({
                    "asset_id": asset,
                    "scene_id": scene,
                    "url": format!("https://assets.invalid/{}.png", asset),
                    "width": 512,
                    "height": 512,
                    "mime_type": "image/png",
                }),
            )),
        )
    } else {
        (None, None)
    };
    let text = if tool.is_some() {
        "Here you go".to_string()
    } else {
        format!("You said: {}", content.trim())
    };
    ScriptedTurn {
        intent,
        tool,
        text,
        silent: lower.contains("silent"),
        garbled: lower.contains("garbled"),
    }
}

pub(super) async fn chat_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    if !state.scenes.read().await.contains_key(&id) {
        return not_found();
    }
    let limit = q
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_HISTORY_LIMIT);
    let messages = state.messages.read().await;
    let log = messages.get(&id).map(Vec::as_slice).unwrap_or_default();
    let start = log.len().saturating_sub(limit);
    Json(log[start..].to_vec()).into_response()
}

pub(super) async fn post_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<HashMap<String, String>>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    if !state.scenes.read().await.contains_key(&id) {
        return not_found();
    }
    if payload.content.trim().is_empty() {
        return bad_request("content is required");
    }
    let streaming = q.get("stream").is_some_and(|v| v == "1" || v == "true");

    let user = message(ChatRole::User, &payload.content);
    let turn = script(&id, &payload.content);
    let reply = message(ChatRole::Assistant, &turn.text);
    {
        let mut messages = state.messages.write().await;
        let log = messages.entry(id.clone()).or_default();
        log.push(user);
        log.push(reply.clone());
    }

    if streaming {
        return stream_reply(&id, turn, reply);
    }

    let tool_results: Vec<Value> = turn
        .tool
        .iter()
        .map(|(tool, result)| json!({"tool": tool, "result": result}))
        .collect();
    let mut body = json!(reply);
    body["scene"] = json!(id);
    body["tool_results"] = json!(tool_results);
    Json(body).into_response()
}

fn stream_reply(scene: &str, turn: ScriptedTurn, reply: ChatMessage) -> Response {
    let mut frames: Vec<String> = vec![":\n\n".to_string()];
    if !turn.silent {
        if let Some(intent) = turn.intent {
            frames.push(frame(&json!({"intent": intent})));
        }
        if turn.garbled {
            frames.push("data: {\"delta\": \n\n".to_string());
        }
        if let Some((tool, result)) = &turn.tool {
            frames.push(frame(&json!({
                "tool": tool,
                "result": result,
                "tool-result": {"tool": tool, "result": result},
            })));
        }
        let chars: Vec<char> = turn.text.chars().collect();
        for chunk in chars.chunks(DELTA_CHUNK) {
            let piece: String = chunk.iter().collect();
            frames.push(frame(&json!({"delta": piece})));
        }
        let mut done = json!(reply);
        done["scene"] = json!(scene);
        frames.push(frame(&json!({"done": true, "message": done})));
    }

    let body = Body::from_stream(futures_util::stream::iter(
        frames.into_iter().map(Ok::<_, Infallible>),
    ));
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

fn frame(payload: &Value) -> String {
    format!("data: {}\n\n", payload)
}

fn message(role: ChatRole, content: &str) -> ChatMessage {
    ChatMessage {
        id: random_id(),
        role,
        content: content.to_string(),
        created_at: now_rfc3339(),
    }
}
