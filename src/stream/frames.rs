use serde_json::{Map, Value};

use crate::model::{ChatMessage, ChatRole, MediaKind, now_rfc3339, random_id};
use crate::remote::ToolInvocation;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not json")]
    Json(#[from] serde_json::Error),

    #[error("frame is not a json object")]
    NotAnObject,

    #[error("tool-result frame has no tool name")]
    MissingTool,
}

/// Final assistant message as carried by the stream. Only `content` is
/// required; the rest is filled in when the server omits it.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamMessage {
    pub id: Option<String>,
    pub role: Option<ChatRole>,
    pub content: String,
    pub created_at: Option<String>,
}

impl StreamMessage {
    pub fn into_chat_message(self, content: String) -> ChatMessage {
        ChatMessage {
            id: self.id.unwrap_or_else(random_id),
            role: self.role.unwrap_or(ChatRole::Assistant),
            content,
            created_at: self.created_at.unwrap_or_else(now_rfc3339),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StreamFrame {
    Intent(MediaKind),
    Delta(String),
    ToolResult(ToolInvocation),
    Message(StreamMessage),
    Error(String),
    /// Well-formed but carries nothing this client acts on.
    Ignored,
}

/// Classifies one frame payload. When a payload carries several keys the
/// first match in error, intent, tool-result, message, delta order wins.
pub fn parse_payload(raw: &str) -> Result<StreamFrame, FrameError> {
    let value: Value = serde_json::from_str(raw.trim())?;
    let Value::Object(obj) = value else {
        return Err(FrameError::NotAnObject);
    };

    if let Some(err) = obj.get("error").filter(|v| !v.is_null()) {
        let text = match err {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Ok(StreamFrame::Error(text));
    }

    if let Some(intent) = obj.get("intent").and_then(Value::as_str) {
        match intent {
            "image" => return Ok(StreamFrame::Intent(MediaKind::Image)),
            "video" => return Ok(StreamFrame::Intent(MediaKind::Video)),
            other => tracing::debug!(intent = other, "ignoring non-media intent"),
        }
    }

    if let Some(tool) = tool_payload(&obj)? {
        return Ok(StreamFrame::ToolResult(tool));
    }

    if let Some(msg) = obj.get("message") {
        return Ok(StreamFrame::Message(message(msg)));
    }

    if let Some(delta) = obj.get("delta").and_then(Value::as_str) {
        return Ok(StreamFrame::Delta(delta.to_string()));
    }

    Ok(StreamFrame::Ignored)
}

fn tool_payload(obj: &Map<String, Value>) -> Result<Option<ToolInvocation>, FrameError> {
    // Nested form first; some servers also mirror `tool`/`result` at the top level.
    let source = match obj.get("tool-result") {
        Some(Value::Object(inner)) => inner,
        Some(_) => return Err(FrameError::MissingTool),
        None if obj.contains_key("tool") && obj.contains_key("result") => obj,
        None => return Ok(None),
    };
    let tool = source
        .get("tool")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or(FrameError::MissingTool)?;
    Ok(Some(ToolInvocation {
        tool: tool.to_string(),
        result: source.get("result").cloned().unwrap_or(Value::Null),
    }))
}

fn message(raw: &Value) -> StreamMessage {
    let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
    match raw {
        Value::String(s) => StreamMessage {
            id: None,
            role: None,
            content: s.clone(),
            created_at: None,
        },
        _ => StreamMessage {
            id: raw.get("id").and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }),
            role: raw
                .get("role")
                .cloned()
                .and_then(|r| serde_json::from_value(r).ok()),
            content: text("content").unwrap_or_default(),
            created_at: text("created_at"),
        },
    }
}
