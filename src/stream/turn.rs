use std::collections::HashSet;

use serde_json::Value;

use super::frames::{StreamFrame, StreamMessage};
use crate::model::MediaKind;
use crate::pins::MediaPayload;
use crate::remote::ToolInvocation;

/// What a finished tool invocation means for the document.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    Media(MediaPayload),
    Failed { media: MediaKind, reason: String },
}

/// Interprets an `imagetool`/`videotool` result. Unknown tools yield `None`.
pub fn tool_outcome(tool: &ToolInvocation) -> Option<ToolOutcome> {
    let media = match tool.tool.as_str() {
        "imagetool" => MediaKind::Image,
        "videotool" => MediaKind::Video,
        other => {
            tracing::debug!(tool = other, "ignoring unknown tool result");
            return None;
        }
    };
    let result = &tool.result;
    let text = |key: &str| {
        result
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    if let Some(reason) = text("error") {
        return Some(ToolOutcome::Failed { media, reason });
    }
    let Some(url) = text("url") else {
        return Some(ToolOutcome::Failed {
            media,
            reason: format!("{} result has no url", media.label()),
        });
    };
    Some(ToolOutcome::Media(MediaPayload {
        media,
        job_id: None,
        ordinal: 0,
        asset_id: text("asset_id"),
        url,
        width: result.get("width").and_then(Value::as_f64),
        height: result.get("height").and_then(Value::as_f64),
        mime_type: text("mime_type"),
    }))
}

/// Assistant text that is itself a machine-directed payload (a tool call)
/// rather than prose. Text that opens with a brace but does not parse
/// yet is treated as such while it streams in.
pub fn looks_like_tool_payload(text: &str) -> bool {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json").or_else(|| body.strip_prefix("```")) {
        body = rest.trim().trim_end_matches("```").trim();
    }
    if !body.starts_with('{') {
        return false;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(obj)) => ["tool", "tool_calls", "function", "arguments", "action", "intent"]
            .iter()
            .any(|k| obj.contains_key(*k)),
        Ok(_) => false,
        Err(_) => true,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TurnEffect {
    /// Reserve space for a result announced by an intent frame.
    ReservePlaceholder(MediaKind),
    /// Show `text` as the turn's single pinned note (replace, not append).
    ShowText(String),
    /// Drop the turn's pinned note; the text turned out not to be prose.
    HideText,
    Tool(ToolOutcome),
}

#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// The turn produced an answer. `text` is the authoritative message
    /// content, falling back to the accumulated deltas.
    Complete {
        message: Option<StreamMessage>,
        text: String,
    },
    /// Neither a message nor any text arrived.
    NeedsFallback,
    Aborted(String),
}

/// Folds the frames of one chat turn. Pure: the caller applies the effects.
#[derive(Debug, Default)]
pub struct TurnReducer {
    intents: HashSet<MediaKind>,
    text: String,
    shown: bool,
    message: Option<StreamMessage>,
    aborted: Option<String>,
}

impl TurnReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn apply(&mut self, frame: StreamFrame) -> Vec<TurnEffect> {
        if self.aborted.is_some() {
            return Vec::new();
        }
        match frame {
            StreamFrame::Intent(media) => {
                if self.intents.insert(media) {
                    vec![TurnEffect::ReservePlaceholder(media)]
                } else {
                    Vec::new()
                }
            }
            StreamFrame::Delta(piece) => {
                self.text.push_str(&piece);
                if self.message.is_some() {
                    return Vec::new();
                }
                let text = self.text.clone();
                self.show(text)
            }
            StreamFrame::ToolResult(tool) => tool_outcome(&tool)
                .map(TurnEffect::Tool)
                .into_iter()
                .collect(),
            StreamFrame::Message(msg) => {
                let content = msg.content.clone();
                self.message = Some(msg);
                if content.trim().is_empty() {
                    // Keep whatever the deltas built up.
                    return Vec::new();
                }
                self.show(content)
            }
            StreamFrame::Error(reason) => {
                self.aborted = Some(reason);
                Vec::new()
            }
            StreamFrame::Ignored => Vec::new(),
        }
    }

    fn show(&mut self, text: String) -> Vec<TurnEffect> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if looks_like_tool_payload(&text) {
            if self.shown {
                self.shown = false;
                return vec![TurnEffect::HideText];
            }
            return Vec::new();
        }
        self.shown = true;
        vec![TurnEffect::ShowText(text)]
    }

    pub fn finish(self) -> TurnOutcome {
        if let Some(reason) = self.aborted {
            return TurnOutcome::Aborted(reason);
        }
        let from_message = self
            .message
            .as_ref()
            .map(|m| m.content.trim().to_string())
            .filter(|c| !c.is_empty());
        match (self.message, from_message) {
            (message, Some(text)) => TurnOutcome::Complete { message, text },
            (message, None) if !self.text.trim().is_empty() => TurnOutcome::Complete {
                message,
                text: self.text.trim().to_string(),
            },
            (Some(message), None) => TurnOutcome::Complete {
                message: Some(message),
                text: String::new(),
            },
            (None, None) => TurnOutcome::NeedsFallback,
        }
    }
}
