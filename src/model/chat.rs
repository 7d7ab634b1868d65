use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::scene::parse_timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: String,
}

impl ChatMessage {
    fn signature(&self) -> (ChatRole, String, String) {
        let content = self.content.split_whitespace().collect::<Vec<_>>().join(" ");
        let stamp = match parse_timestamp(&self.created_at) {
            Some(t) => t.unix_timestamp().to_string(),
            None => self.created_at.chars().take(19).collect(),
        };
        (self.role, content, stamp)
    }

    fn sort_key(&self) -> (i128, &str) {
        let nanos = parse_timestamp(&self.created_at)
            .map(|t| t.unix_timestamp_nanos())
            .unwrap_or(i128::MIN);
        (nanos, self.id.as_str())
    }
}

/// Union of two append-only logs. Remote entries win on signature collisions;
/// the result is ordered by creation time, then id.
pub fn merge_chat_logs(local: &[ChatMessage], remote: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(local.len() + remote.len());
    for msg in remote.iter().chain(local.iter()) {
        if seen.insert(msg.signature()) {
            out.push(msg.clone());
        }
    }
    out.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    out
}
