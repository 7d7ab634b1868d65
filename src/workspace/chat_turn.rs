use std::collections::HashMap;

use futures_util::StreamExt;

use super::*;
use crate::jobs::{failure_label, generating_label};
use crate::model::{ChatRole, MediaKind, merge_chat_logs, now_rfc3339, random_id};
use crate::pins::Placement;
use crate::remote::ByteStream;
use crate::stream::{
    FrameDecoder, ToolOutcome, TurnEffect, TurnOutcome, TurnReducer, looks_like_tool_payload,
    parse_payload, tool_outcome,
};

const HISTORY_LIMIT: usize = 50;

/// Document-side bookkeeping of one chat turn.
#[derive(Debug, Default)]
struct TurnPins {
    note: Option<String>,
    /// Placeholders reserved by intent frames and not yet filled, oldest first.
    pending: HashMap<MediaKind, Vec<String>>,
}

impl Workspace {
    /// Sends one chat message and applies the streamed answer to the scene.
    /// A draft gets its remote copy first. Only one turn may run per scene.
    pub async fn send_chat(&self, key: &SceneKey, content: &str) -> Result<ChatMessage> {
        let busy_key = self.with_state(|st| {
            let key = st.resolve(key);
            if st.chat_busy.insert(key.clone()) {
                Ok(key)
            } else {
                Err(WorkspaceError::ChatBusy(key))
            }
        })?;

        let out = self.run_turn(key, content).await;

        self.with_state(|st| {
            let key = st.resolve(&busy_key);
            st.chat_busy.remove(&key);
            if let Ok(reply) = out.as_ref().map(|(id, _)| SceneKey::Scene(id.clone())) {
                st.chat_busy.remove(&reply);
            }
        });
        out.map(|(_, message)| message)
    }

    async fn run_turn(&self, key: &SceneKey, content: &str) -> Result<(SceneId, ChatMessage)> {
        let id = self.ensure_remote_id(key).await?;
        let key = SceneKey::Scene(id.clone());

        self.append_chat(
            &key,
            ChatMessage {
                id: random_id(),
                role: ChatRole::User,
                content: content.to_string(),
                created_at: now_rfc3339(),
            },
        );

        let mut turn = TurnPins::default();
        let outcome = match self.inner.remote.stream_chat(&id, content).await {
            Ok(body) => self.consume_stream(&key, body, &mut turn).await,
            Err(err) => {
                tracing::warn!(scene = %id, error = %format!("{:#}", err), "chat stream unavailable");
                TurnOutcome::NeedsFallback
            }
        };

        let reply = match outcome {
            TurnOutcome::Complete { message, text } => {
                if !text.is_empty() {
                    self.show_text(&key, &mut turn, &text)?;
                }
                match message {
                    Some(message) => message.into_chat_message(text),
                    None => ChatMessage {
                        id: random_id(),
                        role: ChatRole::Assistant,
                        content: text,
                        created_at: now_rfc3339(),
                    },
                }
            }
            TurnOutcome::NeedsFallback => match self.fallback_turn(&key, &id, content, &mut turn).await {
                Ok(message) => message,
                Err(err) => {
                    self.retire_pending(&key, &mut turn)?;
                    return Err(err);
                }
            },
            TurnOutcome::Aborted(reason) => {
                tracing::warn!(scene = %id, reason = %reason, "chat turn aborted");
                self.retire_pending(&key, &mut turn)?;
                return Err(WorkspaceError::ChatAborted(reason));
            }
        };

        self.retire_pending(&key, &mut turn)?;
        self.append_chat(&key, reply.clone());
        Ok((id, reply))
    }

    async fn consume_stream(&self, key: &SceneKey, mut body: ByteStream, turn: &mut TurnPins) -> TurnOutcome {
        let mut decoder = FrameDecoder::new();
        let mut reducer = TurnReducer::new();
        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    // The turn ends with whatever arrived.
                    tracing::warn!(scene = %key, error = %format!("{:#}", err), "chat stream interrupted");
                    break;
                }
            };
            for payload in decoder.push(&bytes) {
                self.feed(key, &mut reducer, turn, &payload);
            }
            if reducer.is_aborted() {
                break;
            }
        }
        if let Some(payload) = decoder.finish() {
            self.feed(key, &mut reducer, turn, &payload);
        }
        reducer.finish()
    }

    fn feed(&self, key: &SceneKey, reducer: &mut TurnReducer, turn: &mut TurnPins, payload: &str) {
        let frame = match parse_payload(payload) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(scene = %key, error = %err, "skipping malformed stream frame");
                return;
            }
        };
        tracing::debug!(scene = %key, ?frame, "stream frame");
        for effect in reducer.apply(frame) {
            if let Err(err) = self.apply_effect(key, turn, effect) {
                tracing::warn!(scene = %key, error = %err, "stream effect not applied");
            }
        }
    }

    fn apply_effect(&self, key: &SceneKey, turn: &mut TurnPins, effect: TurnEffect) -> Result<()> {
        match effect {
            TurnEffect::ReservePlaceholder(media) => {
                let ph = self.edit_scene(key, |board| {
                    board.create_placeholder(&generating_label(media), media, None, Placement::Anchored)
                })?;
                turn.pending.entry(media).or_default().push(ph.group);
            }
            TurnEffect::ShowText(text) => self.show_text(key, turn, &text)?,
            TurnEffect::HideText => {
                if let Some(note) = turn.note.take() {
                    self.edit_scene(key, |board| board.drop_note(&note))?;
                }
            }
            TurnEffect::Tool(outcome) => self.apply_tool(key, turn, outcome)?,
        }
        Ok(())
    }

    fn show_text(&self, key: &SceneKey, turn: &mut TurnPins, text: &str) -> Result<()> {
        if looks_like_tool_payload(text) {
            return Ok(());
        }
        match turn.note.as_deref() {
            Some(note) => {
                self.edit_scene(key, |board| board.update_note(note, text))?;
            }
            None => {
                let note = self.edit_scene(key, |board| board.pin_note(text))?;
                turn.note = Some(note);
            }
        }
        Ok(())
    }

    fn apply_tool(&self, key: &SceneKey, turn: &mut TurnPins, outcome: ToolOutcome) -> Result<()> {
        match outcome {
            ToolOutcome::Media(payload) => {
                let group = take_pending(turn, payload.media);
                self.edit_scene(key, |board| match group {
                    Some(group) => board.resolve_placeholder(&group, std::slice::from_ref(&payload)),
                    None => board.insert_results(Placement::Anchored, std::slice::from_ref(&payload)),
                })?;
            }
            ToolOutcome::Failed { media, reason } => {
                tracing::warn!(scene = %key, media = media.label(), reason = %reason, "tool failed");
                // The placeholder stays, showing the failure.
                if let Some(group) = take_pending(turn, media) {
                    self.edit_scene(key, |board| {
                        board.update_placeholder_text(&group, &failure_label(&reason))
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Placeholders reserved in this turn that nothing filled.
    fn retire_pending(&self, key: &SceneKey, turn: &mut TurnPins) -> Result<()> {
        let groups: Vec<String> = turn.pending.drain().flat_map(|(_, groups)| groups).collect();
        if groups.is_empty() {
            return Ok(());
        }
        self.edit_scene(key, |board| {
            for group in &groups {
                board.retire_placeholder(group);
            }
        })
    }

    async fn fallback_turn(
        &self,
        key: &SceneKey,
        id: &SceneId,
        content: &str,
        turn: &mut TurnPins,
    ) -> Result<ChatMessage> {
        tracing::info!(scene = %id, "stream gave no answer; retrying without streaming");
        let reply = self.inner.remote.send_chat(id, content).await?;
        for tool in &reply.tool_results {
            if let Some(outcome) = tool_outcome(tool) {
                self.apply_tool(key, turn, outcome)?;
            }
        }
        let text = reply.message.content.trim().to_string();
        if !text.is_empty() {
            self.show_text(key, turn, &text)?;
        }
        Ok(reply.message)
    }

    fn append_chat(&self, key: &SceneKey, message: ChatMessage) {
        self.with_slot(key, |slot| slot.chat.push(message));
        self.persist_chat(key);
    }

    /// Fetches the scene's recent chat history and merges it into the local
    /// log. Returns the merged log.
    pub async fn load_chat_history(&self, id: &SceneId) -> Result<Vec<ChatMessage>> {
        let key = SceneKey::Scene(id.clone());
        let remote_log = self.inner.remote.chat_history(id, HISTORY_LIMIT).await?;
        let merged = self.with_loaded_slot(&key, |slot| {
            slot.chat = merge_chat_logs(&slot.chat, &remote_log);
            slot.chat.clone()
        })?;
        self.persist_chat(&key);
        Ok(merged)
    }
}

fn take_pending(turn: &mut TurnPins, media: MediaKind) -> Option<String> {
    let groups = turn.pending.get_mut(&media)?;
    if groups.is_empty() {
        return None;
    }
    Some(groups.remove(0))
}
