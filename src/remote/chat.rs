use futures_util::StreamExt;

use super::*;

impl HttpRemote {
    pub(super) async fn chat_history_impl(
        &self,
        scene: &SceneId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        with_retries("chat history", || async {
            let resp = self
                .authed(self.client.get(self.url(&format!("/scenes/{}/chat/", scene))))
                .query(&[("limit", limit.to_string())])
                .send()
                .await
                .context("chat history request")?;
            let log: Vec<ChatMessage> = self
                .ensure_ok(resp, "chat history")?
                .json()
                .await
                .context("parse chat history")?;
            Ok(log)
        })
        .await
    }

    pub(super) async fn send_chat_impl(&self, scene: &SceneId, content: &str) -> Result<ChatReply> {
        let resp = self
            .authed(self.client.post(self.url(&format!("/scenes/{}/chat/", scene))))
            .json(&ChatRequest { content })
            .send()
            .await
            .context("chat request")?;
        let reply: ChatReply = self
            .ensure_ok(resp, "chat")?
            .json()
            .await
            .context("parse chat reply")?;
        Ok(reply)
    }

    pub(super) async fn stream_chat_impl(
        &self,
        scene: &SceneId,
        content: &str,
    ) -> Result<ByteStream> {
        let resp = self
            .authed(self.client.post(self.url(&format!("/scenes/{}/chat/", scene))))
            .query(&[("stream", "1")])
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&ChatRequest { content })
            .send()
            .await
            .context("chat stream request")?;
        let resp = self.ensure_ok(resp, "chat stream")?;
        let body = resp.bytes_stream().map(|chunk| {
            chunk
                .map(|b| b.to_vec())
                .context("read chat stream chunk")
        });
        Ok(Box::pin(body))
    }
}
