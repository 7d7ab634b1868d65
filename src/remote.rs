use std::pin::Pin;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;

use crate::model::{ChatMessage, JobId, JobKind, RemoteConfig, SceneId};

mod http_client;
use self::http_client::with_retries;

mod types;
pub use self::types::*;
mod chat;
mod jobs;
mod scenes;

/// Raw body chunks of a streaming chat response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Everything the sync engine needs from the backend: the document store, the
/// chat endpoint and the media-job endpoints.
#[async_trait]
pub trait SceneRemote: Send + Sync {
    async fn list_scenes(&self) -> Result<Vec<RemoteScene>>;
    async fn create_scene(&self, title: &str, data: &Value) -> Result<RemoteScene>;
    async fn get_scene(&self, id: &SceneId) -> Result<RemoteScene>;
    async fn update_scene(&self, id: &SceneId, patch: &ScenePatch) -> Result<RemoteScene>;
    async fn delete_scene(&self, id: &SceneId) -> Result<()>;

    async fn chat_history(&self, scene: &SceneId, limit: usize) -> Result<Vec<ChatMessage>>;
    async fn send_chat(&self, scene: &SceneId, content: &str) -> Result<ChatReply>;
    async fn stream_chat(&self, scene: &SceneId, content: &str) -> Result<ByteStream>;

    async fn submit_image_edit(&self, scene: &SceneId, req: &ImageEditRequest)
    -> Result<JobTicket>;
    async fn submit_video(&self, scene: &SceneId, req: &VideoRequest) -> Result<JobTicket>;
    async fn job_status(&self, kind: JobKind, job: &JobId) -> Result<JobSnapshot>;
    async fn job_history(&self, kind: JobKind, scene: &SceneId) -> Result<Vec<JobSummary>>;
}

pub struct HttpRemote {
    remote: RemoteConfig,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(remote: RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("canvex")
            .build()
            .context("build reqwest client")?;
        Ok(Self { remote, client })
    }

    pub fn remote(&self) -> &RemoteConfig {
        &self.remote
    }
}

#[async_trait]
impl SceneRemote for HttpRemote {
    async fn list_scenes(&self) -> Result<Vec<RemoteScene>> {
        self.list_scenes_impl().await
    }

    async fn create_scene(&self, title: &str, data: &Value) -> Result<RemoteScene> {
        self.create_scene_impl(title, data).await
    }

    async fn get_scene(&self, id: &SceneId) -> Result<RemoteScene> {
        self.get_scene_impl(id).await
    }

    async fn update_scene(&self, id: &SceneId, patch: &ScenePatch) -> Result<RemoteScene> {
        self.update_scene_impl(id, patch).await
    }

    async fn delete_scene(&self, id: &SceneId) -> Result<()> {
        self.delete_scene_impl(id).await
    }

    async fn chat_history(&self, scene: &SceneId, limit: usize) -> Result<Vec<ChatMessage>> {
        self.chat_history_impl(scene, limit).await
    }

    async fn send_chat(&self, scene: &SceneId, content: &str) -> Result<ChatReply> {
        self.send_chat_impl(scene, content).await
    }

    async fn stream_chat(&self, scene: &SceneId, content: &str) -> Result<ByteStream> {
        self.stream_chat_impl(scene, content).await
    }

    async fn submit_image_edit(
        &self,
        scene: &SceneId,
        req: &ImageEditRequest,
    ) -> Result<JobTicket> {
        self.submit_image_edit_impl(scene, req).await
    }

    async fn submit_video(&self, scene: &SceneId, req: &VideoRequest) -> Result<JobTicket> {
        self.submit_video_impl(scene, req).await
    }

    async fn job_status(&self, kind: JobKind, job: &JobId) -> Result<JobSnapshot> {
        self.job_status_impl(kind, job).await
    }

    async fn job_history(&self, kind: JobKind, scene: &SceneId) -> Result<Vec<JobSummary>> {
        self.job_history_impl(kind, scene).await
    }
}
