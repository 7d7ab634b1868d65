//! DTOs and payload types for remote API requests/responses.

use serde_json::Value;

use crate::model::{ChatMessage, JobId, JobStatus, SceneId};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RemoteScene {
    pub id: SceneId,

    #[serde(default)]
    pub title: String,

    /// Absent in some list responses.
    #[serde(default)]
    pub data: Value,

    #[serde(default)]
    pub created_at: Option<String>,

    pub updated_at: String,
}

/// Partial update; only the fields that are set are sent.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct ScenePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, serde::Serialize)]
pub(super) struct CreateSceneRequest<'a> {
    pub(super) title: &'a str,
    pub(super) data: &'a Value,
}

#[derive(Debug, serde::Serialize)]
pub(super) struct ChatRequest<'a> {
    pub(super) content: &'a str,
}

/// One finished tool invocation as reported by the chat endpoint.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolInvocation {
    pub tool: String,

    #[serde(default)]
    pub result: Value,
}

/// Non-streaming chat reply: the stored assistant message plus any tool
/// results produced while answering.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct ChatReply {
    #[serde(flatten)]
    pub message: ChatMessage,

    #[serde(default)]
    pub tool_results: Vec<ToolInvocation>,
}

#[derive(Clone, Debug)]
pub struct ImageEditRequest {
    /// Encoded source image (the exported selection).
    pub image: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub prompt: Option<String>,
    /// Background removal instead of a prompted edit.
    pub cutout: bool,
    pub size: Option<String>,
    pub count: u8,
}

impl ImageEditRequest {
    /// The server accepts 1, 2 or 4 images per job.
    pub fn normalized_count(&self) -> u8 {
        match self.count {
            1 | 2 | 4 => self.count,
            _ => 1,
        }
    }
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct VideoRequest {
    pub prompt: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct JobTicket {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// One produced media file. `order` distinguishes the results of a
/// multi-image job.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaOutput {
    #[serde(default)]
    pub order: u32,

    #[serde(default)]
    pub asset_id: Option<String>,

    pub url: String,

    #[serde(default)]
    pub width: Option<f64>,

    #[serde(default)]
    pub height: Option<f64>,

    #[serde(default)]
    pub mime_type: Option<String>,

    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Status of one job as returned by the job detail endpoints.
#[derive(Clone, Debug, PartialEq)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub error: Option<String>,
    pub outputs: Vec<MediaOutput>,
}

#[derive(Debug, serde::Deserialize)]
pub(super) struct JobDetailWire {
    job_id: JobId,
    status: JobStatus,

    #[serde(default)]
    error: Option<String>,

    #[serde(default)]
    result: Option<OutputWire>,

    #[serde(default)]
    results: Vec<OutputWire>,
}

#[derive(Debug, serde::Deserialize)]
struct OutputWire {
    #[serde(default)]
    order: Option<u32>,
    #[serde(default)]
    asset_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

impl OutputWire {
    fn into_output(self, fallback_order: u32) -> Option<MediaOutput> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        Some(MediaOutput {
            order: self.order.unwrap_or(fallback_order),
            asset_id: self.asset_id,
            url,
            width: self.width,
            height: self.height,
            mime_type: self.mime_type,
            thumbnail_url: self.thumbnail_url,
        })
    }
}

impl From<JobDetailWire> for JobSnapshot {
    fn from(wire: JobDetailWire) -> Self {
        // `results` (multi-image jobs) supersedes the single `result`.
        let mut outputs: Vec<MediaOutput> = if wire.results.is_empty() {
            wire.result
                .and_then(|r| r.into_output(0))
                .into_iter()
                .collect()
        } else {
            wire.results
                .into_iter()
                .enumerate()
                .filter_map(|(i, r)| r.into_output(i as u32))
                .collect()
        };
        outputs.sort_by_key(|o| o.order);
        JobSnapshot {
            job_id: wire.job_id,
            status: wire.status,
            error: wire.error.filter(|e| !e.trim().is_empty()),
            outputs,
        }
    }
}

/// Entry of a scene's job history.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub status: JobStatus,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub num_images: Option<u32>,

    /// Video jobs carry their result url in the listing; image jobs do not.
    #[serde(default)]
    pub result_url: Option<String>,

    #[serde(default)]
    pub thumbnail_url: Option<String>,

    /// Rows without a creation time still parse; recovery pairs them last.
    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub updated_at: Option<String>,
}
