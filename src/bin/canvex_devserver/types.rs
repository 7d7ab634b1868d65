use serde_json::{Value, json};

use canvex::model::{JobKind, JobStatus, now_rfc3339, random_id};

use super::*;

#[derive(Clone)]
pub(crate) struct AppState {
    /// Bearer token required on API routes; open when unset.
    pub(crate) token: Option<String>,

    pub(crate) scenes: Arc<RwLock<HashMap<String, StoredScene>>>,
    pub(crate) messages: Arc<RwLock<HashMap<String, Vec<canvex::model::ChatMessage>>>>,

    /// All jobs in creation order.
    pub(crate) jobs: Arc<RwLock<Vec<StoredJob>>>,
}

impl AppState {
    pub(crate) fn new(token: Option<String>) -> Self {
        Self {
            token,
            scenes: Arc::new(RwLock::new(HashMap::new())),
            messages: Arc::new(RwLock::new(HashMap::new())),
            jobs: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
pub(crate) struct StoredScene {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) data: Value,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

#[derive(Clone, Debug)]
pub(crate) struct StoredJob {
    pub(crate) id: String,
    pub(crate) scene: String,
    pub(crate) kind: JobKind,
    pub(crate) status: JobStatus,
    pub(crate) prompt: String,
    pub(crate) num_images: u32,
    pub(crate) error: Option<String>,
    pub(crate) outputs: Vec<Value>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl StoredJob {
    pub(crate) fn new(scene: &str, kind: JobKind, prompt: &str, num_images: u32) -> Self {
        let now = now_rfc3339();
        Self {
            id: random_id(),
            scene: scene.to_string(),
            kind,
            status: JobStatus::Queued,
            prompt: prompt.to_string(),
            num_images,
            error: None,
            outputs: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// One step of the scripted lifecycle per observation. A prompt
    /// containing "fail" ends FAILED; one containing "stall" never finishes.
    pub(crate) fn advance(&mut self) {
        let prompt = self.prompt.to_lowercase();
        let next = match self.status {
            JobStatus::Queued => JobStatus::Running,
            JobStatus::Running if prompt.contains("stall") => JobStatus::Running,
            JobStatus::Running if prompt.contains("fail") => {
                self.error = Some("generation failed".to_string());
                JobStatus::Failed
            }
            JobStatus::Running => {
                self.outputs = self.render_outputs();
                JobStatus::Succeeded
            }
            done => done,
        };
        if next != self.status {
            self.status = next;
            self.updated_at = now_rfc3339();
        }
    }

    fn render_outputs(&self) -> Vec<Value> {
        match self.kind {
            JobKind::ImageEdit => (0..self.num_images.max(1))
                .map(|order| {
                    json!({
                        "order": order,
                        "asset_id": random_id(),
                        "url": format!("https://assets.invalid/{}-{}.png", self.id, order),
                        "width": 512,
                        "height": 512,
                        "mime_type": "image/png",
                    })
                })
                .collect(),
            JobKind::Video => vec![json!({
                "url": format!("https://assets.invalid/{}.mp4", self.id),
                "thumbnail_url": format!("https://assets.invalid/{}.jpg", self.id),
                "task_id": format!("task-{}", self.id),
            })],
        }
    }

    pub(crate) fn detail(&self) -> Value {
        let mut body = json!({
            "job_id": self.id,
            "status": self.status,
        });
        if let Some(err) = &self.error {
            body["error"] = json!(err);
        }
        if let Some(first) = self.outputs.first() {
            body["result"] = first.clone();
        }
        if self.kind == JobKind::ImageEdit && !self.outputs.is_empty() {
            body["results"] = json!(self.outputs);
        }
        body
    }

    pub(crate) fn summary(&self) -> Value {
        let mut body = json!({
            "id": self.id,
            "status": self.status,
            "error": self.error,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        });
        match self.kind {
            JobKind::ImageEdit => body["num_images"] = json!(self.num_images),
            JobKind::Video => {
                let result = self.outputs.first();
                let field = |key: &str| result.and_then(|r| r.get(key)).cloned().unwrap_or(Value::Null);
                body["result_url"] = field("url");
                body["thumbnail_url"] = field("thumbnail_url");
                body["task_id"] = field("task_id");
            }
        }
        body
    }
}
