#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use canvex::model::{
    ChatMessage, ChatRole, JobId, JobKind, JobStatus, SceneId, SyncConfig, now_rfc3339, random_id,
};
use canvex::remote::{
    ByteStream, ChatReply, ImageEditRequest, JobSnapshot, JobSummary, JobTicket, MediaOutput,
    RemoteScene, ScenePatch, SceneRemote, ToolInvocation, VideoRequest,
};
use canvex::store::LocalCache;
use canvex::workspace::Workspace;

pub struct ServerGuard {
    pub base_url: String,
    _data_dir: tempfile::TempDir,
    child: Child,
}

impl ServerGuard {
    /// Root the client talks to; every API route hangs off it.
    pub fn api_url(&self) -> String {
        format!("{}/api/excalidraw", self.base_url)
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn spawn_devserver() -> Result<ServerGuard> {
    let data_dir = tempfile::tempdir().context("create server tempdir")?;
    let addr_file = data_dir.path().join("addr.txt");

    let child = Command::new(env!("CARGO_BIN_EXE_canvex-devserver"))
        .args([
            "--addr",
            "127.0.0.1:0",
            "--addr-file",
            addr_file.to_str().unwrap(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("spawn canvex-devserver")?;

    let base_url = read_addr_file(&addr_file)?;
    wait_for_healthz(&base_url)?;

    Ok(ServerGuard {
        base_url,
        _data_dir: data_dir,
        child,
    })
}

fn read_addr_file(addr_file: &std::path::Path) -> Result<String> {
    let start = Instant::now();
    loop {
        if start.elapsed() > Duration::from_secs(5) {
            anyhow::bail!("addr file not written at {}", addr_file.display());
        }

        if let Ok(s) = std::fs::read_to_string(addr_file) {
            let s = s.trim();
            if !s.is_empty() {
                return Ok(format!("http://{}", s));
            }
        }
        thread::sleep(Duration::from_millis(10));
    }
}

pub fn wait_for_healthz(base_url: &str) -> Result<()> {
    let client = reqwest::blocking::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > Duration::from_secs(5) {
            anyhow::bail!("server did not become healthy at {}/healthz", base_url);
        }
        match client.get(format!("{}/healthz", base_url)).send() {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => {
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

/// A workspace over a fresh cache directory.
pub fn workspace(remote: Arc<dyn SceneRemote>) -> Result<(Workspace, tempfile::TempDir)> {
    let dir = tempfile::tempdir().context("create cache tempdir")?;
    let ws = workspace_at(dir.path(), remote, SyncConfig::default())?;
    Ok((ws, dir))
}

pub fn workspace_at(
    root: &std::path::Path,
    remote: Arc<dyn SceneRemote>,
    config: SyncConfig,
) -> Result<Workspace> {
    let cache = LocalCache::open_or_init(root).context("open cache")?;
    Ok(Workspace::new(config, cache, remote))
}

/// SSE body made of the given `data:` payloads, one frame each.
pub fn sse(payloads: &[Value]) -> Vec<Vec<u8>> {
    let mut chunks = vec![b":\n\n".to_vec()];
    chunks.extend(
        payloads
            .iter()
            .map(|p| format!("data: {}\n\n", p).into_bytes()),
    );
    chunks
}

pub fn message(role: ChatRole, content: &str) -> ChatMessage {
    ChatMessage {
        id: random_id(),
        role,
        content: content.to_string(),
        created_at: now_rfc3339(),
    }
}

pub fn snapshot(job: &JobId, status: JobStatus, urls: &[&str]) -> JobSnapshot {
    JobSnapshot {
        job_id: job.clone(),
        status,
        error: None,
        outputs: urls
            .iter()
            .enumerate()
            .map(|(i, url)| MediaOutput {
                order: i as u32,
                asset_id: None,
                url: url.to_string(),
                width: Some(512.0),
                height: Some(512.0),
                mime_type: Some("image/png".to_string()),
                thumbnail_url: None,
            })
            .collect(),
    }
}

#[derive(Default)]
pub struct Counters {
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub gets: AtomicUsize,
    pub streams: AtomicUsize,
    pub sends: AtomicUsize,
    pub submits: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct JobScript {
    kind: JobKind,
    scene: SceneId,
    steps: VecDeque<JobSnapshot>,
    created_at: String,
    result_url: Option<String>,
}

#[derive(Default)]
struct FakeState {
    scenes: HashMap<SceneId, RemoteScene>,
    chat: HashMap<SceneId, Vec<ChatMessage>>,
    streams: VecDeque<Vec<Vec<u8>>>,
    replies: VecDeque<ChatReply>,
    jobs: Vec<(JobId, JobScript)>,
    /// Status script given to the next submitted job.
    next_job: VecDeque<Vec<JobSnapshot>>,
}

/// In-memory `SceneRemote` with call counters and scripted chat streams and
/// job lifecycles.
#[derive(Default)]
pub struct FakeRemote {
    pub calls: Counters,
    state: Mutex<FakeState>,
    pub fail_writes: AtomicBool,
    pub fail_gets: AtomicBool,
    pub fail_streams: AtomicBool,
    pub fail_submits: AtomicBool,
    /// Simulated latency of scene writes.
    pub write_delay: Mutex<Option<Duration>>,
    /// Simulated time to first byte of a chat stream.
    pub stream_delay: Mutex<Option<Duration>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_scene(&self, title: &str, data: Value, updated_at: &str) -> SceneId {
        let id = SceneId(random_id());
        self.state.lock().scenes.insert(
            id.clone(),
            RemoteScene {
                id: id.clone(),
                title: title.to_string(),
                data,
                created_at: Some(updated_at.to_string()),
                updated_at: updated_at.to_string(),
            },
        );
        id
    }

    pub fn scene(&self, id: &SceneId) -> Option<RemoteScene> {
        self.state.lock().scenes.get(id).cloned()
    }

    pub fn scene_count(&self) -> usize {
        self.state.lock().scenes.len()
    }

    pub fn push_stream(&self, chunks: Vec<Vec<u8>>) {
        self.state.lock().streams.push_back(chunks);
    }

    pub fn push_reply(&self, content: &str, tools: Vec<ToolInvocation>) {
        self.state.lock().replies.push_back(ChatReply {
            message: message(ChatRole::Assistant, content),
            tool_results: tools,
        });
    }

    /// Status responses the next submitted job walks through; the last one
    /// repeats.
    pub fn script_next_job(&self, steps: Vec<JobSnapshot>) {
        self.state.lock().next_job.push_back(steps);
    }

    /// Registers a job that already exists in the scene's history.
    pub fn seed_job(
        &self,
        scene: &SceneId,
        kind: JobKind,
        created_at: &str,
        result_url: Option<&str>,
        steps: Vec<JobSnapshot>,
    ) -> JobId {
        let id = steps
            .first()
            .map(|s| s.job_id.clone())
            .unwrap_or_else(|| JobId(random_id()));
        self.state.lock().jobs.push((
            id.clone(),
            JobScript {
                kind,
                scene: scene.clone(),
                steps: steps.into(),
                created_at: created_at.to_string(),
                result_url: result_url.map(str::to_string),
            },
        ));
        id
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    async fn write_latency(&self) {
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SceneRemote for FakeRemote {
    async fn list_scenes(&self) -> Result<Vec<RemoteScene>> {
        let st = self.state.lock();
        Ok(st
            .scenes
            .values()
            .map(|s| RemoteScene {
                data: Value::Null,
                ..s.clone()
            })
            .collect())
    }

    async fn create_scene(&self, title: &str, data: &Value) -> Result<RemoteScene> {
        Self::bump(&self.calls.creates);
        self.write_latency().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("create scene status: 503 Service Unavailable");
        }
        let id = self.seed_scene(title, data.clone(), &now_rfc3339());
        Ok(self.scene(&id).context("created scene")?)
    }

    async fn get_scene(&self, id: &SceneId) -> Result<RemoteScene> {
        Self::bump(&self.calls.gets);
        if self.fail_gets.load(Ordering::SeqCst) {
            anyhow::bail!("get scene: connection refused");
        }
        self.scene(id).with_context(|| format!("scene {} not found", id))
    }

    async fn update_scene(&self, id: &SceneId, patch: &ScenePatch) -> Result<RemoteScene> {
        Self::bump(&self.calls.updates);
        self.write_latency().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("update scene status: 503 Service Unavailable");
        }
        let mut st = self.state.lock();
        let scene = st
            .scenes
            .get_mut(id)
            .with_context(|| format!("scene {} not found", id))?;
        if let Some(title) = &patch.title {
            scene.title = title.clone();
        }
        if let Some(data) = &patch.data {
            scene.data = data.clone();
        }
        scene.updated_at = now_rfc3339();
        Ok(scene.clone())
    }

    async fn delete_scene(&self, id: &SceneId) -> Result<()> {
        self.state
            .lock()
            .scenes
            .remove(id)
            .map(|_| ())
            .with_context(|| format!("scene {} not found", id))
    }

    async fn chat_history(&self, scene: &SceneId, limit: usize) -> Result<Vec<ChatMessage>> {
        let st = self.state.lock();
        let log = st.chat.get(scene).cloned().unwrap_or_default();
        let start = log.len().saturating_sub(limit);
        Ok(log[start..].to_vec())
    }

    async fn send_chat(&self, scene: &SceneId, content: &str) -> Result<ChatReply> {
        Self::bump(&self.calls.sends);
        let mut st = self.state.lock();
        let reply = st
            .replies
            .pop_front()
            .context("chat status: 500 Internal Server Error")?;
        let log = st.chat.entry(scene.clone()).or_default();
        log.push(message(ChatRole::User, content));
        log.push(reply.message.clone());
        Ok(reply)
    }

    async fn stream_chat(&self, scene: &SceneId, content: &str) -> Result<ByteStream> {
        Self::bump(&self.calls.streams);
        let delay = *self.stream_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_streams.load(Ordering::SeqCst) {
            anyhow::bail!("chat stream request: connection reset");
        }
        let chunks = {
            let mut st = self.state.lock();
            st.chat
                .entry(scene.clone())
                .or_default()
                .push(message(ChatRole::User, content));
            st.streams.pop_front().unwrap_or_else(|| sse(&[]))
        };
        let body = futures_util::stream::iter(chunks.into_iter().map(Ok));
        Ok(Box::pin(body))
    }

    async fn submit_image_edit(&self, scene: &SceneId, _req: &ImageEditRequest) -> Result<JobTicket> {
        self.submit(scene, JobKind::ImageEdit)
    }

    async fn submit_video(&self, scene: &SceneId, _req: &VideoRequest) -> Result<JobTicket> {
        self.submit(scene, JobKind::Video)
    }

    async fn job_status(&self, kind: JobKind, job: &JobId) -> Result<JobSnapshot> {
        Self::bump(&self.calls.status_calls);
        let mut st = self.state.lock();
        let (_, script) = st
            .jobs
            .iter_mut()
            .find(|(id, s)| id == job && s.kind == kind)
            .with_context(|| format!("job {} not found", job))?;
        let snap = if script.steps.len() > 1 {
            script.steps.pop_front()
        } else {
            script.steps.front().cloned()
        };
        snap.with_context(|| format!("job {} has no status", job))
    }

    async fn job_history(&self, kind: JobKind, scene: &SceneId) -> Result<Vec<JobSummary>> {
        let st = self.state.lock();
        Ok(st
            .jobs
            .iter()
            .filter(|(_, s)| s.kind == kind && &s.scene == scene)
            .map(|(id, s)| {
                let current = s.steps.front();
                JobSummary {
                    id: id.clone(),
                    status: current.map(|c| c.status).unwrap_or(JobStatus::Queued),
                    error: current.and_then(|c| c.error.clone()),
                    num_images: None,
                    result_url: s.result_url.clone(),
                    thumbnail_url: None,
                    created_at: Some(s.created_at.clone()),
                    updated_at: None,
                }
            })
            .collect())
    }
}

impl FakeRemote {
    fn submit(&self, scene: &SceneId, kind: JobKind) -> Result<JobTicket> {
        Self::bump(&self.calls.submits);
        if self.fail_submits.load(Ordering::SeqCst) {
            anyhow::bail!("submit status: 400 Bad Request");
        }
        let job = JobId(random_id());
        let mut st = self.state.lock();
        let steps: Vec<JobSnapshot> = st
            .next_job
            .pop_front()
            .unwrap_or_else(|| vec![snapshot(&job, JobStatus::Queued, &[])])
            .into_iter()
            .map(|s| JobSnapshot {
                job_id: job.clone(),
                ..s
            })
            .collect();
        st.jobs.push((
            job.clone(),
            JobScript {
                kind,
                scene: scene.clone(),
                steps: steps.into(),
                created_at: now_rfc3339(),
                result_url: None,
            },
        ));
        Ok(JobTicket {
            job_id: job,
            status: JobStatus::Queued,
        })
    }

    /// Moves a job to its final state; history and status both report it.
    pub fn finish_job(&self, job: &JobId, snap: JobSnapshot, result_url: Option<&str>) {
        let mut st = self.state.lock();
        if let Some((_, s)) = st.jobs.iter_mut().find(|(id, _)| id == job) {
            s.steps = VecDeque::from(vec![JobSnapshot {
                job_id: job.clone(),
                ..snap
            }]);
            s.result_url = result_url.map(str::to_string);
        }
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.state.lock().jobs.iter().map(|(id, _)| id.clone()).collect()
    }
}

pub fn scene_json(elements: Value) -> Value {
    json!({"elements": elements, "appState": {"viewBackgroundColor": "#ffffff"}, "files": {}})
}
