use serde::{Deserialize, Serialize};

use super::element::MediaKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    ImageEdit,
    Video,
}

impl JobKind {
    pub fn media(&self) -> MediaKind {
        match self {
            JobKind::ImageEdit => MediaKind::Image,
            JobKind::Video => MediaKind::Video,
        }
    }
}

/// Server-owned job state; the client only observes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}
