mod chat;
mod config;
mod element;
mod geometry;
mod ids;
mod job;
mod scene;

pub use self::chat::{ChatMessage, ChatRole, merge_chat_logs};
pub use self::config::{PinLayout, PollPolicy, RemoteConfig, SaveTiming, SyncConfig};
pub use self::element::{
    DEFAULT_FONT_SIZE, Element, ElementKind, ElementRole, MediaKind, PlaceholderLeg,
};
pub use self::geometry::{Point, Rect};
pub use self::ids::{JobId, SceneId, SceneKey, random_id, random_nonce};
pub use self::job::{JobKind, JobStatus};
pub use self::scene::{
    FileDescriptor, SaveState, Scene, SceneData, is_strictly_newer, now_rfc3339, parse_timestamp,
    stamp_after,
};
