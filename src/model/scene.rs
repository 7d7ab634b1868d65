use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::element::Element;
use super::ids::SceneId;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    #[serde(default)]
    pub elements: Vec<Element>,

    #[serde(default, rename = "appState")]
    pub app_state: Map<String, Value>,

    #[serde(default)]
    pub files: Map<String, Value>,
}

impl SceneData {
    /// Parses a stored or remote document without failing: elements that do not
    /// parse are dropped (and logged), everything else is kept.
    pub fn from_value_lossy(value: &Value) -> SceneData {
        let Some(obj) = value.as_object() else {
            if !value.is_null() {
                tracing::warn!("scene data is not an object; starting from an empty document");
            }
            return SceneData::default();
        };

        let mut elements = Vec::new();
        if let Some(items) = obj.get("elements").and_then(Value::as_array) {
            for item in items {
                match Element::try_from(item.clone()) {
                    Ok(el) => elements.push(el),
                    Err(err) => tracing::warn!(error = %err, "dropping unreadable element"),
                }
            }
        }

        SceneData {
            elements,
            app_state: obj
                .get("appState")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            files: obj
                .get("files")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }

    pub fn to_value(&self) -> Value {
        let elements = self.elements.iter().cloned().map(Value::from).collect();
        let mut map = Map::new();
        map.insert("elements".to_string(), Value::Array(elements));
        map.insert("appState".to_string(), Value::Object(self.app_state.clone()));
        map.insert("files".to_string(), Value::Object(self.files.clone()));
        Value::Object(map)
    }

    pub fn live_elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_live())
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    pub fn insert_file(&mut self, file: &FileDescriptor) {
        if let Ok(v) = serde_json::to_value(file) {
            self.files.insert(file.id.clone(), v);
        }
    }
}

/// Binary payload descriptor referenced by image elements through `fileId`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub id: String,
    pub mime_type: String,
    #[serde(rename = "dataURL")]
    pub data_url: String,
    pub created: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub id: Option<SceneId>,
    pub title: String,
    pub data: SceneData,
    pub updated_at: String,
}

impl Scene {
    pub fn draft(title: &str) -> Self {
        Scene {
            id: None,
            title: title.to_string(),
            data: SceneData::default(),
            updated_at: now_rfc3339(),
        }
    }
}

/// `Saved` holds only while the last-saved fingerprint equals the current one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveState {
    Idle,
    Pending,
    Saving,
    Saved,
    Error,
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::UNIX_EPOCH.unix_timestamp().to_string())
}

/// Now, or just after `other` when the local clock is behind it. Used to keep
/// local edits made during a save newer than the saved copy.
pub fn stamp_after(other: &str) -> String {
    let now = OffsetDateTime::now_utc();
    let at = match parse_timestamp(other) {
        Some(t) if t >= now => t + time::Duration::milliseconds(1),
        _ => now,
    };
    at.format(&Rfc3339).unwrap_or_else(|_| now_rfc3339())
}

pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).ok()
}

/// True only when `a` parses and is later than `b`; an unparseable `b` counts
/// as the oldest possible time.
pub fn is_strictly_newer(a: &str, b: &str) -> bool {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(a), Some(b)) => a.cmp(&b) == Ordering::Greater,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
