use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::geometry::Rect;
use super::ids::{JobId, random_id, random_nonce};

pub const DEFAULT_FONT_SIZE: f64 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderLeg {
    Frame,
    Label,
}

/// What the sync engine uses an element for. Stored under the element's
/// `customData` key; elements the engine did not create carry no role.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum ElementRole {
    #[serde(rename_all = "camelCase")]
    Placeholder {
        group: String,
        leg: PlaceholderLeg,
        media: MediaKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
    },
    PinnedNote,
    #[serde(rename_all = "camelCase")]
    MediaResult {
        media: MediaKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
        #[serde(default)]
        ordinal: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        asset_id: Option<String>,
        url: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementKind {
    /// `original_text` is the editor's unwrapped source; `text` may carry
    /// line breaks added by wrapping.
    Text {
        text: String,
        font_size: f64,
        original_text: Option<String>,
    },
    Image { file_id: String },
    /// Embedded media; generated videos are embeddables linking the result url.
    Embeddable { link: String },
    /// Any other editor shape, kept by its type name.
    Shape(String),
}

impl ElementKind {
    pub fn type_name(&self) -> &str {
        match self {
            ElementKind::Text { .. } => "text",
            ElementKind::Image { .. } => "image",
            ElementKind::Embeddable { .. } => "embeddable",
            ElementKind::Shape(name) => name,
        }
    }
}

/// One editor element. Base fields shared by every kind are typed; fields the
/// engine never reads survive round-trips in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub version: u64,
    pub version_nonce: u32,
    pub is_deleted: bool,
    pub group_ids: Vec<String>,
    pub role: Option<ElementRole>,
    pub extra: Map<String, Value>,
}

impl Element {
    pub fn new(kind: ElementKind, rect: Rect) -> Self {
        Self {
            id: random_id(),
            kind,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            version: 1,
            version_nonce: random_nonce(),
            is_deleted: false,
            group_ids: Vec::new(),
            role: None,
            extra: Map::new(),
        }
    }

    pub fn with_role(mut self, role: ElementRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn set_bounds(&mut self, rect: Rect) {
        self.x = rect.x;
        self.y = rect.y;
        self.width = rect.width;
        self.height = rect.height;
    }

    /// Marks a local edit so the editor's reconciliation picks this copy.
    pub fn bump(&mut self) {
        self.version += 1;
        self.version_nonce = random_nonce();
    }

    /// Elements are never removed from the list, only flagged deleted.
    pub fn tombstone(&mut self) {
        if !self.is_deleted {
            self.is_deleted = true;
            self.bump();
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn placeholder_group(&self) -> Option<&str> {
        match &self.role {
            Some(ElementRole::Placeholder { group, .. }) => Some(group),
            _ => None,
        }
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn take_f64(map: &mut Map<String, Value>, key: &str) -> Option<f64> {
    match map.remove(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

/// Counters written as `3.0` by some clients still read as 3.
fn whole_number(n: &serde_json::Number) -> Option<u64> {
    n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < 9.0e15)
            .map(|f| f as u64)
    })
}

fn take_bool(map: &mut Map<String, Value>, key: &str) -> Option<bool> {
    match map.remove(key) {
        Some(Value::Bool(b)) => Some(b),
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

impl TryFrom<Value> for Element {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut map) = value else {
            return Err("element must be an object".to_string());
        };
        let id = take_string(&mut map, "id").ok_or("element is missing a string id")?;
        let type_name =
            take_string(&mut map, "type").ok_or_else(|| format!("element {} has no type", id))?;

        let kind = match type_name.as_str() {
            "text" => ElementKind::Text {
                text: take_string(&mut map, "text").unwrap_or_default(),
                font_size: take_f64(&mut map, "fontSize").unwrap_or(DEFAULT_FONT_SIZE),
                original_text: take_string(&mut map, "originalText"),
            },
            "image" => ElementKind::Image {
                file_id: take_string(&mut map, "fileId").unwrap_or_default(),
            },
            "embeddable" => ElementKind::Embeddable {
                link: take_string(&mut map, "link").unwrap_or_default(),
            },
            _ => ElementKind::Shape(type_name),
        };

        let role = match map.remove("customData") {
            Some(raw) => match serde_json::from_value::<ElementRole>(raw.clone()) {
                Ok(role) => Some(role),
                Err(_) => {
                    map.insert("customData".to_string(), raw);
                    None
                }
            },
            None => None,
        };

        let group_ids = match map.remove("groupIds") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(other) => {
                map.insert("groupIds".to_string(), other);
                Vec::new()
            }
            None => Vec::new(),
        };

        let version = match map.remove("version") {
            Some(Value::Number(n)) => whole_number(&n).unwrap_or(1),
            _ => 1,
        };
        let version_nonce = match map.remove("versionNonce") {
            Some(Value::Number(n)) => whole_number(&n)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            _ => 0,
        };

        Ok(Element {
            id,
            kind,
            x: take_f64(&mut map, "x").unwrap_or(0.0),
            y: take_f64(&mut map, "y").unwrap_or(0.0),
            width: take_f64(&mut map, "width").unwrap_or(0.0),
            height: take_f64(&mut map, "height").unwrap_or(0.0),
            version,
            version_nonce,
            is_deleted: take_bool(&mut map, "isDeleted").unwrap_or(false),
            group_ids,
            role,
            extra: map,
        })
    }
}

impl From<Element> for Value {
    fn from(el: Element) -> Self {
        let mut map = el.extra;
        map.insert("id".to_string(), Value::String(el.id));
        map.insert(
            "type".to_string(),
            Value::String(el.kind.type_name().to_string()),
        );
        match el.kind {
            ElementKind::Text {
                text,
                font_size,
                original_text,
            } => {
                let original = original_text.unwrap_or_else(|| text.clone());
                map.insert("text".to_string(), Value::String(text));
                map.insert("originalText".to_string(), Value::String(original));
                map.insert("fontSize".to_string(), number(font_size));
            }
            ElementKind::Image { file_id } => {
                map.insert("fileId".to_string(), Value::String(file_id));
            }
            ElementKind::Embeddable { link } => {
                map.insert("link".to_string(), Value::String(link));
            }
            ElementKind::Shape(_) => {}
        }
        map.insert("x".to_string(), number(el.x));
        map.insert("y".to_string(), number(el.y));
        map.insert("width".to_string(), number(el.width));
        map.insert("height".to_string(), number(el.height));
        map.insert("version".to_string(), Value::from(el.version));
        map.insert("versionNonce".to_string(), Value::from(el.version_nonce));
        map.insert("isDeleted".to_string(), Value::Bool(el.is_deleted));
        map.insert(
            "groupIds".to_string(),
            Value::Array(el.group_ids.into_iter().map(Value::String).collect()),
        );
        if let Some(role) = el.role
            && let Ok(v) = serde_json::to_value(role)
        {
            map.insert("customData".to_string(), v);
        }
        Value::Object(map)
    }
}

fn number(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
