//! Canonical form and fingerprint of a scene document.
//!
//! The fingerprint is the only "did anything change" test the save pipeline
//! uses, so it must ignore key order and UI-only state.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::SceneData;

/// App-state keys that describe the local view or session, not the document.
const VOLATILE_APP_STATE: &[&str] = &[
    "collaborators",
    "contextMenu",
    "cursorButton",
    "draggingElement",
    "editingElement",
    "editingGroupId",
    "editingLinearElement",
    "errorMessage",
    "fileHandle",
    "height",
    "isLoading",
    "isResizing",
    "isRotating",
    "multiElement",
    "offsetLeft",
    "offsetTop",
    "openDialog",
    "openMenu",
    "openPopup",
    "openSidebar",
    "pasteDialog",
    "penDetected",
    "resizingElement",
    "scrollX",
    "scrollY",
    "selectedElementIds",
    "selectedGroupIds",
    "selectedLinearElement",
    "selectionElement",
    "showHyperlinkPopup",
    "toast",
    "width",
    "zoom",
];

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Canonical {
    pub data: Value,
    pub fingerprint: Fingerprint,
}

/// Normalizes a raw document. Never fails: input that does not look like a
/// scene document is fingerprinted from its raw serialization instead.
pub fn canonicalize(raw: &Value) -> Canonical {
    match normalize(raw) {
        Some(data) => {
            let fingerprint = digest(&canonical_text(&data));
            Canonical { data, fingerprint }
        }
        None => Canonical {
            data: raw.clone(),
            fingerprint: digest(&format!("raw:{}", raw)),
        },
    }
}

pub fn fingerprint(data: &SceneData) -> Fingerprint {
    canonicalize(&data.to_value()).fingerprint
}

/// Document data as it should be persisted: UI-only app state removed.
pub fn sanitized(data: &SceneData) -> SceneData {
    let mut out = data.clone();
    strip_volatile(&mut out.app_state);
    out
}

fn normalize(raw: &Value) -> Option<Value> {
    let obj = raw.as_object()?;
    let elements = match obj.get("elements") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return None,
    };
    let mut app_state = obj
        .get("appState")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    strip_volatile(&mut app_state);
    let files = obj
        .get("files")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut out = Map::new();
    out.insert("elements".to_string(), Value::Array(elements));
    out.insert("appState".to_string(), Value::Object(app_state));
    out.insert("files".to_string(), Value::Object(files));
    Some(Value::Object(out))
}

fn strip_volatile(app_state: &mut Map<String, Value>) {
    for key in VOLATILE_APP_STATE {
        app_state.remove(*key);
    }
}

fn digest(text: &str) -> Fingerprint {
    Fingerprint(blake3::hash(text.as_bytes()).to_hex().to_string())
}

fn canonical_text(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

// Keys sorted at every level regardless of how the map was built; integral
// floats print as integers so `1` and `1.0` agree.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                out.push_str(&(f as i64).to_string())
            }
            _ => out.push_str(&n.to_string()),
        },
        Value::String(s) => out.push_str(&Value::String(s.clone()).to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
#[path = "tests/canonical_tests.rs"]
mod tests;
