use super::*;
use serde_json::json;

#[test]
fn fingerprint_ignores_key_order() {
    let a = json!({
        "elements": [{"id": "a", "type": "rectangle", "x": 1, "y": 2}],
        "appState": {"viewBackgroundColor": "#fff", "gridSize": 20},
        "files": {},
    });
    let b = json!({
        "files": {},
        "appState": {"gridSize": 20, "viewBackgroundColor": "#fff"},
        "elements": [{"y": 2, "x": 1, "type": "rectangle", "id": "a"}],
    });
    assert_eq!(canonicalize(&a).fingerprint, canonicalize(&b).fingerprint);
}

#[test]
fn canonicalize_is_idempotent() {
    let raw = json!({
        "elements": [{"id": "a", "type": "text", "text": "hi"}],
        "appState": {"zoom": {"value": 2}, "gridSize": null},
    });
    let once = canonicalize(&raw);
    let twice = canonicalize(&once.data);
    assert_eq!(once.fingerprint, twice.fingerprint);
    assert_eq!(once.data, twice.data);
}

#[test]
fn view_state_does_not_change_fingerprint() {
    let base = json!({"elements": [], "appState": {"viewBackgroundColor": "#fff"}});
    let scrolled = json!({
        "elements": [],
        "appState": {
            "viewBackgroundColor": "#fff",
            "scrollX": 420,
            "zoom": {"value": 1.5},
            "selectedElementIds": {"a": true},
            "collaborators": {},
        },
    });
    assert_eq!(
        canonicalize(&base).fingerprint,
        canonicalize(&scrolled).fingerprint
    );
}

#[test]
fn document_changes_change_fingerprint() {
    let a = json!({"elements": [{"id": "a", "type": "rectangle", "x": 1}]});
    let b = json!({"elements": [{"id": "a", "type": "rectangle", "x": 2}]});
    let c = json!({"elements": [], "appState": {"viewBackgroundColor": "#000"}});
    let fa = canonicalize(&a).fingerprint;
    assert_ne!(fa, canonicalize(&b).fingerprint);
    assert_ne!(fa, canonicalize(&c).fingerprint);
}

#[test]
fn missing_sections_match_empty_sections() {
    let sparse = json!({"elements": null});
    let full = json!({"elements": [], "appState": {}, "files": {}});
    assert_eq!(
        canonicalize(&sparse).fingerprint,
        canonicalize(&full).fingerprint
    );
}

#[test]
fn integral_floats_match_integers() {
    let a = json!({"elements": [{"id": "a", "type": "rectangle", "x": 1.0}]});
    let b = json!({"elements": [{"id": "a", "type": "rectangle", "x": 1}]});
    assert_eq!(canonicalize(&a).fingerprint, canonicalize(&b).fingerprint);
}

#[test]
fn non_document_input_still_fingerprints() {
    let odd = json!("just a string");
    let c = canonicalize(&odd);
    assert_eq!(c.data, odd);
    assert_eq!(c.fingerprint, canonicalize(&json!("just a string")).fingerprint);
    assert_ne!(c.fingerprint, canonicalize(&json!("another")).fingerprint);

    let bad_elements = json!({"elements": 7});
    assert_eq!(canonicalize(&bad_elements).data, bad_elements);
}

#[test]
fn sanitized_drops_view_state_only() {
    let mut data = SceneData::default();
    data.app_state.insert("scrollX".to_string(), json!(10));
    data.app_state
        .insert("viewBackgroundColor".to_string(), json!("#fff"));
    let clean = sanitized(&data);
    assert!(!clean.app_state.contains_key("scrollX"));
    assert_eq!(clean.app_state.get("viewBackgroundColor"), Some(&json!("#fff")));
    assert_eq!(fingerprint(&clean), fingerprint(&data));
}
