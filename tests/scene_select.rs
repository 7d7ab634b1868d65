mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use canvex::canonical::{fingerprint, sanitized};
use canvex::model::{ChatRole, SaveState, SceneData, SceneId, SceneKey, SyncConfig, now_rfc3339};
use canvex::remote::SceneRemote;
use canvex::store::CachedScene;
use canvex::workspace::WorkspaceError;
use common::{Counters, FakeRemote, scene_json};

const OLD: &str = "2020-01-01T00:00:00Z";

fn rect(id: &str, x: f64) -> Value {
    json!({"id": id, "type": "rectangle", "x": x, "y": 0, "width": 50, "height": 50})
}

fn doc_with(x: f64) -> SceneData {
    SceneData::from_value_lossy(&scene_json(json!([rect("a", x)])))
}

fn first_x(doc: &SceneData) -> Option<f64> {
    doc.elements.first().map(|el| el.x)
}

#[tokio::test(start_paused = true)]
async fn remote_copy_wins_without_local_state() -> Result<()> {
    let remote = FakeRemote::new();
    let id = remote.seed_scene("Board", scene_json(json!([rect("a", 5.0)])), &now_rfc3339());
    let (ws, _dir) = common::workspace(remote.clone())?;

    let key = ws.select_scene(&id).await?;
    assert_eq!(key, SceneKey::Scene(id.clone()));
    assert_eq!(ws.active(), Some(key.clone()));
    let doc = ws.document(&key).context("scene loaded")?;
    assert_eq!(first_x(&doc), Some(5.0));
    assert_eq!(ws.save_state(&key), Some(SaveState::Saved));

    // Adopting the remote copy refreshes the cache.
    let cached = ws.cache().read_scene(&key)?.context("cache entry")?;
    assert_eq!(cached.title, "Board");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(Counters::get(&remote.calls.updates), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn newer_local_copy_is_kept_and_saved() -> Result<()> {
    let remote = FakeRemote::new();
    let id = remote.seed_scene("Board", scene_json(json!([rect("a", 0.0)])), OLD);
    let dir = tempfile::tempdir()?;

    {
        let ws = common::workspace_at(dir.path(), remote.clone(), SyncConfig::default())?;
        let key = ws.select_scene(&id).await?;
        // Edited but never flushed, as after a crash.
        ws.record_mutation(&key, doc_with(9.0))?;
    }

    let ws = common::workspace_at(dir.path(), remote.clone(), SyncConfig::default())?;
    let key = ws.select_scene(&id).await?;
    let doc = ws.document(&key).context("scene loaded")?;
    assert_eq!(first_x(&doc), Some(9.0));
    assert_eq!(ws.save_state(&key), Some(SaveState::Pending));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(Counters::get(&remote.calls.updates), 1);
    let stored = remote.scene(&id).context("remote copy")?;
    assert_eq!(stored.data["elements"][0]["x"].as_f64(), Some(9.0));
    assert_eq!(ws.save_state(&key), Some(SaveState::Saved));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn newer_clean_cache_is_pushed_to_the_remote() -> Result<()> {
    let remote = FakeRemote::new();
    let id = remote.seed_scene("Board", scene_json(json!([rect("a", 0.0)])), OLD);
    let (ws, _dir) = common::workspace(remote.clone())?;
    let key = SceneKey::Scene(id.clone());
    let data = scene_json(json!([rect("a", 4.0)]));
    let fp = fingerprint(&sanitized(&SceneData::from_value_lossy(&data)));
    ws.cache().write_scene(
        &key,
        &CachedScene {
            version: 1,
            id: Some(id.clone()),
            title: "Board".to_string(),
            data,
            updated_at: now_rfc3339(),
            saved_fingerprint: Some(fp),
        },
    )?;

    ws.select_scene(&id).await?;
    assert_eq!(ws.save_state(&key), Some(SaveState::Pending));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(Counters::get(&remote.calls.updates), 1);
    let stored = remote.scene(&id).context("remote copy")?;
    assert_eq!(stored.data["elements"][0]["x"].as_f64(), Some(4.0));
    assert_eq!(ws.save_state(&key), Some(SaveState::Saved));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn newer_remote_copy_replaces_stale_cache() -> Result<()> {
    let remote = FakeRemote::new();
    let id = remote.seed_scene("Board", scene_json(json!([rect("a", 3.0)])), &now_rfc3339());
    let (ws, _dir) = common::workspace(remote.clone())?;
    let key = SceneKey::Scene(id.clone());
    ws.cache().write_scene(
        &key,
        &CachedScene {
            version: 1,
            id: Some(id.clone()),
            title: "Stale".to_string(),
            data: scene_json(json!([rect("a", 1.0)])),
            updated_at: OLD.to_string(),
            saved_fingerprint: None,
        },
    )?;

    ws.select_scene(&id).await?;
    let doc = ws.document(&key).context("scene loaded")?;
    assert_eq!(first_x(&doc), Some(3.0));
    let cached = ws.cache().read_scene(&key)?.context("cache entry")?;
    assert_eq!(cached.title, "Board");
    assert_eq!(cached.data["elements"][0]["x"].as_f64(), Some(3.0));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn corrupt_cache_entry_is_treated_as_absent() -> Result<()> {
    let remote = FakeRemote::new();
    let id = remote.seed_scene("Board", scene_json(json!([rect("a", 2.0)])), OLD);
    let (ws, dir) = common::workspace(remote.clone())?;
    let scene_dir = dir
        .path()
        .join("workspaces")
        .join(ws.cache().workspace())
        .join(id.as_str());
    std::fs::create_dir_all(&scene_dir)?;
    std::fs::write(scene_dir.join("scene.json"), b"{\"version\": 1, \"data\": ")?;

    let key = ws.select_scene(&id).await?;
    let doc = ws.document(&key).context("scene loaded")?;
    assert_eq!(first_x(&doc), Some(2.0));
    assert!(ws.cache().read_scene(&key)?.is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unreachable_remote_falls_back_to_cache() -> Result<()> {
    let remote = FakeRemote::new();
    let id = remote.seed_scene("Board", scene_json(json!([rect("a", 0.0)])), OLD);
    let dir = tempfile::tempdir()?;
    {
        let ws = common::workspace_at(dir.path(), remote.clone(), SyncConfig::default())?;
        let key = ws.select_scene(&id).await?;
        ws.record_mutation(&key, doc_with(6.0))?;
    }
    remote.fail_gets.store(true, Ordering::SeqCst);

    let ws = common::workspace_at(dir.path(), remote.clone(), SyncConfig::default())?;
    let key = ws.select_scene(&id).await?;
    assert_eq!(first_x(&ws.document(&key).context("scene loaded")?), Some(6.0));

    let unknown = SceneId("never-seen".to_string());
    assert!(matches!(
        ws.select_scene(&unknown).await,
        Err(WorkspaceError::UnknownScene(_))
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn selecting_loads_chat_history() -> Result<()> {
    let remote = FakeRemote::new();
    let id = remote.seed_scene("Board", scene_json(json!([])), OLD);
    remote.push_reply("hello back", Vec::new());
    remote.send_chat(&id, "hello").await?;
    let (ws, _dir) = common::workspace(remote.clone())?;

    let key = ws.select_scene(&id).await?;
    let log = ws.chat_log(&key);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, ChatRole::User);
    assert_eq!(log[1].content, "hello back");
    assert_eq!(ws.cache().read_chat(&key)?, log);

    // Merging again does not duplicate.
    assert_eq!(ws.load_chat_history(&id).await?.len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cached_draft_is_restored_in_a_new_session() -> Result<()> {
    let remote = FakeRemote::new();
    remote.fail_writes.store(true, Ordering::SeqCst);
    let dir = tempfile::tempdir()?;
    {
        let ws = common::workspace_at(dir.path(), remote.clone(), SyncConfig::default())?;
        let key = ws.new_draft("Ideas")?;
        ws.record_mutation(&key, doc_with(8.0))?;
    }

    let ws = common::workspace_at(dir.path(), remote.clone(), SyncConfig::default())?;
    assert_eq!(ws.restore_draft()?, Some(SceneKey::Draft));
    let scene = ws.scene(&SceneKey::Draft).context("draft loaded")?;
    assert_eq!(scene.title, "Ideas");
    assert_eq!(first_x(&scene.data), Some(8.0));
    assert_eq!(ws.save_state(&SceneKey::Draft), Some(SaveState::Pending));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn new_draft_discards_the_cached_one() -> Result<()> {
    let remote = FakeRemote::new();
    let (ws, _dir) = common::workspace(remote.clone())?;
    let key = ws.new_draft("First")?;
    ws.record_mutation(&key, doc_with(1.0))?;

    ws.new_draft("Second")?;
    let scene = ws.scene(&SceneKey::Draft).context("draft")?;
    assert_eq!(scene.title, "Second");
    assert!(scene.data.elements.is_empty());
    let cached = ws.cache().read_scene(&SceneKey::Draft)?.context("cache")?;
    assert_eq!(cached.title, "Second");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rename_and_delete() -> Result<()> {
    let remote = FakeRemote::new();
    let id = remote.seed_scene("Board", scene_json(json!([])), OLD);
    let (ws, _dir) = common::workspace(remote.clone())?;
    let key = ws.select_scene(&id).await?;

    ws.rename_scene(&key, "Renamed").await?;
    assert_eq!(remote.scene(&id).context("remote copy")?.title, "Renamed");
    assert_eq!(ws.scene(&key).context("scene")?.title, "Renamed");

    ws.delete_scene(&id).await?;
    assert!(remote.scene(&id).is_none());
    assert!(ws.scene(&key).is_none());
    assert_eq!(ws.active(), None);
    assert!(ws.cache().read_scene(&key)?.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn list_scenes_reports_remote_scenes() -> Result<()> {
    let remote = FakeRemote::new();
    remote.seed_scene("One", scene_json(json!([])), OLD);
    remote.seed_scene("Two", scene_json(json!([])), OLD);
    let (ws, _dir) = common::workspace(remote.clone())?;
    let mut titles: Vec<String> = ws.list_scenes().await?.into_iter().map(|s| s.title).collect();
    titles.sort();
    assert_eq!(titles, vec!["One", "Two"]);
    Ok(())
}
