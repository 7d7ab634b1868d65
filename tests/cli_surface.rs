mod common;

use std::process::Command;

use anyhow::{Context, Result};
use serde_json::json;

fn run_canvex(cache: &std::path::Path, args: &[&str]) -> Result<String> {
    let out = Command::new(env!("CARGO_BIN_EXE_canvex"))
        .arg("--cache-dir")
        .arg(cache)
        .args(args)
        .env_remove("CANVEX_BASE_URL")
        .env_remove("CANVEX_WORKSPACE")
        .output()
        .with_context(|| format!("run canvex {:?}", args))?;

    if !out.status.success() {
        anyhow::bail!(
            "canvex {:?} failed (status {:?})\nstdout:\n{}\nstderr:\n{}",
            args,
            out.status,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
    }

    Ok(String::from_utf8_lossy(&out.stdout).to_string())
}

#[test]
fn cli_help_surface_is_stable() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let help = run_canvex(dir.path(), &["--help"])?;
    assert!(help.contains("Usage: canvex"));
    for cmd in ["init", "remote", "scenes", "open", "push", "chat", "video", "recover"] {
        assert!(help.contains(cmd), "missing {cmd} in help");
    }

    let remote_help = run_canvex(dir.path(), &["remote", "--help"])?;
    assert!(remote_help.contains("Usage: canvex remote"));
    assert!(remote_help.contains("set"));
    assert!(remote_help.contains("clear"));
    Ok(())
}

#[test]
fn remote_config_round_trips_through_the_cache() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = dir.path().join("cache");

    run_canvex(&cache, &["init"])?;
    run_canvex(&cache, &["remote", "set", "--url", "http://127.0.0.1:9/api/excalidraw/"])?;
    let shown: serde_json::Value =
        serde_json::from_str(&run_canvex(&cache, &["remote", "show", "--json"])?)?;
    assert_eq!(shown["base_url"], "http://127.0.0.1:9/api/excalidraw");
    assert!(shown.get("token").is_none());

    run_canvex(&cache, &["remote", "clear"])?;
    let cleared = run_canvex(&cache, &["remote", "show"])?;
    assert!(cleared.contains("No remote configured"));
    Ok(())
}

#[test]
fn pushed_document_is_listed_by_the_server() -> Result<()> {
    let guard = common::spawn_devserver()?;
    let dir = tempfile::tempdir()?;
    let cache = dir.path().join("cache");
    let api = guard.api_url();

    let file = dir.path().join("board.json");
    std::fs::write(
        &file,
        serde_json::to_vec(&common::scene_json(json!([{
            "id": "r1", "type": "rectangle", "x": 0, "y": 0, "width": 10, "height": 10,
            "version": 1, "versionNonce": 1, "isDeleted": false, "groupIds": []
        }])))?,
    )?;

    let pushed = run_canvex(
        &cache,
        &["--base-url", &api, "push", "--title", "Board", file.to_str().context("utf-8 path")?],
    )?;
    let mut parts = pushed.split_whitespace();
    let id = parts.next().context("scene id")?.to_string();
    assert_eq!(parts.next(), Some("Saved"));

    let listed = run_canvex(&cache, &["--base-url", &api, "scenes"])?;
    assert!(listed.lines().any(|l| l.starts_with(&id) && l.ends_with("Board")));

    let opened = run_canvex(&cache, &["--base-url", &api, "open", &id])?;
    assert!(opened.contains("elements: 1"));
    Ok(())
}
