use anyhow::{Context, Result};

use canvex::model::{Rect, SceneData, SceneId, SceneKey};
use canvex::pins::placeholders;
use canvex::remote::{ImageEditRequest, VideoRequest};
use canvex::store::LocalCache;
use canvex::workspace::Workspace;

use crate::cli_runtime::{effective_config, open_workspace, wait_for_jobs};
use crate::{Cli, Commands, RemoteCommands};

pub(crate) async fn handle_command(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Init { force } => {
            LocalCache::init(&cli.cache_dir, *force)?;
            println!("Initialized canvex cache at {}", cli.cache_dir.display());
        }
        Commands::Remote { command } => handle_remote_command(&cli, command)?,
        Commands::Scenes { json } => {
            let ws = open_workspace(&cli)?;
            let scenes = ws.list_scenes().await?;
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&scenes).context("serialize scenes json")?
                );
            } else {
                for scene in scenes {
                    println!("{} {} {}", scene.id, scene.updated_at, scene.title);
                }
            }
        }
        Commands::Open { scene_id, json } => {
            let ws = open_workspace(&cli)?;
            let key = ws.select_scene(&SceneId(scene_id.clone())).await?;
            print_scene(&ws, &key, *json)?;
            ws.teardown().await;
        }
        Commands::Push { scene, title, file } => {
            let raw = std::fs::read(file).with_context(|| format!("read {}", file.display()))?;
            let value: serde_json::Value =
                serde_json::from_slice(&raw).with_context(|| format!("parse {}", file.display()))?;
            let data = SceneData::from_value_lossy(&value);

            let ws = open_workspace(&cli)?;
            let key = match scene {
                Some(id) => ws.select_scene(&SceneId(id.clone())).await?,
                None => ws.new_draft(title)?,
            };
            ws.record_mutation(&key, data)?;
            let state = ws.flush(&key).await?;
            let id = ws
                .scene(&key)
                .and_then(|s| s.id)
                .map(|id| id.to_string())
                .unwrap_or_else(|| "draft".to_string());
            println!("{} {:?}", id, state);
            ws.teardown().await;
        }
        Commands::Rename { scene_id, title } => {
            let ws = open_workspace(&cli)?;
            let key = ws.select_scene(&SceneId(scene_id.clone())).await?;
            ws.rename_scene(&key, title).await?;
            ws.teardown().await;
            println!("Renamed {}", scene_id);
        }
        Commands::Delete { scene_id } => {
            let ws = open_workspace(&cli)?;
            ws.delete_scene(&SceneId(scene_id.clone())).await?;
            println!("Deleted {}", scene_id);
        }
        Commands::Chat { scene_id, message } => {
            let ws = open_workspace(&cli)?;
            let key = ws.select_scene(&SceneId(scene_id.clone())).await?;
            let reply = ws.send_chat(&key, message).await?;
            println!("{}", reply.content);
            ws.teardown().await;
        }
        Commands::History { scene_id, json } => {
            let ws = open_workspace(&cli)?;
            let key = ws.select_scene(&SceneId(scene_id.clone())).await?;
            let log = ws.chat_log(&key);
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&log).context("serialize chat json")?
                );
            } else {
                for msg in log {
                    println!("[{:?}] {}", msg.role, msg.content);
                }
            }
            ws.teardown().await;
        }
        Commands::ImageEdit {
            scene_id,
            image,
            prompt,
            cutout,
            size,
            count,
            elements,
        } => {
            if prompt.is_none() && !cutout {
                anyhow::bail!("pass --prompt or --cutout");
            }
            let bytes = std::fs::read(image).with_context(|| format!("read {}", image.display()))?;
            let file_name = image
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "image.png".to_string());
            let req = ImageEditRequest {
                image: bytes,
                mime_type: mime_for(&file_name).to_string(),
                file_name,
                prompt: prompt.clone(),
                cutout: *cutout,
                size: size.clone(),
                count: *count,
            };

            let ws = open_workspace(&cli)?;
            let key = ws.select_scene(&SceneId(scene_id.clone())).await?;
            let bounds = selection_bounds(&ws, &key, elements);
            let job = ws.submit_image_edit(&key, &req, elements, bounds).await?;
            println!("job {}", job);
            wait_for_jobs(&ws).await;
            ws.teardown().await;
        }
        Commands::Video {
            scene_id,
            prompt,
            image_urls,
            duration,
            aspect_ratio,
            model,
            elements,
        } => {
            let req = VideoRequest {
                prompt: prompt.clone(),
                image_urls: image_urls.clone(),
                duration: *duration,
                aspect_ratio: aspect_ratio.clone(),
                model: model.clone(),
            };

            let ws = open_workspace(&cli)?;
            let key = ws.select_scene(&SceneId(scene_id.clone())).await?;
            let bounds = selection_bounds(&ws, &key, elements);
            let job = ws.submit_video(&key, &req, elements, bounds).await?;
            println!("job {}", job);
            wait_for_jobs(&ws).await;
            ws.teardown().await;
        }
        Commands::Recover { scene_id } => {
            let ws = open_workspace(&cli)?;
            let key = ws.select_scene(&SceneId(scene_id.clone())).await?;
            wait_for_jobs(&ws).await;
            print_scene(&ws, &key, false)?;
            ws.teardown().await;
        }
    }
    Ok(())
}

fn handle_remote_command(cli: &Cli, command: &RemoteCommands) -> Result<()> {
    let cache = LocalCache::open(&cli.cache_dir)?;
    match command {
        RemoteCommands::Show { json } => {
            let cfg = effective_config(cli, &cache)?;
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&cfg.remote).context("serialize remote json")?
                );
            } else if let Some(remote) = cfg.remote {
                println!("url: {}", remote.base_url);
                println!("token: {}", if remote.token.is_some() { "set" } else { "none" });
                println!("workspace: {}", cfg.workspace);
            } else {
                println!("No remote configured");
            }
        }
        RemoteCommands::Set { url, token } => {
            let mut cfg = cache.read_config()?;
            cfg.remote = Some(canvex::model::RemoteConfig {
                base_url: url.trim_end_matches('/').to_string(),
                token: token.clone(),
            });
            cache.write_config(&cfg)?;
            println!("Remote configured");
        }
        RemoteCommands::Clear => {
            let mut cfg = cache.read_config()?;
            cfg.remote = None;
            cache.write_config(&cfg)?;
            println!("Remote cleared");
        }
    }
    Ok(())
}

fn print_scene(ws: &Workspace, key: &SceneKey, json: bool) -> Result<()> {
    let scene = ws
        .scene(key)
        .with_context(|| format!("scene {} is not loaded", key))?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&scene.data.to_value()).context("serialize scene json")?
        );
        return Ok(());
    }
    println!("id: {}", key);
    println!("title: {}", scene.title);
    println!("updated_at: {}", scene.updated_at);
    if let Some(state) = ws.save_state(key) {
        println!("save: {:?}", state);
    }
    println!("elements: {}", scene.data.live_elements().count());
    println!("placeholders: {}", placeholders(&scene.data).len());
    Ok(())
}

// Union of the selected elements, or of the whole drawing when nothing
// selected is found.
fn selection_bounds(ws: &Workspace, key: &SceneKey, ids: &[String]) -> Rect {
    let Some(doc) = ws.document(key) else {
        return Rect::default();
    };
    let selected = doc
        .live_elements()
        .filter(|el| ids.iter().any(|id| *id == el.id))
        .map(|el| el.bounds())
        .reduce(|a, b| a.union(&b));
    selected
        .or_else(|| doc.live_elements().map(|el| el.bounds()).reduce(|a, b| a.union(&b)))
        .unwrap_or_default()
}

fn mime_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/png"
    }
}
