use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod cli_exec;
mod cli_runtime;
mod cli_subcommands;

use self::cli_subcommands::RemoteCommands;

#[derive(Parser)]
#[command(name = "canvex")]
#[command(about = "Local-first sync for canvas workspaces", long_about = None)]
pub(crate) struct Cli {
    /// Cache directory holding config.json and the per-scene entries
    #[arg(long, global = true, default_value = ".canvex")]
    cache_dir: PathBuf,

    /// Override the configured remote base url (e.g. http://host/api/excalidraw)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Override the configured workspace namespace
    #[arg(long, global = true)]
    workspace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Create the cache directory with a default config
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Configure or show the remote
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },

    /// List remote scenes
    Scenes {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Select a scene, reconcile it with the cache and recover its jobs
    Open {
        scene_id: String,
        /// Print the document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace a scene's document with the contents of a JSON file and save it
    Push {
        /// Scene id; omit to save into a new draft
        #[arg(long)]
        scene: Option<String>,
        /// Title for a new draft
        #[arg(long, default_value = "Untitled")]
        title: String,
        file: PathBuf,
    },

    /// Rename a scene
    Rename { scene_id: String, title: String },

    /// Delete a scene and its cache entries
    Delete { scene_id: String },

    /// Send a chat message and apply the streamed answer
    Chat {
        scene_id: String,
        message: String,
    },

    /// Show a scene's chat history
    History {
        scene_id: String,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit an image with a prompt (or cut out its background)
    ImageEdit {
        scene_id: String,
        /// Source image file
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        prompt: Option<String>,
        /// Remove the background instead of editing
        #[arg(long)]
        cutout: bool,
        #[arg(long)]
        size: Option<String>,
        /// Number of images (1, 2 or 4)
        #[arg(long, default_value_t = 1)]
        count: u8,
        /// Ids of the elements the edit was made from
        #[arg(long = "element")]
        elements: Vec<String>,
    },

    /// Generate a video
    Video {
        scene_id: String,
        #[arg(long)]
        prompt: String,
        /// Reference image urls
        #[arg(long = "image-url")]
        image_urls: Vec<String>,
        #[arg(long)]
        duration: Option<u32>,
        #[arg(long)]
        aspect_ratio: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Ids of the elements the video was made from
        #[arg(long = "element")]
        elements: Vec<String>,
    },

    /// Resume or apply the scene's outstanding jobs and wait for them
    Recover { scene_id: String },
}

#[tokio::main]
async fn main() {
    cli_runtime::init_tracing();
    if let Err(err) = cli_runtime::run().await {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
