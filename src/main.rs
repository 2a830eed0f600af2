use clap::Parser;
use log::info;
use mindmap_editor::config::EditorConfig;
use mindmap_editor::store::FileStore;
use mindmap_editor::{run_app, AppServices};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "mindmap", version, about = "Keyboard-driven mindmap editor")]
struct Args {
    /// Directory holding documents and snapshots (overrides the config file)
    #[arg(short = 's', long = "store")]
    store: Option<PathBuf>,

    /// Editor configuration JSON file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Open this document id instead of the library
    #[arg(short = 'o', long = "open")]
    open: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up logging for development
    env_logger::init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };
    if let Some(dir) = args.store {
        config.store_dir = dir;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let store = Arc::new(FileStore::open(&config.store_dir)?);
    info!("Using document store at {}", config.store_dir.display());

    let services = AppServices {
        store,
        runtime: runtime.handle().clone(),
        config,
    };
    run_app(services, args.open)?;
    Ok(())
}
