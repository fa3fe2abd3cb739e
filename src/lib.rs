use clap::Parser;
use std::path::PathBuf;

pub mod app;
pub mod config;
pub mod gallery;
pub mod scanner;
pub mod thumbs;
pub mod wallpaper;

pub use app::WallgridApp;
pub use config::{Config, ResizeMode};
pub use gallery::{GalleryModel, MediaEntry, ThumbState};
pub use scanner::{MediaKind, ScanEvent};
pub use thumbs::{ThumbnailCache, ThumbnailJob, ThumbnailPool, ThumbnailUpdate};
pub use wallpaper::ApplyRequest;

#[derive(Debug, thiserror::Error)]
pub enum WallgridError {
    #[error("Failed to create thread pool: {0}")]
    ThreadPoolCreation(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to create thumbnail cache directory: {0}")]
    CacheDirectoryCreation(#[from] std::io::Error),

    #[error("Failed to generate thumbnail for {path}: {reason}")]
    ThumbnailGeneration { path: PathBuf, reason: String },

    #[error("Failed to save wallpaper state: {0}")]
    SaveState(std::io::Error),

    #[error("Failed to save configuration: {0}")]
    SaveConfig(String),

    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    #[error("File not found: {0}")]
    MissingFile(PathBuf),
}

pub type Result<T> = std::result::Result<T, WallgridError>;

pub const APP_TITLE: &str = "Wallgrid";
pub const DEFAULT_THUMB_WORKERS: usize = 2;
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 180;

#[derive(Parser, Clone)]
#[command(name = "wallgrid")]
#[command(about = "Browse a wallpaper directory and apply images or videos as the desktop background")]
pub struct Args {
    #[arg(short, long, help = "Directory to browse (default: last applied wallpaper's directory)")]
    pub directory: Option<PathBuf>,

    #[arg(short, long, default_value_t = DEFAULT_THUMBNAIL_WIDTH)]
    pub thumbnail_size: u32,

    #[arg(short = 'w', long, default_value_t = DEFAULT_THUMB_WORKERS)]
    pub thumb_workers: usize,

    #[arg(long, help = "Cache directory for video thumbnails and config")]
    pub cache_dir: Option<PathBuf>,

    #[arg(short, long, help = "Apply with `COMMAND <path>` instead of the built-in backends")]
    pub command: Option<String>,

    #[arg(long, help = "Enable debug output")]
    pub debug: bool,
}

impl Args {
    // Thumbnail cells keep a 3:2 box; the pool decodes into it and the grid
    // allocates it.
    pub fn thumbnail_height(&self) -> u32 {
        (self.thumbnail_size * 2 / 3).max(1)
    }

    pub fn worker_count(&self) -> usize {
        self.thumb_workers.clamp(1, num_cpus::get())
    }
}
