use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eframe::egui;
use image::imageops::FilterType;

use crate::scanner::{modified_time, MediaKind};
use crate::{Result, WallgridError};

#[derive(Debug, Clone)]
pub struct ThumbnailJob {
    pub entry_id: u64,
    pub generation: u64,
    pub path: PathBuf,
    pub kind: MediaKind,
}

pub struct ThumbnailUpdate {
    pub entry_id: u64,
    pub generation: u64,
    pub image: Option<egui::ColorImage>,
}

pub fn default_cache_dir() -> PathBuf {
    let cache_home = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(|| PathBuf::from(".cache"));
    cache_home.join("wallgrid")
}

#[derive(Clone)]
pub struct ThumbnailCache {
    cache_dir: PathBuf,
    ffmpeg: String,
}

impl ThumbnailCache {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&cache_dir).map_err(WallgridError::CacheDirectoryCreation)?;
        Ok(Self {
            cache_dir,
            ffmpeg: "ffmpeg".to_owned(),
        })
    }

    pub fn with_ffmpeg(mut self, program: impl Into<String>) -> Self {
        self.ffmpeg = program.into();
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_path_for(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "thumb".to_owned());
        self.cache_dir.join(format!("{}_thumb.png", stem))
    }

    /// Maps a media file to the path that should be decoded for display:
    /// images pass through unchanged, videos go via the on-disk frame cache.
    pub fn resolve(&self, path: &Path, kind: MediaKind) -> Result<PathBuf> {
        match kind {
            MediaKind::Image => Ok(path.to_path_buf()),
            MediaKind::Video => {
                let cache_path = self.cache_path_for(path);
                if cache_is_stale(path, &cache_path) {
                    extract_frame(&self.ffmpeg, path, &cache_path)?;
                }
                Ok(cache_path)
            }
        }
    }
}

// mtime ordering only; a source rewritten within the same mtime tick keeps
// serving the old frame.
pub fn cache_is_stale(source: &Path, cache_path: &Path) -> bool {
    if !cache_path.exists() {
        return true;
    }
    modified_time(cache_path) < modified_time(source)
}

fn extract_frame(ffmpeg: &str, source: &Path, dest: &Path) -> Result<()> {
    let status = Command::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(source)
        .args(["-vf", "thumbnail,scale=320:-1", "-frames:v", "1"])
        .arg(dest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| WallgridError::ThumbnailGeneration {
            path: source.to_path_buf(),
            reason: format!("{}: {}", ffmpeg, e),
        })?;

    if !status.success() {
        return Err(WallgridError::ThumbnailGeneration {
            path: source.to_path_buf(),
            reason: format!("{} exited with {}", ffmpeg, status),
        });
    }
    if !dest.exists() {
        return Err(WallgridError::ThumbnailGeneration {
            path: source.to_path_buf(),
            reason: "no frame was produced".to_owned(),
        });
    }
    Ok(())
}

pub fn decode_scaled(path: &Path, max_width: u32, max_height: u32) -> Result<egui::ColorImage> {
    let reader = image::io::Reader::open(path)
        .map_err(|e| thumb_error(path, e.to_string()))?
        .with_guessed_format()
        .map_err(|e| thumb_error(path, e.to_string()))?;

    let img = reader
        .decode()
        .map_err(|e| thumb_error(path, e.to_string()))?;
    let (width, height) = (img.width(), img.height());

    if width <= max_width && height <= max_height {
        return color_image(path, img);
    }

    // Staged downscale: very large sources get a coarse nearest-neighbor pass
    // before the quality filter
    let scale_factor = (width as f32 / max_width as f32).max(height as f32 / max_height as f32);
    let scaled = if scale_factor > 8.0 {
        img.resize(max_width * 4, max_height * 4, FilterType::Nearest)
            .resize(max_width, max_height, FilterType::Triangle)
    } else if scale_factor > 4.0 {
        img.resize(max_width * 2, max_height * 2, FilterType::Nearest)
            .resize(max_width, max_height, FilterType::Triangle)
    } else {
        img.resize(max_width, max_height, FilterType::Triangle)
    };
    color_image(path, scaled)
}

fn color_image(path: &Path, img: image::DynamicImage) -> Result<egui::ColorImage> {
    let rgba = img.to_rgba8();
    let (width, height) = (img.width() as usize, img.height() as usize);
    let raw = rgba.as_raw();

    if raw.len() != width * height * 4 {
        return Err(thumb_error(path, "unexpected pixel buffer length".to_owned()));
    }

    Ok(egui::ColorImage::from_rgba_unmultiplied(
        [width, height],
        raw,
    ))
}

fn thumb_error(path: &Path, reason: String) -> WallgridError {
    WallgridError::ThumbnailGeneration {
        path: path.to_path_buf(),
        reason,
    }
}

/// Bounded-width thumbnail pool: a FIFO queue plus an active-worker counter
/// under one mutex. Jobs execute on a rayon pool; completions come back as
/// [`ThumbnailUpdate`] messages and each completion starts the next queued
/// job, so the queue drains without external polling.
pub struct ThumbnailPool {
    shared: Arc<PoolShared>,
    results: Receiver<ThumbnailUpdate>,
}

struct PoolShared {
    state: Mutex<PoolState>,
    max_workers: usize,
    cache: ThumbnailCache,
    thumb_width: u32,
    thumb_height: u32,
    sender: Sender<ThumbnailUpdate>,
    workers: rayon::ThreadPool,
}

struct PoolState {
    queue: VecDeque<ThumbnailJob>,
    active: usize,
    live_generation: u64,
}

impl ThumbnailPool {
    pub fn new(
        cache: ThumbnailCache,
        max_workers: usize,
        thumb_width: u32,
        thumb_height: u32,
    ) -> Result<Self> {
        let max_workers = max_workers.max(1);
        let (sender, results) = std::sync::mpsc::channel();
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(max_workers)
            .build()?;

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                active: 0,
                live_generation: 0,
            }),
            max_workers,
            cache,
            thumb_width,
            thumb_height,
            sender,
            workers,
        });
        Ok(Self { shared, results })
    }

    pub fn enqueue(&self, job: ThumbnailJob) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.queue.push_back(job);
        }
        Self::pump(&self.shared);
    }

    /// Marks `generation` as the only live one and drops queued jobs from
    /// older loads. In-flight jobs finish; their results are discarded by the
    /// model's generation check.
    pub fn discard_stale(&self, generation: u64) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.live_generation = generation;
            state.queue.retain(|job| job.generation == generation);
        }
    }

    pub fn try_recv(&self) -> Option<ThumbnailUpdate> {
        self.results.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ThumbnailUpdate> {
        self.results.recv_timeout(timeout).ok()
    }

    pub fn active_jobs(&self) -> usize {
        self.shared.state.lock().map(|s| s.active).unwrap_or(0)
    }

    pub fn queued_jobs(&self) -> usize {
        self.shared.state.lock().map(|s| s.queue.len()).unwrap_or(0)
    }

    pub fn pending(&self) -> usize {
        self.shared
            .state
            .lock()
            .map(|s| s.active + s.queue.len())
            .unwrap_or(0)
    }

    // Starts queued jobs until the worker bound is reached. Called after
    // every enqueue and every completion; `active` only moves under the lock,
    // so the bound holds.
    fn pump(shared: &Arc<PoolShared>) {
        loop {
            let job = {
                let Ok(mut state) = shared.state.lock() else {
                    return;
                };
                if state.active >= shared.max_workers {
                    return;
                }
                let job = loop {
                    match state.queue.pop_front() {
                        Some(job) if job.generation == state.live_generation => break job,
                        Some(stale) => {
                            log::debug!(
                                "Dropping queued thumbnail job for {:?} (superseded load)",
                                stale.path
                            );
                        }
                        None => return,
                    }
                };
                state.active += 1;
                job
            };

            let worker = Arc::clone(shared);
            shared.workers.spawn(move || {
                let image = match produce_thumbnail(
                    &worker.cache,
                    &job,
                    worker.thumb_width,
                    worker.thumb_height,
                ) {
                    Ok(image) => Some(image),
                    Err(e) => {
                        log::warn!("{}", e);
                        None
                    }
                };
                let _ = worker.sender.send(ThumbnailUpdate {
                    entry_id: job.entry_id,
                    generation: job.generation,
                    image,
                });
                if let Ok(mut state) = worker.state.lock() {
                    state.active -= 1;
                }
                Self::pump(&worker);
            });
        }
    }
}

fn produce_thumbnail(
    cache: &ThumbnailCache,
    job: &ThumbnailJob,
    width: u32,
    height: u32,
) -> Result<egui::ColorImage> {
    let source = cache.resolve(&job.path, job.kind)?;
    decode_scaled(&source, width, height)
}
