use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use walkdir::WalkDir;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov"];

// Everything past this position is sorted by mtime (newest first) before
// being emitted; the first chunk goes out in raw directory order.
pub const HEAD_BATCH_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if IMAGE_EXTENSIONS.iter().any(|valid| valid.eq_ignore_ascii_case(ext)) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.iter().any(|valid| valid.eq_ignore_ascii_case(ext)) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}

pub fn is_supported_media(path: &Path) -> bool {
    MediaKind::from_path(path).is_some()
}

#[derive(Debug, Clone)]
pub enum ScanEvent {
    Entry {
        generation: u64,
        path: PathBuf,
        kind: MediaKind,
    },
    Finished {
        generation: u64,
    },
}

impl ScanEvent {
    pub fn generation(&self) -> u64 {
        match self {
            ScanEvent::Entry { generation, .. } | ScanEvent::Finished { generation } => *generation,
        }
    }
}

/// Lists `directory` on a detached thread, emitting generation-tagged events
/// over `sender`. The worker stops early once `live_generation` has moved
/// past its own `generation`.
pub fn spawn_scan(
    directory: PathBuf,
    generation: u64,
    live_generation: Arc<AtomicU64>,
    sender: Sender<ScanEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        scan_worker(&directory, generation, &live_generation, &sender);
    })
}

fn scan_worker(
    directory: &Path,
    generation: u64,
    live_generation: &AtomicU64,
    sender: &Sender<ScanEvent>,
) {
    let superseded = || live_generation.load(Ordering::Relaxed) != generation;

    // Single-level listing; unsupported extensions are skipped entirely
    let mut head: Vec<(PathBuf, MediaKind)> = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if let Some(kind) = MediaKind::from_path(entry.path()) {
            head.push((entry.path().to_path_buf(), kind));
        }
    }

    let tail = if head.len() > HEAD_BATCH_LEN {
        head.split_off(HEAD_BATCH_LEN)
    } else {
        Vec::new()
    };

    for (path, kind) in head {
        if superseded() {
            log::debug!("Scan of {:?} superseded, stopping", directory);
            return;
        }
        if sender
            .send(ScanEvent::Entry {
                generation,
                path,
                kind,
            })
            .is_err()
        {
            return;
        }
    }

    if superseded() {
        log::debug!("Scan of {:?} superseded, stopping", directory);
        return;
    }

    let mut tail: Vec<(PathBuf, MediaKind, SystemTime)> = tail
        .into_iter()
        .map(|(path, kind)| {
            let mtime = modified_time(&path);
            (path, kind, mtime)
        })
        .collect();
    tail.sort_by(|a, b| b.2.cmp(&a.2));

    for (path, kind, _) in tail {
        if superseded() {
            log::debug!("Scan of {:?} superseded, stopping", directory);
            return;
        }
        if sender
            .send(ScanEvent::Entry {
                generation,
                path,
                kind,
            })
            .is_err()
        {
            return;
        }
    }

    let _ = sender.send(ScanEvent::Finished { generation });
}

pub fn modified_time(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
