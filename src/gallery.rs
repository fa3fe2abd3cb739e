use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use eframe::egui;

use crate::scanner::{MediaKind, ScanEvent};
use crate::thumbs::{ThumbnailJob, ThumbnailUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbState {
    Pending,
    Ready,
    Failed,
}

#[derive(Clone)]
pub struct MediaEntry {
    pub id: u64,
    pub path: PathBuf,
    pub display_name: String,
    pub kind: MediaKind,
    pub texture: Option<egui::TextureHandle>,
    pub thumb_state: ThumbState,
    pub selected: bool,
    pub visible: bool,
}

/// Owns the gallery collection. Everything here runs on the UI thread; the
/// only cross-thread state is the generation counter handed to scanners and
/// the pool. Stale asynchronous results are rejected by the generation check
/// at the top of `apply_scan_event` and `apply_thumbnail`.
pub struct GalleryModel {
    entries: Vec<MediaEntry>,
    index: HashMap<u64, usize>,
    generation: Arc<AtomicU64>,
    scanning: bool,
    filter: String,
    selected: Option<u64>,
    next_entry_id: u64,
}

impl GalleryModel {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            generation: Arc::new(AtomicU64::new(0)),
            scanning: false,
            filter: String::new(),
            selected: None,
            next_entry_id: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    pub fn generation_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.generation)
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn entries(&self) -> &[MediaEntry] {
        &self.entries
    }

    pub fn entry(&self, id: u64) -> Option<&MediaEntry> {
        self.index.get(&id).map(|&slot| &self.entries[slot])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn visible_count(&self) -> usize {
        self.entries.iter().filter(|e| e.visible).count()
    }

    /// Starts a new load: clears the collection, bumps the generation and
    /// enters the scanning state. Returns the new generation, or `None` when
    /// `directory` is not a directory (the gallery is left untouched).
    pub fn begin_load(&mut self, directory: &Path) -> Option<u64> {
        if !directory.is_dir() {
            log::warn!("Cannot load {:?}: not a directory", directory);
            return None;
        }

        self.entries.clear();
        self.index.clear();
        self.selected = None;
        self.scanning = true;
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!("Loading {:?} as generation {}", directory, generation);
        Some(generation)
    }

    /// Applies one scanner event. A yielded path becomes a placeholder entry
    /// and the job to enqueue for it; `Finished` leaves the scanning state.
    /// Events from a superseded load are dropped.
    pub fn apply_scan_event(&mut self, event: ScanEvent) -> Option<ThumbnailJob> {
        if event.generation() != self.generation() {
            log::debug!("Ignoring scan event from superseded load");
            return None;
        }

        match event {
            ScanEvent::Entry {
                generation,
                path,
                kind,
            } => {
                let id = self.next_entry_id;
                self.next_entry_id += 1;

                let display_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.to_string_lossy().into_owned());
                let visible = Self::matches_filter(&self.filter, &display_name);

                self.index.insert(id, self.entries.len());
                self.entries.push(MediaEntry {
                    id,
                    path: path.clone(),
                    display_name,
                    kind,
                    texture: None,
                    thumb_state: ThumbState::Pending,
                    selected: false,
                    visible,
                });

                Some(ThumbnailJob {
                    entry_id: id,
                    generation,
                    path,
                    kind,
                })
            }
            ScanEvent::Finished { .. } => {
                self.scanning = false;
                None
            }
        }
    }

    /// Applies one pool completion to its entry's slot. Only the visual state
    /// changes, never the membership. Returns false for dropped (stale or
    /// unknown-entry) updates.
    pub fn apply_thumbnail(&mut self, ctx: &egui::Context, update: ThumbnailUpdate) -> bool {
        if update.generation != self.generation() {
            log::debug!("Ignoring thumbnail result from superseded load");
            return false;
        }
        let Some(&slot) = self.index.get(&update.entry_id) else {
            return false;
        };

        let entry = &mut self.entries[slot];
        match update.image {
            Some(image) => {
                let texture = ctx.load_texture(
                    format!("thumb-{}", entry.id),
                    image,
                    egui::TextureOptions::default(),
                );
                entry.texture = Some(texture);
                entry.thumb_state = ThumbState::Ready;
            }
            None => entry.thumb_state = ThumbState::Failed,
        }
        true
    }

    // At most one entry carries the selected flag; re-selecting it is a no-op.
    pub fn select(&mut self, id: u64) {
        if self.selected == Some(id) || !self.index.contains_key(&id) {
            return;
        }

        if let Some(previous) = self.selected.take() {
            if let Some(&slot) = self.index.get(&previous) {
                self.entries[slot].selected = false;
            }
        }
        if let Some(&slot) = self.index.get(&id) {
            self.entries[slot].selected = true;
            self.selected = Some(id);
        }
    }

    pub fn selected_entry(&self) -> Option<&MediaEntry> {
        self.selected.and_then(|id| self.entry(id))
    }

    /// Normalizes the query and recomputes visibility for every entry.
    /// Filtering never removes entries; clearing the query restores them all.
    pub fn set_filter(&mut self, text: &str) {
        self.filter = text.trim().to_lowercase();
        for entry in &mut self.entries {
            entry.visible = Self::matches_filter(&self.filter, &entry.display_name);
        }
    }

    fn matches_filter(filter: &str, display_name: &str) -> bool {
        filter.is_empty() || display_name.to_lowercase().contains(filter)
    }
}

impl Default for GalleryModel {
    fn default() -> Self {
        Self::new()
    }
}
