use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

use eframe::egui;

use crate::config::{Config, ResizeMode};
use crate::gallery::{GalleryModel, ThumbState};
use crate::scanner::{self, MediaKind, ScanEvent};
use crate::thumbs::{self, ThumbnailCache, ThumbnailPool};
use crate::wallpaper::{self, ApplyRequest};
use crate::{Args, Result, APP_TITLE};

pub struct WallgridApp {
    pub args: Args,
    pub config: Config,
    pub config_path: PathBuf,
    pub state_file: PathBuf,
    pub model: GalleryModel,
    pub pool: ThumbnailPool,
    pub scan_sender: Sender<ScanEvent>,
    pub scan_receiver: Receiver<ScanEvent>,
    pub current_dir: PathBuf,
    pub search_text: String,
    pub status: Option<String>,
    pub prefs_open: bool,
    pub prefs_draft: Config,
}

#[derive(Clone)]
struct CellView {
    id: u64,
    name: String,
    kind: MediaKind,
    state: ThumbState,
    selected: bool,
    texture: Option<egui::TextureHandle>,
}

impl WallgridApp {
    pub fn new(cc: &eframe::CreationContext<'_>, args: Args) -> Result<Self> {
        let cache_dir = args
            .cache_dir
            .clone()
            .unwrap_or_else(thumbs::default_cache_dir);
        let cache = ThumbnailCache::new(cache_dir.clone())?;
        let pool = ThumbnailPool::new(
            cache,
            args.worker_count(),
            args.thumbnail_size,
            args.thumbnail_height(),
        )?;

        let config_path = cache_dir.join("config.json");
        let config = Config::load(&config_path);
        let state_file = wallpaper::default_state_file();

        // Start where the last applied wallpaper lives, unless told otherwise
        let start_dir = args
            .directory
            .clone()
            .or_else(|| {
                wallpaper::restore(&state_file)
                    .and_then(|p| p.parent().map(|d| d.to_path_buf()))
            })
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        apply_theme(&cc.egui_ctx, &config.theme);

        let (scan_sender, scan_receiver) = std::sync::mpsc::channel();
        let mut app = Self {
            args,
            prefs_draft: config.clone(),
            config,
            config_path,
            state_file,
            model: GalleryModel::new(),
            pool,
            scan_sender,
            scan_receiver,
            current_dir: start_dir.clone(),
            search_text: String::new(),
            status: None,
            prefs_open: false,
        };
        app.load_directory(start_dir);
        Ok(app)
    }

    pub fn load_directory(&mut self, directory: PathBuf) {
        match self.model.begin_load(&directory) {
            Some(generation) => {
                self.pool.discard_stale(generation);
                self.current_dir = directory.clone();
                self.status = None;
                // Detached; a superseded scan stops itself via the generation
                let _ = scanner::spawn_scan(
                    directory,
                    generation,
                    self.model.generation_handle(),
                    self.scan_sender.clone(),
                );
            }
            None => {
                self.status = Some(format!("Not a directory: {}", directory.display()));
            }
        }
    }

    pub fn drain_scan_events(&mut self) {
        while let Ok(event) = self.scan_receiver.try_recv() {
            if let Some(job) = self.model.apply_scan_event(event) {
                self.pool.enqueue(job);
            }
        }
    }

    pub fn drain_thumbnail_results(&mut self, ctx: &egui::Context) {
        while let Some(update) = self.pool.try_recv() {
            self.model.apply_thumbnail(ctx, update);
        }
    }

    /// Double-activation: selects the entry and hands back the apply request
    /// for it, built with the configured resize mode.
    pub fn handle_activation(&mut self, id: u64) -> Option<ApplyRequest> {
        self.model.select(id);
        let entry = self.model.entry(id)?;
        Some(ApplyRequest {
            path: entry.path.clone(),
            kind: entry.kind,
            resize: self.config.default_resize,
        })
    }

    pub fn execute_apply(&mut self, request: ApplyRequest) {
        let result = match &self.args.command {
            Some(command) => wallpaper::apply_with_command(command, &request.path),
            None => wallpaper::apply(&request),
        };

        match result {
            Ok(()) => {
                if let Err(e) = wallpaper::save_current(&self.state_file, &request.path) {
                    log::warn!("{}", e);
                }
                let name = request
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| request.path.display().to_string());
                self.status = Some(format!("Applied {}", name));
            }
            Err(e) => {
                log::error!("{}", e);
                self.status = Some(format!("Apply failed: {}", e));
            }
        }
    }

    fn apply_selected(&mut self) {
        let request = self.model.selected_entry().map(|entry| ApplyRequest {
            path: entry.path.clone(),
            kind: entry.kind,
            resize: self.config.default_resize,
        });
        if let Some(request) = request {
            self.execute_apply(request);
        }
    }

    fn header_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading(APP_TITLE);
            ui.separator();

            let search_width = (ui.available_width() - 220.0).max(120.0);
            let response = ui.add_sized(
                [search_width, ui.spacing().interact_size.y],
                egui::TextEdit::singleline(&mut self.search_text)
                    .hint_text("Search wallpapers..."),
            );
            if response.changed() {
                self.model.set_filter(&self.search_text);
            }

            if ui.button("Open Folder").clicked() {
                if let Some(directory) = rfd::FileDialog::new()
                    .set_directory(&self.current_dir)
                    .pick_folder()
                {
                    self.load_directory(directory);
                }
            }
            if ui.button("Preferences").clicked() {
                self.prefs_draft = self.config.clone();
                self.prefs_open = true;
            }
        });
    }

    fn gallery_ui(&mut self, ui: &mut egui::Ui) {
        if self.model.is_scanning() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Scanning...");
            });
        }

        if self.model.is_empty() {
            if !self.model.is_scanning() {
                ui.centered_and_justified(|ui| {
                    ui.label("No wallpapers found");
                });
            }
            return;
        }
        if self.model.visible_count() == 0 {
            ui.centered_and_justified(|ui| {
                ui.label("No wallpapers match the search");
            });
            return;
        }

        let cell_width = self.args.thumbnail_size as f32;
        let cell_height = self.args.thumbnail_height() as f32;

        // Snapshot the visible entries so the model stays free for mutation
        let cells: Vec<CellView> = self
            .model
            .entries()
            .iter()
            .filter(|e| e.visible)
            .map(|e| CellView {
                id: e.id,
                name: e.display_name.clone(),
                kind: e.kind,
                state: e.thumb_state,
                selected: e.selected,
                texture: e.texture.clone(),
            })
            .collect();

        let mut clicked: Option<u64> = None;
        let mut activated: Option<u64> = None;

        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.horizontal_wrapped(|ui| {
                for cell in &cells {
                    let response = media_cell(ui, cell, cell_width, cell_height);
                    if response.double_clicked() {
                        activated = Some(cell.id);
                    } else if response.clicked() {
                        clicked = Some(cell.id);
                    }
                }
            });
        });

        if let Some(id) = activated {
            if let Some(request) = self.handle_activation(id) {
                self.execute_apply(request);
            }
        } else if let Some(id) = clicked {
            self.model.select(id);
        }
    }

    fn footer_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let can_apply = self.model.selected_entry().is_some();
            if ui
                .add_enabled(can_apply, egui::Button::new("Apply Wallpaper"))
                .clicked()
            {
                self.apply_selected();
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if let Some(status) = &self.status {
                    ui.label(status.as_str());
                }
                let pending = self.pool.pending();
                if pending > 0 {
                    ui.label(format!("{} thumbnails pending", pending));
                }
                if !self.model.filter().is_empty() {
                    ui.label(format!(
                        "{} of {} shown",
                        self.model.visible_count(),
                        self.model.len()
                    ));
                }
            });
        });
    }

    fn preferences_window(&mut self, ctx: &egui::Context) {
        if !self.prefs_open {
            return;
        }

        let mut open = self.prefs_open;
        let mut save_clicked = false;
        let mut cancel_clicked = false;

        egui::Window::new("Preferences")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                egui::ComboBox::from_label("Resize mode")
                    .selected_text(self.prefs_draft.default_resize.to_string())
                    .show_ui(ui, |ui| {
                        for mode in ResizeMode::ALL {
                            ui.selectable_value(
                                &mut self.prefs_draft.default_resize,
                                mode,
                                mode.as_str(),
                            );
                        }
                    });

                egui::ComboBox::from_label("Theme")
                    .selected_text(self.prefs_draft.theme.clone())
                    .show_ui(ui, |ui| {
                        for theme in ["dark", "light"] {
                            ui.selectable_value(
                                &mut self.prefs_draft.theme,
                                theme.to_owned(),
                                theme,
                            );
                        }
                    });

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        save_clicked = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancel_clicked = true;
                    }
                });
            });

        if save_clicked {
            self.config = self.prefs_draft.clone();
            if let Err(e) = self.config.save(&self.config_path) {
                log::error!("{}", e);
                self.status = Some(format!("Could not save preferences: {}", e));
            }
            apply_theme(ctx, &self.config.theme);
            open = false;
        }
        if cancel_clicked {
            open = false;
        }
        self.prefs_open = open;
    }
}

impl eframe::App for WallgridApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_scan_events();
        self.drain_thumbnail_results(ctx);

        egui::TopBottomPanel::top("header").show(ctx, |ui| self.header_ui(ui));
        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| self.footer_ui(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.gallery_ui(ui));
        self.preferences_window(ctx);

        if self.model.is_scanning() || self.pool.pending() > 0 {
            ctx.request_repaint();
        } else {
            // Periodic pass picks up any channel message that arrived after
            // this frame's drain
            ctx.request_repaint_after(Duration::from_millis(500));
        }
    }
}

fn media_cell(ui: &mut egui::Ui, cell: &CellView, width: f32, height: f32) -> egui::Response {
    ui.vertical(|ui| {
        ui.set_width(width);

        let response = match &cell.texture {
            Some(texture) => {
                let image =
                    egui::Image::new(texture).fit_to_exact_size(egui::vec2(width, height));
                ui.add(egui::ImageButton::new(image).frame(true).selected(cell.selected))
            }
            None => {
                let (rect, response) =
                    ui.allocate_exact_size(egui::vec2(width, height), egui::Sense::click());
                ui.painter()
                    .rect_filled(rect, egui::Rounding::same(5.0), egui::Color32::from_gray(45));

                let text = match (cell.state, cell.kind) {
                    (ThumbState::Failed, _) => "No preview",
                    (_, MediaKind::Video) => "▶",
                    (_, MediaKind::Image) => "Loading...",
                };
                ui.painter().text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    text,
                    egui::FontId::default(),
                    egui::Color32::LIGHT_GRAY,
                );
                if cell.selected {
                    ui.painter().rect_stroke(
                        rect,
                        egui::Rounding::same(5.0),
                        egui::Stroke::new(2.0, ui.visuals().selection.bg_fill),
                    );
                }
                response
            }
        };

        ui.label(egui::RichText::new(truncate_name(&cell.name, 22)).small());
        response.on_hover_text(&cell.name)
    })
    .inner
}

pub fn apply_theme(ctx: &egui::Context, theme: &str) {
    if theme.eq_ignore_ascii_case("light") {
        ctx.set_visuals(egui::Visuals::light());
    } else {
        ctx.set_visuals(egui::Visuals::dark());
    }
}

fn truncate_name(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_owned();
    }
    let prefix: String = name.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", prefix)
}
