use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, RichText, Sense, Stroke, Vec2, pos2, vec2};

use crate::api::{self, Costs, ParseResponse, UploadOutcome};
use crate::gui::panel::PanelController;
use crate::persistence::settings::AppSettings;
use crate::scene::annotations::{AnnotationStore, Comment};
use crate::scene::catalog::ElementCatalog;
use crate::scene::selection::{SelectionEntry, SelectionManager};
use crate::scene::visibility::VisibilityManager;
use crate::viewer::{self, ViewerCommand};

// Floating panel geometry; anchors are measured in from the viewport's
// top-right corner
const PANEL_WIDTH: f32 = 384.0;
const PANEL_ANCHOR_FROM_RIGHT: f32 = 420.0;
const SELECTION_PANEL_TOP: f32 = 80.0;
const COMMENT_PANEL_TOP: f32 = 16.0;
// Initial window size; also the injected viewport for the default anchors
const INITIAL_WINDOW: Vec2 = vec2(1300.0, 710.0);

const ELEMENT_PREVIEW_LIMIT: usize = 10;
const MARKER_RADIUS: f32 = 7.0;
const FLASH_DURATION: Duration = Duration::from_millis(1500);

// One drawable/clickable element in the viewport stand-in. Express ids are
// assigned per load (1-based catalog order), the way the external viewer
// hands them out per model.
struct ViewportMarker {
    express_id: u64,
    global_id: String,
    name: String,
    type_name: String,
    pos: Pos2,
}

impl ViewportMarker {
    fn selection_entry(&self) -> SelectionEntry {
        SelectionEntry {
            express_id: self.express_id,
            name: self.name.clone(),
            type_name: self.type_name.clone(),
            fragment_id: Some(self.global_id.clone()),
        }
    }
}

// Stable color per element type, chosen from a small distinct palette via hashing.
fn color_for_type(type_name: &str) -> Color32 {
    const PALETTE: [Color32; 12] = [
        Color32::from_rgb(0x7b, 0xa3, 0xff), // blue
        Color32::from_rgb(0xff, 0xa3, 0x7b), // orange
        Color32::from_rgb(0x7b, 0xff, 0xa3), // green
        Color32::from_rgb(0xff, 0x7b, 0xa3), // pink
        Color32::from_rgb(0xa3, 0x7b, 0xff), // violet
        Color32::from_rgb(0xff, 0xe0, 0x7b), // yellow
        Color32::from_rgb(0x7b, 0xff, 0xe0), // teal
        Color32::from_rgb(0xe0, 0x7b, 0xff), // purple
        Color32::from_rgb(0x7b, 0xe0, 0xff), // cyan
        Color32::from_rgb(0xff, 0x7b, 0xe0), // magenta
        Color32::from_rgb(0x9a, 0xcd, 0x32), // yellowgreen
        Color32::from_rgb(0xcd, 0x32, 0x9a), // fuchsia
    ];
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    type_name.hash(&mut hasher);
    let h = hasher.finish() as usize;
    PALETTE[h % PALETTE.len()]
}

fn golden_spiral_position(center: Pos2, k: u32, rect: Rect) -> Pos2 {
    // Golden angle in radians
    let golden_angle = std::f32::consts::TAU * (1.0 - 1.0 / 1.618_033_9);
    let t = k as f32;
    // Use sqrt growth to keep points from flying out too fast
    let base = (rect.size().min_elem() * 0.12).max(20.0);
    let r = base * t.sqrt();
    let theta = t * golden_angle;
    let x = center.x + r * theta.cos();
    let y = center.y + r * theta.sin();
    Pos2::new(x, y)
}

fn format_money(value: f64) -> String {
    let raw = format!("{:.2}", value.abs());
    let (int_part, frac_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

fn format_timestamp(epoch_ms: i64) -> String {
    let fmt = time::macros::format_description!("[day].[month].[year] [hour]:[minute]");
    time::OffsetDateTime::from_unix_timestamp(epoch_ms / 1000)
        .ok()
        .and_then(|t| t.format(fmt).ok())
        .unwrap_or_default()
}

// Advance one panel's drag. The global pointer stream is consulted only on
// frames where the panel is actually dragging, and a release anywhere (or a
// lost button) ends the drag.
fn pump_panel_drag(ctx: &egui::Context, panel: &mut PanelController) {
    if !panel.is_dragging() {
        return;
    }
    let (pointer, released) = ctx.input(|i| {
        (i.pointer.latest_pos(), i.pointer.any_released() || !i.pointer.any_down())
    });
    if let Some(p) = pointer {
        panel.drag_to(p);
    }
    if released {
        panel.end_drag();
    }
    ctx.request_repaint();
}

// Draggable panel header strip: grip, title, close button. Only this strip
// carries drag sense; widgets inside the panel body claim their own pointer
// events, so interacting with contents never starts a drag.
fn panel_header(ui: &mut egui::Ui, id: egui::Id, title: &str, close_requested: &mut bool) -> egui::Response {
    let header = ui.horizontal(|ui| {
        ui.label(RichText::new("⣿").weak());
        ui.strong(title);
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.small_button("✕").clicked() {
                *close_requested = true;
            }
        });
    });
    let strip = Rect::from_x_y_ranges(ui.min_rect().x_range(), header.response.rect.y_range());
    ui.interact(strip, id.with("drag"), Sense::drag())
}

pub struct ViewerApp {
    // Scene state
    catalog: ElementCatalog,
    visibility: VisibilityManager,
    selection: SelectionManager,
    annotations: AnnotationStore,
    costs: Option<Costs>,
    costs_calculated: bool,
    // Upload / load state
    file_path: String,
    upload_status: Option<String>,
    error: Option<String>,
    is_loading: bool,
    upload_rx: Option<Receiver<UploadOutcome>>,
    // Name of a model handed to the local consumer (no catalog, no costs)
    local_model: Option<String>,
    // Floating panels
    selection_panel_open: bool,
    selection_panel: PanelController,
    comment_panel_open: bool,
    comment_panel: PanelController,
    comment_text: String,
    // Viewer bridge and transient focus highlight
    viewer_rx: Option<Receiver<ViewerCommand>>,
    highlight_flash: Option<(u64, Instant)>,
    // Shell
    sidebar_open: bool,
    app_settings: AppSettings,
    show_prefs_window: bool,
    prefs_edit: AppSettings,
    prefs_status: Option<String>,
}

impl ViewerApp {
    pub fn new(settings: AppSettings) -> Self {
        let viewer_rx = viewer::init_bridge();
        Self {
            catalog: ElementCatalog::new(),
            visibility: VisibilityManager::new(),
            selection: SelectionManager::new(),
            annotations: AnnotationStore::new(),
            costs: None,
            costs_calculated: false,
            file_path: String::new(),
            upload_status: None,
            error: None,
            is_loading: false,
            upload_rx: None,
            local_model: None,
            selection_panel_open: true,
            selection_panel: PanelController::anchored_top_right(
                INITIAL_WINDOW,
                PANEL_ANCHOR_FROM_RIGHT,
                SELECTION_PANEL_TOP,
            ),
            comment_panel_open: false,
            comment_panel: PanelController::anchored_top_right(
                INITIAL_WINDOW,
                PANEL_ANCHOR_FROM_RIGHT,
                COMMENT_PANEL_TOP,
            ),
            comment_text: String::new(),
            viewer_rx: Some(viewer_rx),
            highlight_flash: None,
            sidebar_open: true,
            app_settings: settings,
            show_prefs_window: false,
            prefs_edit: AppSettings::default(),
            prefs_status: None,
        }
    }

    // Atomic replacement on a successful parse: catalog, visibility flags,
    // costs and the error banner move together. Selection and comments are a
    // separate reset domain and are deliberately left alone.
    fn apply_parse_response(&mut self, parsed: ParseResponse) {
        log::info!(
            "catalog loaded: {} elements, costs_calculated={}",
            parsed.elements.len(),
            parsed.costs_calculated
        );
        self.catalog.load(parsed.elements);
        let counts = self.catalog.type_counts();
        // Replace-on-reload: the flag key set always matches this catalog
        self.visibility.reset_from(&counts);
        self.costs = parsed.costs;
        self.costs_calculated = parsed.costs_calculated;
        if let Some(costs) = &self.costs {
            let s = &costs.summary;
            log::info!(
                "project cost: total={:.2} materials={:.2} connections={:.2} labor={:.2}",
                s.grand_total,
                s.total_material_cost,
                s.total_connection_cost,
                s.total_labor_cost
            );
        }
        self.error = None;
        self.upload_status = Some(format!("Parsed {} elements", self.catalog.len()));
    }

    // Server/transport failure: surface the message verbatim and drop the
    // model state; never leave a half-applied catalog behind
    fn apply_parse_error(&mut self, message: String) {
        log::warn!("parse failed: {}", message);
        self.catalog.clear();
        self.visibility.clear();
        self.costs = None;
        self.costs_calculated = false;
        self.upload_status = None;
        self.error = Some(message);
    }

    fn clear_model(&mut self) {
        log::info!("model cleared");
        self.catalog.clear();
        self.visibility.clear();
        self.costs = None;
        self.costs_calculated = false;
        self.local_model = None;
        self.upload_status = None;
        self.error = None;
        self.highlight_flash = None;
    }

    // Local suffix gate; non-.ifc names never leave the client
    fn validated_file(&mut self) -> Option<PathBuf> {
        let raw = self.file_path.trim();
        if raw.is_empty() {
            self.error = Some("Choose a .ifc file first".to_string());
            return None;
        }
        let path = PathBuf::from(raw);
        if !api::is_ifc_file(&path) {
            self.error = Some("Please choose a .ifc file".to_string());
            return None;
        }
        Some(path)
    }

    fn start_upload(&mut self) {
        if self.is_loading {
            return;
        }
        if let Some(path) = self.validated_file() {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            self.error = None;
            self.upload_status = Some(format!("Uploading {}…", name));
            self.is_loading = true;
            self.upload_rx = Some(api::client::spawn_upload(path, &self.app_settings));
        }
    }

    // Bypass the backend entirely: hand the file to the local consumer and
    // skip cost computation
    fn load_locally(&mut self) {
        if let Some(path) = self.validated_file() {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            self.error = None;
            self.upload_status = Some("Loading file locally (no cost calculation)".to_string());
            self.local_model = Some(name);
            viewer::send(ViewerCommand::LoadLocalModel(path));
        }
    }

    // Pass-through notification toward the viewer; the selection set itself
    // is not altered here
    fn focus_element(&self, express_id: u64) {
        viewer::send(ViewerCommand::Focus(express_id));
    }

    fn reset_panel_positions(&mut self, viewport: Vec2) {
        self.selection_panel = PanelController::anchored_top_right(
            viewport,
            PANEL_ANCHOR_FROM_RIGHT,
            SELECTION_PANEL_TOP,
        );
        self.comment_panel = PanelController::anchored_top_right(
            viewport,
            PANEL_ANCHOR_FROM_RIGHT,
            COMMENT_PANEL_TOP,
        );
    }

    fn drain_viewer_commands(&mut self) {
        let mut commands = Vec::new();
        if let Some(rx) = &self.viewer_rx {
            while let Ok(cmd) = rx.try_recv() {
                commands.push(cmd);
            }
        }
        for cmd in commands {
            match cmd {
                ViewerCommand::Focus(express_id) => {
                    self.highlight_flash = Some((express_id, Instant::now()));
                }
                ViewerCommand::Highlight(element_id) => {
                    // Comments store the express id as a string
                    if let Ok(express_id) = element_id.parse::<u64>() {
                        self.highlight_flash = Some((express_id, Instant::now()));
                    }
                }
                ViewerCommand::LoadLocalModel(path) => {
                    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                    log::info!("local model handed to viewer: {}", name);
                    self.upload_status = Some(format!("Loaded {} locally", name));
                }
            }
        }
    }

    fn drain_upload_outcome(&mut self) {
        let mut outcome = None;
        if let Some(rx) = &self.upload_rx {
            if let Ok(o) = rx.try_recv() {
                outcome = Some(o);
            }
        }
        if let Some(o) = outcome {
            self.upload_rx = None;
            self.is_loading = false;
            match o {
                UploadOutcome::Parsed(parsed) => self.apply_parse_response(parsed),
                UploadOutcome::Failed(message) => self.apply_parse_error(message),
            }
        }
    }

    // --- Sidebar sections ---

    fn sidebar_uploader(&mut self, ui: &mut egui::Ui) {
        ui.heading("Model");
        ui.label("IFC file path:");
        ui.text_edit_singleline(&mut self.file_path);
        ui.add_space(4.0);
        ui.horizontal(|ui| {
            let ready = !self.file_path.trim().is_empty() && !self.is_loading;
            if ui.add_enabled(ready, egui::Button::new("Load locally")).clicked() {
                self.load_locally();
            }
            if ui.add_enabled(ready, egui::Button::new("Upload to backend")).clicked() {
                self.start_upload();
            }
        });
        ui.small("Local load works offline and skips cost calculation");
        if self.is_loading {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Waiting for the parse service…");
            });
        }
        if let Some(status) = &self.upload_status {
            ui.colored_label(Color32::LIGHT_GREEN, status);
        }
        if let Some(error) = &self.error {
            ui.colored_label(Color32::LIGHT_RED, error);
        }
        if (!self.catalog.is_empty() || self.local_model.is_some())
            && ui.button("Clear model").clicked()
        {
            self.clear_model();
        }
    }

    fn sidebar_costs(&mut self, ui: &mut egui::Ui) {
        ui.heading("Project cost");
        match &self.costs {
            Some(costs) => {
                let s = &costs.summary;
                ui.strong(format!("{} PLN", format_money(s.grand_total)));
                ui.horizontal(|ui| {
                    ui.label("Materials:");
                    ui.monospace(format_money(s.total_material_cost));
                });
                ui.horizontal(|ui| {
                    ui.label("Connections:");
                    ui.monospace(format_money(s.total_connection_cost));
                });
                if s.total_labor_cost > 0.0 {
                    ui.horizontal(|ui| {
                        ui.label("Labor:");
                        ui.monospace(format_money(s.total_labor_cost));
                    });
                }
            }
            None => {
                if self.costs_calculated {
                    ui.small("Cost summary unavailable for this model.");
                } else {
                    ui.small("Costs were not calculated. Parsing completed successfully.");
                }
            }
        }
    }

    fn sidebar_visibility(&mut self, ui: &mut egui::Ui) {
        ui.heading("Element display");
        ui.horizontal(|ui| {
            if ui.button("Show all").clicked() {
                self.visibility.show_all();
            }
            if ui.button("Hide all").clicked() {
                self.visibility.hide_all();
            }
        });
        let counts = self.catalog.type_counts();
        egui::ScrollArea::vertical()
            .id_salt("visibility_list")
            .max_height(220.0)
            .show(ui, |ui| {
                for (type_name, count) in &counts {
                    let mut visible = self.visibility.is_visible(type_name);
                    if ui.checkbox(&mut visible, format!("{} ({})", type_name, count)).changed() {
                        self.visibility.set_visible(type_name, visible);
                    }
                }
            });
    }

    fn sidebar_preview(&self, ui: &mut egui::Ui) {
        let (shown, rest) = self.catalog.preview(ELEMENT_PREVIEW_LIMIT);
        egui::CollapsingHeader::new("Element details")
            .default_open(false)
            .show(ui, |ui| {
                for element in shown {
                    match &element.name {
                        Some(name) if !name.is_empty() => {
                            ui.label(format!("{} — {}", element.type_key(), name));
                        }
                        _ => {
                            ui.label(element.type_key().to_string());
                        }
                    }
                }
                if rest > 0 {
                    ui.label(RichText::new(format!("… and {} more", rest)).italics());
                }
            });
    }

    // --- Viewport (stand-in for the external 3D renderer) ---

    fn build_markers(&self, rect: Rect) -> Vec<ViewportMarker> {
        let inner = rect.shrink(40.0);
        let elements = self.catalog.elements();

        // World bounds over the elements that carry a position
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for element in elements {
            if let Some(p) = element.position {
                min_x = min_x.min(p[0]);
                max_x = max_x.max(p[0]);
                min_y = min_y.min(p[1]);
                max_y = max_y.max(p[1]);
            }
        }
        let span_x = max_x - min_x;
        let span_y = max_y - min_y;

        let mut markers = Vec::with_capacity(elements.len());
        let mut spiral_k = 0u32;
        for (idx, element) in elements.iter().enumerate() {
            let pos = match element.position {
                Some(p) => {
                    let tx = if span_x > 1e-9 { ((p[0] - min_x) / span_x) as f32 } else { 0.5 };
                    let ty = if span_y > 1e-9 { ((p[1] - min_y) / span_y) as f32 } else { 0.5 };
                    // Flip y so larger world y draws toward the top
                    pos2(
                        inner.left() + tx * inner.width(),
                        inner.bottom() - ty * inner.height(),
                    )
                }
                None => {
                    // Positionless elements get a deterministic fallback spot
                    let p = golden_spiral_position(rect.center(), spiral_k, rect);
                    spiral_k += 1;
                    inner.clamp(p)
                }
            };
            markers.push(ViewportMarker {
                express_id: (idx + 1) as u64,
                global_id: element.global_id.clone(),
                name: element.display_name().to_string(),
                type_name: element.type_key().to_string(),
                pos,
            });
        }
        markers
    }

    // Isolation wins over type flags: while isolated, exactly the selected
    // elements are drawn
    fn marker_visible(&self, marker: &ViewportMarker) -> bool {
        if self.selection.is_isolated() {
            self.selection.contains(marker.express_id)
        } else {
            self.visibility.is_visible(&marker.type_name)
        }
    }

    fn draw_viewport(&mut self, ui: &mut egui::Ui) {
        let rect = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(rect, Sense::click());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_gray(24));

        if self.catalog.is_empty() {
            let hint = match &self.local_model {
                Some(name) => format!("{} is loaded in the local viewer", name),
                None => "Load a model to inspect its elements".to_string(),
            };
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                hint,
                FontId::proportional(15.0),
                Color32::GRAY,
            );
            return;
        }

        let markers = self.build_markers(rect);

        // Topmost (last drawn) marker wins the hover
        let mut hovered: Option<usize> = None;
        if let Some(cursor) = response.hover_pos() {
            for (i, marker) in markers.iter().enumerate() {
                if self.marker_visible(marker) && marker.pos.distance(cursor) <= MARKER_RADIUS + 3.0 {
                    hovered = Some(i);
                }
            }
        }

        for (i, marker) in markers.iter().enumerate() {
            if !self.marker_visible(marker) {
                continue;
            }
            let selected = self.selection.contains(marker.express_id);
            let radius = if selected { MARKER_RADIUS + 2.0 } else { MARKER_RADIUS };
            painter.circle_filled(marker.pos, radius, color_for_type(&marker.type_name));
            if selected {
                painter.circle_stroke(marker.pos, radius + 2.0, Stroke::new(2.0, Color32::WHITE));
            }
            if hovered == Some(i) {
                painter.circle_stroke(marker.pos, radius + 4.0, Stroke::new(1.0, Color32::LIGHT_GRAY));
                painter.text(
                    marker.pos + vec2(0.0, -(radius + 8.0)),
                    Align2::CENTER_BOTTOM,
                    format!("{} ({})", marker.name, marker.type_name),
                    FontId::proportional(12.0),
                    Color32::WHITE,
                );
            }
        }

        // Transient focus ring requested through the viewer bridge
        if let Some((express_id, since)) = self.highlight_flash {
            if since.elapsed() < FLASH_DURATION {
                if let Some(marker) = markers.iter().find(|m| m.express_id == express_id) {
                    painter.circle_stroke(
                        marker.pos,
                        MARKER_RADIUS + 7.0,
                        Stroke::new(2.5, Color32::YELLOW),
                    );
                }
                ui.ctx().request_repaint_after(Duration::from_millis(50));
            } else {
                self.highlight_flash = None;
            }
        }

        if response.clicked() {
            let additive = ui.input(|i| {
                if cfg!(target_os = "macos") { i.modifiers.command } else { i.modifiers.ctrl }
            });
            match hovered {
                Some(i) => {
                    let entry = markers[i].selection_entry();
                    if additive {
                        // Ctrl-click adds; re-adding a selected element is a no-op
                        self.selection.add(entry);
                    } else {
                        self.selection.clear();
                        self.selection.add(entry);
                    }
                }
                None => {
                    // Background click clears the selection (isolation stays)
                    if !additive {
                        self.selection.clear();
                    }
                }
            }
        }
    }

    // --- Floating panels ---

    fn show_selection_panel(&mut self, ctx: &egui::Context) {
        if !self.selection_panel_open {
            return;
        }
        let mut close_requested = false;
        let pos = self.selection_panel.position();
        egui::Area::new(egui::Id::new("selection_panel"))
            .order(egui::Order::Foreground)
            .fixed_pos(pos)
            .show(ctx, |ui| {
                egui::Frame::window(&ctx.style()).show(ui, |ui| {
                    ui.set_width(PANEL_WIDTH);
                    let drag = panel_header(
                        ui,
                        egui::Id::new("selection_panel"),
                        "Selection & Isolation",
                        &mut close_requested,
                    );
                    if drag.drag_started() {
                        if let Some(p) = drag.interact_pointer_pos() {
                            self.selection_panel.begin_drag(p);
                        }
                    }
                    ui.separator();

                    ui.horizontal(|ui| {
                        if self.selection.is_isolated() {
                            if ui.button("Show all elements").clicked() {
                                self.selection.unisolate();
                            }
                        } else {
                            let label = format!("Isolate ({})", self.selection.len());
                            if ui
                                .add_enabled(!self.selection.is_empty(), egui::Button::new(label))
                                .clicked()
                            {
                                self.selection.isolate();
                            }
                        }
                        if ui
                            .add_enabled(!self.selection.is_empty(), egui::Button::new("Clear"))
                            .clicked()
                        {
                            self.selection.clear();
                        }
                    });
                    ui.small(if self.selection.is_isolated() {
                        "Only the selected elements are visible"
                    } else {
                        "Ctrl-click elements in the model to add to the selection"
                    });
                    ui.separator();

                    if self.selection.is_empty() {
                        ui.vertical_centered(|ui| {
                            ui.add_space(12.0);
                            ui.label("No elements selected");
                            ui.small("Click elements in the model, Ctrl-click to add more");
                            ui.add_space(12.0);
                        });
                    } else {
                        ui.label(format!("Selected: {} elements", self.selection.len()));
                        let entries: Vec<SelectionEntry> = self.selection.entries().to_vec();
                        let mut removed: Option<u64> = None;
                        egui::ScrollArea::vertical()
                            .id_salt("selection_list")
                            .max_height(280.0)
                            .show(ui, |ui| {
                                for entry in &entries {
                                    ui.horizontal(|ui| {
                                        ui.vertical(|ui| {
                                            if ui.link(&entry.name).clicked() {
                                                // Highlight in the model; the set is untouched
                                                self.focus_element(entry.express_id);
                                            }
                                            ui.small(format!("{} • ID: {}", entry.type_name, entry.express_id));
                                        });
                                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                            if ui.small_button("✕").clicked() {
                                                removed = Some(entry.express_id);
                                            }
                                        });
                                    });
                                }
                            });
                        if let Some(express_id) = removed {
                            // Removing the last entry does not exit isolation;
                            // that stays the user's call
                            self.selection.remove(express_id);
                        }
                    }

                    ui.separator();
                    ui.small("Ctrl + click — add to selection");
                    ui.small("Click an entry — highlight in the model");
                });
            });
        if close_requested {
            self.selection_panel_open = false;
            // Teardown is an exit path too: never leave a drag capture behind
            self.selection_panel.end_drag();
        }
    }

    fn show_comment_panel(&mut self, ctx: &egui::Context) {
        if !self.comment_panel_open {
            return;
        }
        let mut close_requested = false;
        let pos = self.comment_panel.position();
        let current = self.selection.current().cloned();
        let scoped_id = current.as_ref().map(|e| e.express_id.to_string());
        egui::Area::new(egui::Id::new("comment_panel"))
            .order(egui::Order::Foreground)
            .fixed_pos(pos)
            .show(ctx, |ui| {
                egui::Frame::window(&ctx.style()).show(ui, |ui| {
                    ui.set_width(PANEL_WIDTH);
                    let drag = panel_header(
                        ui,
                        egui::Id::new("comment_panel"),
                        "Comments",
                        &mut close_requested,
                    );
                    if drag.drag_started() {
                        if let Some(p) = drag.interact_pointer_pos() {
                            self.comment_panel.begin_drag(p);
                        }
                    }
                    ui.separator();

                    if let Some(entry) = &current {
                        ui.horizontal(|ui| {
                            ui.label("Selected element:");
                            ui.strong(&entry.name);
                        });
                        ui.separator();
                    }

                    let counts = self.annotations.counts();
                    ui.horizontal(|ui| {
                        ui.label("General:");
                        ui.strong(counts.general.to_string());
                        ui.add_space(12.0);
                        ui.label("Element-scoped:");
                        ui.strong(counts.scoped.to_string());
                    });
                    ui.separator();

                    // Narrow to the selected element when one is picked;
                    // otherwise show everything
                    let shown: Vec<Comment> = self
                        .annotations
                        .filter_by_element(scoped_id.as_deref())
                        .into_iter()
                        .cloned()
                        .collect();
                    let mut deleted: Option<String> = None;
                    if shown.is_empty() {
                        ui.vertical_centered(|ui| {
                            ui.add_space(12.0);
                            ui.label(if scoped_id.is_some() {
                                "No comments for this element"
                            } else {
                                "No comments"
                            });
                            ui.add_space(12.0);
                        });
                    } else {
                        egui::ScrollArea::vertical()
                            .id_salt("comment_list")
                            .max_height(260.0)
                            .show(ui, |ui| {
                                for comment in &shown {
                                    egui::Frame::group(ui.style()).show(ui, |ui| {
                                        ui.set_width(ui.available_width());
                                        ui.horizontal(|ui| {
                                            match (&comment.element_name, &comment.element_id) {
                                                (Some(name), Some(element_id)) => {
                                                    if ui.link(name).clicked() {
                                                        viewer::send(ViewerCommand::Highlight(element_id.clone()));
                                                    }
                                                }
                                                (None, Some(element_id)) => {
                                                    if ui.link(format!("ID: {}", element_id)).clicked() {
                                                        viewer::send(ViewerCommand::Highlight(element_id.clone()));
                                                    }
                                                }
                                                _ => {
                                                    ui.weak("General");
                                                }
                                            }
                                            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                                if ui.small_button("🗑").clicked() {
                                                    deleted = Some(comment.id.clone());
                                                }
                                            });
                                        });
                                        ui.small(format_timestamp(comment.timestamp));
                                        ui.label(&comment.text);
                                    });
                                }
                            });
                    }
                    if let Some(id) = deleted {
                        // Idempotent: deleting an already-gone id is a no-op
                        self.annotations.delete(&id);
                    }

                    ui.separator();
                    ui.label(if current.is_some() {
                        "Add a comment to the selected element"
                    } else {
                        "Add a general comment"
                    });
                    ui.add(
                        egui::TextEdit::multiline(&mut self.comment_text)
                            .desired_rows(3)
                            .desired_width(f32::INFINITY)
                            .hint_text("Write a comment…"),
                    );
                    let can_add = !self.comment_text.trim().is_empty();
                    if ui.add_enabled(can_add, egui::Button::new("Add comment")).clicked() {
                        let text = self.comment_text.clone();
                        let element_name = current.as_ref().map(|e| e.name.as_str());
                        self.annotations.add(&text, scoped_id.as_deref(), element_name);
                        self.comment_text.clear();
                    }
                });
            });
        if close_requested {
            self.comment_panel_open = false;
            self.comment_panel.end_drag();
        }
    }

    fn show_prefs(&mut self, ctx: &egui::Context) {
        if !self.show_prefs_window {
            return;
        }
        let mut open = true;
        egui::Window::new("Preferences")
            .open(&mut open)
            .resizable(true)
            .collapsible(false)
            .show(ctx, |ui| {
                ui.heading("Parse service");
                ui.horizontal(|ui| {
                    ui.label("Backend URL");
                    ui.text_edit_singleline(&mut self.prefs_edit.backend_url);
                });
                ui.horizontal(|ui| {
                    ui.label("Timeout (seconds)");
                    let mut secs = self.prefs_edit.parse_timeout_secs as i64;
                    if ui.add(egui::DragValue::new(&mut secs).range(1..=3600)).changed() {
                        self.prefs_edit.parse_timeout_secs = secs as u64;
                    }
                });
                ui.checkbox(&mut self.prefs_edit.calculate_costs, "Calculate costs while parsing");
                ui.add_space(4.0);
                let settings_dir = AppSettings::settings_dir();
                ui.label("Settings save directory:");
                ui.monospace(settings_dir.display().to_string());

                if let Some(msg) = &self.prefs_status {
                    ui.separator();
                    ui.label(msg);
                }

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        match self.prefs_edit.save() {
                            Ok(()) => {
                                self.app_settings = self.prefs_edit.clone();
                                self.show_prefs_window = false;
                            }
                            Err(e) => {
                                self.prefs_status = Some(format!("Failed to save preferences: {}", e));
                            }
                        }
                    }
                    if ui.button("Cancel").clicked() {
                        self.show_prefs_window = false;
                    }
                });
            });
        if !open {
            self.show_prefs_window = false;
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Requests from panels toward the viewer, then the single terminal
        // message of an in-flight upload
        self.drain_viewer_commands();
        self.drain_upload_outcome();

        // Each panel owns the global pointer stream only while it drags
        pump_panel_drag(ctx, &mut self.selection_panel);
        pump_panel_drag(ctx, &mut self.comment_panel);

        self.show_prefs(ctx);

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("IFC-Scope");

                ui.menu_button("File", |ui| {
                    if ui.button("Clear model").clicked() {
                        self.clear_model();
                        ui.close();
                    }
                    if ui.button("Preferences…").clicked() {
                        self.prefs_edit = self.app_settings.clone();
                        self.prefs_status = None;
                        self.show_prefs_window = true;
                        ui.close();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        ui.close();
                    }
                });

                ui.menu_button("Window", |ui| {
                    let sidebar = if self.sidebar_open { "Hide Sidebar" } else { "Show Sidebar" };
                    if ui.button(sidebar).clicked() {
                        self.sidebar_open = !self.sidebar_open;
                        ui.close();
                    }
                    ui.separator();
                    if ui.checkbox(&mut self.selection_panel_open, "Selection panel").changed()
                        && !self.selection_panel_open
                    {
                        self.selection_panel.end_drag();
                    }
                    if ui.checkbox(&mut self.comment_panel_open, "Comments panel").changed()
                        && !self.comment_panel_open
                    {
                        self.comment_panel.end_drag();
                    }
                    ui.separator();
                    if ui.button("Reset panel positions").clicked() {
                        let viewport = ctx.screen_rect().size();
                        self.reset_panel_positions(viewport);
                        ui.close();
                    }
                });

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if self.selection.is_isolated() {
                        ui.colored_label(Color32::LIGHT_BLUE, "Isolation");
                    }
                    if !self.catalog.is_empty() {
                        ui.weak(format!("{} elements", self.catalog.len()));
                    }
                });
            });
        });

        if self.sidebar_open {
            egui::SidePanel::left("sidebar")
                .resizable(true)
                .default_width(280.0)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().id_salt("sidebar_scroll").show(ui, |ui| {
                        self.sidebar_uploader(ui);
                        ui.separator();
                        if !self.catalog.is_empty() {
                            self.sidebar_costs(ui);
                            ui.separator();
                            self.sidebar_visibility(ui);
                            ui.separator();
                            self.sidebar_preview(ui);
                        }
                    });
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_viewport(ui);
        });

        self.show_selection_panel(ctx);
        self.show_comment_panel(ctx);

        if self.is_loading {
            // Poll the upload channel at a relaxed rate
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
