// ============================================================================
// APP — eframe desktop shell around the paint core
// ============================================================================
//
// The shell owns the canvas, the user state and the tool/brush managers, and
// per frame: runs the panels, feeds the pointer into the selected tool,
// composites, and shows the view's display surface as an egui texture.

use kurbo::{Point, Size};

use crate::brush::{BrushManager, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE};
use crate::canvas::{Canvas, CursorOverlay};
use crate::color::Color;
use crate::error::PaintError;
use crate::gpu::{GpuContext, ViewPresenter};
use crate::layer::LayerId;
use crate::settings::AppSettings;
use crate::tools::{ToolKind, ToolManager};
use crate::user_state::{CursorState, UserState};

/// Scroll wheel: zoom change per scrolled point.
const SCROLL_ZOOM_RATE: f64 = 0.005;

pub struct LayerPaintApp {
    settings: AppSettings,
    canvas: Canvas,
    user_state: UserState,
    brushes: BrushManager,
    tools: ToolManager,
    /// `None` renders the view on the CPU.
    presenter: Option<ViewPresenter>,
    texture: Option<egui::TextureHandle>,
    /// Tool held through a modifier key, restored on release.
    held_tool: Option<ToolKind>,
    /// Name being edited for the selected layer, and which layer it belongs to.
    rename: Option<(LayerId, String)>,
    /// Dismissible error shown over the canvas.
    alert: Option<String>,
    status: String,
}

impl LayerPaintApp {
    pub fn new(settings: AppSettings) -> Result<Self, PaintError> {
        let mut canvas = Canvas::new(settings.canvas_width, settings.canvas_height)?;
        canvas.set_base_color(settings.background_color);
        canvas.view_mut().set_background(settings.view_background);

        let mut user_state = UserState::new();
        user_state.selected_layer = Some(canvas.insert_layer_above(None)?);

        let mut tools = ToolManager::new();
        tools.set_zoom_sensitivity(settings.zoom_sensitivity);

        let presenter = if settings.gpu_acceleration {
            match GpuContext::new(&settings.preferred_gpu) {
                Ok(ctx) => Some(ViewPresenter::new(ctx)),
                Err(e) => {
                    log::warn!("app: GPU unavailable, rendering on the CPU: {}", e);
                    None
                }
            }
        } else {
            None
        };
        let status = match &presenter {
            Some(p) => format!("GPU: {}", p.adapter_name()),
            None => "CPU rendering".to_string(),
        };

        Ok(Self {
            brushes: settings.brush_manager(),
            settings,
            canvas,
            user_state,
            tools,
            presenter,
            texture: None,
            held_tool: None,
            rename: None,
            alert: None,
            status,
        })
    }

    // ------------------------------------------------------------------------
    // Panels
    // ------------------------------------------------------------------------

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            let selected = self.tools.selected().map(|t| t.id());
            let tools: Vec<_> = self.tools.tools().iter().map(|t| (t.id(), t.name())).collect();
            for (id, name) in tools {
                if ui.selectable_label(selected == Some(id), name).clicked() {
                    self.tools.select(id);
                }
            }
            ui.separator();

            let selected_brush = self.brushes.selected_id();
            let brushes: Vec<_> = self
                .brushes
                .brushes()
                .iter()
                .map(|b| (b.id(), b.name().to_string()))
                .collect();
            for (id, name) in brushes {
                if ui.selectable_label(selected_brush == Some(id), name).clicked() {
                    self.brushes.select(id);
                }
            }

            if let Some(brush) = self.brushes.selected_mut() {
                let mut size = brush.size();
                let size_slider = egui::Slider::new(&mut size, MIN_BRUSH_SIZE..=MAX_BRUSH_SIZE)
                    .logarithmic(true)
                    .text("Size");
                if ui.add(size_slider).changed() {
                    brush.set_size(size);
                }
                let mut opacity = brush.opacity();
                if ui
                    .add(egui::Slider::new(&mut opacity, 0.0..=1.0).text("Opacity"))
                    .changed()
                {
                    brush.set_opacity(opacity);
                }
                let mut hardness = brush.hardness();
                if ui
                    .add(egui::Slider::new(&mut hardness, 0.0..=1.0).text("Hardness"))
                    .changed()
                {
                    brush.set_hardness(hardness);
                }
            }

            let mut rgb = self.user_state.selected_color.to_array();
            if ui.color_edit_button_rgb(&mut rgb).changed() {
                self.user_state.selected_color = Color::from_array(rgb);
            }
            ui.separator();

            if ui.button("Flip").clicked() {
                self.canvas.flip();
            }
            if ui.button("Reset view").clicked() {
                self.canvas.reset_view();
            }
            if ui.button("Save…").clicked() {
                self.save_dialog();
            }
        });
    }

    fn layer_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Layers");
        ui.horizontal(|ui| {
            if ui.button("+").on_hover_text("New layer").clicked() {
                match self.canvas.insert_layer_above(self.user_state.selected_layer) {
                    Ok(id) => self.user_state.selected_layer = Some(id),
                    Err(e) => {
                        log::error!("app: layer creation failed: {}", e);
                        self.alert = Some(format!("Could not create a layer: {}", e));
                    }
                }
            }
            if ui.button("−").on_hover_text("Delete layer").clicked() {
                self.user_state.selected_layer =
                    self.canvas.delete_layer(self.user_state.selected_layer);
            }
            if let Some(id) = self.user_state.selected_layer {
                if ui.button("▲").on_hover_text("Move up").clicked() {
                    self.canvas.move_layer_up(id);
                }
                if ui.button("▼").on_hover_text("Move down").clicked() {
                    self.canvas.move_layer_down(id);
                }
            }
        });
        ui.separator();

        // Top of the stack first, as painters expect.
        let layers: Vec<_> = self.canvas.layers().rev().collect();
        egui::ScrollArea::vertical().show(ui, |ui| {
            for info in layers {
                ui.horizontal(|ui| {
                    let mut visible = info.visible;
                    if ui.checkbox(&mut visible, "").on_hover_text("Visible").changed() {
                        self.canvas.set_layer_visibility(info.id, visible);
                    }
                    let lock_label = if info.alpha_locked { "🔒" } else { "🔓" };
                    if ui
                        .selectable_label(info.alpha_locked, lock_label)
                        .on_hover_text("Alpha lock")
                        .clicked()
                    {
                        self.canvas.set_layer_alpha_lock(info.id, !info.alpha_locked);
                    }
                    let selected = self.user_state.selected_layer == Some(info.id);
                    if ui.selectable_label(selected, &info.name).clicked() {
                        self.user_state.selected_layer = Some(info.id);
                    }
                });
            }
        });
        ui.separator();
        self.rename_field(ui);
    }

    fn rename_field(&mut self, ui: &mut egui::Ui) {
        let Some(id) = self.user_state.selected_layer else {
            self.rename = None;
            return;
        };
        if self.rename.as_ref().map(|(for_id, _)| *for_id) != Some(id) {
            let name = self.canvas.layer(id).map(|l| l.name().to_string());
            self.rename = name.map(|name| (id, name));
        }
        let Some((_, name)) = self.rename.as_mut() else { return };
        ui.horizontal(|ui| {
            let edit = ui.text_edit_singleline(name);
            let commit = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Rename").clicked() || commit {
                self.canvas.rename_layer(id, name.trim());
            }
        });
    }

    fn save_dialog(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .set_file_name("canvas.png")
            .save_file()
        else {
            return;
        };
        match self.canvas.save(&path) {
            Ok(()) => self.status = format!("Saved {}", path.display()),
            Err(e) => self.alert = Some(format!("Could not save {}: {}", path.display(), e)),
        }
    }

    fn alert_window(&mut self, ctx: &egui::Context) {
        let Some(message) = self.alert.clone() else { return };
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    self.alert = None;
                }
            });
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (smaller, larger, alt, space) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Minus),
                i.key_pressed(egui::Key::PlusEquals),
                i.modifiers.alt,
                i.key_down(egui::Key::Space),
            )
        });
        if ctx.wants_keyboard_input() {
            return;
        }
        if let Some(brush) = self.brushes.selected_mut() {
            if smaller {
                brush.decrease_size();
            }
            if larger {
                brush.increase_size();
            }
        }

        let want = if alt {
            Some(ToolKind::ColorPicker)
        } else if space {
            Some(ToolKind::Pan)
        } else {
            None
        };
        if want != self.held_tool {
            self.tools.deselect_temp();
            if let Some(id) = want.and_then(|kind| self.tools.find_by_kind(kind)) {
                self.tools.temp_select(id);
            }
            self.held_tool = want;
        }
    }

    // ------------------------------------------------------------------------
    // Canvas area
    // ------------------------------------------------------------------------

    fn canvas_area(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
        let ppp = ctx.pixels_per_point() as f64;
        let viewport = Size::new(rect.width() as f64 * ppp, rect.height() as f64 * ppp);
        let to_local = |pos: egui::Pos2| {
            Point::new((pos.x - rect.min.x) as f64 * ppp, (pos.y - rect.min.y) as f64 * ppp)
        };

        let hover = response.hover_pos();
        let pressed = response.is_pointer_button_down_on();
        let cursor = hover
            .or_else(|| ctx.input(|i| i.pointer.interact_pos()))
            .map(|pos| CursorState::at(to_local(pos).x, to_local(pos).y))
            .unwrap_or(self.user_state.cursor);
        self.user_state.update_pointer(cursor, pressed);
        if pressed {
            self.tools
                .on_pointer_down(&mut self.canvas, &mut self.user_state, &self.brushes);
        }

        if let Some(pos) = hover {
            let scroll = ctx.input(|i| i.scroll_delta.y);
            if scroll.abs() > 0.1 {
                let factor = 1.0 + scroll as f64 * SCROLL_ZOOM_RATE;
                self.canvas.zoom_into_point(to_local(pos), factor);
            }
        }

        let overlay = match (hover, self.tools.selected_kind(), self.brushes.selected()) {
            (Some(pos), Some(ToolKind::Brush), Some(brush)) => Some(CursorOverlay {
                pos: to_local(pos),
                radius: brush.size() as f64,
            }),
            _ => None,
        };

        if !self.composite(viewport, overlay) {
            return;
        }
        self.show_display(&ctx, ui, rect);
    }

    fn composite(&mut self, viewport: Size, overlay: Option<CursorOverlay>) -> bool {
        if let Some(presenter) = self.presenter.as_mut() {
            match self.canvas.composite_with_presenter(presenter, viewport, overlay) {
                Ok(shown) => return shown,
                Err(e) => {
                    log::error!("app: GPU view pass failed, switching to CPU: {}", e);
                    self.presenter = None;
                    self.status = "CPU rendering".to_string();
                }
            }
        }
        self.canvas.composite(viewport, overlay)
    }

    fn show_display(&mut self, ctx: &egui::Context, ui: &mut egui::Ui, rect: egui::Rect) {
        let Some(display) = self.canvas.view().display() else { return };
        let (w, h) = display.size();
        let image = egui::ColorImage::from_rgba_unmultiplied([w as usize, h as usize], display.as_raw());
        let options = egui::TextureOptions::NEAREST;
        match &mut self.texture {
            Some(handle) => handle.set(image, options),
            None => self.texture = Some(ctx.load_texture("canvas_view", image, options)),
        }
        if let Some(handle) = &self.texture {
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            ui.painter().image(handle.id(), rect, uv, egui::Color32::WHITE);
        }
    }

    /// Copy live brush sizes back into the settings before they are saved.
    fn sync_settings(&mut self) {
        for brush in self.brushes.brushes() {
            match brush.kind() {
                crate::brush::BrushKind::Pen => self.settings.pen_size = brush.size(),
                crate::brush::BrushKind::Eraser => self.settings.eraser_size = brush.size(),
            }
        }
        self.settings.zoom_sensitivity = self.tools.zoom_sensitivity();
    }
}

impl eframe::App for LayerPaintApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status);
                ui.separator();
                ui.label(format!(
                    "{}x{}  zoom {:.0}%",
                    self.canvas.width(),
                    self.canvas.height(),
                    self.canvas.view().zoom() * 100.0
                ));
            });
        });
        egui::SidePanel::right("layers")
            .resizable(true)
            .default_width(200.0)
            .show(ctx, |ui| self.layer_panel(ui));
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.canvas_area(ui));

        self.alert_window(ctx);
    }
}

impl Drop for LayerPaintApp {
    fn drop(&mut self) {
        self.sync_settings();
        self.settings.save();
    }
}
