// ============================================================================
// TOOLS — what a pressed pointer does each frame
// ============================================================================

use kurbo::{Point, Vec2};

use crate::brush::BrushManager;
use crate::canvas::Canvas;
use crate::user_state::UserState;

/// Default base for drag-to-zoom: dragging 25 px multiplies the zoom by this.
pub const DEFAULT_ZOOM_SENSITIVITY: f32 = 1.1;
/// Horizontal drag distance, in screen pixels, for one sensitivity step.
const ZOOM_DRAG_STEP: f64 = 25.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ToolId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    /// Paints with the selected brush.
    Brush,
    ColorPicker,
    Zoom,
    Pan,
    Rotate,
}

impl ToolKind {
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Brush => "Brush",
            ToolKind::ColorPicker => "Color Picker",
            ToolKind::Zoom => "Zoom",
            ToolKind::Pan => "Pan",
            ToolKind::Rotate => "Rotate",
        }
    }

    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::Brush,
            ToolKind::ColorPicker,
            ToolKind::Zoom,
            ToolKind::Pan,
            ToolKind::Rotate,
        ]
    }
}

#[derive(Clone, Debug)]
pub struct Tool {
    id: ToolId,
    kind: ToolKind,
}

impl Tool {
    pub fn id(&self) -> ToolId {
        self.id
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

pub struct ToolManager {
    tools: Vec<Tool>,
    selected: Option<ToolId>,
    /// Selection to restore once a temporary tool is released.
    prev_selected: Option<Option<ToolId>>,
    zoom_sensitivity: f32,
}

impl ToolManager {
    /// Every tool, with the brush selected.
    pub fn new() -> Self {
        let tools: Vec<Tool> = ToolKind::all()
            .iter()
            .enumerate()
            .map(|(i, &kind)| Tool { id: ToolId(i as u32), kind })
            .collect();
        let selected = tools.first().map(Tool::id);
        Self {
            tools,
            selected,
            prev_selected: None,
            zoom_sensitivity: DEFAULT_ZOOM_SENSITIVITY,
        }
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn get(&self, id: ToolId) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<ToolId> {
        self.tools.iter().find(|t| t.name() == name).map(Tool::id)
    }

    pub fn find_by_kind(&self, kind: ToolKind) -> Option<ToolId> {
        self.tools.iter().find(|t| t.kind == kind).map(Tool::id)
    }

    pub fn selected(&self) -> Option<&Tool> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn selected_kind(&self) -> Option<ToolKind> {
        self.selected().map(Tool::kind)
    }

    pub fn zoom_sensitivity(&self) -> f32 {
        self.zoom_sensitivity
    }

    pub fn set_zoom_sensitivity(&mut self, sensitivity: f32) {
        if sensitivity.is_finite() && sensitivity > 1.0 {
            self.zoom_sensitivity = sensitivity;
        }
    }

    pub fn is_temp_selected(&self) -> bool {
        self.prev_selected.is_some()
    }

    /// Permanent selection.  Ignored while a temporary tool is held.
    pub fn select(&mut self, id: ToolId) {
        if self.is_temp_selected() {
            return;
        }
        if self.get(id).is_some() {
            self.selected = Some(id);
        }
    }

    pub fn select_by_name(&mut self, name: &str) {
        if let Some(id) = self.find_by_name(name) {
            self.select(id);
        }
    }

    /// Switch to `id` until `deselect_temp`.  Nested temporary selections
    /// still restore the original tool.
    pub fn temp_select(&mut self, id: ToolId) {
        if self.prev_selected.is_none() {
            self.prev_selected = Some(self.selected);
        }
        if self.get(id).is_some() {
            self.selected = Some(id);
        }
    }

    pub fn temp_select_by_name(&mut self, name: &str) {
        if let Some(id) = self.find_by_name(name) {
            self.temp_select(id);
        }
    }

    pub fn deselect_temp(&mut self) {
        if let Some(prev) = self.prev_selected.take() {
            self.selected = prev;
        }
    }

    /// Run the selected tool for one pressed-pointer frame.  `user_state`
    /// must already hold this frame's cursor.  Returns whether a layer was
    /// painted.
    pub fn on_pointer_down(
        &self,
        canvas: &mut Canvas,
        user_state: &mut UserState,
        brushes: &BrushManager,
    ) -> bool {
        let Some(kind) = self.selected_kind() else {
            return false;
        };
        match kind {
            ToolKind::Brush => paint(canvas, user_state, brushes),
            ToolKind::ColorPicker => {
                pick_color(canvas, user_state);
                false
            }
            ToolKind::Zoom => {
                if let Some(prev) = user_state.prev_cursor {
                    let dx = user_state.cursor.pos.x - prev.pos.x;
                    let factor = (self.zoom_sensitivity as f64).powf(dx / ZOOM_DRAG_STEP);
                    canvas.zoom_into_center(factor);
                }
                false
            }
            ToolKind::Pan => {
                if let Some(prev) = user_state.prev_cursor {
                    canvas.pan(user_state.cursor.pos - prev.pos);
                }
                false
            }
            ToolKind::Rotate => {
                if let Some(prev) = user_state.prev_cursor {
                    let viewport = canvas.view().viewport();
                    let centre = Point::new(viewport.width * 0.5, viewport.height * 0.5);
                    let angle = angle_between(prev.pos - centre, user_state.cursor.pos - centre);
                    // Screen space is y-down; the view rotates y-up.
                    canvas.rotate(-angle);
                }
                false
            }
        }
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

fn paint(canvas: &mut Canvas, user_state: &UserState, brushes: &BrushManager) -> bool {
    let (Some(layer), Some(brush)) = (user_state.selected_layer, brushes.selected()) else {
        return false;
    };
    canvas.draw_stroke(
        layer,
        brush,
        user_state.prev_cursor,
        user_state.cursor,
        user_state.selected_color,
    ) > 0
}

fn pick_color(canvas: &Canvas, user_state: &mut UserState) {
    let Some(pos) = canvas.screen_to_canvas(user_state.cursor.pos) else {
        return;
    };
    if let Some(color) = canvas.sample_color(pos) {
        user_state.selected_color = color;
    }
}

/// Signed angle from `u` to `v` in their own coordinate frame.
fn angle_between(u: Vec2, v: Vec2) -> f64 {
    u.cross(v).atan2(u.dot(v))
}
