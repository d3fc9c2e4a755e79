// ============================================================================
// CANVAS — layer stack, flattened output, and the view that displays it
// ============================================================================
//
// Frame order is always: strokes land on a layer surface, `flatten()`
// composites every visible layer bottom-to-top over the base colour into the
// output surface, and the view projects the output onto the display.
// Readback (`sample_color`, `save`) only ever reads the output surface.

use std::path::Path;

use image::ImageFormat;
use kurbo::{Point, Size, Vec2};

use crate::brush::Brush;
use crate::color::Color;
use crate::error::PaintError;
use crate::gpu::ViewPresenter;
use crate::layer::{Layer, LayerId, LayerInfo, LayerStack};
use crate::surface::Surface;
use crate::user_state::CursorState;
use crate::view::ViewTransform;

/// Brush outline drawn over the displayed frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorOverlay {
    /// Screen space.
    pub pos: Point,
    /// Canvas pixels.
    pub radius: f64,
}

/// What the output surface was last flattened from: base colour plus each
/// layer's id, surface generation and visibility, bottom to top.
#[derive(Debug, PartialEq)]
struct FlattenKey {
    base: [u8; 3],
    layers: Vec<(LayerId, u64, bool)>,
}

pub struct Canvas {
    width: u32,
    height: u32,
    base_color: Color,
    layers: LayerStack,
    output: Surface,
    view: ViewTransform,
    flattened_from: Option<FlattenKey>,
}

impl Canvas {
    /// An empty canvas (no layers) with a white base colour.
    pub fn new(width: u32, height: u32) -> Result<Self, PaintError> {
        let output = Surface::new(width, height)?;
        log::info!("canvas: created {}x{}", width, height);
        Ok(Self {
            width,
            height,
            base_color: Color::WHITE,
            layers: LayerStack::new(width, height),
            output,
            view: ViewTransform::new(width, height),
            flattened_from: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn base_color(&self) -> Color {
        self.base_color
    }

    pub fn set_base_color(&mut self, color: Color) {
        self.base_color = color;
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewTransform {
        &mut self.view
    }

    /// The flattened image as of the last `flatten()` / `composite()`.
    pub fn output(&self) -> &Surface {
        &self.output
    }

    // --- layers -------------------------------------------------------------

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer metadata, bottom to top.
    pub fn layers(&self) -> impl DoubleEndedIterator<Item = LayerInfo> + '_ {
        self.layers.iter().map(Layer::info)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn insert_layer_above(&mut self, selected: Option<LayerId>) -> Result<LayerId, PaintError> {
        let id = self.layers.insert_above(selected)?;
        log::info!("canvas: inserted layer {} ({} total)", id, self.layers.len());
        Ok(id)
    }

    /// Delete the selected layer and return the new selection.
    pub fn delete_layer(&mut self, selected: Option<LayerId>) -> Option<LayerId> {
        let before = self.layers.len();
        let next = self.layers.delete(selected);
        if self.layers.len() < before {
            if let Some(id) = selected {
                log::info!("canvas: deleted layer {} ({} left)", id, self.layers.len());
            }
        }
        next
    }

    pub fn move_layer(&mut self, id: LayerId, delta: isize) -> bool {
        self.layers.move_by(id, delta)
    }

    pub fn move_layer_up(&mut self, id: LayerId) -> bool {
        self.move_layer(id, 1)
    }

    pub fn move_layer_down(&mut self, id: LayerId) -> bool {
        self.move_layer(id, -1)
    }

    pub fn set_layer_visibility(&mut self, id: LayerId, visible: bool) {
        self.layers.set_visibility(id, visible);
    }

    pub fn is_layer_visible(&self, id: LayerId) -> Option<bool> {
        self.layers.get(id).map(Layer::is_visible)
    }

    pub fn set_layer_alpha_lock(&mut self, id: LayerId, locked: bool) {
        self.layers.set_alpha_lock(id, locked);
    }

    pub fn is_layer_alpha_locked(&self, id: LayerId) -> Option<bool> {
        self.layers.get(id).map(Layer::is_alpha_locked)
    }

    pub fn rename_layer(&mut self, id: LayerId, name: &str) {
        self.layers.rename(id, name);
    }

    // --- drawing ------------------------------------------------------------

    /// Paint from `start` to `end`, both in screen space.  Without a `start`
    /// (first frame of a press) a single stamp lands at `end`.  Returns the
    /// number of stamps issued; 0 when the layer is missing or the view
    /// cannot map the points.
    pub fn draw_stroke(
        &mut self,
        layer_id: LayerId,
        brush: &Brush,
        start: Option<CursorState>,
        end: CursorState,
        color: Color,
    ) -> usize {
        let Some(end_pos) = self.view.screen_to_canvas(end.pos) else {
            return 0;
        };
        let end = end.with_pos(end_pos);
        let start = match start {
            Some(s) => match self.view.screen_to_canvas(s.pos) {
                Some(p) => Some(s.with_pos(p)),
                None => return 0,
            },
            None => None,
        };

        let Some(layer) = self.layers.get_mut(layer_id) else {
            return 0;
        };
        let alpha_locked = layer.is_alpha_locked();
        let mut target = layer.surface_mut().bind();
        match start {
            Some(start) => brush.stroke_segment(&mut target, start, end, color, alpha_locked, false),
            None => {
                brush.stamp(&mut target, end.pos, end.pressure, color, alpha_locked);
                1
            }
        }
    }

    /// Composite visible layers, bottom to top, over the base colour into
    /// the output surface.  Hidden layers are skipped outright.
    pub fn flatten(&mut self) {
        {
            let mut target = self.output.bind();
            target.clear(self.base_color.to_pixel());
            for layer in self.layers.iter().filter(|l| l.is_visible()) {
                target.draw_surface(layer.surface());
            }
        }
        self.flattened_from = Some(self.flatten_key());
    }

    /// Flatten only if a layer, the stack order or the base colour changed
    /// since the last flatten.  Returns whether the output was rebuilt.
    pub fn refresh_output(&mut self) -> bool {
        if self.flattened_from.as_ref() == Some(&self.flatten_key()) {
            return false;
        }
        self.flatten();
        true
    }

    fn flatten_key(&self) -> FlattenKey {
        FlattenKey {
            base: self.base_color.to_rgb8(),
            layers: self
                .layers
                .iter()
                .map(|l| (l.id(), l.surface().generation(), l.is_visible()))
                .collect(),
        }
    }

    /// Refresh the flattened output, then project it into the view's display
    /// surface on the CPU.  Returns `false` when the viewport is degenerate and nothing
    /// was displayed.
    pub fn composite(&mut self, viewport: Size, cursor: Option<CursorOverlay>) -> bool {
        self.refresh_output();
        if !self.view.render(viewport, &self.output) {
            return false;
        }
        if let Some(cursor) = cursor {
            self.view.draw_cursor(cursor.pos, cursor.radius);
        }
        true
    }

    /// Same as `composite`, with the view projection done on the GPU.
    pub fn composite_with_presenter(
        &mut self,
        presenter: &mut ViewPresenter,
        viewport: Size,
        cursor: Option<CursorOverlay>,
    ) -> Result<bool, PaintError> {
        self.refresh_output();
        if !presenter.render(&mut self.view, viewport, &self.output)? {
            return Ok(false);
        }
        if let Some(cursor) = cursor {
            self.view.draw_cursor(cursor.pos, cursor.radius);
        }
        Ok(true)
    }

    /// Colour of the flattened output at a canvas-space point, `None`
    /// outside the canvas.  Reflects the last `flatten()`.
    pub fn sample_color(&self, point: Point) -> Option<Color> {
        if !(point.x >= 0.0 && point.y >= 0.0) {
            return None;
        }
        let (x, y) = (point.x.floor(), point.y.floor());
        if x >= self.width as f64 || y >= self.height as f64 {
            return None;
        }
        self.output.pixel(x as u32, y as u32).map(Color::from_pixel)
    }

    /// Flatten and write the result as a PNG.
    pub fn save(&mut self, path: &Path) -> Result<(), PaintError> {
        self.flatten();
        match self.output.as_image().save_with_format(path, ImageFormat::Png) {
            Ok(()) => {
                log::info!("canvas: saved {}x{} to {}", self.width, self.height, path.display());
                Ok(())
            }
            Err(e) => {
                log::error!("canvas: failed to save {}: {}", path.display(), e);
                Err(e.into())
            }
        }
    }

    // --- view ---------------------------------------------------------------

    pub fn screen_to_canvas(&self, point: Point) -> Option<Point> {
        self.view.screen_to_canvas(point)
    }

    pub fn zoom_into_point(&mut self, point: Point, factor: f64) {
        self.view.zoom_into_point(point, factor);
    }

    pub fn zoom_into_center(&mut self, factor: f64) {
        self.view.zoom_into_center(factor);
    }

    pub fn rotate(&mut self, delta: f64) {
        self.view.rotate(delta);
    }

    /// Pan by a screen-space pixel delta.
    pub fn pan(&mut self, delta: Vec2) {
        self.view.move_by(delta);
    }

    pub fn flip(&mut self) {
        self.view.flip();
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::{BrushKind, BrushManager};

    fn canvas(w: u32, h: u32) -> Canvas {
        let mut c = Canvas::new(w, h).unwrap();
        // Identity screen -> canvas mapping.
        assert!(c.view_mut().set_viewport(Size::new(w as f64, h as f64)));
        c
    }

    fn brush(kind: BrushKind, size: f32) -> Brush {
        let manager = BrushManager::new();
        let id = manager.find_by_kind(kind).unwrap();
        let mut b = manager.get(id).unwrap().clone();
        b.set_size(size);
        b
    }

    fn pen(size: f32) -> Brush {
        brush(BrushKind::Pen, size)
    }

    #[test]
    fn empty_canvas_flattens_to_base_colour() {
        let mut c = canvas(8, 8);
        c.set_base_color(Color::GREEN);
        c.flatten();
        assert_eq!(c.sample_color(Point::new(3.0, 3.0)), Some(Color::GREEN));
    }

    #[test]
    fn stroke_on_missing_layer_is_a_no_op() {
        let mut c = canvas(8, 8);
        let id = c.insert_layer_above(None).unwrap();
        assert_eq!(c.delete_layer(Some(id)), None);
        let n = c.draw_stroke(id, &pen(3.0), None, CursorState::at(4.0, 4.0), Color::RED);
        assert_eq!(n, 0);
    }

    #[test]
    fn single_stamp_then_segment() {
        let mut c = canvas(40, 40);
        let id = c.insert_layer_above(None).unwrap();
        let brush = pen(3.0);
        assert_eq!(c.draw_stroke(id, &brush, None, CursorState::at(5.0, 5.0), Color::RED), 1);
        let n = c.draw_stroke(
            id,
            &brush,
            Some(CursorState::at(5.0, 5.0)),
            CursorState::at(35.0, 5.0),
            Color::RED,
        );
        assert_eq!(n, 16);
        c.flatten();
        assert_eq!(c.sample_color(Point::new(20.0, 5.0)), Some(Color::RED));
        assert_eq!(c.sample_color(Point::new(20.0, 30.0)), Some(Color::WHITE));
    }

    #[test]
    fn top_layer_hides_the_one_below() {
        let mut c = canvas(20, 20);
        let bottom = c.insert_layer_above(None).unwrap();
        let top = c.insert_layer_above(Some(bottom)).unwrap();
        let brush = pen(6.0);
        c.draw_stroke(bottom, &brush, None, CursorState::at(10.0, 10.0), Color::RED);
        c.draw_stroke(top, &brush, None, CursorState::at(10.0, 10.0), Color::BLUE);
        c.flatten();
        assert_eq!(c.sample_color(Point::new(10.0, 10.0)), Some(Color::BLUE));

        c.set_layer_visibility(top, false);
        c.flatten();
        assert_eq!(c.sample_color(Point::new(10.0, 10.0)), Some(Color::RED));

        // Reordering puts red on top again.
        c.set_layer_visibility(top, true);
        assert!(c.move_layer_up(bottom));
        c.flatten();
        assert_eq!(c.sample_color(Point::new(10.0, 10.0)), Some(Color::RED));
    }

    #[test]
    fn alpha_locked_layer_keeps_its_transparency() {
        let mut c = canvas(20, 20);
        let id = c.insert_layer_above(None).unwrap();
        c.set_layer_alpha_lock(id, true);
        assert_eq!(c.is_layer_alpha_locked(id), Some(true));
        c.draw_stroke(id, &pen(6.0), None, CursorState::at(10.0, 10.0), Color::RED);
        c.flatten();
        assert_eq!(c.sample_color(Point::new(10.0, 10.0)), Some(Color::WHITE));
    }

    #[test]
    fn eraser_respects_alpha_lock_unless_told_otherwise() {
        let mut c = canvas(20, 20);
        let id = c.insert_layer_above(None).unwrap();
        c.draw_stroke(id, &pen(8.0), None, CursorState::at(10.0, 10.0), Color::RED);
        c.set_layer_alpha_lock(id, true);

        let mut eraser = brush(BrushKind::Eraser, 8.0);
        c.draw_stroke(id, &eraser, None, CursorState::at(10.0, 10.0), Color::BLACK);
        c.flatten();
        assert_eq!(c.sample_color(Point::new(10.0, 10.0)), Some(Color::RED));

        eraser.set_ignores_alpha_lock(true);
        c.draw_stroke(id, &eraser, None, CursorState::at(10.0, 10.0), Color::BLACK);
        c.flatten();
        assert_eq!(c.sample_color(Point::new(10.0, 10.0)), Some(Color::WHITE));
    }

    #[test]
    fn sampling_outside_the_canvas_is_none() {
        let mut c = canvas(10, 10);
        c.flatten();
        assert_eq!(c.sample_color(Point::new(-0.5, 2.0)), None);
        assert_eq!(c.sample_color(Point::new(10.0, 2.0)), None);
        assert_eq!(c.sample_color(Point::new(f64::NAN, 2.0)), None);
        assert_eq!(c.sample_color(Point::new(9.99, 9.99)), Some(Color::WHITE));
    }

    #[test]
    fn composite_draws_into_the_display() {
        let mut c = canvas(10, 10);
        assert!(c.composite(Size::new(20.0, 10.0), None));
        let display = c.view().display().unwrap();
        assert_eq!(display.size(), (20, 10));
        assert!(!c.composite(Size::new(0.0, 0.0), None));
    }

    #[test]
    fn output_is_rebuilt_only_after_a_change() {
        let mut c = canvas(16, 16);
        let id = c.insert_layer_above(None).unwrap();
        assert!(c.refresh_output());
        let r#gen = c.output().generation();
        assert!(!c.refresh_output());
        assert!(c.composite(Size::new(16.0, 16.0), None));
        assert_eq!(c.output().generation(), r#gen);

        c.draw_stroke(id, &pen(3.0), None, CursorState::at(8.0, 8.0), Color::RED);
        assert!(c.composite(Size::new(16.0, 16.0), None));
        assert!(c.output().generation() > r#gen);
        assert_eq!(c.sample_color(Point::new(8.0, 8.0)), Some(Color::RED));

        c.set_layer_visibility(id, false);
        assert!(c.refresh_output());
        c.set_base_color(Color::BLUE);
        assert!(c.refresh_output());
        assert_eq!(c.sample_color(Point::new(8.0, 8.0)), Some(Color::BLUE));

        let above = c.insert_layer_above(Some(id)).unwrap();
        assert!(c.refresh_output());
        assert!(c.move_layer_down(above));
        assert!(c.refresh_output());
    }

    #[test]
    fn layer_metadata_queries() {
        let mut c = canvas(8, 8);
        let id = c.insert_layer_above(None).unwrap();
        assert_eq!(c.layer(id).map(Layer::name), Some("Layer 1"));
        assert_eq!(c.is_layer_visible(id), Some(true));

        c.rename_layer(id, "Sketch");
        c.set_layer_visibility(id, false);
        assert_eq!(c.layer(id).map(Layer::name), Some("Sketch"));
        assert_eq!(c.is_layer_visible(id), Some(false));
        let info: Vec<_> = c.layers().collect();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].name, "Sketch");
        assert!(!info[0].visible);

        c.delete_layer(Some(id));
        assert!(c.layer(id).is_none());
        assert_eq!(c.is_layer_visible(id), None);
    }
}
