// ============================================================================
// VIEW TRANSFORM — pan / zoom / rotate / flip between screen and canvas
// ============================================================================
//
// Three coordinate systems meet here:
//
//   canvas px   origin top-left of the bitmap, y down
//   NDC         -1..1 on both axes, y up (what the shader sees)
//   screen px   origin top-left of the viewport, y down
//
// The view is a pure affine in NDC:
//
//   M = translate(t) * Q(rotation) * scale(sx, sy) * fit
//
// `fit` squeezes the canvas NDC square into the viewport so the canvas keeps
// its aspect ratio.  Q is the rotation conjugated by the viewport half-size,
// so the rotation happens in pixel units and a rotated canvas never shears
// on a non-square window.  Changing the view never touches pixel data.

use std::f64::consts::PI;

use kurbo::{Affine, Point, Size, Vec2};

use crate::color::Color;
use crate::error::PaintError;
use crate::surface::Surface;

pub const MIN_SCALE: f64 = 0.01;
pub const MAX_SCALE: f64 = 100.0;

/// Display surface size before the first real viewport arrives.
const INITIAL_DISPLAY_SIZE: u32 = 100;
/// Determinants below this are treated as a singular view.
const SINGULAR_EPSILON: f64 = 1e-12;

pub struct ViewTransform {
    canvas_size: Size,
    viewport: Size,
    /// NDC units.
    translation: Vec2,
    /// `x` goes negative when flipped; the magnitudes are always equal.
    scale: Vec2,
    /// Radians in `(-PI, PI]`.
    rotation: f64,
    background: Color,
    display: Option<Surface>,
}

impl ViewTransform {
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            canvas_size: Size::new(canvas_width as f64, canvas_height as f64),
            viewport: Size::new(INITIAL_DISPLAY_SIZE as f64, INITIAL_DISPLAY_SIZE as f64),
            translation: Vec2::ZERO,
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
            background: Color::BLACK,
            display: None,
        }
    }

    // --- accessors ----------------------------------------------------------

    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn translation(&self) -> Vec2 {
        self.translation
    }

    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    /// Zoom magnitude regardless of flip.
    pub fn zoom(&self) -> f64 {
        self.scale.y.abs()
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn is_flipped(&self) -> bool {
        self.scale.x < 0.0
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    /// Last rendered frame, `None` before the first successful render.
    pub fn display(&self) -> Option<&Surface> {
        self.display.as_ref()
    }

    /// Accept a new viewport size.  Sizes below one pixel (including NaN)
    /// are rejected and the previous viewport is kept.
    pub fn set_viewport(&mut self, viewport: Size) -> bool {
        if !(viewport.width >= 1.0 && viewport.height >= 1.0) || !viewport.is_finite() {
            return false;
        }
        self.viewport = viewport;
        true
    }

    // --- matrices -----------------------------------------------------------

    /// Size of the canvas on screen at zoom 1: the largest rectangle with the
    /// canvas's aspect ratio that fits the viewport.
    pub fn fitted_canvas_size(&self) -> Size {
        let s = self.fit_factor();
        Size::new(self.canvas_size.width * s, self.canvas_size.height * s)
    }

    /// Screen pixels per canvas pixel at zoom 1.
    fn fit_factor(&self) -> f64 {
        let sx = self.viewport.width / self.canvas_size.width;
        let sy = self.viewport.height / self.canvas_size.height;
        sx.min(sy)
    }

    /// Canvas NDC -> screen NDC.
    pub fn transform(&self) -> Affine {
        let fit = self.fitted_canvas_size();
        let aspect = Affine::scale_non_uniform(
            fit.width / self.viewport.width,
            fit.height / self.viewport.height,
        );
        Affine::translate(self.translation)
            * self.rotation_ndc(self.rotation)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
            * aspect
    }

    /// Rotation by `theta` in pixel units, expressed in NDC.
    fn rotation_ndc(&self, theta: f64) -> Affine {
        let half = Affine::scale_non_uniform(self.viewport.width * 0.5, self.viewport.height * 0.5);
        half.inverse() * Affine::rotate(theta) * half
    }

    fn canvas_px_to_ndc(&self) -> Affine {
        let Size { width: w, height: h } = self.canvas_size;
        Affine::new([2.0 / w, 0.0, 0.0, -2.0 / h, -1.0, 1.0])
    }

    fn ndc_to_screen_px(&self) -> Affine {
        let Size { width: w, height: h } = self.viewport;
        Affine::new([w * 0.5, 0.0, 0.0, -h * 0.5, w * 0.5, h * 0.5])
    }

    /// Screen pixel -> NDC.
    pub fn screen_to_ndc(&self, point: Point) -> Point {
        Point::new(
            point.x / self.viewport.width * 2.0 - 1.0,
            1.0 - point.y / self.viewport.height * 2.0,
        )
    }

    /// Canvas px -> screen px, the full forward mapping.
    pub fn canvas_to_screen_affine(&self) -> Affine {
        self.ndc_to_screen_px() * self.transform() * self.canvas_px_to_ndc()
    }

    /// Screen px -> canvas px, or `None` for a degenerate view.
    pub fn screen_to_canvas_affine(&self) -> Option<Affine> {
        if !self.canvas_size.is_finite() || self.canvas_size.is_zero_area() {
            return None;
        }
        let forward = self.canvas_to_screen_affine();
        let det = forward.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return None;
        }
        Some(forward.inverse())
    }

    pub fn canvas_to_screen(&self, point: Point) -> Point {
        self.canvas_to_screen_affine() * point
    }

    /// Map a screen pixel to the canvas pixel under it.  The result may lie
    /// outside the canvas; callers decide whether that matters.
    pub fn screen_to_canvas(&self, point: Point) -> Option<Point> {
        self.screen_to_canvas_affine().map(|inv| inv * point)
    }

    /// Canvas-space length as seen on screen.
    pub fn canvas_length_to_screen(&self, length: f64) -> f64 {
        length * self.zoom() * self.fit_factor()
    }

    /// Column-major 3x3 of `transform()` padded to WGSL's `mat3x3<f32>`
    /// uniform layout (each column is 16 bytes).
    pub fn transform_columns(&self) -> [[f32; 4]; 3] {
        let [a, b, c, d, e, f] = self.transform().as_coeffs();
        [
            [a as f32, b as f32, 0.0, 0.0],
            [c as f32, d as f32, 0.0, 0.0],
            [e as f32, f as f32, 1.0, 0.0],
        ]
    }

    // --- view edits ---------------------------------------------------------

    /// Multiply the zoom by `factor`, keeping the canvas point under the
    /// screen point `point` fixed.  The zoom is clamped to
    /// `MIN_SCALE..=MAX_SCALE`; the fixed point uses the factor actually applied.
    pub fn zoom_into_point(&mut self, point: Point, factor: f64) {
        let pivot = self.screen_to_ndc(point).to_vec2();
        self.zoom_about_ndc(pivot, factor);
    }

    /// Zoom about the viewport centre.
    pub fn zoom_into_center(&mut self, factor: f64) {
        self.zoom_about_ndc(Vec2::ZERO, factor);
    }

    fn zoom_about_ndc(&mut self, pivot: Vec2, factor: f64) {
        if !(factor > 0.0) || !factor.is_finite() || !pivot.is_finite() {
            return;
        }
        let old = self.zoom();
        let new = (old * factor).clamp(MIN_SCALE, MAX_SCALE);
        let applied = new / old;
        // t' + Q * (k*S) * A * c == pivot  where  t + Q * S * A * c == pivot
        self.translation = pivot + (self.translation - pivot) * applied;
        self.scale *= applied;
    }

    /// Rotate about the viewport centre.
    pub fn rotate(&mut self, delta: f64) {
        if !delta.is_finite() {
            return;
        }
        self.rotation = normalize_angle(self.rotation + delta);
        self.translation = (self.rotation_ndc(delta) * self.translation.to_point()).to_vec2();
    }

    /// Pan by a screen-space pixel delta.
    pub fn move_by(&mut self, delta: Vec2) {
        if !delta.is_finite() {
            return;
        }
        self.translation += Vec2::new(
            2.0 * delta.x / self.viewport.width,
            -2.0 * delta.y / self.viewport.height,
        );
    }

    /// Mirror the view horizontally about the viewport centre.  Applying it
    /// twice restores the original view.
    pub fn flip(&mut self) {
        self.scale.x = -self.scale.x;
        self.rotation = normalize_angle(-self.rotation);
        self.translation.x = -self.translation.x;
    }

    pub fn reset(&mut self) {
        self.translation = Vec2::ZERO;
        self.scale = Vec2::new(1.0, 1.0);
        self.rotation = 0.0;
    }

    // --- rendering ----------------------------------------------------------

    /// The display surface sized to the current viewport, allocated on first
    /// use.  Contents are whatever the last render left.
    pub(crate) fn display_target(&mut self) -> Result<&mut Surface, PaintError> {
        let width = self.viewport.width.round() as u32;
        let height = self.viewport.height.round() as u32;
        match &mut self.display {
            Some(surface) => {
                surface.resize(width, height)?;
            }
            None => {
                self.display = Some(Surface::new(width, height)?);
            }
        }
        self.display
            .as_mut()
            .ok_or(PaintError::SurfaceAllocation { width, height })
    }

    /// Project `source` (the flattened canvas) into the display surface.
    /// Returns `false` and draws nothing for a degenerate viewport or view.
    pub fn render(&mut self, viewport: Size, source: &Surface) -> bool {
        if !self.set_viewport(viewport) {
            return false;
        }
        let Some(inverse) = self.screen_to_canvas_affine() else {
            return false;
        };
        let background = self.background.to_pixel();
        let display = match self.display_target() {
            Ok(display) => display,
            Err(e) => {
                log::error!("view: display surface unavailable: {}", e);
                return false;
            }
        };

        let mut target = display.bind();
        target.clear(background);
        target.draw_surface_mapped(source, |x, y| Some(inverse * Point::new(x, y)));
        true
    }

    /// Outline a brush footprint on the display.  `pos` is in screen space,
    /// `radius` in canvas pixels.
    pub fn draw_cursor(&mut self, pos: Point, radius: f64) {
        let screen_radius = self.canvas_length_to_screen(radius);
        if let Some(display) = self.display.as_mut() {
            display.bind().draw_ring(pos, screen_radius, 1.0);
        }
    }
}

/// Wrap an angle into `(-PI, PI]`.
pub fn normalize_angle(theta: f64) -> f64 {
    let wrapped = theta.rem_euclid(2.0 * PI);
    if wrapped > PI { wrapped - 2.0 * PI } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn close(a: Point, b: Point) -> bool {
        (a - b).hypot() < EPS
    }

    fn view(cw: u32, ch: u32, vw: f64, vh: f64) -> ViewTransform {
        let mut v = ViewTransform::new(cw, ch);
        assert!(v.set_viewport(Size::new(vw, vh)));
        v
    }

    #[test]
    fn identity_when_viewport_matches_canvas() {
        let v = view(100, 100, 100.0, 100.0);
        let p = Point::new(12.5, 80.0);
        assert!(close(v.screen_to_canvas(p).unwrap(), p));
        assert!(close(v.canvas_to_screen(p), p));
    }

    #[test]
    fn canvas_is_letterboxed_not_stretched() {
        let v = view(200, 100, 400.0, 400.0);
        assert_eq!(v.fitted_canvas_size(), Size::new(400.0, 200.0));
        // Top-left canvas corner sits 100px down from the viewport top.
        assert!(close(v.canvas_to_screen(Point::ZERO), Point::new(0.0, 100.0)));
        assert!(close(v.canvas_to_screen(Point::new(200.0, 100.0)), Point::new(400.0, 300.0)));
    }

    #[test]
    fn zoom_keeps_the_pivot_fixed() {
        let mut v = view(300, 200, 640.0, 480.0);
        v.rotate(0.7);
        v.move_by(Vec2::new(30.0, -12.0));
        for &(pivot, factor) in &[
            (Point::new(100.0, 50.0), 1.1),
            (Point::new(600.0, 400.0), 1.0 / 1.1),
            (Point::new(0.0, 0.0), 3.0),
        ] {
            let before = v.screen_to_canvas(pivot).unwrap();
            v.zoom_into_point(pivot, factor);
            let after = v.screen_to_canvas(pivot).unwrap();
            assert!(close(before, after), "{before:?} != {after:?}");
        }
    }

    #[test]
    fn zoom_is_clamped_and_still_fixed() {
        let mut v = view(100, 100, 200.0, 200.0);
        let pivot = Point::new(40.0, 150.0);
        let before = v.screen_to_canvas(pivot).unwrap();
        v.zoom_into_point(pivot, 1e9);
        assert_eq!(v.zoom(), MAX_SCALE);
        assert!(close(before, v.screen_to_canvas(pivot).unwrap()));
        v.zoom_into_center(1e-12);
        assert!((v.zoom() - MIN_SCALE).abs() < 1e-12);
        // Bad factors are ignored.
        v.zoom_into_center(0.0);
        v.zoom_into_center(f64::NAN);
        assert!((v.zoom() - MIN_SCALE).abs() < 1e-12);
    }

    #[test]
    fn rotation_preserves_the_view_centre() {
        let mut v = view(300, 200, 500.0, 300.0);
        v.move_by(Vec2::new(40.0, 25.0));
        let centre = Point::new(250.0, 150.0);
        let before = v.screen_to_canvas(centre).unwrap();
        v.rotate(1.2);
        assert!(close(before, v.screen_to_canvas(centre).unwrap()));
    }

    #[test]
    fn rotation_does_not_shear_on_wide_viewports() {
        let mut v = view(100, 100, 400.0, 100.0);
        v.rotate(PI / 2.0);
        let a = v.canvas_to_screen(Point::new(0.0, 0.0));
        let b = v.canvas_to_screen(Point::new(100.0, 0.0));
        let c = v.canvas_to_screen(Point::new(0.0, 100.0));
        assert!(((b - a).hypot() - (c - a).hypot()).abs() < EPS);
        assert!((b - a).dot(c - a).abs() < EPS);
    }

    #[test]
    fn rotation_is_normalized() {
        let mut v = view(10, 10, 10.0, 10.0);
        for _ in 0..9 {
            v.rotate(1.0);
            assert!(v.rotation() > -PI && v.rotation() <= PI);
        }
        assert_eq!(normalize_angle(PI), PI);
        assert_eq!(normalize_angle(-PI), PI);
    }

    #[test]
    fn flip_twice_is_identity() {
        let mut v = view(320, 240, 800.0, 600.0);
        v.rotate(0.4);
        v.zoom_into_point(Point::new(100.0, 100.0), 2.5);
        v.move_by(Vec2::new(-13.0, 7.0));
        let (t, s, r) = (v.translation(), v.scale(), v.rotation());
        v.flip();
        assert!(v.is_flipped());
        v.flip();
        assert!((v.translation() - t).hypot() < EPS);
        assert!((v.scale() - s).hypot() < EPS);
        assert!((v.rotation() - r).abs() < EPS);
    }

    #[test]
    fn flip_mirrors_about_the_viewport_centre() {
        let mut v = view(100, 100, 100.0, 100.0);
        v.flip();
        assert!(close(v.screen_to_canvas(Point::new(10.0, 30.0)).unwrap(), Point::new(90.0, 30.0)));
    }

    #[test]
    fn move_follows_the_pointer() {
        let mut v = view(100, 100, 200.0, 200.0);
        let before = v.canvas_to_screen(Point::new(50.0, 50.0));
        v.move_by(Vec2::new(15.0, -8.0));
        let after = v.canvas_to_screen(Point::new(50.0, 50.0));
        assert!(close(after, before + Vec2::new(15.0, -8.0)));
    }

    #[test]
    fn degenerate_viewports_are_rejected() {
        let mut v = view(100, 100, 200.0, 200.0);
        assert!(!v.set_viewport(Size::new(0.0, 50.0)));
        assert!(!v.set_viewport(Size::new(-3.0, 50.0)));
        assert!(!v.set_viewport(Size::new(f64::NAN, 50.0)));
        assert_eq!(v.viewport(), Size::new(200.0, 200.0));
        let source = Surface::new(100, 100).unwrap();
        assert!(!v.render(Size::ZERO, &source));
        assert!(v.display().is_none());
    }

    #[test]
    fn render_resizes_and_clears_the_display() {
        let mut v = view(4, 4, 4.0, 4.0);
        v.set_background(Color::BLUE);
        let source = Surface::new(4, 4).unwrap();
        assert!(v.render(Size::new(8.0, 4.0), &source));
        let display = v.display().unwrap();
        assert_eq!(display.size(), (8, 4));
        // Transparent source: background shows everywhere.
        assert_eq!(display.pixel(0, 0).unwrap().0, [0, 0, 255, 255]);
    }

    #[test]
    fn cursor_length_follows_zoom() {
        let mut v = view(100, 100, 200.0, 200.0);
        assert!((v.canvas_length_to_screen(10.0) - 20.0).abs() < EPS);
        v.zoom_into_center(2.0);
        v.flip();
        assert!((v.canvas_length_to_screen(10.0) - 40.0).abs() < EPS);
    }
}
