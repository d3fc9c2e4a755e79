// ============================================================================
// BRUSHES — stamping policy, stroke interpolation, size ladder
// ============================================================================
//
// A brush is a stateless stamping policy plus a few parameters.  The variant
// set is closed (`BrushKind`), so blend selection is an exhaustive match
// rather than dynamic dispatch.

use kurbo::Point;

use crate::color::Color;
use crate::surface::{BlendMode, RenderTarget};
use crate::user_state::CursorState;

pub const MIN_BRUSH_SIZE: f32 = 1.0;
pub const MAX_BRUSH_SIZE: f32 = 1000.0;

/// Discrete sizes visited by `increase_size` / `decrease_size`.
pub const BRUSH_SIZES: [f32; 35] = [
    1.0, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 12.0, 15.0, 17.0, 20.0, 25.0,
    30.0, 40.0, 60.0, 70.0, 80.0, 100.0, 120.0, 150.0, 170.0, 200.0, 250.0, 300.0, 400.0, 500.0,
    600.0, 700.0, 800.0, 1000.0,
];

/// Upper bound on interpolated stamps per segment (bounds per-frame cost).
pub const MAX_SEGMENT_STAMPS: usize = 16;
/// Stamps laid per stamp-radius of travel.
const STAMPS_PER_RADIUS: f64 = 8.0;
const OPACITY_STEP: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BrushId(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrushKind {
    Pen,
    Eraser,
}

impl BrushKind {
    pub fn name(&self) -> &'static str {
        match self {
            BrushKind::Pen => "Pen",
            BrushKind::Eraser => "Eraser",
        }
    }

    /// Blend mode for a stamp on a layer with the given alpha lock, or
    /// `None` when the stamp must not touch the layer at all.
    pub fn blend_mode(&self, alpha_locked: bool, ignores_alpha_lock: bool) -> Option<BlendMode> {
        match self {
            BrushKind::Pen if alpha_locked => Some(BlendMode::PreserveAlpha),
            BrushKind::Pen => Some(BlendMode::Over),
            BrushKind::Eraser if alpha_locked && !ignores_alpha_lock => None,
            BrushKind::Eraser => Some(BlendMode::Erase),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Brush {
    id: BrushId,
    name: String,
    kind: BrushKind,
    /// Stamp radius in canvas pixels at full pressure.
    size: f32,
    opacity: f32,
    hardness: f32,
    /// Erase even on alpha-locked layers.
    ignores_alpha_lock: bool,
}

impl Brush {
    pub fn new(id: BrushId, kind: BrushKind) -> Self {
        Self {
            id,
            name: kind.name().to_string(),
            kind,
            size: 10.0,
            opacity: 1.0,
            hardness: 0.75,
            ignores_alpha_lock: false,
        }
    }

    pub fn id(&self) -> BrushId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BrushKind {
        self.kind
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn hardness(&self) -> f32 {
        self.hardness
    }

    pub fn ignores_alpha_lock(&self) -> bool {
        self.ignores_alpha_lock
    }

    pub fn set_size(&mut self, size: f32) {
        self.size = if size.is_nan() {
            MIN_BRUSH_SIZE
        } else {
            size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE)
        };
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    }

    pub fn set_hardness(&mut self, hardness: f32) {
        self.hardness = if hardness.is_nan() { 0.75 } else { hardness.clamp(0.0, 1.0) };
    }

    pub fn set_ignores_alpha_lock(&mut self, ignore: bool) {
        self.ignores_alpha_lock = ignore;
    }

    /// Next larger ladder size, saturating at `MAX_BRUSH_SIZE`.
    pub fn increase_size(&mut self) {
        self.size = BRUSH_SIZES
            .iter()
            .copied()
            .find(|&s| s > self.size)
            .unwrap_or(MAX_BRUSH_SIZE);
    }

    /// Next smaller ladder size, saturating at `MIN_BRUSH_SIZE`.
    pub fn decrease_size(&mut self) {
        self.size = BRUSH_SIZES
            .iter()
            .rev()
            .copied()
            .find(|&s| s < self.size)
            .unwrap_or(MIN_BRUSH_SIZE);
    }

    pub fn increase_opacity(&mut self) {
        self.set_opacity(self.opacity + OPACITY_STEP);
    }

    pub fn decrease_opacity(&mut self) {
        self.set_opacity(self.opacity - OPACITY_STEP);
    }

    /// Draw one stamp at `pos` (canvas space).  Radius is `size * pressure`.
    /// Returns `false` when nothing could be drawn (alpha lock forbids it,
    /// zero radius, or the stamp is entirely off the target).
    pub fn stamp(
        &self,
        target: &mut RenderTarget<'_>,
        pos: Point,
        pressure: f32,
        color: Color,
        alpha_locked: bool,
    ) -> bool {
        let Some(mode) = self.kind.blend_mode(alpha_locked, self.ignores_alpha_lock) else {
            return false;
        };
        let radius = self.size as f64 * pressure.clamp(0.0, 1.0) as f64;
        target.stamp(pos, radius, self.hardness, self.opacity, color.to_array(), mode)
    }

    /// Interpolate stamps from `start` to `end` (both canvas space).
    ///
    /// `start` itself is only stamped when `include_start` is set: on
    /// consecutive frames it was already drawn as the previous segment's end.
    /// Returns the number of interpolated stamps, always `1..=16`.
    pub fn stroke_segment(
        &self,
        target: &mut RenderTarget<'_>,
        start: CursorState,
        end: CursorState,
        color: Color,
        alpha_locked: bool,
        include_start: bool,
    ) -> usize {
        let count = segment_stamp_count(
            start.pos.distance(end.pos),
            self.size,
            start.pressure.min(end.pressure),
        );

        if include_start {
            self.stamp(target, start.pos, start.pressure, color, alpha_locked);
        }
        for i in 1..=count {
            let t = i as f64 / count as f64;
            let pos = start.pos.lerp(end.pos, t);
            let pressure = start.pressure + (end.pressure - start.pressure) * t as f32;
            self.stamp(target, pos, pressure, color, alpha_locked);
        }
        count
    }
}

/// `round(distance / (size * min_pressure) * 8)` clamped to
/// `1..=MAX_SEGMENT_STAMPS`.  A zero stamp radius with any travel saturates
/// to the maximum; no travel at all gives one stamp.
pub fn segment_stamp_count(distance: f64, size: f32, min_pressure: f32) -> usize {
    let stamp_radius = size as f64 * min_pressure as f64;
    let raw = if stamp_radius > f64::EPSILON {
        (distance / stamp_radius * STAMPS_PER_RADIUS).round()
    } else if distance > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    if raw.is_nan() {
        return 1;
    }
    raw.clamp(1.0, MAX_SEGMENT_STAMPS as f64) as usize
}

// ============================================================================
// BRUSH MANAGER
// ============================================================================

/// Owns the available brushes and which one is selected.
#[derive(Clone, Debug)]
pub struct BrushManager {
    brushes: Vec<Brush>,
    selected: Option<BrushId>,
    next_id: u32,
}

impl BrushManager {
    /// Pen and Eraser, with the Pen selected.
    pub fn new() -> Self {
        let mut manager = Self::empty();
        let pen = manager.add(BrushKind::Pen);
        manager.add(BrushKind::Eraser);
        manager.selected = Some(pen);
        manager
    }

    pub fn empty() -> Self {
        Self {
            brushes: Vec::new(),
            selected: None,
            next_id: 0,
        }
    }

    pub fn add(&mut self, kind: BrushKind) -> BrushId {
        let id = BrushId(self.next_id);
        self.next_id += 1;
        self.brushes.push(Brush::new(id, kind));
        id
    }

    pub fn brushes(&self) -> &[Brush] {
        &self.brushes
    }

    pub fn get(&self, id: BrushId) -> Option<&Brush> {
        self.brushes.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: BrushId) -> Option<&mut Brush> {
        self.brushes.iter_mut().find(|b| b.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<BrushId> {
        self.brushes.iter().find(|b| b.name == name).map(|b| b.id)
    }

    pub fn find_by_kind(&self, kind: BrushKind) -> Option<BrushId> {
        self.brushes.iter().find(|b| b.kind == kind).map(|b| b.id)
    }

    /// Select `id` if it exists; unknown ids keep the current selection.
    pub fn select(&mut self, id: BrushId) {
        if self.get(id).is_some() {
            self.selected = Some(id);
        }
    }

    pub fn select_by_name(&mut self, name: &str) -> bool {
        match self.find_by_name(name) {
            Some(id) => {
                self.selected = Some(id);
                true
            }
            None => false,
        }
    }

    pub fn selected_id(&self) -> Option<BrushId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Brush> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn selected_mut(&mut self) -> Option<&mut Brush> {
        let id = self.selected?;
        self.get_mut(id)
    }
}

impl Default for BrushManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Surface;
    use image::Rgba;

    fn pen(size: f32) -> Brush {
        let mut b = Brush::new(BrushId(0), BrushKind::Pen);
        b.set_size(size);
        b
    }

    #[test]
    fn segment_count_stays_within_bounds() {
        for &distance in &[0.0, 0.001, 1.0, 10.0, 1e6, f64::NAN, f64::INFINITY] {
            for &size in &[0.0, 1.0, 10.0, 1000.0] {
                for &pressure in &[0.0, 0.01, 0.5, 1.0] {
                    let n = segment_stamp_count(distance, size, pressure);
                    assert!(
                        (1..=MAX_SEGMENT_STAMPS).contains(&n),
                        "{n} stamps for d={distance} s={size} p={pressure}"
                    );
                }
            }
        }
    }

    #[test]
    fn segment_count_scales_with_travel() {
        // One radius of travel -> 8 stamps.
        assert_eq!(segment_stamp_count(10.0, 10.0, 1.0), 8);
        assert_eq!(segment_stamp_count(1.0, 10.0, 1.0), 1);
        assert_eq!(segment_stamp_count(100.0, 10.0, 1.0), MAX_SEGMENT_STAMPS);
        // Lighter pressure shrinks the stamp, so more stamps are needed.
        assert_eq!(segment_stamp_count(5.0, 10.0, 0.5), 8);
        assert_eq!(segment_stamp_count(0.0, 0.0, 0.0), 1);
        assert_eq!(segment_stamp_count(3.0, 0.0, 1.0), MAX_SEGMENT_STAMPS);
    }

    #[test]
    fn ladder_saturates_at_both_ends() {
        let mut b = pen(MIN_BRUSH_SIZE);
        b.decrease_size();
        assert_eq!(b.size(), MIN_BRUSH_SIZE);
        for _ in 0..100 {
            b.increase_size();
            assert!(b.size() >= MIN_BRUSH_SIZE && b.size() <= MAX_BRUSH_SIZE);
        }
        assert_eq!(b.size(), MAX_BRUSH_SIZE);
        for _ in 0..100 {
            b.decrease_size();
            assert!(b.size() >= MIN_BRUSH_SIZE && b.size() <= MAX_BRUSH_SIZE);
        }
        assert_eq!(b.size(), MIN_BRUSH_SIZE);
    }

    #[test]
    fn ladder_round_trips_from_every_rung() {
        for &size in &BRUSH_SIZES[..BRUSH_SIZES.len() - 1] {
            let mut b = pen(size);
            b.increase_size();
            b.decrease_size();
            assert_eq!(b.size(), size);
        }
        // Off-ladder sizes snap to the neighbouring rungs.
        let mut b = pen(11.0);
        b.increase_size();
        assert_eq!(b.size(), 12.0);
        let mut b = pen(11.0);
        b.decrease_size();
        assert_eq!(b.size(), 10.0);
    }

    #[test]
    fn opacity_steps_are_clamped() {
        let mut b = pen(5.0);
        b.increase_opacity();
        assert_eq!(b.opacity(), 1.0);
        for _ in 0..20 {
            b.decrease_opacity();
        }
        assert_eq!(b.opacity(), 0.0);
    }

    #[test]
    fn softer_brush_fades_sooner() {
        let alpha_at_edge = |hardness: f32| {
            let mut surface = Surface::new(30, 30).unwrap();
            let mut brush = pen(10.0);
            brush.set_hardness(hardness);
            assert_eq!(brush.hardness(), hardness);
            {
                let mut t = surface.bind();
                brush.stamp(&mut t, Point::new(10.0, 10.0), 1.0, Color::RED, false);
            }
            surface.pixel(16, 10).unwrap()[3]
        };
        let hard = alpha_at_edge(0.75);
        let soft = alpha_at_edge(0.0);
        assert_eq!(hard, 255);
        assert!(soft > 0 && soft < hard, "soft edge alpha {soft}");

        let mut b = pen(5.0);
        b.set_hardness(3.0);
        assert_eq!(b.hardness(), 1.0);
        b.set_hardness(f32::NAN);
        assert_eq!(b.hardness(), 0.75);
    }

    #[test]
    fn blend_mode_table() {
        assert_eq!(BrushKind::Pen.blend_mode(false, false), Some(BlendMode::Over));
        assert_eq!(BrushKind::Pen.blend_mode(true, false), Some(BlendMode::PreserveAlpha));
        assert_eq!(BrushKind::Eraser.blend_mode(false, false), Some(BlendMode::Erase));
        assert_eq!(BrushKind::Eraser.blend_mode(true, false), None);
        assert_eq!(BrushKind::Eraser.blend_mode(true, true), Some(BlendMode::Erase));
    }

    #[test]
    fn alpha_locked_pen_leaves_transparent_pixels_transparent() {
        let mut surface = Surface::new(20, 20).unwrap();
        let brush = pen(5.0);
        {
            let mut t = surface.bind();
            assert!(brush.stamp(&mut t, Point::new(10.0, 10.0), 1.0, Color::RED, true));
        }
        assert_eq!(surface.pixel(10, 10).unwrap()[3], 0);
    }

    #[test]
    fn segment_reaches_the_end_point_and_skips_the_start() {
        let mut surface = Surface::new(64, 8).unwrap();
        let brush = pen(2.0);
        let start = CursorState::at(4.0, 4.0);
        let end = CursorState::at(60.0, 4.0);
        let n = {
            let mut t = surface.bind();
            brush.stroke_segment(&mut t, start, end, Color::BLUE, false, false)
        };
        assert_eq!(n, MAX_SEGMENT_STAMPS);
        assert_eq!(surface.pixel(59, 3), Some(Rgba([0, 0, 255, 255])));
        // 16 stamps over 56px: the first lands at x=7.5, clear of x=3.
        assert_eq!(surface.pixel(3, 3).unwrap()[3], 0);
    }

    #[test]
    fn include_start_stamps_the_first_sample() {
        let mut surface = Surface::new(64, 8).unwrap();
        let brush = pen(2.0);
        {
            let mut t = surface.bind();
            brush.stroke_segment(
                &mut t,
                CursorState::at(4.0, 4.0),
                CursorState::at(60.0, 4.0),
                Color::BLUE,
                false,
                true,
            );
        }
        assert_eq!(surface.pixel(3, 3), Some(Rgba([0, 0, 255, 255])));
    }

    #[test]
    fn manager_selection_by_name_and_id() {
        let mut m = BrushManager::new();
        assert_eq!(m.selected().map(Brush::kind), Some(BrushKind::Pen));
        assert!(m.select_by_name("Eraser"));
        assert_eq!(m.selected().map(Brush::kind), Some(BrushKind::Eraser));
        assert!(!m.select_by_name("Airbrush"));
        assert_eq!(m.selected().map(Brush::kind), Some(BrushKind::Eraser));
        let pen = m.find_by_kind(BrushKind::Pen).unwrap();
        m.select(pen);
        assert_eq!(m.selected_id(), Some(pen));
        m.select(BrushId(99));
        assert_eq!(m.selected_id(), Some(pen));
        assert!(BrushManager::empty().selected().is_none());
    }
}
