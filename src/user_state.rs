// ============================================================================
// USER STATE — per-frame pointer samples and UI selections
// ============================================================================

use kurbo::Point;

use crate::color::Color;
use crate::layer::LayerId;

/// One pointer sample.  `pos` is in whatever space it was captured in
/// (screen space from the window, canvas space after mapping).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorState {
    pub pos: Point,
    /// Normalized pen pressure, `0.0..=1.0`.
    pub pressure: f32,
}

impl CursorState {
    pub fn new(pos: Point, pressure: f32) -> Self {
        let pressure = if pressure.is_finite() { pressure.clamp(0.0, 1.0) } else { 0.0 };
        Self { pos, pressure }
    }

    /// Sample from a device without pressure sensing.
    pub fn at(x: f64, y: f64) -> Self {
        Self::new(Point::new(x, y), 1.0)
    }

    pub fn with_pos(self, pos: Point) -> Self {
        Self { pos, ..self }
    }
}

impl Default for CursorState {
    fn default() -> Self {
        Self { pos: Point::ZERO, pressure: 0.0 }
    }
}

/// State the UI mutates every frame and the tools read from.
#[derive(Clone, Debug, Default)]
pub struct UserState {
    pub selected_layer: Option<LayerId>,
    pub selected_color: Color,
    pub cursor: CursorState,
    /// Previous sample, kept only while the pointer stays pressed.
    pub prev_cursor: Option<CursorState>,
    pointer_down: bool,
}

impl UserState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this frame's pointer sample.  The old sample becomes
    /// `prev_cursor` only if the pointer was already down last frame and is
    /// still down now, so each press starts a fresh stroke.
    pub fn update_pointer(&mut self, cursor: CursorState, pressed: bool) {
        self.prev_cursor = if pressed && self.pointer_down {
            Some(self.cursor)
        } else {
            None
        };
        self.cursor = cursor;
        self.pointer_down = pressed;
    }

    pub fn is_pointer_down(&self) -> bool {
        self.pointer_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressure_is_clamped() {
        assert_eq!(CursorState::new(Point::ZERO, 3.0).pressure, 1.0);
        assert_eq!(CursorState::new(Point::ZERO, -1.0).pressure, 0.0);
        assert_eq!(CursorState::new(Point::ZERO, f32::NAN).pressure, 0.0);
    }

    #[test]
    fn previous_cursor_only_survives_while_pressed() {
        let mut state = UserState::new();
        state.update_pointer(CursorState::at(1.0, 1.0), true);
        assert_eq!(state.prev_cursor, None);

        state.update_pointer(CursorState::at(2.0, 2.0), true);
        assert_eq!(state.prev_cursor, Some(CursorState::at(1.0, 1.0)));

        state.update_pointer(CursorState::at(3.0, 3.0), false);
        assert_eq!(state.prev_cursor, None);
        assert!(!state.is_pointer_down());

        state.update_pointer(CursorState::at(4.0, 4.0), true);
        assert_eq!(state.prev_cursor, None);
    }
}
