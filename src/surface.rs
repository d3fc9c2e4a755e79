// ============================================================================
// SURFACE — owned 2D RGBA pixel store + scoped render target
// ============================================================================
//
// A `Surface` is the leaf resource under every layer, the composited output
// and the display copy.  Pixels are straight (non-premultiplied) RGBA8 and
// live CPU-side; the GPU mirrors a surface lazily by comparing `generation`
// (see `gpu::texture::SurfaceTexture`).
//
// Drawing only happens through a `RenderTarget` obtained from `bind()`.  The
// guard clips every write to its viewport and, when dropped, unbinds and
// commits the draw by bumping the generation.  Holding the guard borrows the
// surface mutably, so a stale binding cannot leak into an unrelated draw.

use image::{Rgba, RgbaImage};
use kurbo::Point;
use rayon::prelude::*;

use crate::error::PaintError;

/// Largest edge accepted for any surface.
pub const MAX_SURFACE_DIM: u32 = 16384;

/// How a stamp's colour combines with existing pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    /// Straight-alpha "over": paint colour and coverage.
    Over,
    /// Blend RGB only; destination alpha is left untouched.
    PreserveAlpha,
    /// Multiply destination alpha by `1 - coverage`; colour is ignored.
    Erase,
}

/// Pixel-aligned clip rectangle, `min` inclusive, `max` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl PixelRect {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self { min_x: 0, min_y: 0, max_x: width, max_y: height }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    /// Pixels touched by a disc of `radius` around `center`, clipped to self.
    fn clip_disc(&self, center: Point, radius: f64) -> PixelRect {
        let clamp_x = |v: f64| v.clamp(self.min_x as f64, self.max_x as f64) as u32;
        let clamp_y = |v: f64| v.clamp(self.min_y as f64, self.max_y as f64) as u32;
        PixelRect {
            min_x: clamp_x((center.x - radius).floor()),
            min_y: clamp_y((center.y - radius).floor()),
            max_x: clamp_x((center.x + radius).ceil()),
            max_y: clamp_y((center.y + radius).ceil()),
        }
    }
}

/// Owned pixel buffer.  Move-only: copying would alias a GPU mirror.
pub struct Surface {
    pixels: RgbaImage,
    generation: u64,
}

impl Surface {
    /// Allocate a transparent surface.  Zero or oversized dimensions are a
    /// construction-time failure.
    pub fn new(width: u32, height: u32) -> Result<Self, PaintError> {
        check_dimensions(width, height)?;
        Ok(Self {
            pixels: RgbaImage::new(width, height),
            generation: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Bumped every time a render target on this surface commits.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reallocate to new dimensions, discarding the old pixels.
    /// Returns `Ok(false)` when the size is unchanged and nothing happened.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool, PaintError> {
        if self.size() == (width, height) {
            return Ok(false);
        }
        check_dimensions(width, height)?;
        self.pixels = RgbaImage::new(width, height);
        self.generation = self.generation.wrapping_add(1);
        Ok(true)
    }

    /// Read back one pixel, `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.width() && y < self.height() {
            Some(*self.pixels.get_pixel(x, y))
        } else {
            None
        }
    }

    /// Tightly packed RGBA rows.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Bind as the current draw target.  The viewport covers the whole surface.
    pub fn bind(&mut self) -> RenderTarget<'_> {
        let viewport = PixelRect::from_size(self.width(), self.height());
        RenderTarget {
            surface: self,
            viewport,
        }
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<(), PaintError> {
    if width == 0 || height == 0 || width > MAX_SURFACE_DIM || height > MAX_SURFACE_DIM {
        return Err(PaintError::SurfaceAllocation { width, height });
    }
    Ok(())
}

// ============================================================================
// RENDER TARGET
// ============================================================================

pub struct RenderTarget<'a> {
    surface: &'a mut Surface,
    viewport: PixelRect,
}

impl RenderTarget<'_> {
    pub fn viewport(&self) -> PixelRect {
        self.viewport
    }

    pub fn size(&self) -> (u32, u32) {
        self.surface.size()
    }

    /// Fill the viewport with `color`.
    pub fn clear(&mut self, color: Rgba<u8>) {
        let vp = self.viewport;
        self.rows_mut(vp.min_y, vp.max_y).for_each(|(_, row)| {
            for px in row[vp.min_x as usize * 4..vp.max_x as usize * 4].chunks_exact_mut(4) {
                px.copy_from_slice(&color.0);
            }
        });
    }

    /// Overwrite the whole surface with tightly packed RGBA rows
    /// (used when the pixels were produced elsewhere, e.g. a GPU readback).
    pub fn write_raw(&mut self, data: &[u8]) -> bool {
        let raw: &mut [u8] = &mut self.surface.pixels;
        if raw.len() != data.len() {
            log::warn!(
                "write_raw: expected {} bytes, got {}",
                raw.len(),
                data.len()
            );
            return false;
        }
        raw.copy_from_slice(data);
        true
    }

    /// Composite `src` over the target, pixel for pixel.  Surfaces of
    /// different sizes only overlap in their common top-left region.
    pub fn draw_surface(&mut self, src: &Surface) {
        let vp = self.viewport;
        let max_x = vp.max_x.min(src.width());
        let max_y = vp.max_y.min(src.height());
        if vp.min_x >= max_x || vp.min_y >= max_y {
            return;
        }
        let src_stride = src.width() as usize * 4;
        let src_raw = src.as_raw();
        self.rows_mut(vp.min_y, max_y).for_each(|(y, row)| {
            let src_row = &src_raw[y as usize * src_stride..(y as usize + 1) * src_stride];
            for x in vp.min_x as usize..max_x as usize {
                let s = &src_row[x * 4..x * 4 + 4];
                over_pixel(&mut row[x * 4..x * 4 + 4], s);
            }
        });
    }

    /// Draw `src` through an arbitrary mapping: `map` takes the centre of a
    /// target pixel and returns the source pixel coordinate it shows, or
    /// `None` if nothing is there.  Nearest-neighbour sampling.
    pub fn draw_surface_mapped<F>(&mut self, src: &Surface, map: F)
    where
        F: Fn(f64, f64) -> Option<Point> + Sync,
    {
        let vp = self.viewport;
        let (src_w, src_h) = src.size();
        let src_stride = src_w as usize * 4;
        let src_raw = src.as_raw();
        self.rows_mut(vp.min_y, vp.max_y).for_each(|(y, row)| {
            let py = y as f64 + 0.5;
            for x in vp.min_x..vp.max_x {
                let Some(p) = map(x as f64 + 0.5, py) else { continue };
                if !(p.x >= 0.0 && p.y >= 0.0) {
                    continue;
                }
                let (sx, sy) = (p.x.floor() as u32, p.y.floor() as u32);
                if sx >= src_w || sy >= src_h {
                    continue;
                }
                let i = sy as usize * src_stride + sx as usize * 4;
                let xi = x as usize * 4;
                over_pixel(&mut row[xi..xi + 4], &src_raw[i..i + 4]);
            }
        });
    }

    /// One circular stamp with a smooth falloff.  Returns `false` when the
    /// stamp had no footprint inside the viewport.
    pub fn stamp(
        &mut self,
        center: Point,
        radius: f64,
        hardness: f32,
        opacity: f32,
        color: [f32; 3],
        mode: BlendMode,
    ) -> bool {
        if !(radius > 0.0) || !center.is_finite() || opacity <= 0.0 {
            return false;
        }
        let rect = self.viewport.clip_disc(center, radius);
        if rect.is_empty() {
            return false;
        }
        let radius_f = radius as f32;
        self.rows_mut(rect.min_y, rect.max_y).for_each(|(y, row)| {
            let dy = (y as f64 + 0.5 - center.y) as f32;
            for x in rect.min_x..rect.max_x {
                let dx = (x as f64 + 0.5 - center.x) as f32;
                let dist = (dx * dx + dy * dy).sqrt();
                let coverage = stamp_coverage(dist, radius_f, hardness) * opacity;
                if coverage <= 0.0 {
                    continue;
                }
                let xi = x as usize * 4;
                blend_pixel(&mut row[xi..xi + 4], color, coverage, mode);
            }
        });
        true
    }

    /// Thin ring whose colour is the inverse of what is under it, so it stays
    /// visible on any background.  Used for the brush cursor outline.
    pub fn draw_ring(&mut self, center: Point, radius: f64, thickness: f32) {
        if !(radius > 0.0) || !center.is_finite() {
            return;
        }
        let half = thickness.max(0.5) * 0.5;
        let rect = self.viewport.clip_disc(center, radius + half as f64 + 1.0);
        if rect.is_empty() {
            return;
        }
        let radius_f = radius as f32;
        self.rows_mut(rect.min_y, rect.max_y).for_each(|(y, row)| {
            let dy = (y as f64 + 0.5 - center.y) as f32;
            for x in rect.min_x..rect.max_x {
                let dx = (x as f64 + 0.5 - center.x) as f32;
                let edge = ((dx * dx + dy * dy).sqrt() - radius_f).abs() - half;
                let coverage = 1.0 - edge.clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let xi = x as usize * 4;
                let px = &mut row[xi..xi + 4];
                for c in px.iter_mut().take(3) {
                    let v = *c as f32;
                    *c = (v + (255.0 - 2.0 * v) * coverage).round() as u8;
                }
            }
        });
    }

    /// Row-parallel iterator over `(y, row_bytes)` for rows `y0..y1`.
    fn rows_mut(
        &mut self,
        y0: u32,
        y1: u32,
    ) -> impl IndexedParallelIterator<Item = (u32, &mut [u8])> + '_ {
        let stride = self.surface.width() as usize * 4;
        let raw: &mut [u8] = &mut self.surface.pixels;
        let y1 = y1.max(y0);
        raw[y0 as usize * stride..y1 as usize * stride]
            .par_chunks_exact_mut(stride)
            .enumerate()
            .map(move |(i, row)| (y0 + i as u32, row))
    }
}

impl Drop for RenderTarget<'_> {
    fn drop(&mut self) {
        self.surface.generation = self.surface.generation.wrapping_add(1);
    }
}

// ============================================================================
// PIXEL MATH
// ============================================================================

/// Stamp alpha at `dist` from the centre: a solid core, then a smoothstep
/// fade that reaches zero at `radius`.  Higher `hardness` means a thinner fade.
pub fn stamp_coverage(dist: f32, radius: f32, hardness: f32) -> f32 {
    if radius <= 0.0 || dist >= radius {
        return 0.0;
    }
    let hardness = hardness.clamp(0.0, 0.99);
    let fade = (radius * (1.0 - hardness)).max(1.0).min(radius);
    let solid = radius - fade;
    if dist <= solid {
        return 1.0;
    }
    let x = 1.0 - ((dist - solid) / fade).clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

/// Apply `color` at `coverage` to one RGBA8 pixel.
pub fn blend_pixel(px: &mut [u8], color: [f32; 3], coverage: f32, mode: BlendMode) {
    let a = coverage.clamp(0.0, 1.0);
    let dst_a = px[3] as f32 / 255.0;
    match mode {
        BlendMode::Over => {
            let out_a = a + dst_a * (1.0 - a);
            if out_a <= 0.0 {
                return;
            }
            for c in 0..3 {
                let d = px[c] as f32 / 255.0;
                px[c] = to_u8((color[c] * a + d * dst_a * (1.0 - a)) / out_a);
            }
            px[3] = to_u8(out_a);
        }
        BlendMode::PreserveAlpha => {
            for c in 0..3 {
                let d = px[c] as f32 / 255.0;
                px[c] = to_u8(color[c] * a + d * (1.0 - a));
            }
        }
        BlendMode::Erase => {
            px[3] = to_u8(dst_a * (1.0 - a));
            if px[3] == 0 {
                px[0..3].fill(0);
            }
        }
    }
}

/// Straight-alpha source-over for two RGBA8 pixels.
fn over_pixel(dst: &mut [u8], src: &[u8]) {
    match src[3] {
        0 => {}
        255 => dst.copy_from_slice(src),
        sa => {
            let color = [
                src[0] as f32 / 255.0,
                src[1] as f32 / 255.0,
                src[2] as f32 / 255.0,
            ];
            blend_pixel(dst, color, sa as f32 / 255.0, BlendMode::Over);
        }
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
