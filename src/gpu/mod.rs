// ============================================================================
// GPU MODULE — optional hardware path for displaying the canvas
// ============================================================================
//
// Architecture:
//   context.rs   — wgpu Device, Queue, adapter init
//   shaders.rs   — WGSL shader source (inline strings)
//   texture.rs   — GPU mirrors of CPU surfaces + offscreen targets
//   presenter.rs — view-transform pass and readback
//
// The CPU surfaces stay canonical; everything here is a cache.
// ============================================================================

pub mod context;
pub mod presenter;
pub mod shaders;
pub mod texture;

pub use context::GpuContext;
pub use presenter::ViewPresenter;

/// Round a texture row (`width * 4` bytes) up to wgpu's copy alignment.
pub fn aligned_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_256_bytes() {
        assert_eq!(aligned_bytes_per_row(1), 256);
        assert_eq!(aligned_bytes_per_row(64), 256);
        assert_eq!(aligned_bytes_per_row(65), 512);
    }
}
