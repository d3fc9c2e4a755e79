// ============================================================================
// ERRORS — fatal / construction-time failures
// ============================================================================
//
// Only failures nothing downstream can recover from live here.  Lookups of
// missing layers, empty stacks and missing selections are plain `Option`s or
// no-ops at the call site and never become a `PaintError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaintError {
    /// Zero-sized or oversized surface request.
    #[error("cannot allocate a {width}x{height} surface")]
    SurfaceAllocation { width: u32, height: u32 },

    #[error("no GPU adapter available")]
    NoAdapter,

    #[error("GPU device request failed: {0}")]
    Device(String),

    #[error("GPU readback failed: {0}")]
    Readback(String),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
