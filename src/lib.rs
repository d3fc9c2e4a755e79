//! LayerPaint: a layered raster paint core.
//!
//! CPU surfaces hold every pixel; the layer stack, brushes and view
//! transform operate on them directly.  The `gpu` module is an optional
//! accelerator for the final view pass and the `app` module is the eframe
//! desktop shell.

#![allow(clippy::too_many_arguments)]

pub mod app;
pub mod brush;
pub mod canvas;
pub mod cli;
pub mod color;
pub mod error;
pub mod gpu;
pub mod layer;
pub mod logger;
pub mod settings;
pub mod surface;
pub mod tools;
pub mod user_state;
pub mod view;

pub use brush::{Brush, BrushId, BrushKind, BrushManager};
pub use canvas::{Canvas, CursorOverlay};
pub use color::Color;
pub use error::PaintError;
pub use layer::{LayerId, LayerInfo};
pub use settings::AppSettings;
pub use surface::Surface;
pub use tools::{ToolKind, ToolManager};
pub use user_state::{CursorState, UserState};
pub use view::ViewTransform;
