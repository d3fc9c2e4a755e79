// ============================================================================
// LayerPaint CLI — headless stroke rendering via command-line arguments
// ============================================================================
//
// Usage examples:
//   layerpaint --size 200x100 --stroke "10,10 190,90" --output line.png
//   layerpaint -o dots.png --color ff0000 --brush-size 8 --stroke "50,50"
//   layerpaint -o fade.png --stroke "10,50,1.0 190,50,0.1" --background 202020
//
// No window is opened in CLI mode.  Strokes run through the same
// screen-to-canvas path as interactive painting, with the viewport sized to
// the canvas so the mapping is the identity.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use kurbo::Size;

use crate::brush::{Brush, BrushKind};
use crate::canvas::Canvas;
use crate::color::Color;
use crate::error::PaintError;
use crate::settings::AppSettings;
use crate::user_state::CursorState;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BrushArg {
    Pen,
    Eraser,
}

impl From<BrushArg> for BrushKind {
    fn from(arg: BrushArg) -> Self {
        match arg {
            BrushArg::Pen => BrushKind::Pen,
            BrushArg::Eraser => BrushKind::Eraser,
        }
    }
}

/// LayerPaint headless renderer.
///
/// Paints stroke polylines onto a fresh single-layer canvas and writes a PNG.
#[derive(Parser, Debug)]
#[command(
    name = "layerpaint",
    about = "LayerPaint headless stroke renderer",
    long_about = "Paint one or more stroke polylines onto a new canvas and save the\n\
                  flattened result as PNG, without opening the GUI.\n\n\
                  Example:\n  \
                  layerpaint --size 200x100 --stroke \"10,10 190,90\" --output line.png"
)]
pub struct CliArgs {
    /// Output PNG path.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Canvas size as WIDTHxHEIGHT.  Defaults to the configured canvas size.
    #[arg(short, long, value_name = "WxH")]
    pub size: Option<String>,

    /// A polyline of "x,y[,pressure]" points separated by spaces, in canvas
    /// pixels.  Repeat for several strokes.
    #[arg(long, value_name = "POINTS")]
    pub stroke: Vec<String>,

    #[arg(short, long, value_enum, default_value_t = BrushArg::Pen)]
    pub brush: BrushArg,

    /// Brush colour as RRGGBB.
    #[arg(short, long, default_value = "000000", value_name = "RRGGBB")]
    pub color: String,

    /// Brush radius in canvas pixels.  Defaults to the configured size.
    #[arg(long, value_name = "PX")]
    pub brush_size: Option<f32>,

    /// Brush opacity, 0.0-1.0.
    #[arg(long, default_value_t = 1.0)]
    pub opacity: f32,

    /// Canvas base colour as RRGGBB.  Defaults to the configured colour.
    #[arg(long, value_name = "RRGGBB")]
    pub background: Option<String>,

    /// Print per-stroke stamp counts and timing.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when the process arguments ask for headless mode.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        is_cli_args(std::env::args().skip(1))
    }
}

fn is_cli_args<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().any(|a| {
        let a = a.as_ref();
        a == "--output" || a == "-o" || a.starts_with("--output=")
    })
}

// ============================================================================
// Public entry point
// ============================================================================

/// Render and save, returning an OS exit code.
pub fn run(args: CliArgs, settings: &AppSettings) -> ExitCode {
    let start = Instant::now();
    match render(&args, settings) {
        Ok(stamps) => {
            if args.verbose {
                println!(
                    "[ok] {} ({} stamps, {:.1}ms)",
                    args.output.display(),
                    stamps,
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("cli: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Build the canvas, paint every stroke, save.  Returns the total stamp count.
pub fn render(args: &CliArgs, settings: &AppSettings) -> Result<usize, PaintError> {
    let (width, height) = match &args.size {
        Some(s) => parse_size(s)?,
        None => (settings.canvas_width, settings.canvas_height),
    };
    let color = parse_color(&args.color)?;
    let background = match &args.background {
        Some(s) => parse_color(s)?,
        None => settings.background_color,
    };
    let strokes = args
        .stroke
        .iter()
        .map(|s| parse_stroke(s))
        .collect::<Result<Vec<_>, _>>()?;

    let brush = build_brush(args, settings)?;

    let mut canvas = Canvas::new(width, height)?;
    canvas.set_base_color(background);
    canvas
        .view_mut()
        .set_viewport(Size::new(width as f64, height as f64));
    let layer = canvas.insert_layer_above(None)?;

    let mut total = 0;
    for (i, points) in strokes.iter().enumerate() {
        let mut prev = None;
        let mut stamps = 0;
        for &point in points {
            stamps += canvas.draw_stroke(layer, &brush, prev, point, color);
            prev = Some(point);
        }
        if args.verbose {
            println!("  stroke {}: {} points, {} stamps", i + 1, points.len(), stamps);
        }
        total += stamps;
    }

    canvas.save(&args.output)?;
    Ok(total)
}

fn build_brush(args: &CliArgs, settings: &AppSettings) -> Result<Brush, PaintError> {
    let kind = BrushKind::from(args.brush);
    let manager = settings.brush_manager();
    let mut brush = manager
        .find_by_kind(kind)
        .and_then(|id| manager.get(id))
        .cloned()
        .ok_or_else(|| PaintError::InvalidArgument(format!("no {} brush", kind.name())))?;
    if let Some(size) = args.brush_size {
        if !(size > 0.0) {
            return Err(PaintError::InvalidArgument(format!("brush size {}", size)));
        }
        brush.set_size(size);
    }
    if !(0.0..=1.0).contains(&args.opacity) {
        return Err(PaintError::InvalidArgument(format!("opacity {}", args.opacity)));
    }
    brush.set_opacity(args.opacity);
    Ok(brush)
}

// ============================================================================
// Argument parsing helpers
// ============================================================================

/// "640x480" -> (640, 480)
pub fn parse_size(s: &str) -> Result<(u32, u32), PaintError> {
    let bad = || PaintError::InvalidArgument(format!("size '{}', expected WIDTHxHEIGHT", s));
    let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(bad)?;
    let w = w.trim().parse::<u32>().map_err(|_| bad())?;
    let h = h.trim().parse::<u32>().map_err(|_| bad())?;
    if w == 0 || h == 0 {
        return Err(bad());
    }
    Ok((w, h))
}

pub fn parse_color(s: &str) -> Result<Color, PaintError> {
    Color::from_hex(s)
        .ok_or_else(|| PaintError::InvalidArgument(format!("colour '{}', expected RRGGBB", s)))
}

/// "x,y[,p] x,y[,p] ..." -> cursor samples.  Pressure defaults to 1.
pub fn parse_stroke(s: &str) -> Result<Vec<CursorState>, PaintError> {
    let points = s
        .split_whitespace()
        .map(parse_point)
        .collect::<Result<Vec<_>, _>>()?;
    if points.is_empty() {
        return Err(PaintError::InvalidArgument("empty stroke".to_string()));
    }
    Ok(points)
}

fn parse_point(s: &str) -> Result<CursorState, PaintError> {
    let bad = || PaintError::InvalidArgument(format!("point '{}', expected x,y[,pressure]", s));
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| bad())?;
    if parts.iter().any(|v| !v.is_finite()) {
        return Err(bad());
    }
    match parts[..] {
        [x, y] => Ok(CursorState::at(x, y)),
        [x, y, p] => Ok(CursorState::new(kurbo::Point::new(x, y), p as f32)),
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_mode_detection() {
        assert!(is_cli_args(["-o", "x.png"]));
        assert!(is_cli_args(["--size", "4x4", "--output=x.png"]));
        assert!(!is_cli_args(["--size", "4x4"]));
        assert!(!is_cli_args(Vec::<String>::new()));
    }

    #[test]
    fn size_parsing() {
        assert_eq!(parse_size("640x480").unwrap(), (640, 480));
        assert_eq!(parse_size(" 3X2 ").unwrap(), (3, 2));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("640").is_err());
        assert!(parse_size("ax4").is_err());
    }

    #[test]
    fn stroke_parsing() {
        let pts = parse_stroke("1,2 3.5,4,0.25").unwrap();
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[0], CursorState::at(1.0, 2.0));
        assert_eq!(pts[1].pressure, 0.25);
        assert!(parse_stroke("").is_err());
        assert!(parse_stroke("1").is_err());
        assert!(parse_stroke("1,2,3,4").is_err());
        assert!(parse_stroke("1,nan").is_err());
    }

    #[test]
    fn clap_accepts_the_documented_flags() {
        let args = CliArgs::try_parse_from([
            "layerpaint",
            "--size",
            "10x10",
            "--stroke",
            "1,1 9,9",
            "--stroke",
            "5,5",
            "--brush",
            "eraser",
            "--opacity",
            "0.5",
            "-o",
            "out.png",
        ])
        .unwrap();
        assert_eq!(args.stroke.len(), 2);
        assert_eq!(args.brush, BrushArg::Eraser);
        assert_eq!(args.output, PathBuf::from("out.png"));
        assert!(CliArgs::try_parse_from(["layerpaint", "--size", "1x1"]).is_err());
    }
}
