// ============================================================================
// SETTINGS — persisted key=value application preferences
// ============================================================================

use std::path::PathBuf;

use crate::brush::{BrushKind, BrushManager, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE};
use crate::color::Color;
use crate::surface::MAX_SURFACE_DIM;
use crate::tools::DEFAULT_ZOOM_SENSITIVITY;

const SETTINGS_FILE: &str = "layerpaint_settings.cfg";

#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Size of the canvas created at startup.
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Base colour under all layers.
    pub background_color: Color,
    /// Colour around the canvas in the viewport.
    pub view_background: Color,
    pub gpu_acceleration: bool,
    /// "auto", "low power" or "high performance".
    pub preferred_gpu: String,
    pub zoom_sensitivity: f32,
    pub pen_size: f32,
    pub eraser_size: f32,
    /// Let the eraser clear pixels on alpha-locked layers.
    pub eraser_ignores_alpha_lock: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            canvas_width: 2000,
            canvas_height: 2000,
            background_color: Color::WHITE,
            view_background: Color::BLACK,
            gpu_acceleration: true,
            preferred_gpu: "auto".to_string(),
            zoom_sensitivity: DEFAULT_ZOOM_SENSITIVITY,
            pen_size: 40.0,
            eraser_size: 60.0,
            eraser_ignores_alpha_lock: false,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/layerpaint/layerpaint_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\LayerPaint\layerpaint_settings.cfg
    /// On macOS:   ~/Library/Application Support/LayerPaint/layerpaint_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        let dir = config_dir()?;
        if let Err(e) = std::fs::create_dir_all(&dir) {
            log::warn!("settings: cannot create {}: {}", dir.display(), e);
        }
        Some(dir.join(SETTINGS_FILE))
    }

    /// Load settings from disk (defaults if the file is missing).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                log::info!("settings: loaded {}", path.display());
                Self::from_cfg_str(&content)
            }
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        match std::fs::write(&path, self.to_cfg_string()) {
            Ok(()) => log::info!("settings: saved {}", path.display()),
            Err(e) => log::warn!("settings: failed to write {}: {}", path.display(), e),
        }
    }

    pub fn to_cfg_string(&self) -> String {
        format!(
            "canvas_width={}\n\
             canvas_height={}\n\
             background_color={}\n\
             view_background={}\n\
             gpu_acceleration={}\n\
             preferred_gpu={}\n\
             zoom_sensitivity={}\n\
             pen_size={}\n\
             eraser_size={}\n\
             eraser_ignores_alpha_lock={}\n",
            self.canvas_width,
            self.canvas_height,
            self.background_color.to_cfg_string(),
            self.view_background.to_cfg_string(),
            self.gpu_acceleration,
            self.preferred_gpu,
            self.zoom_sensitivity,
            self.pen_size,
            self.eraser_size,
            self.eraser_ignores_alpha_lock,
        )
    }

    /// Parse a settings file.  Unknown keys and bad values are skipped and
    /// the default kept.
    pub fn from_cfg_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else {
                log::warn!("settings: ignoring line without '=': {:?}", line);
                continue;
            };
            let (key, val) = (key.trim(), val.trim());
            let ok = match key {
                "canvas_width" => parse_dim(val).map(|v| s.canvas_width = v).is_some(),
                "canvas_height" => parse_dim(val).map(|v| s.canvas_height = v).is_some(),
                "background_color" => Color::from_cfg_str(val)
                    .map(|c| s.background_color = c)
                    .is_some(),
                "view_background" => Color::from_cfg_str(val)
                    .map(|c| s.view_background = c)
                    .is_some(),
                "gpu_acceleration" => parse_bool(val).map(|v| s.gpu_acceleration = v).is_some(),
                "preferred_gpu" => {
                    s.preferred_gpu = val.to_string();
                    true
                }
                "zoom_sensitivity" => val
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite() && *v > 1.0)
                    .map(|v| s.zoom_sensitivity = v)
                    .is_some(),
                "pen_size" => parse_brush_size(val).map(|v| s.pen_size = v).is_some(),
                "eraser_size" => parse_brush_size(val).map(|v| s.eraser_size = v).is_some(),
                "eraser_ignores_alpha_lock" => parse_bool(val)
                    .map(|v| s.eraser_ignores_alpha_lock = v)
                    .is_some(),
                _ => {
                    log::warn!("settings: unknown key {:?}", key);
                    continue;
                }
            };
            if !ok {
                log::warn!("settings: bad value for {}: {:?}", key, val);
            }
        }
        s
    }

    /// Pen and Eraser configured from these settings, Pen selected.
    pub fn brush_manager(&self) -> BrushManager {
        let mut manager = BrushManager::new();
        if let Some(pen) = manager
            .find_by_kind(BrushKind::Pen)
            .and_then(|id| manager.get_mut(id))
        {
            pen.set_size(self.pen_size);
        }
        if let Some(eraser) = manager
            .find_by_kind(BrushKind::Eraser)
            .and_then(|id| manager.get_mut(id))
        {
            eraser.set_size(self.eraser_size);
            eraser.set_ignores_alpha_lock(self.eraser_ignores_alpha_lock);
        }
        manager
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_dim(val: &str) -> Option<u32> {
    val.parse::<u32>()
        .ok()
        .filter(|v| (1..=MAX_SURFACE_DIM).contains(v))
}

fn parse_brush_size(val: &str) -> Option<f32> {
    val.parse::<f32>()
        .ok()
        .filter(|v| (MIN_BRUSH_SIZE..=MAX_BRUSH_SIZE).contains(v))
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let base = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                PathBuf::from(home).join(".config")
            });
        Some(base.join("layerpaint"))
    }
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()?;
        Some(PathBuf::from(appdata).join("LayerPaint"))
    }
    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
        Some(
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("LayerPaint"),
        )
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_file_format() {
        let s = AppSettings {
            canvas_width: 640,
            canvas_height: 480,
            background_color: Color::from_rgb8(10, 20, 30),
            gpu_acceleration: false,
            preferred_gpu: "low power".into(),
            zoom_sensitivity: 1.25,
            pen_size: 12.0,
            eraser_ignores_alpha_lock: true,
            ..AppSettings::default()
        };
        assert_eq!(AppSettings::from_cfg_str(&s.to_cfg_string()), s);
    }

    #[test]
    fn bad_lines_keep_defaults() {
        let s = AppSettings::from_cfg_str(
            "# comment\n\
             canvas_width=0\n\
             canvas_height=abc\n\
             zoom_sensitivity=0.5\n\
             pen_size=5000\n\
             mystery=1\n\
             no equals sign\n\
             gpu_acceleration=maybe\n\
             eraser_size=25\n",
        );
        let d = AppSettings::default();
        assert_eq!(s.canvas_width, d.canvas_width);
        assert_eq!(s.canvas_height, d.canvas_height);
        assert_eq!(s.zoom_sensitivity, d.zoom_sensitivity);
        assert_eq!(s.pen_size, d.pen_size);
        assert_eq!(s.gpu_acceleration, d.gpu_acceleration);
        assert_eq!(s.eraser_size, 25.0);
    }

    #[test]
    fn brush_manager_uses_configured_sizes() {
        let s = AppSettings {
            pen_size: 7.0,
            eraser_size: 70.0,
            eraser_ignores_alpha_lock: true,
            ..AppSettings::default()
        };
        let m = s.brush_manager();
        let pen = m.selected().unwrap();
        assert_eq!((pen.kind(), pen.size()), (BrushKind::Pen, 7.0));
        let eraser = m.get(m.find_by_kind(BrushKind::Eraser).unwrap()).unwrap();
        assert_eq!(eraser.size(), 70.0);
        assert!(eraser.ignores_alpha_lock());
    }
}
