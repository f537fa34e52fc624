// ============================================================================
// EDITOR SETTINGS — key=value file in the per-user config directory
// ============================================================================

use std::path::{Path, PathBuf};

use crate::ops::{Interpolation, Operation};
use crate::ops::catalog::DEFAULT_CANNY;

/// Settings that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Maximum number of undo steps (history capacity).
    pub max_undo_steps: usize,
    /// History memory cap in MiB (0 = no cap).
    pub history_memory_mb: usize,
    /// Canny thresholds used by the edges button.
    pub canny_low: f32,
    pub canny_high: f32,
    /// Resampling filter for percentage resize.
    pub resize_filter: Interpolation,
    /// JPEG quality (1–100).
    pub jpeg_quality: u8,
    /// Compute slider previews on the rayon pool instead of inline.
    pub async_preview: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            max_undo_steps: 25,
            history_memory_mb: 0,
            canny_low: DEFAULT_CANNY.0,
            canny_high: DEFAULT_CANNY.1,
            resize_filter: Interpolation::Bilinear,
            jpeg_quality: 90,
            async_preview: true,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/retouch/retouch_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Retouch\retouch_settings.cfg
    /// On macOS:   ~/Library/Application Support/Retouch/retouch_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("Retouch").join("retouch_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Retouch")
                    .join("retouch_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("retouch").join("retouch_settings.cfg"))
        }
    }

    /// Load settings from the default location (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to the default location.  Failures are logged, not fatal.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log_warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "max_undo_steps={}\n\
             history_memory_mb={}\n\
             canny_low={}\n\
             canny_high={}\n\
             resize_filter={}\n\
             jpeg_quality={}\n\
             async_preview={}\n",
            self.max_undo_steps,
            self.history_memory_mb,
            self.canny_low,
            self.canny_high,
            self.resize_filter.label(),
            self.jpeg_quality,
            self.async_preview,
        )
    }

    /// Parse `key=value` lines.  Unknown keys and unparsable values are
    /// skipped so a damaged file degrades to defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "max_undo_steps" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.max_undo_steps = v.max(1);
                    }
                }
                "history_memory_mb" => {
                    if let Ok(v) = val.parse() {
                        s.history_memory_mb = v;
                    }
                }
                "canny_low" => {
                    if let Ok(v) = val.parse::<f32>() && v >= 0.0 {
                        s.canny_low = v;
                    }
                }
                "canny_high" => {
                    if let Ok(v) = val.parse::<f32>() && v >= 0.0 {
                        s.canny_high = v;
                    }
                }
                "resize_filter" => {
                    if let Ok(v) = val.parse() {
                        s.resize_filter = v;
                    }
                }
                "jpeg_quality" => {
                    if let Ok(v) = val.parse::<u8>() {
                        s.jpeg_quality = v.clamp(1, 100);
                    }
                }
                "async_preview" => {
                    if let Ok(v) = val.parse() {
                        s.async_preview = v;
                    }
                }
                _ => {}
            }
        }
        if s.canny_low > s.canny_high {
            s.canny_low = DEFAULT_CANNY.0;
            s.canny_high = DEFAULT_CANNY.1;
        }
        s
    }

    pub fn history_memory_bytes(&self) -> Option<usize> {
        (self.history_memory_mb > 0).then(|| self.history_memory_mb.saturating_mul(1024 * 1024))
    }

    /// The edges operation with the configured thresholds.
    pub fn edges_operation(&self) -> Operation {
        Operation::Edges {
            low: self.canny_low,
            high: self.canny_high,
        }
    }

    /// Apply configured defaults to an operation parsed without them.
    pub fn configure(&self, op: Operation) -> Operation {
        match op {
            Operation::Resize { percent, .. } => Operation::Resize {
                percent,
                filter: self.resize_filter,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_text() {
        let s = EditorSettings {
            max_undo_steps: 7,
            history_memory_mb: 64,
            canny_low: 30.0,
            canny_high: 90.5,
            resize_filter: Interpolation::Lanczos3,
            jpeg_quality: 70,
            async_preview: false,
        };
        assert_eq!(EditorSettings::from_config_str(&s.to_config_string()), s);
    }

    #[test]
    fn garbage_degrades_to_defaults() {
        let s = EditorSettings::from_config_str(
            "max_undo_steps=lots\nnonsense\njpeg_quality=900\nresize_filter=fuzzy\n# comment\n",
        );
        assert_eq!(s, EditorSettings::default());
    }

    #[test]
    fn inverted_canny_thresholds_fall_back() {
        let s = EditorSettings::from_config_str("canny_low=200\ncanny_high=100\n");
        assert_eq!((s.canny_low, s.canny_high), DEFAULT_CANNY);
    }

    #[test]
    fn memory_cap_conversion() {
        let mut s = EditorSettings::default();
        assert_eq!(s.history_memory_bytes(), None);
        s.history_memory_mb = 2;
        assert_eq!(s.history_memory_bytes(), Some(2 * 1024 * 1024));
    }

    #[test]
    fn configure_injects_resize_filter() {
        let s = EditorSettings {
            resize_filter: Interpolation::Nearest,
            ..Default::default()
        };
        let op = s.configure("resize=50".parse().unwrap());
        assert_eq!(op, Operation::Resize { percent: 50, filter: Interpolation::Nearest });
        assert_eq!(s.configure(Operation::Grayscale), Operation::Grayscale);
    }

    #[test]
    fn save_and_load_file() {
        let path = std::env::temp_dir()
            .join(format!("retouch-settings-{}", uuid::Uuid::new_v4()))
            .join("retouch_settings.cfg");
        let s = EditorSettings {
            max_undo_steps: 3,
            ..Default::default()
        };
        s.save_to(&path).unwrap();
        assert_eq!(EditorSettings::load_from(&path), s);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
