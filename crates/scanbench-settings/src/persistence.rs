//! Settings persistence.
//!
//! JSON load/save in the platform config directory. Saves write to a
//! sibling temp file and rename it into place, so a crash mid-write never
//! leaves a truncated settings file behind.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::BenchSettings;
use crate::error::{SettingsError, SettingsResult};

/// File name under the platform config directory.
const SETTINGS_FILE: &str = "settings.json";

/// Application directory under the platform config root.
const APP_DIR: &str = "scanbench";

/// Resolve the platform-specific settings file path, creating the directory
pub fn default_settings_path() -> SettingsResult<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| SettingsError::ConfigDirectory("no platform config directory".to_string()))?;
    let dir = base.join(APP_DIR);
    fs::create_dir_all(&dir)?;
    Ok(dir.join(SETTINGS_FILE))
}

/// Load settings from a file, falling back to defaults when it is missing
///
/// A missing file is the normal first-run case; a present-but-invalid file
/// is an error so a typo never silently resets the bench configuration.
pub fn load_from_file(path: &Path) -> SettingsResult<BenchSettings> {
    if !path.exists() {
        debug!(path = %path.display(), "No settings file, using defaults");
        return Ok(BenchSettings::default());
    }
    let text = fs::read_to_string(path)
        .map_err(|e| SettingsError::LoadError(format!("{}: {e}", path.display())))?;
    let settings: BenchSettings = serde_json::from_str(&text)?;
    settings.validate()?;
    Ok(settings)
}

/// Save settings to a file via write-then-rename
pub fn save_to_file(settings: &BenchSettings, path: &Path) -> SettingsResult<()> {
    settings.validate()?;
    let json = serde_json::to_string_pretty(settings)?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .map_err(|e| SettingsError::SaveError(format!("{}: {e}", tmp.display())))?;
    if let Err(e) = fs::rename(&tmp, path) {
        // Leave no temp file behind on a failed rename.
        if let Err(cleanup) = fs::remove_file(&tmp) {
            warn!("Could not remove temp settings file: {cleanup}");
        }
        return Err(SettingsError::SaveError(format!("{}: {e}", path.display())));
    }
    debug!(path = %path.display(), "Settings saved");
    Ok(())
}

/// Load settings from the platform default location
pub fn load() -> SettingsResult<BenchSettings> {
    load_from_file(&default_settings_path()?)
}

/// Save settings to the platform default location
pub fn save(settings: &BenchSettings) -> SettingsResult<()> {
    save_to_file(settings, &default_settings_path()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = load_from_file(&path).unwrap();
        assert_eq!(settings, BenchSettings::default());
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = BenchSettings::default();
        settings.acquisition.channel_count = 6;
        settings.acquisition.desired_rate_hz = 75.0;
        settings.motion.coarse_threshold_mm = 12.5;
        settings.scan.x_nb_points = 42;

        save_to_file(&settings, &path).unwrap();
        let loaded = load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
        // No temp file left behind.
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupted_file_is_an_error_not_a_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_from_file(&path),
            Err(SettingsError::JsonError(_))
        ));
    }

    #[test]
    fn invalid_settings_refuse_to_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = BenchSettings::default();
        settings.acquisition.channel_count = 0;
        assert!(save_to_file(&settings, &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"acquisition": {"channel_count": 8, "stabilization_delay_ms": 100, "averaging_per_position": 4, "desired_rate_hz": 40.0, "max_spatial_gap_mm": 0.5}}"#).unwrap();
        let settings = load_from_file(&path).unwrap();
        assert_eq!(settings.acquisition.channel_count, 8);
        assert_eq!(settings.scan, crate::config::ScanDefaults::default());
    }
}
