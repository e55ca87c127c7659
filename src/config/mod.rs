use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::frame::{CatalogResult, Frame, FrameCatalog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "framecam";
const APP_CONFIG_FILE: &str = "config.json";
const DEFAULT_SHARE_TITLE: &str = "Share Photo";
const DEFAULT_STALE_SCRATCH_HOURS: u64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FrameEntry {
    pub id: u32,
    pub name: String,
    pub path: PathBuf,
}

/// Application-level settings from `config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub frames: Vec<FrameEntry>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    #[serde(default)]
    pub pictures_dir: Option<PathBuf>,
    #[serde(default)]
    pub share_title: Option<String>,
    #[serde(default)]
    pub camera_command: Option<String>,
    #[serde(default)]
    pub stale_scratch_hours: Option<u64>,
    /// Absent on platforms without runtime permissions.
    #[serde(default)]
    pub android_api_level: Option<u32>,
}

impl AppConfig {
    /// Relative frame paths resolve against `base_dir`.
    pub fn frame_catalog(&self, base_dir: Option<&Path>) -> CatalogResult<FrameCatalog> {
        let frames = self
            .frames
            .iter()
            .map(|entry| {
                let path = match base_dir {
                    Some(base) if entry.path.is_relative() => base.join(&entry.path),
                    _ => entry.path.clone(),
                };
                Frame::from_path(entry.id, entry.name.clone(), path)
            })
            .collect();
        FrameCatalog::new(frames)
    }

    pub fn share_title(&self) -> &str {
        self.share_title.as_deref().unwrap_or(DEFAULT_SHARE_TITLE)
    }

    pub fn stale_scratch_hours(&self) -> u64 {
        self.stale_scratch_hours
            .unwrap_or(DEFAULT_STALE_SCRATCH_HOURS)
    }
}

/// Loaded configuration plus the directory it came from.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub config_dir: Option<PathBuf>,
}

pub fn load_app_config() -> LoadedConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> LoadedConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return LoadedConfig::default(),
    };
    let config_dir = path.parent().map(Path::to_path_buf);
    if !path.exists() {
        return LoadedConfig {
            config: AppConfig::default(),
            config_dir,
        };
    }
    let config = match std::fs::read_to_string(&path) {
        Ok(contents) => parse_app_config(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    };
    LoadedConfig { config, config_dir }
}

pub fn parse_app_config(contents: &str) -> serde_json::Result<AppConfig> {
    serde_json::from_str(contents)
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CatalogError, FrameSource};

    #[test]
    fn app_config_path_prefers_xdg_config_home() {
        let path = app_config_path(
            "framecam",
            "config.json",
            Some(Path::new("/tmp/config-root")),
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/config-root/framecam/config.json"));
    }

    #[test]
    fn app_config_path_falls_back_to_home_dot_config() {
        let path = app_config_path("framecam", "config.json", None, Some(Path::new("/tmp/home")))
            .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/home/.config/framecam/config.json"));
    }

    #[test]
    fn app_config_path_errors_when_home_missing_and_xdg_unset() {
        let error = app_config_path("framecam", "config.json", None, None).unwrap_err();
        assert_eq!(error, ConfigPathError::MissingHomeDirectory);
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let loaded = load_app_config_with(
            Some(Path::new("/nonexistent/framecam-config-root")),
            None,
        );
        assert!(loaded.config.frames.is_empty());
        assert_eq!(loaded.config.share_title(), DEFAULT_SHARE_TITLE);
        assert_eq!(loaded.config.stale_scratch_hours(), DEFAULT_STALE_SCRATCH_HOURS);
        assert_eq!(
            loaded.config_dir,
            Some(PathBuf::from("/nonexistent/framecam-config-root/framecam"))
        );
    }

    #[test]
    fn frame_catalog_resolves_relative_paths() {
        let config = parse_app_config(
            r#"{
                "frames": [
                    {"id": 1, "name": "Frame 1", "path": "frames/frame1.png"},
                    {"id": 2, "name": "Frame 2", "path": "/abs/frame2.png"}
                ],
                "album": "MyApp",
                "android_api_level": 34
            }"#,
        )
        .expect("config should parse");

        let catalog = config
            .frame_catalog(Some(Path::new("/etc/framecam")))
            .expect("catalog should build");
        assert_eq!(
            catalog.get(1).map(|frame| frame.source().clone()),
            Some(FrameSource::File(PathBuf::from(
                "/etc/framecam/frames/frame1.png"
            )))
        );
        assert_eq!(
            catalog.get(2).map(|frame| frame.source().clone()),
            Some(FrameSource::File(PathBuf::from("/abs/frame2.png")))
        );
        assert_eq!(config.album.as_deref(), Some("MyApp"));
        assert_eq!(config.android_api_level, Some(34));
    }

    #[test]
    fn duplicate_frame_ids_in_config_are_rejected() {
        let config = parse_app_config(
            r#"{"frames": [
                {"id": 4, "name": "a", "path": "a.png"},
                {"id": 4, "name": "b", "path": "b.png"}
            ]}"#,
        )
        .unwrap();
        assert!(matches!(
            config.frame_catalog(None),
            Err(CatalogError::DuplicateFrameId { id: 4 })
        ));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(parse_app_config("{ frames: nope").is_err());
    }
}
