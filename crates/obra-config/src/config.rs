//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use obra_render::InjectionPoint;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Output target settings.
    pub output: OutputConfig,
    /// Post-process pass settings.
    pub pass: PassConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Size of the camera color target the pass composites onto.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
}

/// Pass settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PassConfig {
    /// Where in the frame the pass runs.
    pub injection_point: InjectionPoint,
    /// WGSL file for the dither stage. `None` uses the built-in program.
    pub dither_shader: Option<PathBuf>,
    /// WGSL file for the threshold stage. `None` uses the built-in program.
    pub threshold_shader: Option<PathBuf>,
    /// Upper bound on intermediate buffer memory. `None` is unbounded.
    pub temporary_budget_bytes: Option<u64>,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Frames rendered by the demo before writing its output.
    pub frames: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            frames: 1,
        }
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform config directory, e.g. `~/.config/obra-dinn` on Linux.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("obra-dinn"))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(config_dir.join(CONFIG_FILE_NAME), serialized)
            .map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Re-read the file; `Some(new_config)` if it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE_NAME))?;
        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        ron::from_str(&contents).map_err(ConfigError::ParseError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let ron_str = ron::ser::to_string_pretty(
            &Config::default(),
            ron::ser::PrettyConfig::new().depth_limit(3),
        )
        .unwrap();
        assert!(ron_str.contains("width: 1280"));
        assert!(ron_str.contains("injection_point: \"after-opaque\""));
    }

    #[test]
    fn test_missing_section_uses_default() {
        let config: Config = ron::from_str("(output: (width: 640))").unwrap();
        assert_eq!(config.output.width, 640);
        assert_eq!(config.output.height, 720);
        assert_eq!(config.pass, PassConfig::default());
        assert_eq!(config.debug, DebugConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_injection_point_uses_cli_spelling() {
        let config: Config =
            ron::from_str(r#"(pass: (injection_point: "before-post-processing"))"#).unwrap();
        assert_eq!(
            config.pass.injection_point,
            InjectionPoint::BeforePostProcessing
        );
        for point in InjectionPoint::ALL {
            let ron_str = ron::to_string(&point).unwrap();
            assert_eq!(ron_str, format!("\"{point}\""));
        }
    }

    #[test]
    fn test_unknown_injection_point_is_parse_error() {
        let result: Result<Config, _> =
            ron::from_str("(pass: (injection_point: AfterRenderingOpaques))");
        assert!(result.is_err());
    }

    #[test]
    fn test_shader_paths_and_budget() {
        let ron_str = r#"(pass: (
            dither_shader: Some("shaders/dither.wgsl"),
            temporary_budget_bytes: Some(8000000),
        ))"#;
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(
            config.pass.dither_shader.as_deref(),
            Some(Path::new("shaders/dither.wgsl"))
        );
        assert_eq!(config.pass.threshold_shader, None);
        assert_eq!(config.pass.temporary_budget_bytes, Some(8_000_000));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.output.width = 1920;
        config.pass.injection_point = InjectionPoint::AfterRendering;
        config.pass.threshold_shader = Some(PathBuf::from("threshold.wgsl"));
        config.debug.frames = 12;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_default_dir_is_namespaced() {
        if let Some(dir) = Config::default_dir() {
            assert!(dir.ends_with("obra-dinn"));
        }
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.pass.injection_point = InjectionPoint::BeforeRendering;
        modified.save(dir.path()).unwrap();

        let reloaded = config.reload(dir.path()).unwrap();
        assert_eq!(
            reloaded.map(|c| c.pass.injection_point),
            Some(InjectionPoint::BeforeRendering)
        );
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        assert!(config.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{{not valid}}").unwrap();

        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
