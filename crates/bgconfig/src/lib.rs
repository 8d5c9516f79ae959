//! Configuration model for backdrop renderers.
//!
//! A config file selects the pattern and carries one parameter table per
//! pattern so switching patterns never loses tuned values:
//!
//! ```toml
//! version = 1
//! pattern = "lines"
//! fps = 60
//!
//! [lines]
//! speed = 1.0
//! line_count = 15
//!
//! [veil]
//! hue_shift = 0.2
//! ```

mod params;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use params::{LinesParams, ParamSpec, PatternKind, RenderConfig, VeilParams, TIME_UNIFORM};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("pattern '{pattern}' has no parameter named '{name}'")]
    UnknownParameter { pattern: PatternKind, name: String },
}

/// On-disk configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackdropConfig {
    pub version: u32,
    pub pattern: PatternKind,
    /// Optional frame-rate cap; `0` or absent renders every display refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f32>,
    pub lines: LinesParams,
    pub veil: VeilParams,
}

impl Default for BackdropConfig {
    fn default() -> Self {
        Self {
            version: 1,
            pattern: PatternKind::default(),
            fps: None,
            lines: LinesParams::default(),
            veil: VeilParams::default(),
        }
    }
}

impl BackdropConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: BackdropConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Like [`BackdropConfig::load`] but falls back to defaults when the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Parameters of the selected pattern.
    pub fn render_config(&self) -> RenderConfig {
        self.render_config_for(self.pattern)
    }

    pub fn render_config_for(&self, kind: PatternKind) -> RenderConfig {
        match kind {
            PatternKind::Lines => RenderConfig::Lines(self.lines),
            PatternKind::Veil => RenderConfig::Veil(self.veil),
        }
    }

    /// Writes a parameter set back into its table.
    pub fn store(&mut self, config: RenderConfig) {
        match config {
            RenderConfig::Lines(params) => self.lines = params,
            RenderConfig::Veil(params) => self.veil = params,
        }
    }

    /// Frame cap with `0` normalised to uncapped.
    pub fn frame_cap(&self) -> Option<f32> {
        self.fps.filter(|fps| *fps > 0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(fps) = self.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("fps must be >= 0".into()));
            }
        }

        RenderConfig::Lines(self.lines).validate()?;
        RenderConfig::Veil(self.veil).validate()?;
        Ok(())
    }
}
