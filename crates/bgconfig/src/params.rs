use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which procedural pattern a background renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Wavy horizontal lines with per-line hue.
    #[default]
    #[serde(alias = "floating-lines", alias = "floating_lines")]
    Lines,
    /// Layered simplex noise with scanlines and hue rotation.
    #[serde(alias = "dark-veil", alias = "dark_veil")]
    Veil,
}

impl PatternKind {
    pub fn id(self) -> &'static str {
        match self {
            PatternKind::Lines => "lines",
            PatternKind::Veil => "veil",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "lines" | "floating-lines" | "floating_lines" => Some(PatternKind::Lines),
            "veil" | "dark-veil" | "dark_veil" => Some(PatternKind::Veil),
            _ => None,
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Tunables for the floating-lines pattern.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinesParams {
    /// Global animation-rate multiplier.
    pub speed: f32,
    /// Number of rendered lines. The shader never draws more than 20.
    #[serde(alias = "lineCount")]
    pub line_count: f32,
    /// Line thickness control.
    #[serde(alias = "lineWidth")]
    pub line_width: f32,
    /// Colour contribution multiplier.
    pub intensity: f32,
    /// Additive hue rotation.
    #[serde(alias = "colorShift")]
    pub color_shift: f32,
    /// Vertical wave displacement magnitude.
    #[serde(alias = "waveAmplitude")]
    pub wave_amplitude: f32,
}

impl Default for LinesParams {
    fn default() -> Self {
        Self {
            speed: 1.0,
            line_count: 15.0,
            line_width: 2.0,
            intensity: 0.8,
            color_shift: 0.0,
            wave_amplitude: 0.5,
        }
    }
}

/// Tunables for the dark-veil noise pattern.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct VeilParams {
    pub speed: f32,
    #[serde(alias = "hueShift")]
    pub hue_shift: f32,
    #[serde(alias = "noiseIntensity")]
    pub noise_intensity: f32,
    #[serde(alias = "scanlineIntensity")]
    pub scanline_intensity: f32,
    #[serde(alias = "distortionAmount")]
    pub distortion_amount: f32,
    #[serde(alias = "colorShift")]
    pub color_shift: f32,
}

impl Default for VeilParams {
    fn default() -> Self {
        Self {
            speed: 0.5,
            hue_shift: 0.0,
            noise_intensity: 0.8,
            scanline_intensity: 0.3,
            distortion_amount: 0.5,
            color_shift: 0.0,
        }
    }
}

/// Parameter name as exposed to users paired with its shader uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub uniform: &'static str,
}

const LINES_PARAMS: [ParamSpec; 6] = [
    ParamSpec { name: "speed", uniform: "uSpeed" },
    ParamSpec { name: "lineCount", uniform: "uLineCount" },
    ParamSpec { name: "lineWidth", uniform: "uLineWidth" },
    ParamSpec { name: "intensity", uniform: "uIntensity" },
    ParamSpec { name: "colorShift", uniform: "uColorShift" },
    ParamSpec { name: "waveAmplitude", uniform: "uWaveAmplitude" },
];

const VEIL_PARAMS: [ParamSpec; 6] = [
    ParamSpec { name: "speed", uniform: "uSpeed" },
    ParamSpec { name: "hueShift", uniform: "uHueShift" },
    ParamSpec { name: "noiseIntensity", uniform: "uNoiseIntensity" },
    ParamSpec { name: "scanlineIntensity", uniform: "uScanlineIntensity" },
    ParamSpec { name: "distortionAmount", uniform: "uDistortionAmount" },
    ParamSpec { name: "colorShift", uniform: "uColorShift" },
];

/// Uniform that carries elapsed simulated seconds for every pattern.
pub const TIME_UNIFORM: &str = "uTime";

/// Parameter set for one pipeline instance.
///
/// Values are forwarded verbatim; range clamping happens inside the shaders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderConfig {
    Lines(LinesParams),
    Veil(VeilParams),
}

impl RenderConfig {
    pub fn defaults_for(kind: PatternKind) -> Self {
        match kind {
            PatternKind::Lines => RenderConfig::Lines(LinesParams::default()),
            PatternKind::Veil => RenderConfig::Veil(VeilParams::default()),
        }
    }

    pub fn kind(&self) -> PatternKind {
        match self {
            RenderConfig::Lines(_) => PatternKind::Lines,
            RenderConfig::Veil(_) => PatternKind::Veil,
        }
    }

    /// Parameter table for this variant, in upload order.
    pub fn specs(&self) -> &'static [ParamSpec] {
        match self {
            RenderConfig::Lines(_) => &LINES_PARAMS,
            RenderConfig::Veil(_) => &VEIL_PARAMS,
        }
    }

    /// Every uniform name the pattern's program must expose, `uTime` first.
    pub fn uniform_names(&self) -> Vec<&'static str> {
        std::iter::once(TIME_UNIFORM)
            .chain(self.specs().iter().map(|spec| spec.uniform))
            .collect()
    }

    /// `(uniform, value)` pairs for the current parameter values.
    pub fn uniform_values(&self) -> Vec<(&'static str, f32)> {
        self.specs()
            .iter()
            .zip(self.values())
            .map(|(spec, value)| (spec.uniform, value))
            .collect()
    }

    /// Looks a parameter up by its user-facing (`lineCount`) or snake-case
    /// (`line_count`) name.
    pub fn get(&self, name: &str) -> Option<f32> {
        let index = self.position(name)?;
        Some(self.values()[index])
    }

    /// Overwrites a single parameter in place.
    pub fn set(&mut self, name: &str, value: f32) -> Result<(), ConfigError> {
        if !value.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "parameter '{name}' must be a finite number"
            )));
        }
        let index = self.position(name).ok_or_else(|| ConfigError::UnknownParameter {
            pattern: self.kind(),
            name: name.to_string(),
        })?;
        let mut slots = self.slots_mut();
        *slots[index] = value;
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for (spec, value) in self.specs().iter().zip(self.values()) {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "{}.{} must be a finite number",
                    self.kind(),
                    spec.name
                )));
            }
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        let wanted = normalise_name(name);
        self.specs()
            .iter()
            .position(|spec| normalise_name(spec.name) == wanted)
    }

    fn values(&self) -> [f32; 6] {
        match self {
            RenderConfig::Lines(p) => [
                p.speed,
                p.line_count,
                p.line_width,
                p.intensity,
                p.color_shift,
                p.wave_amplitude,
            ],
            RenderConfig::Veil(p) => [
                p.speed,
                p.hue_shift,
                p.noise_intensity,
                p.scanline_intensity,
                p.distortion_amount,
                p.color_shift,
            ],
        }
    }

    fn slots_mut(&mut self) -> [&mut f32; 6] {
        match self {
            RenderConfig::Lines(p) => [
                &mut p.speed,
                &mut p.line_count,
                &mut p.line_width,
                &mut p.intensity,
                &mut p.color_shift,
                &mut p.wave_amplitude,
            ],
            RenderConfig::Veil(p) => [
                &mut p.speed,
                &mut p.hue_shift,
                &mut p.noise_intensity,
                &mut p.scanline_intensity,
                &mut p.distortion_amount,
                &mut p.color_shift,
            ],
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig::defaults_for(PatternKind::default())
    }
}

fn normalise_name(name: &str) -> String {
    name.chars()
        .filter(|ch| *ch != '_' && *ch != '-')
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_names_start_with_time() {
        let config = RenderConfig::default();
        let names = config.uniform_names();
        assert_eq!(names[0], "uTime");
        assert_eq!(names.len(), 7);
        assert!(names.contains(&"uWaveAmplitude"));
    }

    #[test]
    fn uniform_values_follow_params() {
        let config = RenderConfig::Lines(LinesParams {
            line_count: 4.0,
            ..LinesParams::default()
        });
        let values = config.uniform_values();
        assert!(values.contains(&("uLineCount", 4.0)));
        assert!(values.contains(&("uSpeed", 1.0)));
    }

    #[test]
    fn set_accepts_camel_and_snake_names() {
        let mut config = RenderConfig::defaults_for(PatternKind::Veil);
        config.set("noiseIntensity", 0.1).unwrap();
        config.set("scanline_intensity", 0.9).unwrap();
        assert_eq!(config.get("noise_intensity"), Some(0.1));
        assert_eq!(config.get("scanlineIntensity"), Some(0.9));
    }

    #[test]
    fn set_rejects_parameters_of_other_pattern() {
        let mut config = RenderConfig::defaults_for(PatternKind::Veil);
        let err = config.set("lineCount", 3.0).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownParameter { .. }));
    }

    #[test]
    fn set_does_not_clamp() {
        let mut config = RenderConfig::default();
        config.set("lineCount", 250.0).unwrap();
        assert_eq!(config.get("lineCount"), Some(250.0));
        assert!(config.set("lineCount", f32::NAN).is_err());
    }

    #[test]
    fn pattern_ids_round_trip() {
        for kind in [PatternKind::Lines, PatternKind::Veil] {
            assert_eq!(PatternKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(PatternKind::from_id("dark-veil"), Some(PatternKind::Veil));
        assert_eq!(PatternKind::from_id("plasma"), None);
    }
}
