use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::rig::ChainOrdering;

/// Naming and placement settings shared by every component of a [`Rig`](crate::rig::Rig).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Distance from the chain midpoint to the IK pole control.
    pub pole_distance: f32,
    /// Name of the float attribute carrying the FK/IK blend factor.
    pub blend_attribute: String,
    pub control_suffix: String,
    pub group_suffix: String,
    pub fk_suffix: String,
    pub ik_suffix: String,
    pub result_suffix: String,
    pub ordering: ChainOrdering,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            pole_distance: 50.0,
            blend_attribute: "FkIkBlend".to_string(),
            control_suffix: "CTRL".to_string(),
            group_suffix: "COM".to_string(),
            fk_suffix: "FK".to_string(),
            ik_suffix: "IK".to_string(),
            result_suffix: "Result".to_string(),
            ordering: ChainOrdering::Descendants,
        }
    }
}

impl RigConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn with_pole_distance(mut self, distance: f32) -> Self {
        self.pole_distance = distance;
        self
    }

    pub fn with_blend_attribute(mut self, name: impl Into<String>) -> Self {
        self.blend_attribute = name.into();
        self
    }

    pub fn with_ordering(mut self, ordering: ChainOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.pole_distance.is_finite() || self.pole_distance <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "pole_distance".to_string(),
                message: format!("{} (must be finite and > 0)", self.pole_distance),
            });
        }

        let names = [
            ("blend_attribute", &self.blend_attribute),
            ("control_suffix", &self.control_suffix),
            ("group_suffix", &self.group_suffix),
            ("fk_suffix", &self.fk_suffix),
            ("ik_suffix", &self.ik_suffix),
            ("result_suffix", &self.result_suffix),
        ];
        for (field, value) in names {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    pub(crate) fn control_name(&self, name: &str) -> String {
        format!("{}_{}", name, self.control_suffix)
    }

    pub(crate) fn group_name(&self, name: &str) -> String {
        format!("{}_{}", name, self.group_suffix)
    }
}
