//! Per-user generation settings.
//!
//! Settings are persisted as a small JSON record where every field is
//! optional; unset fields fall back to the configured defaults when the
//! record is resolved for a request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for setting updates. The display text is shown to the user as-is.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Unknown setting '{0}'. Available settings: model, temperature, max_tokens.")]
    UnknownKey(String),
    #[error("{}", .0.missing_value_hint())]
    MissingValue(SettingKey),
    #[error("Please provide a valid numeric value.")]
    NotANumber(String),
    #[error("Temperature must be between 0.0 and 1.0.")]
    TemperatureOutOfRange(f32),
    #[error("Max tokens must be a positive integer.")]
    InvalidMaxTokens(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Model,
    Temperature,
    MaxTokens,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Model => "model",
            SettingKey::Temperature => "temperature",
            SettingKey::MaxTokens => "max_tokens",
        }
    }

    fn missing_value_hint(&self) -> &'static str {
        match self {
            SettingKey::Model => "Please specify a model name.",
            SettingKey::Temperature => "Please specify a temperature value (0.0 - 1.0).",
            SettingKey::MaxTokens => "Please specify the maximum number of response tokens.",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(SettingKey::Model),
            "temperature" => Ok(SettingKey::Temperature),
            "max_tokens" => Ok(SettingKey::MaxTokens),
            other => Err(SettingsError::UnknownKey(other.to_string())),
        }
    }
}

/// A single validated change to a user's settings.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingUpdate {
    Model(String),
    Temperature(f32),
    MaxTokens(u32),
}

impl SettingUpdate {
    /// Validates a raw user-supplied value for `key`.
    pub fn parse(key: SettingKey, raw: Option<&str>) -> Result<Self, SettingsError> {
        let raw = raw
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(SettingsError::MissingValue(key))?;

        match key {
            SettingKey::Model => Ok(SettingUpdate::Model(raw.to_string())),
            SettingKey::Temperature => {
                let temp: f32 = raw
                    .parse()
                    .map_err(|_| SettingsError::NotANumber(raw.to_string()))?;
                if !(0.0..=1.0).contains(&temp) {
                    return Err(SettingsError::TemperatureOutOfRange(temp));
                }
                Ok(SettingUpdate::Temperature(temp))
            }
            SettingKey::MaxTokens => match raw.parse::<u32>() {
                Ok(n) if n > 0 => Ok(SettingUpdate::MaxTokens(n)),
                _ => Err(SettingsError::InvalidMaxTokens(raw.to_string())),
            },
        }
    }

    pub fn key(&self) -> SettingKey {
        match self {
            SettingUpdate::Model(_) => SettingKey::Model,
            SettingUpdate::Temperature(_) => SettingKey::Temperature,
            SettingUpdate::MaxTokens(_) => SettingKey::MaxTokens,
        }
    }

    pub fn apply(&self, settings: &mut StoredSettings) {
        match self {
            SettingUpdate::Model(model) => settings.model = Some(model.clone()),
            SettingUpdate::Temperature(temp) => settings.temperature = Some(*temp),
            SettingUpdate::MaxTokens(n) => settings.max_tokens = Some(*n),
        }
    }
}

/// The persisted form of a user's settings. Unset fields use the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoredSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl StoredSettings {
    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.temperature.is_none() && self.max_tokens.is_none()
    }

    pub fn resolve(&self, defaults: &SettingsDefaults) -> ResolvedSettings {
        ResolvedSettings {
            model: self.model.clone().unwrap_or_else(|| defaults.model.clone()),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        }
    }
}

/// Fully populated settings used for a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub type SettingsDefaults = ResolvedSettings;
