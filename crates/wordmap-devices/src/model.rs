//! Unit model file format.
//!
//! A model lists the units (logical devices) mapped onto the word array:
//!
//! ```json
//! {
//!   "units": [
//!     {
//!       "device": "boiler",
//!       "status": { "temperature": "W3", "pump": "W1 # 2 ? 1 : 0" },
//!       "command": { "on|enable": "W1 # 2 = true", "set": ["W4 = current"] },
//!       "0%": 0, "100%": 200, "units": "%"
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, DeviceResult};

/// Status name used when a unit declares a single status expression.
pub const DEFAULT_STATUS_NAME: &str = "status";

/// Separator for command aliases (`"on|enable"`).
pub const COMMAND_ALIAS_SEPARATOR: char = '|';

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub units: Vec<UnitConfig>,
}

impl ModelConfig {
    pub fn from_json(json: &str) -> DeviceResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: serde_json::Value) -> DeviceResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Read a model file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> DeviceResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DeviceError::Model(format!("Can not read model '{}': {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }
}

/// Status expressions of a unit: one bare expression or named ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusSpec {
    Single(String),
    Named(IndexMap<String, String>),
}

/// A command maps to one expression or to a sequence applied in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Single(String),
    Sequence(Vec<String>),
}

impl CommandSpec {
    pub fn expressions(&self) -> Vec<&str> {
        match self {
            CommandSpec::Single(expr) => vec![expr.as_str()],
            CommandSpec::Sequence(exprs) => exprs.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Device identifier used on the message bus.
    pub device: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusSpec>,

    #[serde(default, alias = "commands", skip_serializing_if = "IndexMap::is_empty")]
    pub command: IndexMap<String, CommandSpec>,

    /// Raw device value that maps to 0 %.
    #[serde(
        default,
        rename = "zeroPoint",
        alias = "0%",
        skip_serializing_if = "Option::is_none"
    )]
    pub zero_point: Option<f64>,

    /// Raw device value that maps to 100 %.
    #[serde(
        default,
        rename = "hundredPoint",
        alias = "100%",
        skip_serializing_if = "Option::is_none"
    )]
    pub hundred_point: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,

    /// Wrap period of a hardware counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow: Option<f64>,
}

impl UnitConfig {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            status: None,
            command: IndexMap::new(),
            zero_point: None,
            hundred_point: None,
            units: None,
            multiplier: None,
            overflow: None,
        }
    }

    /// Add a named status expression.
    pub fn with_status(mut self, name: impl Into<String>, expr: impl Into<String>) -> Self {
        let mut named = match self.status.take() {
            Some(StatusSpec::Named(named)) => named,
            Some(StatusSpec::Single(single)) => {
                let mut named = IndexMap::new();
                named.insert(DEFAULT_STATUS_NAME.to_string(), single);
                named
            }
            None => IndexMap::new(),
        };
        named.insert(name.into(), expr.into());
        self.status = Some(StatusSpec::Named(named));
        self
    }

    pub fn with_command(mut self, name: impl Into<String>, spec: CommandSpec) -> Self {
        self.command.insert(name.into(), spec);
        self
    }

    pub fn with_percent(mut self, zero_point: f64, hundred_point: f64) -> Self {
        self.zero_point = Some(zero_point);
        self.hundred_point = Some(hundred_point);
        self.units = Some("%".to_string());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    pub fn with_overflow(mut self, overflow: f64) -> Self {
        self.overflow = Some(overflow);
        self
    }

    /// Status `(name, expression)` pairs in declaration order.
    pub fn status_expressions(&self) -> Vec<(String, String)> {
        match &self.status {
            None => Vec::new(),
            Some(StatusSpec::Single(expr)) => {
                vec![(DEFAULT_STATUS_NAME.to_string(), expr.clone())]
            }
            Some(StatusSpec::Named(named)) => named
                .iter()
                .map(|(name, expr)| (name.clone(), expr.clone()))
                .collect(),
        }
    }

    /// Command `(name, spec)` pairs with `a|b` aliases expanded.
    pub fn command_expressions(&self) -> Vec<(String, &CommandSpec)> {
        let mut expanded = Vec::new();
        for (key, spec) in &self.command {
            for alias in key.split(COMMAND_ALIAS_SEPARATOR) {
                let alias = alias.trim();
                if !alias.is_empty() {
                    expanded.push((alias.to_string(), spec));
                }
            }
        }
        expanded
    }
}
