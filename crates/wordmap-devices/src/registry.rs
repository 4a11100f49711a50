//! Compiled units and the word dependency index.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;
use wordmap_expr::{CompiledExpr, Value};

use crate::error::{DeviceError, DeviceResult};
use crate::model::{ModelConfig, UnitConfig};

/// Identifies one compiled status expression across the registry.
pub type TreeId = usize;

/// Linear mapping between the raw device range and 0..100 %.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub zero_point: f64,
    pub hundred_point: f64,
}

impl Scaling {
    /// Percent scaling applies only to `%` units that set both points.
    pub fn from_unit(unit: &UnitConfig) -> Option<Self> {
        if unit.units.as_deref() != Some("%") {
            return None;
        }
        match (unit.zero_point, unit.hundred_point) {
            (Some(zero_point), Some(hundred_point)) if zero_point != hundred_point => Some(Self {
                zero_point,
                hundred_point,
            }),
            _ => None,
        }
    }

    /// Raw device value to percent.
    pub fn to_percent(&self, raw: f64) -> f64 {
        ((raw - self.zero_point) * 100.0 / (self.hundred_point - self.zero_point)).floor()
    }

    /// Percent back to a raw device value.
    pub fn to_raw(&self, percent: f64) -> f64 {
        (percent / 100.0 * (self.hundred_point - self.zero_point) + self.zero_point).floor()
    }
}

#[derive(Debug, Clone)]
pub struct StatusTree {
    pub name: String,
    pub tree_id: TreeId,
    pub expr: CompiledExpr,
}

/// A unit with every expression compiled.
#[derive(Debug, Clone)]
pub struct Unit {
    pub device: String,
    pub statuses: Vec<StatusTree>,
    /// Command name (aliases expanded) to its ordered expressions.
    pub commands: IndexMap<String, Vec<CompiledExpr>>,
    pub units: Option<String>,
    pub scaling: Option<Scaling>,
    pub multiplier: Option<f64>,
    pub overflow: Option<f64>,
}

impl Unit {
    /// Apply percent then multiplier scaling. Non-numeric values pass through.
    pub fn scale(&self, value: Value) -> Value {
        let Value::Number(mut n) = value else {
            return value;
        };
        if let Some(scaling) = &self.scaling {
            n = scaling.to_percent(n);
        }
        if let Some(multiplier) = self.multiplier {
            n *= multiplier;
        }
        Value::Number(n)
    }

    /// Linearize a wrapping counter against the cached previous value.
    pub fn accumulate_overflow(&self, value: Value, previous: Option<&Value>) -> Value {
        let (Some(overflow), Value::Number(n), Some(Value::Number(cached))) =
            (self.overflow, &value, previous)
        else {
            return value;
        };
        if overflow <= 0.0 || !n.is_finite() || !cached.is_finite() || *n >= *cached {
            return value;
        }
        let periods = ((cached - n) / overflow).ceil();
        Value::Number(n + periods * overflow)
    }

    pub fn command(&self, name: &str) -> Option<&[CompiledExpr]> {
        self.commands.get(name).map(Vec::as_slice)
    }
}

/// One status registered against a word identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listener {
    /// Index into [`UnitRegistry::units`].
    pub unit: usize,
    /// Index into [`Unit::statuses`].
    pub status: usize,
    pub tree: TreeId,
}

/// Word identifier to the statuses that read it, in registration order.
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    listeners: HashMap<String, Vec<Listener>>,
}

impl DependencyIndex {
    pub fn register(&mut self, identifier: impl Into<String>, listener: Listener) {
        self.listeners
            .entry(identifier.into())
            .or_default()
            .push(listener);
    }

    pub fn listeners(&self, identifier: &str) -> &[Listener] {
        self.listeners
            .get(identifier)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn identifier_count(&self) -> usize {
        self.listeners.len()
    }
}

/// All units of a model, compiled and indexed.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: Vec<Unit>,
    by_device: HashMap<String, usize>,
    index: DependencyIndex,
    tree_count: usize,
}

impl UnitRegistry {
    /// Compile every expression of the model.
    ///
    /// A parse error is a configuration error and aborts the whole model.
    pub fn compile(model: &ModelConfig) -> DeviceResult<Self> {
        let mut registry = Self::default();
        for config in &model.units {
            registry.add_unit(config)?;
        }
        Ok(registry)
    }

    fn add_unit(&mut self, config: &UnitConfig) -> DeviceResult<()> {
        let unit_index = self.units.len();
        let compile = |name: &str, source: &str| {
            CompiledExpr::compile(source).map_err(|source| DeviceError::InvalidExpression {
                device: config.device.clone(),
                name: name.to_string(),
                source,
            })
        };

        let mut statuses = Vec::new();
        for (status_index, (name, source)) in config.status_expressions().into_iter().enumerate() {
            let expr = compile(&name, &source)?;
            let tree_id = self.tree_count;
            self.tree_count += 1;

            let identifiers = expr.tree.identifiers();
            debug!(
                "Expression {} : register identifiers : {:?}",
                expr.source, identifiers
            );
            for identifier in identifiers {
                self.index.register(
                    identifier,
                    Listener {
                        unit: unit_index,
                        status: status_index,
                        tree: tree_id,
                    },
                );
            }
            statuses.push(StatusTree {
                name,
                tree_id,
                expr,
            });
        }

        let mut commands = IndexMap::new();
        for (name, spec) in config.command_expressions() {
            let exprs = spec
                .expressions()
                .into_iter()
                .map(|source| compile(&name, source))
                .collect::<DeviceResult<Vec<_>>>()?;
            commands.insert(name, exprs);
        }

        self.by_device.insert(config.device.clone(), unit_index);
        self.units.push(Unit {
            device: config.device.clone(),
            statuses,
            commands,
            units: config.units.clone(),
            scaling: Scaling::from_unit(config),
            multiplier: config.multiplier,
            overflow: config.overflow,
        });
        Ok(())
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, index: usize) -> Option<&Unit> {
        self.units.get(index)
    }

    /// The first unit registered for `device`.
    pub fn unit_by_device(&self, device: &str) -> Option<&Unit> {
        self.by_device
            .get(device)
            .and_then(|index| self.units.get(*index))
    }

    pub fn index(&self) -> &DependencyIndex {
        &self.index
    }

    pub fn tree_count(&self) -> usize {
        self.tree_count
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry(model: serde_json::Value) -> UnitRegistry {
        UnitRegistry::compile(&ModelConfig::from_value(model).unwrap()).unwrap()
    }

    #[test]
    fn test_dependency_index_follows_registration_order() {
        let registry = registry(json!({
            "units": [
                { "device": "a", "status": { "x": "W0 + W1", "y": "W1" } },
                { "device": "b", "status": "W1 # 3" }
            ]
        }));

        let listeners = registry.index().listeners("W1");
        assert_eq!(
            listeners.iter().map(|l| (l.unit, l.status)).collect::<Vec<_>>(),
            vec![(0, 0), (0, 1), (1, 0)]
        );
        assert_eq!(registry.index().listeners("W0").len(), 1);
        assert!(registry.index().listeners("W7").is_empty());
        assert_eq!(registry.tree_count(), 3);
    }

    #[test]
    fn test_parse_error_names_device_and_status() {
        let model = ModelConfig::from_value(json!({
            "units": [{ "device": "broken", "status": { "temp": "W0 +" } }]
        }))
        .unwrap();
        match UnitRegistry::compile(&model) {
            Err(DeviceError::InvalidExpression { device, name, .. }) => {
                assert_eq!(device, "broken");
                assert_eq!(name, "temp");
            }
            other => panic!("expected invalid expression, got {:?}", other),
        }
    }

    #[test]
    fn test_aliases_share_expressions() {
        let registry = registry(json!({
            "units": [{ "device": "pump", "command": { "on|enable": "W1 = 1" } }]
        }));
        let unit = registry.unit_by_device("pump").unwrap();
        assert_eq!(unit.command("on").unwrap()[0].source, "W1 = 1");
        assert_eq!(unit.command("enable").unwrap()[0].source, "W1 = 1");
        assert!(registry.unit_by_device("valve").is_none());
    }

    #[test]
    fn test_percent_scaling() {
        let scaling = Scaling {
            zero_point: 0.0,
            hundred_point: 200.0,
        };
        assert_eq!(scaling.to_percent(100.0), 50.0);
        assert_eq!(scaling.to_raw(50.0), 100.0);
        assert_eq!(scaling.to_percent(33.0), 16.0);
    }

    #[test]
    fn test_scaling_requires_percent_units() {
        let unit = UnitConfig::new("d").with_percent(0.0, 200.0).with_units("V");
        assert!(Scaling::from_unit(&unit).is_none());
        let unit = UnitConfig::new("d").with_percent(10.0, 110.0);
        assert!(Scaling::from_unit(&unit).is_some());
    }

    #[test]
    fn test_overflow_accumulation() {
        let registry = registry(json!({
            "units": [{ "device": "counter", "status": "W0", "overflow": 16 }]
        }));
        let unit = &registry.units()[0];
        let cached = Value::Number(10.0);
        assert_eq!(
            unit.accumulate_overflow(Value::Number(2.0), Some(&cached)),
            Value::Number(18.0)
        );
        assert_eq!(
            unit.accumulate_overflow(Value::Number(12.0), Some(&cached)),
            Value::Number(12.0)
        );
        assert_eq!(
            unit.accumulate_overflow(Value::Number(2.0), None),
            Value::Number(2.0)
        );
        let cached = Value::Number(40.0);
        assert_eq!(
            unit.accumulate_overflow(Value::Number(3.0), Some(&cached)),
            Value::Number(51.0)
        );
    }

    #[test]
    fn test_multiplier_after_percent() {
        let registry = registry(json!({
            "units": [{
                "device": "tank", "status": "W0",
                "0%": 0, "100%": 200, "units": "%", "multiplier": 0.5
            }]
        }));
        let unit = &registry.units()[0];
        assert_eq!(unit.scale(Value::Number(100.0)), Value::Number(25.0));
        assert_eq!(unit.scale(Value::Bool(true)), Value::Bool(true));
    }
}
