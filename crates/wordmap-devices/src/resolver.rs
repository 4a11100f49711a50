//! Command resolution in write mode.
//!
//! A command expression is an assignment to a word (`W4 = current`) or to one
//! bit of a word (`W1 # 2 = true`). Results are staged in [`PendingWrites`].

use std::collections::HashMap;

use tracing::{debug, warn};
use wordmap_expr::{evaluate, BinaryOp, CompiledExpr, Expr, Value};

use crate::error::{DeviceError, DeviceResult};
use crate::registry::Unit;
use crate::words::word_index;
use crate::write_buffer::PendingWrites;

/// Names under which the command value is bound.
pub const CURRENT: &str = "current";
pub const CURRENT_ALIAS: &str = "$current";

/// One staged change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordMutation {
    /// Full-word overwrite.
    Word { index: usize, value: i64 },
    /// Single bit update; `value` is the word staged after the update.
    Bit {
        index: usize,
        bit: u32,
        set: bool,
        value: i64,
    },
}

impl WordMutation {
    pub fn index(&self) -> usize {
        match self {
            WordMutation::Word { index, .. } | WordMutation::Bit { index, .. } => *index,
        }
    }

    pub fn value(&self) -> i64 {
        match self {
            WordMutation::Word { value, .. } | WordMutation::Bit { value, .. } => *value,
        }
    }
}

/// Outcome of one command.
#[derive(Debug, Default)]
pub struct Resolution {
    pub mutations: Vec<WordMutation>,
    /// Expressions of the command that were skipped.
    pub failures: Vec<DeviceError>,
}

/// Key of a command specialised on its value, e.g. `mode(current=eco)`.
pub fn derived_key(command: &str, current: &str) -> String {
    format!("{}(current={})", command, current)
}

/// Map boolean-ish input onto `enable` / `disable`.
pub fn toggle_token(current: &str) -> Option<&'static str> {
    match current.trim().to_ascii_lowercase().as_str() {
        "off" | "disabled" | "0" | "false" => Some("disable"),
        "on" | "enabled" | "1" | "true" => Some("enable"),
        _ => None,
    }
}

/// Find the expressions of `command`, trying the derived keys in turn.
pub fn find_command<'u>(
    unit: &'u Unit,
    command: &str,
    current: Option<&str>,
) -> Option<&'u [CompiledExpr]> {
    if let Some(exprs) = unit.command(command) {
        return Some(exprs);
    }
    let current = current?;
    unit.command(&derived_key(command, current)).or_else(|| {
        toggle_token(current).and_then(|token| unit.command(&derived_key(command, token)))
    })
}

/// Resolve `command` for `unit` and stage its writes.
pub fn resolve(
    unit: &Unit,
    command: &str,
    raw_current: Option<&str>,
    pending: &mut PendingWrites,
) -> DeviceResult<Resolution> {
    let exprs = find_command(unit, command, raw_current).ok_or_else(|| {
        DeviceError::UnknownCommand {
            device: unit.device.clone(),
            command: command.to_string(),
        }
    })?;

    let context = command_context(unit, raw_current);
    let mut resolution = Resolution::default();
    for expr in exprs {
        match apply(&expr.tree, &context, pending) {
            Ok(mutation) => {
                debug!("Command {}/{}: {} => {:?}", unit.device, command, expr.source, mutation);
                resolution.mutations.push(mutation);
            }
            Err(e) => {
                warn!(
                    "Command {}/{} skipped '{}': {}",
                    unit.device, command, expr.source, e
                );
                resolution.failures.push(e);
            }
        }
    }
    Ok(resolution)
}

fn command_context(unit: &Unit, raw_current: Option<&str>) -> HashMap<String, Value> {
    let current = match (&unit.scaling, raw_current) {
        (Some(scaling), raw) => {
            let percent = raw.and_then(|raw| raw.trim().parse::<f64>().ok());
            match percent {
                Some(percent) if percent.is_finite() => Some(Value::Number(scaling.to_raw(percent))),
                _ => {
                    debug!(
                        "Current is invalid for device '{}': {:?}",
                        unit.device, raw_current
                    );
                    Some(Value::Text(String::new()))
                }
            }
        }
        (None, raw) => raw.map(Value::from_input),
    };

    let mut context = HashMap::new();
    if let Some(current) = current {
        context.insert(CURRENT_ALIAS.to_string(), current.clone());
        context.insert(CURRENT.to_string(), current);
    }
    context
}

fn apply(
    expr: &Expr,
    context: &HashMap<String, Value>,
    pending: &mut PendingWrites,
) -> DeviceResult<WordMutation> {
    let Expr::Binary {
        op: BinaryOp::Assign,
        left,
        right,
    } = expr
    else {
        return Err(DeviceError::UnsupportedCommandForm(expr.to_string()));
    };

    match left.as_ref() {
        Expr::Identifier(name) => {
            let index = target_index(left)?;
            let value = evaluate(right, context)?.to_word();
            debug!("Stage {} = {}", name, value);
            pending.stage(index, value);
            Ok(WordMutation::Word { index, value })
        }
        Expr::Binary {
            op: BinaryOp::BitTest,
            left: target,
            right: bit,
        } => {
            let index = target_index(target)?;
            let bit = evaluate(bit, context)?.to_u32() & 31;
            let set = evaluate(right, context)?.is_truthy();

            let mask = 1i64 << bit;
            let word = pending.staged(index).unwrap_or(0) & !mask;
            let value = if set { word | mask } else { word };
            pending.stage(index, value);
            Ok(WordMutation::Bit {
                index,
                bit,
                set,
                value,
            })
        }
        _ => Err(DeviceError::UnsupportedCommandForm(expr.to_string())),
    }
}

fn target_index(target: &Expr) -> DeviceResult<usize> {
    target
        .as_identifier()
        .and_then(word_index)
        .ok_or_else(|| DeviceError::UnsupportedCommandForm(target.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use crate::registry::UnitRegistry;
    use serde_json::json;

    fn registry(unit: serde_json::Value) -> UnitRegistry {
        UnitRegistry::compile(&ModelConfig::from_value(json!({ "units": [unit] })).unwrap()).unwrap()
    }

    #[test]
    fn test_word_assignment_stages_value() {
        let registry = registry(json!({ "device": "d", "command": { "set": "W4 = current * 2" } }));
        let mut pending = PendingWrites::new();
        let resolution = resolve(&registry.units()[0], "set", Some("21"), &mut pending).unwrap();

        assert_eq!(resolution.mutations, vec![WordMutation::Word { index: 4, value: 42 }]);
        assert_eq!(pending.staged(4), Some(42));
    }

    #[test]
    fn test_bit_set_then_clear() {
        let registry = registry(json!({
            "device": "d",
            "command": { "on": "W0 # 5 = true", "off": "W0 # 5 = false" }
        }));
        let unit = &registry.units()[0];
        let mut pending = PendingWrites::new();

        resolve(unit, "on", None, &mut pending).unwrap();
        assert_eq!(pending.staged(0), Some(0b100000));
        resolve(unit, "off", None, &mut pending).unwrap();
        assert_eq!(pending.staged(0), Some(0));
    }

    #[test]
    fn test_bit_write_keeps_other_staged_bits() {
        let registry = registry(json!({
            "device": "d",
            "command": { "mode": ["W2 # 0 = true", "W2 # 3 = current", "W2 # 0 = false"] }
        }));
        let mut pending = PendingWrites::new();
        pending.stage(2, 0b0110);
        let resolution = resolve(&registry.units()[0], "mode", Some("1"), &mut pending).unwrap();

        assert_eq!(resolution.mutations.len(), 3);
        assert_eq!(pending.staged(2), Some(0b1110));
    }

    #[test]
    fn test_percent_inverse() {
        let registry = registry(json!({
            "device": "valve", "units": "%", "0%": 0, "100%": 200,
            "command": { "set": "W3 = current" }
        }));
        let mut pending = PendingWrites::new();
        resolve(&registry.units()[0], "set", Some("50"), &mut pending).unwrap();
        assert_eq!(pending.staged(3), Some(100));
    }

    #[test]
    fn test_invalid_percent_input_is_blank() {
        let registry = registry(json!({
            "device": "valve", "units": "%", "0%": 0, "100%": 200,
            "command": { "set": "W3 = $current" }
        }));
        let mut pending = PendingWrites::new();
        let resolution = resolve(&registry.units()[0], "set", Some("half"), &mut pending).unwrap();
        assert!(resolution.failures.is_empty());
        assert_eq!(pending.staged(3), Some(0));
    }

    #[test]
    fn test_derived_command_keys() {
        let registry = registry(json!({
            "device": "heater",
            "command": {
                "mode(current=eco)": "W1 = 2",
                "power(current=enable)": "W0 # 1 = true",
                "power(current=disable)": "W0 # 1 = false"
            }
        }));
        let unit = &registry.units()[0];
        let mut pending = PendingWrites::new();

        resolve(unit, "mode", Some("eco"), &mut pending).unwrap();
        assert_eq!(pending.staged(1), Some(2));

        resolve(unit, "power", Some("ON"), &mut pending).unwrap();
        assert_eq!(pending.staged(0), Some(2));
        resolve(unit, "power", Some("0"), &mut pending).unwrap();
        assert_eq!(pending.staged(0), Some(0));
    }

    #[test]
    fn test_unknown_command() {
        let registry = registry(json!({ "device": "d", "command": { "set": "W0 = 1" } }));
        let mut pending = PendingWrites::new();
        let err = resolve(&registry.units()[0], "boost", Some("1"), &mut pending).unwrap_err();
        assert!(matches!(err, DeviceError::UnknownCommand { .. }));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_unsupported_form_skips_only_that_expression() {
        let registry = registry(json!({
            "device": "d",
            "command": { "go": ["W0 + 1", "X3 = 1", "W1 = 5"] }
        }));
        let mut pending = PendingWrites::new();
        let resolution = resolve(&registry.units()[0], "go", None, &mut pending).unwrap();

        assert_eq!(resolution.failures.len(), 2);
        assert!(resolution
            .failures
            .iter()
            .all(|e| matches!(e, DeviceError::UnsupportedCommandForm(_))));
        assert_eq!(resolution.mutations, vec![WordMutation::Word { index: 1, value: 5 }]);
    }

    #[test]
    fn test_toggle_tokens() {
        assert_eq!(toggle_token("Disabled"), Some("disable"));
        assert_eq!(toggle_token("true"), Some("enable"));
        assert_eq!(toggle_token("maybe"), None);
    }
}
