//! The live variable store and `${...}` resolution against it (spec §4.3).
//! Parsing is shared with `engine::template`; this module owns the part that
//! actually needs the variable map — lookup and splicing.

use std::collections::HashMap;

use engine::template::{self, TemplatePart};
use serde_json::Value;

/// Seeded from `workflow.variables ⊕ context ⊕ initialVariables`, later
/// layers overriding earlier ones (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: HashMap<String, Value>,
}

impl VariableStore {
    pub fn seed(workflow_variables: &Value, context_input: &Value, initial_variables: &Value) -> Self {
        let mut values = HashMap::new();
        for layer in [workflow_variables, context_input, initial_variables] {
            if let Some(obj) = layer.as_object() {
                for (k, v) in obj {
                    values.insert(k.clone(), v.clone());
                }
            }
        }
        Self { values }
    }

    pub fn set_step_output(&mut self, step_id: &str, output: Value) {
        self.values.insert(format!("steps.{step_id}"), output);
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Dotted-path lookup. `steps.<id>` is stored as a single flat key (set
    /// by `set_step_output`); everything after that first segment descends
    /// into the stored JSON value.
    fn lookup(&self, path: &[String]) -> Option<Value> {
        if path.is_empty() {
            return None;
        }

        if path[0] == "steps" && path.len() >= 2 {
            let flat_key = format!("steps.{}", path[1]);
            if let Some(root) = self.values.get(&flat_key) {
                return descend(root, &path[2..]);
            }
        }

        let root = self.values.get(&path[0])?;
        descend(root, &path[1..])
    }

    /// Resolve every `${...}` template in `params` against the current
    /// variable map. Returns the resolved value plus a list of warnings for
    /// unresolved references (spec §4.3: they do not abort resolution).
    pub fn resolve(&self, params: &Value) -> (Value, Vec<String>) {
        let mut warnings = Vec::new();
        let resolved = self.resolve_value(params, &mut warnings);
        (resolved, warnings)
    }

    fn resolve_value(&self, value: &Value, warnings: &mut Vec<String>) -> Value {
        match value {
            Value::String(s) => self.resolve_string(s, warnings),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve_value(v, warnings)).collect()),
            Value::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), self.resolve_value(v, warnings))).collect())
            }
            other => other.clone(),
        }
    }

    fn resolve_string(&self, s: &str, warnings: &mut Vec<String>) -> Value {
        let parsed = match template::parse(s) {
            Ok(p) => p,
            Err(_) => return Value::String(s.to_string()),
        };

        if !parsed.has_expr() {
            return Value::String(s.to_string());
        }

        if parsed.is_whole_cell() {
            let TemplatePart::Expr(path) = &parsed.parts[0] else { unreachable!() };
            return match self.lookup(path) {
                Some(v) => v,
                None => {
                    warnings.push(format!("unresolved reference '${{{}}}'", path.join(".")));
                    Value::String("undefined".to_string())
                }
            };
        }

        let mut out = String::new();
        for part in &parsed.parts {
            match part {
                TemplatePart::Literal(lit) => out.push_str(lit),
                TemplatePart::Expr(path) => match self.lookup(path) {
                    Some(v) => out.push_str(&value_to_text(&v)),
                    None => {
                        warnings.push(format!("unresolved reference '${{{}}}'", path.join(".")));
                        out.push_str("undefined");
                    }
                },
            }
        }
        Value::String(out)
    }
}

fn descend(root: &Value, rest: &[String]) -> Option<Value> {
    let mut current = root;
    for segment in rest {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whole_cell_expr_preserves_type() {
        let mut store = VariableStore::seed(&json!({}), &json!({}), &json!({ "amount": 250 }));
        store.set_step_output("noop", json!({}));
        let (resolved, warnings) = store.resolve(&json!("${amount}"));
        assert_eq!(resolved, json!(250));
        assert!(warnings.is_empty());
    }

    #[test]
    fn mixed_expr_stringifies() {
        let store = VariableStore::seed(&json!({}), &json!({}), &json!({ "base_url": "https://x" }));
        let (resolved, _) = store.resolve(&json!("${base_url}/ping"));
        assert_eq!(resolved, json!("https://x/ping"));
    }

    #[test]
    fn step_output_lookup_by_dotted_path() {
        let mut store = VariableStore::default();
        store.set_step_output("charge", json!({ "paymentId": "p1" }));
        let (resolved, warnings) = store.resolve(&json!("${steps.charge.paymentId}"));
        assert_eq!(resolved, json!("p1"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn unresolved_reference_yields_literal_undefined_and_a_warning() {
        let store = VariableStore::default();
        let (resolved, warnings) = store.resolve(&json!("${missing.thing}"));
        assert_eq!(resolved, json!("undefined"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let store = VariableStore::seed(&json!({ "x": 1 }), &json!({ "x": 2 }), &json!({ "x": 3 }));
        let (resolved, _) = store.resolve(&json!("${x}"));
        assert_eq!(resolved, json!(3));
    }

    #[test]
    fn nested_object_params_are_resolved_recursively() {
        let store = VariableStore::seed(&json!({}), &json!({}), &json!({ "amount": 42 }));
        let (resolved, _) = store.resolve(&json!({ "body": { "total": "${amount}" } }));
        assert_eq!(resolved, json!({ "body": { "total": 42 } }));
    }
}
