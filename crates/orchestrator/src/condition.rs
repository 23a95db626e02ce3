//! Evaluates a `CONDITION` step's `conditional` edge expressions
//! (`"${amount} > 100"`) against the live variable store.

use serde_json::Value;

use crate::error::OrchestratorError;
use crate::template::VariableStore;

const OPERATORS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];

pub fn evaluate(store: &VariableStore, expr: &str) -> Result<bool, OrchestratorError> {
    let (left_raw, op, right_raw) = split(expr)
        .ok_or_else(|| OrchestratorError::Validation(format!("condition '{expr}' has no recognized operator")))?;

    let left = resolve_operand(store, left_raw);
    let right = resolve_operand(store, right_raw);

    tools::compare::evaluate(&left, op, &right).map_err(OrchestratorError::Validation)
}

fn split(expr: &str) -> Option<(&str, &str, &str)> {
    for op in OPERATORS {
        if let Some(idx) = expr.find(op) {
            return Some((expr[..idx].trim(), op, expr[idx + op.len()..].trim()));
        }
    }
    None
}

fn resolve_operand(store: &VariableStore, raw: &str) -> Value {
    if raw.starts_with("${") && raw.ends_with('}') {
        let (value, _warnings) = store.resolve(&Value::String(raw.to_string()));
        return value;
    }
    if let Ok(n) = raw.parse::<f64>() {
        return Value::from(n);
    }
    if let Ok(b) = raw.parse::<bool>() {
        return Value::from(b);
    }
    Value::String(raw.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_expression_against_variable() {
        let store = VariableStore::seed(&json!({}), &json!({}), &json!({ "amount": 250 }));
        assert!(evaluate(&store, "${amount} > 100").unwrap());
        assert!(!evaluate(&store, "${amount} < 100").unwrap());
    }

    #[test]
    fn literal_vs_literal() {
        let store = VariableStore::default();
        assert!(evaluate(&store, "5 >= 5").unwrap());
    }

    #[test]
    fn unrecognized_operator_errors() {
        let store = VariableStore::default();
        assert!(evaluate(&store, "5 ~= 5").is_err());
    }
}
