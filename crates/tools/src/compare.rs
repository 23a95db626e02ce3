//! Scalar comparison used by the `condition_compare` built-in and by
//! conditional-edge expression evaluation in the orchestrator.

use serde_json::Value;

/// Evaluate `left <op> right`. Numbers compare numerically, everything else
/// falls back to string comparison (`==`/`!=` only support non-numeric
/// operands).
pub fn evaluate(left: &Value, op: &str, right: &Value) -> Result<bool, String> {
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return match op {
            ">" => Ok(l > r),
            "<" => Ok(l < r),
            ">=" => Ok(l >= r),
            "<=" => Ok(l <= r),
            "==" => Ok(l == r),
            "!=" => Ok(l != r),
            other => Err(format!("unknown operator '{other}'")),
        };
    }

    match op {
        "==" => Ok(left == right),
        "!=" => Ok(left != right),
        ">" | "<" | ">=" | "<=" => {
            let (Some(l), Some(r)) = (left.as_str(), right.as_str()) else {
                return Err(format!(
                    "operator '{op}' requires numeric or string operands"
                ));
            };
            Ok(match op {
                ">" => l > r,
                "<" => l < r,
                ">=" => l >= r,
                "<=" => l <= r,
                _ => unreachable!(),
            })
        }
        other => Err(format!("unknown operator '{other}'")),
    }
}
