//! Minimal `${path.with.dots}` template expression language.
//!
//! Implemented as a small AST rather than textual replacement (design note
//! §9) so resolution can splice back typed values instead of always
//! coercing to strings. Parsing here is deliberately the *only* shared
//! piece between `engine` (syntax validation at workflow-validate time) and
//! `orchestrator` (resolution against the live variable store at execution
//! time) — resolution logic itself lives in `orchestrator::template` since
//! it needs the variable map.

use std::fmt;

/// One parsed fragment of a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    /// Literal text, copied through unchanged.
    Literal(String),
    /// A `${a.b.c}` reference, stored as its dot-separated path segments.
    Expr(Vec<String>),
}

/// A fully parsed template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplate {
    pub parts: Vec<TemplatePart>,
}

impl ParsedTemplate {
    /// True when the whole string is a single `${...}` expression with no
    /// surrounding literal text — per spec §4.3 this is the case where the
    /// resolved value's original type (not just its string form) is spliced
    /// back into the parameter cell.
    pub fn is_whole_cell(&self) -> bool {
        matches!(self.parts.as_slice(), [TemplatePart::Expr(_)])
    }

    pub fn has_expr(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, TemplatePart::Expr(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateParseError {
    pub message: String,
}

impl fmt::Display for TemplateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TemplateParseError {}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parse a template string into literal/expression parts.
///
/// Grammar: text interspersed with `${` ... `}` spans; inside a span the
/// content must be one or more dot-separated path segments built from
/// `[A-Za-z0-9_-]`, with no empty segments and no unmatched braces.
pub fn parse(input: &str) -> Result<ParsedTemplate, TemplateParseError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let bytes: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == '$' && bytes.get(i + 1) == Some(&'{') {
            if !literal.is_empty() {
                parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
            }
            let start = i + 2;
            let mut j = start;
            while j < bytes.len() && bytes[j] != '}' {
                j += 1;
            }
            if j >= bytes.len() {
                return Err(TemplateParseError {
                    message: format!("unterminated '${{' starting at byte offset {i}"),
                });
            }
            let path_str: String = bytes[start..j].iter().collect();
            let segments = parse_path(&path_str)?;
            parts.push(TemplatePart::Expr(segments));
            i = j + 1;
        } else if bytes[i] == '}' {
            return Err(TemplateParseError {
                message: format!("unmatched '}}' at byte offset {i}"),
            });
        } else {
            literal.push(bytes[i]);
            i += 1;
        }
    }

    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }

    Ok(ParsedTemplate { parts })
}

fn parse_path(path_str: &str) -> Result<Vec<String>, TemplateParseError> {
    if path_str.is_empty() {
        return Err(TemplateParseError {
            message: "empty '${}' expression".into(),
        });
    }
    let segments: Vec<String> = path_str.split('.').map(|s| s.to_string()).collect();
    for seg in &segments {
        if seg.is_empty() {
            return Err(TemplateParseError {
                message: format!("empty path segment in '${{{path_str}}}'"),
            });
        }
        if !seg.chars().all(is_path_char) {
            return Err(TemplateParseError {
                message: format!(
                    "invalid character in path segment '{seg}' of '${{{path_str}}}'"
                ),
            });
        }
    }
    Ok(segments)
}

/// Walk a JSON value and validate every string cell parses as a template.
/// Used by `WorkflowEngine::validate` (rule 5); does not resolve anything.
pub fn validate_value(value: &serde_json::Value) -> Result<(), TemplateParseError> {
    match value {
        serde_json::Value::String(s) => parse(s).map(|_| ()),
        serde_json::Value::Array(items) => {
            for item in items {
                validate_value(item)?;
            }
            Ok(())
        }
        serde_json::Value::Object(map) => {
            for v in map.values() {
                validate_value(v)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_only() {
        let t = parse("hello world").unwrap();
        assert_eq!(t.parts, vec![TemplatePart::Literal("hello world".into())]);
        assert!(!t.has_expr());
    }

    #[test]
    fn parses_whole_cell_expr() {
        let t = parse("${amount}").unwrap();
        assert!(t.is_whole_cell());
        assert_eq!(
            t.parts,
            vec![TemplatePart::Expr(vec!["amount".into()])]
        );
    }

    #[test]
    fn parses_dotted_path() {
        let t = parse("${steps.charge.paymentId}").unwrap();
        assert_eq!(
            t.parts,
            vec![TemplatePart::Expr(vec![
                "steps".into(),
                "charge".into(),
                "paymentId".into()
            ])]
        );
    }

    #[test]
    fn parses_mixed_literal_and_expr() {
        let t = parse("value: ${steps.a.output}!").unwrap();
        assert_eq!(
            t.parts,
            vec![
                TemplatePart::Literal("value: ".into()),
                TemplatePart::Expr(vec!["steps".into(), "a".into(), "output".into()]),
                TemplatePart::Literal("!".into()),
            ]
        );
        assert!(!t.is_whole_cell());
    }

    #[test]
    fn rejects_unterminated_expr() {
        assert!(parse("${oops").is_err());
    }

    #[test]
    fn rejects_unmatched_close_brace() {
        assert!(parse("oops}").is_err());
    }

    #[test]
    fn rejects_empty_expr() {
        assert!(parse("${}").is_err());
    }

    #[test]
    fn rejects_empty_segment() {
        assert!(parse("${a..b}").is_err());
    }

    #[test]
    fn rejects_invalid_character() {
        assert!(parse("${a b}").is_err());
    }

    #[test]
    fn validate_value_recurses_into_objects_and_arrays() {
        let v = serde_json::json!({
            "url": "${base_url}/ping",
            "headers": ["${auth.token}", "static"],
        });
        assert!(validate_value(&v).is_ok());

        let bad = serde_json::json!({ "url": "${unterminated" });
        assert!(validate_value(&bad).is_err());
    }
}
