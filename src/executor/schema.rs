//! Structural schema descriptor and validator
//!
//! A [`Schema`] describes the shape a model response must take: field names,
//! types, numeric bounds and enum membership. [`Schema::validate`] checks an
//! arbitrary JSON value against it and reports one [`Violation`] per broken
//! rule, in the order encountered. Validation is structural only and a pure
//! function; retrying on failure is the executor's concern.
//!
//! # Examples
//!
//! ```
//! use credence::executor::schema::{Field, Kind, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::object(vec![
//!     Field::required("score", Kind::number_between(0.0, 100.0)),
//!     Field::required("verdict", Kind::one_of(["credible", "mixed", "not_credible"])),
//!     Field::optional("notes", Kind::string()),
//! ]);
//!
//! assert!(schema.validate(&json!({"score": 72.5, "verdict": "mixed"})).is_valid());
//! assert!(!schema.validate(&json!({"score": 120, "verdict": "mixed"})).is_valid());
//! ```

use serde_json::Value;

/// The type shape expected at one position of the response
#[derive(Debug, Clone)]
pub enum Kind {
    /// Any string, optionally restricted to an allowed set
    String { allowed: Option<Vec<String>> },
    /// A number, optionally bounded (inclusive)
    Number { min: Option<f64>, max: Option<f64> },
    /// An integer, optionally bounded (inclusive)
    Integer { min: Option<i64>, max: Option<i64> },
    Boolean,
    /// An array whose every element matches the inner kind
    Array(Box<Kind>),
    /// An object with the given fields; unknown extra fields are ignored
    Object(Vec<Field>),
}

impl Kind {
    pub fn string() -> Self {
        Kind::String { allowed: None }
    }

    /// A string restricted to an enumerated set of values
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Kind::String {
            allowed: Some(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn number() -> Self {
        Kind::Number {
            min: None,
            max: None,
        }
    }

    pub fn number_between(min: f64, max: f64) -> Self {
        Kind::Number {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn integer() -> Self {
        Kind::Integer {
            min: None,
            max: None,
        }
    }

    pub fn integer_between(min: i64, max: i64) -> Self {
        Kind::Integer {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn boolean() -> Self {
        Kind::Boolean
    }

    pub fn array(inner: Kind) -> Self {
        Kind::Array(Box::new(inner))
    }

    pub fn object(fields: Vec<Field>) -> Self {
        Kind::Object(fields)
    }

    fn type_name(&self) -> String {
        match self {
            Kind::String { allowed: Some(values) } => format!("one of [{}]", values.join(", ")),
            Kind::String { allowed: None } => "string".to_string(),
            Kind::Number { min: Some(lo), max: Some(hi) } => {
                format!("number between {} and {}", lo, hi)
            }
            Kind::Number { .. } => "number".to_string(),
            Kind::Integer { min: Some(lo), max: Some(hi) } => {
                format!("integer between {} and {}", lo, hi)
            }
            Kind::Integer { .. } => "integer".to_string(),
            Kind::Boolean => "boolean".to_string(),
            Kind::Array(inner) => format!("array of {}", inner.type_name()),
            Kind::Object(_) => "object".to_string(),
        }
    }
}

/// One named field of an object schema
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub kind: Kind,
    pub required: bool,
}

impl Field {
    pub fn required(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// One schema rule broken by a response, naming the offending field path
/// and the expected vs. actual shape
#[derive(Debug, Clone)]
pub struct Violation {
    pub path: String,
    pub reason: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Result of one validation attempt
#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    Valid,
    Invalid(Vec<Violation>),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }

    pub fn into_violations(self) -> Vec<Violation> {
        match self {
            ValidationOutcome::Valid => Vec::new(),
            ValidationOutcome::Invalid(violations) => violations,
        }
    }
}

/// Structural description of an expected response value
#[derive(Debug, Clone)]
pub struct Schema {
    root: Kind,
}

impl Schema {
    pub fn new(root: Kind) -> Self {
        Self { root }
    }

    /// Shortcut for the common top-level-object case
    pub fn object(fields: Vec<Field>) -> Self {
        Self::new(Kind::Object(fields))
    }

    /// Check a raw value against the schema. Pure, no I/O.
    pub fn validate(&self, value: &Value) -> ValidationOutcome {
        let mut violations = Vec::new();
        check(&self.root, value, "$", &mut violations);
        if violations.is_empty() {
            ValidationOutcome::Valid
        } else {
            ValidationOutcome::Invalid(violations)
        }
    }

    /// Human-readable rendering, embedded into escalated prompts
    pub fn render(&self) -> String {
        let mut out = String::new();
        render_kind(&self.root, 0, &mut out);
        out
    }
}

fn actual_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(path: &str, expected: &Kind, value: &Value, out: &mut Vec<Violation>) {
    out.push(Violation {
        path: path.to_string(),
        reason: format!(
            "expected {}, got {}",
            expected.type_name(),
            actual_type(value)
        ),
    });
}

fn check(kind: &Kind, value: &Value, path: &str, out: &mut Vec<Violation>) {
    match kind {
        Kind::String { allowed } => match value {
            Value::String(s) => {
                if let Some(values) = allowed {
                    if !values.iter().any(|v| v == s) {
                        out.push(Violation {
                            path: path.to_string(),
                            reason: format!(
                                "expected one of [{}], got \"{}\"",
                                values.join(", "),
                                s
                            ),
                        });
                    }
                }
            }
            other => mismatch(path, kind, other, out),
        },
        Kind::Number { min, max } => match value.as_f64() {
            Some(n) => {
                if min.is_some_and(|lo| n < lo) || max.is_some_and(|hi| n > hi) {
                    out.push(Violation {
                        path: path.to_string(),
                        reason: format!("expected {}, got {}", kind.type_name(), n),
                    });
                }
            }
            None => mismatch(path, kind, value, out),
        },
        Kind::Integer { min, max } => match value.as_i64() {
            Some(n) => {
                if min.is_some_and(|lo| n < lo) || max.is_some_and(|hi| n > hi) {
                    out.push(Violation {
                        path: path.to_string(),
                        reason: format!("expected {}, got {}", kind.type_name(), n),
                    });
                }
            }
            None => mismatch(path, kind, value, out),
        },
        Kind::Boolean => {
            if !value.is_boolean() {
                mismatch(path, kind, value, out);
            }
        }
        Kind::Array(inner) => match value {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    check(inner, item, &format!("{}[{}]", path, i), out);
                }
            }
            other => mismatch(path, kind, other, out),
        },
        Kind::Object(fields) => match value {
            Value::Object(map) => {
                for field in fields {
                    let field_path = format!("{}.{}", path, field.name);
                    match map.get(&field.name) {
                        Some(field_value) => check(&field.kind, field_value, &field_path, out),
                        None if field.required => out.push(Violation {
                            path: field_path,
                            reason: format!(
                                "required field missing, expected {}",
                                field.kind.type_name()
                            ),
                        }),
                        None => {}
                    }
                }
            }
            other => mismatch(path, kind, other, out),
        },
    }
}

fn render_kind(kind: &Kind, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match kind {
        Kind::Object(fields) => {
            out.push_str(&format!("{}object with fields:\n", indent));
            for field in fields {
                let requirement = if field.required { "required" } else { "optional" };
                match &field.kind {
                    Kind::Object(_) => {
                        out.push_str(&format!("{}- {} ({}): ", indent, field.name, requirement));
                        out.push('\n');
                        render_kind(&field.kind, depth + 1, out);
                    }
                    other => {
                        out.push_str(&format!(
                            "{}- {} ({}): {}\n",
                            indent,
                            field.name,
                            requirement,
                            other.type_name()
                        ));
                    }
                }
            }
        }
        other => {
            out.push_str(&format!("{}{}\n", indent, other.type_name()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report_schema() -> Schema {
        Schema::object(vec![
            Field::required("score", Kind::number_between(0.0, 100.0)),
            Field::required("verdict", Kind::one_of(["credible", "mixed", "not_credible"])),
            Field::required("reasons", Kind::array(Kind::string())),
            Field::optional("confidence", Kind::number_between(0.0, 1.0)),
        ])
    }

    #[test]
    fn test_conforming_value() {
        let value = json!({
            "score": 64,
            "verdict": "mixed",
            "reasons": ["inconsistent claims", "unverified sources"]
        });
        assert!(report_schema().validate(&value).is_valid());
    }

    #[test]
    fn test_missing_required_field() {
        let value = json!({"score": 64, "verdict": "mixed"});
        let violations = report_schema().validate(&value).into_violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "$.reasons");
        assert!(violations[0].reason.contains("required field missing"));
    }

    #[test]
    fn test_out_of_range_and_bad_enum() {
        let value = json!({
            "score": 120,
            "verdict": "definitely",
            "reasons": []
        });
        let violations = report_schema().validate(&value).into_violations();
        assert_eq!(violations.len(), 2);
        // Violations come out in field declaration order
        assert_eq!(violations[0].path, "$.score");
        assert_eq!(violations[1].path, "$.verdict");
        assert!(violations[1].reason.contains("one of"));
    }

    #[test]
    fn test_wrong_type_reports_expected_vs_actual() {
        let value = json!({
            "score": "high",
            "verdict": "mixed",
            "reasons": ["ok", 3]
        });
        let violations = report_schema().validate(&value).into_violations();
        assert_eq!(violations.len(), 2);
        assert!(violations[0].reason.contains("expected number"));
        assert!(violations[0].reason.contains("got string"));
        assert_eq!(violations[1].path, "$.reasons[1]");
    }

    #[test]
    fn test_non_object_root() {
        let violations = report_schema().validate(&json!("hello")).into_violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "$");
    }

    #[test]
    fn test_integer_bounds() {
        let schema = Schema::new(Kind::integer_between(1, 5));
        assert!(schema.validate(&json!(3)).is_valid());
        assert!(!schema.validate(&json!(9)).is_valid());
        assert!(!schema.validate(&json!(2.5)).is_valid());
    }

    #[test]
    fn test_render_names_fields_and_bounds() {
        let rendered = report_schema().render();
        assert!(rendered.contains("score (required): number between 0 and 100"));
        assert!(rendered.contains("verdict (required): one of [credible, mixed, not_credible]"));
        assert!(rendered.contains("confidence (optional)"));
    }
}
