//! Declarative parameter validation and conversion.
//!
//! Each route declares an ordered list of parameter specs. Validation is
//! collect-all: every missing name and every violation is gathered before
//! failing, so the peer sees all problems in one response.

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::common::error::RequestError;

/// Converter or validator attached to a declared parameter.
#[derive(Clone, Debug)]
pub enum ParamKind {
    Int,
    Float,
    Bool,
    Str,
    /// Full-match regex validator with a human-readable error message
    Pattern { re: Regex, message: String },
}

impl ParamKind {
    /// Build a pattern validator. The pattern must match the entire value.
    ///
    /// Panics on an invalid pattern; route schemas are built once at
    /// startup.
    pub fn pattern(pattern: &str, message: &str) -> ParamKind {
        let re = Regex::new(&format!(r"\A(?:{})\z", pattern))
            .expect("invalid route parameter pattern");
        ParamKind::Pattern {
            re,
            message: message.to_string(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Bool => "bool",
            ParamKind::Str => "str",
            ParamKind::Pattern { .. } => "str",
        }
    }

    /// Description used when the parameter is missing.
    fn describe(&self) -> String {
        match self {
            ParamKind::Pattern { message, .. } => message.clone(),
            other => format!("type {}", other.type_name()),
        }
    }

    /// Convert and validate a present value. The error is the violation
    /// detail without the parameter name.
    fn convert(&self, value: &Value) -> Result<Value, String> {
        match self {
            ParamKind::Int => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| format!("must be of type {}", self.type_name())),
                _ => Err(format!("must be of type {}", self.type_name())),
            },
            ParamKind::Float => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("must be of type {}", self.type_name())),
                _ => Err(format!("must be of type {}", self.type_name())),
            },
            ParamKind::Bool => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) => match s.trim() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(format!("must be of type {}", self.type_name())),
                },
                _ => Err(format!("must be of type {}", self.type_name())),
            },
            ParamKind::Str => scalar_to_string(value)
                .map(Value::String)
                .ok_or_else(|| format!("must be of type {}", self.type_name())),
            ParamKind::Pattern { re, message } => {
                let s = scalar_to_string(value).ok_or_else(|| message.clone())?;
                if re.is_match(&s) {
                    Ok(Value::String(s))
                } else {
                    Err(message.clone())
                }
            }
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// One declared route parameter.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
}

/// Where the input mapping was taken from; only changes error wording.
#[derive(Clone, Copy, Debug)]
pub enum ParamSource {
    Query,
    Body,
}

impl ParamSource {
    fn describe(&self) -> &'static str {
        match self {
            ParamSource::Query => "url parameter(s)",
            ParamSource::Body => "json object",
        }
    }
}

/// Validated, converted handler arguments.
#[derive(Clone, Debug, Default)]
pub struct Args(Map<String, Value>);

impl Args {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    pub fn str(&self, name: &str) -> Result<&str, RequestError> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| missing_argument(name))
    }

    pub fn i64(&self, name: &str) -> Result<i64, RequestError> {
        self.get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| missing_argument(name))
    }

    pub fn f64(&self, name: &str) -> Result<f64, RequestError> {
        self.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing_argument(name))
    }

    pub fn bool(&self, name: &str) -> Result<bool, RequestError> {
        self.get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| missing_argument(name))
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

fn missing_argument(name: &str) -> RequestError {
    // validation guarantees presence; reaching this is a schema bug
    RequestError::internal("ArgumentError", format!("argument {} is not available", name))
}

/// Validate the input mapping against the declared specs.
///
/// Missing required parameters win over wrong-typed ones; both checks run
/// to completion before failing.
pub fn validate(
    specs: &[ParamSpec],
    input: &Map<String, Value>,
    source: ParamSource,
) -> Result<Args, RequestError> {
    let mut args = Map::new();
    let mut missing: Vec<String> = Vec::new();
    let mut wrong: Vec<String> = Vec::new();

    for spec in specs {
        let value = input.get(&spec.name).filter(|v| !v.is_null());

        let Some(value) = value else {
            if !spec.required || spec.default.is_some() {
                let fallback = spec.default.clone().unwrap_or(Value::Null);
                args.insert(spec.name.clone(), fallback);
            } else {
                missing.push(format!("{} ({})", spec.name, spec.kind.describe()));
            }
            continue;
        };

        match spec.kind.convert(value) {
            Ok(converted) => {
                args.insert(spec.name.clone(), converted);
            }
            Err(detail) => wrong.push(format!("{} {}", spec.name, detail)),
        }
    }

    if !missing.is_empty() {
        return Err(RequestError::MissingParameters(format!(
            "request expected {}: {}",
            source.describe(),
            missing.join(", ")
        )));
    }

    if !wrong.is_empty() {
        return Err(RequestError::BadParameters(wrong.join(", ")));
    }

    Ok(Args(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn specs() -> Vec<ParamSpec> {
        vec![
            ParamSpec {
                name: "car_id".into(),
                kind: ParamKind::Int,
                required: true,
                default: None,
            },
            ParamSpec {
                name: "like".into(),
                kind: ParamKind::Bool,
                required: true,
                default: None,
            },
            ParamSpec {
                name: "note".into(),
                kind: ParamKind::Str,
                required: false,
                default: None,
            },
        ]
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn converts_and_defaults() {
        let input = obj(json!({"car_id": "17", "like": true}));
        let args = validate(&specs(), &input, ParamSource::Body).unwrap();
        assert_eq!(args.i64("car_id").unwrap(), 17);
        assert!(args.bool("like").unwrap());
        assert!(args.get("note").is_none());
    }

    #[test]
    fn collects_all_missing_names() {
        let input = obj(json!({}));
        let err = validate(&specs(), &input, ParamSource::Body).unwrap_err();
        let RequestError::MissingParameters(msg) = err else {
            panic!("expected MissingParameters");
        };
        assert!(msg.contains("car_id (type int)"));
        assert!(msg.contains("like (type bool)"));
    }

    #[test]
    fn collects_all_violations() {
        let input = obj(json!({"car_id": "seventeen", "like": "maybe"}));
        let err = validate(&specs(), &input, ParamSource::Body).unwrap_err();
        let RequestError::BadParameters(msg) = err else {
            panic!("expected BadParameters");
        };
        assert!(msg.contains("car_id must be of type int"));
        assert!(msg.contains("like must be of type bool"));
    }

    #[test]
    fn missing_wins_over_wrong_type() {
        let input = obj(json!({"car_id": "seventeen"}));
        let err = validate(&specs(), &input, ParamSource::Body).unwrap_err();
        assert!(matches!(err, RequestError::MissingParameters(_)));
    }

    #[test]
    fn optional_null_unwraps_to_null() {
        let input = obj(json!({"car_id": 1, "like": false, "note": null}));
        let args = validate(&specs(), &input, ParamSource::Body).unwrap();
        assert!(args.get("note").is_none());
    }

    #[test]
    fn pattern_validator_messages() {
        let specs = vec![ParamSpec {
            name: "username".into(),
            kind: ParamKind::pattern(
                "[a-zA-Z0-9_]{3,20}",
                "must be 3-20 chars long and only contain letters, numbers and underscores",
            ),
            required: true,
            default: None,
        }];

        let ok = obj(json!({"username": "ana_b"}));
        assert!(validate(&specs, &ok, ParamSource::Body).is_ok());

        let bad = obj(json!({"username": "a!"}));
        let err = validate(&specs, &bad, ParamSource::Body).unwrap_err();
        let RequestError::BadParameters(msg) = err else {
            panic!("expected BadParameters");
        };
        assert!(msg.starts_with("username must be 3-20 chars"));

        // missing uses the validator message too
        let err = validate(&specs, &obj(json!({})), ParamSource::Body).unwrap_err();
        let RequestError::MissingParameters(msg) = err else {
            panic!("expected MissingParameters");
        };
        assert!(msg.contains("username (must be 3-20 chars"));
    }

    #[test]
    fn defaults_are_substituted() {
        let specs = vec![ParamSpec {
            name: "page".into(),
            kind: ParamKind::Int,
            required: false,
            default: Some(json!(1)),
        }];
        let args = validate(&specs, &obj(json!({})), ParamSource::Query).unwrap();
        assert_eq!(args.i64("page").unwrap(), 1);
    }
}
