//! The tagged value model (spec §3): a parameter or variable's resolved value,
//! carrying enough information to validate constraints and project back to a
//! string for interpolation.

use std::fmt;

use crate::ast::ParameterConstraint;
use crate::errors::{InterpreterError, ParameterValidationError};

/// Duration stored as whole milliseconds. Parsed from `"30s"`, `"5m"`,
/// `"1h30m"`-style suffix chains — the same vocabulary the teacher's time
/// commands format durations with, run in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationValue(pub u64);

impl DurationValue {
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    List(Vec<String>),
    Duration(DurationValue),
}

impl Value {
    /// Infers a kind from raw text per spec §3: booleans first (exact
    /// keyword match), then all-digit numbers, then comma-present lists,
    /// else a plain string.
    pub fn infer(raw: &str) -> Value {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => return Value::Boolean(true),
            "false" | "no" | "off" => return Value::Boolean(false),
            "1" if trimmed == "1" => return Value::Boolean(true),
            "0" if trimmed == "0" => return Value::Boolean(false),
            _ => {}
        }
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse::<f64>() {
                return Value::Number(n);
            }
        }
        if trimmed.contains(',') {
            return Value::List(trimmed.split(',').map(|s| s.trim().to_string()).collect());
        }
        Value::String(raw.to_string())
    }

    /// Parses raw text as a specific declared type, per spec §4.3.
    pub fn parse_as(raw: &str, ty: crate::ast::ParameterType) -> Result<Value, String> {
        use crate::ast::ParameterType as PT;
        match ty {
            PT::String => Ok(Value::String(raw.to_string())),
            PT::Number => raw
                .trim()
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| format!("invalid number value: '{}'", raw)),
            PT::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(Value::Boolean(true)),
                "false" | "no" | "0" | "off" => Ok(Value::Boolean(false)),
                _ => Err(format!("invalid boolean value: '{}'", raw)),
            },
            PT::List => Ok(Value::List(
                raw.split(',').map(|s| s.trim().to_string()).collect(),
            )),
            PT::Duration => parse_duration(raw)
                .map(Value::Duration)
                .ok_or_else(|| format!("invalid duration value: '{}'", raw)),
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
            Value::List(items) => items.join(","),
            Value::Duration(d) => format!("{}ms", d.as_millis()),
        }
    }

    pub fn as_list(&self) -> Vec<String> {
        match self {
            Value::List(items) => items.clone(),
            other => other.as_string().split_whitespace().map(String::from).collect(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::String(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "1" | "on"
            ),
            Value::Number(n) => *n != 0.0,
            Value::List(items) => !items.is_empty(),
            Value::Duration(d) => d.as_millis() != 0,
        }
    }

    /// Validates the value against a declared constraint (spec §4.3):
    /// enumeration, numeric bounds, regex pattern, or named pattern macro.
    pub fn validate_constraint(
        &self,
        param_name: &str,
        constraint: &ParameterConstraint,
    ) -> Result<(), InterpreterError> {
        let as_str = self.as_string();

        if let Some(allowed) = &constraint.allowed {
            if !allowed.iter().any(|a| a == &as_str) {
                return Err(ParameterValidationError::new(format!(
                    "parameter '{}' value '{}' is not one of: {}",
                    param_name,
                    as_str,
                    allowed.join(", ")
                ))
                .into());
            }
        }

        if constraint.min.is_some() || constraint.max.is_some() {
            let n = match self {
                Value::Number(n) => *n,
                _ => as_str.parse::<f64>().map_err(|_| {
                    ParameterValidationError::new(format!(
                        "parameter '{}' requires a numeric value for range validation, got '{}'",
                        param_name, as_str
                    ))
                })?,
            };
            if let Some(min) = constraint.min {
                if n < min {
                    return Err(ParameterValidationError::new(format!(
                        "parameter '{}' value {} is below minimum {}",
                        param_name, n, min
                    ))
                    .into());
                }
            }
            if let Some(max) = constraint.max {
                if n > max {
                    return Err(ParameterValidationError::new(format!(
                        "parameter '{}' value {} is above maximum {}",
                        param_name, n, max
                    ))
                    .into());
                }
            }
        }

        let pattern = constraint
            .pattern
            .clone()
            .or_else(|| constraint.pattern_macro.as_deref().and_then(pattern_macro));
        if let Some(pattern) = pattern {
            let re = regex_lite::Regex::new(&pattern).map_err(|e| {
                ParameterValidationError::new(format!(
                    "parameter '{}' has an invalid pattern '{}': {}",
                    param_name, pattern, e
                ))
            })?;
            if !re.is_match(&as_str) {
                return Err(ParameterValidationError::new(format!(
                    "parameter '{}' value '{}' does not match required pattern",
                    param_name, as_str
                ))
                .into());
            }
        }

        Ok(())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn pattern_macro(name: &str) -> Option<String> {
    match name {
        "email" => Some(r"^[^@\s]+@[^@\s]+\.[^@\s]+$".to_string()),
        "semver" => Some(r"^\d+\.\d+\.\d+".to_string()),
        "url" => Some(r"^https?://".to_string()),
        _ => None,
    }
}

/// Parses a duration suffix chain like `"1h30m"`, `"30s"`, `"500ms"` into
/// milliseconds. Unknown suffixes or an empty chain return `None`.
pub fn parse_duration(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut chars = raw.chars().peekable();
    let mut matched_any = false;
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            digits.push(c);
            chars.next();
            continue;
        }
        let mut unit = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphabetic() {
                unit.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if digits.is_empty() || unit.is_empty() {
            return None;
        }
        let n: f64 = digits.parse().ok()?;
        let ms = match unit.as_str() {
            "ms" => n,
            "s" => n * 1000.0,
            "m" => n * 60_000.0,
            "h" => n * 3_600_000.0,
            "d" => n * 86_400_000.0,
            _ => return None,
        };
        total += ms as u64;
        digits.clear();
        matched_any = true;
    }
    if !matched_any || !digits.is_empty() {
        return None;
    }
    Some(total)
}
