//! Option declaration and option-string parsing
//!
//! Methods declare typed options with defaults, then the host hands over an
//! option string of the form `Key=Value:Key2=Value2:!BoolKey:BoolKey`.
//! Keys match case-insensitively. Text options may carry a list of
//! predefined values; anything outside that list is rejected.

use mvaplug_core::{Error, Result};
use std::fmt;

/// Typed option value
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// A declared option
#[derive(Debug, Clone)]
pub struct OptionSpec {
    /// Option key
    pub name: String,

    /// Default value, also fixes the option's type
    pub default: OptionValue,

    /// Current value
    pub value: OptionValue,

    /// Help text
    pub help: String,

    /// Predefined values for text options (empty = free text)
    pub allowed: Vec<String>,

    /// Whether the option string set this option explicitly
    pub is_set: bool,
}

/// Ordered set of declared options
#[derive(Debug, Clone, Default)]
pub struct OptionSet {
    specs: Vec<OptionSpec>,
}

impl OptionSet {
    /// Create an empty option set
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an option with a default value
    pub fn declare(
        &mut self,
        name: &str,
        default: impl Into<OptionValue>,
        help: &str,
    ) -> &mut Self {
        self.declare_with_values(name, default, help, &[])
    }

    /// Declare a text option restricted to predefined values
    pub fn declare_with_values(
        &mut self,
        name: &str,
        default: impl Into<OptionValue>,
        help: &str,
        allowed: &[&str],
    ) -> &mut Self {
        let default = default.into();
        self.specs.retain(|s| !s.name.eq_ignore_ascii_case(name));
        self.specs.push(OptionSpec {
            name: name.to_string(),
            value: default.clone(),
            default,
            help: help.to_string(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            is_set: false,
        });
        self
    }

    /// Declared options in declaration order
    pub fn specs(&self) -> &[OptionSpec] {
        &self.specs
    }

    /// True if nothing has been declared
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Parse an option string and update the declared values
    pub fn parse(&mut self, options: &str) -> Result<()> {
        for token in options.split(':').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, raw) = match token.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (token, None),
            };

            let (key, negated) = match key.strip_prefix('!') {
                Some(stripped) => (stripped.trim(), true),
                None => (key, false),
            };

            let spec = self
                .specs
                .iter_mut()
                .find(|s| s.name.eq_ignore_ascii_case(key))
                .ok_or_else(|| Error::config(format!("unknown option '{}'", key)))?;

            spec.value = match (raw, &spec.default) {
                (None, OptionValue::Bool(_)) => OptionValue::Bool(!negated),
                (None, other) => {
                    return Err(Error::config(format!(
                        "option '{}' expects a {} value",
                        spec.name,
                        other.kind()
                    )))
                }
                (Some(_), _) if negated => {
                    return Err(Error::config(format!(
                        "'!' can only prefix bool options without value, got '{}'",
                        token
                    )))
                }
                (Some(raw), default) => convert(&spec.name, raw, default, &spec.allowed)?,
            };
            spec.is_set = true;
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Result<&OptionValue> {
        self.specs
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| &s.value)
            .ok_or_else(|| Error::config(format!("option '{}' was never declared", name)))
    }

    /// Current value of a bool option
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.get(name)? {
            OptionValue::Bool(v) => Ok(*v),
            other => Err(type_mismatch(name, "bool", other)),
        }
    }

    /// Current value of an integer option
    pub fn get_int(&self, name: &str) -> Result<i64> {
        match self.get(name)? {
            OptionValue::Int(v) => Ok(*v),
            other => Err(type_mismatch(name, "integer", other)),
        }
    }

    /// Current value of a float option
    pub fn get_float(&self, name: &str) -> Result<f64> {
        match self.get(name)? {
            OptionValue::Float(v) => Ok(*v),
            other => Err(type_mismatch(name, "float", other)),
        }
    }

    /// Current value of a text option
    pub fn get_str(&self, name: &str) -> Result<&str> {
        match self.get(name)? {
            OptionValue::Text(v) => Ok(v.as_str()),
            other => Err(type_mismatch(name, "string", other)),
        }
    }
}

fn type_mismatch(name: &str, wanted: &str, found: &OptionValue) -> Error {
    Error::config(format!(
        "option '{}' is a {}, not a {}",
        name,
        found.kind(),
        wanted
    ))
}

fn convert(name: &str, raw: &str, default: &OptionValue, allowed: &[String]) -> Result<OptionValue> {
    let bad = || Error::config(format!("invalid {} value '{}' for option '{}'", default.kind(), raw, name));

    match default {
        OptionValue::Bool(_) => match raw.to_ascii_lowercase().as_str() {
            "t" | "true" | "1" | "yes" => Ok(OptionValue::Bool(true)),
            "f" | "false" | "0" | "no" => Ok(OptionValue::Bool(false)),
            _ => Err(bad()),
        },
        OptionValue::Int(_) => raw.parse().map(OptionValue::Int).map_err(|_| bad()),
        OptionValue::Float(_) => raw.parse().map(OptionValue::Float).map_err(|_| bad()),
        OptionValue::Text(_) if allowed.is_empty() => Ok(OptionValue::Text(raw.to_string())),
        OptionValue::Text(_) => allowed
            .iter()
            .find(|a| a.eq_ignore_ascii_case(raw))
            .map(|a| OptionValue::Text(a.clone()))
            .ok_or_else(|| {
                Error::config(format!(
                    "value '{}' for option '{}' is not one of [{}]",
                    raw,
                    name,
                    allowed.join(", ")
                ))
            }),
    }
}
