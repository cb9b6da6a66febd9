//! Parameter schema for skills.
//!
//! A [`ParamSpec`] declares what a skill accepts: its type, default,
//! numeric bounds, allowed choices, and alias names. The normalizer
//! (see `normalize`) enforces these declarations against raw
//! model-supplied values.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Declared type of a skill parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// Whole number; fractional inputs truncate.
    Integer,
    /// Floating point number.
    Real,
    /// Free text, sanitized before interpolation.
    String,
    /// Accepts true/false, 0/1, and case-insensitive "true"/"false".
    Boolean,
    /// Must case-insensitively match one of the declared choices.
    Choice,
    /// "mm:ss" or a bare number of seconds; normalizes to seconds.
    Duration,
    /// A recognized color name or hex value.
    Color,
}

/// A coerced parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
}

impl ParamValue {
    /// Render the value as the string form used for template interpolation.
    ///
    /// This is the raw (unsanitized) form; escaping happens at emission time.
    pub fn render(&self) -> String {
        match self {
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Real(r) => {
                // Avoid "1.0" vs "1" churn in emitted filter strings.
                if r.fract() == 0.0 && r.is_finite() && r.abs() < 1e15 {
                    format!("{}", *r as i64)
                } else {
                    format!("{r}")
                }
            }
            ParamValue::Str(s) => s.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(i) => Some(*i as f64),
            ParamValue::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Real(r) => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Real(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

/// Declaration of a single skill parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ParamType,

    #[serde(default)]
    pub default: Option<ParamValue>,

    #[serde(default)]
    pub required: bool,

    /// Lower bound for integer/real parameters. Out-of-range values clamp.
    #[serde(default)]
    pub min: Option<f64>,

    /// Upper bound for integer/real parameters. Out-of-range values clamp.
    #[serde(default)]
    pub max: Option<f64>,

    /// Allowed values for choice parameters (canonical casing).
    #[serde(default)]
    pub choices: Vec<String>,

    /// Alternative names the model may use for this parameter.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            required: false,
            min: None,
            max: None,
            choices: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn bounded(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Check the declaration invariants.
    ///
    /// A required parameter cannot carry a default, and a choice parameter
    /// must declare a non-empty choice set.
    pub fn validate(&self, skill: &str) -> Result<()> {
        if self.required && self.default.is_some() {
            return Err(Error::malformed(
                skill,
                format!("required parameter {} must not have a default", self.name),
            ));
        }
        if self.kind == ParamType::Choice && self.choices.is_empty() {
            return Err(Error::malformed(
                skill,
                format!("choice parameter {} has an empty choice set", self.name),
            ));
        }
        Ok(())
    }
}
