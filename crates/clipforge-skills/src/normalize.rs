//! Single-pass parameter normalization.
//!
//! For each declared parameter: resolve the raw value (primary name,
//! then aliases in declaration order), apply the default, coerce to the
//! declared type, and clamp numerics into their bounds. Invalid choice
//! and color values are dropped fail-closed; undeclared raw keys never
//! reach generation. The whole pass is O(declared parameters).

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde_json::Value;

use crate::param::{ParamSpec, ParamType, ParamValue};
use crate::skill::Skill;
use crate::{Error, Result};

/// Color names ffmpeg's filter grammar recognizes (the common subset).
const COLOR_NAMES: &[&str] = &[
    "white", "black", "red", "green", "blue", "yellow", "cyan", "magenta", "gray", "grey",
    "orange", "purple", "pink", "brown", "violet", "navy", "silver", "gold", "lime", "teal",
    "olive", "maroon", "aqua", "fuchsia", "transparent", "random",
];

/// A parameter removed during normalization, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedParam {
    pub name: String,
    pub reason: String,
}

/// The effective parameter set a generation rule receives.
///
/// Values are stored in a sorted map so rendering and composition are
/// deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveParams {
    values: BTreeMap<String, ParamValue>,
    /// Parameters dropped fail-closed, with reasons.
    pub dropped: Vec<DroppedParam>,
    /// Parameters filled from declared defaults.
    pub defaulted: Vec<String>,
}

impl EffectiveParams {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(ParamValue::as_f64)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(ParamValue::as_i64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(ParamValue::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.values.get(name).and_then(ParamValue::as_bool)
    }

    /// Unsanitized string form for template interpolation.
    pub fn render(&self, name: &str) -> Option<String> {
        self.values.get(name).map(ParamValue::render)
    }

    /// Inject a value after normalization (the composer uses this to hand
    /// the bound extra-input count to generation rules).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Normalize a raw parameter mapping against a skill's declarations.
///
/// Fails only with [`Error::MissingRequiredParameter`]; every other
/// irregularity is locally recovered (clamped, defaulted, or dropped).
/// A required parameter whose supplied value fails coercion counts as
/// missing: an invalid value must not satisfy a requirement.
pub fn normalize(skill: &Skill, raw: &serde_json::Map<String, Value>) -> Result<EffectiveParams> {
    // Case-insensitive view of the raw keys, built once per step.
    let lowered: HashMap<String, &Value> = raw
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect();

    let mut effective = EffectiveParams::default();

    for spec in &skill.params {
        let supplied = lookup(spec, &lowered);

        let value = match supplied {
            Some(value) => match coerce(spec, value) {
                Some(v) => Some(v),
                None => {
                    effective.dropped.push(DroppedParam {
                        name: spec.name.clone(),
                        reason: format!("invalid {:?} value: {}", spec.kind, compact(value)),
                    });
                    None
                }
            },
            None => None,
        };

        match value {
            Some(v) => {
                effective.values.insert(spec.name.clone(), clamp(spec, v));
            }
            None => {
                if let Some(default) = &spec.default {
                    effective.defaulted.push(spec.name.clone());
                    effective
                        .values
                        .insert(spec.name.clone(), clamp(spec, default.clone()));
                } else if spec.required {
                    return Err(Error::missing_param(&skill.name, &spec.name));
                }
            }
        }
    }

    // Raw keys that matched no declared name or alias are discarded; the
    // generation rule only ever sees declared parameters.
    for key in raw.keys() {
        if !skill.declares(key) {
            effective.dropped.push(DroppedParam {
                name: key.clone(),
                reason: "not a declared parameter".to_string(),
            });
        }
    }

    Ok(effective)
}

/// Resolve the raw value for a spec: primary name first, then aliases in
/// declaration order.
fn lookup<'a>(spec: &ParamSpec, raw: &HashMap<String, &'a Value>) -> Option<&'a Value> {
    if let Some(v) = raw.get(&spec.name.to_ascii_lowercase()) {
        return Some(v);
    }
    spec.aliases
        .iter()
        .find_map(|alias| raw.get(&alias.to_ascii_lowercase()).copied())
}

/// Coerce a raw JSON value to the declared type. `None` means the value
/// is invalid and the parameter is dropped fail-closed.
fn coerce(spec: &ParamSpec, value: &Value) -> Option<ParamValue> {
    match spec.kind {
        ParamType::Integer => number_of(value).map(|n| ParamValue::Int(n as i64)),
        ParamType::Real => number_of(value).map(ParamValue::Real),
        ParamType::String => match value {
            Value::String(s) => Some(ParamValue::Str(s.clone())),
            Value::Number(n) => Some(ParamValue::Str(n.to_string())),
            Value::Bool(b) => Some(ParamValue::Str(b.to_string())),
            _ => None,
        },
        ParamType::Boolean => match value {
            Value::Bool(b) => Some(ParamValue::Bool(*b)),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f == 0.0 => Some(ParamValue::Bool(false)),
                Some(f) if f == 1.0 => Some(ParamValue::Bool(true)),
                _ => None,
            },
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(ParamValue::Bool(true)),
                "false" | "0" => Some(ParamValue::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        ParamType::Choice => {
            let s = value.as_str()?;
            spec.choices
                .iter()
                .find(|c| c.eq_ignore_ascii_case(s))
                .map(|c| ParamValue::Str(c.clone()))
        }
        ParamType::Duration => match value {
            Value::Number(n) => n.as_f64().filter(|f| *f >= 0.0).map(ParamValue::Real),
            Value::String(s) => parse_duration(s).map(ParamValue::Real),
            _ => None,
        },
        ParamType::Color => {
            let s = value.as_str()?;
            validate_color(s).map(ParamValue::Str)
        }
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Clamp numeric values into [min, max]. Out-of-range is a recoverable
/// condition, not an error.
fn clamp(spec: &ParamSpec, value: ParamValue) -> ParamValue {
    if spec.min.is_none() && spec.max.is_none() {
        return value;
    }
    let lo = spec.min.unwrap_or(f64::NEG_INFINITY);
    let hi = spec.max.unwrap_or(f64::INFINITY);
    match value {
        ParamValue::Int(i) => ParamValue::Int((i as f64).clamp(lo, hi) as i64),
        ParamValue::Real(r) => ParamValue::Real(r.clamp(lo, hi)),
        other => other,
    }
}

/// Parse "mm:ss" (or "hh:mm:ss") clock durations and bare second counts.
pub fn parse_duration(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if !s.contains(':') {
        return s.parse::<f64>().ok().filter(|f| *f >= 0.0);
    }

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let mut seconds = 0.0;
    for part in &parts {
        let v = part.parse::<f64>().ok().filter(|f| *f >= 0.0)?;
        seconds = seconds * 60.0 + v;
    }
    Some(seconds)
}

/// Validate a color value: a recognized name, or hex in `#RRGGBB[AA]` /
/// `0xRRGGBB[AA]` form. Returns the canonical (lowercased) form.
pub fn validate_color(s: &str) -> Option<String> {
    let lower = s.trim().to_ascii_lowercase();
    if COLOR_NAMES.contains(&lower.as_str()) {
        return Some(lower);
    }
    let hex = lower
        .strip_prefix("0x")
        .or_else(|| lower.strip_prefix('#'))?;
    if (hex.len() == 6 || hex.len() == 8) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(format!("0x{hex}"));
    }
    None
}

fn compact(value: &Value) -> String {
    let s = value.to_string();
    if s.chars().count() > 48 {
        let head: String = s.chars().take(48).collect();
        format!("{head}...")
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamSpec;
    use crate::skill::{Skill, SkillDef};
    use serde_json::json;

    fn raw(v: serde_json::Value) -> serde_json::Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    fn brightness() -> Skill {
        Skill::from_def(
            SkillDef::new("brightness")
                .template("eq=brightness={value}")
                .param(
                    ParamSpec::new("value", ParamType::Real)
                        .bounded(-1.0, 1.0)
                        .with_default(0.0)
                        .with_aliases(&["level", "amount"]),
                ),
        )
        .unwrap()
    }

    #[test]
    fn clamps_out_of_range_to_bounds() {
        let skill = brightness();

        let eff = normalize(&skill, &raw(json!({"value": 5.0}))).unwrap();
        assert_eq!(eff.get("value"), Some(&ParamValue::Real(1.0)));

        let eff = normalize(&skill, &raw(json!({"value": -3.0}))).unwrap();
        assert_eq!(eff.get("value"), Some(&ParamValue::Real(-1.0)));

        let eff = normalize(&skill, &raw(json!({"value": 0.4}))).unwrap();
        assert_eq!(eff.get("value"), Some(&ParamValue::Real(0.4)));
    }

    #[test]
    fn aliases_resolve_in_declaration_order() {
        let skill = brightness();
        let eff = normalize(&skill, &raw(json!({"level": 0.25}))).unwrap();
        assert_eq!(eff.get_f64("value"), Some(0.25));
    }

    #[test]
    fn default_applies_and_is_recorded() {
        let skill = brightness();
        let eff = normalize(&skill, &raw(json!({}))).unwrap();
        assert_eq!(eff.get_f64("value"), Some(0.0));
        assert_eq!(eff.defaulted, vec!["value"]);
    }

    #[test]
    fn missing_required_fails_the_step() {
        let skill = Skill::from_def(
            SkillDef::new("crop")
                .template("crop={width}:{height}")
                .param(ParamSpec::new("width", ParamType::Integer).required())
                .param(ParamSpec::new("height", ParamType::Integer).required()),
        )
        .unwrap();

        let err = normalize(&skill, &raw(json!({"width": 640}))).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingRequiredParameter { ref param, .. } if param == "height"
        ));
    }

    #[test]
    fn required_with_uncoercible_value_counts_as_missing() {
        let skill = Skill::from_def(
            SkillDef::new("crop")
                .template("crop={width}")
                .param(ParamSpec::new("width", ParamType::Integer).required()),
        )
        .unwrap();
        let err = normalize(&skill, &raw(json!({"width": "wide"}))).unwrap_err();
        assert!(matches!(err, Error::MissingRequiredParameter { .. }));
    }

    #[test]
    fn integer_coercion_truncates() {
        let skill = Skill::from_def(
            SkillDef::new("blur")
                .template("boxblur={radius}")
                .param(ParamSpec::new("radius", ParamType::Integer).bounded(1.0, 50.0)),
        )
        .unwrap();

        let eff = normalize(&skill, &raw(json!({"radius": 3.9}))).unwrap();
        assert_eq!(eff.get("radius"), Some(&ParamValue::Int(3)));

        let eff = normalize(&skill, &raw(json!({"radius": "12"}))).unwrap();
        assert_eq!(eff.get("radius"), Some(&ParamValue::Int(12)));
    }

    #[test]
    fn boolean_accepts_documented_forms() {
        let skill = Skill::from_def(
            SkillDef::new("toggle")
                .template("x={on}")
                .param(ParamSpec::new("on", ParamType::Boolean)),
        )
        .unwrap();

        for (input, expected) in [
            (json!({"on": true}), true),
            (json!({"on": 1}), true),
            (json!({"on": 0}), false),
            (json!({"on": "TRUE"}), true),
            (json!({"on": "false"}), false),
        ] {
            let eff = normalize(&skill, &raw(input)).unwrap();
            assert_eq!(eff.get_bool("on"), Some(expected));
        }

        let eff = normalize(&skill, &raw(json!({"on": "maybe"}))).unwrap();
        assert_eq!(eff.get("on"), None);
        assert_eq!(eff.dropped.len(), 1);
    }

    #[test]
    fn unrecognized_choice_is_dropped_not_forwarded() {
        let skill = Skill::from_def(
            SkillDef::new("fade")
                .template("fade=t={direction}")
                .param(
                    ParamSpec::new("direction", ParamType::Choice).with_choices(&["in", "out"]),
                ),
        )
        .unwrap();

        let eff = normalize(&skill, &raw(json!({"direction": "sideways"}))).unwrap();
        assert!(eff.get("direction").is_none());
        assert_eq!(eff.dropped[0].name, "direction");

        // Case-insensitive match yields the declared casing.
        let eff = normalize(&skill, &raw(json!({"direction": "OUT"}))).unwrap();
        assert_eq!(eff.get_str("direction"), Some("out"));
    }

    #[test]
    fn duration_parses_clock_and_seconds() {
        assert_eq!(parse_duration("90"), Some(90.0));
        assert_eq!(parse_duration("1:30"), Some(90.0));
        assert_eq!(parse_duration("01:02:03"), Some(3723.0));
        assert_eq!(parse_duration("2.5"), Some(2.5));
        assert_eq!(parse_duration("-5"), None);
        assert_eq!(parse_duration("a:b"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn color_validation() {
        assert_eq!(validate_color("White"), Some("white".to_string()));
        assert_eq!(validate_color("#FF0000"), Some("0xff0000".to_string()));
        assert_eq!(validate_color("0x00ff0080"), Some("0x00ff0080".to_string()));
        assert_eq!(validate_color("#12345"), None);
        assert_eq!(validate_color("blurple"), None);
    }

    #[test]
    fn invalid_color_is_dropped() {
        let skill = Skill::from_def(
            SkillDef::new("tint")
                .template("color={shade}")
                .param(ParamSpec::new("shade", ParamType::Color).with_default("white")),
        )
        .unwrap();

        // Invalid supplied value drops, then the default applies.
        let eff = normalize(&skill, &raw(json!({"shade": "chartreuse-ish"}))).unwrap();
        assert_eq!(eff.get_str("shade"), Some("white"));
        assert_eq!(eff.dropped.len(), 1);
    }

    #[test]
    fn undeclared_keys_are_discarded() {
        let skill = brightness();
        let eff = normalize(
            &skill,
            &raw(json!({"value": 0.1, "sneaky": "';drop", "other": 9})),
        )
        .unwrap();
        assert_eq!(eff.len(), 1);
        assert!(eff.dropped.iter().any(|d| d.name == "sneaky"));
        assert!(eff.dropped.iter().any(|d| d.name == "other"));
    }

    #[test]
    fn raw_keys_match_case_insensitively() {
        let skill = brightness();
        let eff = normalize(&skill, &raw(json!({"VALUE": 0.3}))).unwrap();
        assert_eq!(eff.get_f64("value"), Some(0.3));
    }
}
