//! Skill definitions and their generation rules.
//!
//! A [`SkillDef`] is the raw shape a skill pack (or the built-in
//! catalog) provides: optional template, sub-pipeline, and builtin
//! fields. [`Skill::from_def`] validates the definition — exactly one
//! generation rule, parameter invariants — and builds the cached
//! parameter lookup used on every invocation.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::param::ParamSpec;
use crate::{Error, Result};

/// Informational category tag. Only `Audio` affects composition: template
/// fragments from audio skills land in the audio filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillCategory {
    #[default]
    Video,
    Audio,
    Text,
    Transform,
    Composite,
}

/// A child invocation inside a sub-pipeline rule.
///
/// Parameter values are strings that may contain `{name}` placeholders,
/// substituted from the parent's effective parameters before the child
/// is normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildStep {
    pub skill: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// How a skill turns effective parameters into fragments.
///
/// Closed set, matched exhaustively at composition time. A skill carries
/// exactly one rule, enforced at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationRule {
    /// A template with `{param}` placeholders, substituted with sanitized
    /// parameter values.
    Template(String),
    /// An ordered sub-pipeline of child invocations expanded in place.
    SubPipeline(Vec<ChildStep>),
    /// The identifier of a builtin handler function.
    Builtin(String),
}

/// Raw skill-pack shape, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillDef {
    pub name: String,

    #[serde(default)]
    pub category: SkillCategory,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub examples: Vec<String>,

    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub params: Vec<ParamSpec>,

    /// Template generation rule, if any.
    #[serde(default)]
    pub template: Option<String>,

    /// Sub-pipeline generation rule, if any.
    #[serde(default)]
    pub pipeline: Option<Vec<ChildStep>>,

    /// Builtin handler identifier, if any.
    #[serde(default)]
    pub builtin: Option<String>,
}

impl SkillDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn category(mut self, category: SkillCategory) -> Self {
        self.category = category;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn sub_pipeline(mut self, children: Vec<ChildStep>) -> Self {
        self.pipeline = Some(children);
        self
    }

    pub fn builtin(mut self, id: impl Into<String>) -> Self {
        self.builtin = Some(id.into());
        self
    }
}

/// A validated skill with its cached parameter lookup.
#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub category: SkillCategory,
    pub description: String,
    pub tags: Vec<String>,
    pub examples: Vec<String>,
    pub aliases: Vec<String>,
    pub params: Vec<ParamSpec>,
    pub rule: GenerationRule,
    /// Lowercased parameter name/alias -> index into `params`. Built once
    /// here and never rebuilt per invocation.
    param_index: HashMap<String, usize>,
}

impl Skill {
    /// Validate a definition and build the cached parameter index.
    ///
    /// Rejects a definition whose generation rule is ambiguous (more than
    /// one of template/pipeline/builtin) or missing (none), and one whose
    /// parameters violate their declaration invariants.
    pub fn from_def(def: SkillDef) -> Result<Self> {
        if def.name.trim().is_empty() {
            return Err(Error::malformed("<unnamed>", "skill name is empty"));
        }

        let rule = match (def.template, def.pipeline, def.builtin) {
            (Some(t), None, None) => GenerationRule::Template(t),
            (None, Some(p), None) => {
                if p.is_empty() {
                    return Err(Error::malformed(&def.name, "sub-pipeline is empty"));
                }
                GenerationRule::SubPipeline(p)
            }
            (None, None, Some(b)) => GenerationRule::Builtin(b),
            (None, None, None) => {
                return Err(Error::malformed(&def.name, "no generation rule declared"))
            }
            _ => {
                return Err(Error::malformed(
                    &def.name,
                    "more than one generation rule declared",
                ))
            }
        };

        let mut param_index = HashMap::new();
        for (i, spec) in def.params.iter().enumerate() {
            spec.validate(&def.name)?;
            if param_index
                .insert(spec.name.to_ascii_lowercase(), i)
                .is_some()
            {
                return Err(Error::malformed(
                    &def.name,
                    format!("duplicate parameter name {}", spec.name),
                ));
            }
            for alias in &spec.aliases {
                param_index.insert(alias.to_ascii_lowercase(), i);
            }
        }

        Ok(Self {
            name: def.name,
            category: def.category,
            description: def.description,
            tags: def.tags,
            examples: def.examples,
            aliases: def.aliases,
            params: def.params,
            rule,
            param_index,
        })
    }

    /// Look up a parameter spec by name or alias, case-insensitively.
    pub fn param(&self, key: &str) -> Option<&ParamSpec> {
        self.param_index
            .get(&key.to_ascii_lowercase())
            .map(|&i| &self.params[i])
    }

    /// Whether a raw key matches any declared parameter name or alias.
    pub fn declares(&self, key: &str) -> bool {
        self.param_index.contains_key(&key.to_ascii_lowercase())
    }

    /// Names of skills this skill's sub-pipeline references, if any.
    pub fn child_skills(&self) -> &[ChildStep] {
        match &self.rule {
            GenerationRule::SubPipeline(children) => children,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamType;

    #[test]
    fn rejects_missing_rule() {
        let def = SkillDef::new("noop");
        let err = Skill::from_def(def).unwrap_err();
        assert!(matches!(err, Error::MalformedSkill { .. }));
    }

    #[test]
    fn rejects_ambiguous_rule() {
        let def = SkillDef::new("twice")
            .template("eq=brightness={value}")
            .builtin("overlay");
        let err = Skill::from_def(def).unwrap_err();
        assert!(err.to_string().contains("more than one generation rule"));
    }

    #[test]
    fn rejects_empty_sub_pipeline() {
        let def = SkillDef::new("hollow").sub_pipeline(vec![]);
        assert!(Skill::from_def(def).is_err());
    }

    #[test]
    fn param_index_covers_aliases() {
        let def = SkillDef::new("brightness")
            .template("eq=brightness={value}")
            .param(
                ParamSpec::new("value", ParamType::Real)
                    .bounded(-1.0, 1.0)
                    .with_aliases(&["level", "amount"]),
            );
        let skill = Skill::from_def(def).unwrap();

        assert!(skill.param("value").is_some());
        assert!(skill.param("LEVEL").is_some());
        assert!(skill.param("amount").is_some());
        assert!(skill.param("strength").is_none());
        assert!(skill.declares("Amount"));
    }

    #[test]
    fn rejects_duplicate_param_names() {
        let def = SkillDef::new("dup")
            .template("x={a}")
            .param(ParamSpec::new("a", ParamType::Integer))
            .param(ParamSpec::new("A", ParamType::Integer));
        assert!(Skill::from_def(def).is_err());
    }

    #[test]
    fn def_deserializes_from_toml_pack() {
        let def: SkillDef = toml_like_json();
        let skill = Skill::from_def(def).unwrap();
        assert_eq!(skill.name, "vignette");
        assert!(matches!(skill.rule, GenerationRule::Template(_)));
    }

    fn toml_like_json() -> SkillDef {
        serde_json::from_value(serde_json::json!({
            "name": "vignette",
            "category": "video",
            "description": "Darken frame edges",
            "template": "vignette=angle={angle}",
            "params": [
                {"name": "angle", "type": "real", "default": 0.5, "min": 0.0, "max": 1.57}
            ]
        }))
        .unwrap()
    }
}
