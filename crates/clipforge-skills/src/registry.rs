//! The [`SkillRegistry`]: name -> skill lookup with alias and fuzzy
//! resolution.
//!
//! The registry is populated once at startup (built-in catalog plus any
//! skill packs) and treated as read-only during compilation, so shared
//! references are safe across concurrent compiles.

use std::collections::HashMap;
use std::sync::Arc;

use crate::skill::{GenerationRule, Skill, SkillDef};
use crate::{Error, Result};

/// Minimum normalized similarity for accepting a fuzzy match.
const FUZZY_THRESHOLD: f64 = 0.65;

/// Maximum absolute edit distance for accepting a fuzzy match.
const FUZZY_MAX_DISTANCE: usize = 3;

/// How a skill name was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Exact,
    Alias,
    Fuzzy { score: f64 },
}

/// Registry of validated skills.
#[derive(Debug, Default)]
pub struct SkillRegistry {
    /// Lowercased primary name -> skill.
    skills: HashMap<String, Arc<Skill>>,
    /// Lowercased alias -> lowercased primary name.
    aliases: HashMap<String, String>,
    /// Primary names in registration order (for deterministic listings).
    order: Vec<String>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a skill definition.
    ///
    /// Fails with [`Error::MalformedSkill`] on rule/parameter violations and
    /// [`Error::CyclicSkill`] when the skill's sub-pipeline reaches itself
    /// through already-registered skills. Failure leaves the registry
    /// unchanged; it is fatal to this registration only.
    pub fn register(&mut self, def: SkillDef) -> Result<()> {
        let skill = Skill::from_def(def)?;
        let key = skill.name.to_ascii_lowercase();

        if self.skills.contains_key(&key) {
            return Err(Error::malformed(&skill.name, "skill already registered"));
        }

        self.check_cycles(&skill)?;

        for alias in &skill.aliases {
            self.aliases.insert(alias.to_ascii_lowercase(), key.clone());
        }
        self.order.push(key.clone());
        self.skills.insert(key, Arc::new(skill));
        Ok(())
    }

    /// Register many definitions, collecting per-skill failures.
    ///
    /// Returns the errors for definitions that were rejected; accepted
    /// definitions are registered regardless.
    pub fn register_all(&mut self, defs: Vec<SkillDef>) -> Vec<Error> {
        defs.into_iter()
            .filter_map(|def| self.register(def).err())
            .collect()
    }

    /// Exact lookup by primary name, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&Arc<Skill>> {
        self.skills.get(&name.to_ascii_lowercase())
    }

    /// Resolve a skill name: exact match, then alias, then a single best
    /// fuzzy match above the confidence threshold.
    ///
    /// Fuzzy resolution tolerates naming variance; below the threshold the
    /// error carries the best candidate as a suggestion but never applies
    /// it.
    pub fn resolve(&self, name: &str) -> Result<(&Arc<Skill>, Resolution)> {
        let key = name.to_ascii_lowercase();

        if let Some(skill) = self.skills.get(&key) {
            return Ok((skill, Resolution::Exact));
        }
        if let Some(primary) = self.aliases.get(&key) {
            // Alias map only holds keys for registered skills.
            let skill = self.skills.get(primary).ok_or_else(|| Error::unknown(name))?;
            return Ok((skill, Resolution::Alias));
        }

        match self.fuzzy_best(&key) {
            Some((primary, score)) if score >= FUZZY_THRESHOLD => {
                let skill = self
                    .skills
                    .get(&primary)
                    .ok_or_else(|| Error::unknown(name))?;
                Ok((skill, Resolution::Fuzzy { score }))
            }
            Some((primary, _)) => Err(Error::UnknownSkill {
                name: name.to_string(),
                suggestion: Some(primary),
            }),
            None => Err(Error::unknown(name)),
        }
    }

    /// Find the single best fuzzy candidate over primary names and aliases.
    ///
    /// Deterministic: candidates are scanned in sorted order and ties keep
    /// the lexicographically smallest primary name.
    fn fuzzy_best(&self, target: &str) -> Option<(String, f64)> {
        let mut candidates: Vec<(&str, &str)> = self
            .skills
            .keys()
            .map(|k| (k.as_str(), k.as_str()))
            .chain(self.aliases.iter().map(|(a, p)| (a.as_str(), p.as_str())))
            .collect();
        candidates.sort_unstable();

        let mut best: Option<(String, f64)> = None;
        for (candidate, primary) in candidates {
            let dist = levenshtein_distance(target, candidate);
            if dist > FUZZY_MAX_DISTANCE || dist >= target.len() {
                continue;
            }
            let longest = target.chars().count().max(candidate.chars().count());
            if longest == 0 {
                continue;
            }
            let score = 1.0 - dist as f64 / longest as f64;
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((primary.to_string(), score));
            }
        }
        best
    }

    /// Static cycle check: DFS from the candidate skill through the
    /// sub-pipeline references of already-registered skills.
    ///
    /// Children that are not registered yet are skipped here; the composer
    /// re-checks with a visited set during expansion.
    fn check_cycles(&self, candidate: &Skill) -> Result<()> {
        let mut path = vec![candidate.name.to_ascii_lowercase()];
        self.walk_children(candidate, &mut path)
    }

    fn walk_children(&self, skill: &Skill, path: &mut Vec<String>) -> Result<()> {
        if let GenerationRule::SubPipeline(children) = &skill.rule {
            for child in children {
                let child_key = child.skill.to_ascii_lowercase();
                if path.contains(&child_key) {
                    path.push(child_key);
                    return Err(Error::cyclic(&skill.name, path));
                }
                if let Some(child_skill) = self.skills.get(&child_key) {
                    path.push(child_key);
                    self.walk_children(child_skill, path)?;
                    path.pop();
                }
            }
        }
        Ok(())
    }

    /// Primary names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Skills in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Skill>> {
        self.order.iter().filter_map(|k| self.skills.get(k))
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

/// Levenshtein distance between two strings.
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (a_len, b_len) = (a_chars.len(), b_chars.len());

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0usize; b_len + 1];

    for i in 1..=a_len {
        curr[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}
