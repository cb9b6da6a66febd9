//! Skill-pack loading: user-defined skills from TOML files.
//!
//! A pack is a TOML file with a `[[skills]]` array of definitions in the
//! same shape the built-in catalog uses. Definitions that fail
//! validation are skipped with a warning; one bad skill never takes
//! down the pack.

use std::path::Path;

use anyhow::{Context, Result};
use clipforge_skills::{SkillDef, SkillRegistry};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PackFile {
    #[serde(default)]
    skills: Vec<SkillDef>,
}

/// Load one pack file and register its skills, returning how many were
/// accepted.
pub fn load_pack(registry: &mut SkillRegistry, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read skill pack: {:?}", path))?;
    let pack: PackFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse skill pack: {:?}", path))?;

    let total = pack.skills.len();
    let errors = registry.register_all(pack.skills);
    for error in &errors {
        tracing::warn!(pack = %path.display(), %error, "skipped pack skill");
    }
    Ok(total - errors.len())
}

/// Load every configured pack on top of the registry.
pub fn load_packs(registry: &mut SkillRegistry, packs: &[std::path::PathBuf]) -> Result<()> {
    for path in packs {
        let accepted = load_pack(registry, path)?;
        tracing::info!(pack = %path.display(), accepted, "loaded skill pack");
    }
    Ok(())
}
