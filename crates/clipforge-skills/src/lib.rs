//! # clipforge-skills
//!
//! The skill system behind clipforge: declarative edit skills compiled
//! into ffmpeg filter graphs and process flags.
//!
//! This crate provides:
//! - A validated [`SkillRegistry`] with exact, alias, and bounded fuzzy
//!   name resolution
//! - Single-pass parameter normalization (defaults, coercion, clamping)
//! - Filter-grammar sanitization for every interpolated value
//! - A deterministic [`Composer`] that turns a [`Pipeline`] into a
//!   [`CommandPlan`] ready for execution or a null-muxer dry run
//!
//! ```no_run
//! use clipforge_skills::{standard_catalog, Builtins, Composer, Pipeline, PipelineStep, SkillRegistry};
//!
//! let mut registry = SkillRegistry::new();
//! registry.register_all(standard_catalog());
//! let builtins = Builtins::standard();
//! let composer = Composer::new(&registry, &builtins);
//!
//! let pipeline = Pipeline::new(vec![
//!     PipelineStep::new("brightness").param("value", serde_json::json!(0.2)),
//! ]);
//! let fragments = composer.compose(&pipeline)?;
//! assert_eq!(fragments.video_filters, vec!["eq=brightness=0.2"]);
//! # Ok::<(), clipforge_skills::Error>(())
//! ```

mod error;

pub mod builtins;
pub mod catalog;
pub mod compose;
pub mod normalize;
pub mod param;
pub mod pipeline;
pub mod registry;
pub mod sanitize;
pub mod skill;

pub use builtins::{BuiltinFn, BuiltinOutput, Builtins};
pub use catalog::standard_catalog;
pub use compose::{CommandPlan, ComposedFragments, Composer};
pub use error::{Error, Result};
pub use normalize::{normalize, DroppedParam, EffectiveParams};
pub use param::{ParamSpec, ParamType, ParamValue};
pub use pipeline::{Pipeline, PipelineState, PipelineStep};
pub use registry::{Resolution, SkillRegistry};
pub use sanitize::{escape_filter_value, unescape_filter_value};
pub use skill::{ChildStep, GenerationRule, Skill, SkillCategory, SkillDef};
