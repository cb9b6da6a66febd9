//! The [`Composer`]: turns a [`Pipeline`] into ordered filter-graph
//! fragments and process flags, then assembles them into a single
//! [`CommandPlan`] for the execution layer.
//!
//! Composition is a single deterministic pass: per step, resolve the
//! skill, normalize parameters, inject the bound extra-input count, and
//! emit fragments through the skill's one generation rule. Unknown
//! skills and missing required parameters drop the step with a warning;
//! everything else the model got wrong is already clamped or dropped by
//! the normalizer. Composing the same pipeline twice yields identical
//! fragments.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::builtins::{BuiltinOutput, Builtins};
use crate::normalize::{normalize, EffectiveParams};
use crate::pipeline::Pipeline;
use crate::registry::{Resolution, SkillRegistry};
use crate::sanitize::escape_filter_value;
use crate::skill::{GenerationRule, Skill, SkillCategory};
use crate::{Error, Result};

/// Ordered fragments accumulated across a whole pipeline.
///
/// Fragment order matches step order; within a step, fragments keep the
/// order the handler emitted them. Derived, never mutated in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposedFragments {
    pub video_filters: Vec<String>,
    pub audio_filters: Vec<String>,
    pub output_options: Vec<String>,
    pub input_options: Vec<String>,
    /// Combined filter-complex graph body, pads already uniquified.
    pub filter_complex: Option<String>,
    /// Label of the graph's current video output pad, when the video
    /// chain was routed through the graph.
    pub video_pad: Option<String>,
    /// Label of the graph's current audio output pad, when the audio
    /// chain was routed through the graph.
    pub audio_pad: Option<String>,
    /// Per-step diagnostics: dropped steps, dropped parameters, fuzzy
    /// resolutions.
    pub warnings: Vec<String>,
    /// Number of steps that actually emitted fragments.
    pub emitted_steps: usize,
}

impl ComposedFragments {
    /// True when no step survived composition.
    pub fn is_empty(&self) -> bool {
        self.emitted_steps == 0
    }
}

/// The composed-command boundary: everything the execution layer needs
/// to build one ffmpeg invocation, with no further business logic.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPlan {
    /// Option strings for extra inputs, in accumulation order; entry `i`
    /// attaches to extra input `i` in binding order.
    pub input_options: Vec<String>,
    /// Primary input first, then extra inputs in binding order.
    pub inputs: Vec<PathBuf>,
    /// Joined `-vf` chain when no filter-complex graph exists.
    pub video_chain: Option<String>,
    /// Joined `-af` chain when the audio chain stayed out of the graph.
    pub audio_chain: Option<String>,
    /// Combined filter-complex graph, final pads `[vout]`/`[aout]`.
    pub filter_complex: Option<String>,
    /// Whether the graph produces the video output pad `[vout]`.
    pub video_in_graph: bool,
    /// Whether the graph produces the audio output pad `[aout]`.
    pub audio_in_graph: bool,
    pub output_options: Vec<String>,
    pub output: PathBuf,
    pub warnings: Vec<String>,
}

impl CommandPlan {
    /// Build the ffmpeg argument vector for a real run.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = self.common_args();
        for opt in &self.output_options {
            args.extend(opt.split_whitespace().map(str::to_string));
        }
        args.push(self.output.display().to_string());
        args
    }

    /// Build the argument vector for a validation-only dry run: the full
    /// filter graph is parsed and initialized, but output goes to the
    /// null muxer and only the first second is processed.
    pub fn to_dry_run_args(&self) -> Vec<String> {
        let mut args = self.common_args();
        args.extend(["-t", "1", "-f", "null", "-"].map(str::to_string));
        args
    }

    fn common_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into()];

        for (i, input) in self.inputs.iter().enumerate() {
            if i >= 1 {
                if let Some(opts) = self.input_options.get(i - 1) {
                    args.extend(opts.split_whitespace().map(str::to_string));
                }
            }
            args.push("-i".into());
            args.push(input.display().to_string());
        }

        if let Some(graph) = &self.filter_complex {
            args.push("-filter_complex".into());
            args.push(graph.clone());
            args.push("-map".into());
            args.push(if self.video_in_graph {
                "[vout]".into()
            } else {
                "0:v?".into()
            });
            args.push("-map".into());
            args.push(if self.audio_in_graph {
                "[aout]".into()
            } else {
                "0:a?".into()
            });
            if let Some(chain) = &self.audio_chain {
                args.push("-af".into());
                args.push(chain.clone());
            }
        } else {
            if let Some(chain) = &self.video_chain {
                args.push("-vf".into());
                args.push(chain.clone());
            }
            if let Some(chain) = &self.audio_chain {
                args.push("-af".into());
                args.push(chain.clone());
            }
        }

        args
    }
}

/// Rolling graph state for one composition pass.
struct GraphContext {
    extra_inputs: usize,
    /// Monotonic per-step counter embedded in every internal pad label.
    step: usize,
    parts: Vec<String>,
    video_label: String,
    audio_label: String,
    video_in_graph: bool,
    audio_in_graph: bool,
}

impl GraphContext {
    fn new(extra_inputs: usize) -> Self {
        Self {
            extra_inputs,
            step: 0,
            parts: Vec::new(),
            video_label: "0:v".to_string(),
            audio_label: "0:a".to_string(),
            video_in_graph: false,
            audio_in_graph: false,
        }
    }

    fn next_step(&mut self) -> usize {
        let n = self.step;
        self.step += 1;
        n
    }
}

/// Rollback point taken before a step emits. Dropping a step restores
/// both the fragment sink and the live graph state, so a step that
/// fails partway through (a composite's later child, say) never ships
/// a partial emission.
struct StepSnapshot {
    video_filters: usize,
    audio_filters: usize,
    output_options: usize,
    input_options: usize,
    warnings: usize,
    emitted_steps: usize,
    parts: usize,
    step: usize,
    video_label: String,
    audio_label: String,
    video_in_graph: bool,
    audio_in_graph: bool,
}

impl StepSnapshot {
    fn take(out: &ComposedFragments, ctx: &GraphContext) -> Self {
        Self {
            video_filters: out.video_filters.len(),
            audio_filters: out.audio_filters.len(),
            output_options: out.output_options.len(),
            input_options: out.input_options.len(),
            warnings: out.warnings.len(),
            emitted_steps: out.emitted_steps,
            parts: ctx.parts.len(),
            step: ctx.step,
            video_label: ctx.video_label.clone(),
            audio_label: ctx.audio_label.clone(),
            video_in_graph: ctx.video_in_graph,
            audio_in_graph: ctx.audio_in_graph,
        }
    }

    fn restore(self, out: &mut ComposedFragments, ctx: &mut GraphContext) {
        out.video_filters.truncate(self.video_filters);
        out.audio_filters.truncate(self.audio_filters);
        out.output_options.truncate(self.output_options);
        out.input_options.truncate(self.input_options);
        out.warnings.truncate(self.warnings);
        out.emitted_steps = self.emitted_steps;
        ctx.parts.truncate(self.parts);
        ctx.step = self.step;
        ctx.video_label = self.video_label;
        ctx.audio_label = self.audio_label;
        ctx.video_in_graph = self.video_in_graph;
        ctx.audio_in_graph = self.audio_in_graph;
    }
}

/// Compiles pipelines against an injected registry and builtin table.
///
/// Holds no per-pipeline state: concurrent compiles of independent
/// pipelines need no locking.
pub struct Composer<'a> {
    registry: &'a SkillRegistry,
    builtins: &'a Builtins,
    placeholder_re: Regex,
    pad_re: Regex,
}

impl<'a> Composer<'a> {
    pub fn new(registry: &'a SkillRegistry, builtins: &'a Builtins) -> Self {
        Self {
            registry,
            builtins,
            // {name} placeholders in templates and child parameters.
            placeholder_re: Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex"),
            // [name] pad labels; stream refs like [0:v] don't match.
            pad_re: Regex::new(r"\[([A-Za-z_][A-Za-z0-9_]*)\]").expect("static regex"),
        }
    }

    /// Compose a pipeline into ordered fragments.
    ///
    /// Per-step failures (unknown skill, missing required parameter) drop
    /// the step and record a warning; the result is empty only when no
    /// step survives. Registry/handler defects and cycles propagate.
    pub fn compose(&self, pipeline: &Pipeline) -> Result<ComposedFragments> {
        let mut out = ComposedFragments::default();
        let mut ctx = GraphContext::new(pipeline.extra_inputs);

        for step in &pipeline.steps {
            let skill = match self.registry.resolve(&step.skill) {
                Ok((skill, Resolution::Fuzzy { .. })) => {
                    out.warnings.push(format!(
                        "resolved '{}' to '{}'",
                        step.skill, skill.name
                    ));
                    Arc::clone(skill)
                }
                Ok((skill, _)) => Arc::clone(skill),
                Err(Error::UnknownSkill { name, suggestion }) => {
                    let hint = suggestion
                        .map(|s| format!(" (closest match: {s})"))
                        .unwrap_or_default();
                    out.warnings
                        .push(format!("dropped step '{name}': unknown skill{hint}"));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let snapshot = StepSnapshot::take(&out, &ctx);
            let mut path = Vec::new();
            match self.emit_step(&skill, &step.params, &mut out, &mut ctx, &mut path) {
                Ok(()) => {}
                Err(Error::MissingRequiredParameter { skill, param }) => {
                    snapshot.restore(&mut out, &mut ctx);
                    out.warnings.push(format!(
                        "dropped step '{skill}': missing required parameter '{param}'"
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        if !ctx.parts.is_empty() {
            out.filter_complex = Some(ctx.parts.join(";"));
            if ctx.video_in_graph {
                out.video_pad = Some(ctx.video_label);
            }
            if ctx.audio_in_graph {
                out.audio_pad = Some(ctx.audio_label);
            }
        }

        Ok(out)
    }

    /// Compose and assemble into the command boundary for the execution
    /// layer. `inputs` is the primary source followed by the extra inputs
    /// in binding order; its length must match the pipeline's declared
    /// extra-input count.
    pub fn plan(
        &self,
        pipeline: &Pipeline,
        inputs: &[PathBuf],
        output: &Path,
    ) -> Result<CommandPlan> {
        if inputs.is_empty() {
            return Err(Error::InvalidInput("no primary input bound".to_string()));
        }
        if inputs.len() - 1 != pipeline.extra_inputs {
            return Err(Error::InvalidInput(format!(
                "pipeline declares {} extra inputs but {} are bound",
                pipeline.extra_inputs,
                inputs.len() - 1
            )));
        }

        let fragments = self.compose(pipeline)?;
        Ok(assemble(fragments, inputs, output))
    }

    /// Emit fragments for one (possibly expanded) step.
    ///
    /// `path` is the sub-pipeline expansion stack; a skill reappearing on
    /// it is a cycle. Registration already rejects cycles statically, so
    /// this backstop only fires for packs mutated behind the registry.
    fn emit_step(
        &self,
        skill: &Skill,
        raw: &serde_json::Map<String, Value>,
        out: &mut ComposedFragments,
        ctx: &mut GraphContext,
        path: &mut Vec<String>,
    ) -> Result<()> {
        let key = skill.name.to_ascii_lowercase();
        if path.contains(&key) {
            path.push(key);
            return Err(Error::cyclic(&skill.name, path));
        }

        let mut effective = normalize(skill, raw)?;
        for dropped in &effective.dropped {
            out.warnings.push(format!(
                "{}: dropped parameter '{}' ({})",
                skill.name, dropped.name, dropped.reason
            ));
        }
        // Generation rules see how many extra stream slots exist.
        effective.insert("extra_inputs", ctx.extra_inputs as i64);

        match &skill.rule {
            GenerationRule::Template(template) => {
                let rendered = self.substitute_template(template, &effective, &skill.name, out);
                if classify_fragment(rendered, skill.category, out) {
                    out.emitted_steps += 1;
                }
            }
            GenerationRule::SubPipeline(children) => {
                path.push(key);
                for child in children {
                    let child_skill = match self.registry.resolve(&child.skill) {
                        Ok((s, _)) => Arc::clone(s),
                        Err(Error::UnknownSkill { name, .. }) => {
                            out.warnings.push(format!(
                                "{}: dropped child step '{name}': unknown skill",
                                skill.name
                            ));
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                    let child_raw = self.substitute_child_params(&child.params, &effective);
                    self.emit_step(&child_skill, &child_raw, out, ctx, path)?;
                }
                path.pop();
            }
            GenerationRule::Builtin(id) => {
                let handler = self.builtins.get(id).ok_or_else(|| {
                    Error::malformed(&skill.name, format!("unknown builtin handler '{id}'"))
                })?;
                let emitted = handler(&effective, ctx.extra_inputs)?;
                let step_no = ctx.next_step();
                self.absorb_builtin(emitted, step_no, out, ctx);
                out.emitted_steps += 1;
            }
        }

        Ok(())
    }

    /// Substitute `{name}` placeholders with sanitized parameter values.
    ///
    /// Sanitization happens here, at emission time: every interpolated
    /// string goes through the filter-grammar escaper regardless of its
    /// semantic role.
    fn substitute_template(
        &self,
        template: &str,
        effective: &EffectiveParams,
        skill: &str,
        out: &mut ComposedFragments,
    ) -> String {
        self.placeholder_re
            .replace_all(template, |caps: &regex::Captures| {
                let name = &caps[1];
                match effective.render(name) {
                    Some(value) => escape_filter_value(&value),
                    None => {
                        out.warnings.push(format!(
                            "{skill}: placeholder '{{{name}}}' had no value, substituted empty"
                        ));
                        String::new()
                    }
                }
            })
            .into_owned()
    }

    /// Substitute a child invocation's parameter templates from the
    /// parent's effective parameters. Values stay raw here; the child's
    /// own normalization coerces them and sanitization happens when the
    /// child emits.
    fn substitute_child_params(
        &self,
        params: &BTreeMap<String, String>,
        parent: &EffectiveParams,
    ) -> serde_json::Map<String, Value> {
        let mut raw = serde_json::Map::new();
        for (key, template) in params {
            let value = self
                .placeholder_re
                .replace_all(template, |caps: &regex::Captures| {
                    parent.render(&caps[1]).unwrap_or_default()
                })
                .into_owned();
            raw.insert(key.clone(), Value::String(value));
        }
        raw
    }

    /// Fold a builtin's emission into the accumulated fragments, stitching
    /// any filter-complex fragment into the combined graph under a
    /// step-scoped label prefix.
    fn absorb_builtin(
        &self,
        emitted: BuiltinOutput,
        step_no: usize,
        out: &mut ComposedFragments,
        ctx: &mut GraphContext,
    ) {
        out.video_filters.extend(emitted.video_filters);
        out.audio_filters.extend(emitted.audio_filters);
        out.output_options.extend(emitted.output_options);
        out.input_options.extend(emitted.input_options);

        let Some(fragment) = emitted.filter_complex else {
            return;
        };

        // Step 1: prefix internal pads so unrelated steps never collide.
        let prefixed = self
            .pad_re
            .replace_all(&fragment, |caps: &regex::Captures| {
                let label = &caps[1];
                match label {
                    "vin" | "vout" | "ain" | "aout" => format!("[{label}]"),
                    other => format!("[s{step_no}_{other}]"),
                }
            })
            .into_owned();

        // Step 2: wire the chain pads to the live graph labels.
        let consumed_video = prefixed.contains("[vin]") || prefixed.contains("[vout]");
        let consumed_audio = prefixed.contains("[ain]") || prefixed.contains("[aout]");

        let mut wired = prefixed
            .replace("[vin]", &format!("[{}]", ctx.video_label))
            .replace("[ain]", &format!("[{}]", ctx.audio_label));

        if consumed_video {
            let label = format!("s{step_no}_v");
            wired = wired.replace("[vout]", &format!("[{label}]"));
            ctx.video_label = label;
            ctx.video_in_graph = true;
        }
        if consumed_audio {
            let label = format!("s{step_no}_a");
            wired = wired.replace("[aout]", &format!("[{label}]"));
            ctx.audio_label = label;
            ctx.audio_in_graph = true;
        }

        ctx.parts.push(wired);
    }
}

/// Classify a template fragment: flag-marker prefix means an output
/// option, audio-category skills feed the audio chain, everything else
/// is a video filter. Empty renderings are discarded; returns whether a
/// fragment was actually pushed.
fn classify_fragment(rendered: String, category: SkillCategory, out: &mut ComposedFragments) -> bool {
    if rendered.trim().is_empty() {
        return false;
    }
    if rendered.starts_with('-') {
        out.output_options.push(rendered);
    } else if category == SkillCategory::Audio {
        out.audio_filters.push(rendered);
    } else {
        out.video_filters.push(rendered);
    }
    true
}

/// Final assembly: join chains in order and normalize the graph's output
/// pads to `[vout]`/`[aout]` for downstream mapping.
fn assemble(fragments: ComposedFragments, inputs: &[PathBuf], output: &Path) -> CommandPlan {
    let ComposedFragments {
        video_filters,
        audio_filters,
        output_options,
        input_options,
        filter_complex,
        video_pad,
        audio_pad,
        warnings,
        ..
    } = fragments;

    let mut plan = CommandPlan {
        input_options,
        inputs: inputs.to_vec(),
        video_chain: None,
        audio_chain: None,
        filter_complex: None,
        video_in_graph: false,
        audio_in_graph: false,
        output_options,
        output: output.to_path_buf(),
        warnings,
    };

    match filter_complex {
        Some(mut graph) => {
            match video_pad {
                Some(pad) => {
                    // Fold the accumulated per-step video filters into the
                    // graph and end on the named output pad.
                    if video_filters.is_empty() {
                        graph.push_str(&format!(";[{pad}]null[vout]"));
                    } else {
                        graph.push_str(&format!(";[{pad}]{}[vout]", video_filters.join(",")));
                    }
                    plan.video_in_graph = true;
                }
                None => {
                    if !video_filters.is_empty() {
                        plan.video_chain = Some(video_filters.join(","));
                    }
                }
            }
            match audio_pad {
                Some(pad) => {
                    if audio_filters.is_empty() {
                        graph.push_str(&format!(";[{pad}]anull[aout]"));
                    } else {
                        graph.push_str(&format!(";[{pad}]{}[aout]", audio_filters.join(",")));
                    }
                    plan.audio_in_graph = true;
                }
                None => {
                    if !audio_filters.is_empty() {
                        plan.audio_chain = Some(audio_filters.join(","));
                    }
                }
            }
            plan.filter_complex = Some(graph);
        }
        None => {
            if !video_filters.is_empty() {
                plan.video_chain = Some(video_filters.join(","));
            }
            if !audio_filters.is_empty() {
                plan.audio_chain = Some(audio_filters.join(","));
            }
        }
    }

    plan
}
