//! Builtin generation handlers.
//!
//! A builtin handler is a pure function from effective parameters plus
//! the bound extra-input count to a [`BuiltinOutput`] bundle. Builtins
//! exist for skills whose fragments cannot be expressed as a template,
//! chiefly multi-input graphs.
//!
//! Filter-complex fragments use a fixed pad convention:
//! - `[vin]` / `[ain]` name the current main video/audio chain input;
//!   the composer rewires them to the live pad.
//! - `[vout]` / `[aout]` name the fragment's outputs; the composer
//!   renames them per step so unrelated steps never collide.
//! - `[N:v]` / `[N:a]` reference bound input streams by index; the
//!   primary input is 0, extra inputs count upward in binding order.
//! - Any other `[name]` pad is internal and gets a step-scoped prefix.

use std::collections::HashMap;

use crate::normalize::EffectiveParams;
use crate::sanitize::escape_filter_value;
use crate::{Error, Result};

/// What a builtin handler emits. Missing trailing parts of the
/// 3/4/5-element handler contract are represented by empty fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltinOutput {
    pub video_filters: Vec<String>,
    pub audio_filters: Vec<String>,
    pub output_options: Vec<String>,
    pub filter_complex: Option<String>,
    pub input_options: Vec<String>,
}

/// A pure builtin handler: effective parameters + bound extra-input
/// count in, fragment bundle out.
pub type BuiltinFn = fn(&EffectiveParams, usize) -> Result<BuiltinOutput>;

/// Lookup table of builtin handlers, keyed by the identifier a skill's
/// generation rule names.
pub struct Builtins {
    handlers: HashMap<&'static str, BuiltinFn>,
}

impl Builtins {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The standard handler set shipped with the catalog.
    pub fn standard() -> Self {
        let mut b = Self::empty();
        b.register("overlay", overlay);
        b.register("watermark", watermark);
        b.register("picture_in_picture", picture_in_picture);
        b.register("audio_mix", audio_mix);
        b.register("side_by_side", side_by_side);
        b
    }

    pub fn register(&mut self, id: &'static str, handler: BuiltinFn) {
        self.handlers.insert(id, handler);
    }

    pub fn get(&self, id: &str) -> Option<BuiltinFn> {
        self.handlers.get(id).copied()
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::standard()
    }
}

/// Resolve the `source` parameter to a stream index.
///
/// Extra input ordinals are 1-based from the model's point of view and
/// map directly onto stream indices (primary = 0). The result is always
/// in `[1, extra_inputs]`.
fn source_index(params: &EffectiveParams, extra_inputs: usize) -> Result<usize> {
    if extra_inputs == 0 {
        return Err(Error::InvalidInput(
            "this skill needs at least one extra input bound".to_string(),
        ));
    }
    let requested = params.get_i64("source").unwrap_or(1);
    Ok((requested.max(1) as usize).min(extra_inputs))
}

/// Overlay an extra video/image input on the main video.
fn overlay(params: &EffectiveParams, extra_inputs: usize) -> Result<BuiltinOutput> {
    let idx = source_index(params, extra_inputs)?;
    let x = escape_filter_value(params.get_str("x").unwrap_or("0"));
    let y = escape_filter_value(params.get_str("y").unwrap_or("0"));
    let opacity = params.get_f64("opacity").unwrap_or(1.0);

    let graph = if opacity < 1.0 {
        format!(
            "[{idx}:v]format=rgba,colorchannelmixer=aa={opacity}[ov];[vin][ov]overlay=x={x}:y={y}[vout]"
        )
    } else {
        format!("[vin][{idx}:v]overlay=x={x}:y={y}[vout]")
    };

    Ok(BuiltinOutput {
        filter_complex: Some(graph),
        ..Default::default()
    })
}

/// Overlay a still-image watermark in a named corner.
fn watermark(params: &EffectiveParams, extra_inputs: usize) -> Result<BuiltinOutput> {
    let idx = source_index(params, extra_inputs)?;
    let margin = params.get_i64("margin").unwrap_or(16);
    let opacity = params.get_f64("opacity").unwrap_or(0.8);
    let (x, y) = corner_position(params.get_str("position").unwrap_or("bottom_right"), margin);

    let graph = format!(
        "[{idx}:v]format=rgba,colorchannelmixer=aa={opacity}[wm];[vin][wm]overlay=x={x}:y={y}[vout]"
    );

    Ok(BuiltinOutput {
        filter_complex: Some(graph),
        // Still images need looping to cover the clip; -shortest stops the
        // mux at the main stream's end.
        input_options: vec!["-loop 1".to_string()],
        output_options: vec!["-shortest".to_string()],
        ..Default::default()
    })
}

/// Scale an extra input down and overlay it in a corner.
fn picture_in_picture(params: &EffectiveParams, extra_inputs: usize) -> Result<BuiltinOutput> {
    let idx = source_index(params, extra_inputs)?;
    let size = params.get_f64("size").unwrap_or(0.25);
    let margin = params.get_i64("margin").unwrap_or(16);
    let (x, y) = corner_position(params.get_str("position").unwrap_or("bottom_right"), margin);

    let graph = format!(
        "[{idx}:v]scale=iw*{size}:-1[pip];[vin][pip]overlay=x={x}:y={y}[vout]"
    );

    Ok(BuiltinOutput {
        filter_complex: Some(graph),
        ..Default::default()
    })
}

/// Mix an extra audio input into the main audio track.
fn audio_mix(params: &EffectiveParams, extra_inputs: usize) -> Result<BuiltinOutput> {
    let idx = source_index(params, extra_inputs)?;
    let weight = params.get_f64("weight").unwrap_or(0.5);
    // Keep the complement free of float noise (1.0 - 0.3 is not 0.7 in f64).
    let main_weight = ((1.0 - weight) * 1000.0).round() / 1000.0;

    let graph = format!(
        "[ain][{idx}:a]amix=inputs=2:duration=first:weights={main_weight} {weight}[aout]"
    );

    Ok(BuiltinOutput {
        filter_complex: Some(graph),
        ..Default::default()
    })
}

/// Stack the main video next to an extra input.
fn side_by_side(params: &EffectiveParams, extra_inputs: usize) -> Result<BuiltinOutput> {
    let idx = source_index(params, extra_inputs)?;
    let stack = match params.get_str("direction").unwrap_or("horizontal") {
        "vertical" => "vstack",
        _ => "hstack",
    };

    let graph = format!("[vin][{idx}:v]{stack}=inputs=2[vout]");

    Ok(BuiltinOutput {
        filter_complex: Some(graph),
        ..Default::default()
    })
}

/// Translate a corner name into overlay x/y expressions.
fn corner_position(position: &str, margin: i64) -> (String, String) {
    match position {
        "top_left" => (margin.to_string(), margin.to_string()),
        "top_right" => (format!("main_w-overlay_w-{margin}"), margin.to_string()),
        "bottom_left" => (margin.to_string(), format!("main_h-overlay_h-{margin}")),
        _ => (
            format!("main_w-overlay_w-{margin}"),
            format!("main_h-overlay_h-{margin}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> EffectiveParams {
        EffectiveParams::default()
    }

    #[test]
    fn multi_input_handlers_require_extra_inputs() {
        for handler in [overlay, watermark, picture_in_picture, audio_mix, side_by_side] {
            let err = handler(&params(), 0).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
    }

    #[test]
    fn source_index_stays_in_bounds() {
        let mut p = params();
        p.insert("source", 7);
        assert_eq!(source_index(&p, 2).unwrap(), 2);

        p.insert("source", 0);
        assert_eq!(source_index(&p, 2).unwrap(), 1);

        let p = params();
        assert_eq!(source_index(&p, 3).unwrap(), 1);
    }

    #[test]
    fn overlay_references_the_bound_stream() {
        let out = overlay(&params(), 1).unwrap();
        let graph = out.filter_complex.unwrap();
        assert!(graph.contains("[vin][1:v]overlay"));
        assert!(graph.ends_with("[vout]"));
    }

    #[test]
    fn overlay_with_opacity_uses_internal_pad() {
        let mut p = params();
        p.insert("opacity", 0.5);
        let out = overlay(&p, 1).unwrap();
        let graph = out.filter_complex.unwrap();
        assert!(graph.contains("[ov]"));
        assert!(graph.contains("colorchannelmixer=aa=0.5"));
    }

    #[test]
    fn overlay_sanitizes_position_expressions() {
        let mut p = params();
        p.insert("x", "10:20,rm");
        let out = overlay(&p, 1).unwrap();
        let graph = out.filter_complex.unwrap();
        assert!(graph.contains("x=10\\:20\\,rm"));
    }

    #[test]
    fn watermark_carries_input_and_output_options() {
        let out = watermark(&params(), 1).unwrap();
        assert_eq!(out.input_options, vec!["-loop 1"]);
        assert_eq!(out.output_options, vec!["-shortest"]);
        assert!(out.filter_complex.is_some());
    }

    #[test]
    fn audio_mix_routes_through_audio_pads() {
        let mut p = params();
        p.insert("weight", 0.3);
        let out = audio_mix(&p, 2).unwrap();
        let graph = out.filter_complex.unwrap();
        assert!(graph.starts_with("[ain][1:a]amix"));
        assert!(graph.contains("weights=0.7 0.3"));
        assert!(graph.ends_with("[aout]"));
    }

    #[test]
    fn side_by_side_orientation() {
        let mut p = params();
        p.insert("direction", "vertical");
        let out = side_by_side(&p, 1).unwrap();
        assert!(out.filter_complex.unwrap().contains("vstack"));

        let out = side_by_side(&params(), 1).unwrap();
        assert!(out.filter_complex.unwrap().contains("hstack"));
    }

    #[test]
    fn standard_table_lookup() {
        let builtins = Builtins::standard();
        assert!(builtins.get("overlay").is_some());
        assert!(builtins.get("audio_mix").is_some());
        assert!(builtins.get("nonexistent").is_none());
    }
}
