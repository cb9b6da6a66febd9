//! End-to-end composition: catalog skills through the composer to full
//! argument vectors.

use std::path::{Path, PathBuf};

use clipforge_skills::{
    standard_catalog, Builtins, Composer, Pipeline, PipelineStep, SkillRegistry,
};
use serde_json::json;

fn fixtures() -> (SkillRegistry, Builtins) {
    let mut registry = SkillRegistry::new();
    let errors = registry.register_all(standard_catalog());
    assert!(errors.is_empty(), "{errors:?}");
    (registry, Builtins::standard())
}

fn step(skill: &str, params: serde_json::Value) -> PipelineStep {
    PipelineStep {
        skill: skill.to_string(),
        params: params.as_object().cloned().unwrap_or_default(),
    }
}

#[test]
fn instruction_like_pipeline_builds_a_single_vf_chain() {
    let (registry, builtins) = fixtures();
    let composer = Composer::new(&registry, &builtins);

    // "make it brighter, a bit more colorful, and add a caption"
    let pipeline = Pipeline::new(vec![
        step("brightness", json!({"value": 0.15})),
        step("saturation", json!({"value": 1.4})),
        step("drawtext", json!({"text": "Summer 2025"})),
    ]);

    let plan = composer
        .plan(&pipeline, &[PathBuf::from("beach.mp4")], Path::new("out.mp4"))
        .unwrap();

    let chain = plan.video_chain.unwrap();
    assert_eq!(
        chain,
        "eq=brightness=0.15,eq=saturation=1.4,\
         drawtext=text='Summer 2025':x=(w-text_w)/2:y=h-th-20:fontsize=32:fontcolor=white"
    );
    assert!(plan.filter_complex.is_none());
}

#[test]
fn injection_attempt_in_text_stays_inert() {
    let (registry, builtins) = fixtures();
    let composer = Composer::new(&registry, &builtins);

    let hostile = "x':y=0,null[out]";
    let pipeline = Pipeline::new(vec![step("drawtext", json!({"text": hostile}))]);
    let out = composer.compose(&pipeline).unwrap();

    let fragment = &out.video_filters[0];
    // The embedded quote, colon, and comma must all arrive escaped, so
    // the value cannot terminate the quoted argument or start a new
    // filter in the chain.
    assert!(fragment.contains("x\\'\\:y=0\\,null"));

    // The only unescaped quotes are the template's own pair around the
    // text argument.
    let unescaped_quotes = fragment
        .char_indices()
        .filter(|&(i, c)| c == '\'' && (i == 0 || fragment.as_bytes()[i - 1] != b'\\'))
        .count();
    assert_eq!(unescaped_quotes, 2);
}

#[test]
fn alias_and_typo_resolution_in_one_pipeline() {
    let (registry, builtins) = fixtures();
    let composer = Composer::new(&registry, &builtins);

    let pipeline = Pipeline::new(vec![
        step("greyscale", json!({})),
        step("colour_balance", json!({"red": 0.2})),
    ]);
    let out = composer.compose(&pipeline).unwrap();

    assert_eq!(out.emitted_steps, 2);
    assert_eq!(out.video_filters[0], "hue=s=0");
    assert!(out.video_filters[1].starts_with("colorbalance=rs=0.2"));
    assert!(out.warnings.iter().any(|w| w.contains("colour_balance")));
}

#[test]
fn composite_speed_keeps_audio_and_video_in_sync() {
    let (registry, builtins) = fixtures();
    let composer = Composer::new(&registry, &builtins);

    let pipeline = Pipeline::new(vec![step("speed", json!({"factor": 1.5}))]);
    let out = composer.compose(&pipeline).unwrap();

    assert_eq!(out.video_filters, vec!["setpts=PTS/1.5".to_string()]);
    assert_eq!(out.audio_filters, vec!["atempo=1.5".to_string()]);
}

#[test]
fn watermark_run_binds_the_extra_input() {
    let (registry, builtins) = fixtures();
    let composer = Composer::new(&registry, &builtins);

    let pipeline = Pipeline::new(vec![step(
        "watermark",
        json!({"position": "top_right", "opacity": 0.4}),
    )])
    .with_extra_inputs(1);

    let inputs = vec![PathBuf::from("talk.mp4"), PathBuf::from("logo.png")];
    let plan = composer
        .plan(&pipeline, &inputs, Path::new("out.mp4"))
        .unwrap();
    let args = plan.to_args();

    // The watermark image is looped and the render stops with the main
    // stream.
    let loop_pos = args.iter().position(|a| a == "-loop").unwrap();
    assert_eq!(args[loop_pos + 1], "1");
    assert_eq!(args[loop_pos + 2], "-i");
    assert_eq!(args[loop_pos + 3], "logo.png");
    assert!(args.contains(&"-shortest".to_string()));

    let graph_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
    assert!(args[graph_pos + 1].contains("overlay"));
    assert!(args[graph_pos + 1].ends_with("[vout]"));
}

#[test]
fn mixed_graph_and_chain_steps_fold_together() {
    let (registry, builtins) = fixtures();
    let composer = Composer::new(&registry, &builtins);

    let pipeline = Pipeline::new(vec![
        step("picture_in_picture", json!({"size": 0.3})),
        step("grayscale", json!({})),
        step("volume", json!({"level": 0.8})),
    ])
    .with_extra_inputs(1);

    let inputs = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")];
    let plan = composer
        .plan(&pipeline, &inputs, Path::new("out.mp4"))
        .unwrap();

    // Video goes through the graph (ending in hue=s=0), audio stays a
    // plain -af chain because no graph step touched it.
    let graph = plan.filter_complex.clone().unwrap();
    assert!(graph.ends_with("hue=s=0[vout]"));
    assert_eq!(plan.audio_chain.as_deref(), Some("volume=0.8"));

    let args = plan.to_args();
    assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[vout]"));
    assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "0:a?"));
}

#[test]
fn dry_run_and_real_args_differ_only_at_the_tail() {
    let (registry, builtins) = fixtures();
    let composer = Composer::new(&registry, &builtins);

    let pipeline = Pipeline::new(vec![step("blur", json!({"radius": 3}))]);
    let plan = composer
        .plan(&pipeline, &[PathBuf::from("in.mp4")], Path::new("out.mp4"))
        .unwrap();

    let real = plan.to_args();
    let dry = plan.to_dry_run_args();

    let shared = real.len() - 1; // everything before the output path
    assert_eq!(&real[..shared], &dry[..dry.len() - 5]);
    assert_eq!(&dry[dry.len() - 5..], &["-t", "1", "-f", "null", "-"]);
}

#[test]
fn trim_and_mute_emit_no_filters_at_all() {
    let (registry, builtins) = fixtures();
    let composer = Composer::new(&registry, &builtins);

    let pipeline = Pipeline::new(vec![
        step("trim", json!({"start": "00:10", "duration": 30})),
        step("mute", json!({})),
    ]);
    let plan = composer
        .plan(&pipeline, &[PathBuf::from("in.mp4")], Path::new("out.mp4"))
        .unwrap();

    assert!(plan.video_chain.is_none());
    assert!(plan.audio_chain.is_none());
    let args = plan.to_args();
    assert!(args.windows(2).any(|w| w[0] == "-ss" && w[1] == "10"));
    assert!(args.windows(2).any(|w| w[0] == "-t" && w[1] == "30"));
    assert!(args.contains(&"-an".to_string()));
}
