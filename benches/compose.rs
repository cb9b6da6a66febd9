//! Benchmark pipeline composition over the standard catalog.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use clipforge_skills::{
    standard_catalog, Builtins, Composer, Pipeline, PipelineStep, SkillRegistry,
};
use serde_json::json;

fn setup() -> (SkillRegistry, Builtins) {
    let mut registry = SkillRegistry::new();
    registry.register_all(standard_catalog());
    (registry, Builtins::standard())
}

fn step(skill: &str, params: serde_json::Value) -> PipelineStep {
    PipelineStep {
        skill: skill.to_string(),
        params: params.as_object().cloned().unwrap_or_default(),
    }
}

fn typical_pipeline() -> Pipeline {
    Pipeline::new(vec![
        step("brightness", json!({"value": 0.15})),
        step("contrast", json!({"value": 1.1})),
        step("drawtext", json!({"text": "Benchmark run", "size": 40})),
        step("volume", json!({"level": 0.8})),
    ])
}

fn graph_pipeline() -> Pipeline {
    Pipeline::new(vec![
        step("picture_in_picture", json!({"size": 0.3})),
        step("watermark", json!({"source": 2, "opacity": 0.4})),
        step("audio_mix", json!({"source": 2, "weight": 0.3})),
        step("grayscale", json!({})),
    ])
    .with_extra_inputs(2)
}

fn fuzzy_pipeline() -> Pipeline {
    Pipeline::new(vec![
        step("britghness", json!({"value": 0.2})),
        step("colour_balance", json!({"red": 0.1})),
        step("greyscale", json!({})),
    ])
}

fn bench_compose(c: &mut Criterion) {
    let (registry, builtins) = setup();
    let composer = Composer::new(&registry, &builtins);

    let typical = typical_pipeline();
    c.bench_function("compose_filter_chain", |b| {
        b.iter(|| composer.compose(black_box(&typical)).unwrap())
    });

    let graph = graph_pipeline();
    c.bench_function("compose_filter_graph", |b| {
        b.iter(|| composer.compose(black_box(&graph)).unwrap())
    });

    let fuzzy = fuzzy_pipeline();
    c.bench_function("compose_with_fuzzy_resolution", |b| {
        b.iter(|| composer.compose(black_box(&fuzzy)).unwrap())
    });
}

fn bench_registry(c: &mut Criterion) {
    let (registry, _) = setup();

    c.bench_function("resolve_exact", |b| {
        b.iter(|| registry.resolve(black_box("brightness")).unwrap())
    });

    c.bench_function("resolve_typo", |b| {
        b.iter(|| registry.resolve(black_box("brigthness")).unwrap())
    });
}

criterion_group!(benches, bench_compose, bench_registry);
criterion_main!(benches);
