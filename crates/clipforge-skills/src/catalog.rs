//! The standard skill catalog.
//!
//! Every definition here goes through the same [`Skill::from_def`]
//! validation as pack-loaded skills; nothing in the built-in catalog is
//! privileged. Registration order is the catalog order, which keeps
//! fuzzy-match tie-breaking stable across releases.

use std::collections::BTreeMap;

use crate::param::{ParamSpec, ParamType};
use crate::skill::{ChildStep, SkillCategory, SkillDef};

fn child(skill: &str, params: &[(&str, &str)]) -> ChildStep {
    ChildStep {
        skill: skill.to_string(),
        params: params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Definitions for the built-in skills, in registration order.
pub fn standard_catalog() -> Vec<SkillDef> {
    vec![
        SkillDef::new("brightness")
            .description("Adjust overall brightness")
            .template("eq=brightness={value}")
            .param(
                ParamSpec::new("value", ParamType::Real)
                    .bounded(-1.0, 1.0)
                    .with_default(0.1)
                    .with_aliases(&["amount", "level"]),
            ),
        SkillDef::new("contrast")
            .description("Adjust contrast")
            .template("eq=contrast={value}")
            .param(
                ParamSpec::new("value", ParamType::Real)
                    .bounded(-2.0, 2.0)
                    .with_default(1.2)
                    .with_aliases(&["amount", "level"]),
            ),
        SkillDef::new("saturation")
            .description("Adjust color saturation")
            .template("eq=saturation={value}")
            .param(
                ParamSpec::new("value", ParamType::Real)
                    .bounded(0.0, 3.0)
                    .with_default(1.3)
                    .with_aliases(&["amount", "level"]),
            ),
        SkillDef::new("gamma")
            .description("Adjust gamma")
            .template("eq=gamma={value}")
            .param(
                ParamSpec::new("value", ParamType::Real)
                    .bounded(0.1, 10.0)
                    .with_default(1.0),
            ),
        SkillDef::new("blur")
            .description("Box blur")
            .aliases(&["box_blur"])
            .template("boxblur={radius}:{passes}")
            .param(
                ParamSpec::new("radius", ParamType::Integer)
                    .bounded(1.0, 50.0)
                    .with_default(2)
                    .with_aliases(&["strength", "amount"]),
            )
            .param(
                ParamSpec::new("passes", ParamType::Integer)
                    .bounded(1.0, 10.0)
                    .with_default(1),
            ),
        SkillDef::new("sharpen")
            .description("Unsharp-mask sharpening")
            .template("unsharp=5:5:{amount}")
            .param(
                ParamSpec::new("amount", ParamType::Real)
                    .bounded(0.0, 5.0)
                    .with_default(1.0)
                    .with_aliases(&["strength"]),
            ),
        SkillDef::new("crop")
            .category(SkillCategory::Transform)
            .description("Crop to a region")
            .template("crop={width}:{height}:{x}:{y}")
            .param(ParamSpec::new("width", ParamType::Integer).required().with_aliases(&["w"]))
            .param(ParamSpec::new("height", ParamType::Integer).required().with_aliases(&["h"]))
            .param(ParamSpec::new("x", ParamType::Integer).with_default(0))
            .param(ParamSpec::new("y", ParamType::Integer).with_default(0)),
        SkillDef::new("scale")
            .category(SkillCategory::Transform)
            .description("Resize, preserving aspect when one side is -1")
            .aliases(&["resize"])
            .template("scale={width}:{height}")
            .param(ParamSpec::new("width", ParamType::Integer).with_default(-1).with_aliases(&["w"]))
            .param(ParamSpec::new("height", ParamType::Integer).with_default(-1).with_aliases(&["h"])),
        SkillDef::new("rotate")
            .category(SkillCategory::Transform)
            .description("Rotate by degrees")
            .template("rotate={degrees}*PI/180")
            .param(
                ParamSpec::new("degrees", ParamType::Real)
                    .bounded(-360.0, 360.0)
                    .with_default(90.0)
                    .with_aliases(&["angle"]),
            ),
        SkillDef::new("hflip")
            .category(SkillCategory::Transform)
            .description("Mirror horizontally")
            .aliases(&["flip_horizontal", "mirror"])
            .template("hflip"),
        SkillDef::new("vflip")
            .category(SkillCategory::Transform)
            .description("Mirror vertically")
            .aliases(&["flip_vertical"])
            .template("vflip"),
        SkillDef::new("video_speed")
            .category(SkillCategory::Transform)
            .description("Retime the video stream")
            .template("setpts=PTS/{factor}")
            .param(
                ParamSpec::new("factor", ParamType::Real)
                    .bounded(0.25, 4.0)
                    .with_default(2.0),
            ),
        SkillDef::new("audio_speed")
            .category(SkillCategory::Audio)
            .description("Retime the audio stream")
            .template("atempo={factor}")
            // atempo only accepts 0.5..2.0 per invocation.
            .param(
                ParamSpec::new("factor", ParamType::Real)
                    .bounded(0.5, 2.0)
                    .with_default(2.0),
            ),
        SkillDef::new("speed")
            .category(SkillCategory::Composite)
            .description("Change playback speed, keeping audio in sync")
            .aliases(&["playback_speed", "timelapse"])
            .sub_pipeline(vec![
                child("video_speed", &[("factor", "{factor}")]),
                child("audio_speed", &[("factor", "{factor}")]),
            ])
            .param(
                ParamSpec::new("factor", ParamType::Real)
                    .bounded(0.5, 2.0)
                    .with_default(2.0)
                    .with_aliases(&["speed", "rate"]),
            ),
        SkillDef::new("fade_in")
            .description("Fade video in from black")
            .template("fade=t=in:st={start}:d={duration}")
            .param(ParamSpec::new("start", ParamType::Duration).with_default(0.0))
            .param(
                ParamSpec::new("duration", ParamType::Duration)
                    .bounded(0.1, 30.0)
                    .with_default(1.0)
                    .with_aliases(&["length"]),
            ),
        SkillDef::new("fade_out")
            .description("Fade video out to black")
            .template("fade=t=out:st={start}:d={duration}")
            .param(ParamSpec::new("start", ParamType::Duration).required())
            .param(
                ParamSpec::new("duration", ParamType::Duration)
                    .bounded(0.1, 30.0)
                    .with_default(1.0)
                    .with_aliases(&["length"]),
            ),
        SkillDef::new("audio_fade_in")
            .category(SkillCategory::Audio)
            .description("Fade audio in")
            .template("afade=t=in:st={start}:d={duration}")
            .param(ParamSpec::new("start", ParamType::Duration).with_default(0.0))
            .param(
                ParamSpec::new("duration", ParamType::Duration)
                    .bounded(0.1, 30.0)
                    .with_default(1.0),
            ),
        SkillDef::new("audio_fade_out")
            .category(SkillCategory::Audio)
            .description("Fade audio out")
            .template("afade=t=out:st={start}:d={duration}")
            .param(ParamSpec::new("start", ParamType::Duration).required())
            .param(
                ParamSpec::new("duration", ParamType::Duration)
                    .bounded(0.1, 30.0)
                    .with_default(1.0),
            ),
        SkillDef::new("volume")
            .category(SkillCategory::Audio)
            .description("Scale audio volume")
            .aliases(&["gain"])
            .template("volume={level}")
            .param(
                ParamSpec::new("level", ParamType::Real)
                    .bounded(0.0, 10.0)
                    .with_default(1.0)
                    .with_aliases(&["amount", "factor"]),
            ),
        SkillDef::new("mute")
            .category(SkillCategory::Audio)
            .description("Drop the audio stream entirely")
            .aliases(&["silence", "remove_audio"])
            .template("-an"),
        SkillDef::new("strip_metadata")
            .category(SkillCategory::Transform)
            .description("Remove container metadata")
            .aliases(&["remove_metadata"])
            .template("-map_metadata -1"),
        SkillDef::new("trim")
            .category(SkillCategory::Transform)
            .description("Keep a time window of the source")
            .aliases(&["cut", "clip"])
            .template("-ss {start} -t {duration}")
            .param(ParamSpec::new("start", ParamType::Duration).with_default(0.0).with_aliases(&["from"]))
            .param(ParamSpec::new("duration", ParamType::Duration).required().with_aliases(&["length"])),
        SkillDef::new("drawtext")
            .category(SkillCategory::Text)
            .description("Overlay a text caption")
            .aliases(&["text", "caption"])
            .template("drawtext=text='{text}':x={x}:y={y}:fontsize={size}:fontcolor={color}")
            .param(ParamSpec::new("text", ParamType::String).required().with_aliases(&["caption", "label"]))
            .param(ParamSpec::new("x", ParamType::String).with_default("(w-text_w)/2"))
            .param(ParamSpec::new("y", ParamType::String).with_default("h-th-20"))
            .param(
                ParamSpec::new("size", ParamType::Integer)
                    .bounded(8.0, 200.0)
                    .with_default(32)
                    .with_aliases(&["fontsize"]),
            )
            .param(
                ParamSpec::new("color", ParamType::Color)
                    .with_default("white")
                    .with_aliases(&["fontcolor"]),
            ),
        SkillDef::new("colorbalance")
            .description("Shift shadow color balance per channel")
            .aliases(&["color_shift"])
            .template("colorbalance=rs={red}:gs={green}:bs={blue}")
            .param(ParamSpec::new("red", ParamType::Real).bounded(-1.0, 1.0).with_default(0.0))
            .param(ParamSpec::new("green", ParamType::Real).bounded(-1.0, 1.0).with_default(0.0))
            .param(ParamSpec::new("blue", ParamType::Real).bounded(-1.0, 1.0).with_default(0.0)),
        SkillDef::new("hue")
            .description("Rotate hue by degrees")
            .template("hue=h={degrees}")
            .param(
                ParamSpec::new("degrees", ParamType::Real)
                    .bounded(-360.0, 360.0)
                    .with_default(0.0)
                    .with_aliases(&["angle", "shift"]),
            ),
        SkillDef::new("grayscale")
            .description("Desaturate to grayscale")
            .aliases(&["greyscale", "black_and_white"])
            .template("hue=s=0"),
        SkillDef::new("denoise")
            .description("Temporal/spatial denoise")
            .aliases(&["noise_reduction"])
            .template("hqdn3d={strength}")
            .param(
                ParamSpec::new("strength", ParamType::Real)
                    .bounded(0.0, 10.0)
                    .with_default(4.0)
                    .with_aliases(&["amount"]),
            ),
        SkillDef::new("overlay")
            .category(SkillCategory::Composite)
            .description("Composite a bound input over the main video")
            .builtin("overlay")
            .param(ParamSpec::new("source", ParamType::Integer).with_default(1))
            .param(ParamSpec::new("x", ParamType::String).with_default("0"))
            .param(ParamSpec::new("y", ParamType::String).with_default("0"))
            .param(
                ParamSpec::new("opacity", ParamType::Real)
                    .bounded(0.0, 1.0)
                    .with_default(1.0)
                    .with_aliases(&["alpha"]),
            ),
        SkillDef::new("watermark")
            .category(SkillCategory::Composite)
            .description("Loop a still image as a corner watermark")
            .aliases(&["logo"])
            .builtin("watermark")
            .param(ParamSpec::new("source", ParamType::Integer).with_default(1))
            .param(
                ParamSpec::new("position", ParamType::Choice)
                    .with_choices(&["top_left", "top_right", "bottom_left", "bottom_right"])
                    .with_default("bottom_right")
                    .with_aliases(&["corner"]),
            )
            .param(
                ParamSpec::new("opacity", ParamType::Real)
                    .bounded(0.0, 1.0)
                    .with_default(0.5)
                    .with_aliases(&["alpha"]),
            )
            .param(
                ParamSpec::new("margin", ParamType::Integer)
                    .bounded(0.0, 200.0)
                    .with_default(10),
            ),
        SkillDef::new("picture_in_picture")
            .category(SkillCategory::Composite)
            .description("Inset a bound input in a corner")
            .aliases(&["pip", "inset"])
            .builtin("picture_in_picture")
            .param(ParamSpec::new("source", ParamType::Integer).with_default(1))
            .param(
                ParamSpec::new("size", ParamType::Real)
                    .bounded(0.05, 0.75)
                    .with_default(0.25)
                    .with_aliases(&["scale"]),
            )
            .param(
                ParamSpec::new("position", ParamType::Choice)
                    .with_choices(&["top_left", "top_right", "bottom_left", "bottom_right"])
                    .with_default("bottom_right")
                    .with_aliases(&["corner"]),
            )
            .param(
                ParamSpec::new("margin", ParamType::Integer)
                    .bounded(0.0, 200.0)
                    .with_default(10),
            ),
        SkillDef::new("audio_mix")
            .category(SkillCategory::Audio)
            .description("Mix a bound audio input into the main track")
            .aliases(&["mix_audio", "background_music"])
            .builtin("audio_mix")
            .param(ParamSpec::new("source", ParamType::Integer).with_default(1))
            .param(
                ParamSpec::new("weight", ParamType::Real)
                    .bounded(0.0, 1.0)
                    .with_default(0.5)
                    .with_aliases(&["volume", "level"]),
            ),
        SkillDef::new("side_by_side")
            .category(SkillCategory::Composite)
            .description("Stack the main video and a bound input")
            .aliases(&["split_screen"])
            .builtin("side_by_side")
            .param(ParamSpec::new("source", ParamType::Integer).with_default(1))
            .param(
                ParamSpec::new("direction", ParamType::Choice)
                    .with_choices(&["horizontal", "vertical"])
                    .with_default("horizontal")
                    .with_aliases(&["orientation"]),
            ),
    ]
}
