//! Clipforge - natural-language video editing
//!
//! This library crate exposes the core functionality for integration testing.

pub mod batch;
pub mod config;
pub mod controller;
pub mod exec;
pub mod instruction;
pub mod llm;
pub mod packs;
pub mod scrub;
