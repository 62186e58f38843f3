//! # NutriGuard
//!
//! A health-aware food product evaluation library for Rust.
//!
//! ## Features
//!
//! - Per-disease nutrient threshold profiles with priority merging
//! - Allergen inference over generated ingredient analyses
//! - Taste- and category-aware substitute candidate retrieval
//! - Nonlinear per-condition health scoring
//! - A policy-routed evaluation pipeline with graceful degradation

pub mod allergen;
pub mod catalog;
pub mod cli;
pub mod error;
pub mod nutrient;
pub mod pipeline;
pub mod profile;
pub mod recommend;
pub mod retrieval;
pub mod scoring;
pub mod threshold;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
