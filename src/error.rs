//! Error types for the NutriGuard library.
//!
//! All fallible operations in the crate return [`Result`], whose error type
//! is the [`NutriGuardError`] enum. Variants are grouped by the pipeline
//! concern that produced them, and constructor helpers keep call sites short.

use std::io;

use thiserror::Error;

/// The main error type for NutriGuard operations.
#[derive(Error, Debug)]
pub enum NutriGuardError {
    /// I/O errors (catalog files, fixtures, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Profile-related errors (malformed health profiles, missing users)
    #[error("Profile error: {0}")]
    Profile(String),

    /// Catalog-related errors (product lookup, record normalization)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Parse errors (malformed generation output, bad fixtures)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Pipeline-control errors (routing, stage sequencing)
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Generation-capability errors. Host implementations of
    /// [`TextGenerator`](crate::allergen::TextGenerator) return this when
    /// the backend fails to answer; the evaluation stage degrades on it.
    #[error("Generation error: {0}")]
    Generation(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with NutriGuardError.
pub type Result<T> = std::result::Result<T, NutriGuardError>;

impl NutriGuardError {
    /// Create a new profile error.
    pub fn profile<S: Into<String>>(msg: S) -> Self {
        NutriGuardError::Profile(msg.into())
    }

    /// Create a new catalog error.
    pub fn catalog<S: Into<String>>(msg: S) -> Self {
        NutriGuardError::Catalog(msg.into())
    }

    /// Create a new parse error.
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        NutriGuardError::Parse(msg.into())
    }

    /// Create a new pipeline error.
    pub fn pipeline<S: Into<String>>(msg: S) -> Self {
        NutriGuardError::Pipeline(msg.into())
    }

    /// Create a new generation error.
    pub fn generation<S: Into<String>>(msg: S) -> Self {
        NutriGuardError::Generation(msg.into())
    }
}
