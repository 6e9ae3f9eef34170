//! Configuration module for page capture
//!
//! This module provides the `CaptureOptions` struct, its builder, and the
//! flat `capture.*` option map used to persist it.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use builder::CaptureOptionsBuilder;
pub use types::{CaptureOptions, ConfigError, CssRewriteMode, Policy, ResourceCategory};
