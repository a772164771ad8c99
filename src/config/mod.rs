//! Coordination Configuration Module
//!
//! All operator-tunable values load from TOML, with every field defaulting
//! to the built-in constants so a missing file changes nothing.
//!
//! ## Loading Order
//!
//! 1. `EMBERLINE_CONFIG` environment variable (path to TOML file)
//! 2. `emberline.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded config is injected into the stage context at construction
//! (`bootstrap::build_context`); components read it from there rather
//! than through process-wide state.

pub mod defaults;
mod settings;
mod validation;

pub use settings::*;
pub use validation::ValidationWarning;
