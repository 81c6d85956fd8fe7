//! Prognostics Configuration Module
//!
//! Every tuning constant of the three estimator stages is an operator-tunable
//! TOML value, replacing hardcoded parameters with per-asset settings.
//!
//! ## Loading Order
//!
//! 1. `AEOLUS_CONFIG` environment variable (path to TOML file)
//! 2. `turbine_config.toml` in the current working directory
//! 3. Built-in defaults (matching the tuned offshore-turbine parameters)
//!
//! The loaded [`PrognosticsConfig`] is passed explicitly into each stage —
//! estimators never read global state, which keeps them testable and allows
//! side-by-side runs with different tunings.

mod prognostics;

pub use prognostics::*;
