//! # pairline-settings
//!
//! Configuration with layered sources, in priority order:
//! 1. **Compiled defaults**: [`PairlineSettings::default()`]
//! 2. **Settings file**: `~/.pairline/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PAIRLINE_*` overrides (highest priority)
//!
//! CLI flags in the `pairline` binary are applied on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
