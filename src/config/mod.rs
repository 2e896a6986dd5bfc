//! Configuration for EVOX.
//!
//! ## config.kdl - Preferences
//!
//! Located at `~/.config/evox/config.kdl` (override with `--config` or
//! `EVOX_CONFIG`). Contains:
//! - `database` - SQLite database path
//! - `listen` - HTTP bind address (`host=` / `port=` properties)
//! - `target-project` - Project that synced tasks attach to
//! - `log-level`, `log-format`, `log-dir` - Logging
//! - `linear` block - Issue tracker endpoint, project id, workspace, fetch limit
//! - `roster` block - Role to canonical agent name table
//!
//! ## Secrets
//!
//! The webhook signing secret and the Linear API key are environment-only
//! (`LINEAR_WEBHOOK_SECRET`, `LINEAR_API_KEY`) and are never written to disk.
//!
//! ## Precedence
//!
//! CLI flag > environment > config.kdl > defaults.
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, LinearSettings, Resolved, Settings, ValueSource, masked, resolve_settings,
    resolve_settings_from, system_config_path,
};
pub use schema::{EvoxConfig, LinearSection, LogFormat, Roster};
