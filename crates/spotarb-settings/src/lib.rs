//! The durable `AppSettings` store (component C3) and the process-level
//! `EngineConfig` it is configured by. `figment` layers a TOML base with
//! `SPOTARB_`-prefixed environment overrides for static process config, and a
//! `notify`-driven file watcher feeds a `tokio::sync::watch` channel for live
//! reload of the mutable trading settings document.

mod engine_config;
mod error;
mod store;
mod watcher;

pub use engine_config::{EngineConfig, EngineConfigLoader};
pub use error::SettingsError;
pub use store::SettingsStore;
pub use watcher::watch_settings_file;
