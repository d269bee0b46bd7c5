use crate::error::SettingsError;
use figment::providers::{Env, Format, Json, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Process-level, effectively-static configuration: where things live and how often
/// loops run. Distinct from [`spotarb_core::AppSettings`], which holds the
/// operator-mutable trading parameters and is reloaded at runtime rather than only
/// at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub settings_path: String,
    pub book_staleness_ms: u64,
    pub inventory_poll_interval_secs: u64,
    pub safety_check_interval_secs: u64,
    pub log_filter: String,
    /// Venue ids to stand up a `SandboxVenueAdapter` for at startup.
    pub venue_ids: Vec<String>,
    /// Symbols the detection universe tracks across those venues.
    pub symbols: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settings_path: "config/settings.json".to_string(),
            book_staleness_ms: 2000,
            inventory_poll_interval_secs: 30,
            safety_check_interval_secs: 15,
            log_filter: "info".to_string(),
            venue_ids: vec!["A".to_string(), "B".to_string()],
            symbols: vec!["BTCUSDT".to_string()],
        }
    }
}

pub struct EngineConfigLoader;

impl EngineConfigLoader {
    /// Merges a TOML base file, `SPOTARB_`-prefixed environment overrides, and an
    /// optional JSON overlay, in that order: later layers win field-by-field.
    pub fn load(toml_path: &str) -> Result<EngineConfig, SettingsError> {
        let config: EngineConfig = Figment::new()
            .merge(Toml::file(toml_path))
            .merge(Env::prefixed("SPOTARB_"))
            .join(Json::file("config/engine.json"))
            .extract()?;
        Ok(config)
    }

    pub fn load_default_path() -> Result<EngineConfig, SettingsError> {
        Self::load("config/engine.toml")
    }
}
