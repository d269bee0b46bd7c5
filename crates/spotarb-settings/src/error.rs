use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize settings: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("failed to load engine config: {0}")]
    Config(#[from] figment::Error),
}
