use crate::error::SettingsError;
use spotarb_core::AppSettings;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// The durable, atomically-mutated `AppSettings` snapshot (component C3). Every
/// reader takes an immutable clone via [`SettingsStore::snapshot`] or a
/// `watch::Receiver` obtained from [`SettingsStore::subscribe`]; nothing ever
/// observes a partially-applied mutation because `watch::Sender::send` replaces the
/// whole value atomically.
pub struct SettingsStore {
    path: PathBuf,
    tx: watch::Sender<AppSettings>,
}

impl SettingsStore {
    /// Loads the settings document at `path` if it exists, otherwise starts from
    /// `AppSettings::default()` and persists that as the initial document.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let initial = if path.exists() {
            Self::read_file(&path)?
        } else {
            let defaults = AppSettings::default();
            Self::write_file_atomic(&path, &defaults)?;
            defaults
        };
        let (tx, _rx) = watch::channel(initial);
        Ok(Self { path, tx })
    }

    fn read_file(path: &Path) -> Result<AppSettings, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_file_atomic(path: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                    path: path.display().to_string(),
                    source,
                })?;
            }
        }
        let json = serde_json::to_string_pretty(settings)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|source| SettingsError::Write {
            path: tmp_path.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| SettingsError::Write {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// A consistent, owned copy of the current settings.
    pub fn snapshot(&self) -> AppSettings {
        self.tx.borrow().clone()
    }

    /// A handle that observes every future change; does not itself hold the store
    /// open.
    pub fn subscribe(&self) -> watch::Receiver<AppSettings> {
        self.tx.subscribe()
    }

    /// Applies `mutator` to a clone of the current snapshot, persists the result,
    /// and publishes it to every subscriber. The whole operation is atomic from a
    /// reader's point of view: readers either see the settings before or after, never
    /// a torn intermediate state.
    pub fn mutate(
        &self,
        mutator: impl FnOnce(&mut AppSettings),
    ) -> Result<AppSettings, SettingsError> {
        let mut next = self.snapshot();
        mutator(&mut next);
        Self::write_file_atomic(&self.path, &next)?;
        let _ = self.tx.send(next.clone());
        Ok(next)
    }

    /// Reloads from disk and publishes, used by [`crate::SettingsWatcher`] when the
    /// file changes out from under this process (e.g. an external API process
    /// mutating the document directly).
    pub fn reload(&self) -> Result<AppSettings, SettingsError> {
        let loaded = Self::read_file(&self.path)?;
        let _ = self.tx.send(loaded.clone());
        Ok(loaded)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
