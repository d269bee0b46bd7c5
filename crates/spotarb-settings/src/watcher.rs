use crate::store::SettingsStore;
use notify::{Event, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Watches the settings document for changes made outside this process (the
/// out-of-scope HTTP API persists its own writes to the same file) and reloads into
/// the shared [`SettingsStore`]. Runs `notify`'s blocking watcher on a
/// `spawn_blocking` task and forwards modify events through a channel, since
/// `notify::Watcher` has no native async interface. Polls that channel with a
/// timeout so `shutdown` is also observed from inside the blocking task, rather
/// than leaving this watcher to be `abort()`-ed out from under the `notify`
/// watcher mid-reload.
pub async fn watch_settings_file(store: Arc<SettingsStore>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let path = store.path().to_path_buf();

    tokio::task::spawn_blocking(move || {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
            if let Ok(event) = res {
                let _ = notify_tx.send(event);
            }
        })?;

        watcher.watch(Path::new(&path), RecursiveMode::NonRecursive)?;

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            match notify_rx.recv_timeout(Duration::from_millis(200)) {
                Ok(event) => {
                    if event.kind.is_modify() {
                        tracing::info!("settings file changed, reloading");
                        match store.reload() {
                            Ok(_) => tracing::info!("settings reloaded successfully"),
                            Err(error) => tracing::error!("failed to reload settings: {error}"),
                        }
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        Ok::<_, anyhow::Error>(())
    })
    .await??;

    Ok(())
}
