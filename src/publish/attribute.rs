use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{PublishError, PublishSettings};
use crate::encoder::{PositionSnapshot, PositionStore};

/// Read-only text attribute exposing `"<enc1> <enc2>"`.
///
/// The attribute file is refreshed by a tokio task and replaced atomically
/// (write to a sibling, then rename), so a reader of the file never sees a
/// partial line. In-process readers can call [`read`](Self::read) or
/// [`subscribe`](Self::subscribe) instead.
///
/// Dropping a publisher without [`unpublish`](Self::unpublish) cancels the
/// refresh task and removes the file on a best-effort basis.
pub struct AttributePublisher {
    path: PathBuf,
    attached: bool,
    store: Arc<PositionStore>,
    snapshot_rx: watch::Receiver<PositionSnapshot>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AttributePublisher {
    /// Create the attribute and start refreshing it.
    ///
    /// Failing to create the file is logged and leaves the publisher
    /// detached; [`read`](Self::read) and subscribers keep working. Must be
    /// called from within a tokio runtime.
    pub async fn publish(store: Arc<PositionStore>, settings: &PublishSettings) -> Self {
        info!("ENC: starting attribute...");
        let path = settings.attribute_path.clone();

        let attached = match write_attribute(&path, &store.render()).await {
            Ok(()) => {
                info!("Publishing positions at {}", path.display());
                true
            }
            Err(e) => {
                error!("{}; positions keep accumulating unpublished", e);
                false
            }
        };

        let (snapshot_tx, snapshot_rx) = watch::channel(store.snapshot());
        let token = CancellationToken::new();
        let interval = Duration::from_millis(settings.refresh_interval_ms.max(1));

        let task = tokio::spawn(refresh_attribute(
            attached.then(|| path.clone()),
            store.clone(),
            snapshot_tx,
            interval,
            token.clone(),
        ));

        info!("ENC: starting attribute done.");
        Self {
            path,
            attached,
            store,
            snapshot_rx,
            token,
            task: Some(task),
        }
    }

    /// Current attribute text, read straight from the store.
    pub fn read(&self) -> String {
        self.store.render()
    }

    /// Receiver that is notified whenever the published positions change.
    pub fn subscribe(&self) -> watch::Receiver<PositionSnapshot> {
        debug!("New subscriber to position snapshots");
        self.snapshot_rx.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the attribute file was created.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Stop refreshing and remove the attribute file.
    pub async fn unpublish(mut self) -> Result<(), PublishError> {
        info!("ENC: stopping attribute...");
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| PublishError::TaskError(e.to_string()))?;
        }

        if std::mem::take(&mut self.attached) {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!("Attribute {} already removed", self.path.display());
                }
                Err(source) => {
                    return Err(PublishError::Remove {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
        }
        info!("ENC: stopping attribute done.");
        Ok(())
    }
}

impl Drop for AttributePublisher {
    fn drop(&mut self) {
        self.token.cancel();
        if self.attached {
            warn!("Attribute publisher dropped while published, removing it");
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    error!("Failed to remove attribute {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

async fn refresh_attribute(
    path: Option<PathBuf>,
    store: Arc<PositionStore>,
    snapshot_tx: watch::Sender<PositionSnapshot>,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = snapshot_tx.borrow().positions();
    let mut write_failing = false;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = store.snapshot();
                let changed = snapshot.positions() != last;
                // A failed write is retried on every tick until one succeeds
                if !changed && !write_failing {
                    continue;
                }

                if let Some(path) = &path {
                    match write_attribute(path, &snapshot.to_string()).await {
                        Ok(()) => {
                            if write_failing {
                                info!("Attribute {} writable again", path.display());
                            }
                            write_failing = false;
                        }
                        Err(e) => {
                            // Log once per failure streak
                            if !write_failing {
                                warn!("{}", e);
                                write_failing = true;
                            }
                        }
                    }
                }
                if changed {
                    last = snapshot.positions();
                    snapshot_tx.send_replace(snapshot);
                }
            }
        }
    }
    debug!("Attribute refresh task finished");
}

async fn write_attribute(path: &Path, text: &str) -> Result<(), PublishError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PublishError::Create {
                path: path.to_path_buf(),
                source,
            })?;
    }

    let staging = staging_path(path);
    tokio::fs::write(&staging, text)
        .await
        .map_err(|source| PublishError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|source| PublishError::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
