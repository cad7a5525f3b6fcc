use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::AssetError;
use crate::environment::{EnvironmentAsset, decode_environment};
use crate::model::{ModelAsset, decode_model};

/// A decode running on a worker thread.
///
/// [`poll`](PendingAsset::poll) never blocks. It yields the result exactly
/// once; a load may also stay unresolved indefinitely.
#[derive(Debug)]
pub struct PendingAsset<T> {
    path: PathBuf,
    receiver: Receiver<Result<T, AssetError>>,
    resolved: bool,
}

impl<T> PendingAsset<T> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// `None` while the worker is busy or after the result was taken.
    pub fn poll(&mut self) -> Option<Result<T, AssetError>> {
        if self.resolved {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(result) => {
                self.resolved = true;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.resolved = true;
                Some(Err(AssetError::Disconnected(
                    self.path.display().to_string(),
                )))
            }
        }
    }

    /// Block until the worker finishes.
    pub fn wait(self) -> Result<T, AssetError> {
        if self.resolved {
            return Err(AssetError::Disconnected(self.path.display().to_string()));
        }
        self.receiver
            .recv()
            .map_err(|_| AssetError::Disconnected(self.path.display().to_string()))?
    }
}

/// Spawns one short-lived worker thread per requested asset.
#[derive(Debug, Default)]
pub struct AssetLoader {
    started: u64,
}

impl AssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loads started so far.
    pub fn started(&self) -> u64 {
        self.started
    }

    pub fn load_model(&mut self, path: impl Into<PathBuf>) -> PendingAsset<ModelAsset> {
        self.spawn(path.into(), |p| decode_model(p))
    }

    pub fn load_environment(&mut self, path: impl Into<PathBuf>) -> PendingAsset<EnvironmentAsset> {
        self.spawn(path.into(), |p| decode_environment(p))
    }

    fn spawn<T, F>(&mut self, path: PathBuf, decode: F) -> PendingAsset<T>
    where
        T: Send + 'static,
        F: FnOnce(PathBuf) -> Result<T, AssetError> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let worker_path = path.clone();
        self.started += 1;
        let spawned = std::thread::Builder::new()
            .name(format!("asset-{}", self.started))
            .spawn(move || {
                tracing::debug!(path = %worker_path.display(), "decoding asset");
                let result = decode(worker_path);
                // The receiver may have been dropped; nobody wants the result then.
                let _ = sender.send(result);
            });
        if let Err(e) = spawned {
            tracing::error!(path = %path.display(), "failed to spawn asset worker: {e}");
        }
        PendingAsset {
            path,
            receiver,
            resolved: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::write_triangle;

    #[test]
    fn model_resolves_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = AssetLoader::new();
        let mut pending = loader.load_model(write_triangle(dir.path()));
        assert_eq!(loader.started(), 1);

        let result = loop {
            if let Some(result) = pending.poll() {
                break result;
            }
            std::thread::yield_now();
        };
        assert_eq!(result.unwrap().primitives.len(), 1);
        assert!(pending.is_resolved());
        assert!(pending.poll().is_none());
    }

    #[test]
    fn failures_arrive_as_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = AssetLoader::new();
        let pending = loader.load_environment(dir.path().join("missing.hdr"));
        assert!(matches!(pending.wait(), Err(AssetError::Io(_))));
    }

    #[test]
    fn panicking_worker_reports_disconnect() {
        let mut loader = AssetLoader::new();
        let mut pending: PendingAsset<()> =
            loader.spawn(PathBuf::from("boom"), |_| panic!("decoder bug"));
        let result = loop {
            if let Some(result) = pending.poll() {
                break result;
            }
            std::thread::yield_now();
        };
        assert!(matches!(result, Err(AssetError::Disconnected(p)) if p == "boom"));
    }
}
