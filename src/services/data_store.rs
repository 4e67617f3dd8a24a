use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::error::EngineError;
use crate::ingestion::rail;
use crate::structures::{DataConfig, DataCounts, Snapshot};

struct StoreInner {
    snapshot: Option<Arc<Snapshot>>,
    last_loaded: Option<Instant>,
}

/// Holder of the static reference data. A load builds a complete snapshot
/// off to the side and swaps the pointer under a short write lock; a
/// failed load leaves the previous snapshot fully intact. Readers clone
/// the `Arc` out and never see a mix of old and new data.
pub struct DataStore {
    inner: RwLock<StoreInner>,
    config: DataConfig,
}

impl DataStore {
    pub fn new(config: DataConfig) -> DataStore {
        DataStore {
            inner: RwLock::new(StoreInner {
                snapshot: None,
                last_loaded: None,
            }),
            config,
        }
    }

    /// Replaces the whole snapshot, or fails without touching it.
    pub fn load(&self) -> Result<DataCounts, EngineError> {
        let snapshot = rail::load_snapshot(&self.config)?;
        let counts = snapshot.counts();

        let mut inner = self.inner.write().expect("data store lock poisoned");
        inner.snapshot = Some(Arc::new(snapshot));
        inner.last_loaded = Some(Instant::now());
        Ok(counts)
    }

    /// Consistent point-in-time read handle. `Unavailable` only when no
    /// load has ever succeeded.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>, EngineError> {
        let inner = self.inner.read().expect("data store lock poisoned");
        inner
            .snapshot
            .clone()
            .ok_or_else(|| EngineError::Unavailable("no snapshot loaded yet".to_string()))
    }

    /// Reloads when forced or when the snapshot has outlived the cache
    /// TTL; otherwise reports the current counts. Failures are logged and
    /// returned, but the previous snapshot keeps serving.
    pub fn refresh(&self, force: bool) -> Result<DataCounts, EngineError> {
        if !force && self.cache_valid() {
            if let Ok(snapshot) = self.snapshot() {
                return Ok(snapshot.counts());
            }
        }

        match self.load() {
            Ok(counts) => {
                info!(?counts, "data refreshed");
                Ok(counts)
            }
            Err(e) => {
                error!(error = %e, "data refresh failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    fn cache_valid(&self) -> bool {
        let inner = self.inner.read().expect("data store lock poisoned");
        match inner.last_loaded {
            Some(at) => at.elapsed() < Duration::from_secs(self.config.cache_seconds),
            None => false,
        }
    }
}
