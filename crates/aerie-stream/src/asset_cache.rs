//! Deduplicating asynchronous asset cache.
//!
//! Each [`AssetId`] is instantiated at most once while its load is in flight
//! or after it succeeded. Concurrent requesters share the one load through a
//! `watch` channel and each receive their own clone of the raw asset. A
//! failed load is removed before the failure is published, so the next
//! request starts over.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::error::AssetLoadError;
use crate::sinks::AssetLoader;

/// Identifier of an external asset, e.g. a model path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(Arc<str>);

impl AssetId {
    /// Create an id.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// The id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

enum LoadState<A> {
    Loading,
    Ready(Arc<A>),
    Failed(AssetLoadError),
}

impl<A> LoadState<A> {
    fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

struct CacheInner<L: AssetLoader> {
    loader: Arc<L>,
    entries: Mutex<FxHashMap<AssetId, watch::Receiver<LoadState<L::Asset>>>>,
    instantiations: AtomicU64,
}

/// Cloneable handle to one shared cache.
pub struct AssetCache<L: AssetLoader> {
    inner: Arc<CacheInner<L>>,
}

impl<L: AssetLoader> Clone for AssetCache<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: AssetLoader> fmt::Debug for AssetCache<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetCache")
            .field("instantiations", &self.instantiate_count())
            .finish_non_exhaustive()
    }
}

impl<L: AssetLoader> AssetCache<L> {
    /// Empty cache over `loader`.
    pub fn new(loader: L) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                loader: Arc::new(loader),
                entries: Mutex::new(FxHashMap::default()),
                instantiations: AtomicU64::new(0),
            }),
        }
    }

    /// The underlying loader.
    pub fn loader(&self) -> &L {
        &self.inner.loader
    }

    /// Get an independent instance of `id`.
    ///
    /// Only the first request for an id not already cached calls
    /// [`AssetLoader::instantiate`]; every caller, including that first one,
    /// waits on the same result and clones it.
    pub async fn load(&self, id: &AssetId) -> Result<L::Asset, AssetLoadError> {
        let mut rx = {
            let mut entries = self.inner.entries.lock().await;
            match entries.get(id) {
                Some(rx) => rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(LoadState::Loading);
                    entries.insert(id.clone(), rx.clone());
                    self.spawn_load(id.clone(), tx);
                    rx
                }
            }
        };

        let resolved = match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => match &*state {
                LoadState::Ready(raw) => Ok(Arc::clone(raw)),
                LoadState::Failed(err) => Err(err.clone()),
                LoadState::Loading => Err(AssetLoadError::Abandoned(id.clone())),
            },
            Err(_) => Err(AssetLoadError::Abandoned(id.clone())),
        };

        match resolved {
            Ok(raw) => Ok(self.inner.loader.clone_instance(&raw)),
            Err(AssetLoadError::Abandoned(id)) => {
                // The loading task died without publishing; let the next call retry.
                self.remove_entry(&id, &rx).await;
                Err(AssetLoadError::Abandoned(id))
            }
            Err(err) => Err(err),
        }
    }

    fn spawn_load(&self, id: AssetId, tx: watch::Sender<LoadState<L::Asset>>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.instantiations.fetch_add(1, Ordering::Relaxed);
            match inner.loader.instantiate(&id).await {
                Ok(raw) => {
                    debug!(asset = %id, "Asset instantiated");
                    tx.send_replace(LoadState::Ready(Arc::new(raw)));
                }
                Err(err) => {
                    warn!(asset = %id, error = %err, "Asset load failed");
                    {
                        let mut entries = inner.entries.lock().await;
                        let ours = tx.subscribe();
                        if entries.get(&id).is_some_and(|rx| rx.same_channel(&ours)) {
                            entries.remove(&id);
                        }
                    }
                    tx.send_replace(LoadState::Failed(err));
                }
            }
        });
    }

    async fn remove_entry(&self, id: &AssetId, rx: &watch::Receiver<LoadState<L::Asset>>) {
        let mut entries = self.inner.entries.lock().await;
        if entries.get(id).is_some_and(|current| current.same_channel(rx)) {
            entries.remove(id);
        }
    }

    /// Number of [`AssetLoader::instantiate`] calls made so far.
    pub fn instantiate_count(&self) -> u64 {
        self.inner.instantiations.load(Ordering::Relaxed)
    }

    /// Number of successfully loaded assets held.
    pub async fn cached_count(&self) -> usize {
        let entries = self.inner.entries.lock().await;
        entries
            .values()
            .filter(|rx| matches!(&*rx.borrow(), LoadState::Ready(_)))
            .count()
    }

    /// Forget every entry. Loads already in flight still complete for their
    /// current waiters.
    pub async fn clear(&self) {
        self.inner.entries.lock().await.clear();
    }
}
