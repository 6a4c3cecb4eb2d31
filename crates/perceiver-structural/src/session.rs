use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cdp_adapter::{BrowserDriver, WaitUntil};
use parking_lot::{Mutex, RwLock};
use refpilot_core_types::{Clock, Generation, SessionId, SystemClock};
use tracing::{debug, info, warn};

use crate::cache::SnapshotCache;
use crate::capabilities::Capabilities;
use crate::catalog::CatalogBuilder;
use crate::config::SessionConfig;
use crate::differ;
use crate::errors::PerceiverError;
use crate::metrics;
use crate::model::{Catalog, RefTable, SnapshotDiff};
use crate::mutation::{MutationState, MutationWatcher};

/// What one `snapshot` call hands back.
#[derive(Clone, Debug)]
pub struct SnapshotView {
    pub catalog: Arc<Catalog>,
    /// Delta against the catalog returned by the previous `snapshot` call.
    pub diff: SnapshotDiff,
    pub from_cache: bool,
    pub age: Duration,
    /// No earlier catalog existed to diff against.
    pub first: bool,
}

/// Owns everything tied to one driven page: ref table, cache, generation counter, previous
/// catalog and injected capabilities.
pub struct BrowserSession {
    id: SessionId,
    driver: Arc<dyn BrowserDriver>,
    config: SessionConfig,
    builder: CatalogBuilder,
    cache: SnapshotCache,
    refs: RwLock<Arc<RefTable>>,
    generation: AtomicU64,
    previous: Mutex<Option<Arc<Catalog>>>,
    watcher: MutationWatcher,
    capabilities: Capabilities,
}

impl BrowserSession {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: SessionConfig) -> Self {
        Self::with_clock(driver, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        driver: Arc<dyn BrowserDriver>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            driver,
            builder: CatalogBuilder::new(config.catalog.clone()),
            cache: SnapshotCache::new(&config.cache, clock),
            config,
            refs: RwLock::new(Arc::new(RefTable::new(Generation::default()))),
            generation: AtomicU64::new(0),
            previous: Mutex::new(None),
            watcher: MutationWatcher::new(),
            capabilities: Capabilities::none(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn driver(&self) -> &Arc<dyn BrowserDriver> {
        &self.driver
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Ref table of the catalog most recently served.
    pub fn refs(&self) -> Arc<RefTable> {
        self.refs.read().clone()
    }

    pub fn generation(&self) -> Generation {
        self.refs.read().generation()
    }

    pub fn previous(&self) -> Option<Arc<Catalog>> {
        self.previous.lock().clone()
    }

    /// Forgets the previous catalog so the next snapshot diffs from scratch.
    pub fn reset_previous(&self) {
        self.previous.lock().take();
    }

    /// Returns the current catalog, from cache when it is fresh and the DOM has not mutated.
    pub async fn snapshot(&self, force: bool) -> Result<SnapshotView, PerceiverError> {
        let started = Instant::now();
        let driver = self.driver.as_ref();
        let url = driver.current_url().await?;
        let cache_enabled = self.config.cache.enabled;

        if force {
            self.cache.invalidate(&url);
        } else if cache_enabled && self.config.cache.mutation_invalidation {
            match self.watcher.check(driver).await {
                Ok(MutationState::Unchanged) => {}
                Ok(MutationState::Changed | MutationState::Unknown) => {
                    self.cache.invalidate(&url);
                }
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    debug!(%err, "mutation epoch unreadable; treating cached catalog as stale");
                    self.cache.invalidate(&url);
                }
            }
        }

        let cached = if cache_enabled && !force {
            self.cache.get(&url)
        } else {
            None
        };

        let (catalog, from_cache, age) = match cached {
            Some(hit) => {
                *self.refs.write() = hit.refs;
                (hit.catalog, true, hit.age)
            }
            None => {
                let watching = cache_enabled && self.config.cache.mutation_invalidation;
                if watching {
                    match self.watcher.arm(driver).await {
                        Ok(()) => {}
                        Err(err) if err.is_fatal() => return Err(err.into()),
                        Err(err) => {
                            debug!(%err, "could not install mutation observer");
                            self.watcher.reset();
                        }
                    }
                }
                let generation = self.next_generation();
                self.open_handle_scope(generation).await;
                let built = self.builder.build(driver, generation).await;
                let catalog = Arc::new(built.catalog);
                let refs = Arc::new(built.refs);
                *self.refs.write() = Arc::clone(&refs);
                // The armed epoch predates the build; a bump means the rows may be torn.
                let settled = !watching
                    || !self.watcher.is_armed()
                    || matches!(self.watcher.check(driver).await, Ok(MutationState::Unchanged));
                if cache_enabled && !catalog.is_empty() {
                    if settled {
                        self.cache.put(&url, Arc::clone(&catalog), refs);
                    } else {
                        debug!(%url, "dom mutated during catalog build; not caching");
                    }
                }
                (catalog, false, Duration::ZERO)
            }
        };

        let previous = self.previous.lock().replace(Arc::clone(&catalog));
        let diff = differ::diff(&catalog, previous.as_deref());
        metrics::record_snapshot(from_cache, started.elapsed());
        debug!(
            session = %self.id.0,
            generation = %catalog.generation,
            elements = catalog.len(),
            from_cache,
            changes = diff.change_count(),
            "snapshot served"
        );

        Ok(SnapshotView {
            first: previous.is_none(),
            catalog,
            diff,
            from_cache,
            age,
        })
    }

    /// Navigates and starts a new, empty ref generation. Refs from before the navigation stop
    /// resolving even if the navigation itself fails.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), PerceiverError> {
        let outcome = self.driver.navigate(url, WaitUntil::Load, timeout).await;
        let generation = self.next_generation();
        *self.refs.write() = Arc::new(RefTable::new(generation));
        self.open_handle_scope(generation).await;
        self.watcher.reset();
        self.cache.invalidate(url);
        outcome?;

        info!(session = %self.id.0, url, generation = %generation, "navigated");
        self.run_challenge_bypass().await;
        Ok(())
    }

    /// Drops the cached catalog for the page currently loaded.
    pub async fn invalidate_current(&self) -> Result<(), PerceiverError> {
        let url = self.driver.current_url().await?;
        self.cache.invalidate(&url);
        Ok(())
    }

    async fn run_challenge_bypass(&self) {
        let Some(bypasser) = &self.capabilities.challenge else {
            return;
        };
        let driver = self.driver.as_ref();
        match bypasser.detect(driver).await {
            Ok(true) => {
                info!(bypasser = bypasser.name(), "challenge page detected");
                if let Err(err) = bypasser.bypass(driver).await {
                    warn!(bypasser = bypasser.name(), %err, "challenge bypass failed");
                }
            }
            Ok(false) => {}
            Err(err) => debug!(bypasser = bypasser.name(), %err, "challenge detection failed"),
        }
    }

    /// Element handles from earlier generations are released on the page.
    async fn open_handle_scope(&self, generation: Generation) {
        if let Err(err) = self.driver.open_handle_scope(generation.0).await {
            debug!(%err, %generation, "could not release element handles");
        }
    }

    fn next_generation(&self) -> Generation {
        Generation(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("id", &self.id)
            .field("generation", &self.generation())
            .field("cached", &self.cache.len())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
