//! Offline asset cache manager.
//!
//! [`CacheWorker`] owns one cache generation, named by the version tag it
//! is constructed with, and drives three lifecycle events:
//!
//! - **install**: fetch every manifest asset and store them all, or store
//!   nothing. Waiting is always skipped, so a successful install is
//!   immediately eligible for activation.
//! - **activate**: delete every generation other than the current one and
//!   claim clients.
//! - **fetch**: network first. A response from the network is returned and
//!   a copy stored; a network failure falls back to the stored snapshot.

mod fetcher;

pub use fetcher::Fetcher;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::Error;
use crate::cache::CacheDb;
use crate::http::{CachedRequest, CachedResponse};
use crate::manifest::AssetManifest;

const DEFAULT_INSTALL_CONCURRENCY: usize = 4;

/// Lifecycle state of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, not yet installed.
    Parsed,
    Installing,
    /// Installed and ready to activate (waiting is skipped).
    Installed,
    Activating,
    /// Active and controlling clients.
    Activated,
    /// Install failed; this version will never activate.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Where a fetch response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Live: the network answered.
    Network,
    /// Degraded: the network failed and a stored snapshot was served.
    Cache,
}

/// Result of [`CacheWorker::on_fetch`].
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub response: CachedResponse,
    pub source: ResponseSource,
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub generation: String,
    /// Number of manifest assets stored.
    pub stored: usize,
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    pub generation: String,
    /// Stale generations that were deleted.
    pub evicted: Vec<String>,
}

/// Network-first cache manager for one version of the asset set.
pub struct CacheWorker {
    version: String,
    manifest: AssetManifest,
    fetcher: Arc<dyn Fetcher>,
    db: CacheDb,
    install_concurrency: usize,
    state: Mutex<WorkerState>,
}

impl CacheWorker {
    /// Create a worker for the generation named `version`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `version` is empty.
    pub fn new(
        version: impl Into<String>, manifest: AssetManifest, fetcher: Arc<dyn Fetcher>, db: CacheDb,
    ) -> Result<Self, Error> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(Error::InvalidInput("cache version cannot be empty".into()));
        }

        Ok(Self {
            version,
            manifest,
            fetcher,
            db,
            install_concurrency: DEFAULT_INSTALL_CONCURRENCY,
            state: Mutex::new(WorkerState::Parsed),
        })
    }

    /// Bound the number of manifest assets fetched at once during install.
    pub fn with_install_concurrency(mut self, concurrency: usize) -> Self {
        self.install_concurrency = concurrency.max(1);
        self
    }

    /// Name of the current cache generation.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.lock().await
    }

    /// Whether this worker has claimed its clients.
    pub async fn controls_clients(&self) -> bool {
        self.state().await == WorkerState::Activated
    }

    /// Move from one of `from` to `to`, atomically.
    async fn transition(&self, from: &[WorkerState], to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let current = *state;
        if !from.contains(&current) {
            return Err(Error::InvalidState(format!("cannot move from {current} to {to}")));
        }
        tracing::debug!(version = %self.version, from = %current, to = %to, "worker state change");
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.lock().await = to;
    }

    /// Populate the current generation from the asset manifest.
    ///
    /// Every asset is fetched before anything is written. A transport
    /// failure or a non-2xx status on any asset fails the whole install and
    /// marks this worker redundant; otherwise all assets are stored in one
    /// transaction and the worker becomes installed. An activated worker
    /// cannot be reinstalled; a new version gets a new worker.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        self.transition(&[WorkerState::Parsed, WorkerState::Installed], WorkerState::Installing)
            .await?;

        tracing::info!(version = %self.version, assets = self.manifest.len(), "installing cache generation");

        match self.precache().await {
            Ok(stored) => {
                self.set_state(WorkerState::Installed).await;
                tracing::info!(version = %self.version, stored, "install complete, skipping waiting");
                Ok(InstallReport { generation: self.version.clone(), stored })
            }
            Err(err) => {
                self.set_state(WorkerState::Redundant).await;
                tracing::error!(version = %self.version, error = %err, "install failed");
                Err(err)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        self.db.open_generation(&self.version).await?;

        let mut seen = HashSet::new();
        let mut requests = Vec::with_capacity(self.manifest.len());
        for path in self.manifest.paths() {
            let url = self
                .fetcher
                .resolve(path)
                .map_err(|e| Error::InstallFailed { path: path.clone(), reason: e.to_string() })?;
            if !seen.insert(url.clone()) {
                tracing::debug!(%path, %url, "manifest path resolves to an asset already listed");
                continue;
            }
            requests.push((path.clone(), CachedRequest::get(url)));
        }

        let semaphore = Arc::new(Semaphore::new(self.install_concurrency));
        let mut join_set = JoinSet::new();

        for (index, (path, request)) in requests.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);

            join_set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => fetcher.fetch(&request).await,
                    Err(e) => Err(Error::InvalidState(e.to_string())),
                };
                (index, path, request, result)
            });
        }

        let mut fetched = Vec::with_capacity(seen.len());

        while let Some(joined) = join_set.join_next().await {
            let (index, path, request, result) =
                joined.map_err(|e| Error::InstallFailed { path: "<task>".into(), reason: e.to_string() })?;

            let reason = match result {
                Ok(response) if response.is_success() => {
                    tracing::debug!(%path, url = %request.url, bytes = response.body.len(), "fetched asset");
                    fetched.push((index, request, response));
                    continue;
                }
                Ok(response) => format!("status {}", response.status),
                Err(err) => err.to_string(),
            };

            join_set.shutdown().await;
            return Err(Error::InstallFailed { path, reason });
        }

        fetched.sort_by_key(|(index, ..)| *index);
        let entries: Vec<_> = fetched
            .into_iter()
            .map(|(_, request, response)| (request, response))
            .collect();

        self.db.put_entries(&self.version, &entries).await?;

        Ok(entries.len())
    }

    /// Evict every generation but the current one and claim clients.
    ///
    /// Requires a completed install. Deleting a stale generation is
    /// best-effort: a failure is logged and the sweep moves on.
    pub async fn on_activate(&self) -> Result<ActivateReport, Error> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating)
            .await?;

        let names = match self.db.generation_names().await {
            Ok(names) => names,
            Err(err) => {
                self.set_state(WorkerState::Installed).await;
                return Err(err);
            }
        };

        let mut evicted = Vec::new();
        for name in names.into_iter().filter(|name| name != &self.version) {
            match self.db.delete_generation(&name).await {
                Ok(_) => {
                    tracing::info!(generation = %name, "deleted stale cache generation");
                    evicted.push(name);
                }
                Err(err) => {
                    tracing::warn!(generation = %name, error = %err, "failed to delete stale cache generation");
                }
            }
        }

        self.set_state(WorkerState::Activated).await;
        tracing::info!(version = %self.version, evicted = evicted.len(), "activated, claiming clients");

        Ok(ActivateReport { generation: self.version.clone(), evicted })
    }

    /// Serve a request network-first.
    ///
    /// A network response is returned as-is and a copy is stored under the
    /// request key before returning (only for `GET`). If the network fails,
    /// the stored snapshot is returned unchanged; if there is none the
    /// failure surfaces as `Error::OfflineMiss`.
    ///
    /// Only an activated worker controls clients; fetching through any other
    /// state is `Error::InvalidState`.
    pub async fn on_fetch(&self, request: &CachedRequest) -> Result<FetchOutcome, Error> {
        let state = self.state().await;
        if state != WorkerState::Activated {
            return Err(Error::InvalidState(format!("worker is {state}, not controlling clients")));
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if request.is_cacheable() {
                    if let Err(err) = self.db.put_entry(&self.version, request, &response).await {
                        tracing::warn!(url = %request.url, error = %err, "failed to store response in cache");
                    }
                }
                tracing::debug!(url = %request.url, status = response.status, "served from network");
                Ok(FetchOutcome { response, source: ResponseSource::Network })
            }
            Err(network_err) => {
                tracing::warn!(url = %request.url, error = %network_err, "network fetch failed, trying cache");
                match self.db.match_entry(&self.version, request).await? {
                    Some(response) => {
                        tracing::debug!(url = %request.url, "served from cache");
                        Ok(FetchOutcome { response, source: ResponseSource::Cache })
                    }
                    None => Err(Error::OfflineMiss(format!("{}: {}", request.url, network_err))),
                }
            }
        }
    }

    /// Resolve an intercepted request target (`/path?query`) to its URL on
    /// the origin.
    pub fn resolve_target(&self, target: &str) -> Result<String, Error> {
        self.fetcher.resolve_target(target)
    }

    /// Look up `request` in the current generation without touching the
    /// network.
    pub async fn match_request(&self, request: &CachedRequest) -> Result<Option<CachedResponse>, Error> {
        self.db.match_entry(&self.version, request).await
    }
}
