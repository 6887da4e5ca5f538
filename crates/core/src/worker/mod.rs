//! The background cache manager for one deployed version.
//!
//! [`WorkerLifecycleManager`] drives the [`LifecycleMachine`] and carries out
//! its effects against the partition registry, the fetcher and the connected
//! clients. Once active it routes fetches through the strategy engine.

pub mod clients;
pub mod lifecycle;
pub mod manifest;
pub mod messages;
pub mod names;

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};
use url::Url;

use crate::cache::{CacheEntry, CacheRegistry, PartitionStore};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::http::{Destination, Fetcher, Method, Request, Response};
use crate::revalidate::CACHED_AT_HEADER;
use crate::router::{RouteSpec, Router};
use crate::strategy::{Resolution, ResponseSource, StrategyConfig, StrategyEngine, StrategyKind};
use crate::Error;

pub use clients::{ClientHub, ClientId};
pub use lifecycle::{Effect, LifecycleMachine, WorkerState};
pub use messages::Message;
pub use names::CacheNames;

/// Max age for precached shell resources and cached images.
pub const YEAR_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Deployment-specific inputs of the worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub app_name: String,
    pub version: String,
    pub origin: Url,
    pub manifest_path: String,
    pub offline_document: String,
    pub fallback_asset: String,
    pub auth_origin: Option<Url>,
    pub image_path_prefix: String,
    pub skip_waiting: bool,
    pub routes: Vec<RouteSpec>,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let parse = |value: &str| Url::parse(value).map_err(|e| Error::InvalidUrl(format!("{value}: {e}")));
        Ok(Self {
            app_name: config.app_name.clone(),
            version: config.version.clone(),
            origin: parse(&config.origin)?,
            manifest_path: config.manifest_path.clone(),
            offline_document: config.offline_document.clone(),
            fallback_asset: config.fallback_asset.clone(),
            auth_origin: config.auth_origin.as_deref().map(parse).transpose()?,
            image_path_prefix: config.image_path_prefix.clone(),
            skip_waiting: config.skip_waiting,
            routes: config.routes.clone(),
        })
    }

    fn resolve(&self, path: &str) -> Result<Url, Error> {
        self.origin
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
    }
}

/// How a fetch event was answered.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Sent straight to the network, nothing cached.
    Passthrough(Response),
    Handled(Resolution),
}

impl FetchOutcome {
    pub fn response(&self) -> &Response {
        match self {
            FetchOutcome::Passthrough(response) => response,
            FetchOutcome::Handled(resolution) => &resolution.response,
        }
    }

    pub fn source_label(&self) -> &'static str {
        match self {
            FetchOutcome::Passthrough(_) => "passthrough",
            FetchOutcome::Handled(resolution) => match resolution.source {
                ResponseSource::Cache => "cache",
                ResponseSource::Network => "network",
                ResponseSource::CacheFallback => "cache-fallback",
                ResponseSource::OfflineFallback => "offline-fallback",
            },
        }
    }
}

pub struct WorkerLifecycleManager {
    settings: WorkerSettings,
    names: CacheNames,
    engine: StrategyEngine,
    router: Router,
    clock: Arc<dyn Clock>,
    clients: Arc<ClientHub>,
    machine: Mutex<LifecycleMachine>,
}

impl std::fmt::Debug for WorkerLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLifecycleManager")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl WorkerLifecycleManager {
    /// Build a worker over `store`, which may be shared with older versions.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if a route pattern does not compile.
    pub fn new(
        settings: WorkerSettings, store: Arc<dyn PartitionStore>, fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>,
        clients: Arc<ClientHub>,
    ) -> Result<Self, Error> {
        let names = CacheNames::new(&settings.app_name, &settings.version);
        let registry = CacheRegistry::new(store, settings.app_name.clone());

        let rules = settings
            .routes
            .iter()
            .map(|spec| spec.compile(|suffix| names.qualify(suffix)))
            .collect::<Result<Vec<_>, _>>()?;
        let router = Router::new(rules).with_default(StrategyConfig::new(
            StrategyKind::NetworkFirst,
            0,
            names.dynamic_partition(),
        ));

        let machine = LifecycleMachine::new(names.clone(), settings.version.clone(), settings.skip_waiting);
        Ok(Self {
            engine: StrategyEngine::new(registry, fetcher, clock.clone()),
            settings,
            names,
            router,
            clock,
            clients,
            machine: Mutex::new(machine),
        })
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn version(&self) -> &str {
        &self.settings.version
    }

    pub fn registry(&self) -> &CacheRegistry {
        self.engine.registry()
    }

    pub fn clients(&self) -> &Arc<ClientHub> {
        &self.clients
    }

    pub async fn state(&self) -> WorkerState {
        self.machine.lock().await.state()
    }

    /// Install this version: precache the shell, then activate when
    /// skip-waiting is enabled.
    ///
    /// # Errors
    ///
    /// A storage failure while precaching makes the worker redundant and is
    /// returned. Manifest and per-resource fetch failures are not errors.
    pub async fn install(&self) -> Result<(), Error> {
        let effects = self.machine.lock().await.install()?;
        self.run(effects, None).await
    }

    /// Deliver a client message. Replies go to `reply` when given.
    pub async fn post_message(&self, message: Message, reply: Option<oneshot::Sender<Message>>) -> Result<(), Error> {
        let effects = self.machine.lock().await.handle_message(&message)?;
        self.run(effects, reply).await
    }

    /// The previous worker lost its last client.
    pub async fn clients_released(&self) -> Result<(), Error> {
        let effects = self.machine.lock().await.clients_released();
        self.run(effects, None).await
    }

    pub async fn supersede(&self) {
        self.machine.lock().await.supersede();
    }

    async fn run(&self, effects: Vec<Effect>, mut reply: Option<oneshot::Sender<Message>>) -> Result<(), Error> {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Precache { partition } => match self.precache(&partition).await {
                    Ok(stored) => {
                        tracing::info!(%partition, stored, "precache complete");
                        queue.extend(self.machine.lock().await.install_complete()?);
                    }
                    Err(err) => {
                        tracing::warn!(%partition, phase = "install", error = %err, "install failed");
                        self.machine.lock().await.fail();
                        return Err(err);
                    }
                },
                Effect::Activate => queue.extend(self.machine.lock().await.activate()?),
                Effect::DeleteStalePartitions { keep } => match self.registry().delete_stale_partitions(&keep).await {
                    Ok(deleted) => tracing::info!(?deleted, "deleted stale partitions"),
                    Err(err) => tracing::warn!(phase = "activate", error = %err, "stale partition cleanup failed"),
                },
                Effect::ClaimClients { version } => {
                    let claimed = self.clients.claim(&version).await;
                    tracing::debug!(claimed, "claimed clients");
                }
                Effect::Broadcast(message) => {
                    self.clients.broadcast(&message).await;
                }
                Effect::Reply(message) => match reply.take() {
                    Some(sender) => {
                        if sender.send(message).is_err() {
                            tracing::debug!("reply channel closed before answer");
                        }
                    }
                    None => tracing::debug!(?message, "no reply channel, dropping answer"),
                },
                Effect::CompleteActivation => self.machine.lock().await.activation_complete()?,
            }
        }
        Ok(())
    }

    /// Write the precache list into `partition`, returning how many stored.
    async fn precache(&self, partition: &str) -> Result<usize, Error> {
        let partition = self.registry().open(partition).await?;
        let manifest_url = self.settings.resolve(&self.settings.manifest_path)?;
        let paths = manifest::derive_precache(self.engine.fetcher().as_ref(), &manifest_url, &self.settings.fallback_asset).await;

        let mut stored = 0;
        for path in paths {
            let request = Request::get(self.settings.resolve(&path)?);
            let response = match self.engine.fetch_network(&request).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(key = %request.cache_key(), phase = "precache", error = %err, "skipping precache resource");
                    continue;
                }
            };

            let now = self.clock.now_ms();
            let etag = response.etag().map(str::to_string);
            let stamped = response.with_header(CACHED_AT_HEADER, now.to_string());
            partition
                .put(CacheEntry::new(request.cache_key(), stamped, now, YEAR_MS).with_etag(etag))
                .await?;
            stored += 1;
        }
        Ok(stored)
    }

    fn passes_through(&self, request: &Request) -> bool {
        if request.method != Method::Get {
            return true;
        }
        self.settings
            .auth_origin
            .as_ref()
            .is_some_and(|auth| auth.origin() == request.url.origin())
    }

    fn is_image(&self, request: &Request) -> bool {
        request.destination == Destination::Image || request.url.path().starts_with(&self.settings.image_path_prefix)
    }

    /// Answer one fetch event.
    ///
    /// Until the worker is active every request goes straight to the network.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        if self.state().await != WorkerState::Active || self.passes_through(request) {
            tracing::debug!(url = %request.url, method = %request.method, "passing request through");
            return self.engine.fetcher().fetch(request).await.map(FetchOutcome::Passthrough);
        }

        if request.is_navigation() {
            return self.navigate(request).await.map(FetchOutcome::Handled);
        }

        let resolution = if self.is_image(request) {
            let config = StrategyConfig::new(StrategyKind::CacheFirst, YEAR_MS, self.names.static_partition());
            self.engine.resolve(request, &config).await?
        } else {
            self.engine.resolve(request, self.router.classify(request)).await?
        };
        Ok(FetchOutcome::Handled(resolution))
    }

    /// Network for page loads, offline document from the static partition
    /// when the network is unreachable.
    async fn navigate(&self, request: &Request) -> Result<Resolution, Error> {
        let err = match self.engine.fetcher().fetch(request).await {
            Ok(response) => return Ok(Resolution::new(response, ResponseSource::Network)),
            Err(err) => err,
        };

        let offline_key = self.settings.resolve(&self.settings.offline_document)?.to_string();
        match self.registry().match_entry(&self.names.static_partition(), &offline_key).await {
            Ok(Some(entry)) => {
                tracing::debug!(url = %request.url, error = %err, "navigation failed, serving offline document");
                Ok(Resolution::new(entry.value, ResponseSource::OfflineFallback))
            }
            Ok(None) => Err(err),
            Err(storage) => {
                tracing::warn!(key = %offline_key, phase = "offline-fallback", error = %storage, "offline document unreadable");
                Err(err)
            }
        }
    }
}
