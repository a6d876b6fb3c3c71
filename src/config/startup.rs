use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio::{
    sync::{broadcast::error::RecvError, watch, Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    config::settings::Settings,
    models::{poll::PollCatalog, stats::StatsSnapshot},
    repositories::{
        kv_store::{FileKvStore, KeyValueStore},
        lifecycle_repository::LifecycleRepository,
        response_repository::ResponseStore,
    },
    services::{
        geolocation::{IpGeolocationProvider, LocationProvider},
        identity::load_or_create_installation_id,
        lifecycle::LifecycleManager,
        stats::StatsService,
        sync::{CollectorClient, ResponseSink, SyncDispatcher, WebhookSink},
    },
};

/// Everything the handlers share. Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub catalog: Arc<PollCatalog>,
    pub kv: Arc<dyn KeyValueStore>,
    pub store: Arc<RwLock<ResponseStore>>,
    pub lifecycle: Arc<Mutex<LifecycleManager>>,
    pub sync: SyncDispatcher,
    pub collector: Option<Arc<CollectorClient>>,
    pub locator: Option<Arc<dyn LocationProvider>>,
    pub stats: Arc<RwLock<StatsSnapshot>>,
    pub refresh: Arc<watch::Sender<u64>>,
    pub installation_id: Arc<str>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

pub struct ContextParts {
    pub settings: Settings,
    pub catalog: PollCatalog,
    pub kv: Arc<dyn KeyValueStore>,
    pub sinks: Vec<Arc<dyn ResponseSink>>,
    pub collector: Option<CollectorClient>,
    pub locator: Option<Arc<dyn LocationProvider>>,
}

impl AppContext {
    /// Builds the production context from settings: file store, webhooks, IP lookup.
    pub async fn init(settings: Settings) -> anyhow::Result<Self> {
        let catalog = PollCatalog::load(&settings.poll_catalog)?;
        let kv: Arc<dyn KeyValueStore> = Arc::new(
            FileKvStore::open(&settings.data_dir)
                .with_context(|| format!("opening {}", settings.data_dir.display()))?,
        );

        let mut sinks: Vec<Arc<dyn ResponseSink>> = Vec::new();
        for url in &settings.webhook_urls {
            sinks.push(Arc::new(WebhookSink::new(url, settings.remote_timeout)?));
        }
        let collector = settings
            .collector_url
            .as_ref()
            .map(|url| CollectorClient::new(url, settings.remote_timeout))
            .transpose()?;
        let locator: Option<Arc<dyn LocationProvider>> = if settings.geo_lookup {
            Some(Arc::new(IpGeolocationProvider::new(settings.remote_timeout)?))
        } else {
            None
        };

        let ctx = Self::from_parts(ContextParts {
            settings,
            catalog,
            kv,
            sinks,
            collector,
            locator,
        });
        ctx.start_background_tasks().await;
        Ok(ctx)
    }

    pub fn from_parts(parts: ContextParts) -> Self {
        let ContextParts {
            settings,
            catalog,
            kv,
            sinks,
            collector,
            locator,
        } = parts;

        let installation_id = load_or_create_installation_id(kv.as_ref());
        let store = ResponseStore::load(kv.clone(), catalog.demographics().clone());
        let lifecycle = LifecycleManager::new(
            LifecycleRepository::new(kv.clone()),
            settings.ended_policy,
        );
        let stats = StatsService::local_snapshot(store.responses(), Utc::now());
        let (refresh, _) = watch::channel(0u64);

        info!(
            polls = catalog.polls().len(),
            channels = sinks.len(),
            %installation_id,
            "application context ready"
        );

        Self {
            settings: Arc::new(settings),
            catalog: Arc::new(catalog),
            kv,
            store: Arc::new(RwLock::new(store)),
            lifecycle: Arc::new(Mutex::new(lifecycle)),
            sync: SyncDispatcher::new(sinks),
            collector: collector.map(Arc::new),
            locator,
            stats: Arc::new(RwLock::new(stats)),
            refresh: Arc::new(refresh),
            installation_id: installation_id.into(),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Wakes every live results stream.
    pub fn notify_refresh(&self) {
        self.refresh.send_modify(|revision| *revision += 1);
    }

    pub async fn start_background_tasks(&self) {
        let mut tasks = self.tasks.lock().await;

        let mut events = self.lifecycle.lock().await.subscribe();
        let ctx = self.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        debug!(poll_id = %event.poll_id, status = %event.status, "status refresh");
                        ctx.notify_refresh();
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "status refresh lagged");
                        ctx.notify_refresh();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));

        if self.collector.is_some() {
            let ctx = self.clone();
            let period = self.settings.stats_refresh;
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                loop {
                    ticker.tick().await;
                    StatsService::new(&ctx).refresh().await;
                }
            }));
        }
    }

    /// Stops background work and flushes the stats cache.
    pub async fn shutdown(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        StatsService::new(self).save_cache().await;
        info!("application context shut down");
    }
}
