use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::{
    config::startup::AppContext,
    models::{
        aggregate::FilterSet,
        response::PollResponse,
        stats::{
            CompleteExport, CountryCount, ExportMetadata, FilteredExport, PollStatistics,
            StatsCache, StatsSnapshot, StatsSource, StatsTotals, VoterPin,
        },
    },
    repositories::kv_store::{save_json, STATS_KEY},
    services::aggregator::Aggregator,
};

const UNKNOWN_COUNTRY: &str = "Unknown";

pub struct StatsService<'a> {
    ctx: &'a AppContext,
}

impl<'a> StatsService<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    pub fn local_snapshot(responses: &[PollResponse], now: DateTime<Utc>) -> StatsSnapshot {
        StatsSnapshot {
            source: StatsSource::Local,
            totals: local_totals(responses),
            responses: responses.len() as u64,
            voters: local_voters(responses),
            last_updated: now,
        }
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        self.ctx.stats.read().await.clone()
    }

    pub async fn voters(&self) -> Vec<VoterPin> {
        self.ctx.stats.read().await.voters.clone()
    }

    /// Pulls the collector's totals. Local figures only stand in until the
    /// first global snapshot arrives.
    pub async fn refresh(&self) {
        let Some(collector) = self.ctx.collector.as_ref() else {
            self.refresh_local().await;
            return;
        };

        match collector.fetch_stats().await {
            Ok(global) => {
                let snapshot = StatsSnapshot {
                    source: StatsSource::Global,
                    responses: global.totals.polls_completed,
                    totals: global.totals,
                    voters: global.voters,
                    last_updated: Utc::now(),
                };
                info!(
                    visitors = snapshot.totals.visitors,
                    countries = snapshot.totals.countries,
                    "global stats refreshed"
                );
                *self.ctx.stats.write().await = snapshot;
            }
            Err(e) => {
                warn!(error = %e, "global stats unavailable");
                self.refresh_local().await;
            }
        }
    }

    /// Recomputes local stats after a vote and persists the cache. A global
    /// snapshot, once loaded, is never replaced by local numbers.
    pub async fn refresh_local(&self) {
        let snapshot = {
            let store = self.ctx.store.read().await;
            Self::local_snapshot(store.responses(), Utc::now())
        };
        {
            let mut current = self.ctx.stats.write().await;
            if current.source == StatsSource::Local {
                *current = snapshot;
            } else {
                debug!("keeping global stats snapshot");
            }
        }
        self.save_cache().await;
    }

    pub async fn cache(&self) -> StatsCache {
        let store = self.ctx.store.read().await;
        local_cache(store.responses(), &self.ctx.installation_id, Utc::now())
    }

    pub async fn save_cache(&self) {
        let cache = self.cache().await;
        if let Err(e) = save_json(self.ctx.kv.as_ref(), STATS_KEY, &cache) {
            error!(error = %e, "could not persist stats cache");
        }
    }

    pub async fn countries(&self, filters: &FilterSet) -> Vec<CountryCount> {
        let store = self.ctx.store.read().await;
        Aggregator::new(&self.ctx.catalog, store.index()).country_histogram(store.responses(), filters)
    }

    pub async fn summary(&self) -> PollStatistics {
        let store = self.ctx.store.read().await;
        Aggregator::new(&self.ctx.catalog, store.index())
            .statistics(store.responses(), store.demographics())
    }

    pub async fn export(&self, filters: FilterSet) -> FilteredExport {
        let store = self.ctx.store.read().await;
        let data: Vec<PollResponse> = Aggregator::new(&self.ctx.catalog, store.index())
            .filter(store.responses(), &filters)
            .into_iter()
            .cloned()
            .collect();

        info!(records = data.len(), filtered = !filters.is_empty(), "exporting responses");
        FilteredExport {
            metadata: ExportMetadata {
                export_date: Utc::now(),
                total_responses: data.len() as u64,
                filters,
                installation_id: self.ctx.installation_id.to_string(),
            },
            data,
        }
    }

    pub async fn complete_export(&self) -> CompleteExport {
        let now = Utc::now();
        let store = self.ctx.store.read().await;
        CompleteExport {
            poll_responses: store.responses().to_vec(),
            demographics: store.demographics().to_vec(),
            live_stats: local_cache(store.responses(), &self.ctx.installation_id, now),
            export_timestamp: now,
            total_responses: store.responses().len() as u64,
        }
    }
}

fn known_countries(responses: &[PollResponse]) -> BTreeSet<&str> {
    responses
        .iter()
        .map(PollResponse::country)
        .filter(|c| *c != UNKNOWN_COUNTRY)
        .collect()
}

fn local_totals(responses: &[PollResponse]) -> StatsTotals {
    let visitors: BTreeSet<&str> = responses.iter().map(|r| r.session_id.as_str()).collect();
    let completed: BTreeSet<(&str, &str)> = responses
        .iter()
        .map(|r| (r.session_id.as_str(), r.poll_id.as_str()))
        .collect();

    StatsTotals {
        visitors: visitors.len() as u64,
        countries: known_countries(responses).len() as u64,
        polls_completed: completed.len() as u64,
    }
}

/// One pin per session, located where its first vote came from.
fn local_voters(responses: &[PollResponse]) -> Vec<VoterPin> {
    let mut pins: Vec<VoterPin> = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for response in responses {
        if let Some(&at) = seen.get(response.session_id.as_str()) {
            if let Some(count) = pins[at].vote_count.as_mut() {
                *count += 1;
            }
            continue;
        }
        seen.insert(response.session_id.as_str(), pins.len());
        let context = &response.context;
        pins.push(VoterPin {
            session_id: response.session_id.clone(),
            country: context.user_country.clone(),
            state: context.user_state.clone(),
            city: context.user_city.clone(),
            latitude: context.latitude,
            longitude: context.longitude,
            first_vote_at: Some(response.timestamp),
            vote_count: Some(1),
        });
    }
    pins
}

fn local_cache(responses: &[PollResponse], installation_id: &str, now: DateTime<Utc>) -> StatsCache {
    let totals = local_totals(responses);
    StatsCache {
        visitors: totals.visitors,
        countries: known_countries(responses)
            .into_iter()
            .map(str::to_string)
            .collect(),
        polls_completed: totals.polls_completed,
        responses: responses.len() as u64,
        last_updated: Some(now),
        installation_id: Some(installation_id.to_string()),
    }
}
