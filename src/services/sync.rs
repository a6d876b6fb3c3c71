use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    error::SyncError,
    models::{response::PollResponse, stats::GlobalStats},
};

/// A remote channel that receives each new response once.
///
/// Delivery is best effort: no retry, no queue, no backpressure. Callers log
/// failures and move on; the local store remains the record of truth.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    fn channel(&self) -> &str;

    async fn deliver(&self, response: &PollResponse) -> Result<(), SyncError>;
}

/// POSTs the response as JSON to a webhook URL.
pub struct WebhookSink {
    url: String,
    client: Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl ResponseSink for WebhookSink {
    fn channel(&self) -> &str {
        &self.url
    }

    async fn deliver(&self, response: &PollResponse) -> Result<(), SyncError> {
        let res = self.client.post(&self.url).json(response).send().await?;
        if !res.status().is_success() {
            return Err(SyncError::Status(res.status().as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

/// Fans one response out to every configured channel.
#[derive(Clone, Default)]
pub struct SyncDispatcher {
    sinks: Vec<Arc<dyn ResponseSink>>,
}

impl SyncDispatcher {
    pub fn new(sinks: Vec<Arc<dyn ResponseSink>>) -> Self {
        Self { sinks }
    }

    /// One attempt per channel, all in flight together. A failing channel never
    /// affects the others.
    pub async fn dispatch(&self, response: &PollResponse) -> DeliveryReport {
        let attempts = self.sinks.iter().map(|sink| async move {
            let outcome = sink.deliver(response).await;
            (sink.channel().to_string(), outcome)
        });

        let mut report = DeliveryReport {
            delivered: Vec::new(),
            failed: Vec::new(),
        };
        for (channel, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => {
                    debug!(%channel, poll_id = %response.poll_id, "response delivered");
                    report.delivered.push(channel);
                }
                Err(e) => {
                    let failure = SyncError::RemoteDeliveryFailure {
                        channel: channel.clone(),
                        reason: e.to_string(),
                    };
                    warn!(error = %failure, poll_id = %response.poll_id, "kept locally only");
                    report.failed.push(channel);
                }
            }
        }
        report
    }

    /// Fire-and-forget: the caller never waits for the remote side.
    pub fn spawn_dispatch(&self, response: PollResponse) {
        if self.sinks.is_empty() {
            return;
        }
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.dispatch(&response).await;
        });
    }
}

/// Reads back from the spreadsheet-backed collector.
pub struct CollectorClient {
    url: String,
    client: Client,
}

impl CollectorClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    async fn get_json(&self, query: &str) -> Result<Value, SyncError> {
        let res = self
            .client
            .get(&self.url)
            .query(&[(query, "1")])
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(SyncError::Status(res.status().as_u16()));
        }
        Ok(res.json::<Value>().await?)
    }

    /// Raw records; rows that do not fit the response schema are skipped.
    pub async fn fetch_raw(&self) -> Result<Vec<PollResponse>, SyncError> {
        let rows = match self.get_json("rawdata").await? {
            Value::Array(rows) => rows,
            other => {
                return Err(SyncError::RemoteDeliveryFailure {
                    channel: self.url.clone(),
                    reason: format!("expected an array of records, got {other}"),
                })
            }
        };
        let total = rows.len();
        let records: Vec<PollResponse> = rows
            .into_iter()
            .filter_map(|row| serde_json::from_value(row).ok())
            .collect();
        if records.len() < total {
            debug!(skipped = total - records.len(), "ignored malformed collector rows");
        }
        info!(records = records.len(), "fetched raw records from collector");
        Ok(records)
    }

    pub async fn fetch_stats(&self) -> Result<GlobalStats, SyncError> {
        let body = self.get_json("stats").await?;
        serde_json::from_value(body).map_err(|e| SyncError::RemoteDeliveryFailure {
            channel: self.url.clone(),
            reason: e.to_string(),
        })
    }
}
