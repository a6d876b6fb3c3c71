use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::test_utils::{response, test_context_with, test_settings};
use crate::{
    error::{PollsError, SyncError},
    models::response::{PollResponse, ResponseContext},
    repositories::kv_store::MemoryKvStore,
    services::{
        sync::{ResponseSink, SyncDispatcher},
        voting::VoteService,
    },
};

struct RecordingSink {
    name: String,
    delivered: mpsc::UnboundedSender<PollResponse>,
}

#[async_trait]
impl ResponseSink for RecordingSink {
    fn channel(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, response: &PollResponse) -> Result<(), SyncError> {
        let _ = self.delivered.send(response.clone());
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl ResponseSink for FailingSink {
    fn channel(&self) -> &str {
        "broken"
    }

    async fn deliver(&self, _response: &PollResponse) -> Result<(), SyncError> {
        Err(SyncError::Status(500))
    }
}

fn recording(name: &str) -> (Arc<dyn ResponseSink>, mpsc::UnboundedReceiver<PollResponse>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = RecordingSink {
        name: name.to_string(),
        delivered: tx,
    };
    (Arc::new(sink), rx)
}

#[tokio::test]
async fn one_failing_channel_does_not_block_the_others() {
    let (first, mut first_rx) = recording("sheet");
    let (second, mut second_rx) = recording("backup");
    let dispatcher = SyncDispatcher::new(vec![first, Arc::new(FailingSink), second]);

    let report = dispatcher.dispatch(&response("p1", "A", "s1")).await;

    assert_eq!(report.delivered, vec!["sheet", "backup"]);
    assert_eq!(report.failed, vec!["broken"]);
    assert_eq!(first_rx.recv().await.unwrap().selected_option, "A");
    assert_eq!(second_rx.recv().await.unwrap().poll_id, "p1");
}

#[tokio::test]
async fn no_channels_means_nothing_to_report() {
    let dispatcher = SyncDispatcher::default();

    let report = dispatcher.dispatch(&response("p1", "A", "s1")).await;

    assert!(report.delivered.is_empty());
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn recorded_response_is_forwarded_after_the_local_append() {
    let (sink, mut rx) = recording("sheet");
    let ctx = test_context_with(
        test_settings(),
        Arc::new(MemoryKvStore::new()),
        vec![sink, Arc::new(FailingSink)],
    );

    VoteService::new(&ctx)
        .record_response("p1", "B", "s1", ResponseContext::default())
        .await
        .unwrap();

    assert_eq!(ctx.store.read().await.responses().len(), 1);
    let forwarded = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("delivery within timeout")
        .unwrap();
    assert_eq!(forwarded.selected_option, "B");
    assert_eq!(forwarded.session_id, "s1");
}

#[tokio::test]
async fn invalid_vote_is_neither_stored_nor_forwarded() {
    let (sink, mut rx) = recording("sheet");
    let ctx = test_context_with(test_settings(), Arc::new(MemoryKvStore::new()), vec![sink]);
    let votes = VoteService::new(&ctx);

    let bad_option = votes
        .record_response("p1", "C", "s1", ResponseContext::default())
        .await;
    let bad_poll = votes
        .record_response("nope", "A", "s1", ResponseContext::default())
        .await;

    assert!(matches!(bad_option, Err(PollsError::InvalidVote(_))));
    assert!(matches!(bad_poll, Err(PollsError::InvalidVote(_))));
    assert!(ctx.store.read().await.responses().is_empty());
    assert!(rx.try_recv().is_err());
}

#[test]
fn records_use_the_collector_shape() {
    let mut record = response("p1", "A", "s1");
    record.context.latitude = Some(27.7);

    let json = serde_json::to_value(&record).unwrap();

    assert_eq!(json["pollId"], "p1");
    assert_eq!(json["response"], "A");
    assert_eq!(json["sessionId"], "s1");
    assert_eq!(json["userCountry"], "Nepal");
    assert_eq!(json["latitude"], 27.7);
}

#[test]
fn collector_rows_accept_loose_coordinates() {
    let row = serde_json::json!({
        "pollId": "p1",
        "response": "A",
        "question": "Question for p1?",
        "category": "Governance",
        "timestamp": "2025-10-01T12:00:00Z",
        "sessionId": "session_1_abc",
        "userCountry": "Nepal",
        "latitude": "27.7172",
        "longitude": "unknown"
    });

    let record: PollResponse = serde_json::from_value(row).unwrap();

    assert_eq!(record.context.latitude, Some(27.7172));
    assert_eq!(record.context.longitude, None);
    assert_eq!(record.country(), "Nepal");
}
