//! Fragment aggregation and forward orchestration
//!
//! The Bridge is the single owner of the record store. It consumes parsed
//! fragments one at a time from the channel, applies each to the matching
//! record, and evaluates completeness exactly once per write. On
//! completeness it awaits one forward attempt inline, so a record's reset
//! can never race its own forward and a given fill triggers at most one
//! attempt. Only a confirmed 2xx clears the transient fields; any failure
//! leaves the record intact for the next cycle to retry naturally.

use crate::domain::types::Fragment;
use crate::infra::metrics::Metrics;
use crate::io::forwarder::{ForwardOutcome, RecordSink};
use crate::services::store::RecordStore;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct Bridge {
    store: RecordStore,
    sink: Arc<dyn RecordSink>,
    metrics: Arc<Metrics>,
}

impl Bridge {
    pub fn new(sink: Arc<dyn RecordSink>, metrics: Arc<Metrics>) -> Self {
        Self { store: RecordStore::new(), sink, metrics }
    }

    /// Consume fragments until the channel closes
    pub async fn run(&mut self, mut fragment_rx: mpsc::Receiver<Fragment>) {
        while let Some(fragment) = fragment_rx.recv().await {
            self.process_fragment(fragment).await;
        }
    }

    /// Apply one fragment and, if it completed the record, forward it
    ///
    /// Returns the outcome of the forward attempt this fragment triggered,
    /// if any.
    pub async fn process_fragment(&mut self, fragment: Fragment) -> Option<ForwardOutcome> {
        let space_id = fragment.space_id.clone();

        let record = self.store.entry(&space_id);
        record.apply(fragment.value);
        debug!(
            id = %space_id,
            status = %record.status,
            distance = ?record.distance_cm,
            noise = ?record.noise_level_raw,
            "fragment_applied"
        );

        if !record.ready_to_forward() {
            return None;
        }

        record.begin_forward();
        let snapshot = record.clone();

        info!(id = %space_id, "record_complete");
        let start = Instant::now();
        let outcome = self.sink.forward(&snapshot).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            ForwardOutcome::Accepted { .. } => self.metrics.record_forward_ok(latency_ms),
            ForwardOutcome::Rejected { .. } => self.metrics.record_forward_rejected(latency_ms),
            ForwardOutcome::Unreachable { .. } | ForwardOutcome::Internal { .. } => {
                self.metrics.record_forward_failed(latency_ms)
            }
        }

        // The record still exists: the store never deletes entries
        if let Some(record) = self.store.get_mut(&space_id) {
            record.finish_forward(outcome.is_success());
        }

        Some(outcome)
    }

    /// Number of spaces currently tracked
    pub fn tracked_spaces(&self) -> usize {
        self.store.len()
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &RecordStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::SpaceRecord;
    use crate::domain::types::{FragmentValue, SpaceId, SpaceStatus};
    use crate::io::forwarder::ForwardPayload;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Sink that records every payload it is asked to deliver and replies
    /// with a queue of scripted outcomes (last one repeats)
    struct MockSink {
        forwarded: Mutex<Vec<ForwardPayload>>,
        outcomes: Mutex<Vec<ForwardOutcome>>,
    }

    impl MockSink {
        fn accepting() -> Self {
            Self::with_outcomes(vec![ForwardOutcome::Accepted {
                status: 200,
                body: "{\"success\":true}".to_string(),
            }])
        }

        fn with_outcomes(outcomes: Vec<ForwardOutcome>) -> Self {
            Self { forwarded: Mutex::new(Vec::new()), outcomes: Mutex::new(outcomes) }
        }

        fn forwarded(&self) -> Vec<ForwardPayload> {
            self.forwarded.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RecordSink for MockSink {
        async fn forward(&self, record: &SpaceRecord) -> ForwardOutcome {
            self.forwarded
                .lock()
                .unwrap()
                .push(ForwardPayload::from_record(record).expect("complete record"));
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.len() > 1 {
                outcomes.remove(0)
            } else {
                outcomes[0].clone()
            }
        }
    }

    fn bridge_with(sink: Arc<MockSink>) -> Bridge {
        Bridge::new(sink, Arc::new(Metrics::new()))
    }

    fn distance(id: &str, cm: f64) -> Fragment {
        Fragment { space_id: SpaceId::from(id), value: FragmentValue::Distance(cm) }
    }

    fn noise(id: &str, raw: f64) -> Fragment {
        Fragment { space_id: SpaceId::from(id), value: FragmentValue::Noise(raw) }
    }

    fn status(id: &str, s: &str) -> Fragment {
        Fragment { space_id: SpaceId::from(id), value: FragmentValue::Status(s.parse().unwrap()) }
    }

    #[tokio::test]
    async fn test_third_fragment_triggers_exactly_one_forward() {
        // Scenario A
        let sink = Arc::new(MockSink::accepting());
        let mut bridge = bridge_with(sink.clone());

        assert!(bridge.process_fragment(distance("V1", 50.0)).await.is_none());
        assert!(bridge.process_fragment(noise("V1", 10.0)).await.is_none());
        let outcome = bridge.process_fragment(status("V1", "livre")).await.unwrap();
        assert!(outcome.is_success());

        let forwarded = sink.forwarded();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(
            forwarded[0],
            ForwardPayload {
                id: "V1".to_string(),
                status: "livre".to_string(),
                distancia_cm: 50.0,
                nivel_ruido_raw: 10.0,
            }
        );
    }

    #[tokio::test]
    async fn test_reset_after_success_keeps_status() {
        // Scenario B
        let sink = Arc::new(MockSink::accepting());
        let mut bridge = bridge_with(sink.clone());

        bridge.process_fragment(distance("V1", 50.0)).await;
        bridge.process_fragment(noise("V1", 10.0)).await;
        bridge.process_fragment(status("V1", "livre")).await;

        // A lone distance after the reset must not forward again
        assert!(bridge.process_fragment(distance("V1", 48.0)).await.is_none());
        assert_eq!(sink.forwarded().len(), 1);

        let record = bridge.store().get(&SpaceId::from("V1")).unwrap();
        assert_eq!(record.status, SpaceStatus::Free);
        assert_eq!(record.distance_cm, Some(48.0));
        assert_eq!(record.noise_level_raw, None);
        assert!(!record.is_complete());
    }

    #[tokio::test]
    async fn test_rejection_preserves_record() {
        // Scenario D
        let sink = Arc::new(MockSink::with_outcomes(vec![ForwardOutcome::Rejected {
            status: 500,
            body: "storage error".to_string(),
        }]));
        let mut bridge = bridge_with(sink.clone());

        bridge.process_fragment(distance("V1", 50.0)).await;
        bridge.process_fragment(noise("V1", 10.0)).await;
        let outcome = bridge.process_fragment(status("V1", "livre")).await.unwrap();
        assert_eq!(outcome, ForwardOutcome::Rejected { status: 500, body: "storage error".to_string() });

        // Not reset: transient fields keep their pre-forward values
        let record = bridge.store().get(&SpaceId::from("V1")).unwrap();
        assert_eq!(record.distance_cm, Some(50.0));
        assert_eq!(record.noise_level_raw, Some(10.0));
        assert_eq!(record.status, SpaceStatus::Free);
    }

    #[tokio::test]
    async fn test_transport_failure_then_next_fragment_retries() {
        let sink = Arc::new(MockSink::with_outcomes(vec![
            ForwardOutcome::Unreachable { error: "connect refused".to_string() },
            ForwardOutcome::Accepted { status: 200, body: String::new() },
        ]));
        let mut bridge = bridge_with(sink.clone());

        bridge.process_fragment(distance("V1", 50.0)).await;
        bridge.process_fragment(noise("V1", 10.0)).await;
        let first = bridge.process_fragment(status("V1", "livre")).await.unwrap();
        assert!(!first.is_success());

        // Next cycle's fresh distance re-completes the record and retries
        let second = bridge.process_fragment(distance("V1", 49.0)).await.unwrap();
        assert!(second.is_success());

        let forwarded = sink.forwarded();
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded[1].distancia_cm, 49.0);
        assert_eq!(forwarded[1].nivel_ruido_raw, 10.0);

        // Success reset the transients this time
        let record = bridge.store().get(&SpaceId::from("V1")).unwrap();
        assert_eq!(record.distance_cm, None);
        assert_eq!(record.noise_level_raw, None);
    }

    #[tokio::test]
    async fn test_interleaved_devices_are_independent() {
        let sink = Arc::new(MockSink::accepting());
        let mut bridge = bridge_with(sink.clone());

        bridge.process_fragment(distance("V1", 50.0)).await;
        bridge.process_fragment(distance("V2", 7.0)).await;
        bridge.process_fragment(noise("V2", 180.0)).await;
        bridge.process_fragment(noise("V1", 10.0)).await;
        bridge.process_fragment(status("V2", "OCUPADA")).await;
        bridge.process_fragment(status("V1", "livre")).await;

        let forwarded = sink.forwarded();
        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded[0].id, "V2");
        assert_eq!(forwarded[0].status, "ocupada");
        assert_eq!(forwarded[1].id, "V1");
        assert_eq!(forwarded[1].status, "livre");
        assert_eq!(bridge.tracked_spaces(), 2);
    }

    #[tokio::test]
    async fn test_last_write_wins_before_completion() {
        let sink = Arc::new(MockSink::accepting());
        let mut bridge = bridge_with(sink.clone());

        bridge.process_fragment(distance("V1", 50.0)).await;
        bridge.process_fragment(distance("V1", 42.0)).await;
        bridge.process_fragment(noise("V1", 10.0)).await;
        bridge.process_fragment(status("V1", "livre")).await;

        let forwarded = sink.forwarded();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].distancia_cm, 42.0);
    }

    #[tokio::test]
    async fn test_status_alone_never_forwards() {
        let sink = Arc::new(MockSink::accepting());
        let mut bridge = bridge_with(sink.clone());

        bridge.process_fragment(status("V1", "livre")).await;
        bridge.process_fragment(status("V1", "OCUPADA")).await;
        assert!(sink.forwarded().is_empty());

        // Status persisted even though nothing forwarded
        let record = bridge.store().get(&SpaceId::from("V1")).unwrap();
        assert_eq!(record.status, SpaceStatus::Occupied);
    }

    #[tokio::test]
    async fn test_channel_run_loop_processes_until_close() {
        let sink = Arc::new(MockSink::accepting());
        let mut bridge = bridge_with(sink.clone());
        let (tx, rx) = mpsc::channel(16);

        tx.send(distance("V1", 50.0)).await.unwrap();
        tx.send(noise("V1", 10.0)).await.unwrap();
        tx.send(status("V1", "livre")).await.unwrap();
        drop(tx);

        bridge.run(rx).await;
        assert_eq!(sink.forwarded().len(), 1);
    }
}
