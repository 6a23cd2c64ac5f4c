//! HTTP forwarder for completed records
//!
//! Serializes a merged record as JSON and POSTs it to the upstream
//! ingestion endpoint. Any 2xx response is success; the response body is
//! opaque and only carried for diagnostics. Failures are classified but
//! never retried here - the bridge leaves the record intact so the next
//! cycle retries naturally.

use crate::domain::record::SpaceRecord;
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Merged record as sent over the upstream boundary
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ForwardPayload {
    pub id: String,
    pub status: String,
    pub distancia_cm: f64,
    pub nivel_ruido_raw: f64,
}

impl ForwardPayload {
    /// Build the wire payload from a record snapshot
    ///
    /// Returns `None` if the record is not actually complete; the bridge
    /// only calls this after the completeness check, so `None` here is an
    /// internal fault, not a wire condition.
    pub fn from_record(record: &SpaceRecord) -> Option<Self> {
        if !record.is_complete() {
            return None;
        }
        Some(Self {
            id: record.id.as_str().to_string(),
            status: record.status.as_str().to_string(),
            distancia_cm: record.distance_cm?,
            nivel_ruido_raw: record.noise_level_raw?,
        })
    }
}

/// Result of one forward attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    /// Upstream acknowledged with a 2xx status
    Accepted { status: u16, body: String },
    /// Upstream reachable but refused the record (non-2xx)
    Rejected { status: u16, body: String },
    /// Upstream unreachable, or the request timed out
    Unreachable { error: String },
    /// Local fault building the request; isolated to this attempt
    Internal { error: String },
}

impl ForwardOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ForwardOutcome::Accepted { .. })
    }
}

/// Delivery seam for completed records, mockable in tests
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn forward(&self, record: &SpaceRecord) -> ForwardOutcome;
}

/// Forwards records to the configured HTTP endpoint
pub struct HttpForwarder {
    client: reqwest::Client,
    url: String,
}

impl HttpForwarder {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        // One client for the process lifetime (connection pooling)
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.to_string() })
    }
}

#[async_trait]
impl RecordSink for HttpForwarder {
    async fn forward(&self, record: &SpaceRecord) -> ForwardOutcome {
        let start = Instant::now();

        let Some(payload) = ForwardPayload::from_record(record) else {
            error!(id = %record.id, "forward_incomplete_record");
            return ForwardOutcome::Internal {
                error: "record incomplete at forward time".to_string(),
            };
        };

        let response = self.client.post(&self.url).json(&payload).send().await;

        match response {
            Ok(response) => {
                let status = response.status();
                let latency_ms = start.elapsed().as_millis() as u64;
                let body = response.text().await.unwrap_or_default();

                if status.is_success() {
                    info!(
                        id = %payload.id,
                        status = %status.as_u16(),
                        latency_ms = %latency_ms,
                        body = %body,
                        "forward_accepted"
                    );
                    ForwardOutcome::Accepted { status: status.as_u16(), body }
                } else {
                    error!(
                        id = %payload.id,
                        status = %status.as_u16(),
                        latency_ms = %latency_ms,
                        body = %body,
                        "forward_rejected"
                    );
                    ForwardOutcome::Rejected { status: status.as_u16(), body }
                }
            }
            Err(e) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                if e.is_timeout() {
                    warn!(id = %payload.id, latency_ms = %latency_ms, "forward_timeout");
                } else {
                    error!(id = %payload.id, error = %e, "forward_transport_error");
                }
                ForwardOutcome::Unreachable { error: e.to_string() }
            }
        }
    }
}
