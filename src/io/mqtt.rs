//! MQTT client for receiving sensor fragments
//!
//! Subscribes to the configured wildcard (`garagem/vagas/#`) and turns
//! each publish into at most one `Fragment`. Classification is by topic
//! suffix; unrecognized suffixes and malformed payloads are dropped here
//! so the bridge loop only ever sees well-formed fragments.

use crate::domain::types::{
    DistancePayload, Fragment, FragmentKind, FragmentValue, NoisePayload, SpaceId, SpaceStatus,
    StatusPayload,
};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

/// Classify a topic by its final path segment
///
/// Pure function; the suffix table is fixed by the sensor firmware.
pub fn classify_topic(topic: &str) -> FragmentKind {
    match topic.rsplit('/').next() {
        Some("distancia") => FragmentKind::Distance,
        Some("ruido") => FragmentKind::Noise,
        Some("status") => FragmentKind::Status,
        _ => FragmentKind::Unrecognized,
    }
}

/// Parse one message into a fragment, or `None` if it must be dropped
///
/// Drops are silent for unrecognized suffixes and diagnostic-only for
/// malformed payloads or missing/empty ids; neither is an error the
/// caller needs to handle.
pub fn parse_fragment(topic: &str, payload: &str) -> Option<Fragment> {
    let kind = classify_topic(topic);

    let (id, value) = match kind {
        FragmentKind::Distance => {
            let p: DistancePayload = match serde_json::from_str(payload) {
                Ok(p) => p,
                Err(e) => {
                    debug!(topic = %topic, error = %e, "fragment_parse_failed");
                    return None;
                }
            };
            (p.id, FragmentValue::Distance(p.distancia_cm))
        }
        FragmentKind::Noise => {
            let p: NoisePayload = match serde_json::from_str(payload) {
                Ok(p) => p,
                Err(e) => {
                    debug!(topic = %topic, error = %e, "fragment_parse_failed");
                    return None;
                }
            };
            (p.id, FragmentValue::Noise(p.nivel_ruido_raw))
        }
        FragmentKind::Status => {
            let p: StatusPayload = match serde_json::from_str(payload) {
                Ok(p) => p,
                Err(e) => {
                    debug!(topic = %topic, error = %e, "fragment_parse_failed");
                    return None;
                }
            };
            let status: SpaceStatus = p.status.parse().unwrap_or(SpaceStatus::Unset);
            (p.id, FragmentValue::Status(status))
        }
        FragmentKind::Unrecognized => {
            trace!(topic = %topic, "topic_unrecognized");
            return None;
        }
    };

    if id.is_empty() {
        debug!(topic = %topic, "fragment_missing_id");
        return None;
    }

    Some(Fragment { space_id: SpaceId(id), value })
}

/// Start the MQTT client and send parsed fragments to the channel
///
/// Fragments are sent via try_send to avoid blocking the MQTT eventloop.
/// Dropped fragments are counted in metrics and logged (rate-limited).
pub async fn start_mqtt_client(
    config: &Config,
    fragment_tx: mpsc::Sender<Fragment>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client_id = format!("vaga-bridge-{}", std::process::id());
    let mut mqttoptions = MqttOptions::new(client_id, config.mqtt_host(), config.mqtt_port());
    mqttoptions.set_keep_alive(Duration::from_secs(30));

    // Set credentials if configured
    if let (Some(username), Some(password)) = (config.mqtt_username(), config.mqtt_password()) {
        mqttoptions.set_credentials(username, password);
    }

    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);
    client.subscribe(config.mqtt_topic(), QoS::AtMostOnce).await?;

    info!(topic = %config.mqtt_topic(), host = %config.mqtt_host(), port = %config.mqtt_port(), "MQTT client subscribed");

    // Rate-limit drop warnings to 1 per second
    let mut last_drop_warn = Instant::now() - Duration::from_secs(2);

    loop {
        tokio::select! {
            // Check for shutdown signal
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("mqtt_shutdown");
                    return Ok(());
                }
            }
            // Process MQTT events
            result = eventloop.poll() => {
                match result {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let topic = &publish.topic;
                        let payload = match std::str::from_utf8(&publish.payload) {
                            Ok(s) => s,
                            Err(e) => {
                                warn!(topic = %topic, error = %e, "Invalid UTF-8 in MQTT payload");
                                metrics.record_fragment_dropped();
                                continue;
                            }
                        };

                        let Some(fragment) = parse_fragment(topic, payload) else {
                            metrics.record_fragment_dropped();
                            continue;
                        };

                        debug!(
                            id = %fragment.space_id,
                            kind = %fragment.value.kind().as_str(),
                            "fragment_received"
                        );
                        metrics.record_fragment_received();

                        if let Err(e) = fragment_tx.try_send(fragment) {
                            match e {
                                TrySendError::Full(_) => {
                                    metrics.record_fragment_dropped();
                                    if last_drop_warn.elapsed() > Duration::from_secs(1) {
                                        warn!("fragment_dropped: channel full");
                                        last_drop_warn = Instant::now();
                                    }
                                }
                                TrySendError::Closed(_) => {
                                    warn!("Fragment channel closed");
                                    return Ok(());
                                }
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "MQTT error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}
