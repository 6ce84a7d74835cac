//! Ballast-Gate: Decision Bridge
//!
//! Streams guard decisions and drift alerts to an external observer over
//! HTTP. The bridge never blocks the guard: subscriber callbacks do a
//! bounded `try_send` and return; a worker task drains the queue and
//! performs the outbound POSTs with short timeouts. Delivery is
//! best-effort; failures are logged and dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use ballast_anchor::{Alert, DriftSeverity, RiskLevel};

use crate::guard::{Decision, Guard, StateSnapshot};

/// Bridge failures. All of them are telemetry failures: the guard keeps
/// deciding regardless.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The bounded queue was full; the event was dropped
    #[error("bridge queue full, event dropped")]
    QueueFull,
    /// Outbound POST failed or timed out
    #[error("bridge transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Decision event, as posted to `/api/decision`.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionEvent {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub risk_level: RiskLevel,
    pub would_block: bool,
    pub actually_blocked: bool,
    pub reasons: Vec<String>,
    pub trust_score: f64,
    pub budget_remaining: f64,
}

impl From<&Decision> for DecisionEvent {
    fn from(decision: &Decision) -> Self {
        Self {
            timestamp: decision.timestamp,
            operation: decision.operation.clone(),
            risk_level: decision.risk_level,
            would_block: decision.would_block,
            actually_blocked: decision.actually_blocked,
            reasons: decision.reasons.clone(),
            trust_score: decision.trust_score,
            budget_remaining: decision.budget_remaining,
        }
    }
}

/// Alert event, as posted to `/api/alert`.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub pattern: String,
    pub description: String,
    pub severity: DriftSeverity,
}

impl From<&Alert> for AlertEvent {
    fn from(alert: &Alert) -> Self {
        Self {
            pattern: alert.pattern.clone(),
            description: alert.description.clone(),
            severity: alert.severity,
        }
    }
}

/// Everything the bridge can carry.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Decision(DecisionEvent),
    Alert(AlertEvent),
    State(StateSnapshot),
}

impl BridgeEvent {
    /// Sink endpoint for this event kind.
    pub fn endpoint(&self) -> &'static str {
        match self {
            BridgeEvent::Decision(_) => "/api/decision",
            BridgeEvent::Alert(_) => "/api/alert",
            BridgeEvent::State(_) => "/api/state",
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Base URL of the observer sink
    pub dashboard_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Bounded queue capacity; overflow drops events
    pub queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dashboard_url: "http://localhost:8081".to_string(),
            timeout: Duration::from_secs(1),
            queue_capacity: 256,
        }
    }
}

impl BridgeConfig {
    pub fn new(dashboard_url: impl Into<String>) -> Self {
        Self {
            dashboard_url: dashboard_url.into(),
            ..Self::default()
        }
    }

    /// Bridge configuration from the guard's `dashboard_url`, when set.
    pub fn from_guard_config(config: &crate::config::GuardConfig) -> Option<Self> {
        config
            .dashboard_url
            .as_ref()
            .map(|url| Self::new(url.clone()))
    }
}

/// Synchronous delivery path. The worker drains through this; tests can
/// call it directly instead of going through the queue.
#[derive(Clone)]
pub struct EventSender {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl EventSender {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.dashboard_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        }
    }

    /// POST one event to its endpoint. Non-2xx responses are logged but
    /// not errors; the payload was delivered.
    pub async fn send(&self, event: &BridgeEvent) -> Result<(), BridgeError> {
        let url = format!("{}{}", self.base_url, event.endpoint());
        let request = self.client.post(&url).timeout(self.timeout);
        let response = match event {
            BridgeEvent::Decision(e) => request.json(e).send().await,
            BridgeEvent::Alert(e) => request.json(e).send().await,
            BridgeEvent::State(e) => request.json(e).send().await,
        }?;

        if !response.status().is_success() {
            tracing::warn!(url = %url, status = %response.status(), "sink returned non-success");
        }
        Ok(())
    }
}

/// Bridges a guard to an external observer.
///
/// Must be constructed from within a Tokio runtime; the drain worker is
/// spawned on it.
pub struct DecisionBridge {
    tx: mpsc::Sender<BridgeEvent>,
    worker: tokio::task::JoinHandle<()>,
    sender: EventSender,
}

impl DecisionBridge {
    /// Subscribe to a guard's decisions and drift alerts and start the
    /// drain worker. An initial state snapshot is enqueued so the
    /// observer starts from truth.
    pub fn connect(guard: &Guard, config: BridgeConfig) -> Self {
        let sender = EventSender::new(&config);
        let (tx, mut rx) = mpsc::channel::<BridgeEvent>(config.queue_capacity);

        let worker_sender = sender.clone();
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(error) = worker_sender.send(&event).await {
                    tracing::warn!(
                        endpoint = event.endpoint(),
                        error = %error,
                        "bridge delivery failed, event dropped"
                    );
                }
            }
        });

        let decision_tx = tx.clone();
        guard.on_decision(Box::new(move |decision| {
            if decision_tx
                .try_send(BridgeEvent::Decision(DecisionEvent::from(decision)))
                .is_err()
            {
                tracing::warn!(operation = %decision.operation, "bridge queue full, decision dropped");
            }
        }));

        let alert_tx = tx.clone();
        guard.on_alert(Box::new(move |alert| {
            if alert_tx
                .try_send(BridgeEvent::Alert(AlertEvent::from(alert)))
                .is_err()
            {
                tracing::warn!(pattern = %alert.pattern, "bridge queue full, alert dropped");
            }
        }));

        if tx.try_send(BridgeEvent::State(guard.state_snapshot())).is_err() {
            tracing::warn!("bridge queue full, initial state dropped");
        }

        tracing::info!(url = %config.dashboard_url, "decision bridge connected");
        Self { tx, worker, sender }
    }

    /// Enqueue an event without blocking.
    pub fn enqueue(&self, event: BridgeEvent) -> Result<(), BridgeError> {
        self.tx.try_send(event).map_err(|_| BridgeError::QueueFull)
    }

    /// Enqueue a fresh state snapshot.
    pub fn publish_state(&self, guard: &Guard) -> Result<(), BridgeError> {
        self.enqueue(BridgeEvent::State(guard.state_snapshot()))
    }

    /// The synchronous delivery path, for direct sends in tests.
    pub fn sender(&self) -> &EventSender {
        &self.sender
    }

    /// Stop the drain worker. Events already queued but not yet sent are
    /// dropped; delivery is best-effort by contract.
    pub fn shutdown(self) {
        self.worker.abort();
        tracing::info!("decision bridge disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::GuardMode;
    use chrono::Utc;

    #[test]
    fn test_decision_event_from_decision() {
        let decision = Decision {
            timestamp: Utc::now(),
            operation: "send_email".to_string(),
            mode: GuardMode::Enforce,
            risk_level: RiskLevel::High,
            would_block: true,
            actually_blocked: true,
            reasons: vec!["[anchor] trust too low".to_string()],
            context_summary: serde_json::Map::new(),
            trust_score: 0.4,
            budget_remaining: 0.6,
        };

        let event = DecisionEvent::from(&decision);
        assert_eq!(event.operation, "send_email");
        assert!(event.actually_blocked);

        // Wire shape carries exactly the documented fields.
        let json = serde_json::to_value(&event).unwrap();
        let object = json.as_object().unwrap();
        for key in [
            "timestamp",
            "operation",
            "risk_level",
            "would_block",
            "actually_blocked",
            "reasons",
            "trust_score",
            "budget_remaining",
        ] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object.len(), 8);
        assert_eq!(json["risk_level"], "HIGH");
    }

    #[test]
    fn test_alert_event_shape() {
        let event = AlertEvent {
            pattern: "speed_drift".to_string(),
            description: "too fast".to_string(),
            severity: DriftSeverity::SlowDown,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["pattern"], "speed_drift");
        assert_eq!(json["severity"], "slow_down");
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_endpoints() {
        let state = BridgeEvent::State(StateSnapshot {
            mode: GuardMode::Shadow,
            trust_score: 0.7,
            budget_remaining: 1.0,
        });
        assert_eq!(state.endpoint(), "/api/state");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let sender = EventSender::new(&BridgeConfig::new("http://localhost:9999/"));
        assert_eq!(sender.base_url, "http://localhost:9999");
    }

    #[test]
    fn test_config_from_guard_config() {
        let guard_config = crate::config::GuardConfig {
            dashboard_url: Some("http://dash.internal:8081".to_string()),
            ..crate::config::GuardConfig::default()
        };
        let bridge_config = BridgeConfig::from_guard_config(&guard_config).unwrap();
        assert_eq!(bridge_config.dashboard_url, "http://dash.internal:8081");

        assert!(BridgeConfig::from_guard_config(&crate::config::GuardConfig::default()).is_none());
    }
}
