//! Decision bridge delivery tests against a local mock sink.

use std::time::Duration;

use ballast_gate::{
    BridgeConfig, BridgeEvent, Context, DecisionBridge, EventSender, Guard, GuardConfig, GuardMode,
    StateSnapshot,
};
use httpmock::prelude::*;

fn ctx_risk(level: &str) -> Context {
    Context::new().with("risk_level", level)
}

async fn wait_for_hits(mock: &httpmock::Mock<'_>, at_least: usize) {
    for _ in 0..200 {
        if mock.hits_async().await >= at_least {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_sender_posts_decision_shape() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/decision")
                .json_body_partial(r#"{"operation": "read_file", "risk_level": "SAFE"}"#);
            then.status(200);
        })
        .await;

    let guard = Guard::with_config(GuardConfig {
        mode: GuardMode::Shadow,
        ..GuardConfig::default()
    });
    guard.pre_check("read_file", &ctx_risk("SAFE"));
    let decision = &guard.recent_decisions(1)[0];

    let sender = EventSender::new(&BridgeConfig::new(server.base_url()));
    sender
        .send(&BridgeEvent::Decision(decision.into()))
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn connect_sends_initial_state() {
    let server = MockServer::start_async().await;
    let state_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/state");
            then.status(200);
        })
        .await;

    let guard = Guard::with_config(GuardConfig {
        mode: GuardMode::Shadow,
        ..GuardConfig::default()
    });
    let bridge = DecisionBridge::connect(&guard, BridgeConfig::new(server.base_url()));

    wait_for_hits(&state_mock, 1).await;
    assert_eq!(state_mock.hits_async().await, 1);
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn decisions_stream_to_sink() {
    let server = MockServer::start_async().await;
    let decision_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/decision");
            then.status(200);
        })
        .await;
    let _state_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/state");
            then.status(200);
        })
        .await;

    let guard = Guard::with_config(GuardConfig {
        mode: GuardMode::Enforce,
        ..GuardConfig::default()
    });
    let bridge = DecisionBridge::connect(&guard, BridgeConfig::new(server.base_url()));

    guard.pre_check("read_file", &ctx_risk("SAFE"));
    guard.pre_check("send_email", &ctx_risk("HIGH"));

    wait_for_hits(&decision_mock, 2).await;
    assert_eq!(decision_mock.hits_async().await, 2);
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn drift_alerts_stream_to_sink() {
    let server = MockServer::start_async().await;
    let alert_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/alert")
                .json_body_partial(r#"{"pattern": "speed_drift"}"#);
            then.status(200);
        })
        .await;
    let _catch_all = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        })
        .await;

    let guard = Guard::with_config(GuardConfig {
        mode: GuardMode::Shadow,
        ..GuardConfig::default()
    });
    let bridge = DecisionBridge::connect(&guard, BridgeConfig::new(server.base_url()));

    // A rapid burst of recorded operations trips the pacing detector.
    for _ in 0..12 {
        guard.post_record("op", &ctx_risk("SAFE"), 0, false);
    }

    wait_for_hits(&alert_mock, 1).await;
    assert!(alert_mock.hits_async().await >= 1);
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_sink_never_blocks_the_guard() {
    // Nothing listens on this port; delivery fails, decisions keep flowing.
    let guard = Guard::with_config(GuardConfig {
        mode: GuardMode::Shadow,
        ..GuardConfig::default()
    });
    let bridge = DecisionBridge::connect(
        &guard,
        BridgeConfig {
            dashboard_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(100),
            queue_capacity: 8,
        },
    );

    for i in 0..50 {
        let verdict = guard.pre_check(&format!("op_{i}"), &ctx_risk("SAFE"));
        assert!(verdict.allowed);
    }
    assert_eq!(guard.metrics().total_checks, 50);
    bridge.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn state_snapshot_shape_on_wire() {
    let server = MockServer::start_async().await;
    let state_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/state")
                .json_body_partial(r#"{"mode": "shadow"}"#);
            then.status(200);
        })
        .await;

    let sender = EventSender::new(&BridgeConfig::new(server.base_url()));
    sender
        .send(&BridgeEvent::State(StateSnapshot {
            mode: GuardMode::Shadow,
            trust_score: 0.7,
            budget_remaining: 1.0,
        }))
        .await
        .unwrap();

    state_mock.assert_async().await;
}
