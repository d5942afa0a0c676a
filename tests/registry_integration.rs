//! End-to-end behaviour of the notification hub.
//!
//! Exercises registration, delivery, eviction and email status channels
//! together without starting the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use tenant_push_service::config::{EmailStatusConfig, PushConfig};
use tenant_push_service::email_status::EmailStatus;
use tenant_push_service::notification::{NotificationBuilder, NotificationEvent, Priority};
use tenant_push_service::push::{EncodedFrame, PushStream};
use tenant_push_service::NotificationHub;

const TIMEOUT: Duration = Duration::from_secs(1800);

fn create_hub() -> NotificationHub {
    let push = PushConfig {
        send_timeout_ms: 200,
        ..Default::default()
    };
    NotificationHub::new(push, &EmailStatusConfig::default())
}

fn notification(title: &str) -> NotificationEvent {
    NotificationBuilder::new(title, "body")
        .priority(Priority::High)
        .event_type("class.reminder")
        .build()
}

fn notifications(stream: &mut PushStream) -> Vec<Value> {
    stream
        .drain()
        .into_iter()
        .filter(|frame| frame.event() == "notification")
        .map(|frame| serde_json::from_str(frame.data()).unwrap())
        .collect()
}

#[tokio::test]
async fn test_register_replace_and_deliver() {
    let hub = create_hub();

    let mut first = hub.register("T1", "U1", TIMEOUT);
    assert_eq!(hub.connection_count("T1"), 1);
    assert_eq!(first.try_recv(), Some(EncodedFrame::heartbeat()));

    // Re-registering replaces and completes the previous stream
    let mut second = hub.register("T1", "U1", TIMEOUT);
    assert_eq!(hub.connection_count("T1"), 1);
    assert!(first.is_closed());
    assert_eq!(first.recv().await, None);
    second.drain();

    assert!(hub.notify_user("T1", "U1", notification("Reminder")).await);
    assert!(!hub.notify_user("T1", "U2", notification("Nobody")).await);
    assert_eq!(hub.notify_tenant("T1", notification("All")).await, 1);

    let received = notifications(&mut second);
    let titles: Vec<_> = received.iter().map(|n| n["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Reminder", "All"]);
    assert_eq!(received[0]["priority"], "HIGH");
    assert_eq!(received[0]["eventType"], "class.reminder");
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let hub = create_hub();
    let mut a = hub.register("T1", "U1", TIMEOUT);
    let mut b = hub.register("T2", "U1", TIMEOUT);
    a.drain();
    b.drain();

    assert_eq!(hub.notify_tenant("T1", notification("T1 only")).await, 1);
    assert_eq!(notifications(&mut a).len(), 1);
    assert!(notifications(&mut b).is_empty());

    assert_eq!(hub.notify_tenant("T3", notification("empty")).await, 0);
    assert_eq!(hub.total_connection_count(), 2);
}

#[tokio::test]
async fn test_failing_connection_is_removed() {
    let hub = create_hub();
    let dead = hub.register("T1", "U1", TIMEOUT);
    let mut alive = hub.register("T1", "U2", TIMEOUT);
    alive.drain();
    drop(dead);

    assert_eq!(hub.notify_tenant("T1", notification("Hello")).await, 1);
    assert_eq!(hub.connection_count("T1"), 1);
    assert!(!hub.notify_user("T1", "U1", notification("Gone")).await);
    assert_eq!(notifications(&mut alive).len(), 1);
}

#[tokio::test]
async fn test_email_status_flow() {
    let hub = create_hub();
    let mut stream = hub.create_email_status_channel("signup-42");
    assert_eq!(hub.email_status_channel_count(), 1);

    hub.publish_email_status("signup-42", EmailStatus::Sending, "Sending verification email")
        .await;
    assert_eq!(hub.email_status_channel_count(), 1);

    hub.publish_email_status("signup-42", EmailStatus::Sent, "Check your inbox")
        .await;
    assert_eq!(hub.email_status_channel_count(), 0);

    // No channel any more: silently ignored
    hub.publish_email_status("signup-42", EmailStatus::Failed, "late")
        .await;

    let mut events = Vec::new();
    while let Some(frame) = stream.recv().await {
        assert_eq!(frame.event(), "email-status");
        let body: Value = serde_json::from_str(frame.data()).unwrap();
        events.push((
            body["status"].as_str().unwrap().to_string(),
            body["message"].as_str().unwrap().to_string(),
        ));
    }
    assert_eq!(
        events,
        vec![
            ("SENDING".to_string(), "Sending verification email".to_string()),
            ("SENT".to_string(), "Check your inbox".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_evicts_idle_connections() {
    let hub = Arc::new(create_hub());
    let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let sweeper = hub.heartbeat_sweeper(shutdown_rx);

    let mut idle = hub.register("T1", "U1", TIMEOUT);
    idle.drain();
    tokio::time::advance(Duration::from_secs(301)).await;

    let report = sweeper.sweep().await;
    assert_eq!(report.stale_evicted, 1);
    assert_eq!(hub.connection_count("T1"), 0);
    assert!(idle.is_closed());
}

#[tokio::test]
async fn test_shutdown_closes_everything() {
    let hub = create_hub();
    let durable = hub.register("T1", "U1", TIMEOUT);
    let ephemeral = hub.create_email_status_channel("login-1");

    hub.shutdown();

    assert!(durable.is_closed());
    assert!(ephemeral.is_closed());
    assert_eq!(hub.total_connection_count(), 0);
    assert_eq!(hub.email_status_channel_count(), 0);
}
