//! Custom alert directory end to end

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use monkey_agent::actors::AlertMonitorHandle;
use monkey_agent::alerts::{AlertStore, AlertValue};
use monkey_agent::dispatch::Dispatcher;
use monkey_agent::events::CUSTOM_EVENTS_PATH;
use monkey_agent::remote::ApiClient;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

const CPU_ALERT: &str = "\
# raised by the nightly batch job
name=\"cpu-high\"
interval=5m
data=87.5
";

#[tokio::test]
async fn test_alert_fires_once_per_interval() {
    let dir = tempfile::tempdir().unwrap();
    write_alert(dir.path(), "cpu.mm", CPU_ALERT);

    let store = AlertStore::new(dir.path());
    let report = store.reload().await;
    assert_eq!(report.loaded, 1);

    let t0 = Utc::now();
    let due = store.due_alerts(t0).await;
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].name, "cpu-high");
    assert_eq!(due[0].value, AlertValue::Float(87.5));

    assert!(store.due_alerts(t0 + TimeDelta::minutes(4)).await.is_empty());

    // a reload in between keeps the schedule
    store.reload().await;
    assert_eq!(store.due_alerts(t0 + TimeDelta::minutes(6)).await.len(), 1);
    assert!(store.due_alerts(t0 + TimeDelta::minutes(7)).await.is_empty());
}

#[tokio::test]
async fn test_invalid_files_do_not_block_valid_ones() {
    let dir = tempfile::tempdir().unwrap();
    write_alert(dir.path(), "cpu.mm", CPU_ALERT);
    write_alert(dir.path(), "broken.mm", "name=broken\ndata=1\n");
    write_alert(dir.path(), "notes.txt", "name=ignored\ninterval=1m\ndata=1\n");

    let store = AlertStore::new(dir.path());
    let report = store.reload().await;

    assert_eq!(report.loaded, 1);
    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].0.ends_with("broken.mm"));
}

#[tokio::test]
async fn test_removed_file_stops_alerting() {
    let dir = tempfile::tempdir().unwrap();
    write_alert(dir.path(), "cpu.mm", CPU_ALERT);

    let store = AlertStore::new(dir.path());
    store.reload().await;
    assert_eq!(store.len().await, 1);

    std::fs::remove_file(dir.path().join("cpu.mm")).unwrap();
    store.reload().await;

    assert!(store.is_empty().await);
    assert!(
        store
            .due_alerts(Utc::now() + TimeDelta::days(1))
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_monitor_posts_alerts_on_startup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CUSTOM_EVENTS_PATH))
        .and(body_json(json!({
            "host_id": "host-1",
            "name": "cpu-high",
            "value": 87.5
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_alert(dir.path(), "cpu.mm", CPU_ALERT);

    let config = test_config(&server.uri(), dir.path());
    let dispatcher = Dispatcher::new(ApiClient::new(&config).unwrap());
    let store = Arc::new(AlertStore::new(dir.path()));
    let handle = AlertMonitorHandle::spawn(store, dispatcher, "host-1", Duration::from_secs(60));

    // already sent during startup
    assert_eq!(handle.check_now().await.unwrap(), 0);

    let mut delivered = 0;
    for _ in 0..50 {
        delivered = server.received_requests().await.unwrap_or_default().len();
        if delivered > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(delivered, 1);

    handle.shutdown().await.unwrap();
}
