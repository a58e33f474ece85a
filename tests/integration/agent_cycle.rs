//! Heartbeat cycle against a mock collector

use std::sync::Arc;
use std::time::Duration;

use monkey_agent::agent::Agent;
use monkey_agent::config::{HEARTBEAT_INTERVAL, PLAN_LIMIT_BACKOFF};
use monkey_agent::events::EVENTS_PATH;
use monkey_agent::remote::{CONFIGURE_PATH, UPDATE_PATH};
use monkey_agent::samples::SampleKind;
use monkey_agent::scheduler::SlowSchedule;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn agent(server: &MockServer, host: Arc<FakeHost>) -> Agent {
    let dir = tempfile::tempdir().unwrap();
    Agent::new(test_config(&server.uri(), dir.path()), fake_providers(host)).unwrap()
}

async fn mount_reply(server: &MockServer, endpoint: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_noconf_keeps_default_resources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CONFIGURE_PATH))
        .and(header("authorization", "token test-token"))
        .and(body_partial_json(json!({"Hostid": "host-1", "Hostname": "web-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "noconf"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut agent = agent(&server, Arc::new(FakeHost::new(0, 0)));
    agent.configure().await;

    assert_eq!(agent.host_id(), "host-1");
    assert_eq!(agent.resources().disks, vec!["/data", "/"]);
    assert_eq!(agent.resources().services, vec!["sshd", "monitor-monkey"]);
}

#[tokio::test]
async fn test_configuration_overrides_are_applied() {
    let server = MockServer::start().await;
    mount_reply(
        &server,
        CONFIGURE_PATH,
        json!({"Disks": ["/"], "Services": ["nginx", "postgres"]}),
    )
    .await;

    let mut agent = agent(&server, Arc::new(FakeHost::new(0, 0)));
    agent.configure().await;

    assert_eq!(agent.resources().disks, vec!["/"]);
    assert_eq!(agent.resources().services, vec!["nginx", "postgres"]);
}

#[tokio::test]
async fn test_unreachable_collector_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::new(0, 0));
    let mut agent = Agent::new(
        test_config("http://127.0.0.1:9", dir.path()),
        fake_providers(host),
    )
    .unwrap();

    agent.configure().await;

    assert_eq!(agent.resources().disks, vec!["/data", "/"]);
}

#[tokio::test]
async fn test_measurement_reports_deltas_since_baseline() {
    let server = MockServer::start().await;
    mount_reply(&server, CONFIGURE_PATH, json!({"message": "noconf"})).await;

    let host = Arc::new(FakeHost::new(1_000, 5_000));
    let mut agent = agent(&server, host.clone());
    agent.configure().await;

    // baseline starts at zero before the first cycle
    host.set_totals(1_500, 5_200);
    let (measurement, totals) = agent.measure().await;

    assert_eq!(measurement.upload, 1_500);
    assert_eq!(measurement.upload_interval, 1_500);
    assert_eq!(totals.download, 5_200);
    assert_eq!(measurement.disks.get("/data"), Some(&87.5));
    assert_eq!(
        measurement.services.get("sshd").map(String::as_str),
        Some("active")
    );
    assert_eq!(measurement.host.hostname, "web-1");
    assert_eq!(measurement.agent_ver, monkey_agent::AGENT_VERSION);
}

#[tokio::test]
async fn test_heartbeat_accepted_advances_baseline() {
    let server = MockServer::start().await;
    mount_reply(&server, CONFIGURE_PATH, json!({"message": "noconf"})).await;
    Mock::given(method("POST"))
        .and(path(UPDATE_PATH))
        .and(body_partial_json(json!({"Hostid": "host-1", "Memory": 61.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let host = Arc::new(FakeHost::new(800, 900));
    let mut agent = agent(&server, host);
    agent.configure().await;

    let mut schedule = SlowSchedule::new(DAY, DAY);
    let delay = agent.heartbeat(&mut schedule).await;

    assert_eq!(delay, HEARTBEAT_INTERVAL);
    assert_eq!(agent.baseline().upload, 800);
    assert_eq!(agent.baseline().download, 900);
}

#[tokio::test]
async fn test_plan_limit_backs_off_without_baseline_update() {
    let server = MockServer::start().await;
    mount_reply(&server, CONFIGURE_PATH, json!({"message": "noconf"})).await;
    mount_reply(&server, UPDATE_PATH, json!({"message": "tomany"})).await;

    let host = Arc::new(FakeHost::new(800, 900));
    let mut agent = agent(&server, host);
    agent.configure().await;

    let mut schedule = SlowSchedule::new(DAY, DAY);
    let delay = agent.heartbeat(&mut schedule).await;

    assert_eq!(delay, PLAN_LIMIT_BACKOFF);
    assert_eq!(agent.baseline().upload, 0);
}

#[tokio::test]
async fn test_heartbeat_error_keeps_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(FakeHost::new(800, 900));
    let mut agent = Agent::new(
        test_config("http://127.0.0.1:9", dir.path()),
        fake_providers(host),
    )
    .unwrap();

    let mut schedule = SlowSchedule::new(Duration::from_millis(1), Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let delay = agent.heartbeat(&mut schedule).await;

    assert_eq!(delay, HEARTBEAT_INTERVAL);
    assert_eq!(agent.baseline().upload, 0);
    assert_eq!(agent.baseline().download, 0);

    // a failed beat leaves the elapsed report timers for the next one
    assert_eq!(schedule.poll_due().len(), 2);
}

#[tokio::test]
async fn test_heartbeat_override_replaces_services() {
    let server = MockServer::start().await;
    mount_reply(&server, CONFIGURE_PATH, json!({"message": "noconf"})).await;
    mount_reply(&server, UPDATE_PATH, json!({"Services": ["redis"]})).await;

    let mut agent = agent(&server, Arc::new(FakeHost::new(0, 0)));
    agent.configure().await;

    let mut schedule = SlowSchedule::new(DAY, DAY);
    agent.heartbeat(&mut schedule).await;

    assert_eq!(agent.resources().services, vec!["redis"]);
    assert_eq!(agent.resources().disks, vec!["/data", "/"]);
}

#[tokio::test]
async fn test_open_ports_report() {
    let server = MockServer::start().await;
    mount_reply(&server, CONFIGURE_PATH, json!({"message": "noconf"})).await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .and(body_partial_json(json!({
            "Hostid": "host-1",
            "EventType": "open_ports",
            "EventData": {"tcp": [{"port": 22, "service": "ssh"}], "udp": []}
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut agent = agent(&server, Arc::new(FakeHost::new(0, 0)));
    agent.configure().await;

    agent.send_open_ports().await.unwrap();
}

#[tokio::test]
async fn test_process_report_clears_store_after_delivery() {
    let server = MockServer::start().await;
    mount_reply(&server, CONFIGURE_PATH, json!({"message": "noconf"})).await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let mut agent = agent(&server, Arc::new(FakeHost::new(0, 0)));
    agent.configure().await;
    agent.samples().collect(10).await.unwrap();

    agent.send_process_stats().await.unwrap();

    assert!(agent.samples().read(SampleKind::Cpu).await.is_err());
}

#[tokio::test]
async fn test_rejected_process_report_keeps_samples() {
    let server = MockServer::start().await;
    mount_reply(&server, CONFIGURE_PATH, json!({"message": "noconf"})).await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let mut agent = agent(&server, Arc::new(FakeHost::new(0, 0)));
    agent.configure().await;
    agent.samples().collect(10).await.unwrap();

    agent.send_process_stats().await.unwrap();

    let cpu = agent.samples().read(SampleKind::Cpu).await.unwrap();
    assert_eq!(cpu[0].name, "postgres");
}

#[tokio::test]
async fn test_process_report_without_samples_sends_nothing() {
    let server = MockServer::start().await;
    mount_reply(&server, CONFIGURE_PATH, json!({"message": "noconf"})).await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut agent = agent(&server, Arc::new(FakeHost::new(0, 0)));
    agent.configure().await;

    agent.send_process_stats().await.unwrap();
}
