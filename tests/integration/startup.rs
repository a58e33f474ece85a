//! A full agent run against a mock collector

use std::sync::Arc;
use std::time::Duration;

use monkey_agent::agent::Agent;
use monkey_agent::events::EVENTS_PATH;
use monkey_agent::remote::{CONFIGURE_PATH, UPDATE_PATH};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::helpers::*;

async fn requests_to(server: &MockServer, endpoint: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == endpoint)
        .collect()
}

async fn wait_for(server: &MockServer, endpoint: &str, count: usize) -> Vec<Request> {
    let mut received = vec![];
    for _ in 0..250 {
        received = requests_to(server, endpoint).await;
        if received.len() >= count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    received
}

async fn mount_reply(server: &MockServer, endpoint: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_run_reports_on_startup_and_backs_off_on_plan_limit() {
    let server = MockServer::start().await;
    mount_reply(&server, CONFIGURE_PATH, json!({"message": "noconf"})).await;
    mount_reply(&server, UPDATE_PATH, json!({"message": "tomany"})).await;
    Mock::given(method("POST"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&server.uri(), dir.path());
    config.heartbeat_interval = Duration::from_millis(50);
    config.plan_limit_backoff = Duration::from_secs(2);

    let agent = Agent::new(config, fake_providers(Arc::new(FakeHost::new(0, 0)))).unwrap();
    let body = tokio::spawn(agent.run());

    // open ports plus both process tables, sent before the slow timers ever fire
    let events = wait_for(&server, EVENTS_PATH, 3).await;
    let mut kinds: Vec<String> = events
        .iter()
        .map(|request| {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            body["EventType"].as_str().unwrap().to_string()
        })
        .collect();
    kinds.sort();
    assert_eq!(kinds, vec!["open_ports", "processes_cpu", "processes_mem"]);

    assert_eq!(wait_for(&server, UPDATE_PATH, 1).await.len(), 1);

    // nothing is sent to the update endpoint inside the back-off window
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(requests_to(&server, UPDATE_PATH).await.len(), 1);

    // the loop resumes once the window has passed
    assert_eq!(wait_for(&server, UPDATE_PATH, 2).await.len(), 2);

    body.abort();
}
