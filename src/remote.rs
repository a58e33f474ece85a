//! HTTP client for the remote collector
//!
//! One `reqwest::Client` is built per agent run and shared by the heartbeat
//! loop and every dispatch task. Its connection pool is bounded so that many
//! short-lived dispatch tasks cannot grow the socket count without limit.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response, header};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, trace};
use url::Url;

use crate::config::{AgentConfig, RemoteConfig};
use crate::{HostDetails, Measurement};

/// Timeout applied to every request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Idle connections kept per collector host
pub const MAX_IDLE_PER_HOST: usize = 20;

/// How long an idle connection stays in the pool
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

pub const CONFIGURE_PATH: &str = "/api/configure/";
pub const UPDATE_PATH: &str = "/api/update/";

/// What the collector asked for in reply to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerDirective {
    /// The host configuration is unchanged
    NoChange,

    /// The account monitors more hosts than its plan allows
    PlanLimit,

    /// Replace disks and/or services
    Apply(RemoteConfig),
}

impl ServerDirective {
    /// Interpret a reply body.
    ///
    /// Unknown `message` values and bodies without overrides are `NoChange`.
    pub fn from_body(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body).context("collector reply is not JSON")?;

        match value.get("message").and_then(Value::as_str) {
            Some("tomany") => return Ok(ServerDirective::PlanLimit),
            Some("noconf") => return Ok(ServerDirective::NoChange),
            _ => {}
        }

        let remote: RemoteConfig = serde_json::from_value(value).unwrap_or_default();
        if remote == RemoteConfig::default() {
            Ok(ServerDirective::NoChange)
        } else {
            Ok(ServerDirective::Apply(remote))
        }
    }
}

/// Authenticated JSON client for the collector API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    auth_header: String,
}

impl ApiClient {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(IDLE_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            auth_header: config.auth_header(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL of an API path, appended to any path on the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}"))
            .with_context(|| format!("invalid endpoint path {path}"))
    }

    /// POST a pre-serialized JSON body
    pub async fn post_bytes(&self, path: &str, body: Vec<u8>) -> Result<Response> {
        let url = self.endpoint(path)?;
        trace!("POST {url}");

        self.client
            .post(url)
            .header(header::AUTHORIZATION, &self.auth_header)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .context("failed to send HTTP request")
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, payload: &T) -> Result<String> {
        let body = serde_json::to_vec(payload).context("failed to serialize request")?;
        let response = self.post_bytes(path, body).await?;

        response
            .text()
            .await
            .context("failed to read response body")
    }

    /// Ask the collector for this host's disk and service configuration
    #[instrument(skip_all, fields(host = %details.hostname))]
    pub async fn configure(&self, details: &HostDetails) -> Result<ServerDirective> {
        let body = self.post_json(CONFIGURE_PATH, details).await?;
        let directive = ServerDirective::from_body(&body)?;
        debug!("configuration reply: {directive:?}");
        Ok(directive)
    }

    /// Post one heartbeat
    #[instrument(skip_all, fields(heartbeat = measurement.heartbeat))]
    pub async fn heartbeat(&self, measurement: &Measurement) -> Result<ServerDirective> {
        let body = self.post_json(UPDATE_PATH, measurement).await?;
        ServerDirective::from_body(&body)
    }
}
