//! The agent body
//!
//! ```text
//! configure ─▶ baseline ─▶ probe ─▶ spawn actors ─▶ startup reports ─▶ heartbeat loop
//!                                                                       │
//!                                     every iteration: measure, POST update,
//!                                     apply reply, poll slow timers, sleep
//! ```
//!
//! One [`Agent`] value is one cold start. Everything it owns, including the
//! actor handles created in [`Agent::run`], is dropped when the body returns
//! or panics.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::actors::{ALERT_CHECK_INTERVAL, AlertMonitorHandle, CollectorHandle};
use crate::alerts::AlertStore;
use crate::config::{AgentConfig, DEFAULT_DISK_COUNT, MonitoredResources, TOP_PROCESSES};
use crate::dispatch::Dispatcher;
use crate::error::SampleError;
use crate::events::EventEnvelope;
use crate::probe::Probe;
use crate::providers::Providers;
use crate::remote::{ApiClient, ServerDirective, UPDATE_PATH};
use crate::samples::{SampleKind, SampleStore};
use crate::scheduler::{SlowSchedule, SlowTask};
use crate::{AGENT_VERSION, Measurement, NetTotals};

/// State of one agent run
pub struct Agent {
    config: AgentConfig,
    providers: Providers,
    api: ApiClient,
    dispatcher: Dispatcher,
    samples: Arc<SampleStore>,
    resources: MonitoredResources,
    host_id: String,
    baseline: NetTotals,
    probe: Probe,
}

impl Agent {
    pub fn new(config: AgentConfig, providers: Providers) -> Result<Self> {
        let api = ApiClient::new(&config)?;
        let dispatcher = Dispatcher::new(api.clone());
        let samples = Arc::new(SampleStore::new(providers.processes.clone()));

        Ok(Self {
            config,
            providers,
            api,
            dispatcher,
            samples,
            resources: MonitoredResources::with_disks(Vec::new()),
            host_id: String::new(),
            baseline: NetTotals::default(),
            probe: Probe::default(),
        })
    }

    /// Replace the liveness probe policy
    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }

    pub fn resources(&self) -> &MonitoredResources {
        &self.resources
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn baseline(&self) -> NetTotals {
        self.baseline
    }

    pub fn samples(&self) -> &Arc<SampleStore> {
        &self.samples
    }

    /// Fetch the host configuration from the collector
    ///
    /// Any answer other than an override, including a failed request, leaves
    /// the defaults in place.
    #[instrument(skip(self))]
    pub async fn configure(&mut self) {
        let details = self.providers.host.host_details().await;
        self.host_id = details.hostid.clone();

        let disks = self.providers.host.top_used_disks(DEFAULT_DISK_COUNT).await;
        self.resources = MonitoredResources::with_disks(disks);

        match self.api.configure(&details).await {
            Ok(ServerDirective::Apply(remote)) => {
                info!("applying host configuration from collector");
                self.resources.apply(remote);
            }
            Ok(ServerDirective::NoChange) => {
                info!("no host configuration on collector, using defaults");
            }
            Ok(ServerDirective::PlanLimit) => {
                warn!("plan limit reached while configuring, using defaults");
            }
            Err(e) => {
                error!("error fetching host configuration: {e:#}");
            }
        }

        debug!(
            "monitoring disks {:?} and services {:?}",
            self.resources.disks, self.resources.services
        );
    }

    /// Take one heartbeat measurement against the current baseline
    ///
    /// Returns the measurement and the network counters it was taken with.
    pub async fn measure(&self) -> (Measurement, NetTotals) {
        let host = &self.providers.host;

        let mut disks = BTreeMap::new();
        for disk in &self.resources.disks {
            disks.insert(disk.clone(), host.disk_usage(disk).await);
        }

        let mut services = BTreeMap::new();
        for service in &self.resources.services {
            services.insert(service.clone(), host.service_status(service).await);
        }

        let totals = host.net_totals().await;
        let delta = totals.since(self.baseline);

        let measurement = Measurement {
            heartbeat: Utc::now().timestamp(),
            host: host.host_details().await,
            temp: host.temperatures().await,
            load: host.load().await,
            disks,
            memory: host.memory_used_percent().await,
            upload: totals.upload,
            download: totals.download,
            upload_interval: delta.upload,
            download_interval: delta.download,
            services,
            agent_ver: AGENT_VERSION.to_string(),
        };

        (measurement, totals)
    }

    /// One iteration of the heartbeat loop; returns how long to sleep
    #[instrument(skip_all)]
    pub async fn heartbeat(&mut self, schedule: &mut SlowSchedule) -> Duration {
        let (measurement, totals) = self.measure().await;
        trace!("measurement: {measurement:?}");

        match self.api.heartbeat(&measurement).await {
            Ok(ServerDirective::PlanLimit) => {
                warn!("too many hosts for the current plan, backing off");
                return self.config.plan_limit_backoff;
            }
            Ok(ServerDirective::Apply(remote)) => {
                info!("collector updated host configuration");
                self.resources.apply(remote);
            }
            Ok(ServerDirective::NoChange) => {
                trace!("heartbeat accepted");
            }
            Err(e) => {
                error!("error sending heartbeat: {e:#}");
                return self.config.heartbeat_interval;
            }
        }

        self.baseline = totals;

        for task in schedule.poll_due() {
            match task {
                SlowTask::OpenPorts => {
                    self.send_open_ports();
                }
                SlowTask::ProcessStats => {
                    self.send_process_stats();
                }
            }
        }

        self.config.heartbeat_interval
    }

    /// Scan open ports and report them on a detached task
    pub fn send_open_ports(&self) -> JoinHandle<()> {
        let ports = self.providers.ports.clone();
        let dispatcher = self.dispatcher.clone();
        let host_id = self.host_id.clone();

        tokio::spawn(async move {
            let open = match ports.open_ports().await {
                Ok(open) => open,
                Err(e) => {
                    error!("error getting open ports: {e}");
                    return;
                }
            };

            debug!("{} tcp and {} udp ports open", open.tcp.len(), open.udp.len());

            match EventEnvelope::open_ports(host_id, &open) {
                Ok(envelope) => {
                    dispatcher.send(&envelope.into()).await;
                }
                Err(e) => error!("error building open ports event: {e}"),
            }
        })
    }

    /// Report the collected process tables on a detached task
    ///
    /// The store is cleared only once both tables were delivered.
    pub fn send_process_stats(&self) -> JoinHandle<()> {
        let samples = self.samples.clone();
        let dispatcher = self.dispatcher.clone();
        let host_id = self.host_id.clone();

        tokio::spawn(async move {
            let mut delivered = 0;

            for kind in [SampleKind::Cpu, SampleKind::Memory] {
                let table = match samples.read(kind).await {
                    Ok(table) => table,
                    Err(SampleError::NoData(label)) => {
                        warn!("no {label} process data to send");
                        continue;
                    }
                    Err(e) => {
                        error!("error reading {kind} processes: {e}");
                        continue;
                    }
                };

                match EventEnvelope::processes(host_id.clone(), kind, &table) {
                    Ok(envelope) => {
                        if dispatcher.send(&envelope.into()).await.is_delivered() {
                            delivered += 1;
                        }
                    }
                    Err(e) => error!("error building {kind} process event: {e}"),
                }
            }

            if delivered == 2 {
                samples.clear().await;
            }
        })
    }

    /// Run the agent until the process is terminated
    ///
    /// Only returns on a setup failure; the heartbeat loop itself never ends.
    pub async fn run(mut self) -> Result<()> {
        info!("starting agent version {AGENT_VERSION}");

        self.configure().await;

        self.baseline = self.providers.host.net_totals().await;
        sleep(self.config.heartbeat_interval).await;

        let update_url = self
            .api
            .endpoint(UPDATE_PATH)
            .context("failed to build update endpoint")?;
        if !self.probe.probe(&update_url).await {
            warn!("collector at {update_url} is not reachable, continuing anyway");
        }

        let collector = CollectorHandle::spawn(
            self.samples.clone(),
            self.config.process_collection_interval,
            TOP_PROCESSES,
        );
        let _alerts = AlertMonitorHandle::spawn(
            Arc::new(AlertStore::new(self.config.alerts_dir.clone())),
            self.dispatcher.clone(),
            self.host_id.clone(),
            ALERT_CHECK_INTERVAL,
        );

        self.send_open_ports();
        match collector.collect_now().await {
            Ok(()) => {
                self.send_process_stats();
            }
            Err(e) => error!("initial process collection failed: {e:#}"),
        }

        let mut schedule = SlowSchedule::new(
            self.config.open_ports_interval,
            self.config.process_send_interval,
        );

        loop {
            let delay = self.heartbeat(&mut schedule).await;
            sleep(delay).await;
        }
    }
}
