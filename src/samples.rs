//! Shared process sample store
//!
//! Holds the most recent top-N process tables, one per metric kind. The
//! collector replaces both tables in a single swap; the dispatch path reads
//! copies and clears the store once the report went out.
//!
//! ```text
//! CollectorActor ── collect() ──▶ [ SampleStore ] ◀── read()/clear() ── process report
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace};

use crate::error::SampleError;
use crate::providers::ProcessProvider;

/// Metric a process table is ranked by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Cpu,
    Memory,
}

impl SampleKind {
    pub fn label(self) -> &'static str {
        match self {
            SampleKind::Cpu => "cpu",
            SampleKind::Memory => "mem",
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resource usage a process is ranked by
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProcessUsage {
    #[serde(rename = "cpu_percent")]
    CpuPercent(f64),
    #[serde(rename = "rss_kb")]
    RssKb(u64),
}

impl ProcessUsage {
    fn rank(&self) -> f64 {
        match self {
            ProcessUsage::CpuPercent(percent) => *percent,
            ProcessUsage::RssKb(kb) => *kb as f64,
        }
    }
}

/// One row of a top-N process table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub username: String,
    #[serde(flatten)]
    pub usage: ProcessUsage,
}

/// Ranks two samples, highest usage first
fn by_usage_descending(a: &ProcessSample, b: &ProcessSample) -> Ordering {
    b.usage.rank().total_cmp(&a.usage.rank())
}

/// Sort descending by usage and keep at most `top_n` rows
pub fn rank_samples(mut samples: Vec<ProcessSample>, top_n: usize) -> Vec<ProcessSample> {
    samples.sort_by(by_usage_descending);
    samples.truncate(top_n);
    samples
}

#[derive(Debug, Clone)]
struct Tables {
    cpu: Vec<ProcessSample>,
    memory: Vec<ProcessSample>,
}

/// Lock-guarded holder of the current process tables
pub struct SampleStore {
    provider: Arc<dyn ProcessProvider>,
    tables: Mutex<Option<Tables>>,
}

impl SampleStore {
    pub fn new(provider: Arc<dyn ProcessProvider>) -> Self {
        Self {
            provider,
            tables: Mutex::new(None),
        }
    }

    /// Fetch fresh top-N tables and swap them in.
    ///
    /// On provider failure the previous tables stay in place.
    #[instrument(skip(self))]
    pub async fn collect(&self, top_n: usize) -> Result<(), SampleError> {
        let cpu = self.provider.top_processes(SampleKind::Cpu, top_n).await?;
        let memory = self.provider.top_processes(SampleKind::Memory, top_n).await?;

        let fresh = Tables {
            cpu: rank_samples(cpu, top_n),
            memory: rank_samples(memory, top_n),
        };

        trace!(
            "collected {} cpu and {} memory samples",
            fresh.cpu.len(),
            fresh.memory.len()
        );

        *self.tables.lock().await = Some(fresh);
        Ok(())
    }

    /// Copy of the current table for `kind`
    pub async fn read(&self, kind: SampleKind) -> Result<Vec<ProcessSample>, SampleError> {
        let tables = self.tables.lock().await;
        let table = tables.as_ref().map(|tables| match kind {
            SampleKind::Cpu => &tables.cpu,
            SampleKind::Memory => &tables.memory,
        });

        match table {
            Some(table) if !table.is_empty() => Ok(table.clone()),
            _ => Err(SampleError::NoData(kind.label())),
        }
    }

    /// Drop both tables
    pub async fn clear(&self) {
        debug!("clearing process samples");
        *self.tables.lock().await = None;
    }
}
