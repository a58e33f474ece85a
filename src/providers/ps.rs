//! Top-N process tables via the `ps` utility

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::ProviderError;
use crate::samples::{ProcessSample, ProcessUsage, SampleKind};

use super::ProcessProvider;

const PS: &str = "ps";

/// Columns requested from `ps`, in this order
const PS_COLUMNS: &str = "pid,user,%cpu,rss,comm";

/// Process provider backed by `ps axo ... --sort=...`
#[derive(Debug, Clone, Default)]
pub struct PsProcessProvider;

impl PsProcessProvider {
    pub fn new() -> Self {
        Self
    }
}

fn sort_key(kind: SampleKind) -> &'static str {
    match kind {
        SampleKind::Cpu => "--sort=-%cpu",
        SampleKind::Memory => "--sort=-rss",
    }
}

/// Parse `ps` output into at most `top_n` samples of `kind`
///
/// The first line is the column header. Rows that do not parse are skipped
/// with a warning; a command name containing spaces is joined back together.
pub fn parse_ps_output(output: &str, kind: SampleKind, top_n: usize) -> Vec<ProcessSample> {
    output
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_ps_line(line, kind) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("skipping ps line: {e}");
                None
            }
        })
        .take(top_n)
        .collect()
}

fn parse_ps_line(line: &str, kind: SampleKind) -> Result<ProcessSample, ProviderError> {
    let malformed = |what| ProviderError::Malformed {
        what,
        line: line.to_string(),
    };

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(malformed("ps line"));
    }

    let pid: u32 = fields[0].parse().map_err(|_| malformed("pid"))?;
    let cpu: f64 = fields[2].parse().map_err(|_| malformed("cpu percent"))?;
    let rss: u64 = fields[3].parse().map_err(|_| malformed("rss"))?;

    let usage = match kind {
        SampleKind::Cpu => ProcessUsage::CpuPercent(cpu),
        SampleKind::Memory => ProcessUsage::RssKb(rss),
    };

    Ok(ProcessSample {
        pid,
        name: fields[4..].join(" "),
        username: fields[1].to_string(),
        usage,
    })
}

#[async_trait]
impl ProcessProvider for PsProcessProvider {
    #[instrument(skip(self))]
    async fn top_processes(
        &self,
        kind: SampleKind,
        top_n: usize,
    ) -> Result<Vec<ProcessSample>, ProviderError> {
        let sort = sort_key(kind);
        let output = Command::new(PS)
            .args(["axo", PS_COLUMNS, sort])
            .output()
            .await
            .map_err(|source| ProviderError::Spawn {
                command: PS.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let samples = parse_ps_output(&stdout, kind, top_n);

        if !output.status.success() {
            if samples.is_empty() {
                return Err(ProviderError::CommandFailed {
                    command: format!("{PS} axo {PS_COLUMNS} {sort}"),
                    status: output.status.to_string(),
                });
            }
            warn!("ps exited with {} after producing output", output.status);
        }

        debug!("parsed {} {kind} process rows", samples.len());
        Ok(samples)
    }
}
