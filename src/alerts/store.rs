use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::definition::{ALERT_FILE_EXTENSION, AlertDefinition, parse_alert_file};

/// Outcome of one directory reload
#[derive(Debug, Default)]
pub struct ReloadReport {
    /// Number of definitions in the new table
    pub loaded: usize,

    /// Files that failed validation, with the reason
    pub rejected: Vec<(PathBuf, String)>,
}

/// Table of alert definitions loaded from a directory
///
/// Definitions are keyed by the path of their file. Reloading keeps the
/// `last_sent` stamp of every path that survives, so a reload never resets
/// a pending alert's schedule.
#[derive(Debug)]
pub struct AlertStore {
    dir: PathBuf,
    table: Mutex<BTreeMap<PathBuf, AlertDefinition>>,
}

impl AlertStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            table: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the alert directory if it does not exist yet
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    async fn scan(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = vec![];

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_definition = path
                .extension()
                .is_some_and(|extension| extension == ALERT_FILE_EXTENSION);

            // follows symlinks; dangling links are skipped
            if is_definition
                && tokio::fs::metadata(&path)
                    .await
                    .is_ok_and(|metadata| metadata.is_file())
            {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Re-read the directory and replace the table.
    ///
    /// Files are parsed without holding the lock; timestamps are carried over
    /// while swapping, so a concurrent `due_alerts` stamp is never lost. If the
    /// directory cannot be listed the current table is kept.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn reload(&self) -> ReloadReport {
        let files = match self.scan().await {
            Ok(files) => files,
            Err(e) => {
                error!("error scanning alerts directory: {e}");
                let loaded = self.table.lock().await.len();
                return ReloadReport {
                    loaded,
                    ..Default::default()
                };
            }
        };

        let mut report = ReloadReport::default();
        let mut fresh = BTreeMap::new();

        for path in files {
            match parse_alert_file(&path).await {
                Ok(alert) => {
                    debug!("loaded alert: {}, interval: {:?}", alert.name, alert.interval);
                    fresh.insert(path, alert);
                }
                Err(e) => {
                    warn!("error parsing alert file {}: {e}", path.display());
                    report.rejected.push((path, e.to_string()));
                }
            }
        }

        let mut table = self.table.lock().await;
        for (path, alert) in fresh.iter_mut() {
            if let Some(previous) = table.get(path) {
                alert.last_sent = previous.last_sent;
            }
        }

        report.loaded = fresh.len();
        *table = fresh;

        report
    }

    /// Select every alert whose interval elapsed and stamp it as sent at `now`.
    ///
    /// Selection and stamping happen under one lock, so overlapping checks
    /// cannot both pick the same alert.
    pub async fn due_alerts(&self, now: DateTime<Utc>) -> Vec<AlertDefinition> {
        let mut table = self.table.lock().await;

        let due: Vec<AlertDefinition> = table
            .values_mut()
            .filter(|alert| alert.is_due(now))
            .map(|alert| {
                alert.last_sent = Some(now);
                alert.clone()
            })
            .collect();

        if !due.is_empty() {
            info!("{} custom alerts due", due.len());
        }

        due
    }

    /// Copy of the current table, ordered by path
    pub async fn snapshot(&self) -> Vec<AlertDefinition> {
        self.table.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.is_empty()
    }
}
