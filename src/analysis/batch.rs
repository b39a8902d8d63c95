//! Batch processing of many job scripts.
//!
//! Scripts are read and extracted on blocking workers, at most
//! `concurrency` at a time. Every outcome is sent over a channel to a single
//! aggregation task, which is the only owner of the module counter and the
//! batch statistics.

use super::aggregator::ModuleCounter;
use crate::error::ScriptError;
use crate::extract::Extractor;
use crate::jobxml;
use crate::models::{BatchStats, CountBy, ScriptRecord};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Options for a batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum number of scripts extracted at the same time.
    pub concurrency: usize,
    /// Key each loaded module contributes to the counter.
    pub count_by: CountBy,
    /// Attach the companion `.JB` job record to each script.
    pub job_records: bool,
    /// Whether to show progress.
    pub show_progress: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            count_by: CountBy::Module,
            job_records: false,
            show_progress: false,
        }
    }
}

/// What happened to one script.
#[derive(Debug)]
pub enum ScanOutcome {
    Parsed(ScriptRecord),
    Unreadable(ScriptError),
}

/// Counter and statistics of a finished batch.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub counter: ModuleCounter,
    pub stats: BatchStats,
}

impl BatchResult {
    fn absorb(&mut self, outcome: ScanOutcome, count_by: CountBy) {
        match outcome {
            ScanOutcome::Parsed(record) => {
                debug!(
                    "{}: {} modules, toolchain {}",
                    record.path().display(),
                    record.loaded().len(),
                    record.toolchain_year()
                );
                self.stats.observe(&record);
                self.counter.record(&record, count_by);
            }
            ScanOutcome::Unreadable(e) => {
                warn!("{}", e);
                self.stats.observe_unreadable();
            }
        }
    }
}

/// Extract and count every script in `paths`.
pub async fn run_batch(
    paths: Vec<PathBuf>,
    extractor: Arc<Extractor>,
    options: &BatchOptions,
) -> Result<BatchResult> {
    info!(
        "Processing {} scripts with {} workers",
        paths.len(),
        options.concurrency
    );

    let progress = options.show_progress.then(|| progress_bar(paths.len() as u64));
    let (tx, rx) = mpsc::channel(options.concurrency.max(1) * 2);
    let aggregator = spawn_aggregator(rx, options.count_by, progress.clone());

    let job_records = options.job_records;
    let mut outcomes = stream::iter(paths)
        .map(|path| {
            let extractor = Arc::clone(&extractor);
            async move {
                let worker_path = path.clone();
                let joined = tokio::task::spawn_blocking(move || {
                    process_script(&worker_path, &extractor, job_records)
                })
                .await;
                joined.unwrap_or_else(|e| {
                    ScanOutcome::Unreadable(ScriptError::Unreadable {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    })
                })
            }
        })
        .buffer_unordered(options.concurrency.max(1));

    while let Some(outcome) = outcomes.next().await {
        tx.send(outcome)
            .await
            .context("aggregation task stopped early")?;
    }
    drop(tx);

    let result = aggregator.await.context("aggregation task failed")?;

    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    Ok(result)
}

/// Start the task that owns the counter and consumes outcomes until every
/// sender is dropped.
pub fn spawn_aggregator(
    mut rx: mpsc::Receiver<ScanOutcome>,
    count_by: CountBy,
    progress: Option<ProgressBar>,
) -> JoinHandle<BatchResult> {
    tokio::spawn(async move {
        let mut result = BatchResult::default();
        while let Some(outcome) = rx.recv().await {
            result.absorb(outcome, count_by);
            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }
        result
    })
}

/// Read one script, extract it and optionally attach its job record.
pub fn process_script(path: &Path, extractor: &Extractor, job_records: bool) -> ScanOutcome {
    let record = match ScriptRecord::read(path, extractor) {
        Ok(record) => record,
        Err(e) => return ScanOutcome::Unreadable(e),
    };

    if !job_records {
        return ScanOutcome::Parsed(record);
    }

    match jobxml::read_companion(path) {
        Ok(job) => ScanOutcome::Parsed(record.with_job(job)),
        Err(e) => {
            warn!("{}", e);
            ScanOutcome::Parsed(record)
        }
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
