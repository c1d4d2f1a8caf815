//! Batch runner: one worker per file, each file behind a timeout.
//!
//! Workers pull jobs from a shared queue and run the (blocking) locate call
//! on tokio's blocking pool. A document that exceeds its timeout is reported
//! as [`BatchOutcome::TimedOut`] and the batch moves on; the extraction
//! thread itself cannot be interrupted and is left to finish on its own.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{CitationLocationResult, LocatorEvent, SourcePublication};

/// Anything that can run the full locate pipeline on one file.
pub trait DocumentLocator: Send + Sync {
    fn locate(
        &self,
        publication: &SourcePublication,
        path: &Path,
        progress: &dyn Fn(LocatorEvent),
    ) -> CitationLocationResult;
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub num_workers: usize,
    pub timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Completed(CitationLocationResult),
    TimedOut,
    Cancelled,
    /// The locator panicked.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct BatchItem {
    pub index: usize,
    pub path: PathBuf,
    pub outcome: BatchOutcome,
}

/// Progress events emitted by [`locate_batch`].
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    Locator {
        index: usize,
        event: LocatorEvent,
    },
    Finished {
        index: usize,
        total: usize,
        path: PathBuf,
        outcome: BatchOutcome,
    },
}

type Progress = Arc<dyn Fn(BatchEvent) + Send + Sync>;

/// Locate `publication` in every file of `paths`.
///
/// Returns one item per input path, in input order, regardless of how each
/// file ended.
pub async fn locate_batch(
    locator: Arc<dyn DocumentLocator>,
    publication: Arc<SourcePublication>,
    paths: Vec<PathBuf>,
    config: BatchConfig,
    progress: impl Fn(BatchEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> Vec<BatchItem> {
    let total = paths.len();
    if total == 0 {
        return vec![];
    }
    let progress: Progress = Arc::new(progress);

    let (job_tx, job_rx) = async_channel::unbounded::<(usize, PathBuf)>();
    for job in paths.iter().cloned().enumerate() {
        // Unbounded and still open, cannot fail.
        let _ = job_tx.send(job).await;
    }
    job_tx.close();

    let (result_tx, result_rx) = async_channel::unbounded::<BatchItem>();
    let num_workers = config.num_workers.max(1).min(total);
    tracing::info!(total, num_workers, timeout = ?config.timeout, "starting batch");

    let mut handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        handles.push(tokio::spawn(worker_loop(
            job_rx.clone(),
            result_tx.clone(),
            Arc::clone(&locator),
            Arc::clone(&publication),
            config.timeout,
            Arc::clone(&progress),
            cancel.clone(),
            total,
        )));
    }
    drop(job_rx);
    drop(result_tx);

    let mut worker_error = None;
    for h in handles {
        if let Err(e) = h.await {
            tracing::error!(error = %e, "batch worker died");
            worker_error = Some(e.to_string());
        }
    }

    let mut slots: Vec<Option<BatchItem>> = vec![None; total];
    while let Ok(item) = result_rx.try_recv() {
        let index = item.index;
        slots[index] = Some(item);
    }
    // A dead worker takes its in-flight document with it.
    slots
        .into_iter()
        .zip(paths)
        .enumerate()
        .map(|(index, (slot, path))| {
            slot.unwrap_or_else(|| BatchItem {
                index,
                path,
                outcome: BatchOutcome::Failed(
                    worker_error
                        .clone()
                        .unwrap_or_else(|| "worker stopped before finishing".into()),
                ),
            })
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    jobs: async_channel::Receiver<(usize, PathBuf)>,
    results: async_channel::Sender<BatchItem>,
    locator: Arc<dyn DocumentLocator>,
    publication: Arc<SourcePublication>,
    timeout: Duration,
    progress: Progress,
    cancel: CancellationToken,
    total: usize,
) {
    while let Ok((index, path)) = jobs.recv().await {
        let outcome = if cancel.is_cancelled() {
            tracing::debug!(path = %path.display(), "skipping: cancelled");
            BatchOutcome::Cancelled
        } else {
            progress(BatchEvent::Started {
                index,
                total,
                path: path.clone(),
            });
            run_one(
                index,
                &path,
                &locator,
                &publication,
                timeout,
                &progress,
                &cancel,
            )
            .await
        };

        progress(BatchEvent::Finished {
            index,
            total,
            path: path.clone(),
            outcome: outcome.clone(),
        });
        let _ = results.send(BatchItem {
            index,
            path,
            outcome,
        })
        .await;
    }
}

async fn run_one(
    index: usize,
    path: &Path,
    locator: &Arc<dyn DocumentLocator>,
    publication: &Arc<SourcePublication>,
    timeout: Duration,
    progress: &Progress,
    cancel: &CancellationToken,
) -> BatchOutcome {
    let task = {
        let locator = Arc::clone(locator);
        let publication = Arc::clone(publication);
        let progress = Arc::clone(progress);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            locator.locate(&publication, &path, &|event| {
                progress(BatchEvent::Locator { index, event })
            })
        })
    };

    tokio::select! {
        _ = cancel.cancelled() => BatchOutcome::Cancelled,
        joined = tokio::time::timeout(timeout, task) => match joined {
            Ok(Ok(result)) => BatchOutcome::Completed(result),
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "locator task failed");
                BatchOutcome::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!(path = %path.display(), ?timeout, "document timed out");
                BatchOutcome::TimedOut
            }
        },
    }
}
