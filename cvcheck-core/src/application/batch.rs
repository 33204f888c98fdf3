// cvcheck-core/src/application/batch.rs

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, instrument, warn};

use super::engine::ComplianceEngine;
use crate::domain::scoring::ComplianceReport;
use crate::ports::{DatasetOpener, VocabularyClient};

/// Shared stop flag. Once set, no further file is submitted.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Checked(ComplianceReport),
    Unreadable { path: String, reason: String },
}

impl FileOutcome {
    pub fn path(&self) -> &str {
        match self {
            FileOutcome::Checked(report) => &report.file_path,
            FileOutcome::Unreadable { path, .. } => path,
        }
    }

    pub fn report(&self) -> Option<&ComplianceReport> {
        match self {
            FileOutcome::Checked(report) => Some(report),
            FileOutcome::Unreadable { .. } => None,
        }
    }
}

/// Checks every path with at most `jobs` files in flight.
///
/// Results come back in input order. Files not yet submitted when `cancel`
/// fires are absent from the result.
#[instrument(skip_all, fields(files = paths.len(), jobs = jobs))]
pub async fn run_batch(
    engine: Arc<ComplianceEngine>,
    opener: Arc<dyn DatasetOpener>,
    vocabulary: Arc<dyn VocabularyClient>,
    paths: Vec<PathBuf>,
    jobs: usize,
    cancel: CancellationToken,
) -> Vec<FileOutcome> {
    let jobs = jobs.max(1);

    let submissions = stream::iter(paths)
        .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
        .map(|path| {
            let engine = Arc::clone(&engine);
            let opener = Arc::clone(&opener);
            let vocabulary = Arc::clone(&vocabulary);
            async move {
                let shown = path.display().to_string();
                let task = tokio::task::spawn_blocking(move || {
                    check_file(&engine, opener.as_ref(), vocabulary.as_ref(), &path)
                });
                match task.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(file = %shown, error = %e, "Worker failed");
                        FileOutcome::Unreadable {
                            path: shown,
                            reason: format!("worker failed: {}", e),
                        }
                    }
                }
            }
        });

    let outcomes: Vec<FileOutcome> = submissions.buffered(jobs).collect().await;

    if cancel.is_cancelled() {
        warn!(completed = outcomes.len(), "Batch cancelled");
    } else {
        info!(completed = outcomes.len(), "Batch finished");
    }
    outcomes
}

fn check_file(
    engine: &ComplianceEngine,
    opener: &dyn DatasetOpener,
    vocabulary: &dyn VocabularyClient,
    path: &std::path::Path,
) -> FileOutcome {
    match opener.open(path) {
        Ok(dataset) => FileOutcome::Checked(engine.run(dataset.as_ref(), vocabulary)),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "Dataset could not be opened");
            FileOutcome::Unreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        }
    }
}
