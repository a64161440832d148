use crate::{Config, CoreError};
use cfshift_schema::{
    compute_fingerprint, parse_manifest_file, AppFingerprint, Application, ManifestDocument,
    NormalizeError, NormalizeOptions,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// What happened to one application of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Normalized {
        application: Box<Application>,
        fingerprint: AppFingerprint,
    },
    Failed {
        kind: String,
        path: String,
        error: String,
    },
    /// Not attempted because an earlier application failed in fail-fast mode.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub index: usize,
    /// Name as written in the manifest, when one could be read.
    pub name: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub normalized: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub source: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    fn new(source: Option<String>, entries: Vec<BatchEntry>) -> Self {
        let mut summary = BatchSummary {
            total: entries.len(),
            ..BatchSummary::default()
        };
        for entry in &entries {
            match entry.outcome {
                Outcome::Normalized { .. } => summary.normalized += 1,
                Outcome::Failed { .. } => summary.failed += 1,
                Outcome::Skipped => summary.skipped += 1,
            }
        }
        Self {
            source,
            generated_at: Utc::now(),
            summary,
            entries,
        }
    }

    pub fn is_success(&self) -> bool {
        self.summary.failed == 0 && self.summary.skipped == 0
    }

    /// Successfully normalized applications, in manifest order.
    pub fn applications(&self) -> impl Iterator<Item = &Application> {
        self.entries.iter().filter_map(|e| match &e.outcome {
            Outcome::Normalized { application, .. } => Some(application.as_ref()),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failed { .. }))
    }
}

/// Normalize every application of `doc`. Each application succeeds or fails
/// on its own; the report records all outcomes.
pub fn normalize_batch(
    doc: &ManifestDocument,
    config: &Config,
    source: Option<String>,
) -> Result<BatchReport, CoreError> {
    let options = config.normalize_options();
    let total = doc.applications.len();
    info!(
        "normalizing {total} application(s) from {} with {} worker(s)",
        source.as_deref().unwrap_or("<memory>"),
        config.workers
    );

    let results = if config.fail_fast {
        if config.workers > 1 {
            debug!("fail_fast set, normalizing sequentially");
        }
        run_until_failure(doc, &options)
    } else if config.workers > 1 && total > 1 {
        run_parallel(doc, &options, config.workers)?
    } else {
        doc.normalize_each(&options).into_iter().map(Some).collect()
    };

    let mut entries = Vec::with_capacity(total);
    for (index, result) in results.into_iter().enumerate() {
        let name = doc.application_name(index).map(str::to_owned);
        let outcome = match result {
            Some(Ok(application)) => Outcome::Normalized {
                fingerprint: compute_fingerprint(&application)?,
                application: Box::new(application),
            },
            Some(Err(e)) => {
                warn!("application {index} failed: {e}");
                failed(&e)
            }
            None => Outcome::Skipped,
        };
        entries.push(BatchEntry {
            index,
            name,
            outcome,
        });
    }
    Ok(BatchReport::new(source, entries))
}

/// Load a manifest file and normalize it as a batch.
pub fn normalize_file(path: &Path, config: &Config) -> Result<BatchReport, CoreError> {
    let doc = parse_manifest_file(path)?;
    normalize_batch(&doc, config, Some(path.display().to_string()))
}

fn failed(e: &NormalizeError) -> Outcome {
    Outcome::Failed {
        kind: e.kind().to_owned(),
        path: e.path().to_string(),
        error: e.to_string(),
    }
}

type Slot = Option<Result<Application, NormalizeError>>;

fn run_until_failure(doc: &ManifestDocument, options: &NormalizeOptions) -> Vec<Slot> {
    let mut out: Vec<Slot> = Vec::with_capacity(doc.applications.len());
    let mut stopped = false;
    for index in 0..doc.applications.len() {
        if stopped {
            out.push(None);
            continue;
        }
        let result = doc.normalize_one(index, options);
        stopped = matches!(result, Some(Err(_)));
        out.push(result);
    }
    out
}

fn run_parallel(
    doc: &ManifestDocument,
    options: &NormalizeOptions,
    workers: usize,
) -> Result<Vec<Slot>, CoreError> {
    let indices: Vec<usize> = (0..doc.applications.len()).collect();
    let chunk_size = indices.len().div_ceil(workers).max(1);

    std::thread::scope(|scope| {
        let handles: Vec<_> = indices
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|&i| doc.normalize_one(i, options))
                        .collect::<Vec<Slot>>()
                })
            })
            .collect();

        let mut out = Vec::with_capacity(indices.len());
        for handle in handles {
            out.extend(handle.join().map_err(|_| CoreError::WorkerPanicked)?);
        }
        Ok(out)
    })
}
