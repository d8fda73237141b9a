use crate::commit::{commit, LocalStorage, Storage};
use crate::config::ConversionOptions;
use crate::constants::RETRY_DELAY;
use crate::error::{ErrorKind, NormalizeError, Result};
use crate::filter::ConversionJob;
use crate::inflight::{Claim, InFlight};
use crate::transform::transform;
use crate::utils::{calculate_compression_ratio, format_file_size};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionStats {
    pub source_size: u64,
    pub output_size: u64,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Output on disk came from a different source, or is newer than this one.
    OutputExists,
    /// Source disappeared before the job started.
    SourceMissing,
    /// Another job for the same path is still running.
    InFlight,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::OutputExists => "output already exists",
            SkipReason::SourceMissing => "source no longer exists",
            SkipReason::InFlight => "conversion already in progress",
        };
        f.write_str(text)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Converted(ConversionStats),
    Skipped(SkipReason),
    Failed(NormalizeError),
}

#[derive(Debug)]
pub struct ConversionResult {
    pub job: ConversionJob,
    pub outcome: Outcome,
}

impl ConversionResult {
    pub fn is_converted(&self) -> bool {
        matches!(self.outcome, Outcome::Converted(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    /// The single per-file log line.
    pub fn log(&self) {
        let path = self.job.input.display();
        match &self.outcome {
            Outcome::Converted(stats) => {
                tracing::info!(
                    path = %path,
                    output = %self.job.output.display(),
                    size = %format!(
                        "{} -> {}",
                        format_file_size(stats.source_size),
                        format_file_size(stats.output_size)
                    ),
                    saved = %format!(
                        "{:.1}%",
                        calculate_compression_ratio(stats.source_size, stats.output_size)
                    ),
                    dimensions = %format!("{}x{}", stats.width, stats.height),
                    resized = stats.resized,
                    "Converted"
                );
            }
            Outcome::Skipped(SkipReason::OutputExists) => {
                tracing::info!(path = %path, reason = %SkipReason::OutputExists, "Skipped");
            }
            Outcome::Skipped(reason) => {
                tracing::debug!(path = %path, reason = %reason, "Skipped");
            }
            Outcome::Failed(err) => match err.kind() {
                ErrorKind::Delete => tracing::warn!(
                    path = %path,
                    kind = %err.kind(),
                    error = %err,
                    "Original not removed; both files remain until the next pass"
                ),
                _ => tracing::error!(path = %path, kind = %err.kind(), error = %err, "Failed"),
            },
        }
    }
}

/// Runs jobs through transform and commit with the configured retry policy.
#[derive(Clone)]
pub struct JobRunner {
    options: ConversionOptions,
    storage: Arc<dyn Storage>,
    in_flight: Arc<InFlight>,
}

impl JobRunner {
    pub fn new(options: ConversionOptions) -> Self {
        Self::with_storage(options, Arc::new(LocalStorage))
    }

    pub fn with_storage(options: ConversionOptions, storage: Arc<dyn Storage>) -> Self {
        Self {
            options,
            storage,
            in_flight: InFlight::new(),
        }
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn in_flight(&self) -> &Arc<InFlight> {
        &self.in_flight
    }

    /// Reserve the job's output path ahead of running it.
    pub fn claim(&self, job: &ConversionJob) -> Option<Claim> {
        self.in_flight.try_claim(&job.output)
    }

    /// Filter `path`, then run it. `None` when the path is not eligible.
    pub fn run_path(&self, path: &Path) -> Option<ConversionResult> {
        ConversionJob::for_path(path, &self.options).map(|job| self.run(job))
    }

    pub fn run(&self, job: ConversionJob) -> ConversionResult {
        match self.claim(&job) {
            Some(claim) => self.run_claimed(job, claim),
            None => ConversionResult {
                job,
                outcome: Outcome::Skipped(SkipReason::InFlight),
            },
        }
    }

    /// Run a job whose output was already reserved; the claim is released on return.
    pub fn run_claimed(&self, job: ConversionJob, claim: Claim) -> ConversionResult {
        let outcome = self.execute(&job);
        drop(claim);
        ConversionResult { job, outcome }
    }

    fn execute(&self, job: &ConversionJob) -> Outcome {
        if !job.input.is_file() {
            return Outcome::Skipped(SkipReason::SourceMissing);
        }

        let mut attempt = 0;
        loop {
            match self.convert_once(job) {
                Ok(outcome) => return outcome,
                Err(err) if err.is_retryable() && attempt < self.options.retries => {
                    attempt += 1;
                    tracing::debug!(
                        path = %job.input.display(),
                        attempt,
                        error = %err,
                        "Retrying"
                    );
                    thread::sleep(RETRY_DELAY);
                }
                Err(err) => return Outcome::Failed(err),
            }
        }
    }

    fn convert_once(&self, job: &ConversionJob) -> Result<Outcome> {
        let encoded = transform(job, self.options.allow_oversized)?;
        if !self.options.replace_existing && output_conflicts(job, &encoded.bytes)? {
            return Ok(Outcome::Skipped(SkipReason::OutputExists));
        }
        let report = commit(self.storage.as_ref(), &job.input, &job.output, &encoded.bytes)?;

        Ok(Outcome::Converted(ConversionStats {
            source_size: encoded.source_size,
            output_size: report.output_size,
            width: encoded.width,
            height: encoded.height,
            resized: encoded.was_resized(),
        }))
    }
}

/// Whether an existing output must be left alone.
///
/// Encoding is deterministic, so an output byte-identical to `encoded` was
/// produced from this source by an earlier pass whose delete failed; the
/// commit is safe to repeat. Any other output is replaced only when the
/// source was modified after it was written. Otherwise it belongs to a
/// different source sharing the stem.
fn output_conflicts(job: &ConversionJob, encoded: &[u8]) -> Result<bool> {
    let existing = match fs::metadata(&job.output) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if existing.len() == encoded.len() as u64 && fs::read(&job.output)? == encoded {
        tracing::debug!(path = %job.output.display(), "Output already matches source");
        return Ok(false);
    }

    let source_modified = fs::metadata(&job.input)?.modified()?;
    Ok(existing.modified()? >= source_modified)
}
