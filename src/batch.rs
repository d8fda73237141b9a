use crate::config::PipelineConfig;
use crate::error::Result;
use crate::filter::is_eligible;
use crate::job::{ConversionResult, JobRunner, Outcome};
use crate::utils::{calculate_compression_ratio, create_progress_bar, format_file_size};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Totals reported at the end of a walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn record(&mut self, result: &ConversionResult) {
        match &result.outcome {
            Outcome::Converted(stats) => {
                self.converted += 1;
                self.bytes_before += stats.source_size;
                self.bytes_after += stats.output_size;
            }
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn total(&self) -> usize {
        self.converted + self.skipped + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "converted={} skipped={} failed={}",
            self.converted, self.skipped, self.failed
        )
    }
}

/// One-shot conversion of every eligible file under the configured root.
pub struct BatchWalker {
    config: PipelineConfig,
    runner: JobRunner,
    quiet: bool,
}

impl BatchWalker {
    pub fn new(config: PipelineConfig) -> Self {
        let runner = JobRunner::new(config.options.clone());
        Self::with_runner(config, runner)
    }

    pub fn with_runner(config: PipelineConfig, runner: JobRunner) -> Self {
        Self {
            config,
            runner,
            quiet: false,
        }
    }

    /// Hide the progress bar.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn run(&self) -> Result<BatchSummary> {
        let start_time = Instant::now();
        tracing::info!(
            root = %self.config.root.display(),
            recursive = self.config.recursive,
            max_width = %self.config.options.resize,
            quality = self.config.options.quality,
            workers = self.config.workers,
            "Starting batch conversion"
        );

        let files = collect_candidates(&self.config.root, self.config.recursive)?;
        let mut summary = BatchSummary::default();
        if files.is_empty() {
            tracing::info!("No eligible images found");
            summary.elapsed = start_time.elapsed();
            return Ok(summary);
        }
        tracing::info!(count = files.len(), "Found eligible images");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()?;

        let progress = create_progress_bar(files.len() as u64, self.quiet);
        let results: Vec<ConversionResult> = pool.install(|| {
            files
                .par_iter()
                .filter_map(|path| {
                    let result = self.runner.run_path(path);
                    if let Some(result) = &result {
                        progress.suspend(|| result.log());
                    }
                    progress.inc(1);
                    result
                })
                .collect()
        });
        progress.finish_and_clear();

        for result in &results {
            summary.record(result);
        }
        summary.elapsed = start_time.elapsed();

        tracing::info!(
            converted = summary.converted,
            skipped = summary.skipped,
            failed = summary.failed,
            before = %format_file_size(summary.bytes_before),
            after = %format_file_size(summary.bytes_after),
            saved = %format!(
                "{:.1}%",
                calculate_compression_ratio(summary.bytes_before, summary.bytes_after)
            ),
            elapsed = ?summary.elapsed,
            "Batch conversion complete"
        );

        Ok(summary)
    }
}

/// Eligible files under `root`, hidden entries excluded, sorted for stable order.
pub fn collect_candidates(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let walker = if recursive {
        WalkDir::new(root)
    } else {
        WalkDir::new(root).max_depth(1)
    };

    let mut files = Vec::new();
    for entry in walker
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_file() && is_eligible(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}
