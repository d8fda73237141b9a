//! Continuous conversion of images dropped into the watch root.
//!
//! Raw `notify` events are forwarded into a channel; the dispatcher drains
//! that channel, waits for each path to settle, and hands eligible paths to a
//! bounded worker pool. The dispatcher only sees a `Receiver<PathBuf>`, so
//! tests drive it with synthetic events.

use crate::config::PipelineConfig;
use crate::constants::WATCH_POLL_INTERVAL;
use crate::error::Result;
use crate::filter::{is_hidden, CandidateFile, ConversionJob};
use crate::job::JobRunner;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use rayon::ThreadPool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Instant;

/// Subscribe to create and modify events under `root`, forwarding
/// non-hidden paths to `tx`. Events stop when the returned watcher is dropped.
pub fn subscribe(root: &Path, tx: Sender<PathBuf>) -> Result<RecommendedWatcher> {
    let watch_root = root.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if !(event.kind.is_create() || event.kind.is_modify()) {
                return;
            }
            for path in event.paths {
                if !is_hidden(&watch_root, &path) {
                    let _ = tx.send(path);
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "Watch error"),
    })?;

    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

/// Counters for one watch session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchReport {
    /// Jobs handed to the worker pool.
    pub dispatched: usize,
    /// Events for paths that are not eligible sources.
    pub ignored: usize,
    /// Settled paths whose output was already being produced.
    pub busy: usize,
    /// Pending paths dropped because a stop was requested.
    pub discarded: usize,
}

pub struct DirectoryWatcher {
    config: PipelineConfig,
    runner: JobRunner,
    stop: Arc<AtomicBool>,
}

impl DirectoryWatcher {
    pub fn new(config: PipelineConfig) -> Self {
        let runner = JobRunner::new(config.options.clone());
        Self::with_runner(config, runner)
    }

    pub fn with_runner(config: PipelineConfig, runner: JobRunner) -> Self {
        Self {
            config,
            runner,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting this flag stops observation; running jobs still finish.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Watch the configured root until the stop flag is set.
    pub fn run(&self) -> Result<WatchReport> {
        let pool = self.build_pool()?;
        let (tx, rx) = mpsc::channel();
        let watcher = subscribe(&self.config.root, tx)?;
        tracing::info!(
            root = %self.config.root.display(),
            max_width = %self.config.options.resize,
            quality = self.config.options.quality,
            workers = self.config.workers,
            "Watching for new images"
        );

        let report = self.dispatch_events(&rx, &pool);
        drop(watcher);
        self.finish(report)
    }

    /// Drive the dispatcher from an arbitrary event source. Returns once the
    /// stop flag is set or every sender is gone, after in-flight jobs finish.
    pub fn run_with_events(&self, events: Receiver<PathBuf>) -> Result<WatchReport> {
        let pool = self.build_pool()?;
        let report = self.dispatch_events(&events, &pool);
        self.finish(report)
    }

    fn build_pool(&self) -> Result<ThreadPool> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("img-normalize-worker-{}", i))
            .build()?)
    }

    fn finish(&self, report: WatchReport) -> Result<WatchReport> {
        let in_flight = self.runner.in_flight();
        if !in_flight.is_empty() {
            tracing::info!(jobs = in_flight.len(), "Waiting for in-flight conversions");
        }
        in_flight.wait_idle();
        tracing::info!(
            dispatched = report.dispatched,
            ignored = report.ignored,
            busy = report.busy,
            "Watcher stopped"
        );
        Ok(report)
    }

    fn dispatch_events(&self, events: &Receiver<PathBuf>, pool: &ThreadPool) -> WatchReport {
        let mut report = WatchReport::default();
        let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

        loop {
            if self.stop.load(Ordering::SeqCst) {
                report.discarded = pending.len();
                tracing::info!(discarded = report.discarded, "Stop requested");
                break;
            }

            match events.recv_timeout(WATCH_POLL_INTERVAL) {
                Ok(path) => self.observe(&mut pending, &mut report, path),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Source is gone: nothing more can arrive, so flush everything.
                    let mut remaining: Vec<PathBuf> = pending.drain().map(|(p, _)| p).collect();
                    remaining.sort();
                    for path in remaining {
                        self.dispatch(pool, &mut report, path);
                    }
                    break;
                }
            }

            let now = Instant::now();
            let mut settled: Vec<PathBuf> = pending
                .iter()
                .filter(|(_, seen)| now.duration_since(**seen) >= self.config.settle)
                .map(|(path, _)| path.clone())
                .collect();
            settled.sort();
            for path in settled {
                pending.remove(&path);
                self.dispatch(pool, &mut report, path);
            }
        }

        report
    }

    fn observe(
        &self,
        pending: &mut HashMap<PathBuf, Instant>,
        report: &mut WatchReport,
        path: PathBuf,
    ) {
        if is_hidden(&self.config.root, &path) || CandidateFile::from_path(&path).is_none() {
            tracing::trace!(path = %path.display(), "Ignoring event");
            report.ignored += 1;
            return;
        }
        // Repeated events restart the settle window.
        pending.insert(path, Instant::now());
    }

    fn dispatch(&self, pool: &ThreadPool, report: &mut WatchReport, path: PathBuf) {
        let Some(candidate) = CandidateFile::from_path(path) else {
            return;
        };
        let job = ConversionJob::new(&candidate, self.runner.options());
        let Some(claim) = self.runner.claim(&job) else {
            tracing::debug!(path = %job.input.display(), "Conversion already in progress, skipping");
            report.busy += 1;
            return;
        };

        report.dispatched += 1;
        let runner = self.runner.clone();
        let stop = Arc::clone(&self.stop);
        pool.spawn(move || {
            if stop.load(Ordering::SeqCst) {
                tracing::debug!(path = %job.input.display(), "Dropping queued job on shutdown");
                return;
            }
            runner.run_claimed(job, claim).log();
        });
    }
}
