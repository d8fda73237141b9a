use anyhow::{Context, Result};
use clap::Parser;
use img_normalize::cli::{Args, Commands};
use img_normalize::{logger, BatchWalker, DirectoryWatcher};
use std::future::Future;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tokio::task::{JoinError, JoinHandle};

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logger::init(args.verbose, args.quiet);

    let config = args.command.to_config()?;
    match args.command {
        Commands::Watch { .. } => run_watcher(DirectoryWatcher::new(config)),
        Commands::Batch { .. } => {
            let summary = BatchWalker::new(config).quiet(args.quiet).run()?;
            println!("{}", summary);
            if summary.has_failures() {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Run the watcher on a blocking thread until Ctrl-C, then let it drain.
/// A second Ctrl-C abandons the drain.
fn run_watcher(watcher: DirectoryWatcher) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start signal runtime")?;

    runtime.block_on(async move {
        let stop = watcher.stop_handle();
        let mut handle = tokio::task::spawn_blocking(move || watcher.run());

        let report = tokio::select! {
            res = &mut handle => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down, press Ctrl-C again to abort");
                stop.store(true, Ordering::SeqCst);
                let second_interrupt = async {
                    let _ = tokio::signal::ctrl_c().await;
                };
                match drain(&mut handle, second_interrupt).await {
                    Some(res) => res,
                    None => {
                        // Dropping the runtime would wait on the blocking task.
                        tracing::warn!("Aborted while conversions were still running");
                        std::process::exit(130);
                    }
                }
            }
        };

        report.context("Watcher task panicked")??;
        Ok::<ExitCode, anyhow::Error>(ExitCode::SUCCESS)
    })
}

/// Wait for the watcher task to finish; `None` if `abort` resolves first.
async fn drain<T>(
    handle: &mut JoinHandle<T>,
    abort: impl Future<Output = ()>,
) -> Option<std::result::Result<T, JoinError>> {
    tokio::select! {
        res = handle => Some(res),
        _ = abort => None,
    }
}
