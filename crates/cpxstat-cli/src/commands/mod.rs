pub mod instances;
pub mod services;

use std::io::Write;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use cpxstat_core::Snapshot;
use cpxstat_registry::{MetricsSource, SnapshotFetcher, Watcher};

use crate::render::{OutputFormat, render_error};

/// Clear the terminal and home the cursor.
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Redraw `render`'s frame on stdout every `interval` until Ctrl-C.
pub async fn watch<S, F>(
    fetcher: SnapshotFetcher<S>,
    interval: Duration,
    format: OutputFormat,
    render: F,
) -> anyhow::Result<()>
where
    S: MetricsSource,
    F: FnMut(&Snapshot) -> anyhow::Result<String>,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => warn!(error = %e, "failed to listen for ctrl-c, stopping watch"),
        }
        let _ = shutdown_tx.send(true);
    });

    let mut stdout = std::io::stdout();
    run_watch(
        Watcher::new(fetcher, interval),
        shutdown_rx,
        format,
        render,
        &mut stdout,
    )
    .await;
    Ok(())
}

/// Drive `watcher`, writing one frame per cycle to `out`.
///
/// Failed cycles are written as an error frame and the loop carries on.
/// Table frames clear the screen first; JSON frames are appended.
pub async fn run_watch<S, F, W>(
    watcher: Watcher<S>,
    shutdown: watch::Receiver<bool>,
    format: OutputFormat,
    mut render: F,
    out: &mut W,
) -> u64
where
    S: MetricsSource,
    F: FnMut(&Snapshot) -> anyhow::Result<String>,
    W: Write,
{
    watcher
        .run(shutdown, |result| {
            let frame = match result {
                Ok(snapshot) => render(&snapshot).unwrap_or_else(|e| render_error(&*e, format)),
                Err(e) => render_error(&e, format),
            };
            let prefix = match format {
                OutputFormat::Table => CLEAR_SCREEN,
                OutputFormat::Json => "",
            };
            let written = write!(out, "{prefix}{frame}").and_then(|()| out.flush());
            if let Err(e) = written {
                warn!(error = %e, "failed to write watch frame");
            }
        })
        .await
}
