//! Background scheduler
//!
//! Drives the three activity streams: the periodic library scan, the fast
//! retry/processing loop over due wanted items, and the stuck-search
//! watchdog. Shutdown is observed between items, never mid-item; in-flight
//! provider calls are bounded by their own timeouts.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SharedConfig;
use crate::wanted::WantedService;

pub mod library_scan;

pub use library_scan::{LibraryScanner, ScanSummary};

/// Handle for poking the scheduler from the web layer
#[derive(Clone)]
pub struct SchedulerHandle {
    scan_tx: mpsc::UnboundedSender<()>,
}

impl SchedulerHandle {
    /// Request an immediate library scan (fire and forget)
    pub fn request_scan(&self) {
        let _ = self.scan_tx.send(());
    }
}

pub struct SchedulerService {
    wanted: Arc<WantedService>,
    scanner: Arc<LibraryScanner>,
    config: SharedConfig,
    shutdown: CancellationToken,
    scan_rx: mpsc::UnboundedReceiver<()>,
    scan_tx: mpsc::UnboundedSender<()>,
}

impl SchedulerService {
    pub fn new(
        wanted: Arc<WantedService>,
        scanner: Arc<LibraryScanner>,
        config: SharedConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let (scan_tx, scan_rx) = mpsc::unbounded_channel();
        Self {
            wanted,
            scanner,
            config,
            shutdown,
            scan_rx,
            scan_tx,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            scan_tx: self.scan_tx.clone(),
        }
    }

    /// Main loop. Returns when the shutdown token fires.
    pub async fn run(mut self) -> Result<()> {
        let (scan_every, process_every) = {
            let config = self.config.read().await;
            (
                Duration::from_secs(config.library.scan_interval_seconds.max(60)),
                Duration::from_secs(config.search.interval_seconds.max(1)),
            )
        };
        info!(
            "Scheduler started (scan every {}, process every {})",
            humantime::format_duration(scan_every),
            humantime::format_duration(process_every)
        );

        let mut scan_interval = tokio::time::interval(scan_every);
        let mut process_interval = tokio::time::interval(process_every);
        // A missed tick means the previous pass ran long; do not burst
        scan_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        process_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Scheduler shutting down");
                    break;
                }
                _ = scan_interval.tick() => {
                    if let Err(e) = self.scanner.scan().await {
                        error!("Library scan failed: {e}");
                    }
                }
                Some(_) = self.scan_rx.recv() => {
                    info!("On-demand library scan requested");
                    if let Err(e) = self.scanner.scan().await {
                        error!("Library scan failed: {e}");
                    }
                }
                _ = process_interval.tick() => {
                    self.process_due_items().await;
                }
            }
        }
        Ok(())
    }

    /// One processing pass: watchdog, then claim-and-process every due item
    /// under the global concurrency bound
    async fn process_due_items(&self) {
        let (batch_size, concurrency) = {
            let config = self.config.read().await;
            (config.search.batch_size, config.search.concurrency.max(1))
        };

        // Watchdog: every claim stamped its deadline (search timeout plus
        // grace) into retry_after; expired searches go back to the queue
        match self.wanted.repository().revert_stuck_searches(Utc::now()).await {
            Ok(0) => {}
            Ok(reverted) => warn!("Watchdog reverted {reverted} stuck search(es) to wanted"),
            Err(e) => error!("Watchdog failed: {e}"),
        }

        let due = match self.wanted.repository().list_due(Utc::now(), batch_size).await {
            Ok(due) => due,
            Err(e) => {
                error!("Listing due wanted items failed: {e}");
                return;
            }
        };
        if due.is_empty() {
            return;
        }
        debug!("Processing {} due wanted item(s)", due.len());

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks: JoinSet<()> = JoinSet::new();

        for item in due {
            // Shutdown is honored between items, never mid-item
            if self.shutdown.is_cancelled() {
                debug!("Shutdown observed mid-pass, stopping admission");
                break;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let wanted = self.wanted.clone();
            let id = item.id;
            tasks.spawn(async move {
                let _permit = permit;
                if let Err(e) = wanted.process_item(id).await {
                    warn!("Processing wanted item {id} failed: {e}");
                }
            });
        }

        // Let the pass drain; each task is bounded by provider timeouts
        while tasks.join_next().await.is_some() {}
    }
}
