//! Pass triggering: the overlap guard and the scheduled loop

use super::Orchestrator;
use crate::Result;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Which pass a trigger runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassMode {
    Batch,
    Crawl,
}

impl PassMode {
    /// Value stored in `job_runs.mode`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Crawl => "crawl",
        }
    }
}

impl fmt::Display for PassMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Process-wide "a pass is running" flag
///
/// Cloning shares the flag. A trigger that finds it set is skipped.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the flag; `None` if a pass already holds it
    pub fn try_acquire(&self) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of a pass; releases the guard on drop
#[derive(Debug)]
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Runs the requested passes every `interval` until Ctrl-C
///
/// The first passes run immediately. A failed pass is logged and the loop
/// keeps going; the caller is responsible for shutting the orchestrator down
/// afterwards.
pub async fn run_scheduled(
    orchestrator: &Orchestrator,
    interval: Duration,
    modes: &[PassMode],
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        "Scheduling {} every {}s",
        modes
            .iter()
            .map(PassMode::as_str)
            .collect::<Vec<_>>()
            .join(" + "),
        interval.as_secs()
    );

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for mode in modes {
                    run_pass(orchestrator, *mode).await;
                }
            }
            _ = &mut interrupt => {
                tracing::info!("Interrupt received, stopping scheduler");
                break;
            }
        }
    }

    Ok(())
}

async fn run_pass(orchestrator: &Orchestrator, mode: PassMode) {
    let result = match mode {
        PassMode::Batch => orchestrator.run_batch(None).await,
        PassMode::Crawl => orchestrator.run_frontier().await,
    };

    match result {
        Ok(Some(report)) => tracing::debug!("Scheduled {} pass: {:?}", mode, report.counters),
        Ok(None) => {}
        Err(e) => tracing::error!("Scheduled {} pass failed: {}", mode, e),
    }
}
