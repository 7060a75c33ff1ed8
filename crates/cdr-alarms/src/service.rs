//! Background periodic runner.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::Engine;

/// Handle for controlling the engine task.
#[derive(Debug)]
pub struct ServiceHandle {
    running: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl ServiceHandle {
    /// Check if the engine task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of ticks completed so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Stop the engine task after the current tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Stop the task and wait for the timer loop to exit.
    ///
    /// A tick already running on the blocking pool finishes on its own.
    pub async fn shutdown(self) {
        self.stop();
        self.task.abort();
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                error!(error = %e, "engine task ended abnormally");
            }
        }
    }
}

/// Start the periodic engine task.
///
/// The first tick runs immediately, then every `interval`. Ticks run on the
/// blocking pool; a tick that is still running when the next one is due
/// delays it.
pub fn start_engine_task(engine: Arc<Engine>, interval: Duration) -> ServiceHandle {
    let running = Arc::new(AtomicBool::new(true));
    let ticks = Arc::new(AtomicU64::new(0));

    let task_running = Arc::clone(&running);
    let task_ticks = Arc::clone(&ticks);

    let task = tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "engine task started");

        while task_running.load(Ordering::SeqCst) {
            interval_timer.tick().await;

            if !task_running.load(Ordering::SeqCst) {
                break;
            }

            let engine = Arc::clone(&engine);
            let now = Utc::now();
            match tokio::task::spawn_blocking(move || engine.run_once(now)).await {
                Ok(tick) => {
                    let count = task_ticks.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(tick = count, ok = tick.is_ok(), "engine tick finished");
                }
                Err(e) => {
                    error!(error = %e, "engine tick panicked");
                }
            }
        }

        task_running.store(false, Ordering::SeqCst);
        info!("engine task stopped");
    });

    ServiceHandle {
        running,
        ticks,
        task,
    }
}
