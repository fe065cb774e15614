//! Periodic per-session update sweep (§4.8).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::server::Shared;

/// Drives `session.update(elapsed)` across the registry at a fixed interval,
/// on its own thread, independent of any session's own read loop.
pub struct UpdateScheduler {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl UpdateScheduler {
    /// Spawn the scheduler thread. `interval` is `SessionUpdateInterval` from
    /// [`crate::config::ServerOptions`].
    pub fn spawn(shared: Arc<Shared>, interval: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        let handle = thread::Builder::new()
            .name("session-update-scheduler".to_string())
            .spawn(move || run(shared, interval, thread_running))
            .expect("failed to spawn update scheduler thread");

        UpdateScheduler {
            handle: Some(handle),
            running,
        }
    }

    /// Signal the scheduler to stop and block until its thread exits.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: Arc<Shared>, interval: Duration, running: Arc<AtomicBool>) {
    let mut previous_tick = Instant::now();

    while running.load(Ordering::SeqCst) {
        let tick_start = Instant::now();
        let elapsed = tick_start.duration_since(previous_tick);
        previous_tick = tick_start;

        shared.registry.for_each(|session| {
            session.update(elapsed);
        });
        for reaped in shared.registry.reap_closed() {
            shared.factory.release_id(reaped.id);
        }

        let sweep_duration = tick_start.elapsed();
        let sleep = interval.saturating_sub(sweep_duration).min(interval);
        if running.load(Ordering::SeqCst) && !sleep.is_zero() {
            thread::sleep(sleep);
        }
    }
    tracing::debug!("update scheduler exited");
}
