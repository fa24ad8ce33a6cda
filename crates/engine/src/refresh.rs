//! Background reader refresh
//!
//! `ReaderRefresher` owns one named thread that calls
//! [`ReaderManager::maybe_refresh`] every interval. It is started and stopped
//! explicitly; `stop` waits a bounded time for the thread to exit. Each start
//! gets its own stop signal, so a thread detached after a timed-out stop still
//! exits. Dropping the refresher stops it.

use crate::reader::ReaderManager;
use crate::{engine_err, EngineResult};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const DROP_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Signal {
    stop_requested: bool,
    exited: bool,
}

#[derive(Default)]
struct Shared {
    signal: Mutex<Signal>,
    wake: Condvar,
    exited: Condvar,
}

/// The thread of one start and the signal only it listens to
struct Running {
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

/// Periodically adopts the latest commit on a reader manager
pub struct ReaderRefresher {
    manager: Arc<ReaderManager>,
    running: Mutex<Option<Running>>,
}

impl ReaderRefresher {
    /// Create a stopped refresher for `manager`.
    pub fn new(manager: Arc<ReaderManager>) -> Self {
        ReaderRefresher {
            manager,
            running: Mutex::new(None),
        }
    }

    /// Start refreshing every `interval`.
    ///
    /// Returns `Ok(false)` if the refresher is already running.
    pub fn start(&self, interval: Duration) -> EngineResult<bool> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(false);
        }

        let shared = Arc::new(Shared::default());
        let thread_shared = Arc::clone(&shared);
        let manager = Arc::clone(&self.manager);
        let handle = std::thread::Builder::new()
            .name("quarry-refresh".to_string())
            .spawn(move || refresh_loop(&thread_shared, &manager, interval))
            .map_err(engine_err("spawn reader refresher"))?;
        *running = Some(Running { shared, handle });

        info!(target: "quarry::engine", interval_ms = interval.as_millis() as u64, "Reader refresher started");
        Ok(true)
    }

    /// Signal the thread to stop and wait up to `timeout` for it to exit.
    ///
    /// Returns `true` if the thread exited in time (or was not running).
    pub fn stop(&self, timeout: Duration) -> bool {
        let Some(Running { shared, handle }) = self.running.lock().take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        let exited = {
            let mut signal = shared.signal.lock();
            signal.stop_requested = true;
            shared.wake.notify_all();
            while !signal.exited {
                if shared.exited.wait_until(&mut signal, deadline).timed_out() {
                    break;
                }
            }
            signal.exited
        };

        if exited {
            if handle.join().is_err() {
                warn!(target: "quarry::engine", "Reader refresher thread panicked");
            }
            info!(target: "quarry::engine", "Reader refresher stopped");
        } else {
            warn!(
                target: "quarry::engine",
                timeout_ms = timeout.as_millis() as u64,
                "Reader refresher did not stop in time, detaching"
            );
        }
        exited
    }

    /// Whether the background thread is running.
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

impl Drop for ReaderRefresher {
    fn drop(&mut self) {
        self.stop(DROP_STOP_TIMEOUT);
    }
}

fn refresh_loop(shared: &Shared, manager: &ReaderManager, interval: Duration) {
    loop {
        {
            let mut signal = shared.signal.lock();
            if !signal.stop_requested {
                shared.wake.wait_for(&mut signal, interval);
            }
            if signal.stop_requested {
                break;
            }
        }
        if let Err(e) = manager.maybe_refresh() {
            warn!(target: "quarry::engine", error = %e, "Background reader refresh failed");
        }
    }

    let mut signal = shared.signal.lock();
    signal.exited = true;
    shared.exited.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::schema::{Schema, STORED, STRING};
    use tantivy::{doc, Index, IndexWriter};

    #[test]
    fn adopts_commits_in_background() {
        let mut builder = Schema::builder();
        let id = builder.add_text_field("id", STRING | STORED);
        let index = Index::create_in_ram(builder.build());
        let mut writer: IndexWriter = index.writer_with_num_threads(1, 20_000_000).unwrap();
        let manager = Arc::new(ReaderManager::open(&index).unwrap());
        let refresher = ReaderRefresher::new(Arc::clone(&manager));

        assert!(refresher.start(Duration::from_millis(10)).unwrap());
        assert!(!refresher.start(Duration::from_millis(10)).unwrap());

        writer.add_document(doc!(id => "1")).unwrap();
        writer.commit().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while manager.acquire().num_docs() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(manager.acquire().num_docs(), 1);

        assert!(refresher.stop(Duration::from_secs(5)));
        assert!(!refresher.is_running());
    }

    #[test]
    fn stop_interrupts_long_interval() {
        let mut builder = Schema::builder();
        builder.add_text_field("id", STRING);
        let index = Index::create_in_ram(builder.build());
        let manager = Arc::new(ReaderManager::open(&index).unwrap());
        let refresher = ReaderRefresher::new(manager);

        refresher.start(Duration::from_secs(3600)).unwrap();
        let started = Instant::now();
        assert!(refresher.stop(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn restart_after_stop() {
        let mut builder = Schema::builder();
        builder.add_text_field("id", STRING);
        let index = Index::create_in_ram(builder.build());
        let refresher = ReaderRefresher::new(Arc::new(ReaderManager::open(&index).unwrap()));

        assert!(refresher.stop(Duration::from_millis(10)));
        assert!(refresher.start(Duration::from_millis(10)).unwrap());
        assert!(refresher.stop(Duration::from_secs(5)));
        assert!(refresher.start(Duration::from_millis(10)).unwrap());
        assert!(refresher.is_running());
    }

    #[test]
    fn detached_thread_exits_after_restart() {
        let mut builder = Schema::builder();
        builder.add_text_field("id", STRING);
        let index = Index::create_in_ram(builder.build());
        let manager = Arc::new(ReaderManager::open(&index).unwrap());
        let refresher = ReaderRefresher::new(Arc::clone(&manager));

        // a zero timeout may leave the first thread detached
        refresher.start(Duration::from_millis(5)).unwrap();
        refresher.stop(Duration::ZERO);
        assert!(!refresher.is_running());

        assert!(refresher.start(Duration::from_millis(5)).unwrap());
        assert!(refresher.stop(Duration::from_secs(5)));

        // only the test and the refresher hold the manager once both threads end
        let deadline = Instant::now() + Duration::from_secs(5);
        while Arc::strong_count(&manager) > 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(Arc::strong_count(&manager), 2);
    }
}
