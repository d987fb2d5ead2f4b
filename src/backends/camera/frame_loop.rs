// SPDX-License-Identifier: GPL-3.0-only

//! Named worker threads driven one iteration at a time
//!
//! The synthetic camera, the capture worker and the render thread are all a
//! loop body called repeatedly on a dedicated thread. [`WorkerLoop`] owns such
//! a thread: it stops it on request, wakes it if parked and joins it on drop.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, Thread};
use tracing::{debug, info, warn};

/// What a loop body wants to happen next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    /// Exit after this iteration
    Stop,
}

/// Owner of one worker thread
///
/// ```ignore
/// let mut worker = WorkerLoop::start("edgeview-synthetic", move || {
///     sink.deliver(generator.frame(index, now()));
///     LoopAction::Continue
/// })?;
///
/// worker.stop();
/// ```
pub struct WorkerLoop {
    label: String,
    handle: Option<JoinHandle<()>>,
    stopping: Arc<AtomicBool>,
}

impl WorkerLoop {
    /// Run `body` on a new thread named `label` until it returns
    /// [`LoopAction::Stop`] or the worker is stopped
    pub fn start<F>(label: &str, mut body: F) -> io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::start_with_init(label, || Ok(()), move |_: &mut ()| body())
    }

    /// Like [`WorkerLoop::start`], with per-thread state built by `init` on
    /// the worker itself.
    ///
    /// The state never crosses threads, so it may hold GPU handles or other
    /// thread-affine resources. When `init` fails the thread logs the error
    /// and exits without calling `body`.
    pub fn start_with_init<S, I, F>(label: &str, init: I, mut body: F) -> io::Result<Self>
    where
        S: 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stopping = Arc::new(AtomicBool::new(false));
        let worker_stopping = Arc::clone(&stopping);
        let worker_label = label.to_string();

        info!(worker = %label, "Spawning worker thread");

        let handle = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                let mut state = match init() {
                    Ok(state) => state,
                    Err(e) => {
                        warn!(worker = %worker_label, error = %e, "Worker setup failed");
                        return;
                    }
                };

                loop {
                    if worker_stopping.load(Ordering::SeqCst) {
                        debug!(worker = %worker_label, "Stop requested");
                        break;
                    }
                    if body(&mut state) == LoopAction::Stop {
                        debug!(worker = %worker_label, "Loop body finished");
                        break;
                    }
                }

                // `state` drops here, still on the worker thread
                info!(worker = %worker_label, "Worker thread exiting");
            })?;

        Ok(Self {
            label: label.to_string(),
            handle: Some(handle),
            stopping,
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Thread handle, for unparking the worker from elsewhere
    pub fn thread(&self) -> Option<Thread> {
        self.handle.as_ref().map(|h| h.thread().clone())
    }

    /// Ask the worker to exit after its current iteration and wake it if
    /// parked. Returns immediately.
    pub fn request_stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// Request a stop and wait for the thread
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to exit on its own
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // A worker stopping itself cannot wait on its own exit
        if handle.thread().id() == thread::current().id() {
            return;
        }
        match handle.join() {
            Ok(()) => debug!(worker = %self.label, "Worker thread joined"),
            Err(e) => warn!(worker = %self.label, "Worker thread panicked: {:?}", e),
        }
    }
}

impl Drop for WorkerLoop {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_body_runs_until_it_stops() {
        let calls = Arc::new(AtomicUsize::new(0));
        let body_calls = Arc::clone(&calls);

        let mut worker = WorkerLoop::start("test-countdown", move || {
            match body_calls.fetch_add(1, Ordering::SeqCst) {
                0..=4 => LoopAction::Continue,
                _ => LoopAction::Stop,
            }
        })
        .unwrap();

        worker.join();
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert!(!worker.is_running());
    }

    #[test]
    fn test_stop_interrupts_long_park() {
        let mut worker = WorkerLoop::start("test-parked", || {
            thread::park_timeout(Duration::from_secs(60));
            LoopAction::Continue
        })
        .unwrap();

        thread::sleep(Duration::from_millis(10));
        let asked = std::time::Instant::now();
        worker.stop();
        assert!(asked.elapsed() < Duration::from_secs(10));
        assert!(!worker.is_running());
    }

    #[test]
    fn test_state_is_built_on_the_worker() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let init_seen = Arc::clone(&seen);
        let body_seen = Arc::clone(&seen);

        let mut worker = WorkerLoop::start_with_init(
            "test-affine",
            move || {
                init_seen.lock().push(thread::current().name().map(str::to_string));
                Ok(3u32)
            },
            move |remaining: &mut u32| {
                body_seen.lock().push(thread::current().name().map(str::to_string));
                *remaining -= 1;
                if *remaining == 0 {
                    LoopAction::Stop
                } else {
                    LoopAction::Continue
                }
            },
        )
        .unwrap();

        worker.join();
        let seen = seen.lock();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|name| name.as_deref() == Some("test-affine")));
    }

    #[test]
    fn test_failed_init_never_calls_body() {
        let called = Arc::new(AtomicBool::new(false));
        let body_called = Arc::clone(&called);

        let mut worker = WorkerLoop::start_with_init(
            "test-bad-init",
            || Err::<(), _>("no device".to_string()),
            move |_: &mut ()| {
                body_called.store(true, Ordering::SeqCst);
                LoopAction::Stop
            },
        )
        .unwrap();

        worker.join();
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_state_dropped_on_exit() {
        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&dropped);
        let mut worker = WorkerLoop::start_with_init(
            "test-drop-state",
            move || Ok(Flag(flag)),
            |_: &mut Flag| {
                thread::park_timeout(Duration::from_millis(5));
                LoopAction::Continue
            },
        )
        .unwrap();

        worker.stop();
        assert!(dropped.load(Ordering::SeqCst));
    }
}
