// SPDX-License-Identifier: GPL-3.0-only

//! EDGE/RAW mode toggle
//!
//! The toggle is total and returns immediately. The new mode is forwarded to
//! the capture thread, which applies it to the bridge before the next frame;
//! a frame already being processed finishes under the old mode.

use super::{WorkerCommand, WorkerWaker};
use crate::processing::ProcessingMode;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Cloneable handle for flipping the processing mode from any thread
#[derive(Clone)]
pub struct ModeToggle {
    is_edge: Arc<AtomicBool>,
    commands: mpsc::UnboundedSender<WorkerCommand>,
    waker: Arc<WorkerWaker>,
    // Keeps flip-then-send atomic so concurrent toggles reach the worker in order
    order: Arc<Mutex<()>>,
}

impl ModeToggle {
    pub(crate) fn new(
        initial: ProcessingMode,
        commands: mpsc::UnboundedSender<WorkerCommand>,
        waker: Arc<WorkerWaker>,
    ) -> Self {
        Self {
            is_edge: Arc::new(AtomicBool::new(initial.is_edge())),
            commands,
            waker,
            order: Arc::new(Mutex::new(())),
        }
    }

    pub fn current(&self) -> ProcessingMode {
        ProcessingMode::from_edge(self.is_edge.load(Ordering::SeqCst))
    }

    /// Flip EDGE ↔ RAW and return the new mode
    pub fn toggle(&self) -> ProcessingMode {
        let _order = self.order.lock();
        let was_edge = self.is_edge.fetch_xor(true, Ordering::SeqCst);
        let mode = ProcessingMode::from_edge(was_edge).toggled();

        if self.commands.send(WorkerCommand::SetMode(mode)).is_err() {
            debug!(%mode, "Mode toggled after pipeline shutdown");
        } else {
            self.waker.wake();
        }

        info!(%mode, "Processing mode toggled");
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggle() -> (ModeToggle, mpsc::UnboundedReceiver<WorkerCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ModeToggle::new(ProcessingMode::Edge, tx, Arc::new(WorkerWaker::default())),
            rx,
        )
    }

    #[test]
    fn test_toggle_twice_returns_to_start() {
        let (toggle, mut rx) = toggle();
        assert_eq!(toggle.toggle(), ProcessingMode::Raw);
        assert_eq!(toggle.toggle(), ProcessingMode::Edge);
        assert_eq!(toggle.current(), ProcessingMode::Edge);

        assert_eq!(rx.try_recv().ok(), Some(WorkerCommand::SetMode(ProcessingMode::Raw)));
        assert_eq!(rx.try_recv().ok(), Some(WorkerCommand::SetMode(ProcessingMode::Edge)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_toggle_without_worker_still_succeeds() {
        let (toggle, rx) = toggle();
        drop(rx);
        assert_eq!(toggle.toggle(), ProcessingMode::Raw);
        assert_eq!(toggle.current(), ProcessingMode::Raw);
    }

    #[test]
    fn test_concurrent_toggles_end_consistent() {
        let (toggle, mut rx) = toggle();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let toggle = toggle.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        toggle.toggle();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut last = None;
        while let Ok(WorkerCommand::SetMode(mode)) = rx.try_recv() {
            last = Some(mode);
        }
        // 100 flips: back where we started, and the last command agrees
        assert_eq!(toggle.current(), ProcessingMode::Edge);
        assert_eq!(last, Some(ProcessingMode::Edge));
    }
}
