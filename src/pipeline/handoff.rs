// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot, latest-wins frame handoff
//!
//! Connects a producer timeline to a consumer timeline without locks: the
//! producer swaps its newest frame into the slot (discarding any occupant the
//! consumer never took) and the consumer swaps the slot empty. Each take
//! returns one whole frame, never a mix of two.

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result of [`FrameHandoff::publish`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Slot was empty
    Stored,
    /// An unconsumed frame was discarded
    Replaced,
    /// Handoff is closed; the frame was dropped
    Rejected,
}

pub struct FrameHandoff<T> {
    slot: ArcSwapOption<T>,
    closed: AtomicBool,
}

impl<T> Default for FrameHandoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameHandoff<T> {
    pub fn new() -> Self {
        Self {
            slot: ArcSwapOption::empty(),
            closed: AtomicBool::new(false),
        }
    }

    /// Store `frame`, replacing whatever has not been taken yet. Never blocks.
    pub fn publish(&self, frame: Arc<T>) -> PublishOutcome {
        if self.is_closed() {
            return PublishOutcome::Rejected;
        }

        let displaced = self.slot.swap(Some(frame));

        // Lost a race with close(): do not leave a frame behind.
        if self.is_closed() {
            self.slot.store(None);
            return PublishOutcome::Rejected;
        }

        match displaced {
            Some(_) => PublishOutcome::Replaced,
            None => PublishOutcome::Stored,
        }
    }

    /// Take the newest frame published since the last take, if any
    pub fn take_if_present(&self) -> Option<Arc<T>> {
        self.slot.swap(None)
    }

    pub fn has_pending(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Reject all further publishes and drop the current occupant
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.slot.store(None);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
