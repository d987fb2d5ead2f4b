// SPDX-License-Identifier: GPL-3.0-only

//! Lock-free pipeline counters
//!
//! Written from the capture thread and the frame sink, read from anywhere.
//! Dropped frames are otherwise invisible to the observer, so this is the
//! only place they show up.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_received: AtomicU64,
    frames_skipped: AtomicU64,
    frames_published: AtomicU64,
    frames_replaced: AtomicU64,
    dropped_missing_plane: AtomicU64,
    dropped_bridge_failure: AtomicU64,
    dropped_contract_violation: AtomicU64,
    zero_filled_frames: AtomicU64,
    metadata_dropped: AtomicU64,
    reconfigurations: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Frames handed to the sink by the capture source
    pub frames_received: u64,
    /// Frames displaced upstream before the worker reached them
    pub frames_skipped: u64,
    /// Frames that reached the handoff
    pub frames_published: u64,
    /// Published frames the renderer never took
    pub frames_replaced: u64,
    pub dropped_missing_plane: u64,
    pub dropped_bridge_failure: u64,
    pub dropped_contract_violation: u64,
    /// Frames where the converter substituted zero samples
    pub zero_filled_frames: u64,
    pub metadata_dropped: u64,
    pub reconfigurations: u64,
}

impl StatsSnapshot {
    pub fn frames_dropped(&self) -> u64 {
        self.dropped_missing_plane + self.dropped_bridge_failure + self.dropped_contract_violation
    }

    /// Share of processed frames that were dropped, as a percentage (0.0 - 100.0)
    pub fn drop_rate(&self) -> f64 {
        let total = self.frames_published + self.frames_dropped();
        if total == 0 {
            return 0.0;
        }
        (self.frames_dropped() as f64 / total as f64) * 100.0
    }
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub fn $record(&self) -> u64 {
            self.$field.fetch_add(1, Ordering::Relaxed) + 1
        }
    };
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_received, frames_received);
    counter!(record_skipped, frames_skipped);
    counter!(record_published, frames_published);
    counter!(record_replaced, frames_replaced);
    counter!(record_missing_plane, dropped_missing_plane);
    counter!(record_bridge_failure, dropped_bridge_failure);
    counter!(record_contract_violation, dropped_contract_violation);
    counter!(record_zero_fill, zero_filled_frames);
    counter!(record_metadata_dropped, metadata_dropped);
    counter!(record_reconfiguration, reconfigurations);

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            frames_received: load(&self.frames_received),
            frames_skipped: load(&self.frames_skipped),
            frames_published: load(&self.frames_published),
            frames_replaced: load(&self.frames_replaced),
            dropped_missing_plane: load(&self.dropped_missing_plane),
            dropped_bridge_failure: load(&self.dropped_bridge_failure),
            dropped_contract_violation: load(&self.dropped_contract_violation),
            zero_filled_frames: load(&self.zero_filled_frames),
            metadata_dropped: load(&self.metadata_dropped),
            reconfigurations: load(&self.reconfigurations),
        }
    }
}
