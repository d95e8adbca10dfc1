//! Cumulative arbitration counters.
//!
//! [`EngineMetrics`] is updated by every resource and scenario operation
//! and never reset by the engine; callers snapshot it with `clone()`.

use smem_alloc::RegionOccupancy;
use smem_core::RegionId;

/// Counters collected across the lifetime of an engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineMetrics {
    /// Scenarios moved from stopped to running.
    pub scenario_starts: u64,
    /// Scenarios moved from running to stopped (including group stops).
    pub scenario_stops: u64,
    /// Starts of an already-running scenario.
    pub noop_starts: u64,
    /// Starts that failed and were rolled back.
    pub failed_starts: u64,
    /// Resources allocated and registered.
    pub resources_allocated: u64,
    /// Resources freed and unregistered (including evictions).
    pub resources_freed: u64,
    /// Resources reassigned to a starting scenario without reallocation.
    pub resources_held: u64,
    /// Resources freed to fit a group's weight budget.
    pub resources_evicted: u64,
    /// Partial resource allocations that were unwound.
    pub rollbacks: u64,
    /// Highest occupied bytes seen per region: `(region, bytes)`.
    pub peak_bytes: Vec<(RegionId, u64)>,
}

impl EngineMetrics {
    /// Fold the current occupancy into the per-region peaks.
    pub fn record_occupancy(&mut self, occupancy: &[RegionOccupancy]) {
        for occ in occupancy {
            match self.peak_bytes.iter_mut().find(|(r, _)| *r == occ.region) {
                Some((_, peak)) => *peak = (*peak).max(occ.occupied),
                None => self.peak_bytes.push((occ.region, occ.occupied)),
            }
        }
    }

    /// Peak occupied bytes of one region (0 if never recorded).
    pub fn peak(&self, region: RegionId) -> u64 {
        self.peak_bytes
            .iter()
            .find(|(r, _)| *r == region)
            .map_or(0, |(_, b)| *b)
    }
}
