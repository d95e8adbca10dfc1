//! Per-region chunk occupancy ledger.
//!
//! A [`RegionLedger`] records, for every chunk of one region, whether it is
//! free or which live [`Handle`] occupies it. A [`ChunkLedger`] groups the
//! ledgers of all regions behind a single chunk unit.
//!
//! Marking is all-or-nothing: [`ChunkLedger::occupy`] and
//! [`ChunkLedger::release`] inspect the whole span before touching it, so a
//! rejected call leaves the ledger unchanged.

use std::fmt;

use indexmap::IndexMap;
use smem_core::{Handle, RegionId, RegionInfo};

use crate::config::{AllocatorConfig, ConfigError};
use crate::error::AllocError;

/// State of one chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// Available for allocation.
    Free,
    /// Claimed by the given live allocation.
    Occupied(Handle),
}

/// A contiguous run of chunks inside one region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkSpan {
    /// Region holding the run.
    pub region: RegionId,
    /// Index of the first chunk.
    pub start: usize,
    /// Number of chunks.
    pub count: usize,
}

impl ChunkSpan {
    /// One past the last chunk index.
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    /// Whether two spans share at least one chunk.
    pub fn overlaps(&self, other: &ChunkSpan) -> bool {
        self.region == other.region && self.start < other.end() && other.start < self.end()
    }
}

impl fmt::Display for ChunkSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{})", self.region, self.start, self.end())
    }
}

/// A maximal run of consecutive chunks owned by the same handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkRun {
    /// Owner of every chunk in the run.
    pub handle: Handle,
    /// Chunks covered.
    pub span: ChunkSpan,
}

/// Chunk states of a single region.
#[derive(Clone, Debug)]
pub struct RegionLedger {
    info: RegionInfo,
    unit: u64,
    chunks: Vec<ChunkState>,
}

impl RegionLedger {
    fn new(info: RegionInfo, unit: u64) -> Self {
        Self {
            info,
            unit,
            chunks: vec![ChunkState::Free; (info.size / unit) as usize],
        }
    }

    /// Geometry of the region.
    pub fn info(&self) -> &RegionInfo {
        &self.info
    }

    /// Number of chunks in the region.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// State of chunk `index`, if it exists.
    pub fn state(&self, index: usize) -> Option<ChunkState> {
        self.chunks.get(index).copied()
    }

    /// Absolute address of chunk `index`.
    pub fn chunk_addr(&self, index: usize) -> u64 {
        self.info.base + index as u64 * self.unit
    }

    /// Number of occupied chunks.
    pub fn occupied_chunks(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| matches!(c, ChunkState::Occupied(_)))
            .count()
    }

    /// Occupied capacity in bytes.
    pub fn occupied_bytes(&self) -> u64 {
        self.occupied_chunks() as u64 * self.unit
    }

    /// Find the first run of `need` free chunks, scanning in storage order.
    ///
    /// A window opens at the first free chunk (at an `alignment`-aligned
    /// address when `alignment` exceeds the unit), grows over contiguous
    /// free chunks, and closes at any occupied chunk. The first window that
    /// reaches `need` chunks wins.
    pub fn first_fit(&self, need: usize, alignment: u64) -> Option<usize> {
        let mut window: Option<usize> = None;
        for (idx, state) in self.chunks.iter().enumerate() {
            match state {
                ChunkState::Free => {
                    let start = match window {
                        Some(start) => start,
                        None => {
                            if alignment > self.unit && self.chunk_addr(idx) % alignment != 0 {
                                continue;
                            }
                            window = Some(idx);
                            idx
                        }
                    };
                    if idx - start + 1 >= need {
                        return Some(start);
                    }
                }
                ChunkState::Occupied(_) => window = None,
            }
        }
        None
    }

    /// Maximal runs of same-owner chunks, in storage order.
    pub fn runs(&self) -> Vec<ChunkRun> {
        let mut runs: Vec<ChunkRun> = Vec::new();
        for (idx, state) in self.chunks.iter().enumerate() {
            let ChunkState::Occupied(handle) = *state else {
                continue;
            };
            match runs.last_mut() {
                Some(run) if run.handle == handle && run.span.end() == idx => run.span.count += 1,
                _ => runs.push(ChunkRun {
                    handle,
                    span: ChunkSpan {
                        region: self.info.id,
                        start: idx,
                        count: 1,
                    },
                }),
            }
        }
        runs
    }

    fn check_span(&self, span: &ChunkSpan) -> Result<(), AllocError> {
        if span.count == 0 || span.end() > self.chunks.len() {
            return Err(AllocError::InvariantViolation {
                region: self.info.id,
                chunk: span.start,
                detail: format!(
                    "span of {} chunks outside region of {} chunks",
                    span.count,
                    self.chunks.len()
                ),
            });
        }
        Ok(())
    }

    fn occupy(&mut self, span: &ChunkSpan, handle: Handle) -> Result<(), AllocError> {
        self.check_span(span)?;
        let range = span.start..span.end();
        if let Some(offset) = self.chunks[range.clone()]
            .iter()
            .position(|c| *c != ChunkState::Free)
        {
            let chunk = span.start + offset;
            return Err(AllocError::InvariantViolation {
                region: self.info.id,
                chunk,
                detail: format!(
                    "chunk at {:#x} is not free ({:?}) for {handle}",
                    self.chunk_addr(chunk),
                    self.chunks[chunk]
                ),
            });
        }
        self.chunks[range].fill(ChunkState::Occupied(handle));
        Ok(())
    }

    fn release(&mut self, span: &ChunkSpan, handle: Handle) -> Result<(), AllocError> {
        self.check_span(span)?;
        let range = span.start..span.end();
        let expected = ChunkState::Occupied(handle);
        if let Some(offset) = self.chunks[range.clone()]
            .iter()
            .position(|c| *c != expected)
        {
            let chunk = span.start + offset;
            return Err(AllocError::InvariantViolation {
                region: self.info.id,
                chunk,
                detail: format!(
                    "chunk at {:#x} expected {handle}, found {:?}",
                    self.chunk_addr(chunk),
                    self.chunks[chunk]
                ),
            });
        }
        self.chunks[range].fill(ChunkState::Free);
        Ok(())
    }
}

/// Chunk occupancy of every managed region.
#[derive(Clone, Debug)]
pub struct ChunkLedger {
    unit: u64,
    regions: IndexMap<RegionId, RegionLedger>,
}

impl ChunkLedger {
    /// Build an all-free ledger over `regions`.
    ///
    /// Regions keep the order given here; it is also the order used by
    /// introspection and rendering.
    pub fn new(config: &AllocatorConfig, regions: &[RegionInfo]) -> Result<Self, ConfigError> {
        config.validate(regions)?;
        let unit = config.unit_bytes();
        let regions = regions
            .iter()
            .map(|info| (info.id, RegionLedger::new(*info, unit)))
            .collect();
        Ok(Self { unit, regions })
    }

    /// Chunk unit in bytes.
    pub fn unit_bytes(&self) -> u64 {
        self.unit
    }

    /// Chunks needed to hold `size` bytes. A zero-byte request still
    /// occupies one chunk.
    pub fn chunks_for(&self, size: u64) -> usize {
        size.div_ceil(self.unit).max(1) as usize
    }

    /// Ledger of one region.
    pub fn region(&self, id: RegionId) -> Option<&RegionLedger> {
        self.regions.get(&id)
    }

    /// All region ledgers in configuration order.
    pub fn regions(&self) -> impl Iterator<Item = &RegionLedger> {
        self.regions.values()
    }

    /// Managed region ids in configuration order.
    pub fn region_ids(&self) -> Vec<RegionId> {
        self.regions.keys().copied().collect()
    }

    /// Locate the first free run for `size` bytes in `region`.
    ///
    /// Returns `Ok(None)` when the region has no large-enough run.
    pub fn first_fit(
        &self,
        region: RegionId,
        size: u64,
        alignment: u64,
    ) -> Result<Option<ChunkSpan>, AllocError> {
        let ledger = self
            .regions
            .get(&region)
            .ok_or(AllocError::UnknownRegion { region })?;
        let count = self.chunks_for(size);
        Ok(ledger
            .first_fit(count, alignment)
            .map(|start| ChunkSpan {
                region,
                start,
                count,
            }))
    }

    /// Map a device-chosen byte range onto the chunks it covers.
    ///
    /// Returns `None` unless the range starts on a chunk boundary and lies
    /// entirely within one region.
    pub fn locate(&self, addr: u64, size: u64) -> Option<ChunkSpan> {
        let count = self.chunks_for(size);
        self.regions.values().find_map(|ledger| {
            let info = ledger.info();
            if addr < info.base || addr >= info.end() {
                return None;
            }
            let offset = addr - info.base;
            if offset % self.unit != 0 {
                return None;
            }
            let start = (offset / self.unit) as usize;
            (start + count <= ledger.chunk_count()).then_some(ChunkSpan {
                region: info.id,
                start,
                count,
            })
        })
    }

    /// Mark every chunk of `span` as owned by `handle`.
    ///
    /// Fails with [`AllocError::InvariantViolation`] if any chunk is
    /// already occupied; the ledger is left unchanged in that case.
    pub fn occupy(&mut self, span: &ChunkSpan, handle: Handle) -> Result<(), AllocError> {
        self.region_mut(span.region)?.occupy(span, handle)
    }

    /// Return every chunk of `span` to the free state.
    ///
    /// Fails with [`AllocError::InvariantViolation`] unless every chunk is
    /// currently owned by `handle`; the ledger is left unchanged in that case.
    pub fn release(&mut self, span: &ChunkSpan, handle: Handle) -> Result<(), AllocError> {
        self.region_mut(span.region)?.release(span, handle)
    }

    fn region_mut(&mut self, region: RegionId) -> Result<&mut RegionLedger, AllocError> {
        self.regions
            .get_mut(&region)
            .ok_or(AllocError::UnknownRegion { region })
    }

    /// Occupied bytes of one region (0 for an unknown region).
    pub fn occupied_bytes(&self, region: RegionId) -> u64 {
        self.regions
            .get(&region)
            .map_or(0, RegionLedger::occupied_bytes)
    }

    /// Maximal same-owner runs of one region, in storage order.
    pub fn runs(&self, region: RegionId) -> Vec<ChunkRun> {
        self.regions
            .get(&region)
            .map(RegionLedger::runs)
            .unwrap_or_default()
    }

    /// Whether no chunk in any region is occupied.
    pub fn is_clear(&self) -> bool {
        self.regions.values().all(|r| r.occupied_chunks() == 0)
    }
}

/// Renders one line per region: `-` for a free chunk and a letter per
/// occupied run, advancing whenever the owner changes.
impl fmt::Display for ChunkLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ledger in self.regions.values() {
            write!(f, "{}: ", ledger.info.id)?;
            let mut letter = 0u8;
            let mut prev: Option<Handle> = None;
            for state in &ledger.chunks {
                match *state {
                    ChunkState::Free => {
                        f.write_str("-")?;
                        prev = None;
                    }
                    ChunkState::Occupied(handle) => {
                        if prev.is_some_and(|p| p != handle) || prev.is_none() {
                            letter = letter.wrapping_add(1);
                        }
                        let glyph = b'A' + (letter.wrapping_sub(1) % 26);
                        write!(f, "{}", glyph as char)?;
                        prev = Some(handle);
                    }
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const UNIT: u64 = 512 * 1024;
    const A: RegionId = RegionId(0);
    const B: RegionId = RegionId(1);

    fn ledger(chunks_a: u64, chunks_b: u64) -> ChunkLedger {
        ChunkLedger::new(
            &AllocatorConfig::default(),
            &[
                RegionInfo::new(A, 0x1000_0000, chunks_a * UNIT),
                RegionInfo::new(B, 0x4000_0000, chunks_b * UNIT),
            ],
        )
        .unwrap()
    }

    fn span(region: RegionId, start: usize, count: usize) -> ChunkSpan {
        ChunkSpan {
            region,
            start,
            count,
        }
    }

    #[test]
    fn chunks_round_up() {
        let l = ledger(4, 4);
        assert_eq!(l.chunks_for(0), 1);
        assert_eq!(l.chunks_for(1), 1);
        assert_eq!(l.chunks_for(UNIT), 1);
        assert_eq!(l.chunks_for(UNIT + 1), 2);
    }

    #[test]
    fn first_fit_skips_short_runs() {
        let mut l = ledger(16, 4);
        l.occupy(&span(A, 2, 4), Handle(2)).unwrap();
        // chunks 0..2 free but only 2 long; the next window starts at 6.
        let found = l.first_fit(A, 6 * UNIT, 0).unwrap().unwrap();
        assert_eq!(found, span(A, 6, 6));
        let small = l.first_fit(A, UNIT, 0).unwrap().unwrap();
        assert_eq!(small, span(A, 0, 1));
    }

    #[test]
    fn first_fit_none_when_full() {
        let mut l = ledger(4, 4);
        l.occupy(&span(A, 0, 4), Handle(1)).unwrap();
        assert_eq!(l.first_fit(A, 1, 0).unwrap(), None);
        assert_eq!(
            l.first_fit(RegionId(7), 1, 0),
            Err(AllocError::UnknownRegion { region: RegionId(7) })
        );
    }

    #[test]
    fn first_fit_honours_large_alignment() {
        let l = ledger(8, 4);
        // 0x1000_0000 is 2 MiB aligned; chunk 0 qualifies.
        assert_eq!(l.first_fit(A, 1, 4 * UNIT).unwrap(), Some(span(A, 0, 1)));

        let mut l = ledger(8, 4);
        l.occupy(&span(A, 0, 1), Handle(1)).unwrap();
        // Next 2 MiB boundary is chunk 4.
        assert_eq!(l.first_fit(A, 1, 4 * UNIT).unwrap(), Some(span(A, 4, 1)));
    }

    #[test]
    fn occupy_rejects_overlap_without_side_effects() {
        let mut l = ledger(8, 4);
        l.occupy(&span(A, 2, 2), Handle(1)).unwrap();
        let err = l.occupy(&span(A, 0, 3), Handle(2)).unwrap_err();
        assert!(matches!(err, AllocError::InvariantViolation { chunk: 2, .. }));
        assert_eq!(l.region(A).unwrap().state(0), Some(ChunkState::Free));
        assert_eq!(l.occupied_bytes(A), 2 * UNIT);
    }

    #[test]
    fn release_requires_matching_owner() {
        let mut l = ledger(8, 4);
        l.occupy(&span(A, 0, 2), Handle(1)).unwrap();
        let err = l.release(&span(A, 0, 2), Handle(9)).unwrap_err();
        assert!(err.is_fatal());
        let err = l.release(&span(A, 1, 2), Handle(1)).unwrap_err();
        assert!(matches!(err, AllocError::InvariantViolation { chunk: 2, .. }));
        l.release(&span(A, 0, 2), Handle(1)).unwrap();
        assert!(l.is_clear());
    }

    #[test]
    fn runs_merge_same_owner_only() {
        let mut l = ledger(8, 4);
        l.occupy(&span(A, 0, 2), Handle(1)).unwrap();
        l.occupy(&span(A, 2, 3), Handle(2)).unwrap();
        l.occupy(&span(A, 6, 1), Handle(3)).unwrap();
        let runs = l.runs(A);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].span, span(A, 0, 2));
        assert_eq!(runs[1].span, span(A, 2, 3));
        assert_eq!(runs[2].handle, Handle(3));
        assert!(l.runs(B).is_empty());
    }

    #[test]
    fn locate_maps_addresses_to_chunks() {
        let l = ledger(8, 4);
        assert_eq!(l.locate(0x1000_0000 + 2 * UNIT, UNIT + 1), Some(span(A, 2, 2)));
        assert_eq!(l.locate(0x4000_0000, 4 * UNIT), Some(span(B, 0, 4)));
        // Unaligned, out of range, and overrunning the region end.
        assert_eq!(l.locate(0x1000_0001, 1), None);
        assert_eq!(l.locate(0x2000_0000, 1), None);
        assert_eq!(l.locate(0x4000_0000 + 3 * UNIT, 2 * UNIT), None);
    }

    #[test]
    fn renders_memory_map() {
        let mut l = ledger(6, 2);
        l.occupy(&span(A, 0, 2), Handle(1)).unwrap();
        l.occupy(&span(A, 2, 1), Handle(2)).unwrap();
        l.occupy(&span(A, 4, 1), Handle(3)).unwrap();
        assert_eq!(l.to_string(), "A: AAB-C-\nB: --\n");
    }

    proptest! {
        #[test]
        fn first_fit_spans_never_overlap(sizes in proptest::collection::vec(1u64..6, 1..20)) {
            let mut l = ledger(32, 1);
            let mut live: Vec<ChunkSpan> = Vec::new();
            for (i, chunks) in sizes.iter().enumerate() {
                let Some(found) = l.first_fit(A, chunks * UNIT, 0).unwrap() else {
                    continue;
                };
                for other in &live {
                    prop_assert!(!found.overlaps(other));
                }
                l.occupy(&found, Handle(i as u64 + 1)).unwrap();
                live.push(found);
            }
            let covered: usize = live.iter().map(|s| s.count).sum();
            prop_assert_eq!(l.region(A).unwrap().occupied_chunks(), covered);
            prop_assert_eq!(l.runs(A).len(), live.len());
        }
    }
}
