//! The allocator capability trait shared by both backends.
//!
//! [`RegionAllocator`] fixes the contract: whole-chunk placement inside one
//! candidate region, never-reused handles, and a [`ChunkLedger`] that is
//! the source of truth for introspection. Backends only differ in how they
//! choose where an allocation goes.

use smem_core::{AllocFlags, Handle, RegionId, RegionInfo, RegionSet};

use crate::error::AllocError;
use crate::handle::{AllocOwner, AllocationRecord, AllocationTable};
use crate::ledger::{ChunkLedger, ChunkSpan, ChunkState};

/// Parameters of one allocation call.
#[derive(Clone, Copy, Debug)]
pub struct AllocRequest<'a> {
    /// Free-form description (resource name).
    pub description: &'a str,
    /// Bytes requested.
    pub size: u64,
    /// Required alignment; 0 means unit alignment.
    pub alignment: u64,
    /// Opaque flags forwarded to the backend.
    pub flags: AllocFlags,
    /// Candidate regions, tried front to back.
    pub candidates: &'a RegionSet,
}

impl<'a> AllocRequest<'a> {
    /// A unit-aligned request with default flags.
    pub fn new(description: &'a str, size: u64, candidates: &'a RegionSet) -> Self {
        Self {
            description,
            size,
            alignment: 0,
            flags: AllocFlags::HEAP_DEFAULT,
            candidates,
        }
    }

    /// Set the alignment.
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set the flags.
    pub fn with_flags(mut self, flags: AllocFlags) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn owner(&self) -> AllocOwner {
        AllocOwner {
            description: self.description.to_string(),
            requested: self.size,
            alignment: self.alignment,
            flags: self.flags,
            candidates: self.candidates.clone(),
        }
    }

    /// Reject a bad alignment or a candidate the ledger does not manage.
    pub(crate) fn validate(&self, ledger: &ChunkLedger) -> Result<(), AllocError> {
        if self.alignment != 0 && !self.alignment.is_power_of_two() {
            return Err(AllocError::InvalidAlignment {
                alignment: self.alignment,
            });
        }
        match self
            .candidates
            .iter()
            .find(|r| ledger.region(*r).is_none())
        {
            Some(region) => Err(AllocError::UnknownRegion { region }),
            None => Ok(()),
        }
    }

    pub(crate) fn exhausted(&self) -> AllocError {
        AllocError::AllocationExhausted {
            requested: self.size,
            candidates: self.candidates.clone(),
        }
    }
}

/// Capacity and usage of one region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionOccupancy {
    /// The region.
    pub region: RegionId,
    /// Capacity in bytes.
    pub capacity: u64,
    /// Bytes covered by occupied chunks.
    pub occupied: u64,
}

/// A maximal run of chunks owned by one live allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupiedRun {
    /// Owning handle.
    pub handle: Handle,
    /// Chunks covered.
    pub span: ChunkSpan,
    /// Absolute start address.
    pub addr: u64,
    /// Bytes covered (whole chunks).
    pub bytes: u64,
    /// Request metadata, if the handle is still in the table.
    pub owner: Option<AllocOwner>,
}

/// Chunk-granular allocator over a fixed set of regions.
///
/// Implementations must keep the ledger and the allocation table in
/// agreement: every live handle's span is occupied by that handle and no
/// other chunk is occupied.
pub trait RegionAllocator {
    /// Place `request` in the first candidate region with a large-enough
    /// free run and return a fresh handle.
    fn alloc(&mut self, request: &AllocRequest<'_>) -> Result<Handle, AllocError>;

    /// Release a live handle.
    fn free(&mut self, handle: Handle) -> Result<(), AllocError>;

    /// The chunk ledger.
    fn ledger(&self) -> &ChunkLedger;

    /// The live-allocation table.
    fn table(&self) -> &AllocationTable;

    /// Geometry of every managed region, in configuration order.
    fn regions(&self) -> Vec<RegionInfo> {
        self.ledger().regions().map(|r| *r.info()).collect()
    }

    /// Live handles in allocation order.
    fn handles(&self) -> Vec<Handle> {
        self.table().handles()
    }

    /// Record of a live handle.
    fn handle_info(&self, handle: Handle) -> Option<&AllocationRecord> {
        self.table().get(handle)
    }

    /// Occupied bytes of one region.
    fn occupied_bytes(&self, region: RegionId) -> u64 {
        self.ledger().occupied_bytes(region)
    }

    /// Capacity and usage of every region.
    fn occupancy(&self) -> Vec<RegionOccupancy> {
        self.ledger()
            .regions()
            .map(|r| RegionOccupancy {
                region: r.info().id,
                capacity: r.info().size,
                occupied: r.occupied_bytes(),
            })
            .collect()
    }

    /// Occupied runs of one region in address order, with owner metadata.
    fn occupied_runs(&self, region: RegionId) -> Vec<OccupiedRun> {
        let ledger = self.ledger();
        let Some(r) = ledger.region(region) else {
            return Vec::new();
        };
        r.runs()
            .into_iter()
            .map(|run| OccupiedRun {
                handle: run.handle,
                span: run.span,
                addr: r.chunk_addr(run.span.start),
                bytes: run.span.count as u64 * ledger.unit_bytes(),
                owner: self.table().get(run.handle).map(|rec| rec.owner.clone()),
            })
            .collect()
    }

    /// Free every live handle, oldest first.
    fn free_all(&mut self) -> Result<(), AllocError> {
        for handle in self.handles() {
            self.free(handle)?;
        }
        Ok(())
    }

    /// Check that the ledger and the allocation table agree.
    fn verify(&self) -> Result<(), AllocError> {
        verify_consistency(self.ledger(), self.table())
    }
}

impl<A: RegionAllocator + ?Sized> RegionAllocator for Box<A> {
    fn alloc(&mut self, request: &AllocRequest<'_>) -> Result<Handle, AllocError> {
        (**self).alloc(request)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        (**self).free(handle)
    }

    fn ledger(&self) -> &ChunkLedger {
        (**self).ledger()
    }

    fn table(&self) -> &AllocationTable {
        (**self).table()
    }
}

// ── Shared bookkeeping ──────────────────────────────────────────

/// Occupy `span` for a freshly issued handle and record it.
pub(crate) fn commit(
    ledger: &mut ChunkLedger,
    table: &mut AllocationTable,
    span: ChunkSpan,
    request: &AllocRequest<'_>,
) -> Result<Handle, AllocError> {
    let handle = table.issue();
    ledger.occupy(&span, handle)?;
    let addr = ledger
        .region(span.region)
        .map_or(0, |r| r.chunk_addr(span.start));
    table.insert(AllocationRecord {
        handle,
        span,
        addr,
        owner: request.owner(),
    });
    Ok(handle)
}

/// Release the span of a live handle and retire it.
///
/// The handle stays in the table if the ledger disagrees, so the
/// inconsistency remains visible to [`RegionAllocator::verify`].
pub(crate) fn retire(
    ledger: &mut ChunkLedger,
    table: &mut AllocationTable,
    handle: Handle,
) -> Result<AllocationRecord, AllocError> {
    let span = table
        .get(handle)
        .map(|rec| rec.span)
        .ok_or(AllocError::InvalidHandle { handle })?;
    ledger.release(&span, handle)?;
    table.remove(handle).ok_or(AllocError::InvalidHandle { handle })
}

fn verify_consistency(ledger: &ChunkLedger, table: &AllocationTable) -> Result<(), AllocError> {
    let mut expected_chunks = 0usize;
    for rec in table.records() {
        let span = rec.span;
        let region = ledger
            .region(span.region)
            .ok_or(AllocError::UnknownRegion {
                region: span.region,
            })?;
        for chunk in span.start..span.end() {
            if region.state(chunk) != Some(ChunkState::Occupied(rec.handle)) {
                return Err(AllocError::InvariantViolation {
                    region: span.region,
                    chunk,
                    detail: format!(
                        "{} expects chunk occupied, ledger has {:?}",
                        rec.handle,
                        region.state(chunk)
                    ),
                });
            }
        }
        expected_chunks += span.count;
    }
    let occupied: usize = ledger.regions().map(|r| r.occupied_chunks()).sum();
    if occupied == expected_chunks {
        return Ok(());
    }
    // Some run lies outside every live allocation's span.
    for r in ledger.regions() {
        for run in r.runs() {
            let detail = match table.get(run.handle) {
                None => format!("chunk occupied by retired handle {}", run.handle),
                Some(rec)
                    if rec.span.region != run.span.region
                        || run.span.start < rec.span.start
                        || run.span.end() > rec.span.end() =>
                {
                    format!("{} occupies chunks outside its span {}", run.handle, rec.span)
                }
                Some(_) => continue,
            };
            return Err(AllocError::InvariantViolation {
                region: run.span.region,
                chunk: run.span.start,
                detail,
            });
        }
    }
    let region = ledger.region_ids().first().copied().unwrap_or(RegionId(0));
    Err(AllocError::InvariantViolation {
        region,
        chunk: 0,
        detail: format!("{occupied} chunks occupied, allocations cover {expected_chunks}"),
    })
}
