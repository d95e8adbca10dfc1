//! In-memory first-fit allocator.

use smem_core::{Handle, RegionInfo};

use crate::allocator::{commit, retire, AllocRequest, RegionAllocator};
use crate::config::{AllocatorConfig, ConfigError};
use crate::error::AllocError;
use crate::handle::AllocationTable;
use crate::ledger::ChunkLedger;

/// Simulation backend: places allocations by first-fit over the ledger.
///
/// Candidates are tried in the order given; within a region the lowest
/// free run that is long enough wins. There is no compaction, so
/// fragmentation can exhaust a region whose total free space would fit.
#[derive(Clone, Debug)]
pub struct SimAllocator {
    ledger: ChunkLedger,
    table: AllocationTable,
}

impl SimAllocator {
    /// Create an allocator over `regions`, all chunks free.
    pub fn new(config: &AllocatorConfig, regions: &[RegionInfo]) -> Result<Self, ConfigError> {
        Ok(Self {
            ledger: ChunkLedger::new(config, regions)?,
            table: AllocationTable::new(),
        })
    }
}

impl RegionAllocator for SimAllocator {
    fn alloc(&mut self, request: &AllocRequest<'_>) -> Result<Handle, AllocError> {
        request.validate(&self.ledger)?;
        for region in request.candidates.iter() {
            let Some(span) = self
                .ledger
                .first_fit(region, request.size, request.alignment)?
            else {
                continue;
            };
            let handle = commit(&mut self.ledger, &mut self.table, span, request)?;
            tracing::debug!(
                %handle,
                %span,
                size = request.size,
                "alloc {}",
                request.description
            );
            return Ok(handle);
        }
        tracing::debug!(
            size = request.size,
            candidates = %request.candidates,
            "alloc {} exhausted",
            request.description
        );
        Err(request.exhausted())
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        let rec = retire(&mut self.ledger, &mut self.table, handle)?;
        tracing::debug!(%handle, span = %rec.span, "free {}", rec.owner.description);
        Ok(())
    }

    fn ledger(&self) -> &ChunkLedger {
        &self.ledger
    }

    fn table(&self) -> &AllocationTable {
        &self.table
    }
}
