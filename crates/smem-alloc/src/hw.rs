//! Device-backed allocator.
//!
//! Placement is decided by the driver behind a [`SmemDevice`]. The local
//! [`ChunkLedger`] mirrors every grant so introspection works the same as
//! in simulation, and so a driver that hands out overlapping memory is
//! caught immediately.

use indexmap::IndexMap;
use smem_core::Handle;

use crate::allocator::{commit, retire, AllocRequest, RegionAllocator};
use crate::config::AllocatorConfig;
use crate::device::SmemDevice;
use crate::error::AllocError;
use crate::handle::AllocationTable;
use crate::ledger::ChunkLedger;
use crate::protocol::{parse_region_info, AllocCommand, AllocReply};

/// Hardware backend over any [`SmemDevice`].
#[derive(Debug)]
pub struct HwAllocator<D> {
    device: D,
    ledger: ChunkLedger,
    table: AllocationTable,
    tokens: IndexMap<Handle, String>,
}

impl<D: SmemDevice> HwAllocator<D> {
    /// Read the region geometry from `device` and build an all-free ledger.
    pub fn open(mut device: D, config: &AllocatorConfig) -> Result<Self, AllocError> {
        let regions = parse_region_info(&device.region_info()?)?;
        let ledger = ChunkLedger::new(config, &regions)?;
        tracing::debug!(regions = regions.len(), "opened smem device");
        Ok(Self {
            device,
            ledger,
            table: AllocationTable::new(),
            tokens: IndexMap::new(),
        })
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the underlying device.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Driver token of a live handle.
    pub fn token(&self, handle: Handle) -> Option<&str> {
        self.tokens.get(&handle).map(String::as_str)
    }

    /// Give a grant the ledger cannot accept back to the driver.
    fn reject(&mut self, reply: &AllocReply, err: AllocError) -> AllocError {
        if let Err(free_err) = self.device.request_free(&reply.token) {
            tracing::error!(token = %reply.token, "could not return rejected grant: {free_err}");
        }
        err
    }
}

impl<D: SmemDevice> RegionAllocator for HwAllocator<D> {
    fn alloc(&mut self, request: &AllocRequest<'_>) -> Result<Handle, AllocError> {
        request.validate(&self.ledger)?;
        let command = AllocCommand {
            description: request.description,
            size: request.size,
            alignment: request.alignment,
            flags: request.flags,
            candidates: request.candidates,
        }
        .to_string();
        let line = self.device.request_alloc(&command)?;
        if line.trim().is_empty() {
            tracing::debug!(%command, "device refused allocation");
            return Err(request.exhausted());
        }
        let reply = AllocReply::parse(&line)?;

        if reply.size < request.size {
            let err = AllocError::malformed(&line, "device reserved fewer bytes than requested");
            return Err(self.reject(&reply, err));
        }
        let span = match self.ledger.locate(reply.addr, reply.size) {
            Some(span) if request.candidates.contains(span.region) => span,
            Some(span) => {
                let err = AllocError::malformed(
                    &line,
                    format!("region {} is not a candidate", span.region),
                );
                return Err(self.reject(&reply, err));
            }
            None => {
                let err = AllocError::malformed(
                    &line,
                    "address is outside every region or not chunk aligned",
                );
                return Err(self.reject(&reply, err));
            }
        };

        let handle = match commit(&mut self.ledger, &mut self.table, span, request) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!(%span, token = %reply.token, "device grant overlaps live chunks: {err}");
                return Err(self.reject(&reply, err));
            }
        };
        tracing::debug!(%handle, %span, token = %reply.token, "alloc {}", request.description);
        self.tokens.insert(handle, reply.token);
        Ok(handle)
    }

    fn free(&mut self, handle: Handle) -> Result<(), AllocError> {
        let token = self
            .tokens
            .get(&handle)
            .ok_or(AllocError::InvalidHandle { handle })?;
        self.device.request_free(token)?;
        let rec = retire(&mut self.ledger, &mut self.table, handle)?;
        self.tokens.shift_remove(&handle);
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
