//! In-memory stand-in for the device driver.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;

use smem_alloc::protocol::parse_hex;
use smem_alloc::{
    AllocError, AllocRequest, AllocatorConfig, RegionAllocator, SimAllocator, SmemDevice,
};
use smem_core::{AllocFlags, Handle, RegionInfo, RegionSet};

/// A one-shot behaviour for the next allocation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Serve the request normally.
    Pass,
    /// Answer with an empty line.
    Refuse,
    /// Answer with the given raw line instead of a real grant.
    Reply(String),
    /// Fail the channel with an I/O error.
    Io(io::ErrorKind),
}

/// Shared queues of faults consumed by successive allocation and free
/// requests. An empty queue serves requests normally.
///
/// Cloned out of a [`MockDevice`] before the device is moved into an
/// allocator, so tests can keep injecting faults afterwards.
#[derive(Clone, Debug, Default)]
pub struct FaultQueue {
    alloc: Rc<RefCell<VecDeque<Fault>>>,
    free: Rc<RefCell<VecDeque<Option<io::ErrorKind>>>>,
}

impl FaultQueue {
    /// Queue a behaviour for a later allocation request.
    pub fn push(&self, fault: Fault) {
        self.alloc.borrow_mut().push_back(fault);
    }

    /// Let a later free request through.
    pub fn pass_free(&self) {
        self.free.borrow_mut().push_back(None);
    }

    /// Fail a later free request with an I/O error. The grant stays live.
    pub fn fail_free(&self, kind: io::ErrorKind) {
        self.free.borrow_mut().push_back(Some(kind));
    }

    fn pop_alloc(&self) -> Option<Fault> {
        self.alloc.borrow_mut().pop_front()
    }

    fn pop_free(&self) -> Option<io::ErrorKind> {
        self.free.borrow_mut().pop_front().flatten()
    }
}

/// [`SmemDevice`] that places allocations with its
/// own first-fit simulator and hands out `smem<N>` tokens.
///
/// Every command and free is logged so tests can check what went over
/// the wire.
pub struct MockDevice {
    regions: Vec<RegionInfo>,
    placer: SimAllocator,
    tokens: HashMap<String, Handle>,
    faults: FaultQueue,
    pub commands: Vec<String>,
    pub frees: Vec<String>,
}

impl MockDevice {
    pub fn new(regions: Vec<RegionInfo>) -> Self {
        let placer = SimAllocator::new(&AllocatorConfig::default(), &regions)
            .expect("mock device regions are valid");
        Self {
            regions,
            placer,
            tokens: HashMap::new(),
            faults: FaultQueue::default(),
            commands: Vec::new(),
            frees: Vec::new(),
        }
    }

    /// Misbehave on a later allocation request, after any already queued.
    pub fn inject(&self, fault: Fault) {
        self.faults.push(fault);
    }

    /// Handle for injecting faults once the device has been moved.
    pub fn faults(&self) -> FaultQueue {
        self.faults.clone()
    }

    /// Number of grants the device still considers live.
    pub fn live(&self) -> usize {
        self.tokens.len()
    }

    fn channel_error(channel: &str, kind: io::ErrorKind) -> AllocError {
        AllocError::io(channel, &io::Error::new(kind, "injected"))
    }
}

impl SmemDevice for MockDevice {
    fn region_info(&mut self) -> Result<String, AllocError> {
        Ok(self
            .regions
            .iter()
            .map(|r| {
                format!(
                    "{} {:#011x} {:#011x} {:#011x}\n",
                    r.id.0,
                    r.base,
                    r.end() - 1,
                    r.size
                )
            })
            .collect())
    }

    fn request_alloc(&mut self, command: &str) -> Result<String, AllocError> {
        self.commands.push(command.to_string());
        match self.faults.pop_alloc() {
            Some(Fault::Refuse) => return Ok(String::new()),
            Some(Fault::Reply(line)) => return Ok(line),
            Some(Fault::Io(kind)) => return Err(Self::channel_error("mock/alloc", kind)),
            Some(Fault::Pass) | None => {}
        }

        let fields: Vec<&str> = command.split_whitespace().collect();
        let &[description, size, align, flags, mask] = fields.as_slice() else {
            return Ok(String::new());
        };
        let field = |f: &str| parse_hex(f).unwrap_or_default();
        let candidates = RegionSet::from_mask(field(mask));
        let request = AllocRequest::new(description, field(size), &candidates)
            .with_alignment(field(align))
            .with_flags(AllocFlags(field(flags) as u32));
        let handle = match self.placer.alloc(&request) {
            Ok(handle) => handle,
            Err(_) => return Ok(String::new()),
        };
        let rec = self
            .placer
            .handle_info(handle)
            .expect("fresh handle is live");
        let bytes = rec.span.count as u64 * self.placer.ledger().unit_bytes();
        let token = format!("smem{}", handle.0);
        let reply = format!("{token} {:#x} {:#x}\n", rec.addr, bytes);
        self.tokens.insert(token, handle);
        Ok(reply)
    }

    fn request_free(&mut self, token: &str) -> Result<(), AllocError> {
        self.frees.push(token.to_string());
        if let Some(kind) = self.faults.pop_free() {
            return Err(Self::channel_error("mock/free", kind));
        }
        let handle = self
            .tokens
            .remove(token)
            .ok_or_else(|| Self::channel_error("mock/free", io::ErrorKind::InvalidInput))?;
        self.placer.free(handle)
    }
}
