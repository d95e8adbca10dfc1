//! Text protocol of the device control files.
//!
//! Every message is a single whitespace-separated line. Numbers other than
//! the region index are hexadecimal with an optional `0x` prefix.
//!
//! ```text
//! regioninfo:  <index> <start> <end> <size>        (end is inclusive, ignored)
//! alloc:       <description> 0x<size> 0x<align> 0x<flags> 0x<region_mask>
//! reply:       <token> <address> <size>
//! free:        <token>
//! ```

use std::fmt;

use smem_core::{AllocFlags, RegionId, RegionInfo, RegionSet};

use crate::error::AllocError;

// ── Field parsers ───────────────────────────────────────────────

/// Parse a hexadecimal field, with or without a `0x`/`0X` prefix.
pub fn parse_hex(field: &str) -> Option<u64> {
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

fn hex_field(line: &str, field: Option<&str>, name: &str) -> Result<u64, AllocError> {
    let field = field.ok_or_else(|| AllocError::malformed(line, format!("missing {name}")))?;
    parse_hex(field)
        .ok_or_else(|| AllocError::malformed(line, format!("{name} '{field}' is not hex")))
}

// ── Region geometry ─────────────────────────────────────────────

/// Parse one `regioninfo` line.
pub fn parse_region_line(line: &str) -> Result<RegionInfo, AllocError> {
    let mut fields = line.split_whitespace();
    let index = fields
        .next()
        .ok_or_else(|| AllocError::malformed(line, "empty region line"))?;
    let index: u8 = index
        .parse()
        .map_err(|_| AllocError::malformed(line, format!("region index '{index}' is not decimal")))?;
    let base = hex_field(line, fields.next(), "start")?;
    let _end = hex_field(line, fields.next(), "end")?;
    let size = hex_field(line, fields.next(), "size")?;
    Ok(RegionInfo::new(RegionId(index), base, size))
}

/// Parse the whole `regioninfo` file, skipping blank lines.
pub fn parse_region_info(text: &str) -> Result<Vec<RegionInfo>, AllocError> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_region_line)
        .collect()
}

// ── Allocation request / reply ──────────────────────────────────

/// One allocation command as written to the `alloc` channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocCommand<'a> {
    /// Description; whitespace is replaced by `_` when rendered.
    pub description: &'a str,
    /// Requested bytes.
    pub size: u64,
    /// Requested alignment.
    pub alignment: u64,
    /// Allocation flags.
    pub flags: AllocFlags,
    /// Candidate regions, sent as a bitmask.
    pub candidates: &'a RegionSet,
}

impl fmt::Display for AllocCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description: String = self
            .description
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        write!(
            f,
            "{} {:#x} {:#x} {:#x} {:#x}",
            description,
            self.size,
            self.alignment,
            self.flags.bits(),
            self.candidates.mask()
        )
    }
}

/// The device's answer to an allocation command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocReply {
    /// Opaque device handle, echoed back on free.
    pub token: String,
    /// Absolute address of the allocation.
    pub addr: u64,
    /// Bytes reserved by the device.
    pub size: u64,
}

impl AllocReply {
    /// Parse a reply line.
    pub fn parse(line: &str) -> Result<Self, AllocError> {
        let mut fields = line.split_whitespace();
        let token = fields
            .next()
            .ok_or_else(|| AllocError::malformed(line, "empty reply"))?
            .to_string();
        let addr = hex_field(line, fields.next(), "address")?;
        let size = hex_field(line, fields.next(), "size")?;
        Ok(Self { token, addr, size })
    }
}
