//! Shared primitives for the canonical tree and witness encodings.
//!
//! # Wire Format
//!
//! ## Optional slot
//! - absent:  `0x00`
//! - present: `0x01` + hash_bytes(32)
//!
//! ## CommitmentTree
//! - left slot + right slot + exactly `DEPTH - 1` parent slots, lowest level
//!   first
//!
//! ## Witness
//! - snapshot tree + filled count (varint) + \[hash_bytes(32)\]... + cursor
//!   presence flag (+ cursor tree)
//!
//! ## MerklePath
//! - node count (varint) + \[hash_bytes(32)\]... + bit count (varint) +
//!   packed bits, most significant bit first

use std::io::{self, Read, Write};

use crate::{CommitmentTreeError, hash::HashSer};

/// Presence flag of an absent slot.
pub(crate) const SLOT_ABSENT: u8 = 0x00;
/// Presence flag of a present slot.
pub(crate) const SLOT_PRESENT: u8 = 0x01;

/// Write a presence flag.
pub(crate) fn write_presence<W: Write>(present: bool, writer: &mut W) -> io::Result<()> {
    let flag = if present { SLOT_PRESENT } else { SLOT_ABSENT };
    writer.write_all(&[flag])
}

/// Read a presence flag, rejecting anything but `0x00` / `0x01`.
pub(crate) fn read_presence<R: Read>(reader: &mut R) -> io::Result<bool> {
    let mut flag = [0u8; 1];
    reader.read_exact(&mut flag)?;
    match flag[0] {
        SLOT_ABSENT => Ok(false),
        SLOT_PRESENT => Ok(true),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid presence flag: {:#04x}", other),
        )),
    }
}

/// Write an optional digest slot.
pub(crate) fn write_slot<H: HashSer, W: Write>(slot: Option<&H>, writer: &mut W) -> io::Result<()> {
    match slot {
        None => write_presence(false, writer),
        Some(hash) => {
            write_presence(true, writer)?;
            hash.hash_write(writer)
        }
    }
}

/// Read an optional digest slot.
pub(crate) fn read_slot<H: HashSer, R: Read>(reader: &mut R) -> io::Result<Option<H>> {
    if read_presence(reader)? {
        Ok(Some(H::hash_read(reader)?))
    } else {
        Ok(None)
    }
}

/// Fold an I/O failure raised while decoding a byte slice into the given
/// malformed-input error. Structural errors pass through unchanged.
pub(crate) fn malformed_input(
    err: CommitmentTreeError,
    wrap: fn(String) -> CommitmentTreeError,
) -> CommitmentTreeError {
    match err {
        CommitmentTreeError::Io(e) => wrap(e.to_string()),
        other => other,
    }
}
