//! In-memory segments and the accessor trait every segment flavour implements.
//!
//! A segment is an immutable, key-sorted run of `(operation, key, value)`
//! entries addressed by a dense 0-based position. Storage is packed:
//!
//!   kvs[2*i]   = op(8) | klen(24) | vlen(32)
//!   kvs[2*i+1] = offset of key bytes in `buf` (value follows the key)

use crate::consts::{MAX_KEY_LEN, MAX_VAL_LEN};
use crate::errors::{Result, SiftError};
use crate::utils::{decode_op_klen_vlen, encode_op_klen_vlen};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Set = 1,
    Delete = 2,
    Merge = 3,
}

impl Operation {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Operation::Set),
            2 => Some(Operation::Delete),
            3 => Some(Operation::Merge),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 { self as u8 }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Set => "SET",
            Operation::Delete => "DEL",
            Operation::Merge => "MERGE",
        }
    }
}

/// Read-only, positional view of a sorted segment.
pub trait SegmentAccess {
    /// Number of entries; valid positions are `0..len()`.
    fn len(&self) -> usize;

    /// Triple at `pos`, or `None` when `pos >= len()`.
    fn operation_key_val(&self, pos: usize) -> Option<(Operation, &[u8], &[u8])>;

    fn is_empty(&self) -> bool { self.len() == 0 }

    fn key_at(&self, pos: usize) -> Option<&[u8]> {
        self.operation_key_val(pos).map(|(_, k, _)| k)
    }

    /// First position whose key is `>= key`, or `len()` if there is none.
    fn find_start_key_inclusive_pos(&self, key: &[u8]) -> usize {
        let (mut lo, mut hi) = (0usize, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.key_at(mid) {
                Some(k) if k < key => lo = mid + 1,
                _ => hi = mid,
            }
        }
        lo
    }
}

/// Heap-resident segment, produced by [`SegmentBuilder`].
#[derive(Debug, Clone, Default)]
pub struct Segment {
    kvs: Vec<u64>,
    buf: Vec<u8>,
}

impl Segment {
    pub fn empty() -> Self { Self::default() }
}

impl SegmentAccess for Segment {
    fn len(&self) -> usize { self.kvs.len() / 2 }

    fn operation_key_val(&self, pos: usize) -> Option<(Operation, &[u8], &[u8])> {
        let x = pos.checked_mul(2)?;
        if x + 1 >= self.kvs.len() { return None; }
        let (tag, klen, vlen) = decode_op_klen_vlen(self.kvs[x]);
        let kstart = self.kvs[x + 1] as usize;
        let vstart = kstart + klen;
        // tags are checked on insert
        let op = Operation::from_tag(tag)?;
        Some((op, &self.buf[kstart..vstart], &self.buf[vstart..vstart + vlen]))
    }
}

/// Collects one batch of operations and freezes it into a sorted [`Segment`].
#[derive(Debug, Default)]
pub struct SegmentBuilder {
    items: Vec<(Operation, Vec<u8>, Vec<u8>)>,
}

impl SegmentBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn set(&mut self, key: &[u8], val: &[u8]) -> &mut Self {
        self.items.push((Operation::Set, key.to_vec(), val.to_vec()));
        self
    }

    pub fn del(&mut self, key: &[u8]) -> &mut Self {
        self.items.push((Operation::Delete, key.to_vec(), Vec::new()));
        self
    }

    pub fn merge(&mut self, key: &[u8], val: &[u8]) -> &mut Self {
        self.items.push((Operation::Merge, key.to_vec(), val.to_vec()));
        self
    }

    pub fn push(&mut self, op: Operation, key: &[u8], val: &[u8]) -> &mut Self {
        self.items.push((op, key.to_vec(), val.to_vec()));
        self
    }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Sort by key and pack. One operation per key per batch.
    pub fn build(mut self) -> Result<Segment> {
        self.items.sort_by(|a, b| a.1.cmp(&b.1));
        if let Some(w) = self.items.windows(2).find(|w| w[0].1 == w[1].1) {
            return Err(SiftError::DuplicateKey(w[0].1.clone()));
        }

        let total: usize = self.items.iter().map(|(_, k, v)| k.len() + v.len()).sum();
        let mut kvs = Vec::with_capacity(self.items.len() * 2);
        let mut buf = Vec::with_capacity(total);
        for (op, key, val) in &self.items {
            check_sizes(key, val)?;
            kvs.push(encode_op_klen_vlen(op.tag(), key.len(), val.len()));
            kvs.push(buf.len() as u64);
            buf.extend_from_slice(key);
            buf.extend_from_slice(val);
        }
        Ok(Segment { kvs, buf })
    }
}

pub(crate) fn check_sizes(key: &[u8], val: &[u8]) -> Result<()> {
    if key.len() > MAX_KEY_LEN {
        return Err(SiftError::TooLarge(format!("key of {} bytes", key.len())));
    }
    if val.len() > MAX_VAL_LEN {
        return Err(SiftError::TooLarge(format!("value of {} bytes", val.len())));
    }
    Ok(())
}
