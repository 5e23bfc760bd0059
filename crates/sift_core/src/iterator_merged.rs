//! K-way merging cursor over a stack of segments.
//!
//! Segments are ordered oldest first; for equal keys the newest segment
//! wins. A winning `Merge` entry keeps absorbing older entries of the same
//! key until a `Set` (base value) or `Delete` (no base) ends the chain.

use crate::errors::{Result, SiftError};
use crate::iterator::{full_merge, Closer, Cursor, EntryEx};
use crate::iterator_single::SingleSegmentCursor;
use crate::options::CollectionOptions;
use crate::segment::{Operation, SegmentAccess};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

pub type DynSegment = dyn SegmentAccess + Send + Sync;

#[derive(PartialEq, Eq)]
struct HeapItem<'a> {
    key: &'a [u8],
    level: usize,
}

impl Ord for HeapItem<'_> {
    // max-heap: smallest key first, newest level first on ties
    fn cmp(&self, other: &Self) -> Ordering {
        other.key.cmp(self.key).then(self.level.cmp(&other.level))
    }
}

impl PartialOrd for HeapItem<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

struct Resolved<'a> {
    op: Operation,
    key: &'a [u8],
    val: &'a [u8],
    base: Option<&'a [u8]>,
    operands: Vec<&'a [u8]>, // oldest first
}

pub struct MergedCursor<'a> {
    children: Vec<SingleSegmentCursor<'a, DynSegment>>,
    heap: BinaryHeap<HeapItem<'a>>,
    cur: Option<Resolved<'a>>,
    closer: Option<Box<dyn Closer + 'a>>,
    options: Option<&'a CollectionOptions>,
}

impl<'a> MergedCursor<'a> {
    pub fn new(
        segments: &'a [Arc<DynSegment>],
        start_key: Option<&[u8]>,
        end_key_exclusive: Option<&[u8]>,
        options: Option<&'a CollectionOptions>,
        closer: Option<Box<dyn Closer + 'a>>,
    ) -> Self {
        let children: Vec<_> = segments
            .iter()
            .map(|s| SingleSegmentCursor::bounded(&**s, start_key, end_key_exclusive, options, None))
            .collect();

        let mut heap = BinaryHeap::with_capacity(children.len());
        for (level, child) in children.iter().enumerate() {
            if let Some((_, key, _)) = child.entry() {
                heap.push(HeapItem { key, level });
            }
        }

        let mut it = Self { children, heap, cur: None, closer, options };
        it.cur = it.resolve_next();
        it
    }

    /// Number of segments still holding entries in range.
    pub fn num_active(&self) -> usize {
        self.children.iter().filter(|c| !c.is_exhausted()).count()
    }

    fn advance_child(&mut self, level: usize) {
        let child = &mut self.children[level];
        if child.next().is_ok() {
            if let Some((_, key, _)) = child.entry() {
                self.heap.push(HeapItem { key, level });
            }
        }
    }

    fn resolve_next(&mut self) -> Option<Resolved<'a>> {
        let top = self.heap.pop()?;
        let (op, key, val) = self.children[top.level].entry()?;
        self.advance_child(top.level);

        let mut r = Resolved { op, key, val, base: None, operands: Vec::new() };
        let mut open = op == Operation::Merge;
        if open {
            r.operands.push(val);
        }

        while let Some(next) = self.heap.peek() {
            if next.key != key {
                break;
            }
            let level = next.level;
            self.heap.pop();
            if open {
                match self.children[level].entry() {
                    Some((Operation::Merge, _, v)) => r.operands.push(v),
                    Some((Operation::Set, _, v)) => {
                        r.base = Some(v);
                        open = false;
                    }
                    _ => open = false,
                }
            }
            self.advance_child(level);
        }

        r.operands.reverse();
        Some(r)
    }
}

impl<'a> Cursor for MergedCursor<'a> {
    fn next(&mut self) -> Result<()> {
        if self.cur.is_none() {
            return Err(SiftError::IteratorDone);
        }
        self.cur = self.resolve_next();
        if self.cur.is_none() {
            return Err(SiftError::IteratorDone);
        }
        Ok(())
    }

    fn current(&self) -> Result<(&[u8], Option<Cow<'_, [u8]>>)> {
        let r = self.cur.as_ref().ok_or(SiftError::IteratorDone)?;
        match r.op {
            Operation::Delete => Ok((r.key, None)),
            Operation::Merge => {
                let merged = full_merge(self.options, r.key, r.base, &r.operands)?;
                Ok((r.key, Some(Cow::Owned(merged))))
            }
            Operation::Set => Ok((r.key, Some(Cow::Borrowed(r.val)))),
        }
    }

    fn current_ex(&self) -> Result<(EntryEx, &[u8], &[u8])> {
        let r = self.cur.as_ref().ok_or(SiftError::IteratorDone)?;
        Ok((EntryEx { operation: r.op }, r.key, r.val))
    }

    fn close(&mut self) -> Result<()> {
        for child in &mut self.children {
            child.close()?;
        }
        if let Some(mut closer) = self.closer.take() {
            closer.close()?;
        }
        Ok(())
    }
}

impl Drop for MergedCursor<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "releasing merged cursor resource on drop failed");
        }
    }
}
