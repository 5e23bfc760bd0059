//! Fast-path cursor for scans that touch exactly one segment.
//!
//! No heap, no merging across sources: a position, an exclusive end and the
//! cached entry at the position. Merge values are reduced lazily in
//! [`Cursor::current`], so existence checks never pay for a reduction.

use crate::errors::{Result, SiftError};
use crate::iterator::{full_merge, Closer, Cursor, EntryEx};
use crate::options::CollectionOptions;
use crate::segment::{Operation, SegmentAccess};
use std::borrow::Cow;

pub struct SingleSegmentCursor<'a, S: SegmentAccess + ?Sized> {
    segment: &'a S,
    pos_end: usize, // from end_key_exclusive, or the segment length
    pos: usize,     // logical entry position into the segment

    cur: Option<(Operation, &'a [u8], &'a [u8])>,

    closer: Option<Box<dyn Closer + 'a>>,

    options: Option<&'a CollectionOptions>,
}

impl<'a, S: SegmentAccess + ?Sized> SingleSegmentCursor<'a, S> {
    /// Cursor over positions `start_pos..end_pos`. `end_pos` is clamped to the
    /// segment length; the first entry is cached right away.
    pub fn new(
        segment: &'a S,
        start_pos: usize,
        end_pos: usize,
        options: Option<&'a CollectionOptions>,
        closer: Option<Box<dyn Closer + 'a>>,
    ) -> Self {
        let pos_end = end_pos.min(segment.len());
        let pos = start_pos.min(pos_end);
        let cur = if pos < pos_end { segment.operation_key_val(pos) } else { None };
        Self { segment, pos_end, pos, cur, closer, options }
    }

    /// Cursor over keys in `[start_key, end_key_exclusive)`; `None` leaves that side open.
    pub fn bounded(
        segment: &'a S,
        start_key: Option<&[u8]>,
        end_key_exclusive: Option<&[u8]>,
        options: Option<&'a CollectionOptions>,
        closer: Option<Box<dyn Closer + 'a>>,
    ) -> Self {
        let start = start_key.map_or(0, |k| segment.find_start_key_inclusive_pos(k));
        let end = end_key_exclusive.map_or(segment.len(), |k| segment.find_start_key_inclusive_pos(k));
        Self::new(segment, start, end, options, closer)
    }

    pub fn position(&self) -> usize { self.pos }

    pub fn end_position(&self) -> usize { self.pos_end }

    pub fn is_exhausted(&self) -> bool { self.pos >= self.pos_end }

    /// Cached entry with the segment's lifetime, `None` once exhausted.
    pub fn entry(&self) -> Option<(Operation, &'a [u8], &'a [u8])> {
        if self.pos >= self.pos_end {
            return None;
        }
        self.cur
    }
}

impl<'a, S: SegmentAccess + ?Sized> Cursor for SingleSegmentCursor<'a, S> {
    fn next(&mut self) -> Result<()> {
        if self.pos < self.pos_end {
            self.pos += 1;
        }
        if self.pos >= self.pos_end {
            return Err(SiftError::IteratorDone);
        }

        self.cur = self.segment.operation_key_val(self.pos);

        Ok(())
    }

    fn current(&self) -> Result<(&[u8], Option<Cow<'_, [u8]>>)> {
        let (op, key, val) = self.entry().ok_or(SiftError::IteratorDone)?;

        match op {
            Operation::Delete => Ok((key, None)),
            Operation::Merge => {
                let merged = full_merge(self.options, key, None, &[val])?;
                Ok((key, Some(Cow::Owned(merged))))
            }
            Operation::Set => Ok((key, Some(Cow::Borrowed(val)))),
        }
    }

    fn current_ex(&self) -> Result<(EntryEx, &[u8], &[u8])> {
        let (operation, key, val) = self.entry().ok_or(SiftError::IteratorDone)?;
        Ok((EntryEx { operation }, key, val))
    }

    fn close(&mut self) -> Result<()> {
        // cleared before closing: a failed close is never retried
        if let Some(mut closer) = self.closer.take() {
            closer.close()?;
        }
        Ok(())
    }
}

impl<'a, S: SegmentAccess + ?Sized> Drop for SingleSegmentCursor<'a, S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "releasing cursor resource on drop failed");
        }
    }
}
