//! Immutable view over a stack of segments; picks the cursor strategy.

use crate::errors::{Result, SiftError};
use crate::iterator::{Closer, Cursor};
use crate::iterator_merged::{DynSegment, MergedCursor};
use crate::iterator_single::SingleSegmentCursor;
use crate::options::CollectionOptions;
use crate::segment::{Segment, SegmentAccess};
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

pub struct Snapshot {
    segments: Vec<Arc<DynSegment>>, // oldest first
    options: Arc<CollectionOptions>,
    readers: Arc<AtomicUsize>,
    empty: Segment,
}

/// Owned by each cursor; gives its reader slot back on close.
struct ReaderGuard {
    readers: Arc<AtomicUsize>,
}

impl Closer for ReaderGuard {
    fn close(&mut self) -> Result<()> {
        let left = self.readers.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        debug!(open_readers = left, "snapshot reader released");
        Ok(())
    }
}

impl Snapshot {
    pub fn new(segments: Vec<Arc<DynSegment>>, options: Arc<CollectionOptions>) -> Self {
        Self { segments, options, readers: Arc::new(AtomicUsize::new(0)), empty: Segment::empty() }
    }

    pub fn segments(&self) -> &[Arc<DynSegment>] { &self.segments }

    pub fn options(&self) -> &CollectionOptions { &self.options }

    /// Cursors opened and not yet closed or dropped.
    pub fn open_readers(&self) -> usize { self.readers.load(Ordering::Acquire) }

    fn reader_guard(&self) -> Box<dyn Closer> {
        self.readers.fetch_add(1, Ordering::AcqRel);
        Box::new(ReaderGuard { readers: self.readers.clone() })
    }

    /// Cursor over `[start_key, end_key_exclusive)`. A single segment takes the
    /// fast path without any heap; more segments go through the merging cursor.
    pub fn start_iterator(
        &self,
        start_key: Option<&[u8]>,
        end_key_exclusive: Option<&[u8]>,
    ) -> Box<dyn Cursor + '_> {
        let guard = self.reader_guard();
        let options = Some(&*self.options);
        match self.segments.as_slice() {
            [] => {
                debug!("no segments, empty cursor");
                Box::new(SingleSegmentCursor::new(&self.empty, 0, 0, options, Some(guard)))
            }
            [only] => {
                debug!(entries = only.len(), "single-segment fast path");
                Box::new(SingleSegmentCursor::bounded(&**only, start_key, end_key_exclusive, options, Some(guard)))
            }
            many => {
                debug!(segments = many.len(), "merging cursor");
                Box::new(MergedCursor::new(many, start_key, end_key_exclusive, options, Some(guard)))
            }
        }
    }

    /// Point lookup. Deleted and missing keys are both `None`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        // smallest key greater than `key`
        let mut end = key.to_vec();
        end.push(0);

        let mut it = self.start_iterator(Some(key), Some(end.as_slice()));
        let found = match it.current() {
            Ok((k, v)) if k == key => Ok(v.map(Cow::into_owned)),
            Ok(_) | Err(SiftError::IteratorDone) => Ok(None),
            Err(e) => Err(e),
        };
        it.close()?;
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge_op::AddMerge;
    use crate::segment::SegmentBuilder;

    fn seg(f: impl FnOnce(&mut SegmentBuilder)) -> Arc<DynSegment> {
        let mut b = SegmentBuilder::new();
        f(&mut b);
        Arc::new(b.build().unwrap())
    }

    fn add_opts() -> Arc<CollectionOptions> {
        Arc::new(CollectionOptions::default().with_merge_operator(Arc::new(AddMerge)))
    }

    #[test]
    fn reader_count_follows_cursor_lifetime() {
        let snap = Snapshot::new(vec![seg(|b| { b.set(b"a", b"1"); })], add_opts());
        let mut it = snap.start_iterator(None, None);
        assert_eq!(snap.open_readers(), 1);
        it.close().unwrap();
        it.close().unwrap();
        assert_eq!(snap.open_readers(), 0);

        {
            let _a = snap.start_iterator(None, None);
            let _b = snap.start_iterator(Some(&b"a"[..]), None);
            assert_eq!(snap.open_readers(), 2);
        }
        assert_eq!(snap.open_readers(), 0);
    }

    #[test]
    fn merged_path_releases_reader_too() {
        let snap = Snapshot::new(
            vec![seg(|b| { b.set(b"a", b"1"); }), seg(|b| { b.set(b"b", b"2"); })],
            add_opts(),
        );
        let it = snap.start_iterator(None, None);
        assert_eq!(snap.open_readers(), 1);
        drop(it);
        assert_eq!(snap.open_readers(), 0);
    }

    #[test]
    fn get_on_single_and_stacked_segments() {
        let base = seg(|b| {
            b.set(b"a", b"1").set(b"n", b"10").set(b"z", b"26");
        });
        let single = Snapshot::new(vec![base.clone()], add_opts());
        assert_eq!(single.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(single.get(b"m").unwrap(), None);

        let top = seg(|b| {
            b.del(b"a").merge(b"n", b"+5");
        });
        let stacked = Snapshot::new(vec![base, top], add_opts());
        assert_eq!(stacked.get(b"a").unwrap(), None);
        assert_eq!(stacked.get(b"n").unwrap(), Some(b"15".to_vec()));
        assert_eq!(stacked.get(b"z").unwrap(), Some(b"26".to_vec()));
        assert_eq!(stacked.open_readers(), 0);
    }

    #[test]
    fn get_surfaces_reducer_errors() {
        let snap = Snapshot::new(
            vec![seg(|b| { b.merge(b"k", b"+1"); })],
            Arc::new(CollectionOptions::default()),
        );
        let err = snap.get(b"k").unwrap_err();
        assert!(matches!(err, SiftError::MergeOperatorNil { .. }));
        assert_eq!(snap.open_readers(), 0);
    }

    #[test]
    fn empty_snapshot_scans_nothing() {
        let snap = Snapshot::new(Vec::new(), Arc::new(CollectionOptions::default()));
        let mut it = snap.start_iterator(None, None);
        assert!(it.current().unwrap_err().is_done());
        assert!(it.next().unwrap_err().is_done());
        assert_eq!(snap.get(b"x").unwrap(), None);
        assert!(snap.segments().iter().all(|s| s.is_empty()));
    }
}
