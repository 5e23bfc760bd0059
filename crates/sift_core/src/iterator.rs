//! Capability surface shared by the single-segment and merged cursors.

use crate::errors::{Result, SiftError};
use crate::options::CollectionOptions;
use crate::segment::Operation;
use std::borrow::Cow;

/// Metadata returned by [`Cursor::current_ex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryEx {
    pub operation: Operation,
}

/// Forward-only cursor over sorted entries.
///
/// Slices handed out by `current`/`current_ex` borrow the cursor, so they
/// stay valid only until the next `next` or `close` call. Copy them to keep
/// them longer.
pub trait Cursor {
    /// Advance one entry. `Err(SiftError::IteratorDone)` once exhausted.
    fn next(&mut self) -> Result<()>;

    /// Current key and value. A deleted key comes back with `None`.
    /// Merge entries are reduced here, on read.
    fn current(&self) -> Result<(&[u8], Option<Cow<'_, [u8]>>)>;

    /// Raw operation, key and value with no tombstone or merge handling.
    fn current_ex(&self) -> Result<(EntryEx, &[u8], &[u8])>;

    /// Release owned resources. Safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

/// A resource whose release is tied to a cursor.
pub trait Closer {
    fn close(&mut self) -> Result<()>;
}

/// Adapts a one-shot closure into a [`Closer`].
pub struct FnCloser<F: FnOnce() -> Result<()>>(Option<F>);

impl<F: FnOnce() -> Result<()>> FnCloser<F> {
    pub fn new(f: F) -> Self { Self(Some(f)) }
}

impl<F: FnOnce() -> Result<()>> Closer for FnCloser<F> {
    fn close(&mut self) -> Result<()> {
        match self.0.take() {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

/// Run the configured merge operator, mapping a missing operator or a
/// rejected reduction to the matching error for `key`.
pub(crate) fn full_merge(
    options: Option<&CollectionOptions>,
    key: &[u8],
    existing: Option<&[u8]>,
    operands: &[&[u8]],
) -> Result<Vec<u8>> {
    let mo = options
        .and_then(|o| o.merge_operator())
        .ok_or_else(|| SiftError::MergeOperatorNil { key: key.to_vec() })?;

    mo.full_merge(key, existing, operands)
        .ok_or_else(|| SiftError::MergeOperatorFullMergeFailed { key: key.to_vec() })
}
