pub mod consts;
pub mod errors;
pub mod utils;
pub mod segment;
pub mod segment_file;
pub mod merge_op;
pub mod options;
pub mod iterator;
pub mod iterator_single;
pub mod iterator_merged;
pub mod manifest;
pub mod snapshot;
pub mod store;

pub use errors::{Result, SiftError};
pub use iterator::{Closer, Cursor, EntryEx, FnCloser};
pub use iterator_merged::{DynSegment, MergedCursor};
pub use iterator_single::SingleSegmentCursor;
pub use merge_op::{AddMerge, AppendMerge, MergeOperator};
pub use options::{CollectionOptions, OptionsFile};
pub use segment::{Operation, Segment, SegmentAccess, SegmentBuilder};
pub use segment_file::{MappedSegment, SegmentWriter};
pub use snapshot::Snapshot;
pub use store::Store;
