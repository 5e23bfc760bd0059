//! A store directory: `manifest.json`, optional `options.json`, `*.sift` segments.

use crate::consts::SEGMENT_EXT;
use crate::errors::Result;
use crate::iterator_merged::DynSegment;
use crate::manifest::Manifest;
use crate::options::{CollectionOptions, OptionsFile};
use crate::segment::{SegmentAccess, SegmentBuilder};
use crate::segment_file::{write_segment, MappedSegment};
use crate::snapshot::Snapshot;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Store {
    dir: PathBuf,
    manifest: Manifest,
    options: Arc<CollectionOptions>,
}

fn now_id() -> String {
    let now = time::OffsetDateTime::now_utc();
    let secs = now.unix_timestamp();
    let nanos = now.nanosecond();
    let r: u16 = rand::random();
    format!("{secs}-{nanos:09}-{r:04x}")
}

impl Store {
    /// Open (or create) a store at the given directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let dir = path.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let manifest = Manifest::load(&dir)?;
        let options = Arc::new(CollectionOptions::load(&dir)?);
        Ok(Self { dir, manifest, options })
    }

    /// Create the directory, persist `opts` and an empty manifest if none exists.
    pub fn init(path: impl AsRef<Path>, opts: &OptionsFile) -> Result<Self> {
        let dir = path.as_ref();
        fs::create_dir_all(dir)?;
        opts.resolve()?;
        opts.save_atomic(dir)?;
        let store = Self::open(dir)?;
        store.manifest.save_atomic(dir)?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn manifest(&self) -> &Manifest { &self.manifest }

    pub fn options(&self) -> &CollectionOptions { &self.options }

    pub fn segment_paths(&self) -> Vec<PathBuf> {
        self.manifest.segment_paths().into_iter().map(|p| self.dir.join(p)).collect()
    }

    /// Freeze a batch into a new, newest segment and record it in the manifest.
    pub fn write_batch(&mut self, batch: SegmentBuilder) -> Result<PathBuf> {
        let seg = batch.build()?;
        let name = format!("seg-{}.{SEGMENT_EXT}", now_id());
        let path = write_segment(self.dir.join(&name), &seg)?;

        self.manifest.add_segment(&name, seg.len() as u64);
        self.manifest.save_atomic(&self.dir)?;
        tracing::debug!(segment = %name, entries = seg.len(), "segment published");
        Ok(path)
    }

    /// Map every segment in the manifest.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let mut segments: Vec<Arc<DynSegment>> = Vec::with_capacity(self.manifest.segments.len());
        for p in self.segment_paths() {
            segments.push(Arc::new(MappedSegment::open(&p)?));
        }
        Ok(Snapshot::new(segments, self.options.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SiftError;
    use tempfile::tempdir;

    #[test]
    fn write_then_snapshot() {
        let tmp = tempdir().unwrap();
        let mut store = Store::init(tmp.path(), &OptionsFile { merge_operator: Some("add".into()) }).unwrap();

        let mut b = SegmentBuilder::new();
        b.set(b"x", b"1").merge(b"y", b"+2");
        store.write_batch(b).unwrap();
        assert_eq!(store.manifest().segments.len(), 1);
        assert_eq!(store.manifest().segments[0].entries, 2);

        let reopened = Store::open(tmp.path()).unwrap();
        let snap = reopened.snapshot().unwrap();
        assert_eq!(snap.segments().len(), 1);
        assert_eq!(snap.get(b"y").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn init_rejects_unknown_operator() {
        let tmp = tempdir().unwrap();
        let res = Store::init(tmp.path(), &OptionsFile { merge_operator: Some("mul".into()) });
        assert!(matches!(res, Err(SiftError::UnknownMergeOperator(_))));
    }

    #[test]
    fn duplicate_keys_write_nothing() {
        let tmp = tempdir().unwrap();
        let mut store = Store::open(tmp.path()).unwrap();
        let mut b = SegmentBuilder::new();
        b.set(b"k", b"1").del(b"k");
        assert!(store.write_batch(b).is_err());
        assert!(store.manifest().segments.is_empty());
    }
}
