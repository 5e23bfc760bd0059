//! Segment file format & IO
//!
//! Header (LE, 48 bytes):
//!   magic[4]     = "SIFT"
//!   version[2]   = 1
//!   rsv[2]       = 0
//!   count[8]     = entry count
//!   table_off[8] = entry table offset
//!   data_off[8]  = data start (HDR_SIZE)
//!   data_len[8]  = data block length
//!   crc[4]       = crc32(data ++ table)
//!   pad[4]
//!
//! Data: key bytes immediately followed by value bytes, per entry.
//! Table: count * { u64 op|klen|vlen, u64 offset into data }

use crate::consts::{HDR_SIZE, MAGIC_SEG, TABLE_ENTRY_SIZE, VERSION};
use crate::errors::{Result, SiftError};
use crate::segment::{check_sizes, Operation, Segment, SegmentAccess};
use crate::utils::{decode_op_klen_vlen, encode_op_klen_vlen, read_u16, read_u32, read_u64, write_u16, write_u32, write_u64};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[cfg(unix)]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let dir = path.parent().unwrap_or(Path::new("."));
    let f = std::fs::OpenOptions::new().read(true).custom_flags(libc::O_DIRECTORY).open(dir)?;
    f.sync_all()
}
#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> std::io::Result<()> { Ok(()) }

/// Writer: entries must arrive in strictly increasing key order; publish is atomic.
pub struct SegmentWriter {
    path_final: PathBuf,
    tmp: BufWriter<NamedTempFile>,
    table: Vec<u64>,
    data_len: u64,
    crc: crc32fast::Hasher,
    last_key: Option<Vec<u8>>,
}

impl SegmentWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path_final = path.as_ref().to_path_buf();
        let dir = path_final.parent().unwrap_or(Path::new("."));
        let tmp = tempfile::Builder::new().prefix("sift_seg_").tempfile_in(dir)?;
        let mut tmp = BufWriter::new(tmp);
        tmp.write_all(&[0u8; HDR_SIZE])?; // header yeri
        Ok(Self {
            path_final,
            tmp,
            table: Vec::new(),
            data_len: 0,
            crc: crc32fast::Hasher::new(),
            last_key: None,
        })
    }

    pub fn add(&mut self, op: Operation, key: &[u8], val: &[u8]) -> Result<()> {
        check_sizes(key, val)?;
        if let Some(prev) = &self.last_key {
            if prev.as_slice() >= key {
                return Err(SiftError::Unsorted(key.to_vec()));
            }
        }
        self.table.push(encode_op_klen_vlen(op.tag(), key.len(), val.len()));
        self.table.push(self.data_len);
        self.tmp.write_all(key)?;
        self.tmp.write_all(val)?;
        self.crc.update(key);
        self.crc.update(val);
        self.data_len += (key.len() + val.len()) as u64;
        self.last_key = Some(key.to_vec());
        Ok(())
    }

    pub fn count(&self) -> usize { self.table.len() / 2 }

    /// finalize: table + header, then atomic publish
    pub fn finalize(self) -> Result<PathBuf> {
        let Self { path_final, tmp, table, data_len, mut crc, .. } = self;
        let mut tmp = tmp;

        let table_off = HDR_SIZE as u64 + data_len;
        for word in &table {
            let bytes = word.to_le_bytes();
            crc.update(&bytes);
            tmp.write_all(&bytes)?;
        }

        let mut file = tmp.into_inner().map_err(|e| e.into_error())?;
        {
            let f = file.as_file_mut();
            f.seek(SeekFrom::Start(0))?;
            let mut hdr = Vec::with_capacity(HDR_SIZE);
            hdr.extend_from_slice(MAGIC_SEG);
            write_u16(&mut hdr, VERSION)?;
            write_u16(&mut hdr, 0)?;
            write_u64(&mut hdr, (table.len() / 2) as u64)?;
            write_u64(&mut hdr, table_off)?;
            write_u64(&mut hdr, HDR_SIZE as u64)?;
            write_u64(&mut hdr, data_len)?;
            write_u32(&mut hdr, crc.finalize())?;
            hdr.resize(HDR_SIZE, 0);
            f.write_all(&hdr)?;
            f.sync_all()?;
        }

        file.persist(&path_final)?;
        let _ = fsync_dir(&path_final);
        Ok(path_final)
    }
}

/// Write a whole in-memory segment to `path`.
pub fn write_segment(path: impl AsRef<Path>, seg: &Segment) -> Result<PathBuf> {
    let mut w = SegmentWriter::create(path)?;
    for pos in 0..seg.len() {
        if let Some((op, k, v)) = seg.operation_key_val(pos) {
            w.add(op, k, v)?;
        }
    }
    w.finalize()
}

/// Read-only segment backed by a memory mapping. Validated on open.
pub struct MappedSegment {
    _f: File,
    mmap: Mmap,
    path: PathBuf,
    count: usize,
    table_off: usize,
    data_off: usize,
}

impl std::fmt::Debug for MappedSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedSegment")
            .field("path", &self.path)
            .field("count", &self.count)
            .finish()
    }
}

impl MappedSegment {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let f = File::open(&path)?;
        let mmap = unsafe { Mmap::map(&f)? };
        if mmap.len() < HDR_SIZE || &mmap[0..4] != MAGIC_SEG { return Err(SiftError::BadHeader); }

        let mut hdr = &mmap[4..HDR_SIZE];
        let ver = read_u16(&mut hdr)?;
        if ver != VERSION { return Err(SiftError::BadHeader); }
        let _rsv = read_u16(&mut hdr)?;
        let count = read_u64(&mut hdr)?;
        let table_off = read_u64(&mut hdr)?;
        let data_off = read_u64(&mut hdr)?;
        let data_len = read_u64(&mut hdr)?;
        let want_crc = read_u32(&mut hdr)?;

        let table_len = count.checked_mul(TABLE_ENTRY_SIZE as u64);
        let end = table_len.and_then(|t| t.checked_add(table_off));
        if data_off != HDR_SIZE as u64
            || data_off.checked_add(data_len) != Some(table_off)
            || end != Some(mmap.len() as u64)
        {
            return Err(SiftError::Corrupt(format!("bad layout in {}", path.display())));
        }
        if crc32fast::hash(&mmap[HDR_SIZE..]) != want_crc {
            return Err(SiftError::Corrupt(format!("checksum mismatch in {}", path.display())));
        }

        let seg = Self {
            _f: f,
            mmap,
            path,
            count: count as usize,
            table_off: table_off as usize,
            data_off: data_off as usize,
        };
        seg.validate_entries(data_len as usize)?;
        Ok(seg)
    }

    pub fn path(&self) -> &Path { &self.path }

    fn word(&self, idx: usize) -> Option<u64> {
        let at = self.table_off + idx * 8;
        let mut b = self.mmap.get(at..at + 8)?;
        read_u64(&mut b).ok()
    }

    fn validate_entries(&self, data_len: usize) -> Result<()> {
        let mut prev: Option<&[u8]> = None;
        for pos in 0..self.count {
            let corrupt = || SiftError::Corrupt(format!("entry {pos} in {}", self.path.display()));
            let (tag, klen, vlen) = decode_op_klen_vlen(self.word(pos * 2).ok_or_else(corrupt)?);
            Operation::from_tag(tag).ok_or_else(corrupt)?;
            let off = self.word(pos * 2 + 1).ok_or_else(corrupt)? as usize;
            let end = off.checked_add(klen).and_then(|e| e.checked_add(vlen));
            if end.map_or(true, |e| e > data_len) {
                return Err(corrupt());
            }
            let key = &self.mmap[self.data_off + off..self.data_off + off + klen];
            if prev.map_or(false, |p| p >= key) {
                return Err(SiftError::Unsorted(key.to_vec()));
            }
            prev = Some(key);
        }
        Ok(())
    }
}

impl SegmentAccess for MappedSegment {
    fn len(&self) -> usize { self.count }

    fn operation_key_val(&self, pos: usize) -> Option<(Operation, &[u8], &[u8])> {
        if pos >= self.count { return None; }
        let (tag, klen, vlen) = decode_op_klen_vlen(self.word(pos * 2)?);
        let kstart = self.data_off + self.word(pos * 2 + 1)? as usize;
        let vstart = kstart + klen;
        Some((Operation::from_tag(tag)?, &self.mmap[kstart..vstart], &self.mmap[vstart..vstart + vlen]))
    }
}
