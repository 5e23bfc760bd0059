// crates/sift_core/src/consts.rs

pub const MAGIC_SEG: &[u8; 4] = b"SIFT";
pub const VERSION: u16 = 1;

pub const HDR_SIZE: usize = 48;
/// Two little-endian words per entry: op|klen|vlen, data offset.
pub const TABLE_ENTRY_SIZE: usize = 16;

pub const OP_SHIFT: u32 = 56;
pub const KLEN_SHIFT: u32 = 32;
pub const KLEN_MASK: u64 = 0x00FF_FFFF;
pub const VLEN_MASK: u64 = 0xFFFF_FFFF;

pub const MAX_KEY_LEN: usize = KLEN_MASK as usize;
pub const MAX_VAL_LEN: usize = VLEN_MASK as usize;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const OPTIONS_FILE: &str = "options.json";
pub const SEGMENT_EXT: &str = "sift";

const _: () = { assert!(HDR_SIZE >= 44); };
