use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::consts::{KLEN_MASK, KLEN_SHIFT, OP_SHIFT, VLEN_MASK};

pub fn crc32(data: &[u8]) -> u32 { crc32fast::hash(data) }

/// Pack operation tag, key length and value length into one table word.
#[inline]
pub fn encode_op_klen_vlen(op: u8, klen: usize, vlen: usize) -> u64 {
    ((op as u64) << OP_SHIFT)
        | (((klen as u64) & KLEN_MASK) << KLEN_SHIFT)
        | ((vlen as u64) & VLEN_MASK)
}

#[inline]
pub fn decode_op_klen_vlen(word: u64) -> (u8, usize, usize) {
    let op = (word >> OP_SHIFT) as u8;
    let klen = ((word >> KLEN_SHIFT) & KLEN_MASK) as usize;
    let vlen = (word & VLEN_MASK) as usize;
    (op, klen, vlen)
}

pub fn write_u64<W: Write>(w: &mut W, v: u64) -> io::Result<()> { w.write_u64::<LE>(v) }
pub fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> { w.write_u32::<LE>(v) }
pub fn write_u16<W: Write>(w: &mut W, v: u16) -> io::Result<()> { w.write_u16::<LE>(v) }
pub fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> { r.read_u64::<LE>() }
pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> { r.read_u32::<LE>() }
pub fn read_u16<R: Read>(r: &mut R) -> io::Result<u16> { r.read_u16::<LE>() }
