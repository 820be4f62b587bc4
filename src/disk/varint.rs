//! Unsigned LEB128 varints.
//!
//! Each byte carries 7 bits of payload, low bits first; the high bit marks
//! that another byte follows. Decoders report how many bytes they consumed
//! so callers can compute variable header lengths.
//!
//! Decoding distinguishes two failures:
//! - the input ends before the last byte: `Ok(None)`, more data may exist;
//! - the varint is wider than its type allows: `KvError::CorruptedHeader`.

use crate::{KvError, Result};

use bytes::{Buf, BufMut};

pub const MAX_VARINT_LEN32: usize = 5;
pub const MAX_VARINT_LEN64: usize = 10;

pub fn encode_u64(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80;
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

pub fn encode_u32(buf: &mut impl BufMut, value: u32) {
    encode_u64(buf, value as u64)
}

/// Bytes `value` takes once encoded.
pub fn encoded_len(mut value: u64) -> usize {
    let mut n = 1;
    while value >= 0x80 {
        value >>= 7;
        n += 1;
    }
    n
}

pub fn decode_u64(buf: &[u8]) -> Result<Option<(u64, usize)>> {
    decode(buf, MAX_VARINT_LEN64)
}

pub fn decode_u32(buf: &[u8]) -> Result<Option<(u32, usize)>> {
    match decode(buf, MAX_VARINT_LEN32)? {
        Some((value, n)) if value <= u32::MAX as u64 => Ok(Some((value as u32, n))),
        Some(_) => Err(KvError::CorruptedHeader),
        None => Ok(None),
    }
}

fn decode(buf: &[u8], max_len: usize) -> Result<Option<(u64, usize)>> {
    let mut cursor = buf;
    let mut value: u64 = 0;
    let mut shift = 0;

    for i in 0..max_len {
        if !cursor.has_remaining() {
            return Ok(None)
        }
        let byte = cursor.get_u8();
        // the tenth byte of a u64 only has room for one bit
        if i == MAX_VARINT_LEN64 - 1 && byte > 1 {
            return Err(KvError::CorruptedHeader)
        }
        value |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Ok(Some((value, buf.len() - cursor.remaining())))
        }
        shift += 7;
    }

    Err(KvError::CorruptedHeader)
}
