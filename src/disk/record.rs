//! Log record framing.
//!
//! On disk every record is
//!
//! ```text
//! [ crc:4 LE ][ type:1 ][ key_size:varint ][ value_size:varint ][ key ][ value ]
//! ```
//!
//! The crc covers everything after itself. A header that decodes to zero
//! crc and zero sizes marks unwritten space and ends a scan.

use crate::{KvError, Result};
use super::varint::{self, MAX_VARINT_LEN32, MAX_VARINT_LEN64};

use bytes::{Buf, BufMut};
use crc32fast::Hasher;

use std::convert::TryFrom;

const CRC_SIZE: usize = 4;
/// Bytes needed before the varints can be looked at: crc and type.
pub const MIN_LOG_RECORD_HEADER_SIZE: usize = CRC_SIZE + 1;
pub const MAX_LOG_RECORD_HEADER_SIZE: usize = MIN_LOG_RECORD_HEADER_SIZE + 2 * MAX_VARINT_LEN32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    Normal = 0,
    Deleted = 1,
    TxnFinished = 2,
}

impl TryFrom<u8> for LogRecordType {
    type Error = KvError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(LogRecordType::Normal),
            1 => Ok(LogRecordType::Deleted),
            2 => Ok(LogRecordType::TxnFinished),
            _ => Err(KvError::UnknownRecordType(value)),
        }
    }
}

/// A key/value mutation as written to a data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub rec_type: LogRecordType,
}

impl LogRecord {
    pub fn normal(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into(), value: value.into(), rec_type: LogRecordType::Normal }
    }

    pub fn deleted(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into(), value: Vec::new(), rec_type: LogRecordType::Deleted }
    }

    /// Total bytes this record takes on disk.
    pub fn encoded_size(&self) -> usize {
        MIN_LOG_RECORD_HEADER_SIZE
            + varint::encoded_len(self.key.len() as u64)
            + varint::encoded_len(self.value.len() as u64)
            + self.key.len()
            + self.value.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecordHeader {
    pub crc: u32,
    /// Raw tag; only interpreted once the crc is verified.
    pub rec_type: u8,
    pub key_size: u32,
    pub value_size: u32,
}

impl LogRecordHeader {
    /// All-zero header found in preallocated or never-written space.
    pub fn is_sentinel(&self) -> bool {
        self.crc == 0 && self.key_size == 0 && self.value_size == 0
    }

    pub fn payload_size(&self) -> u64 {
        self.key_size as u64 + self.value_size as u64
    }
}

/// Where a record lives: data file, offset and on-disk size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecordPos {
    pub fid: u32,
    pub offset: u64,
    pub size: u32,
}

/// Checksum over `type ‖ key_size ‖ value_size ‖ key ‖ value`, sizes in
/// their varint form.
pub fn log_record_crc(rec_type: u8, key_size: u32, value_size: u32, key: &[u8], value: &[u8]) -> u32 {
    let mut sizes = Vec::with_capacity(1 + 2 * MAX_VARINT_LEN32);
    sizes.put_u8(rec_type);
    varint::encode_u32(&mut sizes, key_size);
    varint::encode_u32(&mut sizes, value_size);

    let mut hasher = Hasher::new();
    hasher.update(&sizes);
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// On-disk sizes are `u32`; anything wider cannot be framed.
pub(crate) fn checked_size(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| KvError::RecordTooLarge{ size: len })
}

/// Header bytes for `record`; the caller appends key then value.
pub fn encode_log_record_header(record: &LogRecord) -> Result<Vec<u8>> {
    let key_size = checked_size(record.key.len())?;
    let value_size = checked_size(record.value.len())?;
    let crc = log_record_crc(record.rec_type as u8, key_size, value_size, &record.key, &record.value);

    let mut header = Vec::with_capacity(MAX_LOG_RECORD_HEADER_SIZE);
    header.put_u32_le(crc);
    header.put_u8(record.rec_type as u8);
    varint::encode_u32(&mut header, key_size);
    varint::encode_u32(&mut header, value_size);
    Ok(header)
}

/// Whole frame: header, key, value.
pub fn encode_log_record(record: &LogRecord) -> Result<Vec<u8>> {
    let mut buf = encode_log_record_header(record)?;
    buf.reserve(record.key.len() + record.value.len());
    buf.extend_from_slice(&record.key);
    buf.extend_from_slice(&record.value);
    Ok(buf)
}

/// Decodes a header from the front of `buf`.
///
/// Returns `Ok(None)` when `buf` is too short to hold a header, and the
/// header with its real encoded length otherwise. Sentinel headers are
/// returned as-is; see `LogRecordHeader::is_sentinel`.
pub fn decode_log_record_header(buf: &[u8]) -> Result<Option<(LogRecordHeader, usize)>> {
    if buf.len() < MIN_LOG_RECORD_HEADER_SIZE {
        return Ok(None)
    }
    let mut fixed = &buf[..MIN_LOG_RECORD_HEADER_SIZE];
    let crc = fixed.get_u32_le();
    let rec_type = fixed.get_u8();

    let mut index = MIN_LOG_RECORD_HEADER_SIZE;
    let (key_size, n) = match varint::decode_u32(&buf[index..])? {
        Some(v) => v,
        None => return Ok(None),
    };
    index += n;
    let (value_size, n) = match varint::decode_u32(&buf[index..])? {
        Some(v) => v,
        None => return Ok(None),
    };
    index += n;

    Ok(Some((LogRecordHeader { crc, rec_type, key_size, value_size }, index)))
}

pub fn encode_log_record_pos(pos: &LogRecordPos) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_VARINT_LEN32 * 2 + MAX_VARINT_LEN64);
    varint::encode_u32(&mut buf, pos.fid);
    varint::encode_u64(&mut buf, pos.offset);
    varint::encode_u32(&mut buf, pos.size);
    buf
}

pub fn decode_log_record_pos(buf: &[u8]) -> Result<LogRecordPos> {
    let mut index = 0;
    let (fid, n) = varint::decode_u32(buf)?.ok_or(KvError::CorruptedHeader)?;
    index += n;
    let (offset, n) = varint::decode_u64(&buf[index..])?.ok_or(KvError::CorruptedHeader)?;
    index += n;
    let (size, _) = varint::decode_u32(&buf[index..])?.ok_or(KvError::CorruptedHeader)?;
    Ok(LogRecordPos { fid, offset, size })
}
