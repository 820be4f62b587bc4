use std::io;

use failure::Fail;

#[derive(Fail, Debug)]
pub enum KvError {
    #[fail(display = "IOError: {}", err)]
    IOError{err: io::Error},
    /// Reached the end of the file or an all-zero header. Not a fault.
    #[fail(display = "End of data")]
    EndOfData,
    #[fail(display = "Invalid crc value, log record maybe corrupted")]
    InvalidChecksum,
    #[fail(display = "Partial write: {} of {} bytes written", written, expected)]
    PartialWrite{expected: usize, written: usize},
    #[fail(display = "Data file already closed")]
    FileClosed,
    #[fail(display = "Corrupted log record header")]
    CorruptedHeader,
    #[fail(display = "Unknown log record type: {}", _0)]
    UnknownRecordType(u8),
    #[fail(display = "Operation unsupported by {} storage", backend)]
    Unsupported{backend: &'static str},
    #[fail(display = "Data file has unreadable bytes from {} to {}", end, size)]
    UnreadableTail{end: u64, size: u64},
    #[fail(display = "Log record too large: {} bytes", size)]
    RecordTooLarge{size: usize},
    #[fail(display = "Invalid options: {}", _0)]
    InvalidOptions(String),
}

impl KvError {
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, KvError::EndOfData)
    }
}

impl From<io::Error> for KvError {
    fn from(err: io::Error) -> Self {
        KvError::IOError{err}
    }
}

pub type Result<T> = std::result::Result<T, KvError>;
