use crate::{KvError, Result};
use crate::options::IoType;
use super::raw::{new_storage, Storage};
use super::record::{
    checked_size, decode_log_record_header, encode_log_record, encode_log_record_pos, log_record_crc,
    LogRecord, LogRecordPos, LogRecordType, MAX_LOG_RECORD_HEADER_SIZE,
};

use tracing::{debug, warn};

use std::convert::TryFrom;
use std::io;
use std::path::{Path, PathBuf};

pub const DATA_FILE_NAME_SUFFIX: &str = ".data";
/// Data file ids are zero padded to this many digits in file names.
pub const FILE_ID_WIDTH: usize = 9;
pub const HINT_FILE_NAME: &str = "hint-index";
pub const MERGE_FINISHED_FILE_NAME: &str = "merge-finished";
pub const SEQ_NO_FILE_NAME: &str = "seq-no";

pub type FileId = u32;

pub fn data_file_name(dir: impl AsRef<Path>, fid: FileId) -> PathBuf {
    dir.as_ref().join(format!("{:0width$}{}", fid, DATA_FILE_NAME_SUFFIX, width = FILE_ID_WIDTH))
}

/// One append-only segment of log records.
///
/// `write_offset` only moves on appends. A reopened file starts at 0 again;
/// call `recover` to scan to the end of valid data before appending.
/// Appends need `&mut self`, reads only `&self`.
pub struct DataFile {
    file_id: FileId,
    write_offset: u64,
    path: PathBuf,
    storage: Option<Box<dyn Storage>>,
}

impl DataFile {
    pub fn open(dir: impl AsRef<Path>, fid: FileId, io_type: IoType) -> Result<Self> {
        Self::new_file(data_file_name(dir, fid), fid, io_type)
    }

    /// Key to record position entries written while merging.
    pub fn open_hint_file(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new_file(dir.as_ref().join(HINT_FILE_NAME), 0, IoType::StandardFio)
    }

    pub fn open_merge_finished_file(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new_file(dir.as_ref().join(MERGE_FINISHED_FILE_NAME), 0, IoType::StandardFio)
    }

    pub fn open_seq_no_file(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new_file(dir.as_ref().join(SEQ_NO_FILE_NAME), 0, IoType::StandardFio)
    }

    /// Wraps an already opened byte source.
    pub fn from_storage(fid: FileId, path: impl Into<PathBuf>, storage: Box<dyn Storage>) -> Self {
        Self { file_id: fid, write_offset: 0, path: path.into(), storage: Some(storage) }
    }

    fn new_file(path: PathBuf, fid: FileId, io_type: IoType) -> Result<Self> {
        let storage = new_storage(&path, io_type)?;
        debug!(fid, path = %path.display(), ?io_type, "open data file");
        Ok(Self::from_storage(fid, path, storage))
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    /// Restores the cursor after an external scan.
    pub fn set_write_offset(&mut self, offset: u64) {
        self.write_offset = offset;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.storage.is_none()
    }

    pub fn size(&self) -> Result<u64> {
        self.storage()?.size()
    }

    /// Reads the record starting at `offset` and returns it with its size on
    /// disk, so the next record starts at `offset + size`.
    ///
    /// # Errors
    ///
    /// `KvError::EndOfData` at the end of the file or on a zeroed header.
    /// `KvError::InvalidChecksum` if the record is corrupt or cut short.
    pub fn read_log_record(&self, offset: u64) -> Result<(LogRecord, u64)> {
        let storage = self.storage()?;
        let file_size = storage.size()?;
        if offset >= file_size {
            return Err(KvError::EndOfData)
        }

        // don't read past the end of the file for the last short header
        let header_bytes = std::cmp::min(MAX_LOG_RECORD_HEADER_SIZE as u64, file_size - offset);
        let header_buf = read_n_bytes(storage, header_bytes as usize, offset)?;

        let (header, header_size) = match decode_log_record_header(&header_buf)? {
            Some((header, _)) if header.is_sentinel() => return Err(KvError::EndOfData),
            Some(decoded) => decoded,
            None => return Err(KvError::EndOfData),
        };

        let header_size = header_size as u64;
        let record_size = header_size + header.payload_size();
        if offset + record_size > file_size {
            return Err(KvError::InvalidChecksum)
        }

        let (mut key, mut value) = (Vec::new(), Vec::new());
        if header.payload_size() > 0 {
            let mut kv = read_n_bytes(storage, header.payload_size() as usize, offset + header_size)?;
            value = kv.split_off(header.key_size as usize);
            key = kv;
        }

        let crc = log_record_crc(header.rec_type, header.key_size, header.value_size, &key, &value);
        if crc != header.crc {
            return Err(KvError::InvalidChecksum)
        }

        let rec_type = LogRecordType::try_from(header.rec_type)?;
        Ok((LogRecord { key, value, rec_type }, record_size))
    }

    /// Appends already encoded bytes.
    ///
    /// On a short write the cursor still moves by what actually landed, and
    /// `KvError::PartialWrite` is returned.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        let written = self.storage_mut()?.write(buf)?;
        self.write_offset += written as u64;
        if written < buf.len() {
            warn!(fid = self.file_id, expected = buf.len(), written, "partial write to data file");
            return Err(KvError::PartialWrite{ expected: buf.len(), written })
        }
        Ok(())
    }

    pub fn append_log_record(&mut self, record: &LogRecord) -> Result<LogRecordPos> {
        let offset = self.write_offset;
        let frame = encode_log_record(record)?;
        let size = checked_size(frame.len())?;
        self.write(&frame)?;
        Ok(LogRecordPos { fid: self.file_id, offset, size })
    }

    pub fn write_hint_record(&mut self, key: &[u8], pos: &LogRecordPos) -> Result<()> {
        let record = LogRecord::normal(key, encode_log_record_pos(pos));
        self.write(&encode_log_record(&record)?)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.storage_mut()?.sync()
    }

    /// Releases the byte source. Nothing is synced here.
    pub fn close(&mut self) -> Result<()> {
        let storage = self.storage.take().ok_or(KvError::FileClosed)?;
        debug!(fid = self.file_id, "close data file");
        storage.close()
    }

    /// Reopens the same file over another byte source, keeping the cursor.
    pub fn set_io_type(&mut self, io_type: IoType) -> Result<()> {
        let old = self.storage.take().ok_or(KvError::FileClosed)?;
        old.close()?;
        self.storage = Some(new_storage(&self.path, io_type)?);
        debug!(fid = self.file_id, ?io_type, "switch data file io");
        Ok(())
    }

    /// Records from offset 0 up to the end of valid data.
    pub fn records(&self) -> Records<'_> {
        Records { file: self, offset: 0, done: false }
    }

    /// Scans to the end of valid data and moves `write_offset` there.
    ///
    /// Appends always land at the physical end of the file, so bytes after
    /// the last valid record make the file unappendable:
    /// `KvError::UnreadableTail` is returned and the cursor is left alone.
    pub fn recover(&mut self) -> Result<u64> {
        let end = {
            let mut records = self.records();
            while let Some(item) = records.next() {
                if let Err(err) = item {
                    warn!(fid = self.file_id, offset = records.offset(), %err, "stop recovery at corrupted record");
                    return Err(err)
                }
            }
            records.offset()
        };
        let size = self.size()?;
        if end < size {
            warn!(fid = self.file_id, end, size, "data file has unwritten or unreadable tail");
            return Err(KvError::UnreadableTail{ end, size })
        }
        debug!(fid = self.file_id, end, "recovered write offset");
        self.write_offset = end;
        Ok(end)
    }

    fn storage(&self) -> Result<&(dyn Storage + 'static)> {
        self.storage.as_deref().ok_or(KvError::FileClosed)
    }

    fn storage_mut(&mut self) -> Result<&mut (dyn Storage + 'static)> {
        self.storage.as_deref_mut().ok_or(KvError::FileClosed)
    }
}

fn read_n_bytes(storage: &dyn Storage, n: usize, offset: u64) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let read = storage.read(&mut buf, offset)?;
    if read < n {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short read inside data file").into())
    }
    Ok(buf)
}

/// Iterator over `(offset, record, size)`. Stops quietly at end of data and
/// yields the error once on anything else.
pub struct Records<'a> {
    file: &'a DataFile,
    offset: u64,
    done: bool,
}

impl<'a> Records<'a> {
    /// Offset right after the last record yielded.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<(u64, LogRecord, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None
        }
        match self.file.read_log_record(self.offset) {
            Ok((record, size)) => {
                let at = self.offset;
                self.offset += size;
                Some(Ok((at, record, size)))
            }
            Err(err) if err.is_end_of_data() => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
