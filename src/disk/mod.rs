mod raw;
mod varint;
mod record;
mod datafile;

pub use raw::{new_storage, Storage, FileIO, MmapFile};
pub use varint::{decode_u32, decode_u64, encode_u32, encode_u64, encoded_len,
    MAX_VARINT_LEN32, MAX_VARINT_LEN64
};
pub use record::{LogRecord, LogRecordType, LogRecordHeader, LogRecordPos,
    encode_log_record, encode_log_record_header, decode_log_record_header, log_record_crc,
    encode_log_record_pos, decode_log_record_pos,
    MAX_LOG_RECORD_HEADER_SIZE, MIN_LOG_RECORD_HEADER_SIZE
};
pub use datafile::{DataFile, Records, FileId, data_file_name,
    DATA_FILE_NAME_SUFFIX, FILE_ID_WIDTH, HINT_FILE_NAME, MERGE_FINISHED_FILE_NAME, SEQ_NO_FILE_NAME
};
