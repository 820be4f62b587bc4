use bitkv::{
    data_file_name, decode_log_record_header, encode_log_record, log_record_crc, DataFile, IoType,
    KvError, LogRecord, LogRecordType, Result, MAX_LOG_RECORD_HEADER_SIZE,
};
use rand::Rng;
use tempfile::TempDir;
use walkdir::WalkDir;

use std::path::Path;
use std::sync::Arc;

fn temp_dir() -> TempDir {
    TempDir::new().expect("unable to create temporary working directory")
}

fn random_bytes(rng: &mut impl Rng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.gen()).collect()
}

/// Writes raw bytes as data file `fid` and opens it.
fn data_file_with(dir: &Path, fid: u32, bytes: &[u8]) -> Result<DataFile> {
    std::fs::write(data_file_name(dir, fid), bytes)?;
    DataFile::open(dir, fid, IoType::StandardFio)
}

// Should read back two records appended to an empty data file
#[test]
fn read_two_records() -> Result<()> {
    let temp_dir = temp_dir();
    let mut df = DataFile::open(temp_dir.path(), 0, IoType::StandardFio)?;
    df.append_log_record(&LogRecord::normal("key-a", ""))?;
    df.append_log_record(&LogRecord::normal("key-b", "v"))?;

    let (first, l1) = df.read_log_record(0)?;
    assert_eq!(first.rec_type, LogRecordType::Normal);
    assert_eq!(first.key, b"key-a".to_vec());
    assert_eq!(first.value, Vec::<u8>::new());

    let (second, l2) = df.read_log_record(l1)?;
    assert_eq!(second, LogRecord::normal("key-b", "v"));
    assert_eq!(l1 + l2, df.write_offset());
    assert!(matches!(df.read_log_record(l1 + l2), Err(KvError::EndOfData)));
    Ok(())
}

// Sizes returned by reads should chain from one record to the next
#[test]
fn offsets_chain() -> Result<()> {
    let temp_dir = temp_dir();
    let mut df = DataFile::open(temp_dir.path(), 1, IoType::StandardFio)?;
    let records = vec![
        LogRecord::normal("name", "bitcask-kv"),
        LogRecord::deleted("name"),
        LogRecord { key: b"txn".to_vec(), value: Vec::new(), rec_type: LogRecordType::TxnFinished },
    ];
    let mut positions = Vec::new();
    for r in records.iter() {
        positions.push(df.append_log_record(r)?);
    }

    let mut offset = 0;
    for (r, pos) in records.iter().zip(positions.iter()) {
        assert_eq!(offset, pos.offset);
        let (read, size) = df.read_log_record(offset)?;
        assert_eq!(&read, r);
        assert_eq!(size, pos.size as u64);
        offset += size;
    }
    assert_eq!(offset, df.write_offset());
    Ok(())
}

// Randomized keys and values should survive the disk and keep a valid crc
#[test]
fn random_records_round_trip() -> Result<()> {
    let temp_dir = temp_dir();
    let mut rng = rand::thread_rng();
    let mut df = DataFile::open(temp_dir.path(), 2, IoType::StandardFio)?;

    let mut written = Vec::new();
    for _ in 0..200 {
        let key_len = rng.gen_range(0..600);
        let value_len = rng.gen_range(0..2000);
        let record = LogRecord::normal(random_bytes(&mut rng, key_len), random_bytes(&mut rng, value_len));
        written.push(record);
    }
    for r in written.iter() {
        df.append_log_record(r)?;
    }
    df.sync()?;

    let raw = std::fs::read(df.path())?;
    let mut read = Vec::new();
    for item in df.records() {
        let (offset, record, size) = item?;
        let frame = &raw[offset as usize..(offset + size) as usize];
        let (header, _) = decode_log_record_header(frame)?.unwrap();
        assert_eq!(header.crc, log_record_crc(header.rec_type, header.key_size, header.value_size,
            &record.key, &record.value));
        read.push(record);
    }
    assert_eq!(read, written);
    Ok(())
}

// A short tail that can't hold a header ends the data
#[test]
fn short_tail_is_end_of_data() -> Result<()> {
    let temp_dir = temp_dir();
    let mut bytes = encode_log_record(&LogRecord::normal("a", "b"))?;
    let end = bytes.len() as u64;

    for tail in [vec![7u8, 7, 7], vec![1, 2, 3, 4, 0, 0x80], vec![1, 2, 3, 4, 0, 3]].iter() {
        bytes.truncate(end as usize);
        bytes.extend_from_slice(tail);
        let df = data_file_with(temp_dir.path(), 3, &bytes)?;
        assert!(df.read_log_record(0).is_ok());
        assert!(matches!(df.read_log_record(end), Err(KvError::EndOfData)));
        assert!(matches!(df.read_log_record(end + 2), Err(KvError::EndOfData)));
        assert!(matches!(df.read_log_record(end + 100), Err(KvError::EndOfData)));
    }
    Ok(())
}

// Zeroed space after the records is not a record with an empty key
#[test]
fn zeroed_tail_is_end_of_data() -> Result<()> {
    let temp_dir = temp_dir();
    let mut bytes = encode_log_record(&LogRecord::normal("key", "value"))?;
    bytes.extend_from_slice(&encode_log_record(&LogRecord::normal("key2", "value2"))?);
    let end = bytes.len() as u64;
    bytes.resize(bytes.len() + 4 * MAX_LOG_RECORD_HEADER_SIZE, 0);

    let mut df = data_file_with(temp_dir.path(), 4, &bytes)?;
    assert!(matches!(df.read_log_record(end), Err(KvError::EndOfData)));
    assert_eq!(df.records().count(), 2);
    assert!(matches!(df.recover(), Err(KvError::UnreadableTail{ end: e, .. }) if e == end));
    assert!(df.size()? > end);

    let zeros = data_file_with(temp_dir.path(), 5, &[0u8; MAX_LOG_RECORD_HEADER_SIZE])?;
    assert!(matches!(zeros.read_log_record(0), Err(KvError::EndOfData)));
    Ok(())
}

// Recovery should refuse a file whose valid data stops before its end,
// since appends would land after the tail instead of at the returned offset
#[test]
fn recover_refuses_zeroed_tail() -> Result<()> {
    let temp_dir = temp_dir();
    let mut bytes = encode_log_record(&LogRecord::normal("k1", "v1"))?;
    assert_eq!(bytes.len(), 11);
    bytes.resize(bytes.len() + 64, 0);

    let mut df = data_file_with(temp_dir.path(), 10, &bytes)?;
    assert!(matches!(df.recover(), Err(KvError::UnreadableTail{ end: 11, size: 75 })));
    assert_eq!(df.write_offset(), 0);

    // the same record without the tail recovers and appends in place
    let mut clean = data_file_with(temp_dir.path(), 11, &bytes[..11])?;
    assert_eq!(clean.recover()?, 11);
    let pos = clean.append_log_record(&LogRecord::normal("k2", "v2"))?;
    assert_eq!(pos.offset, 11);
    assert_eq!(clean.read_log_record(pos.offset)?.0, LogRecord::normal("k2", "v2"));
    Ok(())
}

// Any flipped byte after the crc should be caught
#[test]
fn flipped_bytes_fail_checksum() -> Result<()> {
    let temp_dir = temp_dir();
    let frame = encode_log_record(&LogRecord::normal("user:1000", "some value bytes"))?;
    let (_, header_len) = decode_log_record_header(&frame)?.unwrap();

    // the type byte and every key/value byte; size bytes would move the frame
    let mut targets = vec![4];
    targets.extend(header_len..frame.len());
    for (i, at) in targets.into_iter().enumerate() {
        let mut corrupt = frame.clone();
        corrupt[at] ^= 0xFF;
        let df = data_file_with(temp_dir.path(), 100 + i as u32, &corrupt)?;
        assert!(matches!(df.read_log_record(0), Err(KvError::InvalidChecksum)), "byte {}", at);
    }
    Ok(())
}

// A record cut off mid payload is corruption, not end of data
#[test]
fn truncated_record_fails_checksum() -> Result<()> {
    let temp_dir = temp_dir();
    let mut bytes = encode_log_record(&LogRecord::normal("k1", "v1"))?;
    let end = bytes.len() as u64;
    let second = encode_log_record(&LogRecord::normal("key-two", "value-two"))?;
    bytes.extend_from_slice(&second[..second.len() - 3]);

    let mut df = data_file_with(temp_dir.path(), 6, &bytes)?;
    assert!(matches!(df.read_log_record(end), Err(KvError::InvalidChecksum)));

    let mut records = df.records();
    assert!(records.next().unwrap().is_ok());
    assert!(matches!(records.next(), Some(Err(KvError::InvalidChecksum))));
    assert!(records.next().is_none());
    assert!(matches!(df.recover(), Err(KvError::InvalidChecksum)));
    Ok(())
}

// Wider key sizes should widen the header and still read back
#[test]
fn header_width_follows_key_size() -> Result<()> {
    let temp_dir = temp_dir();
    let mut df = DataFile::open(temp_dir.path(), 7, IoType::StandardFio)?;
    let small = LogRecord::normal(vec![b's'; 10], "value");
    let large = LogRecord::normal(vec![b'l'; 300], "value");
    let p1 = df.append_log_record(&small)?;
    let p2 = df.append_log_record(&large)?;

    let (_, h1) = decode_log_record_header(&encode_log_record(&small)?)?.unwrap();
    let (_, h2) = decode_log_record_header(&encode_log_record(&large)?)?.unwrap();
    assert_eq!(h1 + 1, h2);

    assert_eq!(df.read_log_record(p1.offset)?, (small, p1.size as u64));
    assert_eq!(df.read_log_record(p2.offset)?, (large, p2.size as u64));
    Ok(())
}

// The mmap backend should see the same records as standard io
#[test]
fn mmap_scan_matches_fileio() -> Result<()> {
    let temp_dir = temp_dir();
    let mut df = DataFile::open(temp_dir.path(), 8, IoType::StandardFio)?;
    for i in 0..100 {
        df.append_log_record(&LogRecord::normal(format!("key{}", i), format!("value{}", i)))?;
    }
    df.sync()?;
    let end = df.write_offset();
    df.close()?;

    let mut mm = DataFile::open(temp_dir.path(), 8, IoType::MMap)?;
    let keys: Vec<Vec<u8>> = mm.records()
        .map(|item| item.map(|(_, r, _)| r.key))
        .collect::<Result<_>>()?;
    assert_eq!(keys.len(), 100);
    assert_eq!(keys[42], b"key42".to_vec());
    assert_eq!(mm.recover()?, end);
    Ok(())
}

// Readers may share one data file across threads
#[test]
fn concurrent_reads() -> Result<()> {
    let temp_dir = temp_dir();
    let mut df = DataFile::open(temp_dir.path(), 9, IoType::StandardFio)?;
    let mut positions = Vec::new();
    for i in 0..64 {
        positions.push(df.append_log_record(&LogRecord::normal(format!("k{}", i), format!("v{}", i)))?);
    }
    let df = Arc::new(df);
    let positions = Arc::new(positions);

    let handles: Vec<_> = (0..8).map(|t| {
        let df = df.clone();
        let positions = positions.clone();
        std::thread::spawn(move || {
            for (i, pos) in positions.iter().enumerate().skip(t).step_by(8) {
                let (r, size) = df.read_log_record(pos.offset).unwrap();
                assert_eq!(r.key, format!("k{}", i).into_bytes());
                assert_eq!(size, pos.size as u64);
            }
        })
    }).collect();
    for h in handles {
        h.join().unwrap();
    }
    Ok(())
}

// Repeated open/close must not leak handles
#[test]
fn open_close_cycles() -> Result<()> {
    let temp_dir = temp_dir();
    for _ in 0..2048 {
        let mut df = DataFile::open(temp_dir.path(), 10, IoType::StandardFio)?;
        df.close()?;
        let mut mm = DataFile::open(temp_dir.path(), 10, IoType::MMap)?;
        mm.close()?;
    }
    Ok(())
}

// Data files should be named by zero padded id
#[test]
fn data_file_names_on_disk() -> Result<()> {
    let temp_dir = temp_dir();
    for fid in [0u32, 1, 42, 999_999_999].iter() {
        DataFile::open(temp_dir.path(), *fid, IoType::StandardFio)?;
    }
    let mut names: Vec<String> = WalkDir::new(temp_dir.path())
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["000000000.data", "000000001.data", "000000042.data", "999999999.data"]);
    Ok(())
}
