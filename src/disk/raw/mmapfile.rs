use crate::{KvError, Result};
use super::Storage;

use memmap::Mmap;

use std::fs::{create_dir_all, OpenOptions};
use std::path::{Path, PathBuf};

/// Read-only memory map over a data file.
///
/// The map is taken once at open time, so `size` is the file length at that
/// moment. An empty file has no mapping at all.
pub struct MmapFile {
    mmap: Option<Mmap>,
}

impl MmapFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let pb: PathBuf = path.as_ref().into();
        if let Some(parent) = pb.parent() {
            create_dir_all(parent)?;
        }
        let f = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&pb)?;

        let mmap = if f.metadata()?.len() == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&f)? })
        };
        Ok(Self{ mmap })
    }

    fn unsupported() -> KvError {
        KvError::Unsupported{ backend: "mmap" }
    }
}

impl Storage for MmapFile {
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let data: &[u8] = match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        };
        if offset >= data.len() as u64 {
            return Ok(0)
        }
        let start = offset as usize;
        let n = std::cmp::min(buf.len(), data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write(&mut self, _: &[u8]) -> Result<usize> {
        Err(Self::unsupported())
    }

    fn sync(&mut self) -> Result<()> {
        Err(Self::unsupported())
    }

    fn close(self: Box<Self>) -> Result<()> {
        drop(self.mmap);
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.mmap.as_ref().map_or(0, |m| m.len() as u64))
    }
}
