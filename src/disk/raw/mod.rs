use crate::Result;
use crate::options::IoType;

use std::path::Path;

mod fileio;
mod mmapfile;

/// Byte source underneath a data file.
///
/// Writes are sequential appends; reads are positional and take `&self`, so
/// readers never contend with each other. An implementation must make each
/// `write` visible as a unit to concurrent readers.
pub trait Storage: Sync + Send {
    /// Reads into `buf` starting at `offset`. Returns fewer bytes than
    /// `buf.len()` only when the end of the file is reached.
    fn read(&self, buf: &mut [u8], offset: u64) -> Result<usize>;
    /// Appends `buf`, returning how many bytes actually landed.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
    fn sync(&mut self) -> Result<()>;
    fn close(self: Box<Self>) -> Result<()>;
    fn size(&self) -> Result<u64>;
}

pub use fileio::FileIO;
pub use mmapfile::MmapFile;

pub fn new_storage(path: impl AsRef<Path>, io_type: IoType) -> Result<Box<dyn Storage>> {
    Ok(match io_type {
        IoType::StandardFio => Box::new(FileIO::open(path)?),
        IoType::MMap => Box::new(MmapFile::open(path)?),
    })
}
