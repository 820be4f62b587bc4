use crate::{KvError, Result};

use std::path::PathBuf;

/// Which byte source backs a data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoType {
    /// Standard file io, read and append.
    StandardFio,
    /// Read-only memory map, used to speed up startup scans.
    MMap,
}

impl Default for IoType {
    fn default() -> Self {
        IoType::StandardFio
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub dir_path: PathBuf,
    pub io_type: IoType,
    /// Sync the active data file after every append.
    pub sync_writes: bool,
}

impl Default for Options {
    fn default() -> Self {
        let mut dir_path = std::env::temp_dir();
        dir_path.push("bitkv");
        Self {
            dir_path,
            io_type: IoType::default(),
            sync_writes: false,
        }
    }
}

impl Options {
    pub fn check(&self) -> Result<()> {
        if self.dir_path.as_os_str().is_empty() {
            return Err(KvError::InvalidOptions("database dir path is empty".to_owned()))
        }
        Ok(())
    }
}
