extern crate failure_derive;

mod errors;
mod options;
mod disk;

pub use errors::{Result, KvError};
pub use options::{IoType, Options};
pub use disk::*;
