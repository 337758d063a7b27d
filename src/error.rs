/// Errors from the library.
use core::{error, fmt};

/// Errors returned by fallible table construction and resizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableError {
    /// The requested capacity overflows the bucket-array layout.
    CapacityOverflow,
    /// No memory could be allocated for the bucket array.
    OutOfMemory,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            TableError::CapacityOverflow => write!(f, "capacity overflows bucket-array layout"),
            TableError::OutOfMemory => write!(f, "bucket-array allocation failed"),
        }
    }
}

impl error::Error for TableError {}
