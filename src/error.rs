use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No sector anywhere on the disk can hold the requested bytes.
    AllocationExhausted { required: usize },
    /// A single sector refused an append write.
    InsufficientSpace { required: usize, available: usize },
    NotFound(String),
    CapacityExceeded { block_id: u64, capacity: usize },
    MalformedEncoding(String),
    ChecksumMismatch { block_id: u64 },
    AlreadyPlaced(u64),
    InvalidOperator(String),
    ReservedCharacter { key: String },
    InvalidConfig(String),
    /// An id counter has no values left to issue.
    IdsExhausted(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocationExhausted { required } => {
                write!(f, "No sector has {} free bytes", required)
            }
            Error::InsufficientSpace {
                required,
                available,
            } => write!(
                f,
                "Not enough space in sector: required {}, available {}",
                required, available
            ),
            Error::NotFound(what) => write!(f, "Not found: {}", what),
            Error::CapacityExceeded { block_id, capacity } => {
                write!(f, "Block {} is full ({} records)", block_id, capacity)
            }
            Error::MalformedEncoding(msg) => write!(f, "Malformed encoding: {}", msg),
            Error::ChecksumMismatch { block_id } => {
                write!(f, "Checksum mismatch for block {}", block_id)
            }
            Error::AlreadyPlaced(block_id) => {
                write!(f, "Block {} already has a physical location", block_id)
            }
            Error::InvalidOperator(op) => write!(f, "Invalid comparison operator: {}", op),
            Error::ReservedCharacter { key } => {
                write!(f, "Attribute {:?} contains a reserved character", key)
            }
            Error::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            Error::IdsExhausted(kind) => write!(f, "No {} ids left", kind),
        }
    }
}

impl std::error::Error for Error {}
