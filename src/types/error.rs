use thiserror::Error;

use crate::types::{Key, PageNumber};

/// Two classes of failure share this enum: structural violations (corrupt
/// file, page bounds, sentinel dereference) that callers should treat as
/// defects, and domain outcomes (duplicate key, key not found, underflow
/// refusal) that the statement layer surfaces as ordinary messages.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupted database file: {reason}")]
    CorruptedFile { reason: String },

    #[error("page number {page} out of bounds (max: {max})")]
    PageNumberOutOfBounds { page: PageNumber, max: PageNumber },

    #[error("tried to flush page {page}, which was never loaded")]
    PageNeverLoaded { page: PageNumber },

    #[error("invalid node type tag: {0}")]
    InvalidNodeType(u8),

    #[error("tried to access child {child} of node with {num_keys} keys")]
    ChildOutOfBounds { child: usize, num_keys: usize },

    #[error("right child of page {page} is unassigned")]
    MissingRightChild { page: PageNumber },

    #[error("page {page} has no cells")]
    EmptyNode { page: PageNumber },

    #[error("duplicate key: {key}")]
    DuplicateKey { key: Key },

    #[error("key not found: {key}")]
    KeyNotFound { key: Key },

    #[error("table is empty")]
    TableEmpty,

    #[error("deleting from page {page} would underflow it; merging is not implemented")]
    WouldUnderflow { page: PageNumber },

    #[error("table is full")]
    TableFull,

    #[error("value too long for column '{field}' (max: {max} bytes)")]
    ValueTooLong { field: &'static str, max: usize },
}

impl DatabaseError {
    /// Domain outcomes are expected results of ordinary statements; anything
    /// else indicates a defect or an unrecoverable storage failure.
    pub fn is_domain_outcome(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateKey { .. }
                | DatabaseError::KeyNotFound { .. }
                | DatabaseError::TableEmpty
                | DatabaseError::WouldUnderflow { .. }
                | DatabaseError::TableFull
                | DatabaseError::ValueTooLong { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
