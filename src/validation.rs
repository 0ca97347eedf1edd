//! Input Validation
//!
//! Pure predicates that protect the record and file size invariants.
//! They never fail on their own; the façade turns a `false` into
//! [`StoreError::InvalidArgument`](crate::StoreError::InvalidArgument).
//!
//! Keys are checked for length only. Any key up to [`MAX_KEY_LENGTH`] bytes is
//! accepted, including the empty string, and no charset rules apply.

/// Maximum key length in bytes.
pub const MAX_KEY_LENGTH: usize = 32;

/// Maximum size of a serialized document in bytes.
pub const MAX_DOCUMENT_SIZE: usize = 16_000;

/// Maximum size of the backing file in bytes (1 GiB).
pub const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Returns `false` if the key is longer than [`MAX_KEY_LENGTH`] bytes.
#[inline]
pub fn validate_key(key: &str) -> bool {
    key.len() <= MAX_KEY_LENGTH
}

/// Returns `false` if the serialized document exceeds [`MAX_DOCUMENT_SIZE`] bytes.
#[inline]
pub fn validate_document_size(serialized: &str) -> bool {
    serialized.len() <= MAX_DOCUMENT_SIZE
}

/// Returns `false` if a file of `size` bytes is over [`MAX_FILE_SIZE`].
#[inline]
pub fn validate_file_size(size: u64) -> bool {
    size <= MAX_FILE_SIZE
}
