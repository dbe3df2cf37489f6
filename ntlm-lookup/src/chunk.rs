use crate::error::{Error, Result};

/// One bulk request's worth of canonical hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of this batch in the run.
    pub index: usize,
    pub hashes: Vec<String>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Newline-joined request payload.
    pub fn payload(&self) -> String {
        self.hashes.join("\n")
    }
}

/// Partitions `hashes` into consecutive batches of at most `size` entries.
///
/// Every batch holds exactly `size` hashes except possibly the last, and
/// concatenating the batches reproduces `hashes` in order.
pub fn chunk(hashes: &[String], size: usize) -> Result<Vec<Batch>> {
    if size == 0 {
        return Err(Error::InvalidConfiguration("batch size must be at least 1".into()));
    }

    Ok(hashes
        .chunks(size)
        .enumerate()
        .map(|(index, c)| Batch { index, hashes: c.to_vec() })
        .collect())
}
