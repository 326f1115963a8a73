//! Round-robin selection of master addresses.

use crate::error::IngestError;

/// Candidate masters and the currently selected one.
///
/// The cursor always indexes a valid candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPool {
    addresses: Vec<String>,
    cursor: usize,
}

impl EndpointPool {
    /// Builds a pool selecting the first address. Blank addresses are
    /// dropped; an empty pool is an error.
    pub fn new<I, S>(addresses: I) -> Result<Self, IngestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let addresses: Vec<String> = addresses
            .into_iter()
            .map(Into::into)
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if addresses.is_empty() {
            return Err(IngestError::Config("no master address configured".into()));
        }
        Ok(Self {
            addresses,
            cursor: 0,
        })
    }

    /// Currently selected master.
    pub fn current(&self) -> &str {
        &self.addresses[self.cursor]
    }

    /// Moves to the next master, wrapping around, and returns it.
    pub fn next(&mut self) -> &str {
        self.cursor = (self.cursor + 1) % self.addresses.len();
        &self.addresses[self.cursor]
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}
