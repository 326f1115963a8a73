//! Client configuration.
//!
//! Built in code or read from a JSON file:
//!
//! ```json
//! {
//!   "name_node_endpoint": ["http://master-1:9000", "http://master-2:9000"],
//!   "chunk_size": 4194304,
//!   "max_retries": 3,
//!   "waiting_time": 10
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use videra_transfer::DEFAULT_CHUNK_SIZE;

use crate::error::IngestError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default wait between attempts (and between transport-level retries).
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(10);

/// Settings for an [`IngestClient`](crate::IngestClient).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Candidate master addresses, tried round-robin.
    pub masters: Vec<String>,
    /// Chunk size used until a data node dictates another.
    pub chunk_size: u64,
    /// Retries after the first attempt, for both whole transfers and
    /// single HTTP requests.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub wait_time: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            masters: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            wait_time: DEFAULT_WAIT_TIME,
        }
    }
}

/// `name_node_endpoint` accepts a single address or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Endpoints {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    name_node_endpoint: Option<Endpoints>,
    #[serde(default)]
    chunk_size: Option<u64>,
    #[serde(default)]
    max_retries: Option<u32>,
    /// Seconds.
    #[serde(default)]
    waiting_time: Option<u64>,
}

impl ClientConfig {
    /// Creates a config with default tuning for the given masters.
    pub fn with_masters<I, S>(masters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            masters: masters.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, IngestError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| IngestError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_json(&content)
            .map_err(|e| IngestError::Config(format!("{}: {e}", path.display())))
    }

    /// Parses the JSON config format.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let file: ConfigFile = serde_json::from_str(content)?;
        let mut config = Self::default();
        match file.name_node_endpoint {
            Some(Endpoints::One(addr)) => config.masters.push(addr),
            Some(Endpoints::Many(addrs)) => config.masters.extend(addrs),
            None => {}
        }
        if let Some(size) = file.chunk_size {
            config.chunk_size = size;
        }
        if let Some(retries) = file.max_retries {
            config.max_retries = retries;
        }
        if let Some(secs) = file.waiting_time {
            config.wait_time = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Checks that the config can drive an upload.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.masters.iter().all(|m| m.trim().is_empty()) {
            return Err(IngestError::Config("no master address configured".into()));
        }
        if self.chunk_size == 0 {
            return Err(IngestError::Config("chunk size must be positive".into()));
        }
        Ok(())
    }
}
