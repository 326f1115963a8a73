//! Command-line arguments and their translation into a client config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use videra_ingest::ClientConfig;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Upload videos and models to a Videra ingestion cluster"
)]
pub struct Args {
    /// JSON config file (name_node_endpoint, chunk_size, max_retries, waiting_time)
    #[arg(id = "client_config", short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Initial chunk size in bytes
    #[arg(long, global = true)]
    pub chunk_size: Option<u64>,

    /// Retries after the first attempt
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long = "wait-secs", global = true)]
    pub wait_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a single video
    Video {
        path: PathBuf,

        /// Transfer id of a previously uploaded model
        #[arg(long)]
        model_id: Option<String>,

        /// Master addresses, tried in order
        masters: Vec<String>,
    },
    /// Upload a model with its config and code files
    Model {
        model: PathBuf,
        config: PathBuf,
        code: PathBuf,

        /// Master addresses, tried in order
        masters: Vec<String>,
    },
    /// Upload a model, then a video associated with it
    Bundle {
        model: PathBuf,
        config: PathBuf,
        code: PathBuf,
        video: PathBuf,

        /// Master addresses, tried in order
        masters: Vec<String>,
    },
}

impl Command {
    pub fn masters(&self) -> &[String] {
        match self {
            Command::Video { masters, .. }
            | Command::Model { masters, .. }
            | Command::Bundle { masters, .. } => masters,
        }
    }

    /// Input files, labelled for error messages.
    pub fn paths(&self) -> Vec<(&'static str, &Path)> {
        match self {
            Command::Video { path, .. } => vec![("video", path.as_path())],
            Command::Model {
                model,
                config,
                code,
                ..
            } => vec![
                ("model", model.as_path()),
                ("config", config.as_path()),
                ("code", code.as_path()),
            ],
            Command::Bundle {
                model,
                config,
                code,
                video,
                ..
            } => vec![
                ("model", model.as_path()),
                ("config", config.as_path()),
                ("code", code.as_path()),
                ("video", video.as_path()),
            ],
        }
    }
}

/// Rejects empty path arguments before any work starts.
pub fn validate_paths(command: &Command) -> Result<()> {
    for (label, path) in command.paths() {
        if path.as_os_str().is_empty() {
            bail!("{label} path must not be empty");
        }
    }
    Ok(())
}

impl Args {
    /// Merges the config file, flag overrides and positional masters.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ClientConfig::default(),
        };

        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        if let Some(secs) = self.wait_secs {
            config.wait_time = Duration::from_secs(secs);
        }
        config
            .masters
            .extend(self.command.masters().iter().cloned());

        config.validate()?;
        Ok(config)
    }
}
