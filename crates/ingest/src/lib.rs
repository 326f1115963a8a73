//! Resumable chunked upload client for the Videra ingestion service.
//!
//! An upload asks a master for the live data-node URL, opens a transfer
//! there, and streams the file group in chunks. The data node steers the
//! stream: it can move the client to another offset or demand smaller
//! chunks. Failed attempts are retried from scratch, rotating masters when
//! a master is the one failing.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod initiate;
pub mod negotiate;
pub mod session;
pub mod transport;
pub mod types;
pub mod uploader;

#[cfg(test)]
mod testing;

pub use client::IngestClient;
pub use config::{ClientConfig, DEFAULT_MAX_RETRIES, DEFAULT_WAIT_TIME};
pub use endpoint::EndpointPool;
pub use error::IngestError;
pub use http::HttpTransport;
pub use initiate::initiate_transfer;
pub use negotiate::negotiate_upload_url;
pub use session::TransferSession;
pub use transport::{IngestTransport, TransportFuture};
pub use types::{BundleReport, UploadEvent, UploadReport};
pub use uploader::{ChunkUploader, MAX_CONSECUTIVE_RESUMES};
