//! Transport seam between the upload engine and the network.
//!
//! [`HttpTransport`](crate::HttpTransport) implements it over reqwest; tests
//! implement it in memory.

use std::future::Future;
use std::pin::Pin;

use videra_protocol::{AppendResponse, InitRequest, InitResponse, MasterResponse};

use crate::error::IngestError;

/// Future returned by transport calls.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, IngestError>> + Send + 'a>>;

/// Raw request/response exchange with masters and data nodes.
///
/// Implementations report transport failures as errors and hand every
/// received response back unchanged, whatever its status. Interpreting
/// statuses and headers is the caller's job.
pub trait IngestTransport: Send + Sync {
    /// Asks a master for the live upload URL.
    fn query_master<'a>(&'a self, master: &'a str) -> TransportFuture<'a, MasterResponse>;

    /// Opens a transfer on the data node.
    fn send_init<'a>(
        &'a self,
        upload_url: &'a str,
        request: &'a InitRequest,
    ) -> TransportFuture<'a, InitResponse>;

    /// Sends one chunk starting at the global `offset`.
    fn send_append<'a>(
        &'a self,
        upload_url: &'a str,
        transfer_id: &'a str,
        offset: u64,
        data: Vec<u8>,
    ) -> TransportFuture<'a, AppendResponse>;
}
