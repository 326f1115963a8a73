//! Upload URL negotiation with a master.

use tracing::{debug, info};

use crate::error::IngestError;
use crate::transport::IngestTransport;

/// Asks `master` for the live data-node upload URL.
///
/// Every failure (transport error, non-OK status, empty body) comes back as
/// [`IngestError::Master`], telling the caller to rotate to another master.
pub async fn negotiate_upload_url(
    transport: &dyn IngestTransport,
    master: &str,
) -> Result<String, IngestError> {
    debug!(master, "requesting upload url");
    let master_failure = |reason: String| IngestError::Master {
        address: master.to_string(),
        reason,
    };

    let resp = transport
        .query_master(master)
        .await
        .map_err(|e| master_failure(e.to_string()))?;
    let url = resp
        .into_upload_url()
        .map_err(|e| master_failure(e.to_string()))?;

    info!(master, upload_url = %url, "updated upload url");
    Ok(url)
}
