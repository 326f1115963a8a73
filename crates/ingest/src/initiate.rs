//! Opening a transfer on the data node.

use tracing::info;
use videra_protocol::TransferGrant;
use videra_transfer::FileGroup;

use crate::error::IngestError;
use crate::transport::IngestTransport;

/// Sends the init request for `group` and returns the server's grant.
///
/// Anything but `201 Created` with an `ID` header fails the attempt.
pub async fn initiate_transfer(
    transport: &dyn IngestTransport,
    upload_url: &str,
    group: &FileGroup,
) -> Result<TransferGrant, IngestError> {
    let request = group.init_request();
    let resp = transport.send_init(upload_url, &request).await?;
    let grant = resp.into_grant()?;

    info!(
        transfer_id = %grant.transfer_id,
        kind = %group.kind(),
        filename = %request.filename,
        total_bytes = group.total_size(),
        chunk_size = ?grant.chunk_size,
        "transfer initiated"
    );
    Ok(grant)
}
