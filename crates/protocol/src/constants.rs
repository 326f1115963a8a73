//! Header names, request markers and status codes of the ingestion wire
//! contract.

/// Distinguishes init and append requests sent to the data node.
pub const HEADER_REQUEST_TYPE: &str = "Request-Type";
/// Base name of the representative file (init).
pub const HEADER_FILENAME: &str = "Filename";
/// `video` or `model` (init).
pub const HEADER_FILETYPE: &str = "Filetype";
/// Total bytes of the file group (init).
pub const HEADER_FILESIZE: &str = "Filesize";
pub const HEADER_MODEL_SIZE: &str = "Model-Size";
pub const HEADER_CONFIG_SIZE: &str = "Config-Size";
pub const HEADER_CODE_SIZE: &str = "Code-Size";
/// Links a video transfer to a previously uploaded model transfer (init).
pub const HEADER_ASSOCIATED_MODEL_ID: &str = "Associated-Model-ID";
/// Transfer identifier: issued in the init response, echoed on every append.
pub const HEADER_ID: &str = "ID";
/// Starting global offset of an append, or the server's resume offset in a
/// response.
pub const HEADER_OFFSET: &str = "Offset";
/// Server-dictated chunk size. The client must adopt it when present.
pub const HEADER_MAX_REQUEST_SIZE: &str = "Max-Request-Size";

/// `Request-Type` value opening a transfer.
pub const REQUEST_TYPE_INIT: &str = "init";
/// `Request-Type` value carrying chunk bytes.
pub const REQUEST_TYPE_APPEND: &str = "APPEND";

/// Master answered with the upload URL; data node accepted a chunk.
pub const STATUS_OK: u16 = 200;
/// Data node opened a transfer, or acknowledged its final byte.
pub const STATUS_CREATED: u16 = 201;
