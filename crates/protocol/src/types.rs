use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    HEADER_ASSOCIATED_MODEL_ID, HEADER_CODE_SIZE, HEADER_CONFIG_SIZE, HEADER_FILENAME,
    HEADER_FILESIZE, HEADER_FILETYPE, HEADER_MODEL_SIZE, HEADER_REQUEST_TYPE, REQUEST_TYPE_INIT,
};

/// Kind of a file group, sent as the `Filetype` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// A single video file.
    Video,
    /// A model bundle: model, config and code files, in that order.
    Model,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Video => "video",
            FileKind::Model => "model",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size metadata announced when a transfer is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSizes {
    Single(u64),
    Model { model: u64, config: u64, code: u64 },
}

impl GroupSizes {
    /// Total bytes of the group (the `Filesize` header).
    pub fn total(&self) -> u64 {
        match *self {
            GroupSizes::Single(size) => size,
            GroupSizes::Model {
                model,
                config,
                code,
            } => model + config + code,
        }
    }
}

/// The init request that opens a transfer on the data node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitRequest {
    pub filename: String,
    pub kind: FileKind,
    pub sizes: GroupSizes,
    pub associated_model_id: Option<String>,
}

impl InitRequest {
    /// Returns the request headers in a stable order.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (HEADER_REQUEST_TYPE, REQUEST_TYPE_INIT.to_string()),
            (HEADER_FILENAME, self.filename.clone()),
            (HEADER_FILETYPE, self.kind.as_str().to_string()),
            (HEADER_FILESIZE, self.sizes.total().to_string()),
        ];

        if let GroupSizes::Model {
            model,
            config,
            code,
        } = self.sizes
        {
            headers.push((HEADER_MODEL_SIZE, model.to_string()));
            headers.push((HEADER_CONFIG_SIZE, config.to_string()));
            headers.push((HEADER_CODE_SIZE, code.to_string()));
        }

        if let Some(id) = self
            .associated_model_id
            .as_deref()
            .filter(|id| !id.is_empty())
        {
            headers.push((HEADER_ASSOCIATED_MODEL_ID, id.to_string()));
        }

        headers
    }
}
