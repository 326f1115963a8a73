use std::path::{Path, PathBuf};

use videra_protocol::{FileKind, GroupSizes, InitRequest};

use crate::TransferError;

/// Order in which the files of a model bundle are streamed.
pub const MODEL_UPLOAD_ORDER: [&str; 3] = ["model", "config", "code"];

/// One file of a group. The size is read once, when the spec is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    /// Role of the file within its group (`video`, `model`, `config`, `code`).
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl FileSpec {
    /// Stats `path` and records its size.
    pub async fn stat(name: &str, path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(TransferError::io("stat", path, e)),
        };
        if !meta.is_file() {
            return Err(TransferError::InvalidGroup(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            size: meta.len(),
        })
    }
}

/// Files uploaded as one logical unit under a single transfer identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    kind: FileKind,
    files: Vec<FileSpec>,
    associated_model_id: Option<String>,
}

impl FileGroup {
    /// Builds a single-video group.
    pub async fn video(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let video = FileSpec::stat("video", path).await?;
        Ok(Self {
            kind: FileKind::Video,
            files: vec![video],
            associated_model_id: None,
        })
    }

    /// Builds a model bundle streamed as model, config, code.
    pub async fn model(
        model: impl AsRef<Path>,
        config: impl AsRef<Path>,
        code: impl AsRef<Path>,
    ) -> Result<Self, TransferError> {
        let [model_name, config_name, code_name] = MODEL_UPLOAD_ORDER;
        let files = vec![
            FileSpec::stat(model_name, model).await?,
            FileSpec::stat(config_name, config).await?,
            FileSpec::stat(code_name, code).await?,
        ];
        Ok(Self {
            kind: FileKind::Model,
            files,
            associated_model_id: None,
        })
    }

    /// Builds a group from already-stated files.
    pub fn from_specs(kind: FileKind, files: Vec<FileSpec>) -> Result<Self, TransferError> {
        let expected = match kind {
            FileKind::Video => 1,
            FileKind::Model => MODEL_UPLOAD_ORDER.len(),
        };
        if files.len() != expected {
            return Err(TransferError::InvalidGroup(format!(
                "{kind} group needs {expected} files, got {}",
                files.len()
            )));
        }
        Ok(Self {
            kind,
            files,
            associated_model_id: None,
        })
    }

    /// Links a video group to a previously uploaded model transfer.
    pub fn with_associated_model(mut self, model_id: impl Into<String>) -> Self {
        self.associated_model_id = Some(model_id.into());
        self
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn files(&self) -> &[FileSpec] {
        &self.files
    }

    pub fn associated_model_id(&self) -> Option<&str> {
        self.associated_model_id.as_deref()
    }

    /// File sizes in upload order.
    pub fn sizes(&self) -> Vec<u64> {
        self.files.iter().map(|f| f.size).collect()
    }

    /// Length of the virtual concatenation of all files.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Base name of the representative (first) file.
    pub fn filename(&self) -> String {
        self.files
            .first()
            .and_then(|f| f.path.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Builds the request that opens this group's transfer.
    pub fn init_request(&self) -> InitRequest {
        let sizes = match (self.kind, self.files.as_slice()) {
            (FileKind::Model, [model, config, code]) => GroupSizes::Model {
                model: model.size,
                config: config.size,
                code: code.size,
            },
            _ => GroupSizes::Single(self.total_size()),
        };
        let associated_model_id = match self.kind {
            FileKind::Video => self.associated_model_id.clone(),
            FileKind::Model => None,
        };

        InitRequest {
            filename: self.filename(),
            kind: self.kind,
            sizes,
            associated_model_id,
        }
    }
}
