//! Upload client: the retry controller and the public entry points.

use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use videra_transfer::FileGroup;

use crate::config::ClientConfig;
use crate::endpoint::EndpointPool;
use crate::error::IngestError;
use crate::http::HttpTransport;
use crate::initiate::initiate_transfer;
use crate::negotiate::negotiate_upload_url;
use crate::session::TransferSession;
use crate::transport::IngestTransport;
use crate::types::{BundleReport, UploadEvent, UploadReport};
use crate::uploader::ChunkUploader;

/// Uploads file groups to a Videra cluster.
///
/// One client runs one transfer at a time. Master rotation state persists
/// across uploads; everything negotiated with a data node lives only for
/// the attempt that negotiated it.
pub struct IngestClient<T: IngestTransport = HttpTransport> {
    transport: T,
    endpoints: EndpointPool,
    chunk_size: u64,
    max_retries: u32,
    wait_time: Duration,
    events: Option<mpsc::Sender<UploadEvent>>,
}

impl IngestClient<HttpTransport> {
    /// Creates a client talking HTTP. The transport retries single requests
    /// with the same bound and delay as whole attempts.
    pub fn new(config: ClientConfig) -> Result<Self, IngestError> {
        let transport = HttpTransport::new(config.max_retries, config.wait_time)?;
        Self::with_transport(config, transport)
    }
}

impl<T: IngestTransport> IngestClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, IngestError> {
        config.validate()?;
        let endpoints = EndpointPool::new(config.masters)?;
        Ok(Self {
            transport,
            endpoints,
            chunk_size: config.chunk_size,
            max_retries: config.max_retries,
            wait_time: config.wait_time,
            events: None,
        })
    }

    /// Reports progress on `tx`. A closed receiver does not affect uploads.
    pub fn with_events(mut self, tx: mpsc::Sender<UploadEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoints(&self) -> &EndpointPool {
        &self.endpoints
    }

    /// Uploads a single video, optionally linked to a model transfer.
    pub async fn upload_video(
        &mut self,
        path: impl AsRef<Path>,
        associated_model_id: Option<&str>,
    ) -> Result<UploadReport, IngestError> {
        let mut group = FileGroup::video(path).await?;
        if let Some(id) = associated_model_id {
            group = group.with_associated_model(id);
        }
        self.upload_group(&group).await
    }

    /// Uploads a model with its config and code files.
    pub async fn upload_model(
        &mut self,
        model: impl AsRef<Path>,
        config: impl AsRef<Path>,
        code: impl AsRef<Path>,
    ) -> Result<UploadReport, IngestError> {
        let group = FileGroup::model(model, config, code).await?;
        self.upload_group(&group).await
    }

    /// Uploads a model, then a video associated with the model's transfer.
    ///
    /// All four files are checked before anything is sent.
    pub async fn upload_bundle(
        &mut self,
        model: impl AsRef<Path>,
        config: impl AsRef<Path>,
        code: impl AsRef<Path>,
        video: impl AsRef<Path>,
    ) -> Result<BundleReport, IngestError> {
        let model_group = FileGroup::model(model, config, code).await?;
        let video_group = FileGroup::video(video).await?;

        let model = self.upload_group(&model_group).await?;
        let video_group = video_group.with_associated_model(model.transfer_id.clone());
        let video = self.upload_group(&video_group).await?;
        Ok(BundleReport { model, video })
    }

    /// Uploads `group`, retrying whole attempts up to the configured bound.
    ///
    /// Every attempt starts a fresh transfer. The configured wait separates
    /// consecutive attempts.
    pub async fn upload_group(&mut self, group: &FileGroup) -> Result<UploadReport, IngestError> {
        let max_attempts = self.max_retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.wait_time).await;
            }
            self.emit(UploadEvent::AttemptStarted {
                attempt,
                max_attempts,
            })
            .await;

            match self.attempt(group).await {
                Ok(transfer_id) => {
                    info!(
                        transfer_id = %transfer_id,
                        kind = %group.kind(),
                        bytes = group.total_size(),
                        attempt,
                        "upload completed"
                    );
                    self.emit(UploadEvent::Completed {
                        transfer_id: transfer_id.clone(),
                    })
                    .await;
                    return Ok(UploadReport {
                        kind: group.kind(),
                        transfer_id,
                        total_bytes: group.total_size(),
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "upload attempt failed");
                    last_error = e.to_string();
                    self.emit(UploadEvent::AttemptFailed {
                        attempt,
                        error: last_error.clone(),
                    })
                    .await;
                }
            }
        }

        error!(
            attempts = max_attempts,
            error = %last_error,
            "upload failed, giving up"
        );
        Err(IngestError::UploadFailed {
            attempts: max_attempts,
            last_error,
        })
    }

    /// One attempt: negotiate, initiate, stream. Returns the transfer id.
    async fn attempt(&mut self, group: &FileGroup) -> Result<String, IngestError> {
        let master = self.endpoints.current().to_string();
        let upload_url = match negotiate_upload_url(&self.transport, &master).await {
            Ok(url) => url,
            Err(e) => {
                let next = self.endpoints.next().to_string();
                warn!(master = %master, next = %next, error = %e, "switching master");
                self.emit(UploadEvent::MasterFailed {
                    master,
                    next,
                    error: e.to_string(),
                })
                .await;
                return Err(e);
            }
        };
        self.emit(UploadEvent::UploadUrl {
            url: upload_url.clone(),
        })
        .await;

        let mut session = TransferSession::new(group, master, upload_url, self.chunk_size);
        let grant = initiate_transfer(&self.transport, session.upload_url(), group).await?;
        session.apply_grant(grant);
        self.emit(UploadEvent::Initiated {
            transfer_id: session.transfer_id().to_string(),
            chunk_size: session.chunk_size(),
        })
        .await;

        ChunkUploader::new(&self.transport, self.events.as_ref())
            .upload(&mut session)
            .await?;
        Ok(session.transfer_id().to_string())
    }

    async fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}
