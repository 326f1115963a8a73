//! `videra-upload`: uploads videos and models to a Videra cluster.

mod cli;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use videra_ingest::{IngestClient, UploadEvent};

use crate::cli::{Args, Command, validate_paths};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,videra=debug")),
        )
        .init();

    let args = Args::parse();
    validate_paths(&args.command)?;
    let config = args.client_config()?;

    let (events_tx, events_rx) = mpsc::channel(256);
    let logger = tokio::spawn(log_events(events_rx));
    let mut client = IngestClient::new(config)?.with_events(events_tx);

    let result = match args.command {
        Command::Video { path, model_id, .. } => client
            .upload_video(&path, model_id.as_deref())
            .await
            .map(|report| println!("{}", report.transfer_id)),
        Command::Model {
            model,
            config,
            code,
            ..
        } => client
            .upload_model(&model, &config, &code)
            .await
            .map(|report| println!("{}", report.transfer_id)),
        Command::Bundle {
            model,
            config,
            code,
            video,
            ..
        } => client
            .upload_bundle(&model, &config, &code, &video)
            .await
            .map(|report| {
                println!("model {}", report.model.transfer_id);
                println!("video {}", report.video.transfer_id);
            }),
    };

    drop(client);
    let _ = logger.await;
    result?;
    Ok(())
}

async fn log_events(mut rx: mpsc::Receiver<UploadEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            UploadEvent::AttemptStarted {
                attempt,
                max_attempts,
            } if attempt > 1 => {
                info!(attempt, max_attempts, "retrying upload");
            }
            UploadEvent::Progress { offset, total } => {
                let percent = if total == 0 {
                    100.0
                } else {
                    offset as f64 * 100.0 / total as f64
                };
                info!(offset, total, "{percent:.1}%");
            }
            UploadEvent::AttemptFailed { attempt, error } => {
                warn!(attempt, error = %error, "attempt failed");
            }
            other => debug!(event = ?other, "upload event"),
        }
    }
}
