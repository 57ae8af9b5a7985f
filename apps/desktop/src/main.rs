use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{
    load_photo, load_settings, ControllerEvent, DirectoryDownloader, UploadController,
};
use shared::domain::{OperationState, ResultImage};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Turn a photo into a personalized children's book page")]
struct Args {
    /// Photo to personalize (jpg, png, webp, ...).
    photo: Option<PathBuf>,
    /// Base URL of the personalization API.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Directory the personalized page is saved into.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// Settings file; defaults to ./client.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    check_health: bool,
    #[arg(long)]
    no_download: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(api_url) = args.api_url.clone() {
        settings.api_url = api_url;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        settings.request_timeout_secs = timeout_secs;
    }
    let config = settings.resolve().context("invalid client settings")?;

    let controller = UploadController::new(
        config,
        Arc::new(DirectoryDownloader::new(args.output_dir.clone())),
    );
    let renderer = tokio::spawn(render_events(controller.subscribe()));
    let outcome = run(&controller, &args).await;
    // Dropping the last controller handle closes the event channel; the renderer then
    // drains what is queued and exits.
    drop(controller);
    if let Err(err) = renderer.await {
        warn!(error = %err, "event renderer stopped abnormally");
    }
    outcome
}

async fn run(controller: &UploadController, args: &Args) -> Result<()> {
    if args.check_health {
        let health = controller.check_health().await?;
        println!("Personalization API status: {}", health.status);
        if !health.is_healthy() {
            warn!(status = %health.status, "personalization API is not healthy");
        }
    }

    let Some(path) = args.photo.as_deref() else {
        if args.check_health {
            return Ok(());
        }
        bail!("no photo given; pass the path of a JPG, PNG or WEBP image");
    };

    let photo = load_photo(path).await?;
    controller.select_file(photo).await;

    let image = match controller.submit().await {
        Ok(image) => image,
        Err(err) => {
            eprintln!("Error: {err}");
            if err.is_retryable() {
                eprintln!("This may be temporary; please try again.");
            }
            return Err(err.into());
        }
    };
    println!("Your personalized book page: {}", describe_result(&image));

    if !args.no_download {
        let saved = controller.download().await?;
        println!("Saved to {}", saved.display());
    }
    Ok(())
}

async fn render_events(mut events: broadcast::Receiver<ControllerEvent>) {
    loop {
        match events.recv().await {
            Ok(ControllerEvent::FileSelected {
                file_name,
                size_bytes,
            }) => println!("Selected {file_name} ({})", human_readable_bytes(size_bytes)),
            Ok(ControllerEvent::PreviewReady(preview)) => {
                info!(preview_len = preview.as_str().len(), "preview ready")
            }
            Ok(ControllerEvent::StateChanged(OperationState::Submitting)) => {
                println!("Processing your photo... This may take 10-30 seconds.")
            }
            Ok(ControllerEvent::StateChanged(_)) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "renderer lagged behind events"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn describe_result(image: &ResultImage) -> String {
    let Ok(bytes) = image.decode() else {
        return format!("{} image (undecodable payload)", image.mime_subtype);
    };
    match image::load_from_memory(&bytes) {
        Ok(decoded) => format!(
            "{}x{} {} image, {}",
            decoded.width(),
            decoded.height(),
            image.mime_subtype,
            human_readable_bytes(bytes.len() as u64)
        ),
        Err(_) => format!(
            "{} image, {}",
            image.mime_subtype,
            human_readable_bytes(bytes.len() as u64)
        ),
    }
}

fn human_readable_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        return format!("{bytes} B");
    }
    if bytes < MB {
        return format_scaled_unit(bytes, KB, "KB");
    }
    if bytes < GB {
        return format_scaled_unit(bytes, MB, "MB");
    }
    format_scaled_unit(bytes, GB, "GB")
}

fn format_scaled_unit(bytes: u64, unit_size: u64, unit_label: &str) -> String {
    let value = bytes as f64 / unit_size as f64;
    let value_text = format!("{value:.1}");
    let compact_value = value_text.strip_suffix(".0").unwrap_or(&value_text);
    format!("{compact_value} {unit_label}")
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use clap::Parser;
    use image::{ImageFormat, Rgba, RgbaImage};

    use super::*;

    #[test]
    fn formats_sizes_readably() {
        assert_eq!(human_readable_bytes(0), "0 B");
        assert_eq!(human_readable_bytes(1023), "1023 B");
        assert_eq!(human_readable_bytes(1536), "1.5 KB");
        assert_eq!(human_readable_bytes(2 * 1024 * 1024), "2 MB");
        assert_eq!(human_readable_bytes(1064), "1 KB");
        assert_eq!(human_readable_bytes(1_048_575), "1024 KB");
        assert_eq!(human_readable_bytes(3 * 1024 * 1024 * 1024), "3 GB");
    }

    #[tokio::test]
    async fn renderer_drains_queued_events_after_sender_closes() {
        let (tx, rx) = broadcast::channel(8);
        tx.send(ControllerEvent::StateChanged(OperationState::Submitting))
            .expect("send");
        tx.send(ControllerEvent::StateChanged(OperationState::Idle))
            .expect("send");
        let renderer = tokio::spawn(render_events(rx));
        drop(tx);

        tokio::time::timeout(std::time::Duration::from_secs(1), renderer)
            .await
            .expect("renderer exits once the channel closes")
            .expect("join");
    }

    #[test]
    fn describes_decodable_result_dimensions() {
        let mut png = Vec::new();
        RgbaImage::from_pixel(3, 2, Rgba([255, 0, 0, 255]))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .expect("encode png");
        let image = ResultImage::new(Some("png"), STANDARD.encode(&png));

        assert!(describe_result(&image).starts_with("3x2 png image"));
    }

    #[test]
    fn describes_undecodable_result_without_failing() {
        let image = ResultImage::new(Some("jpeg"), "Zm9v");
        assert_eq!(describe_result(&image), "jpeg image, 3 B");
        let corrupt = ResultImage::new(None, "%%%");
        assert_eq!(describe_result(&corrupt), "png image (undecodable payload)");
    }

    #[test]
    fn parses_cli_overrides() {
        let args = Args::try_parse_from([
            "desktop",
            "me.jpg",
            "--api-url",
            "https://api.example.com/",
            "--timeout-secs",
            "90",
            "--no-download",
        ])
        .expect("parse");
        assert_eq!(args.photo, Some(PathBuf::from("me.jpg")));
        assert_eq!(args.api_url.as_deref(), Some("https://api.example.com/"));
        assert_eq!(args.timeout_secs, Some(90));
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert!(args.no_download);
        assert!(!args.check_health);
    }
}
