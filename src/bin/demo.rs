// pipcorder demo
// Records three seconds of the main display with webcam 0 as the overlay.
// Without the `screen` or `camera` features a synthetic source stands in.

use std::time::Duration;

use anyhow::Context;
use pipcorder::{
    init_logging, DirectoryPersistence, PipcorderConfig, RecordingController, StopReport,
    VideoSource,
};

const RECORD_FOR: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = PipcorderConfig::load_or_default();
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    println!("pipcorder {}", pipcorder::VERSION);
    println!("  format:    {}", config.recording.mime_type);
    println!("  output:    {}", config.storage.output_directory);

    let mut controller = RecordingController::from_config(&config)?;
    controller.arm(primary(), secondary())?;
    if !controller.on_start_requested() {
        anyhow::bail!("recording did not start");
    }
    println!("Recording for {}s (Ctrl-C to stop early)...", RECORD_FOR.as_secs());

    let persistence = DirectoryPersistence::new(&config.storage.output_directory);
    let report = tokio::select! {
        _ = tokio::time::sleep(RECORD_FOR) => controller.on_stop_requested(&persistence).await?,
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted");
            controller.on_stop_requested(&persistence).await?
        }
        lost = controller.wait_for_source_loss() => {
            let role = match lost {
                pipcorder::CaptureError::SourceLost(role) => role,
                other => return Err(other.into()),
            };
            controller.on_source_lost(role, &persistence).await?
        }
    };

    match report {
        Some(report) => print_report(&report, &controller.elapsed_display()),
        None => println!("Nothing was recorded"),
    }
    Ok(())
}

#[cfg(feature = "screen")]
fn primary() -> Box<dyn VideoSource> {
    Box::new(pipcorder::ScreenSource::new(pipcorder::ScreenTarget::FirstDisplay))
}

#[cfg(not(feature = "screen"))]
fn primary() -> Box<dyn VideoSource> {
    Box::new(pipcorder::SyntheticSource::new("synthetic screen", 1280, 720))
}

#[cfg(feature = "camera")]
fn secondary() -> Box<dyn VideoSource> {
    Box::new(pipcorder::CameraSource::new(0))
}

#[cfg(not(feature = "camera"))]
fn secondary() -> Box<dyn VideoSource> {
    Box::new(
        pipcorder::SyntheticSource::new("synthetic camera", 640, 480)
            .with_pattern(pipcorder::source::Pattern::Solid([40, 120, 220, 255])),
    )
}

fn print_report(report: &StopReport, elapsed: &str) {
    println!("Stopped after {} ({:?})", elapsed, report.reason);
    println!(
        "  {} frames encoded, {} skipped, {} chunks, {} bytes",
        report.stats.frames_encoded,
        report.stats.frames_skipped,
        report.stats.chunk_count,
        report.bytes
    );
    match &report.saved_to {
        Some(path) => println!("  saved to {}", path.display()),
        None => println!("  save cancelled"),
    }
}
