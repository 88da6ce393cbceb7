//! Picture-in-picture compositor
//!
//! Binds a primary and a secondary [`VideoSource`], draws both onto an
//! off-screen surface once per display refresh and republishes the surface
//! as an [`OutputStream`].
//!
//! The render loop is a tokio task paced by an interval at the configured
//! refresh rate. Ticks missed under load are skipped, never replayed, and a
//! tick with nothing new from the primary publishes nothing.

mod layout;
mod output;
mod renderer;

pub use layout::{Corner, OverlayRect, PipLayout};
pub use output::{output_channel, CompositedFrame, FramePublisher, OutputStream};
pub use renderer::{Renderer, SourcePair, TickOutcome};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::CompositorConfig;
use crate::errors::CaptureError;
use crate::source::{open_source, SourceRole, VideoSource};

/// Liveness of the bound sources as seen by the render loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "role")]
pub enum SourceHealth {
    Healthy,
    Lost(SourceRole),
}

/// Write end of the running output stream. Emptied by whichever side ends
/// the run first: `stop` or the render loop on a lost source.
type PublisherSlot = Arc<Mutex<Option<FramePublisher>>>;

struct RenderRun {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    publisher: PublisherSlot,
}

pub struct FrameCompositor {
    layout: PipLayout,
    refresh_interval: Duration,
    sources: Arc<Mutex<Option<SourcePair>>>,
    run: Option<RenderRun>,
    health: Arc<watch::Sender<SourceHealth>>,
}

impl FrameCompositor {
    pub fn new(layout: PipLayout, refresh_rate_hz: u32) -> Self {
        let (health, _) = watch::channel(SourceHealth::Healthy);
        Self {
            layout,
            refresh_interval: Duration::from_secs_f64(1.0 / refresh_rate_hz.max(1) as f64),
            sources: Arc::new(Mutex::new(None)),
            run: None,
            health: Arc::new(health),
        }
    }

    pub fn from_config(config: &CompositorConfig) -> Self {
        Self::new(config.layout(), config.refresh_rate_hz)
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Open and bind a new source pair, replacing (and releasing) any
    /// previous binding.
    ///
    /// If the secondary cannot be opened the already opened primary is
    /// released and the whole pair fails.
    pub fn acquire(
        &mut self,
        mut primary: Box<dyn VideoSource>,
        mut secondary: Box<dyn VideoSource>,
    ) -> Result<(), CaptureError> {
        self.stop();

        open_source(primary.as_mut(), SourceRole::Primary)?;
        if let Err(e) = open_source(secondary.as_mut(), SourceRole::Secondary) {
            primary.release();
            return Err(e);
        }

        *self.sources.lock() = Some(SourcePair::new(primary, secondary));
        self.health.send_replace(SourceHealth::Healthy);
        Ok(())
    }

    pub fn is_acquired(&self) -> bool {
        self.sources.lock().is_some()
    }

    /// Start the render loop and return its output stream.
    ///
    /// The stream is usable immediately; until the first tick completes it
    /// carries a black placeholder frame sized to the primary. Calling `start`
    /// on a running compositor returns another handle to the same stream.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<OutputStream, CaptureError> {
        if let Some(run) = &self.run {
            if let Some(publisher) = run.publisher.lock().as_ref() {
                return Ok(publisher.subscribe());
            }
            let role = match *self.health.borrow() {
                SourceHealth::Lost(role) => role,
                SourceHealth::Healthy => SourceRole::Primary,
            };
            return Err(CaptureError::SourceLost(role));
        }

        let (width, height) = match self.sources.lock().as_ref() {
            Some(pair) => (pair.primary.width(), pair.primary.height()),
            None => {
                return Err(CaptureError::source_unavailable(
                    SourceRole::Primary,
                    "no sources acquired",
                ))
            }
        };

        let (publisher, stream) = output_channel(CompositedFrame::blank(width, height));
        let publisher = Arc::new(Mutex::new(Some(publisher)));
        let (shutdown, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(render_loop(
            Renderer::new(self.layout, width, height),
            Arc::clone(&self.sources),
            Arc::clone(&publisher),
            Arc::clone(&self.health),
            self.refresh_interval,
            shutdown_rx,
        ));

        log::info!(
            "Compositor started at {}x{}, {:?} per frame",
            width,
            height,
            self.refresh_interval
        );
        self.run = Some(RenderRun {
            shutdown,
            task,
            publisher,
        });
        Ok(stream)
    }

    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|run| !run.task.is_finished())
    }

    /// Another handle to the running output stream; `None` once the loop
    /// has been stopped or has ended on a lost source.
    pub fn output(&self) -> Option<OutputStream> {
        let run = self.run.as_ref()?;
        let publisher = run.publisher.lock();
        publisher.as_ref().map(FramePublisher::subscribe)
    }

    /// The role of the source the render loop lost, if any
    pub fn lost_source(&self) -> Option<SourceRole> {
        match *self.health.borrow() {
            SourceHealth::Lost(role) => Some(role),
            SourceHealth::Healthy => None,
        }
    }

    /// Watch the source liveness reported by the render loop
    pub fn health(&self) -> watch::Receiver<SourceHealth> {
        self.health.subscribe()
    }

    /// Halt the render loop, invalidate the output stream and release both
    /// sources. Calling it again is a no-op.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            let _ = run.shutdown.send(());
            run.task.abort();
            run.publisher.lock().take();
            log::info!("Compositor stopped");
        }

        if let Some(mut pair) = self.sources.lock().take() {
            pair.release();
        }
    }
}

impl Drop for FrameCompositor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn render_loop(
    mut renderer: Renderer,
    sources: Arc<Mutex<Option<SourcePair>>>,
    publisher: PublisherSlot,
    health: Arc<watch::Sender<SourceHealth>>,
    period: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticks = tokio::time::interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticks.tick() => {
                let outcome = match sources.lock().as_ref() {
                    Some(pair) => renderer.tick(pair),
                    None => break,
                };

                match outcome {
                    TickOutcome::Rendered(frame) => match publisher.lock().as_ref() {
                        Some(publisher) => publisher.publish(frame),
                        None => break,
                    },
                    TickOutcome::NoFrame => {}
                    TickOutcome::Lost(role) => {
                        log::warn!("{} source lost after {} frames", role, renderer.frames_rendered());
                        health.send_replace(SourceHealth::Lost(role));
                        // Ends the stream so a recorder flushes on its own
                        publisher.lock().take();
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SyntheticSource;

    fn compositor() -> FrameCompositor {
        FrameCompositor::new(PipLayout::default(), 60)
    }

    #[test]
    fn test_start_without_sources_fails() {
        let mut compositor = compositor();
        assert!(matches!(
            compositor.start(),
            Err(CaptureError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_secondary_failure_releases_primary() {
        let (screen, screen_ctl) = SyntheticSource::with_control("screen", 64, 48);
        let (camera, camera_ctl) = SyntheticSource::with_control("camera", 32, 24);
        camera_ctl.fail_open("no camera attached");

        let mut compositor = compositor();
        let result = compositor.acquire(Box::new(screen), Box::new(camera));
        assert!(matches!(
            result,
            Err(CaptureError::SourceUnavailable { role: SourceRole::Secondary, .. })
        ));
        assert!(screen_ctl.was_released());
        assert!(!compositor.is_acquired());
    }

    #[test]
    fn test_rebinding_releases_previous_pair() {
        let (screen, screen_ctl) = SyntheticSource::with_control("screen", 64, 48);
        let (camera, camera_ctl) = SyntheticSource::with_control("camera", 32, 24);

        let mut compositor = compositor();
        compositor.acquire(Box::new(screen), Box::new(camera)).unwrap();
        compositor
            .acquire(
                Box::new(SyntheticSource::new("screen 2", 64, 48)),
                Box::new(SyntheticSource::new("camera 2", 32, 24)),
            )
            .unwrap();

        assert!(screen_ctl.was_released());
        assert!(camera_ctl.was_released());
        assert!(compositor.is_acquired());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (screen, screen_ctl) = SyntheticSource::with_control("screen", 64, 48);
        let mut compositor = compositor();
        compositor
            .acquire(Box::new(screen), Box::new(SyntheticSource::new("camera", 32, 24)))
            .unwrap();
        let stream = compositor.start().unwrap();

        compositor.stop();
        compositor.stop();
        assert!(!stream.is_active());
        assert!(screen_ctl.was_released());
        assert!(!compositor.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_source_ends_stream() {
        let (camera, camera_ctl) = SyntheticSource::with_control("camera", 32, 24);
        let mut compositor = compositor();
        compositor
            .acquire(Box::new(SyntheticSource::new("screen", 64, 48)), Box::new(camera))
            .unwrap();
        let mut stream = compositor.start().unwrap();
        stream.next_frame().await.unwrap();

        camera_ctl.kill();
        while stream.next_frame().await.is_some() {}

        assert!(!stream.is_active());
        assert!(compositor.output().is_none());
        assert_eq!(compositor.lost_source(), Some(SourceRole::Secondary));
        assert!(matches!(
            compositor.start(),
            Err(CaptureError::SourceLost(SourceRole::Secondary))
        ));
    }
}
