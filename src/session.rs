//! Worker thread that owns the controller and runs the startup ingestion.
//!
//! Toggles, legend refreshes and the one-shot annotation ingestion share one
//! current-thread runtime. Ingestion runs alongside the controller loop, so a
//! slow archive host never holds up toggles. The UI talks to the worker only
//! through channels.

use std::sync::Arc;
use std::thread;

use log::error;
use tokio::sync::mpsc;

use crate::annotation::pipeline::IngestionPipeline;
use crate::config::AppConfig;
use crate::error::{IngestError, OverlayError};
use crate::maps_api::archive_source::AnnotationSource;
use crate::maps_api::legend_retriever::LegendRetriever;
use crate::annotation::style::FeatureLayer;
use crate::map::geo::{Coordinate, GeoBounds};
use crate::overlay::adapter::{MapSurface, SceneChannel, SceneCommand, TileOverlay, WmsAdapter};
use crate::overlay::controller::{ControllerEvent, LayerController};
use crate::overlay::legend::{LegendPanel, LegendResolver, StaticLegends};
use crate::overlay::registry::Registry;

/// Messages from the worker to the UI, other than map changes.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    Panel(LegendPanel),
    ToggleRejected(OverlayError),
    AnnotationsLoaded { retained: usize, converted: usize },
    AnnotationsFailed(String),
}

pub struct SessionHandle {
    pub events: mpsc::UnboundedSender<ControllerEvent>,
    pub scene: mpsc::UnboundedReceiver<SceneCommand>,
    pub updates: mpsc::UnboundedReceiver<SessionUpdate>,
}

/// Starts the worker. `notify` is called after every message sent to the UI
/// so it can schedule a repaint.
pub fn spawn(
    config: AppConfig,
    registry: Arc<Registry>,
    static_legends: StaticLegends,
    notify: impl Fn() + Send + Sync + 'static,
) -> std::io::Result<SessionHandle> {
    let (event_sender, event_receiver) = mpsc::unbounded_channel();
    let (scene_sender, scene_receiver) = mpsc::unbounded_channel();
    let (update_sender, update_receiver) = mpsc::unbounded_channel();
    let notify = Arc::new(notify);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let client = reqwest::Client::builder()
        .timeout(config.annotation_timeout)
        .build()
        .map_err(std::io::Error::other)?;

    thread::Builder::new().name("overlay-worker".to_string()).spawn(move || {
        let scene = NotifyingScene {
            inner: SceneChannel::new(scene_sender),
            notify: notify.clone(),
        };

        let legends = LegendResolver::new(LegendRetriever::new(client.clone()), static_legends)
            .with_deadline(config.legend_deadline);
        let mut controller = LayerController::new(registry, WmsAdapter, scene.clone(), legends);

        let (sender, signal) = (update_sender.clone(), notify.clone());
        controller.on_panel(move |panel| send(&sender, &*signal, SessionUpdate::Panel(panel.clone())));
        let (sender, signal) = (update_sender.clone(), notify.clone());
        controller.on_error(move |e| send(&sender, &*signal, SessionUpdate::ToggleRejected(e.clone())));

        let source = AnnotationSource::from_location(&config.annotation_source);
        let ingest = async {
            let mut map = scene;
            let update = match IngestionPipeline::new(client).run(&source, &WmsAdapter, &mut map).await {
                Ok(report) => SessionUpdate::AnnotationsLoaded {
                    retained: report.retained,
                    converted: report.converted,
                },
                Err(e) => SessionUpdate::AnnotationsFailed(describe(&e)),
            };
            send(&update_sender, &*notify, update);
        };

        // toggles are served while the archive is still loading
        runtime.block_on(async {
            tokio::join!(ingest, controller.run(event_receiver));
        });
    })?;

    Ok(SessionHandle {
        events: event_sender,
        scene: scene_receiver,
        updates: update_receiver,
    })
}

fn send(sender: &mpsc::UnboundedSender<SessionUpdate>, notify: &dyn Fn(), update: SessionUpdate) {
    if sender.send(update).is_err() {
        error!("UI is gone, dropping session update");
    }
    notify();
}

fn describe(e: &IngestError) -> String {
    format!("Could not load annotations: {e}")
}

/// Scene channel that also wakes the UI after each command.
struct NotifyingScene<N> {
    inner: SceneChannel,
    notify: Arc<N>,
}

impl<N> Clone for NotifyingScene<N> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            notify: self.notify.clone(),
        }
    }
}

impl<N: Fn()> MapSurface for NotifyingScene<N> {
    fn attach_overlay(&mut self, overlay: &TileOverlay) {
        self.inner.attach_overlay(overlay);
        (self.notify)();
    }

    fn detach_overlay(&mut self, overlay: &TileOverlay) {
        self.inner.detach_overlay(overlay);
        (self.notify)();
    }

    fn install_feature_layer(&mut self, layer: FeatureLayer) {
        self.inner.install_feature_layer(layer);
        (self.notify)();
    }

    fn set_view(&mut self, center: Coordinate, zoom: f64) {
        self.inner.set_view(center, zoom);
        (self.notify)();
    }

    fn fit_bounds(&mut self, bounds: GeoBounds, margin: f64) {
        self.inner.fit_bounds(bounds, margin);
        (self.notify)();
    }
}
