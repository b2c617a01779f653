//! Seam between overlay/annotation logic and whatever actually draws the map.

use log::debug;
use tokio::sync::mpsc;

use crate::annotation::style::{FeatureLayer, RenderedFeature};
use crate::error::{IngestError, OverlayError};
use crate::map::geo::{Coordinate, GeoBounds};
use crate::overlay::registry::{LayerDescriptor, Protocol};

/// Renderable handle for one remote overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct TileOverlay {
    pub id: String,
    pub label: String,
    pub attribution: String,
    pub descriptor: LayerDescriptor,
}

impl TileOverlay {
    pub fn attach(&self, map: &mut impl MapSurface) {
        map.attach_overlay(self);
    }

    pub fn detach(&self, map: &mut impl MapSurface) {
        map.detach_overlay(self);
    }
}

/// The map an overlay or feature layer is attached to.
pub trait MapSurface {
    fn attach_overlay(&mut self, overlay: &TileOverlay);
    fn detach_overlay(&mut self, overlay: &TileOverlay);
    fn install_feature_layer(&mut self, layer: FeatureLayer);
    fn set_view(&mut self, center: Coordinate, zoom: f64);
    /// Fit the view to `bounds`, keeping `margin` pixels free on every side.
    fn fit_bounds(&mut self, bounds: GeoBounds, margin: f64);
}

/// Turns descriptors and styled features into renderable handles.
pub trait RenderingAdapter {
    fn build_overlay(&self, descriptor: &LayerDescriptor) -> Result<TileOverlay, OverlayError>;
    fn build_feature_layer(&self, features: Vec<RenderedFeature>) -> Result<FeatureLayer, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WmsAdapter;

impl RenderingAdapter for WmsAdapter {
    fn build_overlay(&self, descriptor: &LayerDescriptor) -> Result<TileOverlay, OverlayError> {
        match descriptor.protocol {
            Protocol::Wms => Ok(TileOverlay {
                id: descriptor.id.clone(),
                label: descriptor.label.clone(),
                attribution: descriptor.options.attribution.clone(),
                descriptor: descriptor.clone(),
            }),
        }
    }

    fn build_feature_layer(&self, features: Vec<RenderedFeature>) -> Result<FeatureLayer, IngestError> {
        if let Some(bad) = features.iter().find(|f| !f.has_valid_coordinates()) {
            return Err(IngestError::Render(format!(
                "feature '{}' has coordinates outside the valid range",
                bad.popup.as_deref().unwrap_or("unnamed")
            )));
        }
        Ok(FeatureLayer::new(features))
    }
}

/// Commands sent from the worker thread to the UI thread, which owns the
/// actual map.
#[derive(Debug, Clone)]
pub enum SceneCommand {
    Attach(TileOverlay),
    Detach(String),
    InstallFeatures(FeatureLayer),
    SetView { center: Coordinate, zoom: f64 },
    FitBounds { bounds: GeoBounds, margin: f64 },
}

/// [`MapSurface`] that forwards every change over a channel.
#[derive(Debug, Clone)]
pub struct SceneChannel {
    sender: mpsc::UnboundedSender<SceneCommand>,
}

impl SceneChannel {
    pub fn new(sender: mpsc::UnboundedSender<SceneCommand>) -> Self {
        Self { sender }
    }

    fn send(&self, command: SceneCommand) {
        if self.sender.send(command).is_err() {
            debug!("Scene receiver dropped, map update discarded");
        }
    }
}

impl MapSurface for SceneChannel {
    fn attach_overlay(&mut self, overlay: &TileOverlay) {
        self.send(SceneCommand::Attach(overlay.clone()));
    }

    fn detach_overlay(&mut self, overlay: &TileOverlay) {
        self.send(SceneCommand::Detach(overlay.id.clone()));
    }

    fn install_feature_layer(&mut self, layer: FeatureLayer) {
        self.send(SceneCommand::InstallFeatures(layer));
    }

    fn set_view(&mut self, center: Coordinate, zoom: f64) {
        self.send(SceneCommand::SetView { center, zoom });
    }

    fn fit_bounds(&mut self, bounds: GeoBounds, margin: f64) {
        self.send(SceneCommand::FitBounds { bounds, margin });
    }
}
