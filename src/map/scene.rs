use indexmap::IndexMap;

use crate::annotation::style::FeatureLayer;
use crate::map::geo::{Coordinate, GeoBounds};
use crate::map::viewport::Viewport;
use crate::overlay::adapter::{MapSurface, SceneCommand, TileOverlay};

/// Everything currently attached to the map, plus the view onto it.
#[derive(Debug, Clone, Default)]
pub struct MapScene {
    overlays: IndexMap<String, TileOverlay>,
    features: Option<FeatureLayer>,
    pub viewport: Viewport,
    /// Fit requested before the widget reported its real size.
    pending_fit: Option<(GeoBounds, f64)>,
    sized: bool,
}

impl MapScene {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            overlays: IndexMap::new(),
            features: None,
            viewport,
            pending_fit: None,
            sized: false,
        }
    }

    /// Sets the pixel size of the drawing area. A fit that arrived before the
    /// first real size is redone against it.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.size = (width, height);
        self.sized = true;
        if let Some((bounds, margin)) = self.pending_fit.take() {
            self.viewport.fit_bounds(&bounds, margin);
        }
    }

    pub fn apply(&mut self, command: SceneCommand) {
        match command {
            SceneCommand::Attach(overlay) => self.attach_overlay(&overlay),
            SceneCommand::Detach(id) => {
                self.overlays.shift_remove(&id);
            }
            SceneCommand::InstallFeatures(layer) => self.install_feature_layer(layer),
            SceneCommand::SetView { center, zoom } => self.set_view(center, zoom),
            SceneCommand::FitBounds { bounds, margin } => self.fit_bounds(bounds, margin),
        }
    }

    pub fn overlay_ids(&self) -> Vec<&str> {
        self.overlays.keys().map(String::as_str).collect()
    }

    pub fn overlays(&self) -> impl Iterator<Item = &TileOverlay> {
        self.overlays.values()
    }

    pub fn features(&self) -> Option<&FeatureLayer> {
        self.features.as_ref()
    }
}

impl MapSurface for MapScene {
    fn attach_overlay(&mut self, overlay: &TileOverlay) {
        self.overlays.insert(overlay.id.clone(), overlay.clone());
    }

    fn detach_overlay(&mut self, overlay: &TileOverlay) {
        self.overlays.shift_remove(&overlay.id);
    }

    fn install_feature_layer(&mut self, layer: FeatureLayer) {
        self.features = Some(layer);
    }

    fn set_view(&mut self, center: Coordinate, zoom: f64) {
        self.pending_fit = None;
        self.viewport.center = center;
        self.viewport.set_zoom(zoom);
    }

    fn fit_bounds(&mut self, bounds: GeoBounds, margin: f64) {
        self.viewport.fit_bounds(&bounds, margin);
        if !self.sized {
            self.pending_fit = Some((bounds, margin));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::viewport::{DEFAULT_CENTER, DEFAULT_ZOOM};

    #[test]
    fn early_fit_is_redone_at_the_real_size() {
        let bounds = GeoBounds::new(51.90, 5.55, 51.96, 5.70);
        let mut scene = MapScene::default();
        scene.apply(SceneCommand::FitBounds { bounds, margin: 20.0 });
        let guessed = scene.viewport;

        scene.resize(1600.0, 1200.0);
        let mut expected = Viewport::with_size(1600.0, 1200.0);
        expected.fit_bounds(&bounds, 20.0);
        assert_eq!(scene.viewport, expected);
        assert!(scene.viewport.zoom > guessed.zoom);

        // later frames keep whatever the user did with the view
        scene.viewport.pan_pixels(50.0, 0.0);
        let panned = scene.viewport;
        scene.resize(1600.0, 1200.0);
        assert_eq!(scene.viewport, panned);
    }

    #[test]
    fn fit_after_first_frame_uses_current_size() {
        let bounds = GeoBounds::new(51.90, 5.55, 51.96, 5.70);
        let mut scene = MapScene::default();
        scene.resize(400.0, 300.0);
        scene.apply(SceneCommand::FitBounds { bounds, margin: 10.0 });

        let mut expected = Viewport::with_size(400.0, 300.0);
        expected.fit_bounds(&bounds, 10.0);
        assert_eq!(scene.viewport, expected);
    }

    #[test]
    fn default_view_cancels_an_early_fit() {
        let bounds = GeoBounds::new(51.90, 5.55, 51.96, 5.70);
        let mut scene = MapScene::default();
        scene.apply(SceneCommand::FitBounds { bounds, margin: 20.0 });
        scene.apply(SceneCommand::SetView { center: DEFAULT_CENTER, zoom: DEFAULT_ZOOM });
        scene.resize(1600.0, 1200.0);
        assert!(scene.viewport.is_default());
    }
}
