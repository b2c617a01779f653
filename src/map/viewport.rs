use serde::{Deserialize, Serialize};

use super::geo::{latlng_to_world, world_to_latlng, Coordinate, GeoBounds};

/// Pixel width of the world square at zoom 0.
pub const TILE_SIZE: f64 = 256.0;
pub const MAX_ZOOM: f64 = 19.0;

/// Center on Opheusden (approximate).
pub const DEFAULT_CENTER: Coordinate = Coordinate::new(51.933, 5.633);
pub const DEFAULT_ZOOM: f64 = 12.0;

/// Visible window onto the map: a center, a zoom level and the pixel size
/// of the area it is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: Coordinate,
    pub zoom: f64,
    pub size: (f64, f64),
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            size: (780.0, 780.0),
        }
    }
}

impl Viewport {
    pub fn with_size(width: f64, height: f64) -> Self {
        Self {
            size: (width, height),
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        self.center = DEFAULT_CENTER;
        self.zoom = DEFAULT_ZOOM;
    }

    pub fn is_default(&self) -> bool {
        self.center == DEFAULT_CENTER && self.zoom == DEFAULT_ZOOM
    }

    fn world_size(&self) -> f64 {
        TILE_SIZE * 2.0_f64.powf(self.zoom)
    }

    /// Screen offset of a coordinate relative to the viewport center, in pixels.
    pub fn project(&self, coordinate: &Coordinate) -> (f64, f64) {
        let world = self.world_size();
        let (cx, cy) = latlng_to_world(&self.center);
        let (x, y) = latlng_to_world(coordinate);
        ((x - cx) * world, (y - cy) * world)
    }

    /// Inverse of [`Viewport::project`].
    pub fn unproject(&self, dx: f64, dy: f64) -> Coordinate {
        let world = self.world_size();
        let (cx, cy) = latlng_to_world(&self.center);
        world_to_latlng(cx + dx / world, cy + dy / world)
    }

    pub fn pan_pixels(&mut self, dx: f64, dy: f64) {
        self.center = self.unproject(dx, dy);
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(0.0, MAX_ZOOM);
    }

    /// Centers on `bounds` and picks the largest whole zoom level at which the
    /// box fits inside the viewport with `margin` pixels free on every side.
    pub fn fit_bounds(&mut self, bounds: &GeoBounds, margin: f64) {
        let (west, north) = latlng_to_world(&Coordinate::new(bounds.north(), bounds.west()));
        let (east, south) = latlng_to_world(&Coordinate::new(bounds.south(), bounds.east()));

        let available_w = (self.size.0 - 2.0 * margin).max(1.0);
        let available_h = (self.size.1 - 2.0 * margin).max(1.0);

        let zoom_for = |span: f64, available: f64| {
            if span > 0.0 {
                (available / (span * TILE_SIZE)).log2()
            } else {
                f64::INFINITY
            }
        };
        let zoom = zoom_for(east - west, available_w).min(zoom_for(south - north, available_h));

        self.center = world_to_latlng((west + east) / 2.0, (north + south) / 2.0);
        self.zoom = if zoom.is_finite() {
            zoom.floor().clamp(0.0, MAX_ZOOM)
        } else {
            MAX_ZOOM
        };
    }
}
