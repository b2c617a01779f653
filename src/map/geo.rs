use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    south: f64, // minimum latitude
    west: f64,  // minimum longitude
    north: f64, // maximum latitude
    east: f64,  // maximum longitude
}

impl GeoBounds {
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    /// (latitude span, longitude span)
    pub fn size(&self) -> (f64, f64) {
        (self.north - self.south, self.east - self.west)
    }

    /// Inclusive on all edges.
    pub fn contains_point(&self, point: &Coordinate) -> bool {
        self.south <= point.latitude
            && point.latitude <= self.north
            && self.west <= point.longitude
            && point.longitude <= self.east
    }

    /// A box that collapsed to a single point has nothing to fit the view to.
    pub fn is_degenerate(&self) -> bool {
        let (lat_span, lng_span) = self.size();
        lat_span <= 0.0 && lng_span <= 0.0
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// `[longitude, latitude]`, the point layout used for spatial indexing.
    pub fn to_xy(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Web Mercator position of a coordinate as fractions of the world square,
/// x growing east and y growing south, both in `[0, 1]`.
pub fn latlng_to_world(coordinate: &Coordinate) -> (f64, f64) {
    let lat_rad = coordinate.latitude.clamp(-85.051_128, 85.051_128).to_radians();
    let x = (coordinate.longitude + 180.0) / 360.0;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0;
    (x, y)
}

/// Inverse of [`latlng_to_world`].
pub fn world_to_latlng(x: f64, y: f64) -> Coordinate {
    let longitude = x * 360.0 - 180.0;
    let latitude = (std::f64::consts::PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    Coordinate::new(latitude, longitude)
}
