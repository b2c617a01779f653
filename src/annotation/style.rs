//! Per-geometry styling of annotation features and the resulting feature layer.

use std::cmp::Ordering;

use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use super::feature::{AnnotationFeature, Geometry, GeometryType};
use crate::map::geo::{Coordinate, GeoBounds};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStyle {
    pub color: &'static str,
    pub weight: f32,
    pub fill_color: &'static str,
    /// 0.0 leaves the interior unfilled.
    pub fill_opacity: f32,
}

pub const AREA_STYLE: PathStyle = PathStyle {
    color: "#FF7800",
    weight: 2.0,
    fill_color: "#FF7800",
    fill_opacity: 0.3,
};

pub const LINE_STYLE: PathStyle = PathStyle {
    color: "#3388FF",
    weight: 3.0,
    fill_color: "#3388FF",
    fill_opacity: 0.0,
};

pub fn style_for(geometry_type: GeometryType) -> PathStyle {
    match geometry_type {
        GeometryType::LineString | GeometryType::MultiLineString => LINE_STYLE,
        _ => AREA_STYLE,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Marker,
    Outline(PathStyle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFeature {
    pub geometry: Geometry,
    pub symbol: Symbol,
    pub popup: Option<String>,
}

impl RenderedFeature {
    pub fn from_feature(feature: AnnotationFeature) -> Self {
        let symbol = if feature.geometry.is_punctual() {
            Symbol::Marker
        } else {
            Symbol::Outline(style_for(feature.geometry.geometry_type()))
        };
        let popup = popup_text(&feature);
        Self {
            geometry: feature.geometry,
            symbol,
            popup,
        }
    }

    pub fn has_valid_coordinates(&self) -> bool {
        self.geometry.coordinates().iter().all(Coordinate::is_valid)
    }
}

/// Name, then description, each only when non-empty.
pub fn popup_text(feature: &AnnotationFeature) -> Option<String> {
    let parts: Vec<&str> = [feature.get_name(), feature.get_description()]
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

pub fn render_features(features: Vec<AnnotationFeature>) -> Vec<RenderedFeature> {
    features.into_iter().map(RenderedFeature::from_feature).collect()
}

type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Styled annotation features ready to be drawn, with their combined extent
/// and an index of per-feature envelopes for picking.
#[derive(Clone)]
pub struct FeatureLayer {
    features: Vec<RenderedFeature>,
    bounding_box: Option<GeoBounds>,
    envelopes: RTree<IndexedEnvelope>,
}

impl std::fmt::Debug for FeatureLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureLayer")
            .field("features", &self.features.len())
            .field("bounding_box", &self.bounding_box)
            .finish()
    }
}

impl FeatureLayer {
    pub fn new(features: Vec<RenderedFeature>) -> Self {
        let mut points = Vec::new();
        let mut envelopes = Vec::new();
        for (index, feature) in features.iter().enumerate() {
            let vertices: Vec<[f64; 2]> = feature.geometry.coordinates().iter().map(Coordinate::to_xy).collect();
            if vertices.is_empty() {
                continue;
            }
            let envelope = AABB::from_points(&vertices);
            envelopes.push(GeomWithData::new(Rectangle::from_aabb(envelope), index));
            points.extend(vertices);
        }

        let bounding_box = if points.is_empty() {
            None
        } else {
            let aabb = AABB::from_points(&points);
            let [west, south] = aabb.lower();
            let [east, north] = aabb.upper();
            Some(GeoBounds::new(south, west, north, east))
        };

        Self {
            features,
            bounding_box,
            envelopes: RTree::bulk_load(envelopes),
        }
    }

    pub fn features(&self) -> &[RenderedFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn bounding_box(&self) -> Option<GeoBounds> {
        self.bounding_box
    }

    /// Feature under `position`: a marker or line within `max_distance`
    /// degrees, or an area containing the position or with an edge that close.
    /// Markers win over lines and lines over areas, then the closest wins.
    pub fn pick(&self, position: &Coordinate, max_distance: f64) -> Option<&RenderedFeature> {
        let [x, y] = position.to_xy();
        let search = AABB::from_corners([x - max_distance, y - max_distance], [x + max_distance, y + max_distance]);

        self.envelopes
            .locate_in_envelope_intersecting(&search)
            .filter_map(|candidate| {
                let feature = self.features.get(candidate.data)?;
                let hit = geometry_hit(&feature.geometry, [x, y])?;
                (hit.distance <= max_distance).then_some((hit, feature))
            })
            .min_by(|(a, _), (b, _)| a.precedence(b))
            .map(|(_, feature)| feature)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Hit {
    /// 0 for markers, 1 for lines, 2 for areas.
    rank: u8,
    distance: f64,
}

impl Hit {
    fn precedence(&self, other: &Hit) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then(self.distance.total_cmp(&other.distance))
    }
}

fn geometry_hit(geometry: &Geometry, p: [f64; 2]) -> Option<Hit> {
    let hit = |rank, distance: f64| Some(Hit { rank, distance });
    match geometry {
        Geometry::Point(point) => hit(0, point_distance(point.to_xy(), p)),
        Geometry::MultiPoint(points) => points
            .iter()
            .map(|point| point_distance(point.to_xy(), p))
            .min_by(f64::total_cmp)
            .and_then(|d| hit(0, d)),
        Geometry::LineString(line) => path_distance(line, p).and_then(|d| hit(1, d)),
        Geometry::MultiLineString(lines) => lines
            .iter()
            .filter_map(|line| path_distance(line, p))
            .min_by(f64::total_cmp)
            .and_then(|d| hit(1, d)),
        Geometry::Polygon(rings) => polygon_distance(rings, p).and_then(|d| hit(2, d)),
        Geometry::MultiPolygon(polygons) => polygons
            .iter()
            .filter_map(|rings| polygon_distance(rings, p))
            .min_by(f64::total_cmp)
            .and_then(|d| hit(2, d)),
        Geometry::GeometryCollection(parts) => parts
            .iter()
            .filter_map(|part| geometry_hit(part, p))
            .min_by(Hit::precedence),
    }
}

fn point_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

fn segment_distance(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> f64 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let length_2 = dx * dx + dy * dy;
    if length_2 == 0.0 {
        return point_distance(a, p);
    }
    let t = (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / length_2).clamp(0.0, 1.0);
    point_distance([a[0] + t * dx, a[1] + t * dy], p)
}

/// Closest approach of an open path; a single vertex counts as a point.
fn path_distance(path: &[Coordinate], p: [f64; 2]) -> Option<f64> {
    match path {
        [] => None,
        [only] => Some(point_distance(only.to_xy(), p)),
        _ => path
            .windows(2)
            .map(|pair| segment_distance(pair[0].to_xy(), pair[1].to_xy(), p))
            .min_by(f64::total_cmp),
    }
}

/// Distance to a closed ring's boundary.
fn ring_distance(ring: &[Coordinate], p: [f64; 2]) -> Option<f64> {
    let closing = match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 2 => Some(segment_distance(last.to_xy(), first.to_xy(), p)),
        _ => None,
    };
    path_distance(ring, p).into_iter().chain(closing).min_by(f64::total_cmp)
}

/// Even-odd crossing test.
fn ring_contains(ring: &[Coordinate], p: [f64; 2]) -> bool {
    let mut inside = false;
    let mut previous = match ring.last() {
        Some(last) => last.to_xy(),
        None => return false,
    };
    for vertex in ring {
        let current = vertex.to_xy();
        if (current[1] > p[1]) != (previous[1] > p[1]) {
            let x = current[0] + (p[1] - current[1]) * (previous[0] - current[0]) / (previous[1] - current[1]);
            if p[0] < x {
                inside = !inside;
            }
        }
        previous = current;
    }
    inside
}

/// Zero inside the area (outer ring minus holes), else distance to the
/// nearest edge.
fn polygon_distance(rings: &[Vec<Coordinate>], p: [f64; 2]) -> Option<f64> {
    let (outer, holes) = rings.split_first()?;
    if ring_contains(outer, p) && !holes.iter().any(|hole| ring_contains(hole, p)) {
        return Some(0.0);
    }
    rings
        .iter()
        .filter_map(|ring| ring_distance(ring, p))
        .min_by(f64::total_cmp)
}
