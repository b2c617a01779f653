use indexmap::IndexMap;

use crate::map::geo::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    GeometryCollection,
}

/// Rings are stored outer ring first.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coordinate),
    MultiPoint(Vec<Coordinate>),
    LineString(Vec<Coordinate>),
    MultiLineString(Vec<Vec<Coordinate>>),
    Polygon(Vec<Vec<Coordinate>>),
    MultiPolygon(Vec<Vec<Vec<Coordinate>>>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    /// The coordinate used for the area-of-interest test: the point itself,
    /// or the first vertex of the first ring of a polygonal geometry. `None`
    /// for every other geometry kind.
    pub fn representative(&self) -> Option<Coordinate> {
        match self {
            Geometry::Point(point) => Some(*point),
            Geometry::Polygon(rings) => rings.first().and_then(|ring| ring.first()).copied(),
            Geometry::MultiPolygon(polygons) => polygons
                .first()
                .and_then(|rings| rings.first())
                .and_then(|ring| ring.first())
                .copied(),
            _ => None,
        }
    }

    pub fn coordinates(&self) -> Vec<Coordinate> {
        let mut out = Vec::new();
        self.collect_coordinates(&mut out);
        out
    }

    fn collect_coordinates(&self, out: &mut Vec<Coordinate>) {
        match self {
            Geometry::Point(point) => out.push(*point),
            Geometry::MultiPoint(points) | Geometry::LineString(points) => out.extend_from_slice(points),
            Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
                lines.iter().for_each(|line| out.extend_from_slice(line))
            }
            Geometry::MultiPolygon(polygons) => polygons
                .iter()
                .flatten()
                .for_each(|ring| out.extend_from_slice(ring)),
            Geometry::GeometryCollection(parts) => parts.iter().for_each(|part| part.collect_coordinates(out)),
        }
    }

    pub fn is_punctual(&self) -> bool {
        matches!(self, Geometry::Point(_) | Geometry::MultiPoint(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationFeature {
    pub geometry: Geometry,
    pub properties: IndexMap<String, String>,
}

impl AnnotationFeature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            properties: IndexMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn get_name(&self) -> &str {
        self.properties.get("name").map(String::as_str).unwrap_or("")
    }

    pub fn get_description(&self) -> &str {
        self.properties.get("description").map(String::as_str).unwrap_or("")
    }
}
