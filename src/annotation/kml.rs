//! Conversion of a KML document into annotation features.

use log::debug;
use roxmltree::{Document, Node};

use super::feature::{AnnotationFeature, Geometry};
use crate::error::IngestError;
use crate::map::geo::Coordinate;

pub fn parse_document(text: &str) -> Result<Document<'_>, IngestError> {
    let document = Document::parse(text)?;
    if document.root_element().tag_name().name() != "kml" {
        return Err(IngestError::Parse(format!(
            "expected a <kml> root element, found <{}>",
            document.root_element().tag_name().name()
        )));
    }
    Ok(document)
}

/// One feature per `Placemark` that carries a geometry, in document order.
pub fn to_features(document: &Document<'_>) -> Result<Vec<AnnotationFeature>, IngestError> {
    let mut features = Vec::new();
    for placemark in document
        .descendants()
        .filter(|node| node.is_element() && node.tag_name().name() == "Placemark")
    {
        let Some(geometry) = placemark.children().filter(Node::is_element).find_map(|node| read_geometry(node).transpose()) else {
            debug!("Skipping placemark without geometry at byte {}", placemark.range().start);
            continue;
        };

        let mut feature = AnnotationFeature::new(geometry?);
        for field in ["name", "description"] {
            if let Some(text) = child(placemark, field).and_then(|node| node.text()) {
                feature.properties.insert(field.to_string(), text.trim().to_string());
            }
        }
        for data in placemark
            .descendants()
            .filter(|node| node.is_element() && node.tag_name().name() == "Data")
        {
            if let (Some(key), Some(value)) = (
                data.attribute("name"),
                child(data, "value").and_then(|node| node.text()),
            ) {
                feature.properties.insert(key.to_string(), value.trim().to_string());
            }
        }
        features.push(feature);
    }
    Ok(features)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

/// `Ok(None)` when `node` is not a geometry element.
fn read_geometry(node: Node<'_, '_>) -> Result<Option<Geometry>, IngestError> {
    let geometry = match node.tag_name().name() {
        "Point" => {
            let mut points = read_coordinates(node)?;
            if points.len() != 1 {
                return Err(IngestError::Parse(format!(
                    "Point must have exactly one coordinate, found {}",
                    points.len()
                )));
            }
            Geometry::Point(points.remove(0))
        }
        "LineString" => Geometry::LineString(read_coordinates(node)?),
        "LinearRing" => Geometry::Polygon(vec![read_coordinates(node)?]),
        "Polygon" => Geometry::Polygon(read_rings(node)?),
        "MultiGeometry" => {
            let parts = node
                .children()
                .filter(Node::is_element)
                .filter_map(|part| read_geometry(part).transpose())
                .collect::<Result<Vec<_>, _>>()?;
            collapse_multi(parts)
        }
        _ => return Ok(None),
    };
    Ok(Some(geometry))
}

fn read_rings(polygon: Node<'_, '_>) -> Result<Vec<Vec<Coordinate>>, IngestError> {
    let mut rings = Vec::new();
    for boundary in ["outerBoundaryIs", "innerBoundaryIs"] {
        for node in polygon
            .children()
            .filter(|node| node.is_element() && node.tag_name().name() == boundary)
        {
            if let Some(ring) = child(node, "LinearRing") {
                rings.push(read_coordinates(ring)?);
            }
        }
    }
    if rings.is_empty() {
        return Err(IngestError::Parse("Polygon without outer boundary".to_string()));
    }
    Ok(rings)
}

/// Homogeneous multi-geometries get their dedicated variant, anything else
/// stays a collection.
fn collapse_multi(parts: Vec<Geometry>) -> Geometry {
    if !parts.is_empty() && parts.iter().all(|g| matches!(g, Geometry::Point(_))) {
        return Geometry::MultiPoint(
            parts
                .into_iter()
                .filter_map(|g| match g {
                    Geometry::Point(p) => Some(p),
                    _ => None,
                })
                .collect(),
        );
    }
    if !parts.is_empty() && parts.iter().all(|g| matches!(g, Geometry::Polygon(_))) {
        return Geometry::MultiPolygon(
            parts
                .into_iter()
                .filter_map(|g| match g {
                    Geometry::Polygon(rings) => Some(rings),
                    _ => None,
                })
                .collect(),
        );
    }
    if !parts.is_empty() && parts.iter().all(|g| matches!(g, Geometry::LineString(_))) {
        return Geometry::MultiLineString(
            parts
                .into_iter()
                .filter_map(|g| match g {
                    Geometry::LineString(line) => Some(line),
                    _ => None,
                })
                .collect(),
        );
    }
    Geometry::GeometryCollection(parts)
}

/// KML tuples are `lon,lat[,alt]`, separated by whitespace.
fn read_coordinates(node: Node<'_, '_>) -> Result<Vec<Coordinate>, IngestError> {
    let text = child(node, "coordinates")
        .and_then(|c| c.text())
        .ok_or_else(|| IngestError::Parse(format!("<{}> without coordinates", node.tag_name().name())))?;

    text.split_whitespace()
        .map(|tuple| {
            let mut values = tuple.split(',').map(|v| v.trim().parse::<f64>());
            match (values.next(), values.next()) {
                (Some(Ok(lon)), Some(Ok(lat))) => Ok(Coordinate::new(lat, lon)),
                _ => Err(IngestError::Parse(format!("invalid coordinate tuple '{tuple}'"))),
            }
        })
        .collect()
}
