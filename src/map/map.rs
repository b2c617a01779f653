use earcutr::earcut;
use egui::epaint::{Color32, Mesh, Pos2, Rect, Shape, Stroke};
use egui::{pos2, Align2, FontId, Response, Sense, Ui, Vec2, Widget};

use super::geo::Coordinate;
use super::scene::MapScene;
use super::viewport::Viewport;
use crate::annotation::feature::Geometry;
use crate::annotation::style::{PathStyle, Symbol};

const MARKER_RADIUS: f32 = 6.0;
/// Click tolerance for picking, in screen pixels.
const PICK_TOLERANCE: f64 = 8.0;

/// `#RRGGBB` to a color, mid gray if the string is not a hex color.
pub fn hex_color(hex: &str) -> Color32 {
    let digits = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| digits.get(range).and_then(|c| u8::from_str_radix(c, 16).ok());
    match (digits.len(), channel(0..2), channel(2..4), channel(4..6)) {
        (6, Some(r), Some(g), Some(b)) => Color32::from_rgb(r, g, b),
        _ => Color32::GRAY,
    }
}

fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), (opacity.clamp(0.0, 1.0) * 255.0) as u8)
}

/// Map view painting the annotation layer of a [`MapScene`]. Dragging pans,
/// scrolling zooms, clicking a feature stores its popup text in `selection`.
pub struct Map<'a> {
    scene: &'a mut MapScene,
    selection: &'a mut Option<String>,
    viewport_size: Vec2,
}

impl<'a> Widget for Map<'a> {
    fn ui(self, ui: &mut Ui) -> Response {
        let (rect, response) = ui.allocate_exact_size(self.viewport_size, Sense::click_and_drag());
        self.scene.resize(rect.width() as f64, rect.height() as f64);
        let viewport = &mut self.scene.viewport;

        // Handle interactions
        if response.dragged() {
            let delta = response.drag_delta();
            viewport.pan_pixels(-delta.x as f64, -delta.y as f64);
        }

        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta).y;
            if scroll.abs() > f32::EPSILON {
                // Normalize scroll further using tanh
                let step = (scroll / 10.0).tanh() as f64;
                viewport.set_zoom(viewport.zoom + step);
            }
        }

        let viewport = *viewport;
        let painter = ui.painter().with_clip_rect(rect);
        painter.rect(rect, 0.0, Color32::from_rgb(40, 44, 52), Stroke::new(1.0, Color32::WHITE));

        if let Some(layer) = self.scene.features() {
            for feature in layer.features() {
                paint_geometry(&painter, rect, &viewport, &feature.geometry, &feature.symbol);
            }

            if response.clicked() {
                if let Some(pointer) = response.interact_pointer_pos() {
                    let offset = pointer - rect.center();
                    let position = viewport.unproject(offset.x as f64, offset.y as f64);
                    let tolerance = degrees_per_pixel(&viewport) * PICK_TOLERANCE;
                    *self.selection = layer.pick(&position, tolerance).and_then(|f| f.popup.clone());
                }
            }
        }

        let attribution = self
            .scene
            .overlays()
            .map(|overlay| overlay.attribution.as_str())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" | ");
        if !attribution.is_empty() {
            painter.text(
                rect.left_bottom() + Vec2::new(4.0, -4.0),
                Align2::LEFT_BOTTOM,
                attribution,
                FontId::proportional(11.0),
                Color32::LIGHT_GRAY,
            );
        }

        response
    }
}

impl<'a> Map<'a> {
    pub fn new(scene: &'a mut MapScene, selection: &'a mut Option<String>) -> Self {
        Self {
            scene,
            selection,
            viewport_size: Vec2::new(1024.0, 1024.0),
        }
    }

    pub fn viewport_size(mut self, size: Vec2) -> Self {
        self.viewport_size = size;
        self
    }
}

fn degrees_per_pixel(viewport: &Viewport) -> f64 {
    let a = viewport.unproject(0.0, 0.0);
    let b = viewport.unproject(1.0, 0.0);
    (b.longitude() - a.longitude()).abs()
}

fn to_screen(rect: Rect, viewport: &Viewport, coordinate: &Coordinate) -> Pos2 {
    let (dx, dy) = viewport.project(coordinate);
    let center = rect.center();
    pos2(center.x + dx as f32, center.y + dy as f32)
}

fn paint_geometry(painter: &egui::Painter, rect: Rect, viewport: &Viewport, geometry: &Geometry, symbol: &Symbol) {
    let ring = |coordinates: &[Coordinate]| -> Vec<Pos2> {
        coordinates.iter().map(|c| to_screen(rect, viewport, c)).collect()
    };

    match (geometry, symbol) {
        (Geometry::Point(point), _) => paint_marker(painter, to_screen(rect, viewport, point)),
        (Geometry::MultiPoint(points), _) => points
            .iter()
            .for_each(|point| paint_marker(painter, to_screen(rect, viewport, point))),
        (Geometry::LineString(line), Symbol::Outline(style)) => {
            painter.add(Shape::line(ring(line), stroke(style)));
        }
        (Geometry::MultiLineString(lines), Symbol::Outline(style)) => {
            for line in lines {
                painter.add(Shape::line(ring(line), stroke(style)));
            }
        }
        (Geometry::Polygon(rings), Symbol::Outline(style)) => paint_polygon(painter, rings, style, &ring),
        (Geometry::MultiPolygon(polygons), Symbol::Outline(style)) => {
            for rings in polygons {
                paint_polygon(painter, rings, style, &ring);
            }
        }
        (Geometry::GeometryCollection(parts), _) => {
            for part in parts {
                paint_geometry(painter, rect, viewport, part, symbol);
            }
        }
        _ => {}
    }
}

fn paint_polygon(
    painter: &egui::Painter,
    rings: &[Vec<Coordinate>],
    style: &PathStyle,
    ring: &dyn Fn(&[Coordinate]) -> Vec<Pos2>,
) {
    let Some((outer, holes)) = rings.split_first() else {
        return;
    };
    if style.fill_opacity > 0.0 {
        let fill = with_opacity(hex_color(style.fill_color), style.fill_opacity);
        let screen: Vec<Vec<Pos2>> = rings.iter().map(|r| ring(r)).collect();
        let (vertices, triangles) = triangulate(&screen);
        let mut mesh = Mesh::default();
        for vertex in vertices {
            mesh.colored_vertex(vertex, fill);
        }
        for triangle in triangles.chunks_exact(3) {
            mesh.add_triangle(triangle[0], triangle[1], triangle[2]);
        }
        if !mesh.is_empty() {
            painter.add(Shape::mesh(mesh));
        }
    }
    painter.add(Shape::closed_line(ring(outer), stroke(style)));
    for hole in holes {
        painter.add(Shape::closed_line(ring(hole), stroke(style)));
    }
}

/// Ear-clips a polygon given as outer ring then holes. Returns the vertices
/// and a flat triangle index list into them; both empty when the outer ring
/// has fewer than three distinct points or cannot be triangulated.
fn triangulate(rings: &[Vec<Pos2>]) -> (Vec<Pos2>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut coords = Vec::new();
    let mut hole_indices = Vec::new();

    for (index, ring) in rings.iter().enumerate() {
        let open = match ring.split_last() {
            Some((last, rest)) if rest.first() == Some(last) => rest,
            _ => ring.as_slice(),
        };
        if open.len() < 3 {
            if index == 0 {
                return (Vec::new(), Vec::new());
            }
            continue;
        }
        if index > 0 {
            hole_indices.push(vertices.len());
        }
        for point in open {
            coords.push(point.x as f64);
            coords.push(point.y as f64);
            vertices.push(*point);
        }
    }

    match earcut(&coords, &hole_indices, 2) {
        Ok(indices) => {
            let indices = indices.into_iter().map(|i| i as u32).collect();
            (vertices, indices)
        }
        Err(_) => (Vec::new(), Vec::new()),
    }
}

fn paint_marker(painter: &egui::Painter, center: Pos2) {
    painter.circle(
        center,
        MARKER_RADIUS,
        Color32::from_rgb(51, 136, 255),
        Stroke::new(2.0, Color32::WHITE),
    );
}

fn stroke(style: &PathStyle) -> Stroke {
    Stroke::new(style.weight, hex_color(style.color))
}
