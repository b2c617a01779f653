//! One-shot ingestion of a KMZ annotation archive onto the map.

use log::{debug, error, info};

use super::archive::AnnotationArchive;
use super::feature::AnnotationFeature;
use super::kml;
use super::style::render_features;
use crate::error::IngestError;
use crate::map::geo::GeoBounds;
use crate::map::viewport::{DEFAULT_CENTER, DEFAULT_ZOOM};
use crate::maps_api::archive_source::AnnotationSource;
use crate::overlay::adapter::{MapSurface, RenderingAdapter};

/// Area around Opheusden that annotation features must fall in.
pub const AREA_OF_INTEREST: GeoBounds = GeoBounds::new(51.80, 5.40, 52.10, 5.90);
/// Pixels kept free around the annotation layer when fitting the view.
pub const FIT_MARGIN: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Decompressing,
    LocatingMarkupDocument,
    Parsing,
    Converting,
    Filtering,
    Rendering,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub stages: Vec<Stage>,
    pub document: String,
    pub converted: usize,
    pub retained: usize,
    pub bounding_box: Option<GeoBounds>,
}

/// Features whose representative coordinate lies inside `area`; features
/// without one (lines, collections) are always kept.
pub fn filter_to_area(features: Vec<AnnotationFeature>, area: &GeoBounds) -> Vec<AnnotationFeature> {
    features
        .into_iter()
        .filter(|feature| match feature.geometry.representative() {
            Some(coordinate) => area.contains_point(&coordinate),
            None => true,
        })
        .collect()
}

pub struct IngestionPipeline {
    client: reqwest::Client,
    area: GeoBounds,
    stages: Vec<Stage>,
}

impl IngestionPipeline {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            area: AREA_OF_INTEREST,
            stages: Vec::new(),
        }
    }

    pub fn with_area(mut self, area: GeoBounds) -> Self {
        self.area = area;
        self
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Annotation ingestion: {:?}", stage);
        self.stages.push(stage);
    }

    /// Runs every stage to completion. On failure nothing is installed and
    /// the map is put back on its default view.
    pub async fn run(
        mut self,
        source: &AnnotationSource,
        adapter: &impl RenderingAdapter,
        map: &mut impl MapSurface,
    ) -> Result<IngestReport, IngestError> {
        match self.ingest(source, adapter, map).await {
            Ok(report) => {
                info!(
                    "Installed {} of {} annotation features from {}",
                    report.retained, report.converted, source
                );
                Ok(report)
            }
            Err(e) => {
                let last = self.stages.last().copied();
                self.enter(Stage::Failed);
                error!("Annotation ingestion of {} failed at {:?}: {}", source, last, e);
                map.set_view(DEFAULT_CENTER, DEFAULT_ZOOM);
                Err(e)
            }
        }
    }

    async fn ingest(
        &mut self,
        source: &AnnotationSource,
        adapter: &impl RenderingAdapter,
        map: &mut impl MapSurface,
    ) -> Result<IngestReport, IngestError> {
        self.enter(Stage::Fetching);
        let bytes = source.fetch(&self.client).await?;

        self.enter(Stage::Decompressing);
        let mut archive = AnnotationArchive::open(bytes)?;

        self.enter(Stage::LocatingMarkupDocument);
        let document_name = archive.locate_markup_document().inspect_err(|_| {
            debug!("Archive entries: {:?}", archive.entry_names());
        })?;
        let text = archive.read_text(&document_name)?;

        self.enter(Stage::Parsing);
        let document = kml::parse_document(&text)?;

        self.enter(Stage::Converting);
        let features = kml::to_features(&document)?;
        let converted = features.len();

        self.enter(Stage::Filtering);
        let features = filter_to_area(features, &self.area);
        let retained = features.len();
        debug!("{} of {} features inside the area of interest", retained, converted);

        self.enter(Stage::Rendering);
        let layer = adapter.build_feature_layer(render_features(features))?;
        let bounding_box = layer.bounding_box();
        map.install_feature_layer(layer);

        match bounding_box.filter(|bbox| !bbox.is_degenerate()) {
            Some(bbox) => map.fit_bounds(bbox, FIT_MARGIN),
            None => map.set_view(DEFAULT_CENTER, DEFAULT_ZOOM),
        }
        self.enter(Stage::Done);

        Ok(IngestReport {
            stages: self.stages.clone(),
            document: document_name,
            converted,
            retained,
            bounding_box,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::archive::fixtures::zip_bytes;
    use crate::annotation::feature::Geometry;
    use crate::map::geo::Coordinate;
    use crate::map::scene::MapScene;
    use crate::overlay::adapter::WmsAdapter;

    fn point(lat: f64, lon: f64) -> AnnotationFeature {
        AnnotationFeature::new(Geometry::Point(Coordinate::new(lat, lon)))
    }

    fn kml(placemarks: &str) -> String {
        format!(r#"<?xml version="1.0"?><kml xmlns="http://www.opengis.net/kml/2.2"><Document>{placemarks}</Document></kml>"#)
    }

    #[test]
    fn filter_keeps_points_inside_the_area() {
        let kept = filter_to_area(vec![point(51.9, 5.6), point(60.0, 5.6)], &AREA_OF_INTEREST);
        assert_eq!(kept, vec![point(51.9, 5.6)]);
    }

    #[test]
    fn polygon_is_judged_by_its_first_vertex_only() {
        let mostly_inside = AnnotationFeature::new(Geometry::Polygon(vec![vec![
            Coordinate::new(51.79, 5.6),
            Coordinate::new(51.95, 5.6),
            Coordinate::new(51.95, 5.7),
            Coordinate::new(51.79, 5.6),
        ]]));
        let line_far_away = AnnotationFeature::new(Geometry::LineString(vec![
            Coordinate::new(60.0, 5.6),
            Coordinate::new(61.0, 5.6),
        ]));
        let kept = filter_to_area(vec![mostly_inside, line_far_away.clone()], &AREA_OF_INTEREST);
        assert_eq!(kept, vec![line_far_away]);
    }

    #[tokio::test]
    async fn installs_layer_and_fits_view() {
        let text = kml(
            "<Placemark><name>Well</name><Point><coordinates>5.60,51.90</coordinates></Point></Placemark>
             <Placemark><name>Barn</name><Point><coordinates>5.66,51.94</coordinates></Point></Placemark>
             <Placemark><name>Far</name><Point><coordinates>5.60,60.0</coordinates></Point></Placemark>",
        );
        let source = AnnotationSource::Memory(zip_bytes(&[("doc.kml", text.as_str())]));
        let mut map = MapScene::default();

        let report = IngestionPipeline::new(reqwest::Client::new())
            .run(&source, &WmsAdapter, &mut map)
            .await
            .unwrap();

        assert_eq!(
            report.stages,
            vec![
                Stage::Fetching,
                Stage::Decompressing,
                Stage::LocatingMarkupDocument,
                Stage::Parsing,
                Stage::Converting,
                Stage::Filtering,
                Stage::Rendering,
                Stage::Done,
            ]
        );
        assert_eq!((report.converted, report.retained), (3, 2));
        assert_eq!(map.features().map(|layer| layer.len()), Some(2));
        assert!(!map.viewport.is_default());
        assert!(report.bounding_box.unwrap().contains_point(&map.viewport.center));
    }

    #[tokio::test]
    async fn single_point_falls_back_to_default_view() {
        let text = kml("<Placemark><Point><coordinates>5.61,51.91</coordinates></Point></Placemark>");
        let source = AnnotationSource::Memory(zip_bytes(&[("doc.kml", text.as_str())]));
        let mut map = MapScene::default();
        map.viewport.set_zoom(3.0);

        IngestionPipeline::new(reqwest::Client::new())
            .run(&source, &WmsAdapter, &mut map)
            .await
            .unwrap();

        assert_eq!(map.features().map(|layer| layer.len()), Some(1));
        assert!(map.viewport.is_default());
    }

    #[tokio::test]
    async fn archive_without_kml_fails_and_keeps_default_view() {
        let source = AnnotationSource::Memory(zip_bytes(&[("notes.txt", "no markup here")]));
        let mut map = MapScene::default();

        let result = IngestionPipeline::new(reqwest::Client::new())
            .run(&source, &WmsAdapter, &mut map)
            .await;

        assert!(matches!(result, Err(IngestError::NoMarkupDocument)));
        assert!(map.features().is_none());
        assert!(map.viewport.is_default());
    }

    #[tokio::test]
    async fn out_of_range_coordinates_fail_the_whole_batch() {
        let text = kml(
            "<Placemark><Point><coordinates>5.60,51.90</coordinates></Point></Placemark>
             <Placemark><LineString><coordinates>5.6,51.9 5.6,95.0</coordinates></LineString></Placemark>",
        );
        let source = AnnotationSource::Memory(zip_bytes(&[("doc.kml", text.as_str())]));
        let mut map = MapScene::default();

        let result = IngestionPipeline::new(reqwest::Client::new())
            .run(&source, &WmsAdapter, &mut map)
            .await;

        assert!(matches!(result, Err(IngestError::Render(_))));
        assert!(map.features().is_none());
    }

    #[tokio::test]
    async fn malformed_kml_is_a_parse_failure() {
        let source = AnnotationSource::Memory(zip_bytes(&[("doc.kml", "<kml><Document>")]));
        let mut map = MapScene::default();
        let result = IngestionPipeline::new(reqwest::Client::new())
            .run(&source, &WmsAdapter, &mut map)
            .await;
        assert!(matches!(result, Err(IngestError::Parse(_))));
    }
}
