use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use criteria_map::annotation::pipeline::IngestionPipeline;
use criteria_map::config::AppConfig;
use criteria_map::error::{IngestError, LegendFetchFailure, OverlayError};
use criteria_map::map::scene::MapScene;
use criteria_map::map::viewport::{DEFAULT_CENTER, DEFAULT_ZOOM};
use criteria_map::maps_api::archive_source::AnnotationSource;
use criteria_map::maps_api::legend_retriever::LegendFetcher;
use criteria_map::overlay::adapter::{SceneCommand, WmsAdapter};
use criteria_map::overlay::controller::{ControllerEvent, LayerController};
use criteria_map::overlay::legend::{Legend, LegendResolver, StaticLegends};
use criteria_map::overlay::registry::{Registry, RegistryOptions};
use criteria_map::session::{self, SessionUpdate};
use image::{ImageFormat, Rgba, RgbaImage};
use reqwest::{StatusCode, Url};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Serves a legend image for one WMS layer name and 404s everything else.
struct OneLayerService {
    layer: String,
}

impl LegendFetcher for OneLayerService {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, LegendFetchFailure> {
        let serves = url.query_pairs().any(|(k, v)| k == "LAYER" && v == self.layer.as_str());
        if !serves {
            return Err(LegendFetchFailure::Status(StatusCode::NOT_FOUND));
        }
        let image = RgbaImage::from_pixel(32, 16, Rgba([10, 120, 200, 255]));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        Ok(bytes)
    }
}

fn registry() -> Arc<Registry> {
    Arc::new(Registry::builtin(RegistryOptions::default()).unwrap())
}

fn kmz(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn flood_then_soil_then_flood_off_leaves_soil_only() {
    let legends = LegendResolver::new(OneLayerService { layer: "none".to_string() }, StaticLegends::builtin().unwrap());
    let mut controller = LayerController::new(registry(), WmsAdapter, MapScene::default(), legends);

    controller.toggle("flood_riskzone", true).await.unwrap();
    controller.toggle("soil_bro_bodemkaart", true).await.unwrap();
    controller.toggle("flood_riskzone", false).await.unwrap();

    assert_eq!(controller.active_ids(), vec!["soil_bro_bodemkaart"]);
    assert_eq!(controller.map().overlay_ids(), vec!["soil_bro_bodemkaart"]);

    let panel = controller.legend_panel();
    assert_eq!(panel.ids(), vec!["soil_bro_bodemkaart"]);
    match &panel.entries[0].legend {
        Legend::Static(entries) => {
            let labels: Vec<&str> = entries.iter().map(|entry| entry.label.as_str()).collect();
            assert_eq!(labels, vec!["Clay soils", "Sandy soils", "Peat soils", "Loamy soils", "Mixed soils"]);
        }
        other => panic!("expected static soil legend, got {other:?}"),
    }
}

#[tokio::test]
async fn service_legend_takes_precedence_over_static_table() {
    let registry = registry();
    let layer_name = registry.resolve("natura2000").unwrap().options.layer_name.clone();
    let service = OneLayerService { layer: layer_name };
    let legends = LegendResolver::new(service, StaticLegends::builtin().unwrap());
    let mut controller = LayerController::new(registry, WmsAdapter, MapScene::default(), legends);

    controller.toggle("natura2000", true).await.unwrap();
    controller.toggle("railways", true).await.unwrap();

    let panel = controller.legend_panel();
    assert_eq!(panel.ids(), vec!["natura2000", "railways"]);
    match &panel.entries[0].legend {
        Legend::Image(image) => assert_eq!((image.width, image.height), (32, 16)),
        other => panic!("expected service legend, got {other:?}"),
    }
    assert!(matches!(panel.entries[1].legend, Legend::Static(_)));
}

#[tokio::test]
async fn kmz_without_kml_leaves_map_on_default_view() {
    let source = AnnotationSource::Memory(kmz(&[("images/logo.png", "not a document")]));
    let mut map = MapScene::default();

    let result = IngestionPipeline::new(reqwest::Client::new())
        .run(&source, &WmsAdapter, &mut map)
        .await;

    assert!(matches!(result, Err(IngestError::NoMarkupDocument)));
    assert!(map.features().is_none());
    assert!(map.viewport.is_default());
}

#[tokio::test]
async fn kmz_annotations_are_filtered_and_framed() {
    let document = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Folder>
      <Placemark>
        <name>Dike section</name>
        <description>Inspected 2023</description>
        <LineString><coordinates>5.60,51.92 5.65,51.93 5.70,51.95</coordinates></LineString>
      </Placemark>
      <Placemark>
        <name>Pumping station</name>
        <Point><coordinates>5.62,51.94,0</coordinates></Point>
      </Placemark>
      <Placemark>
        <name>Amsterdam</name>
        <Point><coordinates>4.90,52.37,0</coordinates></Point>
      </Placemark>
    </Folder>
  </Document>
</kml>"#;
    let source = AnnotationSource::Memory(kmz(&[("doc.kml", document), ("files/icon.png", "png")]));
    let mut map = MapScene::default();

    let report = IngestionPipeline::new(reqwest::Client::new())
        .run(&source, &WmsAdapter, &mut map)
        .await
        .unwrap();

    assert_eq!(report.document, "doc.kml");
    assert_eq!((report.converted, report.retained), (3, 2));

    let layer = map.features().unwrap();
    let popups: Vec<Option<&str>> = layer.features().iter().map(|f| f.popup.as_deref()).collect();
    assert_eq!(popups, vec![Some("Dike section\nInspected 2023"), Some("Pumping station")]);
    assert!(!map.viewport.is_default());
}

#[test]
fn session_reports_failed_ingestion_and_rejected_toggles() {
    let config = AppConfig {
        annotation_source: "/nonexistent/criteria-map/annotations.kmz".to_string(),
        ..AppConfig::default()
    };
    let repaints = Arc::new(AtomicUsize::new(0));
    let counter = repaints.clone();

    let mut handle = session::spawn(config, registry(), StaticLegends::builtin().unwrap(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    match handle.scene.blocking_recv() {
        Some(SceneCommand::SetView { center, zoom }) => {
            assert_eq!(center, DEFAULT_CENTER);
            assert_eq!(zoom, DEFAULT_ZOOM);
        }
        other => panic!("expected the default view, got {other:?}"),
    }
    assert!(matches!(handle.updates.blocking_recv(), Some(SessionUpdate::AnnotationsFailed(_))));

    handle
        .events
        .send(ControllerEvent::Toggle { id: "volcanoes".into(), on: true })
        .unwrap();
    match handle.updates.blocking_recv() {
        Some(SessionUpdate::ToggleRejected(e)) => assert_eq!(e, OverlayError::UnknownLayer("volcanoes".into())),
        other => panic!("expected a rejected toggle, got {other:?}"),
    }

    assert!(repaints.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn toggles_are_served_while_annotations_are_still_downloading() {
    // accepts connections but never answers
    let stalled = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = AppConfig {
        annotation_source: format!("http://{}/annotations.kmz", stalled.local_addr().unwrap()),
        annotation_timeout: Duration::from_secs(2),
        legend_deadline: Duration::from_millis(50),
        ..AppConfig::default()
    };

    let mut handle = session::spawn(config, registry(), StaticLegends::builtin().unwrap(), || {}).unwrap();
    handle
        .events
        .send(ControllerEvent::Toggle { id: "flood_riskzone".into(), on: true })
        .unwrap();

    let started = Instant::now();
    let mut updates = Vec::new();
    while !updates.iter().any(|u| matches!(u, SessionUpdate::AnnotationsFailed(_))) {
        let update = tokio::time::timeout(Duration::from_secs(10), handle.updates.recv())
            .await
            .expect("session went quiet")
            .expect("session stopped");
        updates.push(update);
    }

    match &updates[0] {
        SessionUpdate::Panel(panel) => assert_eq!(panel.ids(), vec!["flood_riskzone"]),
        other => panic!("toggle was held back behind ingestion, first update {other:?}"),
    }
    // the stalled download ends through the client timeout
    assert!(started.elapsed() < Duration::from_secs(10));
    drop(stalled);
}
