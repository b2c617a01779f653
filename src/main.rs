#![warn(clippy::all, rust_2018_idioms)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::sync::Arc;

use criteria_map::config::AppConfig;
use criteria_map::overlay::legend::StaticLegends;
use criteria_map::overlay::registry::Registry;
use criteria_map::{session, ui};
use log::error;

#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result<()> {
    env_logger::init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        error!("Invalid configuration, using defaults: {}", e);
        AppConfig::default()
    });

    let (width, height) = config.window_size;
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(egui::vec2(width, height))
            .with_min_inner_size(egui::vec2(400.0, 300.0))
            .with_title("Criteria Map")
            .with_resizable(true)
            .with_decorations(true),
        ..Default::default()
    };

    eframe::run_native(
        "Criteria Map",
        native_options,
        Box::new(move |cc| {
            let registry = Arc::new(Registry::builtin(config.registry)?);
            let static_legends = StaticLegends::builtin()?;

            let repaint = cc.egui_ctx.clone(); // Uses ARC so can be cloned to a new thread cheaply
            let handle = session::spawn(config, registry.clone(), static_legends, move || repaint.request_repaint())?;

            Ok(Box::new(ui::overlay_app::OverlayApp::new(cc, registry, handle)))
        }),
    )
}
