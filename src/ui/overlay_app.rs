use std::num::NonZeroUsize;
use std::sync::Arc;

use eframe::egui;
use egui::{Color32, ColorImage, Margin, Style, TextureHandle, TextureOptions};
use log::{error, warn};
use lru::LruCache;
use tokio::sync::mpsc::error::TryRecvError;

use crate::map::map::{hex_color, Map};
use crate::map::scene::MapScene;
use crate::overlay::controller::ControllerEvent;
use crate::overlay::legend::{Legend, LegendImage, LegendPanel};
use crate::overlay::registry::Registry;
use crate::session::{SessionHandle, SessionUpdate};
use crate::ui::selection::LayerSelection;

const LEGEND_TEXTURE_CAPACITY: usize = 64;
const LEGEND_UNAVAILABLE: &str = "Legend not available from service";

pub struct OverlayApp {
    registry: Arc<Registry>,
    session: SessionHandle,
    scene: MapScene,
    checked: LayerSelection,
    panel: LegendPanel,
    legend_textures: LruCache<String, TextureHandle>,
    status: Option<String>,
    selection: Option<String>,
    worker_gone: bool,
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Test for f11 key, to toggle fullscreen
        if let Some(new_fullscreen) = ctx.input(|i| {
            if i.key_pressed(egui::Key::F11) { Some(!i.viewport().fullscreen.unwrap_or(false)) }
            else                       { None                                            }
        }) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(  new_fullscreen));
            ctx.send_viewport_cmd(egui::ViewportCommand::Decorations(!new_fullscreen));
            ctx.send_viewport_cmd(egui::ViewportCommand::Maximized(  !new_fullscreen));
            ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
        }

        self.drain_session();

        egui::SidePanel::left("criteria")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.criteria_ui(ui);
                    ui.separator();
                    self.legend_ui(ui);
                });
            });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            match &self.status {
                Some(status) => ui.label(status),
                None => ui.weak("Ready"),
            };
        });

        let frame = egui::Frame {
            fill: egui::Color32::TRANSPARENT,
            stroke: egui::Stroke::new(1.0, egui::Color32::WHITE),
            inner_margin: Margin::same(1.0),
            outer_margin: Margin::same(0.0),
            ..Default::default()
        };

        egui::CentralPanel::default().frame(frame).show(ctx, |ui| {
            // Hide debug info
            ui.style_mut().debug.debug_on_hover = false;

            let size = ui.available_size();
            ui.add(Map::new(&mut self.scene, &mut self.selection).viewport_size(size));
        });

        if let Some(popup) = self.selection.clone() {
            let mut open = true;
            egui::Window::new("Annotation")
                .open(&mut open)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::RIGHT_TOP, [-12.0, 12.0])
                .show(ctx, |ui| {
                    ui.label(popup);
                });
            if !open {
                self.selection = None;
            }
        }
    }
}

impl OverlayApp {
    pub fn new(cc: &eframe::CreationContext<'_>, registry: Arc<Registry>, session: SessionHandle) -> Self {
        cc.egui_ctx.set_style(Self::get_dark_theme_style(&cc.egui_ctx));
        Self {
            registry,
            session,
            scene: MapScene::default(),
            checked: LayerSelection::default(),
            panel: LegendPanel::default(),
            legend_textures: LruCache::new(
                NonZeroUsize::new(LEGEND_TEXTURE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            ),
            status: None,
            selection: None,
            worker_gone: false,
        }
    }

    /// Applies everything the worker sent since the last frame.
    fn drain_session(&mut self) {
        loop {
            match self.session.scene.try_recv() {
                Ok(command) => self.scene.apply(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.on_worker_gone();
                    break;
                }
            }
        }

        while let Ok(update) = self.session.updates.try_recv() {
            match update {
                SessionUpdate::Panel(panel) => {
                    self.checked.confirm(panel.ids());
                    self.panel = panel;
                }
                SessionUpdate::ToggleRejected(e) => {
                    self.checked.reject();
                    self.status = Some(format!("Layer not changed: {e}"));
                }
                SessionUpdate::AnnotationsLoaded { retained, converted } => {
                    self.status = Some(format!("Loaded {retained} of {converted} annotations"));
                }
                SessionUpdate::AnnotationsFailed(message) => self.status = Some(message),
            }
        }
    }

    fn on_worker_gone(&mut self) {
        if !self.worker_gone {
            error!("Overlay worker stopped");
            self.status = Some("Layer service stopped, restart the application".to_string());
            self.worker_gone = true;
        }
    }

    fn send(&mut self, event: ControllerEvent) {
        if self.session.events.send(event.clone()).is_err() {
            self.on_worker_gone();
            return;
        }
        self.checked.request(event);
    }

    fn criteria_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Criteria");

        let mut events = Vec::new();
        for group in self.registry.all_groups() {
            egui::CollapsingHeader::new(&group.label)
                .id_salt(&group.key)
                .default_open(true)
                .show(ui, |ui| {
                    for layer in &group.members {
                        let mut on = self.checked.is_checked(&layer.id);
                        if ui.checkbox(&mut on, &layer.label).changed() {
                            events.push(ControllerEvent::Toggle {
                                id: layer.id.clone(),
                                on,
                            });
                        }
                    }
                });
        }

        ui.horizontal(|ui| {
            if ui.button("Clear all").clicked() {
                events.push(ControllerEvent::Clear);
            }
            if ui.button("Reset view").clicked() {
                self.scene.viewport.reset();
            }
        });

        for event in events {
            self.send(event);
        }
    }

    fn legend_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Legend");
        if self.panel.is_empty() {
            ui.weak("No active layers");
            return;
        }

        for entry in &self.panel.entries {
            ui.strong(&entry.label);
            match &entry.legend {
                Legend::Image(image) => {
                    let texture = Self::legend_texture(&mut self.legend_textures, ui.ctx(), image);
                    ui.image((texture.id(), texture.size_vec2()));
                }
                Legend::Static(items) => {
                    for item in items {
                        ui.horizontal(|ui| {
                            let (rect, _) = ui.allocate_exact_size(egui::vec2(16.0, 16.0), egui::Sense::hover());
                            ui.painter().rect(rect, 2.0, hex_color(&item.color), egui::Stroke::new(1.0, Color32::from_gray(60)));
                            ui.label(&item.label);
                        });
                    }
                }
                Legend::Unavailable => {
                    ui.weak(LEGEND_UNAVAILABLE);
                }
            }
            ui.add_space(6.0);
        }
    }

    fn legend_texture(
        cache: &mut LruCache<String, TextureHandle>,
        ctx: &egui::Context,
        image: &LegendImage,
    ) -> TextureHandle {
        if let Some(texture) = cache.get(&image.url) {
            return texture.clone();
        }
        let size = [image.width as usize, image.height as usize];
        if image.rgba.len() != size[0] * size[1] * 4 {
            warn!("Legend image {} has an unexpected pixel buffer", image.url);
        }
        let color_image = ColorImage::from_rgba_unmultiplied(size, &image.rgba);
        let texture = ctx.load_texture(&image.url, color_image, TextureOptions::LINEAR);
        cache.put(image.url.clone(), texture.clone());
        texture
    }

    pub fn get_dark_theme_style(ctx: &egui::Context) -> Style {
        use egui::{
            style::{Selection, Visuals, Widgets},
            Color32, FontFamily, FontId, Rounding, Stroke, TextStyle,
        };

        let mut style = (*ctx.style()).clone();

        // Set text styles
        style.text_styles = [
            (TextStyle::Heading, FontId::new(20.0, FontFamily::Proportional)),
            (TextStyle::Body, FontId::new(16.0, FontFamily::Proportional)),
            (TextStyle::Monospace, FontId::new(14.0, FontFamily::Monospace)),
            (TextStyle::Button, FontId::new(16.0, FontFamily::Proportional)),
            (TextStyle::Small, FontId::new(12.0, FontFamily::Proportional)),
        ]
        .into();

        // Primary background color
        let primary_bg_color = Color32::from_rgb(32, 33, 36);

        let widget = |bg_fill: Color32, stroke: Color32, fg: Color32, expansion: f32| egui::style::WidgetVisuals {
            bg_fill,
            bg_stroke: Stroke::new(1.0, stroke),
            fg_stroke: Stroke::new(1.0, fg),
            rounding: Rounding::same(4.0),
            weak_bg_fill: Color32::from_gray(32),
            expansion,
        };

        style.visuals = Visuals::dark();
        style.visuals.override_text_color = Some(Color32::LIGHT_GRAY);
        style.visuals.widgets = Widgets {
            noninteractive: widget(primary_bg_color, Color32::from_gray(60), Color32::LIGHT_GRAY, 0.0),
            inactive: widget(primary_bg_color, Color32::from_gray(75), Color32::LIGHT_GRAY, 0.0),
            hovered: widget(Color32::from_rgb(50, 50, 50), Color32::WHITE, Color32::WHITE, 0.5),
            active: widget(Color32::from_rgb(60, 60, 60), Color32::WHITE, Color32::WHITE, 2.0),
            open: widget(Color32::from_rgb(40, 40, 40), Color32::WHITE, Color32::WHITE, 0.0),
        };

        // Selection colors
        style.visuals.selection = Selection {
            bg_fill: Color32::from_rgb(75, 75, 75),
            stroke: Stroke::new(1.0, Color32::WHITE),
        };

        // Window settings
        style.visuals.window_rounding = Rounding::same(6.0);
        style.visuals.window_shadow = egui::Shadow {
            offset: egui::vec2(0.0, 1.0),
            blur: 3.0,
            spread: 0.0,
            color: Color32::from_black_alpha(128),
        };
        style.visuals.window_fill = primary_bg_color;
        style.visuals.window_stroke = Stroke::new(1.0, Color32::from_gray(60));
        style.visuals.panel_fill = primary_bg_color;

        style.spacing.window_margin = egui::Margin::same(4.0);
        style.spacing.button_padding = egui::vec2(4.0, 2.0);

        style
    }
}
