//! Active layer state and the legend panel kept in step with it.

use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::error::OverlayError;
use crate::maps_api::legend_retriever::LegendFetcher;
use crate::overlay::adapter::{MapSurface, RenderingAdapter, TileOverlay};
use crate::overlay::legend::{LegendPanel, LegendResolver};
use crate::overlay::registry::{LayerDescriptor, Registry};

#[derive(Debug, Clone)]
pub struct ActiveLayer {
    pub descriptor: LayerDescriptor,
    pub overlay: TileOverlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// The layer was already in the requested state.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerToggled {
    pub id: String,
    pub on: bool,
}

/// Events delivered to [`LayerController::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Toggle { id: String, on: bool },
    Clear,
}

type Handler<T> = Box<dyn FnMut(&T) + Send>;

/// Owns the set of rendered overlays. All mutation goes through
/// [`LayerController::toggle`] and [`LayerController::clear`], each of which
/// refreshes the legend panel before returning.
pub struct LayerController<A, M, F> {
    registry: Arc<Registry>,
    adapter: A,
    map: M,
    legends: LegendResolver<F>,
    active: IndexMap<String, ActiveLayer>,
    panel: LegendPanel,
    toggle_handlers: Vec<Handler<LayerToggled>>,
    panel_handlers: Vec<Handler<LegendPanel>>,
    error_handlers: Vec<Handler<OverlayError>>,
}

impl<A, M, F> LayerController<A, M, F>
where
    A: RenderingAdapter,
    M: MapSurface,
    F: LegendFetcher,
{
    pub fn new(registry: Arc<Registry>, adapter: A, map: M, legends: LegendResolver<F>) -> Self {
        Self {
            registry,
            adapter,
            map,
            legends,
            active: IndexMap::new(),
            panel: LegendPanel::default(),
            toggle_handlers: Vec::new(),
            panel_handlers: Vec::new(),
            error_handlers: Vec::new(),
        }
    }

    pub fn on_toggle(&mut self, handler: impl FnMut(&LayerToggled) + Send + 'static) {
        self.toggle_handlers.push(Box::new(handler));
    }

    pub fn on_panel(&mut self, handler: impl FnMut(&LegendPanel) + Send + 'static) {
        self.panel_handlers.push(Box::new(handler));
    }

    pub fn on_error(&mut self, handler: impl FnMut(&OverlayError) + Send + 'static) {
        self.error_handlers.push(Box::new(handler));
    }

    pub fn active_ids(&self) -> Vec<&str> {
        self.active.keys().map(String::as_str).collect()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    pub fn legend_panel(&self) -> &LegendPanel {
        &self.panel
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub async fn toggle(&mut self, id: &str, on: bool) -> Result<ToggleOutcome, OverlayError> {
        let descriptor = self
            .registry
            .resolve(id)
            .map_err(|_| OverlayError::UnknownLayer(id.to_string()))?;

        let outcome = match (on, self.active.contains_key(id)) {
            (true, false) => {
                let overlay = self.adapter.build_overlay(descriptor)?;
                overlay.attach(&mut self.map);
                self.active.insert(
                    id.to_string(),
                    ActiveLayer {
                        descriptor: descriptor.clone(),
                        overlay,
                    },
                );
                info!("Layer {} added", id);
                ToggleOutcome::Added
            }
            (false, true) => {
                if let Some(layer) = self.active.shift_remove(id) {
                    layer.overlay.detach(&mut self.map);
                }
                info!("Layer {} removed", id);
                ToggleOutcome::Removed
            }
            _ => ToggleOutcome::Unchanged,
        };

        if outcome != ToggleOutcome::Unchanged {
            let event = LayerToggled {
                id: id.to_string(),
                on,
            };
            self.toggle_handlers.iter_mut().for_each(|handler| handler(&event));
        }

        self.refresh_legend_panel().await;
        Ok(outcome)
    }

    /// Removes every active layer.
    pub async fn clear(&mut self) {
        for (id, layer) in self.active.drain(..) {
            layer.overlay.detach(&mut self.map);
            let event = LayerToggled { id, on: false };
            self.toggle_handlers.iter_mut().for_each(|handler| handler(&event));
        }
        self.refresh_legend_panel().await;
    }

    pub async fn refresh_legend_panel(&mut self) {
        let panel = self
            .legends
            .resolve_panel(self.active.values().map(|layer| &layer.descriptor))
            .await;
        debug!("Legend panel now shows {:?}", panel.ids());
        self.panel = panel;
        self.panel_handlers.iter_mut().for_each(|handler| handler(&self.panel));
    }

    /// Processes events one at a time, in arrival order, until the sender side
    /// is dropped.
    pub async fn run(&mut self, mut events: mpsc::UnboundedReceiver<ControllerEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                ControllerEvent::Toggle { id, on } => {
                    if let Err(e) = self.toggle(&id, on).await {
                        warn!("Toggle of {} rejected: {}", id, e);
                        self.error_handlers.iter_mut().for_each(|handler| handler(&e));
                    }
                }
                ControllerEvent::Clear => self.clear().await,
            }
        }
        debug!("Controller event stream closed");
    }
}
