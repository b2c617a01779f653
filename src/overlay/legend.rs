//! Legend resolution: remote GetLegendGraphic requests with a static fallback.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use log::debug;
use serde::Deserialize;

use crate::error::{ConfigError, LegendFetchFailure};
use crate::maps_api::legend_retriever::{legend_candidates, LegendFetcher};
use crate::overlay::registry::LayerDescriptor;

const LEGENDS_JSON: &str = include_str!("../../config/legends.json");

/// Services that have no legend for a layer tend to answer with a tiny
/// transparent image instead of an error.
pub const MIN_LEGEND_DIMENSION: u32 = 5;
pub const DEFAULT_CANDIDATE_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegendEntry {
    pub color: String,
    pub label: String,
}

/// Hand-authored legends keyed by layer id.
#[derive(Debug, Clone, Default)]
pub struct StaticLegends {
    tables: HashMap<String, Vec<LegendEntry>>,
}

impl StaticLegends {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            tables: serde_json::from_str(json)?,
        })
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(LEGENDS_JSON)
    }

    pub fn get(&self, id: &str) -> Option<&[LegendEntry]> {
        self.tables.get(id).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Legend {
    Image(LegendImage),
    Static(Vec<LegendEntry>),
    /// Layer is active but no legend could be found.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendPanelEntry {
    pub id: String,
    pub label: String,
    pub legend: Legend,
}

/// What the legend panel shows, one entry per active layer in activation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegendPanel {
    pub entries: Vec<LegendPanelEntry>,
}

impl LegendPanel {
    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct LegendResolver<F> {
    fetcher: F,
    static_legends: StaticLegends,
    deadline: Duration,
}

impl<F: LegendFetcher> LegendResolver<F> {
    pub fn new(fetcher: F, static_legends: StaticLegends) -> Self {
        Self {
            fetcher,
            static_legends,
            deadline: DEFAULT_CANDIDATE_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Walks the candidate cascade; the first usable image wins, then the
    /// static table, then the placeholder. Never fails.
    pub async fn resolve(&self, descriptor: &LayerDescriptor) -> Legend {
        for request in legend_candidates(descriptor) {
            let url = request.url(descriptor);
            match self.fetch_candidate(&url).await {
                Ok(image) => return Legend::Image(image),
                Err(e) => debug!("Legend candidate {} for {} failed: {}", url, descriptor.id, e),
            }
        }

        match self.static_legends.get(&descriptor.id) {
            Some(entries) => Legend::Static(entries.to_vec()),
            None => {
                debug!("No legend available for {}", descriptor.id);
                Legend::Unavailable
            }
        }
    }

    async fn fetch_candidate(&self, url: &reqwest::Url) -> Result<LegendImage, LegendFetchFailure> {
        let bytes = tokio::time::timeout(self.deadline, self.fetcher.fetch(url))
            .await
            .map_err(|_| LegendFetchFailure::Timeout)??;

        let image = image::load_from_memory(&bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        if width < MIN_LEGEND_DIMENSION || height < MIN_LEGEND_DIMENSION {
            return Err(LegendFetchFailure::Degenerate { width, height });
        }

        Ok(LegendImage {
            url: url.to_string(),
            width,
            height,
            rgba: image.into_raw(),
        })
    }

    /// Resolves every layer concurrently and returns once all have settled.
    pub async fn resolve_panel<'a>(&self, layers: impl IntoIterator<Item = &'a LayerDescriptor>) -> LegendPanel {
        let entries = join_all(layers.into_iter().map(|descriptor| async move {
            LegendPanelEntry {
                id: descriptor.id.clone(),
                label: descriptor.label.clone(),
                legend: self.resolve(descriptor).await,
            }
        }))
        .await;
        LegendPanel { entries }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::Duration;

    use image::{ImageFormat, Rgba, RgbaImage};
    use reqwest::Url;

    use crate::error::LegendFetchFailure;
    use crate::maps_api::legend_retriever::LegendFetcher;

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    #[derive(Clone)]
    pub enum Reply {
        Image(Vec<u8>),
        NotFound,
        Hang,
    }

    /// Answers by `VERSION` and whether a `WIDTH` hint is present; anything
    /// unscripted is a 404.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        replies: HashMap<(String, bool), Reply>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn reply(mut self, version: &str, sized: bool, reply: Reply) -> Self {
            self.replies.insert((version.to_string(), sized), reply);
            self
        }
    }

    impl LegendFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &Url) -> Result<Vec<u8>, LegendFetchFailure> {
            self.calls.lock().unwrap().push(url.to_string());
            let version = url
                .query_pairs()
                .find(|(k, _)| k == "VERSION")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            let sized = url.query_pairs().any(|(k, _)| k == "WIDTH");
            match self.replies.get(&(version, sized)).cloned() {
                Some(Reply::Image(bytes)) => Ok(bytes),
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(LegendFetchFailure::Timeout)
                }
                Some(Reply::NotFound) | None => Err(LegendFetchFailure::Status(reqwest::StatusCode::NOT_FOUND)),
            }
        }
    }
}
