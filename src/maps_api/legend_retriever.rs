use log::debug;
use reqwest::Url;

use crate::error::LegendFetchFailure;
use crate::overlay::registry::LayerDescriptor;

pub const FALLBACK_WMS_VERSION: &str = "1.1.1";
/// Pixel size hinted by the last candidate in the cascade.
pub const LEGEND_SIZE_HINT: u32 = 20;

/// One GetLegendGraphic request variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendRequest {
    pub version: String,
    pub size_hint: Option<(u32, u32)>,
}

impl LegendRequest {
    pub fn url(&self, descriptor: &LayerDescriptor) -> Url {
        let mut url = descriptor.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("SERVICE", descriptor.protocol.service())
                .append_pair("VERSION", &self.version)
                .append_pair("REQUEST", "GetLegendGraphic")
                .append_pair("FORMAT", "image/png")
                .append_pair("LAYER", &descriptor.options.layer_name);
            if let Some(style) = &descriptor.options.style_name {
                query.append_pair("STYLE", style);
            }
            if let Some((width, height)) = self.size_hint {
                query
                    .append_pair("WIDTH", &width.to_string())
                    .append_pair("HEIGHT", &height.to_string());
            }
        }
        url
    }
}

/// Candidate requests in the order they are tried: configured version,
/// the older 1.1.1 protocol, then the configured version with explicit
/// pixel dimensions.
pub fn legend_candidates(descriptor: &LayerDescriptor) -> Vec<LegendRequest> {
    let version = descriptor.options.version.clone();
    vec![
        LegendRequest {
            version: version.clone(),
            size_hint: None,
        },
        LegendRequest {
            version: FALLBACK_WMS_VERSION.to_string(),
            size_hint: None,
        },
        LegendRequest {
            version,
            size_hint: Some((LEGEND_SIZE_HINT, LEGEND_SIZE_HINT)),
        },
    ]
}

/// Source of raw legend image bytes.
#[allow(async_fn_in_trait)]
pub trait LegendFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, LegendFetchFailure>;
}

#[derive(Debug, Clone)]
pub struct LegendRetriever {
    client: reqwest::Client,
}

impl Default for LegendRetriever {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl LegendRetriever {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl LegendFetcher for LegendRetriever {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, LegendFetchFailure> {
        debug!("Fetching legend from {}", url);

        let response = self.client.get(url.clone()).send().await?;

        // If the response is not successful, return an error
        if !response.status().is_success() {
            return Err(LegendFetchFailure::Status(response.status()));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
