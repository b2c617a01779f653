//! Static catalogue of criteria and the remote WMS layers that back them.

use log::warn;
use reqwest::Url;
use serde::Deserialize;

use crate::error::{ConfigError, OverlayError};

const CRITERIA_JSON: &str = include_str!("../../config/criteria.json");

pub const DEFAULT_WMS_VERSION: &str = "1.3.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// OGC Web Map Service, rendered as tiled images.
    Wms,
}

impl Protocol {
    fn parse(id: &str, name: &str) -> Result<Self, OverlayError> {
        match name.to_ascii_lowercase().as_str() {
            "wms" => Ok(Protocol::Wms),
            _ => Err(OverlayError::UnsupportedProtocol {
                id: id.to_string(),
                protocol: name.to_string(),
            }),
        }
    }

    /// Value of the `SERVICE` query parameter.
    pub fn service(&self) -> &'static str {
        match self {
            Protocol::Wms => "WMS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolOptions {
    pub layer_name: String,
    pub image_format: String,
    pub transparent: bool,
    pub version: String,
    pub style_name: Option<String>,
    pub attribution: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescriptor {
    pub id: String,
    pub label: String,
    pub protocol: Protocol,
    /// Service base URL, without any query string.
    pub endpoint: Url,
    pub options: ProtocolOptions,
}

#[derive(Debug, Clone)]
pub struct CriterionGroup {
    pub key: String,
    pub label: String,
    pub extended: bool,
    pub members: Vec<LayerDescriptor>,
}

#[derive(Debug, Clone, Copy)]
pub struct RegistryOptions {
    /// Include transport, land use, cadastral and building criteria on top of
    /// the flood/soil/ecology/heritage base set.
    pub include_extended_criteria: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            include_extended_criteria: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegistryConfig {
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GroupConfig {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub extended: bool,
    pub layers: Vec<LayerConfig>,
}

#[derive(Debug, Deserialize)]
pub struct LayerConfig {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub protocol: String,
    pub url: String,
    pub options: OptionsConfig,
}

#[derive(Debug, Deserialize)]
pub struct OptionsConfig {
    pub layers: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub transparent: bool,
    pub version: Option<String>,
    pub styles: Option<String>,
    #[serde(default)]
    pub attribution: String,
}

fn default_format() -> String {
    "image/png".to_string()
}

impl RegistryConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl LayerDescriptor {
    pub fn from_config(config: &LayerConfig) -> Result<Self, OverlayError> {
        let protocol = Protocol::parse(&config.id, &config.protocol)?;

        let mut endpoint = Url::parse(&config.url).map_err(|e| OverlayError::InvalidEndpoint {
            id: config.id.clone(),
            url: config.url.clone(),
            reason: e.to_string(),
        })?;
        endpoint.set_query(None);
        endpoint.set_fragment(None);

        let options = &config.options;
        Ok(Self {
            id: config.id.clone(),
            label: config.label.clone(),
            protocol,
            endpoint,
            options: ProtocolOptions {
                layer_name: options.layers.clone(),
                image_format: options.format.clone(),
                transparent: options.transparent,
                version: options
                    .version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_WMS_VERSION.to_string()),
                style_name: options.styles.clone().filter(|s| !s.is_empty()),
                attribution: options.attribution.clone(),
            },
        })
    }
}

/// Read-only lookup from criteria to layer descriptors.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    groups: Vec<CriterionGroup>,
}

impl Registry {
    /// Builds the registry, skipping (with a warning) every entry that cannot
    /// be turned into a descriptor.
    pub fn from_config(config: &RegistryConfig, options: RegistryOptions) -> Self {
        let groups = config
            .groups
            .iter()
            .filter(|group| options.include_extended_criteria || !group.extended)
            .map(|group| {
                let members = group
                    .layers
                    .iter()
                    .filter_map(|layer| match LayerDescriptor::from_config(layer) {
                        Ok(descriptor) => Some(descriptor),
                        Err(e) => {
                            warn!("Skipping layer {} in criterion {}: {}", layer.id, group.key, e);
                            None
                        }
                    })
                    .collect();
                CriterionGroup {
                    key: group.key.clone(),
                    label: group.label.clone(),
                    extended: group.extended,
                    members,
                }
            })
            .collect();

        Self { groups }
    }

    /// Registry built from the catalogue shipped with the application.
    pub fn builtin(options: RegistryOptions) -> Result<Self, ConfigError> {
        let config = RegistryConfig::from_json(CRITERIA_JSON)?;
        Ok(Self::from_config(&config, options))
    }

    pub fn all_groups(&self) -> &[CriterionGroup] {
        &self.groups
    }

    pub fn resolve(&self, id: &str) -> Result<&LayerDescriptor, OverlayError> {
        self.layers()
            .find(|descriptor| descriptor.id == id)
            .ok_or_else(|| OverlayError::NotFound(id.to_string()))
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.groups.iter().flat_map(|group| group.members.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_all_criteria() {
        let registry = Registry::builtin(RegistryOptions::default()).unwrap();
        let keys: Vec<&str> = registry.all_groups().iter().map(|g| g.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["flood", "soil", "ecology", "heritage", "transport", "landuse", "cadastral", "buildings"]
        );
        assert_eq!(registry.layers().count(), 11);
    }

    #[test]
    fn extended_criteria_can_be_left_out() {
        let registry = Registry::builtin(RegistryOptions {
            include_extended_criteria: false,
        })
        .unwrap();
        let keys: Vec<&str> = registry.all_groups().iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["flood", "soil", "ecology", "heritage"]);
        assert!(matches!(registry.resolve("railways"), Err(OverlayError::NotFound(_))));
    }

    #[test]
    fn resolve_strips_query_and_defaults_version() {
        let registry = Registry::builtin(RegistryOptions::default()).unwrap();
        let soil = registry.resolve("soil_bro_bodemkaart").unwrap();
        assert_eq!(soil.endpoint.as_str(), "https://service.pdok.nl/bzk/bro-bodemkaart/wms/v1_0");
        assert_eq!(soil.options.version, "1.3.0");
        assert_eq!(soil.options.layer_name, "soilarea");
        assert!(soil.options.transparent);
    }

    #[test]
    fn unsupported_protocol_skips_only_that_entry() {
        let config = RegistryConfig::from_json(
            r#"{ "groups": [ { "key": "mixed", "label": "Mixed", "layers": [
                { "id": "vector", "label": "Vector", "type": "wfs",
                  "url": "https://example.org/wfs", "options": { "layers": "a" } },
                { "id": "raster", "label": "Raster", "type": "wms",
                  "url": "https://example.org/wms", "options": { "layers": "b" } },
                { "id": "broken", "label": "Broken", "type": "wms",
                  "url": "not a url", "options": { "layers": "c" } }
            ] } ] }"#,
        )
        .unwrap();

        let registry = Registry::from_config(&config, RegistryOptions::default());
        let ids: Vec<&str> = registry.layers().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["raster"]);

        let err = LayerDescriptor::from_config(&config.groups[0].layers[0]).unwrap_err();
        assert!(matches!(err, OverlayError::UnsupportedProtocol { .. }));
    }
}
