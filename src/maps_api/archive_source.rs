use std::path::PathBuf;

use log::debug;
use reqwest::Url;

use crate::error::IngestError;

/// Where the annotation archive comes from.
#[derive(Debug, Clone)]
pub enum AnnotationSource {
    File(PathBuf),
    Remote(Url),
    Memory(Vec<u8>),
}

impl AnnotationSource {
    /// `http(s)://` locations are fetched remotely, anything else is a path.
    pub fn from_location(location: &str) -> Self {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => AnnotationSource::Remote(url),
            _ => AnnotationSource::File(PathBuf::from(location)),
        }
    }

    pub async fn fetch(&self, client: &reqwest::Client) -> Result<Vec<u8>, IngestError> {
        match self {
            AnnotationSource::File(path) => {
                debug!("Reading annotation archive from {}", path.display());
                Ok(tokio::fs::read(path).await?)
            }
            AnnotationSource::Remote(url) => {
                debug!("Fetching annotation archive from {}", url);
                let response = client.get(url.clone()).send().await?;
                if !response.status().is_success() {
                    return Err(IngestError::Fetch(format!("{} answered with {}", url, response.status())));
                }
                Ok(response.bytes().await?.to_vec())
            }
            AnnotationSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

impl std::fmt::Display for AnnotationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnnotationSource::File(path) => write!(f, "{}", path.display()),
            AnnotationSource::Remote(url) => write!(f, "{url}"),
            AnnotationSource::Memory(bytes) => write!(f, "<{} bytes in memory>", bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_are_classified_by_scheme() {
        assert!(matches!(
            AnnotationSource::from_location("https://example.org/sketch.kmz"),
            AnnotationSource::Remote(_)
        ));
        assert!(matches!(
            AnnotationSource::from_location("data/sketch.kmz"),
            AnnotationSource::File(_)
        ));
        assert!(matches!(
            AnnotationSource::from_location("C:/maps/sketch.kmz"),
            AnnotationSource::File(_)
        ));
    }

    #[tokio::test]
    async fn missing_file_is_a_fetch_error() {
        let source = AnnotationSource::File(PathBuf::from("/nonexistent/definitely/missing.kmz"));
        let result = source.fetch(&reqwest::Client::new()).await;
        assert!(matches!(result, Err(IngestError::Fetch(_))));
    }
}
