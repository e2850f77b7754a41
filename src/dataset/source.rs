//! Where the bundled default dataset comes from.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::DatasetConfig;

#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Fetch the raw CSV text.
    async fn load(&self) -> Result<String>;

    fn describe(&self) -> String;
}

/// Reads the dataset from a file on disk
pub struct FileDatasetSource {
    path: PathBuf,
}

impl FileDatasetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DatasetSource for FileDatasetSource {
    async fn load(&self) -> Result<String> {
        debug!(path = %self.path.display(), "Reading default dataset");
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read dataset {}", self.path.display()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Downloads the dataset over HTTP
pub struct HttpDatasetSource {
    client: reqwest::Client,
    url: String,
}

impl HttpDatasetSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl DatasetSource for HttpDatasetSource {
    async fn load(&self) -> Result<String> {
        debug!(url = %self.url, "Fetching default dataset");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch dataset {}", self.url))?
            .error_for_status()
            .with_context(|| format!("Dataset server rejected {}", self.url))?;
        Ok(response.text().await?)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// In-memory dataset text; used when no default dataset is configured
pub struct StaticDatasetSource {
    text: String,
}

impl StaticDatasetSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl DatasetSource for StaticDatasetSource {
    async fn load(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    fn describe(&self) -> String {
        "<in-memory>".to_string()
    }
}

/// Source for the configured default dataset. A path wins over a URL; with
/// neither configured the default dataset is empty.
pub fn configured_source(config: &DatasetConfig) -> Arc<dyn DatasetSource> {
    match (&config.default_path, &config.default_url) {
        (Some(path), _) => Arc::new(FileDatasetSource::new(path.clone())),
        (None, Some(url)) => Arc::new(HttpDatasetSource::new(url.clone())),
        (None, None) => {
            warn!("No default dataset configured; requests without an upload see an empty dataset");
            Arc::new(StaticDatasetSource::new(""))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_source_reads_file() {
        let path = std::env::temp_dir().join(format!("dataset-chat-{}.csv", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "a,b\n1,2\n").await.unwrap();

        let source = FileDatasetSource::new(&path);
        assert_eq!(source.load().await.unwrap(), "a,b\n1,2\n");

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let source = FileDatasetSource::new("/definitely/not/here.csv");
        assert!(source.load().await.is_err());
    }

    #[tokio::test]
    async fn test_http_source() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/data/list.csv")
            .with_status(200)
            .with_body("x,y\n1,2\n")
            .create_async()
            .await;

        let source = HttpDatasetSource::new(format!("{}/data/list.csv", server.url()));
        assert_eq!(source.load().await.unwrap(), "x,y\n1,2\n");
        mock.assert_async().await;

        let missing = HttpDatasetSource::new(format!("{}/nope.csv", server.url()));
        assert!(missing.load().await.is_err());
    }

    #[test]
    fn test_configured_source_prefers_path() {
        let config = DatasetConfig {
            default_path: Some(PathBuf::from("/data/list.csv")),
            default_url: Some("http://example.com/list.csv".to_string()),
            prompt_token_budget: 100,
            chars_per_token: 4,
        };
        assert_eq!(configured_source(&config).describe(), "/data/list.csv");

        let config = DatasetConfig {
            default_path: None,
            ..config
        };
        assert_eq!(configured_source(&config).describe(), "http://example.com/list.csv");
    }
}
