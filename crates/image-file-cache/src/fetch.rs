//! Remote image fetching

use crate::error::{ImageCacheError, Result};
use crate::types::CacheConfig;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

/// Validate a caller-supplied image URL; only http and https are fetched
pub fn parse_remote_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ImageCacheError::InvalidUrl("empty url".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| ImageCacheError::InvalidUrl(format!("{}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ImageCacheError::InvalidUrl(format!(
            "unsupported scheme: {}",
            other
        ))),
    }
}

/// HTTP client for downloading images with bounded timeouts and body size
pub struct ImageFetcher {
    client: Client,
    max_bytes: u64,
}

impl ImageFetcher {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            max_bytes: config.max_image_bytes,
        })
    }

    /// GET the image body
    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        debug!(url = %url, "Fetching image");

        let mut response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "Failed to fetch image");
            return Err(ImageCacheError::Status(response.status().as_u16()));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(ImageCacheError::TooLarge {
                    limit: self.max_bytes,
                    actual: len,
                });
            }
        }

        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let actual = (data.len() + chunk.len()) as u64;
            if actual > self.max_bytes {
                return Err(ImageCacheError::TooLarge {
                    limit: self.max_bytes,
                    actual,
                });
            }
            data.extend_from_slice(&chunk);
        }

        debug!(url = %url, size = data.len(), "Fetched image");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_remote_url() {
        assert!(parse_remote_url("https://cdn.example.com/a.jpg").is_ok());
        assert!(parse_remote_url("http://cdn.example.com/a.jpg").is_ok());
    }

    #[test]
    fn test_parse_remote_url_rejects_bad_input() {
        for raw in ["", "  ", "not a url", "ftp://cdn.example.com/a.jpg", "file:///etc/passwd"] {
            let err = parse_remote_url(raw).unwrap_err();
            assert!(matches!(err, ImageCacheError::InvalidUrl(_)), "{}", raw);
        }
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"pixels".to_vec()))
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(&CacheConfig::default()).unwrap();
        let url = Url::parse(&format!("{}/a.png", server.uri())).unwrap();

        assert_eq!(fetcher.fetch(&url).await.unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(&CacheConfig::default()).unwrap();
        let url = Url::parse(&format!("{}/missing.png", server.uri())).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, ImageCacheError::Status(404)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
            .mount(&server)
            .await;

        let config = CacheConfig {
            max_image_bytes: 16,
            ..CacheConfig::default()
        };
        let fetcher = ImageFetcher::new(&config).unwrap();
        let url = Url::parse(&format!("{}/big.png", server.uri())).unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, ImageCacheError::TooLarge { limit: 16, .. }));
    }
}
