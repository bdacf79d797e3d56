use crate::core::geo::TileKey;

/// Result of asking a tile source for one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Raw encoded image bytes
    Image(Vec<u8>),
    /// The source has no tile at this address; never retried
    NotFound,
    /// Temporary failure worth retrying
    TransientError(String),
}

/// Anything that can produce tile images for `{z}/{x}/{y}` addresses.
///
/// Called from fetch worker threads; implementations block on I/O.
pub trait TileSource: Send + Sync {
    fn fetch(&self, zoom: u8, x: i32, y: i32) -> FetchOutcome;

    /// Short name for logs.
    fn name(&self) -> &str {
        "tile-source"
    }
}

impl<T: TileSource + ?Sized> TileSource for std::sync::Arc<T> {
    fn fetch(&self, zoom: u8, x: i32, y: i32) -> FetchOutcome {
        (**self).fetch(zoom, x, y)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Expands a `{z}/{x}/{y}` URL template, with `{s}` picking a subdomain.
pub fn expand_template(template: &str, subdomains: &[String], key: TileKey) -> String {
    let mut url = template
        .replace("{z}", &key.zoom.to_string())
        .replace("{x}", &key.x.to_string())
        .replace("{y}", &key.y.to_string());

    if url.contains("{s}") {
        let sub = if subdomains.is_empty() {
            String::new()
        } else {
            let idx = (i64::from(key.x) + i64::from(key.y)).rem_euclid(subdomains.len() as i64);
            subdomains[idx as usize].clone()
        };
        url = url.replace("{s}", &sub);
    }
    url
}

#[cfg(feature = "http")]
pub use http::HttpTileSource;

#[cfg(feature = "http")]
mod http {
    use super::{expand_template, FetchOutcome, TileSource};
    use crate::core::config::HttpSourceConfig;
    use crate::core::geo::TileKey;
    use crate::Result;
    use reqwest::blocking::Client;
    use reqwest::StatusCode;
    use std::time::Duration;

    /// Fetches tiles from a standard slippy-map HTTP server.
    pub struct HttpTileSource {
        client: Client,
        config: HttpSourceConfig,
    }

    impl HttpTileSource {
        pub fn new(config: HttpSourceConfig) -> Result<Self> {
            // Public tile servers reject requests without a descriptive User-Agent.
            let client = Client::builder()
                .user_agent(config.user_agent.clone())
                .timeout(Duration::from_millis(config.timeout_ms))
                .build()?;
            Ok(Self { client, config })
        }

        /// OpenStreetMap's standard tile layer.
        pub fn openstreetmap() -> Result<Self> {
            Self::new(HttpSourceConfig::default())
        }

        pub fn url(&self, key: TileKey) -> String {
            expand_template(&self.config.url_template, &self.config.subdomains, key)
        }
    }

    impl TileSource for HttpTileSource {
        fn fetch(&self, zoom: u8, x: i32, y: i32) -> FetchOutcome {
            let url = self.url(TileKey::new(zoom, x, y));
            let response = match self.client.get(&url).send() {
                Ok(response) => response,
                Err(e) => return FetchOutcome::TransientError(e.to_string()),
            };

            let status = response.status();
            if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
                return FetchOutcome::NotFound;
            }
            if !status.is_success() {
                return FetchOutcome::TransientError(format!("HTTP {}", status));
            }

            match response.bytes() {
                Ok(bytes) if bytes.is_empty() => FetchOutcome::NotFound,
                Ok(bytes) => FetchOutcome::Image(bytes.to_vec()),
                Err(e) => FetchOutcome::TransientError(e.to_string()),
            }
        }

        fn name(&self) -> &str {
            &self.config.url_template
        }
    }
}
