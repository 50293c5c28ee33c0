use std::{num::NonZeroUsize, path::PathBuf, sync::Mutex};

use bytes::Bytes;
use lru::LruCache;
use reqwest::header::{HeaderMap, HeaderName, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};

use super::{Fetch, NetworkOptions};

pub use reqwest::header::HeaderValue;

/// Controls how [`HttpFetch`] use the HTTP protocol, such as caching.
pub struct HttpOptions {
    /// Path to the directory to store the HTTP cache.
    ///
    /// Keep in mind that some providers (such as OpenStreetMap) require clients
    /// to respect the HTTP `Expires` header.
    /// <https://operations.osmfoundation.org/policies/tiles/>
    ///
    /// This option is ignored in WASM, as HTTP cache is controlled by the
    /// browser the app is running on.
    pub cache: Option<PathBuf>,

    /// User agent to be sent to the tile servers.
    ///
    /// This should be set only on native targets. The browser sets its own user agent on wasm
    /// targets, and trying to set a different one may upset some servers (e.g. MapBox)
    pub user_agent: Option<HeaderValue>,

    /// Maximum number of parallel downloads.
    ///
    /// Many services have rate limits, and exceeding them may result in throttling, bans, or
    /// degraded service. Use the default value when in doubt.
    pub max_parallel_downloads: MaxParallelDownloads,
}

impl Default for HttpOptions {
    fn default() -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        let user_agent = Some(HeaderValue::from_static(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION"),
        )));

        #[cfg(target_arch = "wasm32")]
        let user_agent = None;

        Self {
            cache: None,
            user_agent,
            max_parallel_downloads: MaxParallelDownloads::default(),
        }
    }
}

/// Maximum number of parallel downloads.
pub struct MaxParallelDownloads(pub usize);

impl Default for MaxParallelDownloads {
    /// Default number of parallel downloads. Following modern browsers' behavior.
    /// <https://stackoverflow.com/questions/985431/max-parallel-http-connections-in-a-browser>
    fn default() -> Self {
        Self(6)
    }
}

impl MaxParallelDownloads {
    /// Use custom value.
    ///
    /// Many services have rate limits, and exceeding them may result in throttling, bans, or
    /// degraded service. You are **strongly encouraged** to check the Terms of Use of the
    /// particular provider you are using.
    pub fn value_manually_confirmed_with_provider_limits(value: usize) -> Self {
        Self(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error(transparent)]
    Middleware(#[from] reqwest_middleware::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Clone, Default)]
pub struct HttpStats {
    /// Number of textures that are currently being downloaded.
    pub in_progress: usize,
}

/// Same URL may give different content depending on the headers, e.g. credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoryKey {
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl MemoryKey {
    fn new(url: &str, headers: &HeaderMap) -> Self {
        let mut headers: Vec<_> = headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        headers.sort_by(|(a_name, a_value), (b_name, b_value)| {
            a_name
                .as_str()
                .cmp(b_name.as_str())
                .then_with(|| a_value.as_bytes().cmp(b_value.as_bytes()))
        });

        Self {
            url: url.to_owned(),
            headers,
        }
    }
}

/// Counts a download as in progress for as long as it lives, even if the download is abandoned.
struct InProgress<'a>(&'a Mutex<HttpStats>);

impl<'a> InProgress<'a> {
    fn new(stats: &'a Mutex<HttpStats>) -> Self {
        if let Ok(mut stats) = stats.lock() {
            stats.in_progress += 1;
        }
        Self(stats)
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        if let Ok(mut stats) = self.0.lock() {
            stats.in_progress = stats.in_progress.saturating_sub(1);
        }
    }
}

/// Fetches textures via HTTP, keeping the most recent ones in memory.
pub struct HttpFetch {
    client: ClientWithMiddleware,
    user_agent: Option<HeaderValue>,
    max_parallel_downloads: usize,
    memory: Mutex<LruCache<MemoryKey, Bytes>>,
    stats: Mutex<HttpStats>,
}

impl HttpFetch {
    pub fn new(http_options: HttpOptions) -> Self {
        // Just arbitrary value which seemed right.
        #[allow(clippy::unwrap_used)]
        let cache_size = NonZeroUsize::new(256).unwrap();

        Self {
            client: http_client(&http_options),
            user_agent: http_options.user_agent,
            max_parallel_downloads: http_options.max_parallel_downloads.0,
            memory: Mutex::new(LruCache::new(cache_size)),
            stats: Mutex::new(HttpStats::default()),
        }
    }

    pub fn stats(&self) -> HttpStats {
        if let Ok(stats) = self.stats.lock() {
            stats.clone()
        } else {
            // I really do not want this to return a Result.
            HttpStats::default()
        }
    }

    fn from_memory(&self, key: &MemoryKey) -> Option<Bytes> {
        self.memory.lock().ok()?.get(key).cloned()
    }

    fn put_in_memory(&self, key: MemoryKey, bytes: Bytes) {
        if let Ok(mut memory) = self.memory.lock() {
            memory.put(key, bytes);
        }
    }

    async fn download(&self, url: &str, options: &NetworkOptions) -> Result<Bytes, HttpError> {
        let mut request = self.client.get(url).headers(options.headers.clone());

        if let Some(user_agent) = &self.user_agent {
            request = request.header(USER_AGENT, user_agent.clone());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        log::debug!("Downloaded {url}: {:?}.", response.status());

        Ok(response.error_for_status()?.bytes().await?)
    }
}

impl Default for HttpFetch {
    fn default() -> Self {
        Self::new(HttpOptions::default())
    }
}

impl Fetch for HttpFetch {
    type Error = HttpError;

    async fn fetch(&self, url: &str, options: &NetworkOptions) -> Result<Bytes, Self::Error> {
        let key = MemoryKey::new(url, &options.headers);
        if let Some(bytes) = self.from_memory(&key) {
            log::trace!("Got {url} from memory.");
            return Ok(bytes);
        }

        let bytes = {
            let _in_progress = InProgress::new(&self.stats);
            self.download(url, options).await?
        };

        self.put_in_memory(key, bytes.clone());
        Ok(bytes)
    }

    fn max_concurrency(&self) -> usize {
        self.max_parallel_downloads
    }
}

#[cfg(target_arch = "wasm32")]
fn http_client(_http_options: &HttpOptions) -> ClientWithMiddleware {
    ClientBuilder::new(reqwest::Client::new()).build()
}

#[cfg(not(target_arch = "wasm32"))]
fn http_client(http_options: &HttpOptions) -> ClientWithMiddleware {
    use http_cache_reqwest::{CACacheManager, Cache, CacheMode, HttpCache, HttpCacheOptions};

    let builder = ClientBuilder::new(reqwest::Client::new());

    if let Some(path) = &http_options.cache {
        builder
            .with(Cache(HttpCache {
                mode: CacheMode::Default,
                manager: CACacheManager::new(path.clone(), false),
                options: HttpCacheOptions::default(),
            }))
            .build()
    } else {
        builder.build()
    }
}
