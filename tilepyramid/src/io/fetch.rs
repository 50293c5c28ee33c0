use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;

/// Per-layer options passed along with every fetch.
#[derive(Debug, Clone, Default)]
pub struct NetworkOptions {
    /// Extra headers, e.g. authorization required by the imagery provider.
    pub headers: HeaderMap,

    /// Give up on a single texture after this long. Ignored in WASM.
    pub timeout: Option<Duration>,
}

/// Source of raw, still encoded textures.
pub trait Fetch {
    type Error: std::error::Error + Sync + Send;

    #[cfg(target_arch = "wasm32")]
    fn fetch(
        &self,
        url: &str,
        options: &NetworkOptions,
    ) -> impl Future<Output = Result<Bytes, Self::Error>>;

    #[cfg(not(target_arch = "wasm32"))]
    fn fetch(
        &self,
        url: &str,
        options: &NetworkOptions,
    ) -> impl Future<Output = Result<Bytes, Self::Error>> + Send;

    /// How many fetches may be in flight at once.
    fn max_concurrency(&self) -> usize;
}
