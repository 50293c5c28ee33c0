//! Getting textures from remote sources.
mod fetch;
pub mod http;

pub use fetch::{Fetch, NetworkOptions};
pub use http::{HeaderValue, HttpError, HttpFetch, HttpOptions, HttpStats, MaxParallelDownloads};
