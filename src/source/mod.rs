// Network abstraction: manifests and asset bodies come in through a
// pluggable GET seam.

pub mod http_fetcher;
pub mod traits;

pub use http_fetcher::HttpFetcher;
pub use traits::{AssetFetcher, AssetStream, FetchResponse};
