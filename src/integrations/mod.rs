// Dynamic external data fetching: credentials, templates, extraction and caching

pub mod cache;
pub mod coerce;
pub mod crypto;
pub mod fetcher;
pub mod import;
pub mod json_path;
pub mod template;
pub mod transport;

pub use fetcher::{DataFetcher, FetchError, FetchOptions, FetchOutcome, TenantScope};
