//! Remote ingestion infrastructure

mod http;

pub use http::HttpIngestClient;
