//! Remote similarity search

pub mod ncbi;

pub use ncbi::NcbiBlastClient;

use async_trait::async_trait;
use phylopipe_bio::Sequence;
use phylopipe_core::{PhyloError, PhyloResult, SearchHit};
use reqwest::StatusCode;

#[derive(Debug, Clone)]
pub struct RemoteSearchRequest<'a> {
    /// BLAST program, e.g. `blastp`
    pub program: &'a str,
    pub database: &'a str,
    pub query: &'a [Sequence],
    pub evalue: f64,
    pub max_hits: usize,
}

#[async_trait]
pub trait RemoteSearch: Send + Sync {
    /// Service name used in logs and reports
    fn name(&self) -> &str;

    async fn search(&self, request: &RemoteSearchRequest<'_>) -> PhyloResult<Vec<SearchHit>>;
}

/// Classify a transport-level failure
pub(crate) fn http_error(operation: &str, err: reqwest::Error) -> PhyloError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        PhyloError::transient(format!("{} request failed: {}", operation, err))
    } else if err.is_decode() {
        PhyloError::parse(format!("{} response could not be decoded: {}", operation, err))
    } else {
        PhyloError::ToolFailed {
            tool: operation.to_string(),
            status: "request error".to_string(),
            stderr: err.to_string(),
        }
    }
}

/// Server errors and throttling are worth retrying; other statuses are not
pub(crate) fn status_error(operation: &str, status: StatusCode) -> PhyloError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        PhyloError::transient(format!("{} returned HTTP {}", operation, status))
    } else {
        PhyloError::ToolFailed {
            tool: operation.to_string(),
            status: format!("HTTP {}", status),
            stderr: String::new(),
        }
    }
}
