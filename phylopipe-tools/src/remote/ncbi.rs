//! NCBI QBLAST URL API client
//!
//! A search is three round trips: `CMD=Put` submits the query and returns a
//! request id (RID), `CMD=Get&FORMAT_OBJECT=SearchInfo` is polled until the
//! status leaves `WAITING`, and a final `CMD=Get` downloads tabular hits.

use super::{http_error, status_error, RemoteSearch, RemoteSearchRequest};
use async_trait::async_trait;
use phylopipe_bio::formats::fasta::write_fasta_to_writer;
use phylopipe_bio::formats::tabular::parse_tabular;
use phylopipe_core::config::settings::RemoteSettings;
use phylopipe_core::{PhyloError, PhyloResult, SearchHit};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    Waiting,
    Ready { has_hits: bool },
    Failed,
    /// RID expired or never existed
    Unknown,
}

pub struct NcbiBlastClient {
    client: reqwest::Client,
    endpoint: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl NcbiBlastClient {
    pub fn new(
        endpoint: impl Into<String>,
        poll_interval: Duration,
        max_wait: Duration,
        request_timeout: Duration,
    ) -> PhyloResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("phylopipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PhyloError::config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            poll_interval,
            max_wait,
        })
    }

    pub fn from_settings(settings: &RemoteSettings) -> PhyloResult<Self> {
        Self::new(
            settings.endpoint.clone(),
            settings.poll_interval(),
            settings.max_wait(),
            settings.request_timeout(),
        )
    }

    /// Submit a search; returns the RID and NCBI's estimated seconds to completion
    pub async fn submit(&self, request: &RemoteSearchRequest<'_>) -> PhyloResult<(String, Option<u64>)> {
        let mut query = Vec::new();
        write_fasta_to_writer(&mut query, request.query)?;
        let query = String::from_utf8_lossy(&query).into_owned();

        let expect = request.evalue.to_string();
        let hitlist = request.max_hits.to_string();
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[
                ("CMD", "Put"),
                ("PROGRAM", request.program),
                ("DATABASE", request.database),
                ("QUERY", query.as_str()),
                ("EXPECT", expect.as_str()),
                ("HITLIST_SIZE", hitlist.as_str()),
            ])
            .send()
            .await
            .map_err(|e| http_error("qblast submit", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error("qblast submit", status));
        }
        let body = response
            .text()
            .await
            .map_err(|e| http_error("qblast submit", e))?;

        let (rid, rtoe) = parse_qblast_info(&body).ok_or_else(|| {
            PhyloError::parse("qblast submit response carries no request id")
        })?;
        tracing::info!(rid = %rid, rtoe = ?rtoe, "submitted remote search");
        Ok((rid, rtoe))
    }

    pub async fn status(&self, rid: &str) -> PhyloResult<SearchStatus> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("CMD", "Get"), ("FORMAT_OBJECT", "SearchInfo"), ("RID", rid)])
            .send()
            .await
            .map_err(|e| http_error("qblast status", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error("qblast status", status));
        }
        let body = response
            .text()
            .await
            .map_err(|e| http_error("qblast status", e))?;

        parse_status(&body)
            .ok_or_else(|| PhyloError::parse(format!("no status for request {}", rid)))
    }

    pub async fn fetch_results(&self, rid: &str, max_hits: usize) -> PhyloResult<String> {
        let hitlist = max_hits.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("CMD", "Get"),
                ("RID", rid),
                ("FORMAT_TYPE", "Tabular"),
                ("ALIGNMENT_VIEW", "Tabular"),
                ("FORMAT_OBJECT", "Alignment"),
                ("HITLIST_SIZE", hitlist.as_str()),
            ])
            .send()
            .await
            .map_err(|e| http_error("qblast results", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error("qblast results", status));
        }
        let body = response
            .text()
            .await
            .map_err(|e| http_error("qblast results", e))?;
        Ok(strip_markup(&body))
    }

    async fn wait_until_done(&self, rid: &str, rtoe: Option<u64>) -> PhyloResult<bool> {
        let started = Instant::now();

        // Nothing is ready before the estimate, but never sleep past the deadline
        if let Some(seconds) = rtoe {
            let first = Duration::from_secs(seconds).min(self.max_wait);
            tokio::time::sleep(first).await;
        }

        loop {
            match self.status(rid).await? {
                SearchStatus::Ready { has_hits } => return Ok(has_hits),
                SearchStatus::Failed => {
                    return Err(PhyloError::ToolFailed {
                        tool: "qblast".to_string(),
                        status: "FAILED".to_string(),
                        stderr: format!("remote search {} failed", rid),
                    })
                }
                SearchStatus::Unknown => {
                    return Err(PhyloError::ToolFailed {
                        tool: "qblast".to_string(),
                        status: "UNKNOWN".to_string(),
                        stderr: format!("remote search {} expired or is unknown", rid),
                    })
                }
                SearchStatus::Waiting => {
                    if started.elapsed() >= self.max_wait {
                        return Err(PhyloError::transient(format!(
                            "remote search {} still pending after {}s",
                            rid,
                            self.max_wait.as_secs()
                        )));
                    }
                    tracing::debug!(rid = %rid, "remote search pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[async_trait]
impl RemoteSearch for NcbiBlastClient {
    fn name(&self) -> &str {
        "ncbi"
    }

    async fn search(&self, request: &RemoteSearchRequest<'_>) -> PhyloResult<Vec<SearchHit>> {
        let (rid, rtoe) = self.submit(request).await?;
        if !self.wait_until_done(&rid, rtoe).await? {
            tracing::info!(rid = %rid, "remote search finished without hits");
            return Ok(Vec::new());
        }
        let text = self.fetch_results(&rid, request.max_hits).await?;
        parse_tabular(&text)
    }
}

fn info_value<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    body.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| v.trim())
    })
}

/// `RID` and `RTOE` from the QBlastInfo block of a submit response
pub fn parse_qblast_info(body: &str) -> Option<(String, Option<u64>)> {
    let rid = info_value(body, "RID").filter(|r| !r.is_empty())?;
    let rtoe = info_value(body, "RTOE").and_then(|v| v.parse().ok());
    Some((rid.to_string(), rtoe))
}

pub fn parse_status(body: &str) -> Option<SearchStatus> {
    let status = match info_value(body, "Status")? {
        "WAITING" => SearchStatus::Waiting,
        "READY" => SearchStatus::Ready {
            has_hits: info_value(body, "ThereAreHits") == Some("yes"),
        },
        "FAILED" => SearchStatus::Failed,
        _ => SearchStatus::Unknown,
    };
    Some(status)
}

/// Tabular results may come wrapped in HTML; keep only data and comment lines
fn strip_markup(body: &str) -> String {
    body.lines()
        .filter(|line| !line.trim_start().starts_with('<'))
        .collect::<Vec<_>>()
        .join("\n")
}
