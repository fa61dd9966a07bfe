//! Retrieval of hit sequences before alignment

use crate::remote::{http_error, status_error};
use crate::runner::ToolRunner;
use crate::types::ToolCommand;
use async_trait::async_trait;
use phylopipe_bio::{parse_fasta_from_bytes, Sequence};
use phylopipe_core::{MoleculeType, PhyloError, PhyloResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// NCBI sequence-id database tags (`sp|P69905.2|HBA_HUMAN`)
const ID_TAGS: &[&str] = &[
    "sp", "tr", "ref", "gb", "emb", "dbj", "pdb", "pir", "prf", "lcl", "gnl",
];

/// Largest id list sent in one efetch request
const EFETCH_BATCH: usize = 200;

/// Accession to look up for a search target id
pub fn accession_of(target_id: &str) -> &str {
    let parts: Vec<&str> = target_id.split('|').filter(|p| !p.is_empty()).collect();
    if parts.len() < 2 {
        return target_id;
    }

    for window in parts.windows(2) {
        if ID_TAGS.contains(&window[0]) {
            return window[1];
        }
    }
    if parts[0] == "gi" {
        return parts[1];
    }
    parts[0]
}

#[async_trait]
pub trait SequenceSource: Send + Sync {
    /// Fetch full sequences for `ids`; ids that cannot be found are left out
    async fn fetch(&self, ids: &[String], molecule: MoleculeType) -> PhyloResult<Vec<Sequence>>;
}

/// Reads entries out of a local BLAST database with `blastdbcmd`
pub struct BlastDbFetcher {
    runner: Arc<dyn ToolRunner>,
    database: PathBuf,
}

impl BlastDbFetcher {
    pub fn new(runner: Arc<dyn ToolRunner>, database: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            database: database.into(),
        }
    }

    pub fn command(&self, ids: &[String], molecule: MoleculeType) -> ToolCommand {
        let entries: Vec<&str> = ids.iter().map(|id| accession_of(id)).collect();
        ToolCommand::new("blastdbcmd")
            .opt("-db", &self.database)
            .opt("-dbtype", if molecule == MoleculeType::Protein { "prot" } else { "nucl" })
            .opt("-entry", entries.join(","))
            .opt("-outfmt", "%f")
    }
}

#[async_trait]
impl SequenceSource for BlastDbFetcher {
    async fn fetch(&self, ids: &[String], molecule: MoleculeType) -> PhyloResult<Vec<Sequence>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let output = self.runner.run(&self.command(ids, molecule)).await?;
        let sequences = parse_fasta_from_bytes(&output.stdout)?;
        tracing::debug!(
            requested = ids.len(),
            fetched = sequences.len(),
            database = %self.database.display(),
            "fetched sequences from local database"
        );
        Ok(sequences)
    }
}

/// NCBI E-utilities `efetch`
pub struct EntrezFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl EntrezFetcher {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> PhyloResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("phylopipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PhyloError::config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SequenceSource for EntrezFetcher {
    async fn fetch(&self, ids: &[String], molecule: MoleculeType) -> PhyloResult<Vec<Sequence>> {
        let mut sequences = Vec::with_capacity(ids.len());

        for batch in ids.chunks(EFETCH_BATCH) {
            let accessions: Vec<&str> = batch.iter().map(|id| accession_of(id)).collect();
            let id_list = accessions.join(",");
            let response = self
                .client
                .get(&self.endpoint)
                .query(&[
                    ("db", molecule.ncbi_db()),
                    ("id", id_list.as_str()),
                    ("rettype", "fasta"),
                    ("retmode", "text"),
                ])
                .send()
                .await
                .map_err(|e| http_error("efetch", e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(status_error("efetch", status));
            }

            let body = response.bytes().await.map_err(|e| http_error("efetch", e))?;
            sequences.extend(parse_fasta_from_bytes(&body)?);
        }

        tracing::debug!(
            requested = ids.len(),
            fetched = sequences.len(),
            "fetched sequences from NCBI"
        );
        Ok(sequences)
    }
}
