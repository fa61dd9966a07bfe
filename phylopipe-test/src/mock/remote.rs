//! Scripted stand-ins for the NCBI services

use async_trait::async_trait;
use parking_lot::Mutex;
use phylopipe_bio::Sequence;
use phylopipe_core::{MoleculeType, PhyloError, PhyloResult, SearchHit};
use phylopipe_tools::{accession_of, RemoteSearch, RemoteSearchRequest, SequenceSource};
use std::collections::VecDeque;
use std::time::Duration;

/// Remote search returning queued answers, then a default hit list
#[derive(Default)]
pub struct MockRemoteSearch {
    hits: Vec<SearchHit>,
    script: Mutex<VecDeque<PhyloResult<Vec<SearchHit>>>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockRemoteSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }

    pub fn then_fail(mut self, error: PhyloError) -> Self {
        self.script.get_mut().push_back(Err(error));
        self
    }

    pub fn then_return(mut self, hits: Vec<SearchHit>) -> Self {
        self.script.get_mut().push_back(Ok(hits));
        self
    }

    /// Queue `times` transient failures
    pub fn fail_transiently(mut self, times: usize) -> Self {
        for _ in 0..times {
            self = self.then_fail(PhyloError::transient("qblast returned HTTP 503"));
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(program, database)` of every request received
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl RemoteSearch for MockRemoteSearch {
    fn name(&self) -> &str {
        "mock-ncbi"
    }

    async fn search(&self, request: &RemoteSearchRequest<'_>) -> PhyloResult<Vec<SearchHit>> {
        self.requests
            .lock()
            .push((request.program.to_string(), request.database.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(answer) => answer,
            None => Ok(self.hits.clone()),
        }
    }
}

/// Sequence source over an in-memory library
#[derive(Default)]
pub struct MockSequenceSource {
    library: Vec<Sequence>,
    failures: Mutex<VecDeque<PhyloError>>,
    requested: Mutex<Vec<String>>,
}

impl MockSequenceSource {
    pub fn new(library: Vec<Sequence>) -> Self {
        Self {
            library,
            ..Default::default()
        }
    }

    pub fn then_fail(mut self, error: PhyloError) -> Self {
        self.failures.get_mut().push_back(error);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl SequenceSource for MockSequenceSource {
    async fn fetch(&self, ids: &[String], _molecule: MoleculeType) -> PhyloResult<Vec<Sequence>> {
        self.requested.lock().extend(ids.iter().cloned());

        let failure = self.failures.lock().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        let wanted: Vec<&str> = ids.iter().map(|id| accession_of(id)).collect();
        Ok(self
            .library
            .iter()
            .filter(|s| wanted.contains(&accession_of(&s.id)))
            .cloned()
            .collect())
    }
}
