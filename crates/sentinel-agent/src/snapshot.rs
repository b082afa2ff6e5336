//! Fetches the server's current resources.

use crate::error::{AgentError, Result};
use reqwest::{StatusCode, Url};
use sentinel_types::Resource;

/// Client of the operator's `<endpoint>/resources` route.
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    url: Url,
    http: reqwest::Client,
}

impl SnapshotClient {
    /// Client for the stream at `endpoint`, authenticated as `apikey` on
    /// `project`.
    pub fn new(endpoint: &str, apikey: &str, project: &str) -> Result<Self> {
        let base = endpoint.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/resources"))
            .map_err(|e| AgentError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("apikey", apikey)
            .append_pair("project", project);

        Ok(Self {
            url,
            http: reqwest::Client::new(),
        })
    }

    /// Snapshot URL including credentials.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Every resource the server holds for the project.
    pub async fn fetch(&self) -> Result<Vec<Resource>> {
        let response = self.http.get(self.url.clone()).send().await?;
        if response.status() != StatusCode::OK {
            return Err(AgentError::UnexpectedStatus(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}
