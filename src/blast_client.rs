//! Remote BLAST job protocol: submit, poll, fetch.
//!
//! The NCBI URL API multiplexes all three operations over one endpoint,
//! selected by the `CMD` parameter. Submission is a form POST; status and
//! retrieval are GETs against the request identifier (RID) the submission
//! returned.

use crate::error::LookupError;
use serde::{Deserialize, Serialize};
use std::{thread, time::Duration};

pub const DEFAULT_BLAST_URL: &str = "https://blast.ncbi.nlm.nih.gov/Blast.cgi";

/// Fixed submission parameters and polling budget for one client instance.
/// Built once and never mutated; concurrent lookups each carry their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlastConfig {
    pub base_url: String,
    pub program: String,
    pub database: String,
    pub hitlist_size: u32,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for BlastConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BLAST_URL.to_string(),
            program: "blastn".to_string(),
            database: "nt".to_string(),
            hitlist_size: 10,
            poll_interval_secs: 5,
            timeout_secs: 180,
            http_timeout_secs: 60,
        }
    }
}

/// One transport round-trip against the BLAST endpoint.
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: u16,
    pub success: bool,
    pub body: String,
}

/// Transport seam so the protocol logic can be exercised against recorded
/// replies instead of the live NCBI service.
pub trait BlastApi {
    fn post_form(&self, params: &[(&str, &str)]) -> Result<ApiReply, LookupError>;
    fn get_query(&self, params: &[(&str, &str)]) -> Result<ApiReply, LookupError>;
}

pub struct HttpBlastApi {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBlastApi {
    pub fn new(config: &BlastConfig) -> Result<Self, LookupError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| LookupError::transport(format!("could not build BLAST client: {e}")))?;
        Ok(Self {
            base_url: config.base_url.clone(),
            client,
        })
    }

    fn reply(response: reqwest::blocking::Response) -> Result<ApiReply, LookupError> {
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| LookupError::transport(format!("could not read BLAST response body: {e}")))?;
        Ok(ApiReply {
            status: status.as_u16(),
            success: status.is_success(),
            body,
        })
    }
}

impl BlastApi for HttpBlastApi {
    fn post_form(&self, params: &[(&str, &str)]) -> Result<ApiReply, LookupError> {
        let response = self
            .client
            .post(&self.base_url)
            .form(params)
            .send()
            .map_err(|e| LookupError::transport(format!("BLAST request failed: {e}")))?;
        Self::reply(response)
    }

    fn get_query(&self, params: &[(&str, &str)]) -> Result<ApiReply, LookupError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .send()
            .map_err(|e| LookupError::transport(format!("BLAST request failed: {e}")))?;
        Self::reply(response)
    }
}

pub struct BlastClient<T: BlastApi> {
    config: BlastConfig,
    pub(crate) api: T,
}

impl BlastClient<HttpBlastApi> {
    pub fn from_config(config: BlastConfig) -> Result<Self, LookupError> {
        let api = HttpBlastApi::new(&config)?;
        Ok(Self { config, api })
    }
}

impl<T: BlastApi> BlastClient<T> {
    pub fn new(config: BlastConfig, api: T) -> Self {
        Self { config, api }
    }

    pub fn config(&self) -> &BlastConfig {
        &self.config
    }

    /// Submit one cleaned sequence and return the request identifier.
    pub fn submit(&self, sequence: &str) -> Result<String, LookupError> {
        let hitlist_size = self.config.hitlist_size.to_string();
        let reply = self.api.post_form(&[
            ("CMD", "Put"),
            ("PROGRAM", self.config.program.as_str()),
            ("DATABASE", self.config.database.as_str()),
            ("QUERY", sequence),
            ("FORMAT_TYPE", "XML"),
            ("HITLIST_SIZE", hitlist_size.as_str()),
        ])?;
        if !reply.success {
            return Err(LookupError::transport(format!(
                "BLAST submission failed (status={})",
                reply.status
            )));
        }
        for line in reply.body.lines() {
            if !line.contains("RID =") {
                continue;
            }
            if let Some((_, rid)) = line.split_once('=') {
                return Ok(rid.trim().to_string());
            }
        }
        Err(LookupError::protocol("RID not found in BLAST response"))
    }

    /// Block until the remote job reports READY, polling every
    /// `poll_interval_secs` for at most `timeout_secs`.
    pub fn wait_until_ready(&self, rid: &str) -> Result<(), LookupError> {
        self.wait_until_ready_with_sleep(rid, &mut thread::sleep)
    }

    /// Poll loop with an injected sleep so tests can observe attempts and
    /// intervals on a simulated clock.
    pub fn wait_until_ready_with_sleep(
        &self,
        rid: &str,
        sleep: &mut dyn FnMut(Duration),
    ) -> Result<(), LookupError> {
        let interval = self.config.poll_interval_secs.max(1);
        let attempts = self.config.timeout_secs / interval;
        for _ in 0..attempts {
            let reply = self.api.get_query(&[
                ("CMD", "Get"),
                ("RID", rid),
                ("FORMAT_OBJECT", "SearchInfo"),
            ])?;
            if reply.body.contains("Status=READY") {
                return Ok(());
            }
            if reply.body.contains("Status=FAILED") || reply.body.contains("Status=UNKNOWN") {
                return Err(LookupError::remote_job("BLAST search failed or unknown"));
            }
            sleep(Duration::from_secs(interval));
        }
        Err(LookupError::timeout("BLAST timed out"))
    }

    /// Retrieve the raw XML result for a READY job.
    pub fn fetch_result_xml(&self, rid: &str) -> Result<String, LookupError> {
        let reply =
            self.api
                .get_query(&[("CMD", "Get"), ("RID", rid), ("FORMAT_TYPE", "XML")])?;
        if !reply.success {
            return Err(LookupError::transport(format!(
                "BLAST retrieval failed (status={})",
                reply.status
            )));
        }
        Ok(reply.body)
    }
}
