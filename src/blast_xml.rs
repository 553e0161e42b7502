//! NCBI BLAST XML (`BlastOutput`) reduction to a bounded hit summary.
//!
//! Only the fields needed for the top-hit summary are mirrored from the
//! BLAST DTD; numeric-ish fields are kept as raw text so an absent or
//! non-numeric value uniformly falls back to its documented default.

use crate::error::LookupError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const TOP_HIT_CAP: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitSummary {
    pub accession: String,
    pub length: u64,
    pub evalue: f64,
    pub identity_percent: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub query_len: u64,
    pub top_hits: Vec<HitSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "BlastOutput")]
struct BlastOutputXml {
    #[serde(rename = "BlastOutput_query-len")]
    query_len: Option<String>,
    #[serde(rename = "BlastOutput_iterations")]
    iterations: Option<BlastIterationsXml>,
}

#[derive(Debug, Deserialize)]
struct BlastIterationsXml {
    #[serde(rename = "Iteration", default)]
    iterations: Vec<BlastIterationXml>,
}

#[derive(Debug, Deserialize)]
struct BlastIterationXml {
    #[serde(rename = "Iteration_hits")]
    hits: Option<BlastIterationHitsXml>,
}

#[derive(Debug, Deserialize)]
struct BlastIterationHitsXml {
    #[serde(rename = "Hit", default)]
    hits: Vec<BlastHitXml>,
}

#[derive(Debug, Deserialize)]
struct BlastHitXml {
    #[serde(rename = "Hit_def")]
    definition: Option<String>,
    #[serde(rename = "Hit_accession")]
    accession: Option<String>,
    #[serde(rename = "Hit_len")]
    length: Option<String>,
    #[serde(rename = "Hit_hsps")]
    hsps: Option<BlastHitHspsXml>,
}

#[derive(Debug, Deserialize)]
struct BlastHitHspsXml {
    #[serde(rename = "Hsp", default)]
    hsps: Vec<BlastHspXml>,
}

#[derive(Debug, Deserialize)]
struct BlastHspXml {
    #[serde(rename = "Hsp_evalue")]
    evalue: Option<String>,
    #[serde(rename = "Hsp_identity")]
    identity: Option<String>,
    #[serde(rename = "Hsp_align-len")]
    align_len: Option<String>,
}

/// Reduce a raw BLAST XML result to query length plus the first
/// `TOP_HIT_CAP` hits in service rank order. Hits without any alignment
/// sub-record carry nothing to summarize and are skipped.
pub fn parse_top_hits(xml: &str) -> Result<ResultSet> {
    let parsed: BlastOutputXml =
        quick_xml::de::from_str(xml).map_err(|e| anyhow!("Malformed BLAST XML: {e}"))?;

    let query_len = parse_or_default(parsed.query_len.as_deref(), 0u64);
    let top_hits = parsed
        .iterations
        .iter()
        .flat_map(|wrapper| wrapper.iterations.iter())
        .flat_map(|iteration| iteration.hits.iter())
        .flat_map(|wrapper| wrapper.hits.iter())
        .filter_map(summarize_hit)
        .take(TOP_HIT_CAP)
        .collect::<Result<Vec<_>>>()?;

    Ok(ResultSet {
        query_len,
        top_hits,
    })
}

/// Convert the orchestrator-facing error: a reduction failure is always a
/// parse failure from the caller's point of view.
pub fn reduce(xml: &str) -> Result<ResultSet, LookupError> {
    parse_top_hits(xml).map_err(|e| LookupError::parse(e.to_string()))
}

fn summarize_hit(hit: &BlastHitXml) -> Option<Result<HitSummary>> {
    let hsp = hit.hsps.as_ref()?.hsps.first()?;

    let identity = parse_or_default(hsp.identity.as_deref(), 0u64);
    // Absent align-len defaults to 1 so the division stays defined; an
    // explicit zero in the document cannot be summarized.
    let align_len = parse_or_default(hsp.align_len.as_deref(), 1u64);
    if align_len == 0 {
        return Some(Err(anyhow!(
            "Malformed BLAST XML: Hsp_align-len is zero"
        )));
    }
    let identity_percent = round2(identity as f64 / align_len as f64 * 100.0);

    let mut description = hit.definition.as_deref().unwrap_or_default();
    if let Some(stripped) = description.strip_prefix("PREDICTED: ") {
        description = stripped;
    }
    let description = description
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    Some(Ok(HitSummary {
        accession: hit.accession.clone().unwrap_or_default(),
        length: parse_or_default(hit.length.as_deref(), 0u64),
        evalue: parse_or_default(hsp.evalue.as_deref(), 1.0f64),
        identity_percent,
        description,
    }))
}

fn parse_or_default<T: FromStr + Copy>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|text| text.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
