//! The lookup pipeline: normalize, submit, poll, fetch, reduce.
//!
//! This is the single recovery boundary. Whatever any stage raises, the
//! caller always receives one JSON-shaped value: a full `ResultSet` or an
//! `ErrorPayload`, never a mix of the two.

use crate::{
    blast_client::{BlastApi, BlastClient, BlastConfig, HttpBlastApi},
    blast_xml::{self, ResultSet},
    error::LookupError,
    sequence::clean_sequence,
};
use serde::{Deserialize, Serialize};

/// Longest query accepted before submission, in base pairs.
pub const MAX_QUERY_LEN: usize = 3000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LookupOutcome {
    Results(ResultSet),
    Error(ErrorPayload),
}

impl LookupOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<LookupError> for LookupOutcome {
    fn from(err: LookupError) -> Self {
        Self::Error(ErrorPayload {
            error: err.message,
        })
    }
}

/// Run the full pipeline against an already-constructed client.
pub fn lookup_with_client<T: BlastApi>(raw: &str, client: &BlastClient<T>) -> LookupOutcome {
    match run_stages(raw, client) {
        Ok(results) => LookupOutcome::Results(results),
        Err(err) => err.into(),
    }
}

/// Run the full pipeline against the live NCBI endpoint described by
/// `config`. Blocks for up to the configured polling budget.
pub fn lookup(raw: &str, config: &BlastConfig) -> LookupOutcome {
    match BlastClient::<HttpBlastApi>::from_config(config.clone()) {
        Ok(client) => lookup_with_client(raw, &client),
        Err(err) => err.into(),
    }
}

fn run_stages<T: BlastApi>(raw: &str, client: &BlastClient<T>) -> Result<ResultSet, LookupError> {
    let sequence = clean_sequence(raw)?;
    if sequence.len() > MAX_QUERY_LEN {
        return Err(LookupError::validation(format!(
            "Sequence too long (max {MAX_QUERY_LEN} bp)"
        )));
    }
    let rid = client.submit(&sequence)?;
    client.wait_until_ready(&rid)?;
    let xml = client.fetch_result_xml(&rid)?;
    blast_xml::reduce(&xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blast_client::tests::{ScriptedApi, ok_reply};
    use serde_json::json;

    fn client_with(replies: Vec<crate::blast_client::ApiReply>) -> BlastClient<ScriptedApi> {
        BlastClient::new(BlastConfig::default(), ScriptedApi::new(replies))
    }

    const RESULT_XML: &str = "<?xml version=\"1.0\"?><BlastOutput>\
        <BlastOutput_query-len>4</BlastOutput_query-len>\
        <BlastOutput_iterations><Iteration><Iteration_hits>\
        <Hit><Hit_def>Homo sapiens gene X, variant</Hit_def>\
        <Hit_accession>NM_1</Hit_accession><Hit_len>44</Hit_len>\
        <Hit_hsps><Hsp><Hsp_evalue>0.5</Hsp_evalue>\
        <Hsp_identity>4</Hsp_identity><Hsp_align-len>4</Hsp_align-len>\
        </Hsp></Hit_hsps></Hit>\
        </Iteration_hits></Iteration></BlastOutput_iterations></BlastOutput>";

    #[test]
    fn test_happy_path_end_to_end() {
        let client = client_with(vec![
            ok_reply("RID = TESTRID42\n"),
            ok_reply("Status=READY"),
            ok_reply(RESULT_XML),
        ]);
        let outcome = lookup_with_client(">q\nag tc", &client);
        let LookupOutcome::Results(results) = outcome else {
            panic!("expected results, got {outcome:?}");
        };
        assert_eq!(results.query_len, 4);
        assert_eq!(results.top_hits.len(), 1);
        assert_eq!(results.top_hits[0].description, "Homo sapiens gene X");
        assert_eq!(client.api.call_count(), 3);
    }

    #[test]
    fn test_too_long_sequence_short_circuits_before_any_network_call() {
        let raw = "A".repeat(MAX_QUERY_LEN + 1);
        let client = client_with(vec![]);
        let outcome = lookup_with_client(&raw, &client);
        assert_eq!(
            outcome,
            LookupOutcome::Error(ErrorPayload {
                error: "Sequence too long (max 3000 bp)".to_string()
            })
        );
        assert_eq!(client.api.call_count(), 0);
    }

    #[test]
    fn test_exactly_max_length_is_submitted() {
        let raw = "A".repeat(MAX_QUERY_LEN);
        let client = client_with(vec![
            ok_reply("RID = X\n"),
            ok_reply("Status=READY"),
            ok_reply(RESULT_XML),
        ]);
        let outcome = lookup_with_client(&raw, &client);
        assert!(!outcome.is_error(), "{outcome:?}");
    }

    #[test]
    fn test_validation_failure_becomes_error_payload() {
        let client = client_with(vec![]);
        let outcome = lookup_with_client("AGTCXQ", &client);
        assert_eq!(
            outcome,
            LookupOutcome::Error(ErrorPayload {
                error: "Invalid characters in sequence: Q, X".to_string()
            })
        );
    }

    #[test]
    fn test_remote_failure_becomes_error_payload() {
        let client = client_with(vec![
            ok_reply("RID = TESTRID42\n"),
            ok_reply("Status=FAILED"),
        ]);
        let outcome = lookup_with_client("AGTC", &client);
        assert_eq!(
            outcome,
            LookupOutcome::Error(ErrorPayload {
                error: "BLAST search failed or unknown".to_string()
            })
        );
    }

    #[test]
    fn test_unparseable_result_becomes_error_payload() {
        let client = client_with(vec![
            ok_reply("RID = TESTRID42\n"),
            ok_reply("Status=READY"),
            ok_reply("garbage <<<"),
        ]);
        let outcome = lookup_with_client("AGTC", &client);
        let LookupOutcome::Error(payload) = outcome else {
            panic!("expected error payload");
        };
        assert!(payload.error.contains("Malformed BLAST XML"));
    }

    #[test]
    fn test_outcome_json_shapes() {
        let ok = lookup_with_client(
            "AGTC",
            &client_with(vec![
                ok_reply("RID = R\n"),
                ok_reply("Status=READY"),
                ok_reply(RESULT_XML),
            ]),
        );
        let value = serde_json::to_value(&ok).expect("serialize outcome");
        assert!(value.get("query_len").is_some());
        assert!(value.get("error").is_none());

        let err = lookup_with_client("", &client_with(vec![]));
        let value = serde_json::to_value(&err).expect("serialize outcome");
        assert_eq!(value, json!({ "error": "Input is empty" }));
    }
}
