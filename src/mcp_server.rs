//! Minimal MCP stdio server adapter.
//!
//! Exposes the lookup pipeline as machine-invocable tools so the same
//! contract that backs the CLI is reachable from MCP clients. Messages are
//! `Content-Length`-framed JSON-RPC over stdin/stdout.

use crate::{
    about,
    blast_client::BlastConfig,
    pipeline::{self, LookupOutcome},
    sequence::clean_sequence,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::{self, BufRead, BufReader, BufWriter, Write};

const MCP_PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "blastq_mcp";
const SERVER_TITLE: &str = "BLAST DNA Search";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchOutcome {
    NoResponse,
    Response,
    Exit,
}

#[derive(Debug, Clone, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub fn run_stdio_server(config: &BlastConfig) -> Result<(), String> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = BufReader::new(stdin.lock());
    let mut writer = BufWriter::new(stdout.lock());
    run_server_loop(config, &mut reader, &mut writer)
}

fn run_server_loop<R: BufRead, W: Write>(
    config: &BlastConfig,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), String> {
    loop {
        let Some(message) = read_framed_json(reader)? else {
            return Ok(());
        };
        match handle_message(config, &message, writer)? {
            DispatchOutcome::NoResponse => {}
            DispatchOutcome::Response => {}
            DispatchOutcome::Exit => return Ok(()),
        }
    }
}

fn read_framed_json<R: BufRead>(reader: &mut R) -> Result<Option<Value>, String> {
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader
            .read_line(&mut line)
            .map_err(|e| format!("Could not read MCP header line: {e}"))?;
        if bytes_read == 0 {
            return if content_length.is_some() {
                Err("Unexpected EOF while reading MCP headers".to_string())
            } else {
                Ok(None)
            };
        }
        let line_trimmed = line.trim_end_matches(['\r', '\n']);
        if line_trimmed.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }
        if let Some(value) = line_trimmed.strip_prefix("Content-Length:") {
            let len = value
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("Invalid Content-Length header '{line_trimmed}': {e}"))?;
            content_length = Some(len);
        }
    }

    let len = content_length.ok_or_else(|| "Missing Content-Length header".to_string())?;
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .map_err(|e| format!("Could not read MCP JSON payload body: {e}"))?;
    serde_json::from_slice::<Value>(&body)
        .map(Some)
        .map_err(|e| format!("Could not parse MCP JSON payload: {e}"))
}

fn write_framed_json<W: Write>(writer: &mut W, payload: &Value) -> Result<(), String> {
    let body = serde_json::to_vec(payload)
        .map_err(|e| format!("Could not serialize MCP response JSON: {e}"))?;
    writer
        .write_all(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes())
        .map_err(|e| format!("Could not write MCP response header: {e}"))?;
    writer
        .write_all(&body)
        .map_err(|e| format!("Could not write MCP response body: {e}"))?;
    writer
        .flush()
        .map_err(|e| format!("Could not flush MCP response stream: {e}"))?;
    Ok(())
}

fn tool_list() -> Value {
    json!([
        {
            "name": "blast_lookup",
            "title": "BLAST Lookup",
            "description": "Submit one DNA sequence to NCBI BLAST (blastn/nt) and return the top hits as structured JSON. Blocks until the remote search finishes or times out.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sequence": {
                        "type": "string",
                        "description": "DNA sequence, raw or single-record FASTA."
                    }
                },
                "required": ["sequence"],
                "additionalProperties": false
            }
        },
        {
            "name": "validate_sequence",
            "title": "Validate Sequence",
            "description": "Validate and canonicalize one DNA sequence without contacting NCBI.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "sequence": {
                        "type": "string",
                        "description": "DNA sequence, raw or single-record FASTA."
                    }
                },
                "required": ["sequence"],
                "additionalProperties": false
            }
        }
    ])
}

fn jsonrpc_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn jsonrpc_error(id: Option<Value>, code: i64, message: &str, data: Option<Value>) -> Value {
    let mut error = json!({
        "code": code,
        "message": message
    });
    if let Some(data) = data {
        error["data"] = data;
    }
    json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "error": error
    })
}

fn tool_result_text(text: String, is_error: bool) -> Value {
    json!({
        "content": [
            {
                "type": "text",
                "text": text
            }
        ],
        "isError": is_error
    })
}

fn tool_result_json(value: Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
    json!({
        "content": [
            {
                "type": "text",
                "text": text
            }
        ],
        "structuredContent": value,
        "isError": is_error
    })
}

fn sequence_from_args(arguments: &Value) -> Result<String, String> {
    arguments
        .as_object()
        .and_then(|args| args.get("sequence"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "tool requires a string 'sequence' argument".to_string())
}

fn blast_lookup_tool_result(config: &BlastConfig, arguments: &Value) -> Value {
    let sequence = match sequence_from_args(arguments) {
        Ok(sequence) => sequence,
        Err(err) => return tool_result_text(err, true),
    };
    let outcome: LookupOutcome = pipeline::lookup(&sequence, config);
    let is_error = outcome.is_error();
    match serde_json::to_value(&outcome) {
        Ok(value) => tool_result_json(value, is_error),
        Err(err) => tool_result_text(format!("Could not serialize lookup outcome: {err}"), true),
    }
}

fn validate_sequence_tool_result(arguments: &Value) -> Value {
    let sequence = match sequence_from_args(arguments) {
        Ok(sequence) => sequence,
        Err(err) => return tool_result_text(err, true),
    };
    match clean_sequence(&sequence) {
        Ok(cleaned) => tool_result_json(
            json!({ "sequence": cleaned, "length": cleaned.len() }),
            false,
        ),
        Err(err) => tool_result_json(json!({ "error": err.message }), true),
    }
}

fn tool_call_result(config: &BlastConfig, params: ToolCallParams) -> Value {
    match params.name.trim() {
        "blast_lookup" => blast_lookup_tool_result(config, &params.arguments),
        "validate_sequence" => validate_sequence_tool_result(&params.arguments),
        other => tool_result_text(format!("Unknown MCP tool '{other}'"), true),
    }
}

fn write_response<W: Write>(writer: &mut W, value: Value) -> Result<DispatchOutcome, String> {
    write_framed_json(writer, &value)?;
    Ok(DispatchOutcome::Response)
}

fn handle_message<W: Write>(
    config: &BlastConfig,
    message: &Value,
    writer: &mut W,
) -> Result<DispatchOutcome, String> {
    let Some(obj) = message.as_object() else {
        return write_response(
            writer,
            jsonrpc_error(None, -32600, "Invalid Request: expected JSON object", None),
        );
    };
    let id = obj.get("id").cloned();
    let Some(method) = obj.get("method").and_then(Value::as_str) else {
        return write_response(
            writer,
            jsonrpc_error(
                id,
                -32600,
                "Invalid Request: missing method field",
                Some(message.clone()),
            ),
        );
    };

    match method {
        "initialize" => {
            let Some(id) = id else {
                return write_response(
                    writer,
                    jsonrpc_error(None, -32600, "Invalid Request: initialize requires id", None),
                );
            };
            let result = json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {
                        "listChanged": false
                    }
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "title": SERVER_TITLE,
                    "version": about::DISPLAY_VERSION
                }
            });
            write_response(writer, jsonrpc_response(id, result))
        }
        "notifications/initialized" => Ok(DispatchOutcome::NoResponse),
        "ping" => {
            if let Some(id) = id {
                write_response(writer, jsonrpc_response(id, json!({})))
            } else {
                Ok(DispatchOutcome::NoResponse)
            }
        }
        "tools/list" => {
            let Some(id) = id else {
                return Ok(DispatchOutcome::NoResponse);
            };
            write_response(writer, jsonrpc_response(id, json!({ "tools": tool_list() })))
        }
        "tools/call" => {
            let Some(id) = id else {
                return Ok(DispatchOutcome::NoResponse);
            };
            let params = obj.get("params").cloned().unwrap_or_else(|| json!({}));
            let call = match serde_json::from_value::<ToolCallParams>(params) {
                Ok(call) => call,
                Err(err) => {
                    return write_response(
                        writer,
                        jsonrpc_error(
                            Some(id),
                            -32602,
                            "Invalid params for tools/call",
                            Some(json!({ "details": err.to_string() })),
                        ),
                    );
                }
            };
            let result = tool_call_result(config, call);
            write_response(writer, jsonrpc_response(id, result))
        }
        "shutdown" => {
            if let Some(id) = id {
                write_response(writer, jsonrpc_response(id, json!({})))
            } else {
                Ok(DispatchOutcome::NoResponse)
            }
        }
        "exit" => Ok(DispatchOutcome::Exit),
        _ => {
            if id.is_none() {
                return Ok(DispatchOutcome::NoResponse);
            }
            write_response(
                writer,
                jsonrpc_error(id, -32601, &format!("Method '{method}' not found"), None),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame(value: &Value) -> Vec<u8> {
        let body = serde_json::to_vec(value).expect("serialize test message");
        let mut bytes = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        bytes.extend(body);
        bytes
    }

    fn read_response_body(buffer: &[u8]) -> Value {
        let text = String::from_utf8(buffer.to_vec()).expect("utf8 response");
        let marker = "\r\n\r\n";
        let idx = text.find(marker).expect("response header separator");
        let body = &text[idx + marker.len()..];
        serde_json::from_str(body).expect("response body json")
    }

    fn run_single(request: Value) -> Value {
        let config = BlastConfig::default();
        let mut reader = Cursor::new(frame(&request));
        let mut writer = Vec::<u8>::new();
        run_server_loop(&config, &mut reader, &mut writer).expect("server loop");
        read_response_body(&writer)
    }

    #[test]
    fn initialize_and_tools_list_roundtrip() {
        let init = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": MCP_PROTOCOL_VERSION
            }
        });
        let list = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/list",
            "params": {}
        });
        let mut input = frame(&init);
        input.extend(frame(&list));
        let config = BlastConfig::default();
        let mut reader = Cursor::new(input);
        let mut writer = Vec::<u8>::new();

        run_server_loop(&config, &mut reader, &mut writer).expect("server loop");

        let output = String::from_utf8(writer).expect("utf8 output");
        let parts = output
            .split("Content-Length:")
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn tools_list_names_both_tools() {
        let response = run_single(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/list",
            "params": {}
        }));
        let names: Vec<&str> = response
            .pointer("/result/tools")
            .and_then(Value::as_array)
            .expect("tools array")
            .iter()
            .filter_map(|tool| tool.get("name").and_then(Value::as_str))
            .collect();
        assert_eq!(names, vec!["blast_lookup", "validate_sequence"]);
    }

    #[test]
    fn validate_sequence_tool_returns_cleaned_sequence() {
        let response = run_single(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {
                "name": "validate_sequence",
                "arguments": { "sequence": ">q\nag tc" }
            }
        }));
        let cleaned = response
            .pointer("/result/structuredContent/sequence")
            .and_then(Value::as_str)
            .unwrap_or_default();
        assert_eq!(cleaned, "AGTC");
        let is_error = response
            .pointer("/result/isError")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        assert!(!is_error);
    }

    #[test]
    fn validate_sequence_tool_reports_invalid_input_as_error_payload() {
        let response = run_single(json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {
                "name": "validate_sequence",
                "arguments": { "sequence": "AGTCXQ" }
            }
        }));
        let is_error = response
            .pointer("/result/isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        assert!(is_error);
        let message = response
            .pointer("/result/structuredContent/error")
            .and_then(Value::as_str)
            .unwrap_or_default();
        assert_eq!(message, "Invalid characters in sequence: Q, X");
    }

    #[test]
    fn tools_call_unknown_tool_returns_tool_error_payload() {
        let response = run_single(json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "tools/call",
            "params": {
                "name": "unknown_tool",
                "arguments": {}
            }
        }));
        let is_error = response
            .pointer("/result/isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        assert!(is_error);
    }

    #[test]
    fn tools_call_without_name_is_invalid_params() {
        let response = run_single(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": { "arguments": {} }
        }));
        let code = response
            .pointer("/error/code")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        assert_eq!(code, -32602);
    }

    #[test]
    fn unknown_method_with_id_is_method_not_found() {
        let response = run_single(json!({
            "jsonrpc": "2.0",
            "id": 8,
            "method": "no/such/method",
            "params": {}
        }));
        let code = response
            .pointer("/error/code")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        assert_eq!(code, -32601);
    }
}
