//! Command-line front end for the BLAST lookup pipeline.
//!
//! Prints one JSON object per invocation: either the top-hit summary or an
//! `{"error": ...}` payload, matching the MCP tool output.

use blastq::{
    about,
    blast_client::BlastConfig,
    pipeline,
    sequence::clean_sequence,
};
use serde::Serialize;
use serde_json::json;
use std::{env, fs};

fn usage() {
    eprintln!(
        "Usage:\n  \
  blastq_cli --version\n  \
  blastq_cli [--base-url URL] [--timeout SECS] lookup <SEQUENCE>\n  \
  blastq_cli [--base-url URL] [--timeout SECS] validate <SEQUENCE>\n\n  \
  SEQUENCE is raw or single-record FASTA text. Tip: pass @file.fa to read\n  \
  the sequence from a file."
    );
}

fn load_sequence_arg(value: &str) -> Result<String, String> {
    if let Some(path) = value.strip_prefix('@') {
        fs::read_to_string(path).map_err(|e| format!("Could not read sequence file '{path}': {e}"))
    } else {
        Ok(value.to_string())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Could not serialize JSON output: {e}"))?;
    println!("{text}");
    Ok(())
}

fn run() -> Result<i32, String> {
    let args = env::args().collect::<Vec<_>>();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(0);
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage();
        return Ok(0);
    }

    let mut config = BlastConfig::default();
    let mut positional: Vec<String> = vec![];
    let mut idx = 1usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--base-url" => {
                if idx + 1 >= args.len() {
                    return Err(format!("Missing URL after {}", args[idx]));
                }
                config.base_url = args[idx + 1].clone();
                idx += 2;
            }
            "--timeout" => {
                if idx + 1 >= args.len() {
                    return Err(format!("Missing SECS after {}", args[idx]));
                }
                config.timeout_secs = args[idx + 1]
                    .parse::<u64>()
                    .map_err(|e| format!("Invalid --timeout value '{}': {e}", args[idx + 1]))?;
                idx += 2;
            }
            other if other.starts_with("--") => {
                return Err(format!("Unknown argument '{other}'. Use --help for usage."));
            }
            other => {
                positional.push(other.to_string());
                idx += 1;
            }
        }
    }

    let [command, sequence_arg] = positional.as_slice() else {
        usage();
        return Err("Expected a command and a sequence argument".to_string());
    };
    let raw = load_sequence_arg(sequence_arg)?;

    match command.as_str() {
        "lookup" => {
            let outcome = pipeline::lookup(&raw, &config);
            print_json(&outcome)?;
            Ok(if outcome.is_error() { 1 } else { 0 })
        }
        "validate" => match clean_sequence(&raw) {
            Ok(cleaned) => {
                print_json(&json!({ "sequence": cleaned, "length": cleaned.len() }))?;
                Ok(0)
            }
            Err(err) => {
                print_json(&json!({ "error": err.message }))?;
                Ok(1)
            }
        },
        other => {
            usage();
            Err(format!("Unknown command '{other}'"))
        }
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    }
}
