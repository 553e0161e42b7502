//! MCP stdio server binary for BLAST DNA lookups.

use blastq::{about, blast_client::BlastConfig, mcp_server::run_stdio_server};
use std::env;

fn usage() {
    println!(
        "Usage:\n  \
blastq_mcp [--base-url URL] [--timeout SECS] [--help|-h] [--version|-V]\n\n  \
Starts an MCP stdio server with tools:\n  \
  - blast_lookup (submits to NCBI BLAST, blocks until done or timeout)\n  \
  - validate_sequence (offline input validation)\n\n  \
Default endpoint: {default_url}\n",
        default_url = blastq::blast_client::DEFAULT_BLAST_URL
    );
}

fn parse_config(args: &[String]) -> Result<BlastConfig, String> {
    let mut config = BlastConfig::default();
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
            other => {
                return Err(format!("Unknown argument '{other}'. Use --help for usage."));
            }
        }
    }
    Ok(config)
}

fn run() -> Result<(), String> {
    let args = env::args().collect::<Vec<_>>();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        usage();
        return Ok(());
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", about::version_cli_text());
        return Ok(());
    }
    let config = parse_config(&args)?;
    run_stdio_server(&config)
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
