//! steadyrpc CLI — exercise resilient RPC endpoints from the terminal.
//!
//! Usage:
//! ```bash
//! # Probe an endpoint
//! steadyrpc test --url https://api.mainnet-beta.solana.com
//!
//! # Send a call through the resilient layer (repeat --url for failover)
//! steadyrpc call --url https://api.mainnet-beta.solana.com \
//!                --url https://solana-rpc.publicnode.com \
//!                --method getSlot
//! ```

use std::env;
use std::process;

use steadyrpc_core::resilient::ResilientConfig;
use steadyrpc_core::transport::RpcTransport;
use steadyrpc_http::{resilient_from_urls, HttpClientConfig, HttpRpcClient};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "test" => cmd_test(&args[2..]).await,
        "call" => cmd_call(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("steadyrpc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("steadyrpc {}", env!("CARGO_PKG_VERSION"));
    println!("Exercise resilient blockchain RPC endpoints\n");
    println!("USAGE:");
    println!("    steadyrpc <COMMAND>\n");
    println!("COMMANDS:");
    println!("    test       Probe a single endpoint (latency, slot)");
    println!("    call       Send a JSON-RPC call through the resilient layer");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("CALL FLAGS:");
    println!("    --url <URL>       Endpoint URL (repeat for failover)  [required]");
    println!("    --method <NAME>   JSON-RPC method name                [required]");
    println!("    --params <JSON>   Params as a JSON array              [default: []]");
}

async fn cmd_test(args: &[String]) -> Result<(), String> {
    let urls = parse_flags(args, "--url");
    let url = urls.first().ok_or("--url is required")?;

    let client =
        HttpRpcClient::default_for(url.clone()).map_err(|e| e.to_string())?;

    println!("Testing {url}...");

    let start = std::time::Instant::now();
    let slot: u64 = client
        .call(1, "getSlot", vec![])
        .await
        .map_err(|e| e.to_string())?;
    let latency = start.elapsed();

    println!("  Status:   OK");
    println!("  Slot:     {slot}");
    println!("  Latency:  {}ms", latency.as_millis());

    Ok(())
}

async fn cmd_call(args: &[String]) -> Result<(), String> {
    let urls = parse_flags(args, "--url");
    if urls.is_empty() {
        return Err("--url is required".into());
    }
    let method = parse_flag(args, "--method").ok_or("--method is required")?;
    let params = match parse_flag(args, "--params") {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(serde_json::Value::Array(items)) => items,
            Ok(_) => return Err("--params must be a JSON array".into()),
            Err(e) => return Err(format!("--params is not valid JSON: {e}")),
        },
        None => vec![],
    };

    let transport = resilient_from_urls(
        urls,
        HttpClientConfig::default(),
        ResilientConfig::default(),
    )
    .map_err(|e| e.to_string())?;

    let value = transport
        .invoke(&method, params)
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());

    let stats = transport.get_stats();
    if stats.total_retries > 0 || stats.total_failovers > 0 {
        eprintln!(
            "(retries: {}, failovers: {})",
            stats.total_retries, stats.total_failovers
        );
    }
    transport.destroy();

    Ok(())
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_flags(args: &[String], flag: &str) -> Vec<String> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| a.as_str() == flag)
        .filter_map(|(i, _)| args.get(i + 1).cloned())
        .collect()
}
