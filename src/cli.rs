//! Command line interface for the `streamwire` binary.
//!
//! Kept free of library types so the build script can render the man page
//! from it.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

/// Command line arguments for the `streamwire` binary.
#[derive(Debug, Parser)]
#[command(
    name = "streamwire",
    version,
    about = "Consume a delimiter-framed HTTP push stream and print each record as a JSON line"
)]
pub struct Cli {
    /// Endpoint name, such as `stream/statuses/sample`.
    #[arg(short, long, required_unless_present_any = ["url", "replay"])]
    pub endpoint: Option<String>,

    /// Stream URL; overrides the endpoint's production URL.
    #[arg(long)]
    pub url: Option<String>,

    /// HTTP method. Defaults to the endpoint's method, or GET with `--url`.
    #[arg(short = 'X', long)]
    pub method: Option<String>,

    /// Request parameter as `key=value`. Repeatable.
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Bearer token sent in the `Authorization` header.
    #[arg(long, env = "STREAMWIRE_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Record delimiter; `\r`, `\n`, `\t` and `\\` escapes are understood.
    #[arg(long, default_value = "\\r\\n")]
    pub delimiter: String,

    /// Fail an attempt when fewer bytes than this arrive per second.
    #[arg(long, value_name = "BYTES")]
    pub low_speed_limit: Option<u64>,

    /// Window over which `--low-speed-limit` is measured.
    #[arg(long, value_name = "SECONDS", default_value_t = 90)]
    pub low_speed_time: u64,

    /// Log statistics every N records; zero disables.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub stats_every: u64,

    /// Override the `User-Agent` header.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Fail on the first error instead of reconnecting.
    #[arg(long)]
    pub no_retries: bool,

    /// Stop after this many records.
    #[arg(long, value_name = "N")]
    pub limit: Option<u64>,

    /// Decode a captured stream body from FILE instead of connecting.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["endpoint", "url"])]
    pub replay: Option<PathBuf>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, value_name = "ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}
