//! `streamwire` command line client.
//!
//! Opens a push stream and prints every record as one JSON line on stdout.
//! Logs go to stderr. Ctrl-C ends the stream gracefully.

mod cli;

use std::{
    error::Error,
    io::{self, Write},
    path::Path,
    time::Duration,
};

use clap::Parser;
use futures::StreamExt;
use streamwire::{
    auth::BearerToken,
    disconnect::LOCAL_ABORT,
    endpoint::EndpointId,
    frame::{DelimitedCodec, Delimiter, FrameConfig},
    record::{Record, RecordClassifier},
    recovery::RecoveryConfig,
    session::{StreamClient, StreamHandle},
    transport::{LowSpeedLimit, Method, ReqwestTransport, StreamRequest},
};
use tokio_util::codec::FramedRead;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    install_metrics(&cli)?;

    let frame = FrameConfig::default().delimiter(Delimiter::from_escaped(&cli.delimiter)?);
    if let Some(path) = &cli.replay {
        return replay(path, &frame, cli.limit).await;
    }

    let (name, request) = stream_request(&cli)?;
    let mut builder = StreamClient::builder()
        .name(name)
        .frame_config(frame)
        .recovery_config(RecoveryConfig::default().retries(!cli.no_retries))
        .stats_every(cli.stats_every);
    if let Some(agent) = &cli.user_agent {
        builder = builder.user_agent(agent.clone());
    }
    if let Some(token) = &cli.bearer_token {
        builder = builder.authenticator(BearerToken::new(token.clone())?);
    }

    let mut transport = ReqwestTransport::builder();
    if let Some(bytes) = cli.low_speed_limit {
        transport = transport.low_speed_limit(LowSpeedLimit::new(
            bytes,
            Duration::from_secs(cli.low_speed_time),
        ));
    }
    let mut client = builder.build(transport.build()?);

    let handle = client.handle();
    tokio::spawn(abort_on_ctrl_c(handle.clone()));

    let limit = cli.limit;
    let mut stdout = io::stdout();
    let mut printed: u64 = 0;
    let outcome = client
        .open_stream(request, |record| {
            if let Err(err) = emit(&mut stdout, &record) {
                log::warn!("cannot write record: {err}");
                handle.request_abort(LOCAL_ABORT, "output closed");
                return;
            }
            printed += 1;
            if limit.is_some_and(|limit| printed >= limit) {
                handle.request_abort(LOCAL_ABORT, "record limit reached");
            }
        })
        .await;

    log::info!("{}", handle.stats());
    match outcome {
        Ok(termination) => {
            log::info!("stream finished: {termination:?}");
            Ok(())
        }
        Err(err) => {
            let partial = err.partial_record();
            if !partial.is_empty() {
                log::error!(
                    "unterminated record at failure: {}",
                    String::from_utf8_lossy(partial)
                );
            }
            Err(err.into())
        }
    }
}

fn stream_request(cli: &Cli) -> Result<(String, StreamRequest), Box<dyn Error>> {
    let endpoint = cli
        .endpoint
        .as_deref()
        .map(str::parse::<EndpointId>)
        .transpose()?;
    let url = match (&cli.url, endpoint) {
        (Some(url), _) => url.clone(),
        (None, Some(id)) => id.endpoint().url(),
        (None, None) => return Err("either --endpoint or --url is required".into()),
    };
    let method = match &cli.method {
        Some(method) => method.parse::<Method>()?,
        None => endpoint.map_or(Method::Get, |id| id.endpoint().method),
    };
    let name = endpoint.map_or_else(|| "stream".to_owned(), EndpointId::name);
    let request = cli
        .params
        .iter()
        .fold(StreamRequest::new(method, url), |request, (key, value)| {
            request.param(key.clone(), value.clone())
        });
    Ok((name, request))
}

async fn replay(path: &Path, frame: &FrameConfig, limit: Option<u64>) -> Result<(), Box<dyn Error>> {
    let file = tokio::fs::File::open(path).await?;
    let mut frames = FramedRead::new(file, DelimitedCodec::new(frame));
    let classifier = RecordClassifier::default();
    let mut stdout = io::stdout();
    let mut printed: u64 = 0;

    while let Some(item) = frames.next().await {
        match classifier.classify(&item?) {
            Ok(record) => emit(&mut stdout, &record)?,
            Err(err) => {
                log::warn!("skipping malformed record: {err}");
                continue;
            }
        }
        printed += 1;
        if limit.is_some_and(|limit| printed >= limit) {
            break;
        }
    }
    let codec = frames.decoder();
    log::info!(
        "replayed {printed} records ({} frames, {} keep-alives)",
        codec.frames(),
        codec.keep_alives()
    );
    Ok(())
}

fn emit(out: &mut impl Write, record: &Record) -> io::Result<()> {
    serde_json::to_writer(&mut *out, record.value()).map_err(io::Error::from)?;
    out.write_all(b"\n")
}

async fn abort_on_ctrl_c(handle: StreamHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        log::info!("interrupt received, closing {}", handle.name());
        handle.request_abort(LOCAL_ABORT, "interrupted");
    }
}

#[cfg(feature = "metrics")]
fn install_metrics(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if let Some(addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        log::info!("serving metrics on {addr}");
    }
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if cli.metrics_addr.is_some() {
        log::warn!("built without the metrics feature; ignoring --metrics-addr");
    }
    Ok(())
}
