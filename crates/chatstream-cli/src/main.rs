//! chatstream - stream a chat completion to the terminal
//!
//! Output text goes to stdout; logs go to stderr (`RUST_LOG`, default `warn`).

mod cli;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use chatstream_core::{strip_code_fence, ChatClient, ClientConfig, StreamHandlers};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let request = cli.build_request()?;
    let client = ChatClient::new(config);

    // Ctrl-C cancels the stream rather than killing the process mid-write
    let signal = CancellationToken::new();
    let interrupt = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling stream");
            interrupt.cancel();
        }
    });

    if cli.aggregate {
        let text = client.complete_aggregated(request, Some(&signal)).await?;
        let text = if cli.strip_fence {
            strip_code_fence(&text)
        } else {
            text
        };
        writeln!(std::io::stdout(), "{}", text).context("Failed to write output")?;
        return Ok(());
    }

    let handlers =
        StreamHandlers::new().on_delta(print_deltas(std::io::stdout(), signal.clone()));
    let handle = client.start_stream_with_signal(request, handlers, Some(&signal))?;
    handle.completion().await?;
    writeln!(std::io::stdout()).context("Failed to write output")?;

    Ok(())
}

/// Delta handler writing to `out`; a failed write (e.g. a closed pipe) cancels the stream
fn print_deltas<W>(mut out: W, signal: CancellationToken) -> impl FnMut(&str) + Send + 'static
where
    W: Write + Send + 'static,
{
    move |delta| {
        if signal.is_cancelled() {
            return;
        }
        let written = out.write_all(delta.as_bytes()).and_then(|()| out.flush());
        if let Err(e) = written {
            debug!("Output closed ({}), cancelling stream", e);
            signal.cancel();
        }
    }
}

/// Config file (explicit, or the default location if present), then environment
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("Could not load --config {}", path.display()))?,
        None => match ClientConfig::default_path() {
            Some(path) => ClientConfig::load_or_default(&path)?,
            None => ClientConfig::default(),
        },
    };

    let config = config.overlay_env(|key| std::env::var(key).ok());
    debug!("Using API base {} and model {}", config.base_url, config.model);
    Ok(config)
}
