//! gmeter: HTTP recording/playback proxy.
//!
//! Sits between a client and a target service. `POST /gmeter/record` starts
//! forwarding live traffic and persisting every exchange into a cassette;
//! `POST /gmeter/play` serves a cassette back without touching the target.

mod cassette;
mod cli;
mod config;
mod error;
mod intercept;
mod mode;
mod proxy;
mod server;
mod stats;
mod transport;

use std::sync::Arc;

use clap::Parser;

use cassette::CassetteStore;
use cli::Cli;
use config::{Options, ProxyConfig};
use intercept::{InterceptionTransport, UpstreamOptions};
use server::AppState;
use stats::ProxyStats;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ProxyConfig::load(&cli.config)?;
    cli.apply(&mut config);
    let options = config.validate()?;

    // Build the tokio runtime first; the gRPC exporter needs a reactor context
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let _tracing_guard = gmeter_tracing::init_tracing(&config.tracing);

        tracing::info!(
            config_path = %cli.config.display(),
            listen_address = %options.listen_address,
            target_url = %options.target_url,
            cassette_dir = %options.cassette_dir.display(),
            insecure = options.insecure,
            "Starting gmeter"
        );

        run(options).await
    })
}

async fn run(options: Options) -> anyhow::Result<()> {
    let stats = ProxyStats::new();
    let interceptor = InterceptionTransport::new(
        CassetteStore::new(options.cassette_dir.clone()),
        UpstreamOptions {
            insecure: options.insecure,
            timeout: options.timeout,
        },
        stats.clone(),
    );

    let state = AppState {
        listen_address: options.listen_address,
        target_url: options.target_url,
        interceptor: Arc::new(interceptor),
        stats,
    };

    server::run(state).await
}
