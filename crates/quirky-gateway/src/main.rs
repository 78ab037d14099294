use clap::Parser;
use quirky_core::config::QuirkyConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod app;
mod capture;
mod http;
mod ws;

/// Live HTTP request visualizer: every request this server receives is
/// streamed to the viewers connected at `/stream`.
#[derive(Debug, Parser)]
#[command(name = "quirky-gateway", version, about)]
struct Cli {
    /// Verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Port to listen on (overrides config).
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind (overrides config).
    #[arg(long)]
    bind: Option<String>,

    /// Path to quirky.toml.
    #[arg(long, env = "QUIRKY_CONFIG")]
    config: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut QuirkyConfig) {
        config.verbose |= self.verbose;
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref bind) = self.bind {
            config.server.bind = bind.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // load config: --config / QUIRKY_CONFIG > ~/.quirky/quirky.toml, then env
    let loaded = QuirkyConfig::load(cli.config.as_deref());
    let verbose = cli.verbose || loaded.as_ref().is_ok_and(|c| c.verbose);
    init_tracing(verbose);

    let mut config = loaded.unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        QuirkyConfig::default()
    });
    cli.apply(&mut config);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    info!(
        %addr,
        host = %config.server.public_host(),
        ws_secure = config.server.ws_secure,
        "starting"
    );

    let state = Arc::new(app::AppState::new(config));
    let router = app::build_router(state.clone());

    let cancel = CancellationToken::new();
    let tasks = state.pipeline.start(cancel.clone());
    let supervisor = tokio::spawn(quirky_pipeline::supervise(tasks, cancel.clone()));

    // Ctrl-C and fatal pipeline errors both end up cancelling the token.
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        on_signal.cancel();
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("quirky gateway listening on {}", addr);

    let shutdown = cancel.clone();
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;

    // stop the pipeline and surface any fatal error it hit
    cancel.cancel();
    supervisor.await??;
    info!("shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins; otherwise warnings only, or debug for our crates with
/// `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "quirky_gateway=debug,quirky_pipeline=debug,tower_http=debug,warn"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}
