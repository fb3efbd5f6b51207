//! bounce: an IRC bouncer.
//!
//! Holds one connection per configured network and lets any number of IRC
//! clients share it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bounce::config::{self, Config, LoggingConfig, NetworkConfig};
use bounce::connection::dial;
use bounce::middleware::{CapTracker, Middleware};
use bounce::Bouncer;

/// IRC bouncer.
#[derive(Parser)]
#[command(name = "bounce")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file [default: ~/.bounce/bounce.yaml].
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let path = config::resolve_path(args.config.as_deref())?;
    let config = Config::from_file(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    let log_config = match args.verbose {
        0 => config.logging.clone(),
        1 => LoggingConfig {
            level: "debug".to_string(),
            ..config.logging.clone()
        },
        _ => LoggingConfig {
            level: "trace".to_string(),
            ..config.logging.clone()
        },
    };
    setup_tracing(&log_config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        name = %config.name,
        config = %path.display(),
        networks = config.networks.len(),
        "starting bounce"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

fn setup_tracing(config: &LoggingConfig) {
    let level = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    let mut networks = JoinSet::new();
    for network in config.networks {
        let shutdown = shutdown_rx.clone();
        let span = info_span!("network", name = %network.name);
        networks.spawn(
            async move {
                let name = network.name.clone();
                (name, serve_network(network, shutdown).await)
            }
            .instrument(span),
        );
    }
    drop(shutdown_rx);

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, stopping bouncer");
        drop(shutdown_tx);
    });

    // One network failing leaves the others running.
    while let Some(joined) = networks.join_next().await {
        match joined {
            Ok((name, Ok(()))) => info!(network = %name, "network stopped"),
            Ok((name, Err(err))) => error!(network = %name, "network failed: {:#}", err),
            Err(err) => error!(error = %err, "network task failed"),
        }
    }

    info!("bouncer shutdown complete");
    Ok(())
}

async fn serve_network(
    network: NetworkConfig,
    mut shutdown: watch::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = match network.listen.as_deref() {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to listen on {}", addr))?;
            info!(address = %addr, "listening for clients");
            Some(listener)
        }
        None => None,
    };

    let (conn, from_network) = dial(&network).await?;
    let middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(CapTracker)];
    let mut bouncer = Bouncer::start(&network, conn, from_network, middleware);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            () = bouncer.network_closed() => {
                warn!("network connection lost");
                break;
            }
            accepted = accept(listener.as_ref()) => match accepted {
                Ok((stream, peer)) => {
                    info!(peer = %peer, "client connected");
                    if let Err(err) = bouncer.attach(stream).await {
                        warn!(peer = %peer, error = %err, "failed to attach client");
                    }
                }
                Err(err) => warn!(error = %err, "accept failed"),
            }
        }
    }

    bouncer.shutdown().await?;
    Ok(())
}

async fn accept(listener: Option<&TcpListener>) -> std::io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
