use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use clap::{Parser, Subcommand};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use relay_bridge::auth::{Ed25519Identity, Signer};
use relay_bridge::config::{load_config, AppConfig};
use relay_bridge::observability::init_tracing;
use relay_bridge::payment::build_invoice_payer;
use relay_bridge::routing::dispatch::{dispatch_request, normalize_base_path};
use relay_bridge::state::AppState;
use relay_bridge::transport::authenticate;

#[derive(Parser)]
#[command(name = "relay-bridge", version, about = "OpenAI-compatible bridge to an inference relay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Path to the YAML config file.
        #[arg(default_value = "config.yaml")]
        config: String,
    },
    /// Generate a fresh Ed25519 identity for the `identity` config section.
    Keygen,
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Keygen => keygen(),
        Command::Serve { config } => serve(&config),
    }
}

fn keygen() {
    let identity = Ed25519Identity::generate();
    println!("identity:");
    println!("  public_key: \"{}\"", identity.public_key_hex());
    println!("  private_key: \"{}\"", identity.private_key_hex());
}

fn serve(config_path: &str) {
    let config = load_config(config_path).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Please copy 'config.example.yaml' to '{config_path}' and modify as needed.");
        std::process::exit(1);
    });

    let _ = rustls::crypto::ring::default_provider().install_default();
    init_tracing(&config.features.log_level);
    let runtime = build_runtime(&config);

    runtime.block_on(async move {
        run(config).await;
    });
}

fn build_runtime(config: &AppConfig) -> tokio::runtime::Runtime {
    let worker_threads = config.server.runtime_worker_threads;
    let mut runtime_builder = if worker_threads == Some(1) {
        tokio::runtime::Builder::new_current_thread()
    } else {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        if let Some(threads) = worker_threads {
            builder.worker_threads(threads);
        }
        builder
    };
    runtime_builder.enable_io();
    runtime_builder.enable_time();
    runtime_builder.build().unwrap_or_else(|e| {
        eprintln!("Failed to initialize Tokio runtime: {e}");
        std::process::exit(1);
    })
}

async fn run(config: AppConfig) {
    let host = config.server.host.clone();
    let port = config.server.port;
    let base_path = normalize_base_path(&config.server.base_path);

    let identity: Arc<dyn Signer> = match Ed25519Identity::from_config(&config.identity) {
        Ok(identity) => Arc::new(identity),
        Err(err) => {
            eprintln!("Invalid identity: {err}");
            std::process::exit(1);
        }
    };

    if config.relay.verify_on_startup {
        tracing::info!(url = config.relay.ws_url(), "testing connection to relay");
        match authenticate(&config.relay, identity.as_ref()).await {
            Ok(connection) => {
                connection.close().await;
                tracing::info!("relay connection successful");
            }
            Err(err) => {
                eprintln!("Failed to connect to relay: {err}");
                std::process::exit(1);
            }
        }
    }

    let payer = build_invoice_payer(&config.payment);
    let state = Arc::new(AppState::new(config, identity, payer));
    let dispatch_base_path = Arc::<str>::from(base_path.clone());

    tracing::info!(
        "relay-bridge starting on {}:{} with base_path='{}'",
        host,
        port,
        base_path
    );

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}"))
        .await
        .unwrap_or_else(|err| {
            eprintln!("Failed to bind to {host}:{port}: {err}");
            std::process::exit(1);
        });

    tracing::info!("relay-bridge is ready, point any OpenAI-compatible SDK at this server");
    serve_accept_loop(
        listener,
        AutoBuilder::new(TokioExecutor::new()),
        state,
        dispatch_base_path,
    )
    .await;
}

async fn serve_accept_loop(
    listener: tokio::net::TcpListener,
    conn_builder: AutoBuilder<TokioExecutor>,
    dispatch_state: Arc<AppState>,
    dispatch_base_path: Arc<str>,
) {
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok((stream, remote_addr)) => (stream, remote_addr),
            Err(err) => {
                tracing::warn!("accept error: {err}");
                continue;
            }
        };

        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!("failed to enable TCP_NODELAY for {remote_addr}: {err}");
        }

        let io = TokioIo::new(stream);
        let conn_builder = conn_builder.clone();
        let request_state = Arc::clone(&dispatch_state);
        let request_base_path = Arc::clone(&dispatch_base_path);
        let hyper_service = service_fn(move |request: Request<Incoming>| {
            dispatch_request(
                Arc::clone(&request_state),
                Arc::clone(&request_base_path),
                request.map(Body::new),
            )
        });

        tokio::spawn(async move {
            if let Err(err) = conn_builder.serve_connection(io, hyper_service).await {
                tracing::debug!("failed to serve connection from {remote_addr}: {err:#}");
            }
        });
    }
}
