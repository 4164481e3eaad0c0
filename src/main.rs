#![deny(clippy::all)]

use std::sync::Arc;

use log::*;
use serde_json::json;

use kresnik::config::Config;
use kresnik::db::{MemoryStorage, SharedStorage};
use kresnik::metrics::METRICS;
use kresnik::net::Server;
use kresnik::router::{ParamKind, Route};

fn setup_logger(debug: bool) {
    if std::env::var("RUST_LOG").is_err() {
        let level = if debug { "debug" } else { "info" };
        std::env::set_var(
            "RUST_LOG",
            format!("{}={}", env!("CARGO_PKG_NAME"), level),
        );
    }
    env_logger::init();
}

fn print_help() {
    println!("kresnik v{}", env!("CARGO_PKG_VERSION"));
    println!("A minimal application-layer server with an encrypted session channel\n");
    println!("USAGE:");
    println!("    kresnik [OPTIONS] [CONFIG_FILE]\n");
    println!("OPTIONS:");
    println!("    -h, --help       Show this help message\n");
    println!("ARGUMENTS:");
    println!("    [CONFIG_FILE]    Path to configuration file (default: config.toml)\n");
    println!("CONFIGURATION:");
    println!("The configuration file uses a simple key=value format with sections.\n");
    println!("[server] - Bind and mode settings");
    println!("  server.host = \"0.0.0.0\"          # Address to bind to");
    println!("  server.port = 5000               # Port to bind to");
    println!("  server.name = \"kresnik\"          # Name sent in the Server header");
    println!("  server.secure = false            # Enable the encrypted session channel");
    println!("  server.debug = false             # Default log verbosity\n");
    println!("[limits] - Connection and resource limits");
    println!("  limits.backlog = 50              # OS listen backlog");
    println!("  limits.max_active_conns = 1000   # Hard cap on tracked connections");
    println!("  limits.read_chunk_bytes = 1024   # Read chunk size");
    println!("  limits.read_timeout_ms = 10      # Per-read timeout (ms)");
    println!("  limits.max_request_bytes = 1048576  # Max accumulated request size\n");
    println!("[secrets] - Application secrets passed through to handlers");
    println!("  secrets.password_salt = \"\"       # Salt mixed into password hashes\n");
    println!("EXAMPLES:");
    println!("    kresnik                          # Use default config.toml");
    println!("    kresnik myconfig.toml            # Use custom config file");
    println!("    kresnik --help                   # Show this help");
}

fn main() {
    let mut args = std::env::args().skip(1);

    let config_path = match args.next() {
        Some(arg) if arg == "-h" || arg == "--help" => {
            print_help();
            return;
        }
        Some(arg) => arg,
        None => "config.toml".to_string(),
    };

    let cfg = Config::load(&config_path).unwrap_or_else(|e| {
        eprintln!("failed to read config {}: {}", config_path, e);
        std::process::exit(1);
    });
    setup_logger(cfg.server.debug);
    let cfg = Arc::new(cfg);
    info!("config loaded from {}", config_path);

    run_server(cfg);
}

fn run_server(cfg: Arc<Config>) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .thread_name("kresnik-worker")
        .enable_all()
        .build()
        .expect("failed to build runtime");

    rt.block_on(async move {
        let db = SharedStorage::new(MemoryStorage::new());
        let mut server = Server::new(cfg, db);

        // liveness endpoint exercising the registration surface
        server.register(
            Route::post("/reverse", |_ctx, args| {
                let text = args.str("text")?;
                Ok(json!({ "reversed": text.chars().rev().collect::<String>() }))
            })
            .param("text", ParamKind::Str),
        );

        let running = match server.bind() {
            Ok(r) => r,
            Err(e) => {
                error!("could not start server: {}", e);
                std::process::exit(1);
            }
        };
        let handle = running.handle();
        let serving = tokio::spawn(running.serve());

        info!("kresnik server started; press Ctrl-C to stop.");
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");

        info!("shutting down...");
        handle.close();
        let _ = serving.await;

        match serde_json::to_string(&METRICS.snapshot()) {
            Ok(s) => info!("traffic summary: {}", s),
            Err(e) => warn!("could not serialize traffic summary: {}", e),
        }
        info!("Goodbye.");
    });
}
