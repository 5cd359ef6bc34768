//! treeroute binary: serve a directory tree as an HTTP API.

use anyhow::Context as _;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use treeroute::config::{load_config, validate_config, RouterConfig};
use treeroute::lifecycle::{signals, startup, Shutdown};
use treeroute::observability::{logging, metrics};
use treeroute::{FileLoader, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "treeroute", version)]
#[command(about = "Serve a directory tree as an HTTP API", long_about = None)]
struct Cli {
    /// Source root; overrides `source.root` from the config file.
    root: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(short, long, env = "TREEROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address; overrides `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Value for `Access-Control-Allow-Origin`.
    #[arg(long)]
    cors: Option<String>,

    /// Do not serve the documentation endpoints.
    #[arg(long)]
    no_docs: bool,

    /// Do not watch the source root for changes.
    #[arg(long)]
    no_watch: bool,
}

impl Cli {
    fn apply(self, mut config: RouterConfig) -> RouterConfig {
        if let Some(root) = self.root {
            config.source.root = root;
        }
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(origin) = self.cors {
            config.cors.enabled = true;
            config.cors.origin = origin;
        }
        if self.no_docs {
            config.docs.enabled = false;
        }
        if self.no_watch {
            config.source.watch = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RouterConfig::default(),
    };
    let config = cli.apply(config);
    validate_config(&config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::anyhow!("invalid configuration: {}", messages.join(", "))
    })?;

    logging::init(&config.observability).context("initializing logging")?;
    tracing::info!("treeroute v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        root = %config.source.root.display(),
        watch = config.source.watch,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr).context("starting metrics exporter")?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = startup::build_registry(&config, Arc::new(FileLoader::new()))
        .context("building endpoint registry")?;

    let shutdown = Arc::new(Shutdown::new());
    let _watcher = startup::start_watcher(registry.clone(), &config, shutdown.subscribe())
        .context("starting source watcher")?;
    signals::spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .with_context(|| format!("binding {}", config.listener.bind_address))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        address = %local_addr,
        endpoints = registry.len(),
        "Listening for connections"
    );
    if config.docs.enabled {
        tracing::info!("Documentation is available at http://{}/{}", local_addr, config.docs.path);
    }

    let server = HttpServer::new(config, registry);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
