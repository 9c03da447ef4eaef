use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio::sync::watch;

use cf_usage_exporter::config::{self, CfCredentials, UsageConfig};
use cf_usage_exporter::server::{self, AppState};
use cf_usage_exporter::usage::{BillableOfferings, UsageCollector, UsageSource};
use cf_usage_exporter::{report, scheduler, telemetry, CfClient, ReferenceCatalog, ResultCache};

/// Reports billable Cloud Foundry usage once, or serves it as Prometheus metrics.
#[derive(Parser, Debug)]
#[command(name = "cf-usage-exporter", version, about)]
struct Cli {
    /// Comma-separated list of orgs excluded from billable counts
    #[arg(long, default_value = config::DEFAULT_SKIP_ORGS)]
    skip_orgs: String,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Run as web server with Prometheus metrics endpoint
    #[arg(long)]
    server: bool,

    /// Port to run web server on (only used with --server)
    #[arg(long, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Data refresh interval in minutes for server mode
    #[arg(long, default_value_t = config::DEFAULT_REFRESH_MINUTES)]
    refresh_interval: u64,

    /// Reload service plans and offerings before every refresh (server mode)
    #[arg(long)]
    reload_catalog: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let server_mode = cli.server || config::env_flag("TPCF_SERVER_MODE");
    let verbose = cli.verbose || config::env_flag("TPCF_VERBOSE");
    let port = config::env_port().unwrap_or(cli.port);

    telemetry::init_tracing(verbose, server_mode);

    let refresh_interval = config::refresh_interval_from_minutes(cli.refresh_interval)
        .context("invalid --refresh-interval")?;

    let usage_config = UsageConfig {
        skip_org_names: config::parse_skip_orgs(&cli.skip_orgs),
        verbose,
        refresh_interval,
        billable_offerings: BillableOfferings::default(),
        reload_catalog: cli.reload_catalog,
    };

    let credentials = CfCredentials::from_env().context("failed to create CF client")?;
    if credentials.uses_custom_client() {
        tracing::info!(client_id = %credentials.client_id, "using custom OAuth client credentials");
    }
    let client = Arc::new(
        CfClient::connect(credentials)
            .await
            .context("failed to authenticate with CF API")?,
    );

    tracing::debug!("loading service plans and offerings");
    let catalog = Arc::new(ReferenceCatalog::new());
    catalog
        .load(&client)
        .await
        .context("failed to load service catalog")?;

    let collector = UsageCollector::new(client, catalog, usage_config.clone());

    if server_mode {
        run_server(collector, usage_config, port).await
    } else {
        let result = collector
            .collect(Utc::now())
            .await
            .context("failed to collect usage data")?;
        if cli.json {
            println!(
                "{}",
                report::render_json(&result).context("failed to marshal JSON")?
            );
        } else {
            print!("{}", report::render_text(&result));
        }
        Ok(())
    }
}

async fn run_server(collector: UsageCollector, usage_config: UsageConfig, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config::BIND_ADDRESS.as_str(), port)
        .parse()
        .context("invalid bind address")?;

    let cache = Arc::new(ResultCache::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let source: Arc<dyn UsageSource> = Arc::new(collector);
    let refresher = scheduler::spawn(
        source,
        cache.clone(),
        usage_config.refresh_interval,
        shutdown_rx.clone(),
    );

    tokio::spawn(async move {
        server::wait_for_shutdown().await;
        let _ = shutdown_tx.send(true);
    });

    let mut server_shutdown = shutdown_rx;
    let state = AppState {
        cache,
        refresh_interval: usage_config.refresh_interval,
    };
    tracing::info!(
        refresh_interval = ?usage_config.refresh_interval,
        "metrics at /metrics, health at /health"
    );
    server::serve(addr, state, async move {
        let _ = server_shutdown.changed().await;
    })
    .await?;

    if tokio::time::timeout(Duration::from_secs(10), refresher)
        .await
        .is_err()
    {
        tracing::warn!("refresh loop did not stop within 10s, abandoning in-flight collection");
    }
    Ok(())
}
