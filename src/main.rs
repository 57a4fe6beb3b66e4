//! NFT marketplace arbitrage scanner entry point.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nifty_arb::browser::WebDriverPage;
use nifty_arb::config::Config;
use nifty_arb::enrich::{EthPriceOracle, PriceOracle};
use nifty_arb::metrics;
use nifty_arb::notify::{DiscordNotifier, Notifier, NullNotifier};
use nifty_arb::scanner::{ScanStats, Scanner};
use nifty_arb::utils::listen_for_ctrl_c;

/// NFT marketplace floor/offer arbitrage scanner.
#[derive(Parser, Debug)]
#[command(name = "nifty-arb")]
#[command(about = "Scans Nifty Gateway floor listings against OpenSea offers")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// Keep scanning on an interval instead of a single pass.
    #[arg(long)]
    continuous: bool,

    /// Stop after this many listings (0 = unlimited).
    #[arg(long)]
    max_items: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scan pipeline (default).
    Run {
        /// Keep scanning on an interval instead of a single pass.
        #[arg(long)]
        continuous: bool,

        /// Stop after this many listings (0 = unlimited).
        #[arg(long)]
        max_items: Option<usize>,

        /// Run the browser with a visible window.
        #[arg(long)]
        headed: bool,

        /// Keep items without a standing offer in the output.
        #[arg(long)]
        include_no_offer: bool,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Fetch the current ETH/USD rate (diagnostic).
    CheckOracle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("nifty_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Handle subcommands
    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::CheckOracle) => cmd_check_oracle().await,
        Some(Command::Run {
            continuous,
            max_items,
            headed,
            include_no_offer,
        }) => cmd_run(continuous, max_items, headed, include_no_offer).await,
        None => cmd_run(args.continuous, args.max_items, false, false).await,
    }
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("NIFTY ARB SCANNER - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Listing URL: {}", config.listing_url);
    println!("  WebDriver: {}", config.webdriver_url);
    println!("  Headless: {}", config.headless);
    println!("  Max Items: {}", if config.max_items == 0 {
        "unlimited".to_string()
    } else {
        config.max_items.to_string()
    });
    println!("  Max Scrolls: {}", config.max_scrolls);
    println!("  OpenSea API Key: present");
    println!("  Offer-only output: {}", config.offer_only);
    println!("  Continuous: {}", config.continuous);
    if config.continuous {
        println!("  Scan Interval: {}s", config.scan_interval_secs);
    }
    println!(
        "  Discord Webhook: {}",
        if config.discord_webhook_url.is_some() { "configured" } else { "disabled" }
    );
    println!("  Output Dir: {}", config.output_dir);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Fetch the current ETH/USD rate (diagnostic).
async fn cmd_check_oracle() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("NIFTY ARB SCANNER - ETH PRICE CHECK");
    println!("======================================================================");

    let config = Config::load()?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.http_timeout_ms))
        .build()?;

    println!("Endpoint: {}", config.eth_price_url);
    print!("\nFetching ETH/USD rate... ");

    let oracle = EthPriceOracle::new(client, &config);
    match oracle.refresh().await {
        Ok(quote) => {
            println!("OK");
            println!("  1 ETH = ${}", quote.usd_per_eth);
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            let fallback = oracle.quote().await;
            println!(
                "  Scanner would fall back to ${} (flagged stale)",
                fallback.usd_per_eth
            );
        }
    }

    println!("======================================================================");
    Ok(())
}

/// Run the scan pipeline.
async fn cmd_run(
    continuous: bool,
    max_items: Option<usize>,
    headed: bool,
    include_no_offer: bool,
) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Override with CLI args if provided
    if continuous {
        config.continuous = true;
    }
    if let Some(max) = max_items {
        config.max_items = max;
    }
    if headed {
        config.headless = false;
    }
    if include_no_offer {
        config.offer_only = false;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    info!("Configuration loaded successfully");
    info!("Listing URL: {}", config.listing_url);
    info!(
        "Mode: {}",
        if config.continuous { "CONTINUOUS" } else { "SINGLE PASS" }
    );

    // Initialize metrics
    metrics::init_metrics();
    if config.metrics_enabled {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.metrics_port));
        match builder.install() {
            Ok(()) => info!("Prometheus exporter listening on port {}", config.metrics_port),
            Err(e) => warn!("Failed to start Prometheus exporter: {}", e),
        }
    }

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.http_timeout_ms))
        .build()?;

    let shutdown = listen_for_ctrl_c();

    let eth_oracle = Arc::new(EthPriceOracle::new(http_client.clone(), &config));
    eth_oracle.spawn_refresh(shutdown.clone());
    let oracle: Arc<dyn PriceOracle> = eth_oracle;
    let notifier: Arc<dyn Notifier> = match &config.discord_webhook_url {
        Some(url) => {
            info!("Discord notifications enabled");
            Arc::new(DiscordNotifier::new(http_client.clone(), url.clone()))
        }
        None => Arc::new(NullNotifier),
    };

    let interval = Duration::from_secs(config.scan_interval_secs);
    let run_continuous = config.continuous;
    let scanner = Scanner::new(config.clone(), http_client, oracle, notifier);

    info!("Starting arbitrage scanner...");

    let mut session = ScanStats::default();
    let mut cycles: u64 = 0;

    loop {
        // Each cycle gets a fresh browser session so one wedged session
        // cannot poison the next pass.
        let page = match WebDriverPage::connect(&config).await {
            Ok(page) => page,
            Err(e) => {
                error!("Failed to start browser session: {}", e);
                if !run_continuous {
                    return Err(anyhow::anyhow!("Browser session failed: {}", e));
                }
                warn!("Retrying in {}s...", interval.as_secs());
                tokio::select! {
                    _ = tokio::time::sleep(interval) => continue,
                    _ = shutdown.wait() => break,
                }
            }
        };

        let report = scanner.run_cycle(&page, &shutdown).await;
        if let Err(e) = page.quit().await {
            warn!("Failed to close browser session: {}", e);
        }

        match report {
            Ok(report) => {
                cycles += 1;
                session.absorb(&report.stats);
                info!("========================================");
                info!("SCAN CYCLE COMPLETE");
                info!(
                    "Processed: {} | Scraped: {} | No listing: {} | Failed: {}",
                    report.stats.processed,
                    report.stats.scraped,
                    report.stats.no_listing,
                    report.stats.failed
                );
                info!(
                    "RED: {} | YELLOW: {} | GREEN: {} | WHITE: {} | NO_OFFER: {}",
                    report.stats.red,
                    report.stats.yellow,
                    report.stats.green,
                    report.stats.white,
                    report.stats.no_offer
                );
                if let Some(reason) = &report.aborted {
                    warn!("Cycle ended early: {}", reason);
                }
                if let Some(path) = &report.output_path {
                    info!("Results: {}", path.display());
                }
                info!("========================================");
            }
            Err(e) => {
                error!("Scan cycle failed: {}", e);
                if !run_continuous {
                    return Err(e.into());
                }
            }
        }

        if !run_continuous || shutdown.is_triggered() {
            break;
        }
        info!("Next scan in {}s", interval.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.wait() => break,
        }
    }

    if cycles > 1 {
        info!(
            "Session totals across {} cycles: processed {} | scraped {} | opportunities {}",
            cycles,
            session.processed,
            session.scraped,
            session.red + session.yellow + session.green
        );
    }
    info!("Scanner stopped");
    Ok(())
}
