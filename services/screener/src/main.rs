//! Screener - ranks equities by regime-weighted technical factors
//!
//! 1. Loads configuration and the sector universe
//! 2. Classifies the market from the benchmark
//! 3. Scores every symbol, ranks the results and prints recommendations
//! 4. Keeps the latest run on disk for `recommend`

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use market_data::{InMemorySource, MarketDataSource, NewsSource, YahooFinanceClient};
use screener::{
    OpportunityRanker, Recommendation, ResultsStore, ScreenerConfig, TracingProgress, Universe,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "screener", version, about = "Multi-factor equity screener")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "config/screener.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze the universe and print the top opportunities
    Analyze {
        /// Comma-separated sector names (defaults to the configured list)
        #[arg(long, value_delimiter = ',')]
        sectors: Option<Vec<String>>,

        /// How many opportunities to keep
        #[arg(long)]
        top: Option<usize>,

        /// Read bars, company info and headlines from a JSON file instead of Yahoo
        #[arg(long)]
        offline_data: Option<PathBuf>,
    },

    /// Print the recommendation for one symbol from the latest run
    Recommend { symbol: String },

    /// List the sectors of the universe
    Sectors,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ScreenerConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match cli.command {
        Command::Analyze {
            sectors,
            top,
            offline_data,
        } => analyze(config, sectors, top, offline_data).await,
        Command::Recommend { symbol } => recommend(&config, &symbol).await,
        Command::Sectors => list_sectors(&config).await,
    }
}

async fn analyze(
    mut config: ScreenerConfig,
    sectors: Option<Vec<String>>,
    top: Option<usize>,
    offline_data: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(top) = top {
        config.screening.top_opportunities = top;
        config.validate()?;
    }

    let universe = Universe::load(&config.paths.universe).await?;
    let selected = config.screening.select_sectors(&universe, sectors.as_deref());
    if selected.is_empty() {
        bail!(
            "No sectors selected; the universe has: {}",
            universe.sector_names().join(", ")
        );
    }

    let (market, news): (Arc<dyn MarketDataSource>, Option<Arc<dyn NewsSource>>) =
        match offline_data {
            Some(path) => {
                let source = Arc::new(InMemorySource::from_json_file(&path).await?);
                info!("Using offline data from {}", path.display());
                (
                    source.clone() as Arc<dyn MarketDataSource>,
                    Some(source as Arc<dyn NewsSource>),
                )
            }
            None => {
                let yahoo = Arc::new(YahooFinanceClient::new(config.yahoo_settings()));
                let news = config
                    .provider
                    .news_enabled
                    .then(|| yahoo.clone() as Arc<dyn NewsSource>);
                (yahoo as Arc<dyn MarketDataSource>, news)
            }
        };

    let mut ranker = OpportunityRanker::new(market.clone(), config.engine_settings())?;
    if let Some(news) = news {
        ranker = ranker.with_news(news);
    }

    let run = ranker.run(&selected, &TracingProgress).await?;

    let health = market.health().await;
    if !health.is_healthy {
        warn!(
            "{} reported failures during the run (success rate {:.0}%)",
            health.source,
            health.success_rate * 100.0
        );
    }

    let store = ResultsStore::new(&config.paths.results);
    store.save(&run).await?;
    info!("Saved results to {}", store.path().display());

    let picks: Vec<_> = run.above_min_score(config.screening.min_score).collect();
    println!("\n{}", "=".repeat(80));
    println!(
        "TOP {} OPPORTUNITIES (regime: {}, {} analyzed)",
        picks.len(),
        run.regime.regime,
        run.total_analyzed
    );
    println!("{}\n", "=".repeat(80));

    for (i, analysis) in picks.into_iter().enumerate() {
        match Recommendation::from_analysis(analysis, &config.account) {
            Ok(rec) => println!("{}. {}\n", i + 1, rec),
            Err(e) => warn!("No recommendation for {}: {}", analysis.symbol, e),
        }
    }

    Ok(())
}

async fn recommend(config: &ScreenerConfig, symbol: &str) -> anyhow::Result<()> {
    let store = ResultsStore::new(&config.paths.results);
    let Some(run) = store.load().await? else {
        bail!(
            "No analysis results at {}; run `screener analyze` first",
            store.path().display()
        );
    };

    let Some(analysis) = run.find(symbol) else {
        bail!("{} is not in the latest results (run {})", symbol, run.run_id);
    };

    let rec = Recommendation::from_analysis(analysis, &config.account)?;
    println!("{}", serde_json::to_string_pretty(&rec)?);
    Ok(())
}

async fn list_sectors(config: &ScreenerConfig) -> anyhow::Result<()> {
    let universe = Universe::load(&config.paths.universe).await?;
    let enabled = &config.screening.enabled_sectors;

    for sector in &universe.sectors {
        let marker = if enabled.is_empty() || enabled.iter().any(|s| s.eq_ignore_ascii_case(&sector.name)) {
            "*"
        } else {
            " "
        };
        println!("{} {:<20} {:>3} symbols", marker, sector.name, sector.symbols.len());
    }
    Ok(())
}
