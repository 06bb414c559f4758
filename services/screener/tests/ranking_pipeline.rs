//! End-to-end runs of the opportunity ranker over in-memory market data


use market_data::{CompanyInfo, Headline, InMemorySource};
use mock_market::{flat, trending, ScriptedSource};
use rust_decimal::Decimal;
use screener::{
    progress::ProgressLevel, AccountSettings, EngineError, EngineSettings, NoProgress,
    OpportunityRanker, ProgressLog, Recommendation, Regime, ResultsStore, Sector, Sentiment,
};
use std::io;
use std::sync::{Arc, Mutex};

fn sector(name: &str, symbols: &[&str]) -> Sector {
    Sector {
        name: name.to_string(),
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
    }
}

fn base_market() -> InMemorySource {
    InMemorySource::new().with_series(trending("SPY", 260, 400.0, 1.001))
}

fn ranker(market: InMemorySource, settings: EngineSettings) -> OpportunityRanker {
    OpportunityRanker::new(Arc::new(market), settings).unwrap()
}

#[tokio::test]
async fn test_run_ranks_and_skips_bad_symbols() {
    let market = base_market()
        .with_series(flat("FLAT", 260, 50.0))
        .with_series(trending("UP", 260, 20.0, 1.01))
        .with_series(flat("SHORT", 30, 10.0))
        .with_failing("BROKEN")
        .with_company(CompanyInfo {
            symbol: "UP".to_string(),
            display_name: "Up Corp".to_string(),
            sector: Some("Technology".to_string()),
        });
    let ranker = ranker(market, EngineSettings::default());
    let log = ProgressLog::new();

    let run = ranker
        .run(
            &[sector("Tech", &["FLAT", "UP", "SHORT", "BROKEN", "GHOST"])],
            &log,
        )
        .await
        .unwrap();

    assert_eq!(run.total_analyzed, 2);
    let order: Vec<&str> = run.all_stocks.iter().map(|a| a.symbol.as_str()).collect();
    assert_eq!(order, vec!["UP", "FLAT"]);

    let up = run.find("up").unwrap();
    assert_eq!(up.company_name, "Up Corp");
    assert_eq!(up.sector, "Technology");
    // no provider sector, falls back to the universe name
    assert_eq!(run.find("FLAT").unwrap().sector, "Tech");

    let skipped: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|e| e.level == ProgressLevel::Warn)
        .map(|e| e.message)
        .collect();
    assert_eq!(skipped.len(), 3);
    assert!(skipped[0].starts_with("Skipped SHORT"));
    assert!(skipped[0].contains("need 60 bars, have 30"));
    assert!(skipped[1].starts_with("Skipped BROKEN"));
    assert!(skipped[2].starts_with("Skipped GHOST"));
}

#[tokio::test]
async fn test_equal_scores_keep_universe_order() {
    let market = base_market()
        .with_series(flat("CCC", 260, 50.0))
        .with_series(flat("AAA", 260, 50.0))
        .with_series(flat("BBB", 260, 50.0));
    let ranker = ranker(market, EngineSettings::default());

    let run = ranker
        .run(
            &[sector("One", &["CCC", "AAA"]), sector("Two", &["BBB"])],
            &NoProgress,
        )
        .await
        .unwrap();

    let order: Vec<&str> = run.all_stocks.iter().map(|a| a.symbol.as_str()).collect();
    assert_eq!(order, vec!["CCC", "AAA", "BBB"]);
    assert!(run.all_stocks.windows(2).all(|w| w[0].score == w[1].score));
}

#[tokio::test]
async fn test_concurrent_run_matches_sequential_order() {
    let build = || {
        base_market()
            .with_series(flat("AAA", 260, 50.0))
            .with_series(flat("BBB", 260, 50.0))
            .with_series(flat("CCC", 260, 50.0))
            .with_series(trending("DDD", 260, 20.0, 1.01))
    };
    let sectors = [sector("Mixed", &["AAA", "BBB", "CCC", "DDD"])];

    let sequential = ranker(build(), EngineSettings::default())
        .run(&sectors, &NoProgress)
        .await
        .unwrap();

    // slowest first, so completion order is the reverse of request order
    let delayed = ScriptedSource::new(build())
        .with_delay("AAA", 60)
        .with_delay("BBB", 40)
        .with_delay("CCC", 20);
    let settings = EngineSettings {
        concurrency: 4,
        ..EngineSettings::default()
    };
    let concurrent = OpportunityRanker::new(Arc::new(delayed), settings)
        .unwrap()
        .run(&sectors, &NoProgress)
        .await
        .unwrap();

    let symbols = |run: &screener::AnalysisRun| -> Vec<String> {
        run.all_stocks.iter().map(|a| a.symbol.clone()).collect()
    };
    assert_eq!(symbols(&sequential), symbols(&concurrent));
    assert_eq!(symbols(&concurrent), vec!["DDD", "AAA", "BBB", "CCC"]);
}

#[tokio::test]
async fn test_benchmark_failure_aborts_run() {
    let market = InMemorySource::new().with_series(flat("AAA", 260, 50.0));
    let ranker = ranker(market, EngineSettings::default());

    let err = ranker
        .run(&[sector("One", &["AAA"])], &NoProgress)
        .await
        .unwrap_err();
    match err {
        EngineError::Benchmark { symbol, .. } => assert_eq!(symbol, "SPY"),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_short_benchmark_runs_with_unknown_regime() {
    let market = InMemorySource::new()
        .with_series(flat("SPY", 50, 400.0))
        .with_series(flat("AAA", 260, 50.0));
    let ranker = ranker(market, EngineSettings::default());

    let run = ranker
        .run(&[sector("One", &["AAA"])], &NoProgress)
        .await
        .unwrap();

    assert_eq!(run.regime.regime, Regime::Unknown);
    assert_eq!(run.regime.confidence, 0.0);
    assert_eq!(run.total_analyzed, 1);
    assert_eq!(run.all_stocks[0].regime, Regime::Unknown);
}

#[tokio::test]
async fn test_empty_request_is_rejected() {
    let ranker = ranker(base_market(), EngineSettings::default());
    let err = ranker.run(&[], &NoProgress).await.unwrap_err();
    assert!(matches!(err, EngineError::EmptyRequest));
}

#[tokio::test]
async fn test_top_n_limits_opportunities_only() {
    let market = base_market()
        .with_series(flat("AAA", 260, 50.0))
        .with_series(trending("BBB", 260, 20.0, 1.01))
        .with_series(flat("CCC", 260, 75.0));
    let settings = EngineSettings {
        top_n: 1,
        ..EngineSettings::default()
    };

    let run = ranker(market, settings)
        .run(&[sector("One", &["AAA", "BBB", "CCC"])], &NoProgress)
        .await
        .unwrap();

    assert_eq!(run.total_analyzed, 3);
    assert_eq!(run.all_stocks.len(), 3);
    assert_eq!(run.top_opportunities.len(), 1);
    assert_eq!(run.top_opportunities[0].symbol, "BBB");
}

#[tokio::test]
async fn test_news_sentiment_reaches_recommendation() {
    let news = InMemorySource::new().with_headlines(
        "AAA",
        vec![
            Headline::new("AAA shares surge after earnings beat"),
            Headline::new("Analysts upgrade AAA"),
            Headline::new("Quiet day for AAA"),
        ],
    );
    let market = base_market().with_series(flat("AAA", 260, 37.0));
    let ranker = ranker(market, EngineSettings::default()).with_news(Arc::new(news));

    let run = ranker
        .run(&[sector("One", &["AAA"])], &NoProgress)
        .await
        .unwrap();
    let analysis = run.find("AAA").unwrap();
    assert_eq!(analysis.news.sentiment, Sentiment::Positive);
    assert_eq!(analysis.news.news_count, 3);

    let rec = Recommendation::from_analysis(analysis, &AccountSettings::default()).unwrap();
    assert_eq!(rec.shares, 6);
    assert_eq!(rec.stop_loss, Decimal::new(3515, 2));
    assert_eq!(rec.news_sentiment, Sentiment::Positive);
    assert!(rec.reasoning.contains("News sentiment: positive"));
}

#[tokio::test]
async fn test_snapshot_survives_reload() {
    let market = base_market()
        .with_series(flat("AAA", 260, 50.0))
        .with_series(trending("BBB", 260, 20.0, 1.01));
    let run = ranker(market, EngineSettings::default())
        .run(&[sector("One", &["AAA", "BBB"])], &NoProgress)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = ResultsStore::new(dir.path().join("storage").join("latest_results.json"));
    assert!(store.load().await.unwrap().is_none());

    store.save(&run).await.unwrap();
    let loaded = store.load().await.unwrap().unwrap();

    assert_eq!(loaded.run_id, run.run_id);
    assert_eq!(loaded.total_analyzed, 2);
    let order: Vec<&str> = loaded.all_stocks.iter().map(|a| a.symbol.as_str()).collect();
    assert_eq!(order, vec!["BBB", "AAA"]);
    assert!(loaded.find("BBB").is_some());
}

#[tokio::test]
async fn test_offline_demo_data_runs() {
    let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
    let source = Arc::new(
        InMemorySource::from_json_file(demos.join("offline.json"))
            .await
            .unwrap(),
    );
    let universe = screener::Universe::load(demos.join("sectors.yaml"))
        .await
        .unwrap();
    let sectors = universe.resolve(&[], 50);

    let run = OpportunityRanker::new(source.clone(), EngineSettings::default())
        .unwrap()
        .with_news(source)
        .run(&sectors, &NoProgress)
        .await
        .unwrap();

    assert_eq!(run.total_analyzed, 5);
    assert_ne!(run.regime.regime, Regime::Unknown);
    assert!(run
        .all_stocks
        .windows(2)
        .all(|w| w[0].score >= w[1].score));
    assert_eq!(run.find("NVDA").unwrap().company_name, "NVIDIA Corporation");
}

#[tokio::test]
async fn test_missing_company_metadata_keeps_symbol() {
    let market = base_market()
        .with_series(flat("O", 260, 55.0))
        .with_series(flat("L", 260, 70.0));
    let source = ScriptedSource::new(market).with_unknown_company("O");

    let run = OpportunityRanker::new(Arc::new(source), EngineSettings::default())
        .unwrap()
        .run(&[sector("Real_Estate", &["O", "L"])], &NoProgress)
        .await
        .unwrap();

    assert_eq!(run.total_analyzed, 2);
    let o = run.find("O").unwrap();
    assert_eq!(o.company_name, "O");
    assert_eq!(o.sector, "Real_Estate");
}

/// Shared buffer the fmt subscriber writes into
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_skipped_symbols_are_logged_without_reporter() {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let market = base_market()
        .with_series(flat("AAA", 260, 50.0))
        .with_series(flat("SHORT", 30, 10.0))
        .with_failing("BROKEN");
    let run = ranker(market, EngineSettings::default())
        .run(&[sector("One", &["AAA", "SHORT", "BROKEN"])], &NoProgress)
        .await
        .unwrap();
    assert_eq!(run.total_analyzed, 1);

    let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("WARN"));
    assert!(logs.contains("Skipping SHORT"));
    assert!(logs.contains("Skipping BROKEN"));
    assert!(!logs.contains("Skipping AAA"));
}
