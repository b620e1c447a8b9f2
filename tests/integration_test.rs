//! Integration Tests - Scraper Engine End to End
//!
//! Drives real scraper workers against mocked exchange sources and pair
//! resolvers. Uses mockall for trait mocking and tokio::test for async
//! tests; every wait is bounded by a timeout.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use mockall::mock;
use tokio::sync::mpsc;
use tokio::time::timeout;

use trade_scrapers::adapters::metrics::{HealthState, MetricsRegistry};
use trade_scrapers::config::{ExchangeConfig, PairConfig};
use trade_scrapers::domain::cursor::TradeCursor;
use trade_scrapers::domain::error::ScraperError;
use trade_scrapers::domain::trade::{Asset, Exchange, ExchangePair, RawTrade, TradeRecord};
use trade_scrapers::ports::pair_resolver::PairResolver;
use trade_scrapers::ports::scraper::ExchangeScraper;
use trade_scrapers::ports::trade_source::TradeSource;
use trade_scrapers::usecases::{PairScraper, Scraper, ScraperOptions, ScraperState, ScraperSupervisor};

// ---- Mock Definitions ----

mock! {
    pub Source {}

    #[async_trait::async_trait]
    impl TradeSource for Source {
        async fn fetch_available_pairs(&self) -> anyhow::Result<Vec<ExchangePair>>;

        async fn fetch_trades(
            &self,
            pair: &ExchangePair,
            cursor: Option<TradeCursor>,
        ) -> anyhow::Result<Vec<RawTrade>>;
    }
}

mock! {
    pub Resolver {}

    #[async_trait::async_trait]
    impl PairResolver for Resolver {
        async fn get_exchange_pair_cache(
            &self,
            exchange: &str,
            foreign_name: &str,
        ) -> anyhow::Result<ExchangePair>;
    }
}

// ---- Helpers ----

const WAIT: Duration = Duration::from_secs(5);

fn options() -> ScraperOptions {
    ScraperOptions::default()
        .with_batch_delay(Duration::from_millis(20))
        .with_channel_capacity(16)
}

fn raw(id: u64, price: &str, volume: &str) -> RawTrade {
    RawTrade {
        foreign_trade_id: id.to_string(),
        sequence: id,
        price: price.to_string(),
        volume: volume.to_string(),
        time: Utc.timestamp_opt(1_600_000_000 + i64::try_from(id).unwrap(), 0).unwrap(),
    }
}

fn pair(name: &str) -> ExchangePair {
    let base = name.split('-').next().unwrap();
    ExchangePair::new("Maker", base, name)
}

fn unknown_resolver() -> MockResolver {
    let mut resolver = MockResolver::new();
    resolver
        .expect_get_exchange_pair_cache()
        .returning(|_, name| Err(anyhow::anyhow!("{name} not cached")));
    resolver
}

fn scraper(source: MockSource, resolver: MockResolver) -> Scraper {
    Scraper::new(
        Exchange::named("Maker"),
        Arc::new(source),
        Arc::new(resolver),
        options(),
        false,
    )
}

/// Poll `check` until it holds or the wait expires.
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(WAIT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ---- Scraper Engine ----

#[tokio::test]
async fn test_single_trade_end_to_end_with_cursor_follow_up() {
    let seen = Arc::new(Mutex::new(Vec::<Option<TradeCursor>>::new()));
    let seen_by_source = Arc::clone(&seen);

    let mut source = MockSource::new();
    source.expect_fetch_trades().returning(move |_, cursor| {
        seen_by_source.lock().unwrap().push(cursor);
        // The exchange keeps returning the same trade; only one may surface.
        Ok(vec![raw(5, "100.5", "2.0")])
    });

    let mut resolver = MockResolver::new();
    resolver.expect_get_exchange_pair_cache().returning(|exchange, name| {
        let mut pair = ExchangePair::new(exchange, "ETH", name);
        pair.verified = true;
        pair.underlying_pair.base_token = Asset::from_symbol("WETH");
        pair.underlying_pair.quote_token = Asset::from_symbol("DAI");
        Ok(pair)
    });

    let scraper = scraper(source, resolver);
    let mut rx = scraper.channel().unwrap();
    scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();
    scraper.start().await.unwrap();

    let record = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(record.symbol, "ETH");
    assert_eq!(record.pair, "ETH-DAI");
    assert!((record.price - 100.5).abs() < f64::EPSILON);
    assert!((record.volume - 2.0).abs() < f64::EPSILON);
    assert_eq!(record.foreign_trade_id, "5");
    assert_eq!(record.source, "Maker");
    assert!(record.verified_pair);
    assert_eq!(record.base_token.symbol, "WETH");
    assert_eq!(record.quote_token.symbol, "DAI");

    eventually(|| {
        let seen = Arc::clone(&seen);
        async move { seen.lock().unwrap().len() >= 2 }
    })
    .await;
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], None);
        assert_eq!(seen[1].as_ref().map(|c| c.sequence), Some(5));
        assert_eq!(seen[1].as_ref().map(|c| c.trade_id.as_str()), Some("5"));
    }

    // Repeated trade 5 must not be emitted again.
    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());

    scraper.close().await.unwrap();
    assert_eq!(scraper.state().await, ScraperState::Closed);
    assert_eq!(scraper.error().await, Some(ScraperError::ClosedByCaller));
    assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failing_pair_does_not_block_others() {
    let mut source = MockSource::new();
    source.expect_fetch_trades().returning(|pair, _| {
        if pair.foreign_name == "AAA-DAI" {
            Err(anyhow::anyhow!("HTTP 500"))
        } else {
            Ok(vec![raw(1, "3.25", "10")])
        }
    });

    let scraper = scraper(source, unknown_resolver());
    let mut rx = scraper.channel().unwrap();
    scraper.scrape_pair(pair("AAA-DAI")).await.unwrap();
    scraper.scrape_pair(pair("BBB-DAI")).await.unwrap();
    scraper.start().await.unwrap();

    let record = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(record.pair, "BBB-DAI");
    assert!(!record.verified_pair);
    assert!(record.base_token.is_empty());

    // Let a few more passes fail on AAA-DAI.
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(scraper.state().await, ScraperState::Running);
    assert_eq!(scraper.error().await, None);

    scraper.close().await.unwrap();
}

#[tokio::test]
async fn test_malformed_trade_is_dropped() {
    let mut source = MockSource::new();
    source
        .expect_fetch_trades()
        .returning(|_, _| Ok(vec![raw(1, "not-a-number", "1.0"), raw(2, "99.0", "1.5")]));

    let scraper = scraper(source, unknown_resolver());
    let mut rx = scraper.channel().unwrap();
    scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();
    scraper.start().await.unwrap();

    let record = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(record.foreign_trade_id, "2");
    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    assert_eq!(scraper.error().await, None);

    scraper.close().await.unwrap();
}

#[tokio::test]
async fn test_trades_emitted_in_native_order() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_by_source = Arc::clone(&calls);

    let mut source = MockSource::new();
    source.expect_fetch_trades().returning(move |_, _| {
        // Newest first, as most exchanges page.
        match calls_by_source.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(vec![raw(9, "1", "1"), raw(7, "1", "1"), raw(8, "1", "1")]),
            _ => Ok(vec![raw(10, "1", "1"), raw(9, "1", "1")]),
        }
    });

    let scraper = scraper(source, unknown_resolver());
    let mut rx = scraper.channel().unwrap();
    scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();
    scraper.start().await.unwrap();

    let mut ids = Vec::new();
    for _ in 0..4 {
        let record = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        ids.push(record.foreign_trade_id);
    }
    assert_eq!(ids, vec!["7", "8", "9", "10"]);

    scraper.close().await.unwrap();
}

#[tokio::test]
async fn test_no_pairs_is_terminal() {
    let scraper = Scraper::new(
        Exchange::named("Maker"),
        Arc::new(MockSource::new()),
        Arc::new(MockResolver::new()),
        options(),
        true,
    );
    let mut rx = scraper.channel().unwrap();

    let handle = &scraper;
    eventually(move || async move { handle.state().await == ScraperState::Closed }).await;
    assert_eq!(scraper.error().await, Some(ScraperError::NoPairs));
    assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());

    assert_eq!(scraper.close().await, Err(ScraperError::NoPairs));
    assert!(scraper.scrape_pair(pair("ETH-DAI")).await.is_err());
}

#[tokio::test]
async fn test_register_after_close_fails() {
    let scraper = scraper(MockSource::new(), MockResolver::new());
    scraper.close().await.unwrap();

    assert_eq!(
        scraper.scrape_pair(pair("ETH-DAI")).await.unwrap_err(),
        ScraperError::Closed
    );
    assert!(scraper.pairs().await.is_empty());
    assert_eq!(scraper.start().await, Err(ScraperError::Closed));
}

#[tokio::test]
async fn test_close_before_start() {
    let scraper = scraper(MockSource::new(), MockResolver::new());
    let mut rx = scraper.channel().unwrap();
    let handle = scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();

    scraper.close().await.unwrap();
    // Idempotent.
    scraper.close().await.unwrap();

    assert_eq!(scraper.state().await, ScraperState::Closed);
    assert_eq!(scraper.error().await, Some(ScraperError::ClosedByCaller));
    assert!(handle.is_closed());
    assert_eq!(handle.error().await, Some(ScraperError::ClosedByCaller));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_start_twice_fails() {
    let mut source = MockSource::new();
    source.expect_fetch_trades().returning(|_, _| Ok(Vec::new()));

    let scraper = scraper(source, unknown_resolver());
    scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();
    scraper.start().await.unwrap();
    assert_eq!(scraper.start().await, Err(ScraperError::AlreadyRunning));

    scraper.close().await.unwrap();
}

#[tokio::test]
async fn test_dropped_receiver_stops_worker() {
    let mut source = MockSource::new();
    source.expect_fetch_trades().returning(|_, _| Ok(vec![raw(1, "1", "1")]));

    let scraper = scraper(source, unknown_resolver());
    drop(scraper.channel().unwrap());
    scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();
    scraper.start().await.unwrap();

    let handle = &scraper;
    eventually(move || async move { handle.state().await == ScraperState::Closed }).await;
    assert_eq!(scraper.error().await, Some(ScraperError::ChannelClosed));
    assert_eq!(scraper.close().await, Err(ScraperError::ChannelClosed));
}

#[tokio::test]
async fn test_closed_pair_leaves_polling() {
    let polled = Arc::new(Mutex::new(Vec::<String>::new()));
    let polled_by_source = Arc::clone(&polled);

    let mut source = MockSource::new();
    source.expect_fetch_trades().returning(move |pair, _| {
        polled_by_source.lock().unwrap().push(pair.foreign_name.clone());
        Ok(Vec::new())
    });

    let scraper = scraper(source, unknown_resolver());
    let eth = scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();
    scraper.scrape_pair(pair("MKR-DAI")).await.unwrap();
    scraper.start().await.unwrap();

    eventually(|| {
        let polled = Arc::clone(&polled);
        async move { polled.lock().unwrap().len() >= 2 }
    })
    .await;
    eth.close();
    let mark = polled.lock().unwrap().len();

    eventually(|| {
        let polled = Arc::clone(&polled);
        async move { polled.lock().unwrap().len() >= mark + 3 }
    })
    .await;
    {
        let polled = polled.lock().unwrap();
        // At most one in-flight ETH-DAI poll can follow the close.
        let late = polled[mark..].iter().filter(|name| *name == "ETH-DAI").count();
        assert!(late <= 1);
        assert_eq!(polled.last().map(String::as_str), Some("MKR-DAI"));
    }

    scraper.close().await.unwrap();
}

#[tokio::test]
async fn test_register_while_running() {
    let mut source = MockSource::new();
    source.expect_fetch_trades().returning(|pair, _| {
        if pair.foreign_name == "MKR-DAI" {
            Ok(vec![raw(3, "700", "0.1")])
        } else {
            Ok(Vec::new())
        }
    });

    let scraper = scraper(source, unknown_resolver());
    let mut rx = scraper.channel().unwrap();
    scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();
    scraper.start().await.unwrap();

    scraper.scrape_pair(pair("MKR-DAI")).await.unwrap();
    let record = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(record.pair, "MKR-DAI");
    assert_eq!(record.symbol, "MKR");

    scraper.close().await.unwrap();
}

#[tokio::test]
async fn test_close_interrupts_batch_delay() {
    let mut source = MockSource::new();
    source.expect_fetch_trades().returning(|_, _| Ok(Vec::new()));

    let scraper = Scraper::new(
        Exchange::named("Maker"),
        Arc::new(source),
        Arc::new(unknown_resolver()),
        // A pass then a long sleep; close must not wait it out.
        ScraperOptions::default().with_batch_delay(Duration::from_secs(3600)),
        false,
    );
    scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();
    scraper.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    timeout(WAIT, scraper.close()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_close_while_send_blocked() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let fetches_by_source = Arc::clone(&fetches);

    let mut source = MockSource::new();
    source.expect_fetch_trades().returning(move |_, _| {
        fetches_by_source.fetch_add(1, Ordering::SeqCst);
        Ok((1..=5).map(|id| raw(id, "1", "1")).collect())
    });

    let scraper = Scraper::new(
        Exchange::named("Maker"),
        Arc::new(source),
        Arc::new(unknown_resolver()),
        options().with_channel_capacity(1),
        false,
    );
    let mut rx = scraper.channel().unwrap();
    scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();
    scraper.start().await.unwrap();

    eventually(|| {
        let fetches = Arc::clone(&fetches);
        async move { fetches.load(Ordering::SeqCst) >= 1 }
    })
    .await;
    // First trade fills the channel; the worker now waits on the second.
    tokio::time::sleep(Duration::from_millis(50)).await;

    timeout(WAIT, scraper.close()).await.unwrap().unwrap();
    assert_eq!(scraper.state().await, ScraperState::Closed);

    let mut drained = 0;
    while timeout(WAIT, rx.recv()).await.unwrap().is_some() {
        drained += 1;
    }
    assert!(drained <= 1, "sent past a full channel: {drained}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_and_close() {
    for _ in 0..50 {
        let mut source = MockSource::new();
        source.expect_fetch_trades().returning(|_, _| Ok(Vec::new()));

        let scraper = Arc::new(scraper(source, unknown_resolver()));
        scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();
        scraper.start().await.unwrap();

        let registrar = tokio::spawn({
            let scraper = Arc::clone(&scraper);
            async move {
                let mut results = Vec::new();
                for i in 0..20 {
                    results.push(scraper.scrape_pair(pair(&format!("P{i}-DAI"))).await);
                    tokio::task::yield_now().await;
                }
                results
            }
        });
        let closer = tokio::spawn({
            let scraper = Arc::clone(&scraper);
            async move { scraper.close().await }
        });

        timeout(WAIT, closer).await.unwrap().unwrap().unwrap();
        let results = timeout(WAIT, registrar).await.unwrap().unwrap();

        for result in results {
            match result {
                Ok(handle) => assert!(handle.is_closed(), "{} open after close", handle.pair().foreign_name),
                Err(e) => assert_eq!(e, ScraperError::Closed),
            }
        }
        assert_eq!(scraper.state().await, ScraperState::Closed);
        assert_eq!(scraper.error().await, Some(ScraperError::ClosedByCaller));
    }
}

#[tokio::test]
async fn test_metrics_count_emitted_trades() {
    let metrics = Arc::new(MetricsRegistry::new().unwrap());

    let mut source = MockSource::new();
    source
        .expect_fetch_trades()
        .returning(|_, _| Ok(vec![raw(1, "bad", "1"), raw(2, "1", "1")]));

    let scraper = Scraper::new(
        Exchange::named("Maker"),
        Arc::new(source),
        Arc::new(unknown_resolver()),
        options().with_metrics(Arc::clone(&metrics)),
        false,
    );
    let mut rx = scraper.channel().unwrap();
    scraper.scrape_pair(pair("ETH-DAI")).await.unwrap();
    scraper.start().await.unwrap();

    timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    scraper.close().await.unwrap();

    assert_eq!(metrics.trades_emitted.with_label_values(&["Maker", "ETH-DAI"]).get(), 1);
    assert_eq!(metrics.decode_failures.with_label_values(&["Maker"]).get(), 1);
}

// ---- Supervisor ----

fn maker_config(pairs: Vec<PairConfig>) -> ExchangeConfig {
    ExchangeConfig {
        name: "Maker".to_string(),
        enabled: true,
        centralized: false,
        blockchain: "Ethereum".to_string(),
        base_url: None,
        batch_delay_secs: None,
        pairs,
    }
}

#[tokio::test]
async fn test_supervisor_discovers_and_forwards() {
    let mut source = MockSource::new();
    source
        .expect_fetch_available_pairs()
        .returning(|| Ok(vec![pair("ETH-DAI")]));
    source
        .expect_fetch_trades()
        .returning(|_, _| Ok(vec![raw(11, "250", "4")]));

    let (sink_tx, mut sink_rx) = mpsc::channel::<TradeRecord>(8);
    let health = Arc::new(HealthState::new());
    let mut supervisor = ScraperSupervisor::new(sink_tx, Arc::clone(&health));

    let registered = supervisor
        .launch(&maker_config(Vec::new()), Box::new(scraper(source, unknown_resolver())))
        .await
        .unwrap();
    assert_eq!(registered, 1);
    assert_eq!(supervisor.exchanges(), vec!["Maker"]);
    assert!(health.is_ready());

    let record = timeout(WAIT, sink_rx.recv()).await.unwrap().unwrap();
    assert_eq!(record.foreign_trade_id, "11");

    let failures = supervisor.close_all().await;
    assert!(failures.is_empty());
    assert_eq!(health.running_scrapers(), 0);
    drop(supervisor);
    assert!(timeout(WAIT, sink_rx.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_supervisor_uses_whitelist() {
    let mut source = MockSource::new();
    source.expect_fetch_available_pairs().never();
    source.expect_fetch_trades().returning(|_, _| Ok(Vec::new()));

    let (sink_tx, _sink_rx) = mpsc::channel::<TradeRecord>(8);
    let mut supervisor = ScraperSupervisor::new(sink_tx, Arc::new(HealthState::new()));

    let whitelist = vec![PairConfig {
        foreign_name: "MKR-DAI".to_string(),
        symbol: String::new(),
        verified: false,
        base_token: None,
        quote_token: None,
    }];
    let registered = supervisor
        .launch(&maker_config(whitelist), Box::new(scraper(source, unknown_resolver())))
        .await
        .unwrap();
    assert_eq!(registered, 1);

    assert!(supervisor.close_all().await.is_empty());
}

#[tokio::test]
async fn test_supervisor_rejects_exchange_without_pairs() {
    let mut source = MockSource::new();
    source.expect_fetch_available_pairs().returning(|| Ok(Vec::new()));

    let (sink_tx, _sink_rx) = mpsc::channel::<TradeRecord>(8);
    let health = Arc::new(HealthState::new());
    let mut supervisor = ScraperSupervisor::new(sink_tx, Arc::clone(&health));

    let result = supervisor
        .launch(&maker_config(Vec::new()), Box::new(scraper(source, MockResolver::new())))
        .await;
    assert!(result.is_err());
    assert!(supervisor.exchanges().is_empty());
    assert!(!health.is_ready());
}

/// Delegates to a real scraper but refuses to register one pair.
struct RejectingScraper {
    inner: Arc<Scraper>,
    reject: &'static str,
}

#[async_trait::async_trait]
impl ExchangeScraper for RejectingScraper {
    fn exchange_name(&self) -> &str {
        self.inner.exchange_name()
    }

    async fn fetch_available_pairs(&self) -> anyhow::Result<Vec<ExchangePair>> {
        self.inner.fetch_available_pairs().await
    }

    fn normalize_pair(&self, pair: ExchangePair) -> Result<ExchangePair, ScraperError> {
        self.inner.normalize_pair(pair)
    }

    fn fill_symbol_data(&self, symbol: &str) -> Asset {
        self.inner.fill_symbol_data(symbol)
    }

    async fn scrape_pair(&self, pair: ExchangePair) -> Result<PairScraper, ScraperError> {
        if pair.foreign_name == self.reject {
            return Err(ScraperError::InvalidPair(pair.foreign_name));
        }
        self.inner.scrape_pair(pair).await
    }

    async fn start(&self) -> Result<(), ScraperError> {
        self.inner.start().await
    }

    fn channel(&self) -> Option<mpsc::Receiver<TradeRecord>> {
        self.inner.channel()
    }

    async fn error(&self) -> Option<ScraperError> {
        self.inner.error().await
    }

    async fn close(&self) -> Result<(), ScraperError> {
        self.inner.close().await
    }
}

#[tokio::test]
async fn test_supervisor_closes_scraper_when_registration_fails() {
    let inner = Arc::new(scraper(MockSource::new(), MockResolver::new()));
    let rejecting = RejectingScraper {
        inner: Arc::clone(&inner),
        reject: "BAD-DAI",
    };

    let (sink_tx, _sink_rx) = mpsc::channel::<TradeRecord>(8);
    let health = Arc::new(HealthState::new());
    let mut supervisor = ScraperSupervisor::new(sink_tx, Arc::clone(&health));

    let whitelist = ["ETH-DAI", "BAD-DAI"]
        .into_iter()
        .map(|name| PairConfig {
            foreign_name: name.to_string(),
            symbol: String::new(),
            verified: false,
            base_token: None,
            quote_token: None,
        })
        .collect();
    let result = supervisor.launch(&maker_config(whitelist), Box::new(rejecting)).await;

    assert!(result.is_err());
    assert_eq!(inner.state().await, ScraperState::Closed);
    assert!(inner.pairs().await.iter().all(|p| p.foreign_name == "ETH-DAI"));
    assert!(supervisor.exchanges().is_empty());
    assert!(!health.is_ready());
}
