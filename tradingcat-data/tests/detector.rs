use std::sync::Arc;
use tradingcat_data::{
    BlackListFilterData, Detector, Filter, FilterTypes, KLine, KLineFilterData, KLineId,
    KLineType, KLinesDataContainer, StockExchangeId, UserConfig,
};

const MINUTE: i64 = 60_000;
const NOW: i64 = 1_714_000_000_000;

fn okx() -> StockExchangeId {
    StockExchangeId::new("OKX")
}

fn binance() -> StockExchangeId {
    StockExchangeId::new("BINANCE")
}

fn btc(interval: KLineType) -> KLineId {
    KLineId::new("BTCUSDT", interval)
}

fn warmup(id: &KLineId, close_time: i64) -> KLine {
    KLine::new(id.clone(), close_time - id.interval.as_millis(), close_time)
        .with_prices(100.0, 100.5, 99.5, 100.2)
        .with_volume(3.0, 300.0)
}

fn candle(high: f64, low: f64, volume: f64, close_time: i64) -> KLine {
    KLine::new(btc(KLineType::Min1), close_time - MINUTE, close_time)
        .with_prices(100.0, high, low, 100.0)
        .with_volume(volume, volume * 100.0)
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn config(json: &str) -> UserConfig {
    UserConfig::from_json(json).unwrap()
}

/// Store pre-filled with 1m and 5m warm-up history ending just before [`NOW`] on every
/// provided exchange.
fn warm_store(exchanges: &[StockExchangeId]) -> Arc<KLinesDataContainer> {
    let store = KLinesDataContainer::new(exchanges.iter().cloned()).unwrap();

    let minutes = (1..=301)
        .rev()
        .map(|step| warmup(&btc(KLineType::Min1), NOW - 1_000 - step * MINUTE))
        .collect::<Vec<_>>();
    let fives = (1..=60)
        .rev()
        .map(|step| warmup(&btc(KLineType::Min5), NOW - step * 5 * MINUTE))
        .collect::<Vec<_>>();

    for exchange in exchanges {
        store.add_klines(exchange, &minutes).unwrap();
        store.add_klines(exchange, &fives).unwrap();
    }

    Arc::new(store)
}

#[test]
fn test_dual_trigger_example() {
    struct TestCase {
        input: KLine,
        expected: usize,
    }

    let rule = r#"{"Filter": {"Filters": [{"Delta": 5.0, "Volume": 2000.0}]}}"#;

    let tests = vec![
        TestCase {
            // TC0: delta 10%, notional 2500
            input: candle(110.0, 100.0, 25.0, NOW - 1_000),
            expected: 1,
        },
        TestCase {
            // TC1: delta 10%, notional 1000
            input: candle(110.0, 100.0, 10.0, NOW - 1_000),
            expected: 0,
        },
        TestCase {
            // TC2: delta 2%, notional 2500
            input: candle(102.0, 100.0, 25.0, NOW - 1_000),
            expected: 0,
        },
    ];

    for (index, test) in tests.into_iter().enumerate() {
        let mut detector = Detector::new(warm_store(&[okx()]));
        detector.user_online(1, config(rule));

        let actual = detector.add_klines_at(&okx(), &[test.input], NOW);
        assert_eq!(actual.len(), test.expected, "TC{} failed", index);
    }
}

#[test]
fn test_blacklist_overrides_matching_rule() {
    let store = warm_store(&[okx(), binance()]);
    let mut detector = Detector::new(store);

    let black_listed = UserConfig::new(
        Filter::new(
            vec![KLineFilterData::unscoped(5.0, 2000.0).unwrap()],
            vec![BlackListFilterData::new(Some(binance()), None)],
        )
        .unwrap(),
    );
    detector.user_online(1, black_listed);

    let spike = candle(110.0, 100.0, 25.0, NOW - 1_000);
    assert!(detector.add_klines_at(&binance(), &[spike.clone()], NOW).is_empty());

    // The same session is still alerted for other exchanges
    let detections = detector.add_klines_at(&okx(), &[spike], NOW);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].data.stock_exchange_id, okx());
}

#[test]
fn test_staleness_gate() {
    let mut detector = Detector::new(warm_store(&[okx()]));
    detector.user_online(
        1,
        config(r#"{"Filter": {"Filters": [{"Delta": 5.0, "Volume": 2000.0}]}}"#),
    );

    let stale = candle(110.0, 100.0, 25.0, NOW - 20 * MINUTE - 1);
    assert!(detector.add_klines_at(&okx(), &[stale], NOW).is_empty());
}

#[test]
fn test_end_to_end_scenario() {
    init_logging();

    let store = Arc::new(KLinesDataContainer::new([okx()]).unwrap());
    let mut detector = Detector::new(Arc::clone(&store));
    detector.user_online(
        7,
        config(
            r#"
            {
                "Filter": {
                    "Filters": [
                        {
                            "StockExchange": {"Name": "OKX"},
                            "ID": {"Symbol": "BTCUSDT", "Type": "1m"},
                            "Delta": 5,
                            "Volume": 2000
                        }
                    ],
                    "BlackList": []
                }
            }
            "#,
        ),
    );

    // Review series
    let fives = (1..=60)
        .rev()
        .map(|step| warmup(&btc(KLineType::Min5), NOW - step * 5 * MINUTE))
        .collect::<Vec<_>>();
    store.add_klines(&okx(), &fives).unwrap();
    assert!(detector.add_klines_at(&okx(), &fives, NOW).is_empty());

    // 301 warm-up candles, each ingested then evaluated like a live feed
    let minutes = (1..=301)
        .rev()
        .map(|step| warmup(&btc(KLineType::Min1), NOW - 1_000 - step * MINUTE))
        .collect::<Vec<_>>();
    for kline in &minutes {
        store.add_klines(&okx(), std::slice::from_ref(kline)).unwrap();
        assert!(detector
            .add_klines_at(&okx(), std::slice::from_ref(kline), NOW)
            .is_empty());
    }

    let spike = candle(110.0, 100.0, 25.0, NOW - 1_000);
    store.add_klines(&okx(), &[spike.clone()]).unwrap();
    let detections = detector.add_klines_at(&okx(), &[spike], NOW);

    assert_eq!(detections.len(), 1);

    let detection = &detections[0];
    assert_eq!(detection.session_id, 7);
    assert!(detection.data.filter_activate.contains(FilterTypes::DELTA));
    assert!(detection.data.filter_activate.contains(FilterTypes::VOLUME));
    assert!(detection.data.history.len() >= 300);
    assert!(!detection.data.review_history.is_empty());
    assert_eq!(
        detection.data.history.first().map(KLine::close_time),
        Some(NOW - 1_000)
    );
    assert!(detection.data.msg.starts_with("OKX->BTCUSDT:1m ("));
    assert!(detection.data.msg.ends_with("DELTA:10.000000, VOLUME:2500.000000(25 slots)"));
}
