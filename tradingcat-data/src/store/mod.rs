use self::shard::{SHARDS_PER_EXCHANGE, Shard, char_slot};
use crate::{
    error::DataError,
    exchange::StockExchangeId,
    kline::{KLine, KLineId, Symbol},
};
use fnv::{FnvHashMap, FnvHashSet};
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Gap repair between consecutive candles of a series.
pub mod gap;

/// Lock-protected storage partitions.
mod shard;

/// Configuration for a [`KLinesDataContainer`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of candles retained per series. Oldest candles are trimmed first.
    pub retention: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { retention: 1000 }
    }
}

impl StoreConfig {
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }
}

/// Outcome of a single [`KLinesDataContainer::add_klines`] call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct InsertStats {
    /// Candles from the batch that were stored.
    pub inserted: usize,
    /// Zero volume filler candles generated to repair gaps.
    pub synthesized: usize,
    /// Candles discarded as duplicate, out-of-order or invalid.
    pub dropped: usize,
    /// Oldest candles evicted to respect the retention bound.
    pub trimmed: usize,
}

/// Concurrent, sharded in-memory store of recent candles for every `(exchange, KLineId)`
/// series.
///
/// The set of exchanges is fixed at construction, and so is the shard table: 62 shards per
/// exchange, selected by the first alphanumeric character of the symbol. Each shard is
/// protected by its own lock, so writers on different shards never contend. Locks are only
/// held for a single merge or range copy.
#[derive(Debug)]
pub struct KLinesDataContainer {
    config: StoreConfig,
    stock_exchanges: Vec<StockExchangeId>,
    stock_exchange_index: FnvHashMap<StockExchangeId, usize>,
    shards: Vec<Shard>,
    kline_ids: Vec<RwLock<FnvHashSet<KLineId>>>,
    money_count: Mutex<usize>,
}

impl KLinesDataContainer {
    /// Construct a [`KLinesDataContainer`] for the provided exchanges using the default
    /// [`StoreConfig`].
    pub fn new<Iter>(stock_exchanges: Iter) -> Result<Self, DataError>
    where
        Iter: IntoIterator<Item = StockExchangeId>,
    {
        Self::with_config(stock_exchanges, StoreConfig::default())
    }

    /// Construct a [`KLinesDataContainer`] for the provided exchanges. Duplicate exchanges
    /// are collapsed, keeping the first occurrence's position.
    pub fn with_config<Iter>(stock_exchanges: Iter, config: StoreConfig) -> Result<Self, DataError>
    where
        Iter: IntoIterator<Item = StockExchangeId>,
    {
        let stock_exchanges = stock_exchanges.into_iter().unique().collect::<Vec<_>>();

        if stock_exchanges.is_empty() {
            return Err(DataError::NoStockExchanges);
        }
        if stock_exchanges.iter().any(StockExchangeId::is_empty) {
            return Err(DataError::EmptyStockExchangeId);
        }

        let stock_exchange_index = stock_exchanges
            .iter()
            .enumerate()
            .map(|(index, exchange)| (exchange.clone(), index))
            .collect();

        let shards = std::iter::repeat_with(Shard::default)
            .take(stock_exchanges.len() * SHARDS_PER_EXCHANGE)
            .collect();

        let kline_ids = std::iter::repeat_with(|| RwLock::new(FnvHashSet::default()))
            .take(stock_exchanges.len())
            .collect();

        debug!(
            exchanges = %stock_exchanges.iter().join(","),
            retention = config.retention,
            "initialised KLinesDataContainer"
        );

        Ok(Self {
            config,
            stock_exchanges,
            stock_exchange_index,
            shards,
            kline_ids,
            money_count: Mutex::new(0),
        })
    }

    /// Merge a batch of candles for one series of one exchange into the store.
    ///
    /// Candles are sorted by close time first. Candles not strictly newer than the newest
    /// stored candle are dropped, gaps are bridged with zero volume filler candles, and the
    /// series is trimmed to the retention bound afterwards.
    ///
    /// Errors on caller contract violations only: empty exchange id, empty batch, a batch
    /// spanning several [`KLineId`]s, an exchange outside the configured set, or a symbol
    /// without any alphanumeric character.
    pub fn add_klines(
        &self,
        stock_exchange_id: &StockExchangeId,
        klines: &[KLine],
    ) -> Result<InsertStats, DataError> {
        if stock_exchange_id.is_empty() {
            return Err(DataError::EmptyStockExchangeId);
        }

        let kline_id = klines.first().ok_or(DataError::EmptyBatch)?.id();
        if kline_id.is_empty() {
            return Err(DataError::EmptyKLineId);
        }
        if let Some(mismatch) = klines.iter().find(|kline| kline.id() != kline_id) {
            return Err(DataError::MixedBatch {
                expected: kline_id.clone(),
                found: mismatch.id().clone(),
            });
        }

        let exchange_index = *self
            .stock_exchange_index
            .get(stock_exchange_id)
            .ok_or_else(|| DataError::UnknownStockExchange(stock_exchange_id.clone()))?;

        let shard = self
            .shard(exchange_index, &kline_id.symbol)
            .ok_or_else(|| DataError::UnshardableSymbol(kline_id.symbol.clone()))?;

        let (stats, created) = shard.insert(
            kline_id,
            klines.iter().sorted_by_key(|kline| kline.close_time()),
            self.config.retention,
        );

        if created {
            *self.money_count.lock() += 1;
            self.kline_ids[exchange_index]
                .write()
                .insert(kline_id.clone());

            debug!(exchange = %stock_exchange_id, kline = %kline_id, "created kline series");
        }

        if stats.synthesized > 0 {
            warn!(
                exchange = %stock_exchange_id,
                kline = %kline_id,
                synthesized = stats.synthesized,
                "kline series gap repaired with zero volume candles"
            );
        }

        if stats.dropped > 0 || stats.trimmed > 0 {
            debug!(
                exchange = %stock_exchange_id,
                kline = %kline_id,
                dropped = stats.dropped,
                trimmed = stats.trimmed,
                "kline batch merged"
            );
        }

        Ok(stats)
    }

    /// Candles of one series with `start <= close_time <= end`, newest first.
    ///
    /// Unknown exchanges and series yield an empty list. Errors on caller contract
    /// violations only: empty ids or `start >= end`.
    pub fn get_klines_on_date(
        &self,
        stock_exchange_id: &StockExchangeId,
        kline_id: &KLineId,
        start: i64,
        end: i64,
    ) -> Result<Vec<KLine>, DataError> {
        if stock_exchange_id.is_empty() {
            return Err(DataError::EmptyStockExchangeId);
        }
        if kline_id.is_empty() {
            return Err(DataError::EmptyKLineId);
        }
        if start >= end {
            return Err(DataError::InvalidRange { start, end });
        }

        Ok(self
            .stock_exchange_index
            .get(stock_exchange_id)
            .and_then(|index| self.shard(*index, &kline_id.symbol))
            .map(|shard| shard.range(kline_id, start, end))
            .unwrap_or_default())
    }

    /// Every [`KLineId`] stored for the provided exchange.
    pub fn get_kline_list(&self, stock_exchange_id: &StockExchangeId) -> FnvHashSet<KLineId> {
        self.stock_exchange_index
            .get(stock_exchange_id)
            .map(|index| self.kline_ids[*index].read().clone())
            .unwrap_or_default()
    }

    pub fn get_stock_exchange_list(&self) -> &[StockExchangeId] {
        &self.stock_exchanges
    }

    /// Number of distinct `(exchange, KLineId)` series ever created.
    pub fn money_count(&self) -> usize {
        *self.money_count.lock()
    }

    /// Number of candles currently stored for one series.
    pub fn series_len(&self, stock_exchange_id: &StockExchangeId, kline_id: &KLineId) -> usize {
        self.stock_exchange_index
            .get(stock_exchange_id)
            .and_then(|index| self.shard(*index, &kline_id.symbol))
            .map(|shard| shard.len(kline_id))
            .unwrap_or_default()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn shard(&self, exchange_index: usize, symbol: &Symbol) -> Option<&Shard> {
        let slot = symbol.shard_char().and_then(char_slot)?;
        self.shards.get(exchange_index * SHARDS_PER_EXCHANGE + slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kline::KLineType;

    const MINUTE: i64 = 60_000;

    fn okx() -> StockExchangeId {
        StockExchangeId::new("OKX")
    }

    fn btc_1m() -> KLineId {
        KLineId::new("BTCUSDT", KLineType::Min1)
    }

    fn candle(id: &KLineId, close_time: i64, open: f64) -> KLine {
        KLine::new(id.clone(), close_time - id.interval.as_millis(), close_time)
            .with_prices(open, open + 1.0, open - 1.0, open + 0.5)
            .with_volume(10.0, 10.0 * open)
    }

    fn container() -> KLinesDataContainer {
        KLinesDataContainer::new([okx(), StockExchangeId::new("BYBIT")]).unwrap()
    }

    #[test]
    fn test_store_new() {
        struct TestCase {
            input: Vec<StockExchangeId>,
            expected: Result<usize, DataError>,
        }

        let tests = vec![
            TestCase {
                // TC0: two exchanges
                input: vec![okx(), StockExchangeId::new("BYBIT")],
                expected: Ok(2),
            },
            TestCase {
                // TC1: duplicates collapsed
                input: vec![okx(), okx()],
                expected: Ok(1),
            },
            TestCase {
                // TC2: no exchanges
                input: vec![],
                expected: Err(DataError::NoStockExchanges),
            },
            TestCase {
                // TC3: empty exchange id
                input: vec![okx(), StockExchangeId::default()],
                expected: Err(DataError::EmptyStockExchangeId),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = KLinesDataContainer::new(test.input)
                .map(|store| store.get_stock_exchange_list().len());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_add_klines_contract_violations() {
        struct TestCase {
            exchange: StockExchangeId,
            input: Vec<KLine>,
            expected: DataError,
        }

        let eth = KLineId::new("ETHUSDT", KLineType::Min1);

        let tests = vec![
            TestCase {
                // TC0: empty exchange id
                exchange: StockExchangeId::default(),
                input: vec![candle(&btc_1m(), MINUTE, 1.0)],
                expected: DataError::EmptyStockExchangeId,
            },
            TestCase {
                // TC1: empty batch
                exchange: okx(),
                input: vec![],
                expected: DataError::EmptyBatch,
            },
            TestCase {
                // TC2: mixed series
                exchange: okx(),
                input: vec![candle(&btc_1m(), MINUTE, 1.0), candle(&eth, 2 * MINUTE, 1.0)],
                expected: DataError::MixedBatch {
                    expected: btc_1m(),
                    found: eth.clone(),
                },
            },
            TestCase {
                // TC3: exchange outside configured set
                exchange: StockExchangeId::new("KUCOIN"),
                input: vec![candle(&btc_1m(), MINUTE, 1.0)],
                expected: DataError::UnknownStockExchange(StockExchangeId::new("KUCOIN")),
            },
            TestCase {
                // TC4: symbol without alphanumeric characters
                exchange: okx(),
                input: vec![candle(&KLineId::new("--", KLineType::Min1), MINUTE, 1.0)],
                expected: DataError::UnshardableSymbol(Symbol::from("--")),
            },
        ];

        let store = container();

        for (index, test) in tests.into_iter().enumerate() {
            let actual = store.add_klines(&test.exchange, &test.input);
            assert_eq!(actual, Err(test.expected), "TC{} failed", index);
        }

        assert_eq!(store.money_count(), 0);
    }

    #[test]
    fn test_add_klines_sorts_and_drops_duplicates() {
        let store = container();
        let id = btc_1m();

        let stats = store
            .add_klines(
                &okx(),
                &[candle(&id, 3 * MINUTE, 3.0), candle(&id, MINUTE, 1.0), candle(&id, 2 * MINUTE, 2.0)],
            )
            .unwrap();
        assert_eq!(stats.inserted, 3);
        assert_eq!(stats.synthesized, 0);

        // Re-delivery of an overlapping batch only appends the new candle
        let stats = store
            .add_klines(&okx(), &[candle(&id, 2 * MINUTE, 9.0), candle(&id, 4 * MINUTE, 4.0)])
            .unwrap();
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.dropped, 1);

        let actual = store
            .get_klines_on_date(&okx(), &id, 0, 10 * MINUTE)
            .unwrap()
            .iter()
            .map(KLine::close_time)
            .collect::<Vec<_>>();
        assert_eq!(actual, vec![4 * MINUTE, 3 * MINUTE, 2 * MINUTE, MINUTE]);

        // Stored value for 2 minutes is the original
        let stored = store
            .get_klines_on_date(&okx(), &id, 2 * MINUTE, 2 * MINUTE + 1)
            .unwrap();
        assert_eq!(stored, vec![candle(&id, 2 * MINUTE, 2.0)]);
    }

    #[test]
    fn test_add_klines_gap_fill() {
        let store = container();
        let id = btc_1m();

        store.add_klines(&okx(), &[candle(&id, MINUTE, 7.0)]).unwrap();
        let stats = store.add_klines(&okx(), &[candle(&id, 5 * MINUTE, 8.0)]).unwrap();
        assert_eq!(stats.synthesized, 3);

        let stored = store.get_klines_on_date(&okx(), &id, 0, 5 * MINUTE).unwrap();
        assert_eq!(stored.len(), 5);

        let close_times = stored.iter().map(KLine::close_time).collect::<Vec<_>>();
        assert_eq!(
            close_times,
            vec![5 * MINUTE, 4 * MINUTE, 3 * MINUTE, 2 * MINUTE, MINUTE]
        );

        for filler in &stored[1..4] {
            assert_eq!(filler.volume(), 0.0);
            assert_eq!(filler.quote_asset_volume(), 0.0);
            assert_eq!(
                [filler.open(), filler.high(), filler.low(), filler.close()],
                [7.0; 4]
            );
            assert_eq!(filler.close_time() - filler.open_time(), MINUTE);
        }
    }

    #[test]
    fn test_add_klines_retention() {
        let store = KLinesDataContainer::with_config([okx()], StoreConfig::default()).unwrap();
        let id = btc_1m();

        let batch = (1..=1100)
            .map(|step| candle(&id, step * MINUTE, step as f64))
            .collect::<Vec<_>>();

        let stats = store.add_klines(&okx(), &batch).unwrap();
        assert_eq!(stats.trimmed, 100);
        assert_eq!(store.series_len(&okx(), &id), 1000);

        let stored = store
            .get_klines_on_date(&okx(), &id, 0, 2000 * MINUTE)
            .unwrap();
        assert_eq!(stored.first().map(KLine::close_time), Some(1100 * MINUTE));
        assert_eq!(stored.last().map(KLine::close_time), Some(101 * MINUTE));
    }

    #[test]
    fn test_get_klines_on_date() {
        struct TestCase {
            exchange: StockExchangeId,
            kline_id: KLineId,
            start: i64,
            end: i64,
            expected: Result<Vec<i64>, DataError>,
        }

        let store = container();
        let id = btc_1m();
        let batch = (1..=10)
            .map(|step| candle(&id, step * MINUTE, 1.0))
            .collect::<Vec<_>>();
        store.add_klines(&okx(), &batch).unwrap();

        let tests = vec![
            TestCase {
                // TC0: bounds are inclusive
                exchange: okx(),
                kline_id: id.clone(),
                start: 3 * MINUTE,
                end: 5 * MINUTE,
                expected: Ok(vec![5 * MINUTE, 4 * MINUTE, 3 * MINUTE]),
            },
            TestCase {
                // TC1: window beyond the newest candle
                exchange: okx(),
                kline_id: id.clone(),
                start: 11 * MINUTE,
                end: 20 * MINUTE,
                expected: Ok(vec![]),
            },
            TestCase {
                // TC2: unknown series
                exchange: okx(),
                kline_id: id.with_interval(KLineType::Min5),
                start: 0,
                end: 20 * MINUTE,
                expected: Ok(vec![]),
            },
            TestCase {
                // TC3: unknown exchange
                exchange: StockExchangeId::new("MEXC"),
                kline_id: id.clone(),
                start: 0,
                end: 20 * MINUTE,
                expected: Ok(vec![]),
            },
            TestCase {
                // TC4: empty range
                exchange: okx(),
                kline_id: id.clone(),
                start: 5 * MINUTE,
                end: 5 * MINUTE,
                expected: Err(DataError::InvalidRange {
                    start: 5 * MINUTE,
                    end: 5 * MINUTE,
                }),
            },
            TestCase {
                // TC5: empty kline id
                exchange: okx(),
                kline_id: KLineId::new("", KLineType::Min1),
                start: 0,
                end: MINUTE,
                expected: Err(DataError::EmptyKLineId),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = store
                .get_klines_on_date(&test.exchange, &test.kline_id, test.start, test.end)
                .map(|klines| klines.iter().map(KLine::close_time).collect::<Vec<_>>());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_money_count_and_kline_list() {
        let store = container();
        let btc = btc_1m();
        let btc_5m = btc.with_interval(KLineType::Min5);
        let bybit = StockExchangeId::new("BYBIT");

        store.add_klines(&okx(), &[candle(&btc, MINUTE, 1.0)]).unwrap();
        store.add_klines(&okx(), &[candle(&btc, 2 * MINUTE, 1.0)]).unwrap();
        store.add_klines(&okx(), &[candle(&btc_5m, 5 * MINUTE, 1.0)]).unwrap();
        store.add_klines(&bybit, &[candle(&btc, MINUTE, 1.0)]).unwrap();

        // A batch without any valid candle does not create a series
        let eth = KLineId::new("ETHUSDT", KLineType::Min1);
        let stats = store
            .add_klines(&okx(), &[KLine::new(eth.clone(), 2 * MINUTE, MINUTE)])
            .unwrap();
        assert_eq!(stats.dropped, 1);
        assert_eq!(store.series_len(&okx(), &eth), 0);

        assert_eq!(store.money_count(), 3);
        assert_eq!(
            store.get_kline_list(&okx()),
            FnvHashSet::from_iter([btc.clone(), btc_5m.clone()])
        );
        assert_eq!(store.get_kline_list(&bybit), FnvHashSet::from_iter([btc]));
        assert!(store.get_kline_list(&StockExchangeId::new("MEXC")).is_empty());
    }
}
