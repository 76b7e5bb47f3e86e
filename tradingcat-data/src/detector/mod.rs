use self::suppress::AlertSuppressor;
use crate::{
    exchange::StockExchangeId,
    filter::{Filter, FilterTypes, KLineFilterData, UserConfig},
    kline::{KLine, KLineId, KLineType},
    store::KLinesDataContainer,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, trace};

/// Global duplicate alert suppression.
pub mod suppress;

/// Single consumer tokio task that owns a [`Detector`].
pub mod worker;

/// Identifier of a connected user session.
pub type SessionId = i64;

/// Configuration for a [`Detector`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Only candles of this interval are evaluated.
    pub detect_interval: KLineType,
    /// Interval of the coarser confirmation window.
    pub review_interval: KLineType,
    /// Number of intervals spanned by each history window.
    pub history_len: i64,
    /// Candles that closed longer ago than this are ignored.
    pub stale_after: Duration,
    /// Minimum time between two alerts for the same `(exchange, KLineId)`.
    pub suppression_window: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detect_interval: KLineType::Min1,
            review_interval: KLineType::Min5,
            history_len: 300,
            stale_after: Duration::from_secs(20 * 60),
            suppression_window: Duration::from_secs(10 * 60),
        }
    }
}

impl DetectorConfig {
    pub fn with_history_len(mut self, history_len: i64) -> Self {
        self.history_len = history_len;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_suppression_window(mut self, window: Duration) -> Self {
        self.suppression_window = window;
        self
    }

    pub fn with_review_interval(mut self, interval: KLineType) -> Self {
        self.review_interval = interval;
        self
    }
}

/// Alert record delivered to a session.
#[derive(Debug, Clone, PartialEq)]
pub struct KLineDetectData {
    pub stock_exchange_id: StockExchangeId,
    pub filter_activate: FilterTypes,
    /// Candles of the triggering series around the evaluation time, newest first.
    pub history: Arc<[KLine]>,
    /// Candles of the same symbol at the review interval, newest first.
    pub review_history: Arc<[KLine]>,
    pub delta: f64,
    pub volume: f64,
    pub msg: String,
}

/// A [`KLineDetectData`] addressed to one [`SessionId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub session_id: SessionId,
    pub data: KLineDetectData,
}

/// Evaluates incoming candles against every online session's [`Filter`] and confirms matches
/// against the history held by the shared [`KLinesDataContainer`].
///
/// The [`Detector`] never errors. Every candle that does not qualify (wrong interval, stale,
/// blacklisted, unmatched, single axis, insufficient history, recently alerted) is skipped.
#[derive(Debug)]
pub struct Detector {
    store: Arc<KLinesDataContainer>,
    config: DetectorConfig,
    filters: FnvHashMap<SessionId, Filter>,
    suppressor: AlertSuppressor,
}

impl Detector {
    pub fn new(store: Arc<KLinesDataContainer>) -> Self {
        Self::with_config(store, DetectorConfig::default())
    }

    pub fn with_config(store: Arc<KLinesDataContainer>, config: DetectorConfig) -> Self {
        Self {
            store,
            suppressor: AlertSuppressor::new(duration_millis(config.suppression_window)),
            config,
            filters: FnvHashMap::default(),
        }
    }

    /// Register (or replace) the [`Filter`] of a session.
    pub fn user_online(&mut self, session_id: SessionId, config: UserConfig) {
        debug!(session_id, "Detector session online");
        self.filters.insert(session_id, config.filter);
    }

    /// Forget a session. Unknown sessions are ignored.
    pub fn user_offline(&mut self, session_id: SessionId) {
        if self.filters.remove(&session_id).is_some() {
            debug!(session_id, "Detector session offline");
        }
    }

    pub fn sessions(&self) -> usize {
        self.filters.len()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Evaluate a batch of candles using the wall clock as the evaluation time.
    pub fn add_klines(
        &mut self,
        stock_exchange_id: &StockExchangeId,
        klines: &[KLine],
    ) -> Vec<Detection> {
        self.add_klines_at(stock_exchange_id, klines, Utc::now().timestamp_millis())
    }

    /// Evaluate a batch of candles as of `now` (epoch milliseconds).
    ///
    /// Detections are ordered by candle, then by session. Every session matching the same
    /// candle receives its own [`Detection`], after which the instrument is suppressed for
    /// [`DetectorConfig::suppression_window`].
    pub fn add_klines_at(
        &mut self,
        stock_exchange_id: &StockExchangeId,
        klines: &[KLine],
        now: i64,
    ) -> Vec<Detection> {
        self.suppressor.prune(now);

        let mut detections = Vec::new();
        if self.filters.is_empty() || stock_exchange_id.is_empty() {
            return detections;
        }

        let stale_after = duration_millis(self.config.stale_after);

        for kline in klines {
            let kline_id = kline.id();

            if kline_id.is_empty() || kline_id.interval != self.config.detect_interval {
                continue;
            }
            // An age that does not fit in an i64 is treated as stale
            let age = now.checked_sub(kline.close_time());
            if age.is_none_or(|age| age > stale_after) {
                trace!(exchange = %stock_exchange_id, kline = %kline_id, "skipping stale kline");
                continue;
            }
            if self.suppressor.is_suppressed(stock_exchange_id, kline_id, now) {
                trace!(exchange = %stock_exchange_id, kline = %kline_id, "skipping recently alerted kline");
                continue;
            }

            let before = detections.len();
            let mut windows: Option<(Arc<[KLine]>, Arc<[KLine]>)> = None;

            for (session_id, filter) in &self.filters {
                if filter.is_black_listed(stock_exchange_id, kline_id) {
                    continue;
                }

                let Some(rule) = filter.find_rule(stock_exchange_id, kline_id) else {
                    continue;
                };

                let filter_activate = triggered_axes(kline, rule);
                if !(filter_activate.contains(FilterTypes::DELTA)
                    && filter_activate.contains(FilterTypes::VOLUME))
                {
                    continue;
                }

                let (history, review_history) = windows
                    .get_or_insert_with(|| self.history_windows(stock_exchange_id, kline_id, now));

                if history.is_empty() || review_history.is_empty() {
                    debug!(
                        exchange = %stock_exchange_id,
                        kline = %kline_id,
                        history = history.len(),
                        review_history = review_history.len(),
                        "insufficient history to confirm detection"
                    );
                    continue;
                }

                detections.push(Detection {
                    session_id: *session_id,
                    data: KLineDetectData {
                        stock_exchange_id: stock_exchange_id.clone(),
                        filter_activate,
                        history: Arc::clone(history),
                        review_history: Arc::clone(review_history),
                        delta: kline.delta(),
                        volume: kline.volume_notional(),
                        msg: detect_message(stock_exchange_id, kline),
                    },
                });
            }

            if detections.len() > before {
                info!(
                    exchange = %stock_exchange_id,
                    kline = %kline_id,
                    sessions = detections.len() - before,
                    delta = kline.delta(),
                    volume = kline.volume_notional(),
                    "kline detected"
                );
                self.suppressor.record(stock_exchange_id, kline_id, now);
            }
        }

        detections
    }

    /// History of the candle's own series and of the review interval, both spanning
    /// `history_len` intervals before `now` plus half an interval either side.
    fn history_windows(
        &self,
        stock_exchange_id: &StockExchangeId,
        kline_id: &KLineId,
        now: i64,
    ) -> (Arc<[KLine]>, Arc<[KLine]>) {
        let history = self.history_window(stock_exchange_id, kline_id, now);
        let review_history = self.history_window(
            stock_exchange_id,
            &kline_id.with_interval(self.config.review_interval),
            now,
        );
        (history.into(), review_history.into())
    }

    fn history_window(
        &self,
        stock_exchange_id: &StockExchangeId,
        kline_id: &KLineId,
        now: i64,
    ) -> Vec<KLine> {
        let interval = kline_id.interval.as_millis();
        let start = now
            .saturating_sub(interval.saturating_mul(self.config.history_len))
            .saturating_sub(interval / 2);
        let end = now.saturating_add(interval / 2);

        self.store
            .get_klines_on_date(stock_exchange_id, kline_id, start, end)
            .unwrap_or_else(|error| {
                debug!(%error, kline = %kline_id, "failed to read detection history");
                Vec::new()
            })
    }
}

fn triggered_axes(kline: &KLine, rule: &KLineFilterData) -> FilterTypes {
    let mut triggered = FilterTypes::default();
    if kline.delta() > rule.delta_threshold() {
        triggered.insert(FilterTypes::DELTA);
    }
    if kline.volume_notional() > rule.volume_threshold() {
        triggered.insert(FilterTypes::VOLUME);
    }
    triggered
}

/// eg/ `OKX->BTCUSDT:1m (12:34) High:110 Open:100 Close:105 Low:100 Volume:25 DELTA:10.000000, VOLUME:2562.500000(25 slots)`
fn detect_message(stock_exchange_id: &StockExchangeId, kline: &KLine) -> String {
    let close_time = DateTime::<Utc>::from_timestamp_millis(kline.close_time())
        .map(|time| time.format("%H:%M").to_string())
        .unwrap_or_default();

    format!(
        "{}->{} ({}) High:{} Open:{} Close:{} Low:{} Volume:{} DELTA:{:.6}, VOLUME:{:.6}({:.0} slots)",
        stock_exchange_id,
        kline.id(),
        close_time,
        kline.high(),
        kline.open(),
        kline.close(),
        kline.low(),
        kline.volume(),
        kline.delta(),
        kline.volume_notional(),
        kline.volume(),
    )
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
