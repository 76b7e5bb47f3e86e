use super::{InsertStats, gap::synthesize_fillers};
use crate::kline::{KLine, KLineId};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Number of shards pre-created for each exchange: `A-Z`, `a-z` and `0-9`.
pub const SHARDS_PER_EXCHANGE: usize = 62;

/// Candle series keyed by close time.
pub type Series = BTreeMap<i64, KLine>;

/// Map an ASCII alphanumeric character onto its shard slot within one exchange.
pub fn char_slot(c: char) -> Option<usize> {
    match c {
        'A'..='Z' => Some(c as usize - 'A' as usize),
        'a'..='z' => Some(26 + c as usize - 'a' as usize),
        '0'..='9' => Some(52 + c as usize - '0' as usize),
        _ => None,
    }
}

/// One lock-protected partition of the store, owning every series whose symbol starts with
/// the same alphanumeric character on the same exchange.
#[derive(Debug, Default)]
pub struct Shard {
    series: Mutex<FnvHashMap<KLineId, Series>>,
}

impl Shard {
    /// Merge candles (sorted ascending by close time) into the series for `kline_id`, then
    /// trim it to the newest `retention` entries.
    ///
    /// Invalid candles are dropped before the lock is taken. The series is only created once
    /// a valid candle arrives for it.
    ///
    /// Returns the [`InsertStats`] and whether this call created the series.
    pub fn insert<'a, Iter>(
        &self,
        kline_id: &KLineId,
        klines: Iter,
        retention: usize,
    ) -> (InsertStats, bool)
    where
        Iter: IntoIterator<Item = &'a KLine>,
    {
        let (valid, invalid): (Vec<&KLine>, Vec<&KLine>) =
            klines.into_iter().partition(|kline| kline.is_valid());

        let mut stats = InsertStats {
            dropped: invalid.len(),
            ..InsertStats::default()
        };
        if valid.is_empty() {
            return (stats, false);
        }

        let mut guard = self.series.lock();

        let created = !guard.contains_key(kline_id);
        let series = guard.entry(kline_id.clone()).or_default();

        for kline in valid {
            let fillers = match series.last_key_value() {
                None => Vec::new(),
                Some((newest_close, _)) if kline.close_time() <= *newest_close => {
                    stats.dropped += 1;
                    continue;
                }
                Some((_, newest)) => synthesize_fillers(newest, kline.close_time(), retention),
            };

            stats.synthesized += fillers.len();
            series.extend(fillers.into_iter().map(|filler| (filler.close_time(), filler)));

            series.insert(kline.close_time(), kline.clone());
            stats.inserted += 1;
        }

        while series.len() > retention {
            series.pop_first();
            stats.trimmed += 1;
        }

        (stats, created)
    }

    /// Candles with `start <= close_time <= end`, newest first.
    pub fn range(&self, kline_id: &KLineId, start: i64, end: i64) -> Vec<KLine> {
        self.series
            .lock()
            .get(kline_id)
            .map(|series| {
                series
                    .range(start..=end)
                    .rev()
                    .map(|(_, kline)| kline.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, kline_id: &KLineId) -> usize {
        self.series
            .lock()
            .get(kline_id)
            .map(Series::len)
            .unwrap_or_default()
    }
}
