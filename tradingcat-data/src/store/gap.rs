use crate::kline::KLine;

/// Generate the zero volume filler candles required to bridge the gap between `previous`
/// (the newest stored candle of a series) and a candle closing at `next_close_time`.
///
/// A gap exists when the distance between close times exceeds one interval (plus 1ms of
/// tolerance). The number of fillers is `((delta + 1) / interval) - 1`. Each filler copies
/// `previous.open` into all four prices and they step forward one interval at a time from
/// `previous.close_time`.
///
/// At most the newest `max_fillers` candles of the gap are generated. Older fillers would be
/// trimmed by the series retention bound straight away. A distance that does not fit in an
/// `i64` yields no fillers.
pub fn synthesize_fillers(
    previous: &KLine,
    next_close_time: i64,
    max_fillers: usize,
) -> Vec<KLine> {
    let interval = previous.id().interval.as_millis();
    let Some(delta) = next_close_time.checked_sub(previous.close_time()) else {
        return Vec::new();
    };

    if delta <= interval + 1 {
        return Vec::new();
    }

    // (delta + 1) / interval without overflowing on delta == i64::MAX
    let steps = delta / interval + (delta % interval + 1) / interval - 1;
    let kept = steps.min(i64::try_from(max_fillers).unwrap_or(i64::MAX));
    let first_open_time = previous.close_time() + (steps - kept) * interval;

    (0..kept)
        .map(|step| KLine::filler(previous, first_open_time + step * interval))
        .collect()
}
