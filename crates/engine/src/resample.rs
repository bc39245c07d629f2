//! Tick → candle aggregation.
//!
//! Pure and restartable: the same tick set always yields the same candles,
//! whatever order the ticks arrive in.

use tracing::debug;

use common::{Candle, ResampleConfig, Tick};

/// Partition ticks into (price ticks, payout telemetry).
pub fn split_payout_ticks(ticks: &[Tick]) -> (Vec<&Tick>, Vec<&Tick>) {
    ticks.iter().partition(|t| !t.is_payout())
}

/// Aggregate ticks into fixed-interval candles, ascending by timestamp.
///
/// - payout ticks are dropped when `drop_payout_ticks` is set;
/// - ticks with a non-finite timestamp or price, or whose bucket start does
///   not fit in an `i64` millisecond timestamp, are ignored;
/// - bucket = floor(ts / interval) · interval, candle timestamp in ms;
/// - only non-empty buckets are emitted, gaps are never backfilled;
/// - volume is the tick count;
/// - buckets with fewer than `min_ticks` ticks are dropped.
///
/// Ticks sharing a timestamp are ordered by price so the open and close of a
/// bucket do not depend on input order.
pub fn resample_ticks(ticks: &[Tick], config: &ResampleConfig) -> Vec<Candle> {
    let interval = i64::from(config.interval_secs.max(1));

    let mut prices: Vec<(i64, &Tick)> = ticks
        .iter()
        .filter(|t| t.timestamp.is_finite() && t.price().is_finite())
        .filter(|t| !(config.drop_payout_ticks && t.is_payout()))
        .filter_map(|t| bucket_start_ms(t.timestamp, interval).map(|b| (b, t)))
        .collect();
    let dropped = ticks.len() - prices.len();

    prices.sort_by(|(_, a), (_, b)| {
        a.timestamp
            .total_cmp(&b.timestamp)
            .then(a.price().total_cmp(&b.price()))
    });

    let mut candles: Vec<Candle> = Vec::new();
    let mut current: Option<(i64, Candle)> = None;

    for (bucket, tick) in prices {
        let price = tick.price();

        if let Some((b, candle)) = current.as_mut() {
            if *b == bucket {
                candle.high = candle.high.max(price);
                candle.low = candle.low.min(price);
                candle.close = price;
                candle.volume += 1.0;
                continue;
            }
        }
        if let Some((_, done)) = current.take() {
            push_bucket(&mut candles, done, config.min_ticks);
        }
        current = Some((
            bucket,
            Candle::new(bucket, price, price, price, price, 1.0),
        ));
    }
    if let Some((_, done)) = current {
        push_bucket(&mut candles, done, config.min_ticks);
    }

    debug!(
        ticks = ticks.len(),
        dropped,
        candles = candles.len(),
        interval_secs = config.interval_secs,
        "Resampled ticks"
    );
    candles
}

/// Bucket start in ms, or `None` when it falls outside the `i64` range.
fn bucket_start_ms(timestamp_secs: f64, interval: i64) -> Option<i64> {
    let index = (timestamp_secs / interval as f64).floor();
    if index < i64::MIN as f64 || index >= i64::MAX as f64 {
        return None;
    }
    (index as i64).checked_mul(interval)?.checked_mul(1000)
}

fn push_bucket(candles: &mut Vec<Candle>, candle: Candle, min_ticks: usize) {
    if candle.volume >= min_ticks as f64 {
        candles.push(candle);
    }
}
