use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::resolution::Resolution;

/// Prices of one bidding zone at a fixed resolution, keyed by interval start.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub resolution_minutes: u32,
    pub prices: BTreeMap<DateTime<Utc>, f64>,
}

impl PriceSeries {
    pub fn new(resolution_minutes: u32) -> Self {
        Self {
            resolution_minutes,
            prices: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Keep intervals starting in `[start, end)`.
    pub fn retain_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.prices.retain(|ts, _| *ts >= start && *ts < end);
    }

    /// Change the interval length. Finer intervals repeat the coarse price,
    /// coarser intervals average the prices they cover.
    pub fn resample(&self, minutes: u32) -> PriceSeries {
        let native = self.resolution_minutes;
        if minutes == native || minutes == 0 {
            return self.clone();
        }

        let mut out = PriceSeries::new(minutes);
        if minutes < native {
            let step = Duration::minutes(i64::from(minutes));
            let span = Duration::minutes(i64::from(native));
            for (ts, price) in &self.prices {
                let mut t = *ts;
                while t < *ts + span {
                    out.prices.insert(t, *price);
                    t += step;
                }
            }
            return out;
        }

        let bucket_secs = i64::from(minutes) * 60;
        let mut buckets: BTreeMap<DateTime<Utc>, (f64, u32)> = BTreeMap::new();
        for (ts, price) in &self.prices {
            let offset = ts.timestamp().rem_euclid(bucket_secs);
            let bucket = *ts - Duration::seconds(offset);
            let entry = buckets.entry(bucket).or_insert((0.0, 0));
            entry.0 += price;
            entry.1 += 1;
        }
        out.prices = buckets
            .into_iter()
            .map(|(ts, (sum, n))| (ts, sum / f64::from(n)))
            .collect();
        out
    }
}

/// Pick the series matching `resolution` out of everything a zone published.
///
/// `SdacMtu` takes the finest resolution. A fixed resolution uses the exact
/// match when published, otherwise resamples the finest series.
pub fn select(series: Vec<PriceSeries>, resolution: Resolution) -> Option<PriceSeries> {
    let mut series: Vec<PriceSeries> = series.into_iter().filter(|s| !s.is_empty()).collect();
    series.sort_by_key(|s| s.resolution_minutes);

    match resolution {
        Resolution::SdacMtu => series.into_iter().next(),
        Resolution::Minutes(m) => {
            if let Some(i) = series.iter().position(|s| s.resolution_minutes == m) {
                return Some(series.swap_remove(i));
            }
            series.first().map(|finest| finest.resample(m))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, h, m, 0).unwrap()
    }

    fn quarter_hourly() -> PriceSeries {
        let mut s = PriceSeries::new(15);
        for (i, p) in [10.0, 20.0, 30.0, 40.0, 50.0].into_iter().enumerate() {
            let i = u32::try_from(i).unwrap();
            s.prices.insert(at(i / 4, (i % 4) * 15), p);
        }
        s
    }

    #[test]
    fn coarser_resampling_averages() {
        let hourly = quarter_hourly().resample(60);
        assert_eq!(hourly.resolution_minutes, 60);
        assert_eq!(hourly.prices.get(&at(0, 0)), Some(&25.0));
        assert_eq!(hourly.prices.get(&at(1, 0)), Some(&50.0));
        assert_eq!(hourly.len(), 2);
    }

    #[test]
    fn finer_resampling_repeats() {
        let mut hourly = PriceSeries::new(60);
        hourly.prices.insert(at(0, 0), 42.0);
        let quarters = hourly.resample(15);
        assert_eq!(quarters.len(), 4);
        assert!(quarters.prices.values().all(|p| *p == 42.0));
        assert_eq!(quarters.prices.keys().last(), Some(&at(0, 45)));
    }

    #[test]
    fn select_prefers_exact_then_finest() {
        let mut hourly = PriceSeries::new(60);
        hourly.prices.insert(at(0, 0), 1.0);

        let picked = select(vec![hourly.clone(), quarter_hourly()], Resolution::Minutes(60)).unwrap();
        assert_eq!(picked, hourly);

        let mtu = select(vec![hourly.clone(), quarter_hourly()], Resolution::SdacMtu).unwrap();
        assert_eq!(mtu.resolution_minutes, 15);

        let thirty = select(vec![hourly, quarter_hourly()], Resolution::Minutes(30)).unwrap();
        assert_eq!(thirty.prices.get(&at(0, 0)), Some(&15.0));

        assert!(select(vec![PriceSeries::new(60)], Resolution::SdacMtu).is_none());
    }

    #[test]
    fn retain_range_is_half_open() {
        let mut s = quarter_hourly();
        s.retain_range(at(0, 15), at(1, 0));
        assert_eq!(s.prices.keys().copied().collect::<Vec<_>>(), vec![at(0, 15), at(0, 30), at(0, 45)]);
    }
}
