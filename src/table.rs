use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::currency::ExchangeRates;
use crate::error::{Error, Result};
use crate::series::PriceSeries;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceUnit {
    EurPerMwh,
    NokPerKwh,
}

impl fmt::Display for PriceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PriceUnit::EurPerMwh => "EUR/MWh",
            PriceUnit::NokPerKwh => "NOK/kWh",
        })
    }
}

/// Prices per interval start (rows) and bidding zone (columns).
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    unit: PriceUnit,
    timezone: Tz,
    zones: Vec<String>,
    rows: BTreeMap<DateTime<Utc>, Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSummary {
    pub zone: String,
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl PriceTable {
    /// Align the series on the union of their timestamps. Columns keep the
    /// given order.
    pub fn from_series(unit: PriceUnit, timezone: Tz, columns: Vec<(String, PriceSeries)>) -> Self {
        let index: BTreeSet<DateTime<Utc>> = columns
            .iter()
            .flat_map(|(_, s)| s.prices.keys().copied())
            .collect();

        let rows = index
            .into_iter()
            .map(|ts| {
                let cells = columns.iter().map(|(_, s)| s.prices.get(&ts).copied()).collect();
                (ts, cells)
            })
            .collect();

        Self {
            unit,
            timezone,
            zones: columns.into_iter().map(|(zone, _)| zone).collect(),
            rows,
        }
    }

    pub fn unit(&self) -> PriceUnit {
        self.unit
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&DateTime<Utc>, &[Option<f64>])> {
        self.rows.iter().map(|(ts, cells)| (ts, cells.as_slice()))
    }

    pub fn column(&self, zone: &str) -> Option<Vec<(DateTime<Utc>, Option<f64>)>> {
        let i = self.zones.iter().position(|z| z == zone)?;
        Some(self.rows.iter().map(|(ts, cells)| (*ts, cells[i])).collect())
    }

    /// Fill gaps with the last known price of the same zone.
    pub fn forward_fill(&mut self) {
        let mut last: Vec<Option<f64>> = vec![None; self.zones.len()];
        for cells in self.rows.values_mut() {
            for (cell, prev) in cells.iter_mut().zip(last.iter_mut()) {
                if cell.is_some() {
                    *prev = *cell;
                } else {
                    *cell = *prev;
                }
            }
        }
    }

    /// Local delivery dates covered by the table.
    pub fn local_dates(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.rows.keys().next()?;
        let last = self.rows.keys().next_back()?;
        Some((
            first.with_timezone(&self.timezone).date_naive(),
            last.with_timezone(&self.timezone).date_naive(),
        ))
    }

    /// EUR/MWh to NOK/kWh using the rate of each interval's local date.
    pub fn convert_to_nok(&mut self, rates: &ExchangeRates) -> Result<()> {
        if self.unit == PriceUnit::NokPerKwh {
            return Ok(());
        }
        if rates.is_empty() {
            return Err(Error::NoData("no EUR/NOK exchange rates".into()));
        }

        let tz = self.timezone;
        for (ts, cells) in self.rows.iter_mut() {
            let date = ts.with_timezone(&tz).date_naive();
            let rate = rates
                .rate_on(date)
                .ok_or_else(|| Error::NoData(format!("no EUR/NOK exchange rate for {date}")))?;
            for v in cells.iter_mut().flatten() {
                *v = *v * rate / 1000.0;
            }
        }
        self.unit = PriceUnit::NokPerKwh;
        Ok(())
    }

    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.rows
            .values()
            .flatten()
            .flatten()
            .fold(None, |acc, v| match acc {
                None => Some((*v, *v)),
                Some((lo, hi)) => Some((lo.min(*v), hi.max(*v))),
            })
    }

    pub fn summary(&self) -> Vec<ZoneSummary> {
        self.zones
            .iter()
            .enumerate()
            .filter_map(|(i, zone)| {
                let values: Vec<f64> = self.rows.values().filter_map(|cells| cells[i]).collect();
                if values.is_empty() {
                    return None;
                }
                let count = values.len();
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mean = values.iter().sum::<f64>() / count as f64;
                Some(ZoneSummary {
                    zone: zone.clone(),
                    count,
                    min,
                    mean,
                    max,
                })
            })
            .collect()
    }

    pub fn format_timestamp(&self, ts: &DateTime<Utc>) -> String {
        ts.with_timezone(&self.timezone).format(TIMESTAMP_FORMAT).to_string()
    }

    /// Semicolon separated, one row per interval, local timestamps.
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);

        let mut header = Vec::with_capacity(self.zones.len() + 1);
        header.push("timestamp".to_string());
        header.extend(self.zones.iter().cloned());
        wtr.write_record(&header)?;

        for (ts, cells) in &self.rows {
            let mut record = Vec::with_capacity(cells.len() + 1);
            record.push(self.format_timestamp(ts));
            record.extend(cells.iter().map(|c| c.map(|v| v.to_string()).unwrap_or_default()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let file = std::fs::File::create(path)?;
        self.write_csv_to(file)?;
        tracing::info!(path = %path.display(), rows = self.len(), "saved prices");
        Ok(())
    }
}

/// Fails when `path` would land in a directory that does not exist.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => Err(Error::MissingOutputDir(dir.to_path_buf())),
        _ => Ok(()),
    }
}
