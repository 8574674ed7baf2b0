//! Decoding of ENTSO-E market documents (IEC 62325-451-3).
//!
//! A price query answers either with a `Publication_MarketDocument` holding
//! one or more `TimeSeries`, or with an `Acknowledgement_MarketDocument`
//! explaining why there is nothing to return.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::resolution::iso_minutes;
use crate::series::PriceSeries;

const ACKNOWLEDGEMENT_ROOT: &str = "Acknowledgement_MarketDocument";

#[derive(Debug, Deserialize)]
struct PublicationXml {
    #[serde(rename = "TimeSeries", default)]
    time_series: Vec<TimeSeriesXml>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesXml {
    #[serde(rename = "Period", default)]
    periods: Vec<PeriodXml>,
}

#[derive(Debug, Deserialize)]
struct PeriodXml {
    #[serde(rename = "timeInterval")]
    time_interval: TimeIntervalXml,
    resolution: String,
    #[serde(rename = "Point", default)]
    points: Vec<PointXml>,
}

#[derive(Debug, Deserialize)]
struct TimeIntervalXml {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct PointXml {
    position: u32,
    #[serde(rename = "price.amount")]
    price: f64,
}

#[derive(Debug, Deserialize)]
struct AcknowledgementXml {
    #[serde(rename = "Reason", default)]
    reasons: Vec<ReasonXml>,
}

#[derive(Debug, Deserialize)]
struct ReasonXml {
    code: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// One series per published resolution.
    Prices(Vec<PriceSeries>),
    Acknowledgement(String),
}

pub fn parse_document(xml: &str) -> Result<Document> {
    if xml.contains(ACKNOWLEDGEMENT_ROOT) {
        let ack: AcknowledgementXml = quick_xml::de::from_str(xml)?;
        let reason = ack
            .reasons
            .iter()
            .map(|r| match &r.text {
                Some(text) => format!("{} ({})", text.trim(), r.code),
                None => r.code.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Ok(Document::Acknowledgement(reason));
    }

    let doc: PublicationXml = quick_xml::de::from_str(xml)?;
    let mut by_resolution: BTreeMap<u32, PriceSeries> = BTreeMap::new();

    for period in doc.time_series.iter().flat_map(|ts| &ts.periods) {
        let minutes = iso_minutes(&period.resolution)
            .ok_or_else(|| Error::InvalidResponse(format!("unsupported resolution {}", period.resolution)))?;
        let series = by_resolution
            .entry(minutes)
            .or_insert_with(|| PriceSeries::new(minutes));
        expand_period(period, minutes, series)?;
    }

    Ok(Document::Prices(by_resolution.into_values().collect()))
}

/// Positions missing from a period repeat the previous price (curve type A03).
fn expand_period(period: &PeriodXml, minutes: u32, series: &mut PriceSeries) -> Result<()> {
    let start = parse_instant(&period.time_interval.start)?;
    let end = parse_instant(&period.time_interval.end)?;
    let step = Duration::minutes(i64::from(minutes));
    let slots = (end - start).num_minutes() / i64::from(minutes);

    let by_position: BTreeMap<u32, f64> = period.points.iter().map(|p| (p.position, p.price)).collect();

    let mut last = None;
    let mut ts = start;
    for position in 1..=slots {
        let position = u32::try_from(position)
            .map_err(|_| Error::InvalidResponse(format!("period too long: {} slots", slots)))?;
        if let Some(price) = by_position.get(&position) {
            last = Some(*price);
        }
        if let Some(price) = last {
            series.prices.insert(ts, price);
        }
        ts += step;
    }
    Ok(())
}

/// ENTSO-E instants look like `2024-12-11T23:00Z`.
fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%MZ")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ"))
        .map(|dt| dt.and_utc())
        .map_err(|_| Error::InvalidResponse(format!("invalid timestamp {s}")))
}
