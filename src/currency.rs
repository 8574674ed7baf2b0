use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::config::Settings;
use crate::error::{Error, Result};

/// Daily EUR→NOK rates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRates {
    rates: BTreeMap<NaiveDate, f64>,
}

impl ExchangeRates {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        Self {
            rates: pairs.into_iter().collect(),
        }
    }

    /// One rate per day of `[from, to]`; days without an observation carry
    /// the previous one. Days before the first observation stay empty.
    pub fn fill_daily(observed: &BTreeMap<NaiveDate, f64>, from: NaiveDate, to: NaiveDate) -> Self {
        let mut rates = BTreeMap::new();
        let mut previous = observed.range(..from).next_back().map(|(_, r)| *r);
        for day in from.iter_days().take_while(|d| *d <= to) {
            if let Some(rate) = observed.get(&day) {
                previous = Some(*rate);
            }
            if let Some(rate) = previous {
                rates.insert(day, rate);
            }
        }
        Self { rates }
    }

    /// Rate of `date`, or of the closest earlier day, or failing that the
    /// earliest known rate.
    pub fn rate_on(&self, date: NaiveDate) -> Option<f64> {
        self.rates
            .range(..=date)
            .next_back()
            .or_else(|| self.rates.iter().next())
            .map(|(_, r)| *r)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &f64)> {
        self.rates.iter()
    }
}

/// Norges Bank publishes rates on business days only: widen the window so a
/// weekend start has the previous Friday and a weekend end the next Monday.
pub fn business_day_window(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start_wd = start.weekday().num_days_from_monday();
    let end_wd = end.weekday().num_days_from_monday();
    let start = if start_wd >= 5 {
        start.checked_sub_days(Days::new((start_wd - 4).into())).unwrap_or(start)
    } else {
        start
    };
    let end = if end_wd >= 5 {
        end.checked_add_days(Days::new((7 - end_wd).into())).unwrap_or(end)
    } else {
        end
    };
    (start, end)
}

/// Extract date → rate pairs from an SDMX-JSON data message.
pub fn parse_observations(v: &Value) -> Result<BTreeMap<NaiveDate, f64>> {
    let invalid = |what: &str| Error::InvalidResponse(format!("sdmx-json: {what}"));
    let data = v.get("data").ok_or_else(|| invalid("missing data"))?;

    let Some(series) = data
        .get("dataSets")
        .and_then(|d| d.get(0))
        .and_then(|d| d.get("series"))
        .and_then(|s| s.as_object())
        .and_then(|s| s.get("0:0:0:0").or_else(|| s.values().next()))
    else {
        return Ok(BTreeMap::new());
    };

    let dates = data
        .pointer("/structure/dimensions/observation/0/values")
        .and_then(|x| x.as_array())
        .ok_or_else(|| invalid("missing observation dimension"))?;

    let observations = series
        .get("observations")
        .and_then(|o| o.as_object())
        .ok_or_else(|| invalid("missing observations"))?;

    let mut out = BTreeMap::new();
    for (key, obs) in observations {
        let idx: usize = key.parse().map_err(|_| invalid("bad observation key"))?;
        let date_str = dates
            .get(idx)
            .and_then(|d| d.get("id").or_else(|| d.get("name")))
            .and_then(|d| d.as_str())
            .ok_or_else(|| invalid("observation without date"))?;
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| invalid("bad observation date"))?;

        let rate = match obs.get(0) {
            Some(Value::String(s)) => s.parse::<f64>().ok(),
            Some(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
        .ok_or_else(|| invalid("bad observation value"))?;

        out.insert(date, rate);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct NorgesBankClient {
    url: String,
    http: HttpClient,
}

impl NorgesBankClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&settings.user_agent)
                .map_err(|_| Error::InvalidConfig(format!("invalid user agent {}", settings.user_agent)))?,
        );
        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(settings.norges_bank_timeout)
            .build()?;
        Ok(Self {
            url: settings.norges_bank_url.clone(),
            http,
        })
    }

    /// Daily EUR→NOK rates covering the local dates `start..=end`.
    pub fn eur_to_nok(&self, start: NaiveDate, end: NaiveDate) -> Result<ExchangeRates> {
        let (from, to) = business_day_window(start, end);

        let mut url = Url::parse(&self.url)?;
        url.query_pairs_mut()
            .append_pair("format", "sdmx-json")
            .append_pair("startPeriod", &from.format("%Y-%m-%d").to_string())
            .append_pair("endPeriod", &to.format("%Y-%m-%d").to_string());

        info!(%from, %to, "fetching EUR/NOK exchange rates from Norges Bank");
        debug!(%url, "norges bank request");

        let v: Value = self.http.get(url).send()?.error_for_status()?.json()?;
        let observed = parse_observations(&v)?;
        Ok(ExchangeRates::fill_daily(&observed, from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sdmx(points: &[(&str, &str)]) -> Value {
        let values: Vec<Value> = points.iter().map(|(d, _)| json!({ "id": d, "name": d })).collect();
        let observations: serde_json::Map<String, Value> = points
            .iter()
            .enumerate()
            .map(|(i, (_, r))| (i.to_string(), json!([r])))
            .collect();
        json!({
            "data": {
                "dataSets": [{ "series": { "0:0:0:0": { "observations": observations } } }],
                "structure": { "dimensions": { "observation": [{ "id": "TIME_PERIOD", "values": values }] } }
            }
        })
    }

    #[test]
    fn weekend_window_is_widened() {
        // 2024-12-14 is a Saturday, 2024-12-15 a Sunday
        assert_eq!(business_day_window(ymd(2024, 12, 14), ymd(2024, 12, 15)), (ymd(2024, 12, 13), ymd(2024, 12, 16)));
        assert_eq!(business_day_window(ymd(2024, 12, 15), ymd(2024, 12, 14)), (ymd(2024, 12, 13), ymd(2024, 12, 16)));
        assert_eq!(business_day_window(ymd(2024, 12, 11), ymd(2024, 12, 12)), (ymd(2024, 12, 11), ymd(2024, 12, 12)));
    }

    #[test]
    fn parses_observations_by_index() {
        let v = sdmx(&[("2024-12-13", "11.7185"), ("2024-12-16", "11.70")]);
        let obs = parse_observations(&v).unwrap();
        assert_eq!(obs.get(&ymd(2024, 12, 13)), Some(&11.7185));
        assert_eq!(obs.get(&ymd(2024, 12, 16)), Some(&11.70));
    }

    #[test]
    fn empty_data_set_gives_no_rates() {
        let v = json!({ "data": { "dataSets": [] } });
        assert!(parse_observations(&v).unwrap().is_empty());
        assert!(parse_observations(&json!({})).is_err());
    }

    #[test]
    fn fills_weekends_with_last_rate() {
        let observed = BTreeMap::from([(ymd(2024, 12, 13), 11.5), (ymd(2024, 12, 16), 11.8)]);
        let rates = ExchangeRates::fill_daily(&observed, ymd(2024, 12, 13), ymd(2024, 12, 16));
        assert_eq!(rates.len(), 4);
        assert_eq!(rates.rate_on(ymd(2024, 12, 15)), Some(11.5));
        assert_eq!(rates.rate_on(ymd(2024, 12, 16)), Some(11.8));
        assert_eq!(rates.rate_on(ymd(2024, 12, 20)), Some(11.8));
        assert_eq!(rates.rate_on(ymd(2024, 12, 1)), Some(11.5));
    }

    #[test]
    fn fetches_rates_from_server() {
        let mut server = mockito::Server::new();
        let body = sdmx(&[("2024-12-13", "11.5"), ("2024-12-16", "11.8")]).to_string();
        let mock = server
            .mock("GET", "/api/data/EXR/B.EUR.NOK.SP")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("format".into(), "sdmx-json".into()),
                Matcher::UrlEncoded("startPeriod".into(), "2024-12-13".into()),
                Matcher::UrlEncoded("endPeriod".into(), "2024-12-16".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();

        let settings = Settings {
            norges_bank_url: format!("{}/api/data/EXR/B.EUR.NOK.SP", server.url()),
            ..Settings::default()
        };
        let client = NorgesBankClient::new(&settings).unwrap();
        let rates = client.eur_to_nok(ymd(2024, 12, 14), ymd(2024, 12, 15)).unwrap();

        mock.assert();
        assert_eq!(rates.len(), 4);
        assert_eq!(rates.rate_on(ymd(2024, 12, 14)), Some(11.5));
    }

    #[test]
    fn server_errors_propagate() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/rates")
            .match_query(Matcher::Any)
            .with_status(503)
            .create();
        let settings = Settings {
            norges_bank_url: format!("{}/rates", server.url()),
            ..Settings::default()
        };
        let client = NorgesBankClient::new(&settings).unwrap();
        assert!(matches!(client.eur_to_nok(ymd(2024, 12, 11), ymd(2024, 12, 12)), Err(Error::Http(_))));
    }
}
