use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Settings;
use crate::date::{DateRange, ResolvedDate, last_sdac_date, period_stamp};
use crate::document::{Document, parse_document};
use crate::error::{Error, Result};
use crate::resolution::Resolution;
use crate::series::{PriceSeries, select};
use crate::table::{PriceTable, PriceUnit};
use crate::zones::{ZoneRegistry, ZoneSet};

/// Day-ahead prices (IEC 62325 document type A44).
const DAY_AHEAD_DOCUMENT: &str = "A44";

/// Blocking client for the ENTSO-E Transparency Platform price endpoint.
#[derive(Debug, Clone)]
pub struct EntsoeClient {
    settings: Settings,
    registry: ZoneRegistry,
    http: HttpClient,
}

impl EntsoeClient {
    pub fn new(settings: Settings, registry: ZoneRegistry) -> Result<Self> {
        // validate early, requests are built from it per zone
        Url::parse(&settings.entsoe_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&settings.user_agent)
                .map_err(|_| Error::InvalidConfig(format!("invalid user agent {}", settings.user_agent)))?,
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(settings.entsoe_timeout)
            .build()?;

        Ok(Self {
            settings,
            registry,
            http,
        })
    }

    pub fn registry(&self) -> &ZoneRegistry {
        &self.registry
    }

    /// Turn resolved start/end arguments into a concrete range, substituting
    /// `LAST_SDAC` with the latest published delivery day as of now.
    pub fn resolve_range(&self, start: ResolvedDate, end: ResolvedDate) -> Result<DateRange> {
        let now = Utc::now().with_timezone(&self.settings.timezone);
        DateRange::finalize(start, end, last_sdac_date(&now))
    }

    pub fn day_ahead_prices(
        &self,
        zones: &ZoneSet,
        start: ResolvedDate,
        end: ResolvedDate,
        resolution: Resolution,
    ) -> Result<PriceTable> {
        let range = self.resolve_range(start, end)?;
        self.prices_for_range(zones, &range, resolution)
    }

    /// Fetch every zone of `zones` for the local delivery dates of `range`.
    ///
    /// Zones the API has nothing for are skipped with a warning; only when no
    /// zone returns prices the call fails with [`Error::NoData`].
    pub fn prices_for_range(&self, zones: &ZoneSet, range: &DateRange, resolution: Resolution) -> Result<PriceTable> {
        let token = self.settings.token()?;
        let tz = self.settings.timezone;
        let start = range.start_utc(&tz)?;
        let end = range.end_utc(&tz)?;

        info!(url = %self.settings.entsoe_url, "fetching prices from ENTSO-E's Transparency Platform");
        info!(%range, %resolution, zones = %zones, "request");

        let mut columns: Vec<(String, PriceSeries)> = Vec::with_capacity(zones.len());
        for code in zones.iter() {
            let Some(series) = self.fetch_zone(code, token, start, end)? else {
                continue;
            };
            match select(series, resolution) {
                Some(s) => {
                    debug!(zone = code, points = s.len(), resolution = s.resolution_minutes, "zone prices");
                    columns.push((code.to_string(), s));
                }
                None => warn!(zone = code, "no prices in requested period"),
            }
        }

        if columns.is_empty() {
            return Err(Error::NoData(format!("ENTSO-E returned no prices for {zones} in {range}")));
        }

        let mut table = PriceTable::from_series(PriceUnit::EurPerMwh, tz, columns);
        table.forward_fill();
        Ok(table)
    }

    /// `None` when the API answered but has no prices for the zone.
    fn fetch_zone(
        &self,
        code: &str,
        token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Vec<PriceSeries>>> {
        let url = self.request_url(code, start, end)?;
        debug!(zone = code, %url, "entsoe request");

        let resp = self.http.get(url).query(&[("securityToken", token)]).send()?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(resp.error_for_status().err().map_or_else(
                || Error::InvalidResponse(format!("ENTSO-E refused the request ({status})")),
                Error::Http,
            ));
        }

        let body = resp.text()?;
        if !status.is_success() {
            let reason = match parse_document(&body) {
                Ok(Document::Acknowledgement(reason)) => reason,
                _ => String::new(),
            };
            warn!(zone = code, %status, %reason, "error from ENTSO-E API");
            return Ok(None);
        }

        match parse_document(&body)? {
            Document::Prices(series) => {
                let series: Vec<PriceSeries> = series
                    .into_iter()
                    .map(|mut s| {
                        s.retain_range(start, end);
                        s
                    })
                    .collect();
                Ok(Some(series))
            }
            Document::Acknowledgement(reason) => {
                warn!(zone = code, %reason, "ENTSO-E has no prices");
                Ok(None)
            }
        }
    }

    /// Request URL without the security token.
    fn request_url(&self, code: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Url> {
        let eic = self
            .registry
            .eic_code(code)
            .ok_or_else(|| Error::UnknownZoneToken(vec![code.to_string()]))?;

        let mut url = Url::parse(&self.settings.entsoe_url)?;
        url.query_pairs_mut()
            .append_pair("documentType", DAY_AHEAD_DOCUMENT)
            .append_pair("in_Domain", eic)
            .append_pair("out_Domain", eic)
            .append_pair("periodStart", &period_stamp(&start))
            .append_pair("periodEnd", &period_stamp(&end));
        Ok(url)
    }
}
