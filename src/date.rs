use std::fmt;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::{Error, Result};

/// Local hour at which the day-ahead auction results for the next delivery
/// day are considered published.
const SDAC_PUBLICATION_HOUR: u32 = 13;

/// A start/end argument after keyword resolution.
///
/// `LastSdac` is kept symbolic: the date of the most recent published auction
/// is only known to whoever talks to the price API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedDate {
    Date(NaiveDate),
    LastSdac,
}

impl ResolvedDate {
    pub fn date(self) -> Option<NaiveDate> {
        match self {
            ResolvedDate::Date(d) => Some(d),
            ResolvedDate::LastSdac => None,
        }
    }

    /// Substitute the sentinel with the given last auction date.
    pub fn or_last_sdac(self, last_sdac: NaiveDate) -> NaiveDate {
        self.date().unwrap_or(last_sdac)
    }
}

impl fmt::Display for ResolvedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedDate::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            ResolvedDate::LastSdac => f.write_str("LAST_SDAC"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    Day,
    Week,
    Month,
    Year,
    LastSdac,
}

impl Base {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "DAY" => Some(Base::Day),
            "WEEK" => Some(Base::Week),
            "MONTH" => Some(Base::Month),
            "YEAR" => Some(Base::Year),
            "LAST_SDAC" => Some(Base::LastSdac),
            _ => None,
        }
    }

    fn anchor(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Base::Day => Some(today),
            Base::Week => today.checked_sub_days(Days::new(today.weekday().num_days_from_monday().into())),
            Base::Month => today.with_day(1),
            Base::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1),
            Base::LastSdac => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Days,
    Weeks,
    Months,
    Years,
}

impl Unit {
    fn parse(c: char) -> Option<Self> {
        match c {
            'D' => Some(Unit::Days),
            'W' => Some(Unit::Weeks),
            'M' => Some(Unit::Months),
            'Y' => Some(Unit::Years),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Offset {
    forward: bool,
    magnitude: u32,
    unit: Unit,
}

impl Offset {
    /// Parses `+2D`, `-W`, `+0Y`... The magnitude defaults to 1.
    fn parse(token: &str, s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let forward = match chars.next() {
            Some('+') => true,
            Some('-') => false,
            _ => return Err(Error::date_token(token, "offset must start with '+' or '-'")),
        };
        let rest = chars.as_str();
        let Some(unit_char) = rest.chars().last() else {
            return Err(Error::date_token(token, "offset is missing a unit (D, W, M or Y)"));
        };
        let unit = Unit::parse(unit_char)
            .ok_or_else(|| Error::date_token(token, format!("unknown offset unit {unit_char:?}")))?;

        let digits = &rest[..rest.len() - unit_char.len_utf8()];
        let magnitude = if digits.is_empty() {
            1
        } else if digits.bytes().all(|b| b.is_ascii_digit()) {
            digits
                .parse()
                .map_err(|_| Error::date_token(token, format!("offset {digits} is too large")))?
        } else {
            return Err(Error::date_token(token, format!("invalid offset magnitude {digits:?}")));
        };

        Ok(Self { forward, magnitude, unit })
    }

    /// Year and month shifts clamp to the last day of the target month, so a
    /// Feb 29 anchor lands on Feb 28 in non-leap years.
    fn apply(self, anchor: NaiveDate) -> Option<NaiveDate> {
        let n = self.magnitude;
        match self.unit {
            Unit::Days => shift_days(anchor, self.forward, u64::from(n)),
            Unit::Weeks => shift_days(anchor, self.forward, u64::from(n) * 7),
            Unit::Months => shift_months(anchor, self.forward, n),
            Unit::Years => shift_months(anchor, self.forward, n.checked_mul(12)?),
        }
    }
}

fn shift_days(d: NaiveDate, forward: bool, n: u64) -> Option<NaiveDate> {
    if forward {
        d.checked_add_days(Days::new(n))
    } else {
        d.checked_sub_days(Days::new(n))
    }
}

fn shift_months(d: NaiveDate, forward: bool, n: u32) -> Option<NaiveDate> {
    if forward {
        d.checked_add_months(Months::new(n))
    } else {
        d.checked_sub_months(Months::new(n))
    }
}

/// `d` matches digits, everything else must match literally.
fn has_shape(s: &str, shape: &str) -> bool {
    s.len() == shape.len()
        && s.bytes()
            .zip(shape.bytes())
            .all(|(c, p)| if p == b'd' { c.is_ascii_digit() } else { c == p })
}

/// Returns `None` when the token does not look like an absolute date at all.
fn parse_absolute(token: &str, t: &str) -> Option<Result<NaiveDate>> {
    let invalid = || Error::date_token(token, "not a valid calendar date");

    let parsed = if has_shape(t, "dddd") {
        t.parse().ok().and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
    } else if has_shape(t, "dddd-dd") {
        let (y, m) = (t[0..4].parse().ok()?, t[5..7].parse().ok()?);
        NaiveDate::from_ymd_opt(y, m, 1)
    } else if has_shape(t, "dddd-dd-dd") {
        NaiveDate::parse_from_str(t, "%Y-%m-%d").ok()
    } else if has_shape(t, "dddd-dd-dd dd:dd") {
        NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M").ok().map(|dt| dt.date())
    } else {
        return None;
    };

    Some(parsed.ok_or_else(invalid))
}

/// Resolve a start/end token against `today`.
///
/// Accepted forms:
/// - `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM` (first day of the
///   year/month, or the date itself)
/// - `DAY`, `WEEK` (Monday), `MONTH` (1st), `YEAR` (Jan 1), optionally followed
///   by `+N<unit>` / `-N<unit>` with unit `D`, `W`, `M` or `Y`; `N` defaults
///   to 1 (`YEAR+W` is Jan 8)
/// - `LAST_SDAC`, without offset
pub fn resolve(token: &str, today: NaiveDate) -> Result<ResolvedDate> {
    let t = token.trim();
    if t.is_empty() {
        return Err(Error::date_token(token, "empty date"));
    }

    if let Some(parsed) = parse_absolute(token, t) {
        return parsed.map(ResolvedDate::Date);
    }

    let upper = t.to_ascii_uppercase();
    let (base_str, offset_str) = match upper.find(|c: char| c == '+' || c == '-') {
        Some(i) => (&upper[..i], Some(&upper[i..])),
        None => (upper.as_str(), None),
    };

    let base = Base::parse(base_str).ok_or_else(|| {
        Error::date_token(token, "expected a date (YYYY[-MM[-DD]]) or DAY, WEEK, MONTH, YEAR, LAST_SDAC")
    })?;

    if base == Base::LastSdac {
        return match offset_str {
            None => Ok(ResolvedDate::LastSdac),
            Some(_) => Err(Error::date_token(token, "LAST_SDAC does not accept an offset")),
        };
    }

    let anchor = base
        .anchor(today)
        .ok_or_else(|| Error::date_token(token, "date out of range"))?;

    let date = match offset_str {
        None => anchor,
        Some(s) => Offset::parse(token, s)?
            .apply(anchor)
            .ok_or_else(|| Error::date_token(token, "date out of range"))?,
    };

    Ok(ResolvedDate::Date(date))
}

/// Delivery date bound of the most recent published day-ahead auction.
///
/// Before 13:00 local time the latest published auction covers today, after
/// that it covers tomorrow. The returned date is the exclusive end bound of
/// that delivery day.
pub fn last_sdac_date<Tz: TimeZone>(now: &DateTime<Tz>) -> NaiveDate {
    let today = now.date_naive();
    let ahead = if now.hour() < SDAC_PUBLICATION_HOUR { 1 } else { 2 };
    today.checked_add_days(Days::new(ahead)).unwrap_or(NaiveDate::MAX)
}

/// Concrete `[start, end)` delivery date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn finalize(start: ResolvedDate, end: ResolvedDate, last_sdac: NaiveDate) -> Result<Self> {
        Self::new(start.or_last_sdac(last_sdac), end.or_last_sdac(last_sdac))
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Local midnight at the start of the range, as a UTC instant.
    pub fn start_utc<Tz: TimeZone>(&self, tz: &Tz) -> Result<DateTime<Utc>> {
        local_midnight_utc(self.start, tz)
    }

    pub fn end_utc<Tz: TimeZone>(&self, tz: &Tz) -> Result<DateTime<Utc>> {
        local_midnight_utc(self.end, tz)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }
}

pub fn local_midnight_utc<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidConfig(format!("no local midnight on {date} in the configured timezone")))
}

/// `yyyyMMddHHmm`, the period format of the ENTSO-E API.
pub fn period_stamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d%H%M").to_string()
}
