use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Output granularity of the price table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Resolution {
    /// Whatever market time unit the auction was cleared in (finest published).
    #[default]
    SdacMtu,
    Minutes(u32),
}

impl Resolution {
    pub const SUPPORTED_MINUTES: [u32; 3] = [15, 30, 60];
}

impl FromStr for Resolution {
    type Err = Error;

    /// Accepts `SDAC_MTU` (or `MTU`), `15min`, `30min`, `60min`, `1h`, and the
    /// ISO 8601 forms used by ENTSO-E (`PT15M`, `PT60M`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim().to_ascii_uppercase();
        if t == "SDAC_MTU" || t == "MTU" {
            return Ok(Resolution::SdacMtu);
        }

        let minutes = t
            .strip_suffix("MIN")
            .and_then(|n| n.parse::<u32>().ok())
            .or_else(|| t.strip_suffix('H').and_then(|n| n.parse::<u32>().ok()).and_then(|h| h.checked_mul(60)))
            .or_else(|| iso_minutes(&t));

        match minutes {
            Some(m) if Self::SUPPORTED_MINUTES.contains(&m) => Ok(Resolution::Minutes(m)),
            _ => Err(Error::InvalidResolution(s.to_string())),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::SdacMtu => f.write_str("SDAC_MTU"),
            Resolution::Minutes(m) => write!(f, "{m}min"),
        }
    }
}

/// Minutes of an ISO 8601 duration such as `PT15M`, `PT1H` or `P1D`.
pub fn iso_minutes(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix("PT") {
        if let Some(m) = rest.strip_suffix('M') {
            return m.parse().ok().filter(|m| *m > 0);
        }
        if let Some(h) = rest.strip_suffix('H') {
            return h.parse::<u32>().ok().filter(|h| *h > 0).and_then(|h| h.checked_mul(60));
        }
        return None;
    }
    s.strip_prefix('P')
        .and_then(|r| r.strip_suffix('D'))
        .and_then(|d| d.parse::<u32>().ok())
        .filter(|d| *d > 0)
        .and_then(|d| d.checked_mul(24 * 60))
}
