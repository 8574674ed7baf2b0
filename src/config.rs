use std::fmt;
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::{Error, Result};

pub const TOKEN_ENV: &str = "MY_ENTSOE_TOKEN";
pub const ENTSOE_URL_ENV: &str = "ENTSOE_API_URL";
pub const NORGES_BANK_URL_ENV: &str = "NORGES_BANK_EUR_NOK_URL";

pub const DEFAULT_ENTSOE_URL: &str = "https://web-api.tp.entsoe.eu/api";
pub const DEFAULT_NORGES_BANK_URL: &str = "https://data.norges-bank.no/api/data/EXR/B.EUR.NOK.SP";

#[derive(Clone)]
pub struct Settings {
    pub entsoe_url: String,
    pub norges_bank_url: String,
    pub token: Option<String>,
    pub entsoe_timeout: Duration,
    pub norges_bank_timeout: Duration,
    pub user_agent: String,
    /// Zone in which dates are interpreted and timestamps are reported.
    pub timezone: Tz,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            entsoe_url: DEFAULT_ENTSOE_URL.to_string(),
            norges_bank_url: DEFAULT_NORGES_BANK_URL.to_string(),
            token: None,
            entsoe_timeout: Duration::from_secs(180),
            norges_bank_timeout: Duration::from_secs(20),
            user_agent: concat!("entsoe-prices/", env!("CARGO_PKG_VERSION")).to_string(),
            timezone: chrono_tz::Europe::Oslo,
        }
    }
}

// Keeps the token out of logs.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("entsoe_url", &self.entsoe_url)
            .field("norges_bank_url", &self.norges_bank_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("entsoe_timeout", &self.entsoe_timeout)
            .field("norges_bank_timeout", &self.norges_bank_timeout)
            .field("user_agent", &self.user_agent)
            .field("timezone", &self.timezone)
            .finish()
    }
}

impl Settings {
    /// Defaults overridden by the process environment, after loading `.env`
    /// from the working directory if there is one.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded environment file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            entsoe_url: non_empty(ENTSOE_URL_ENV).unwrap_or(defaults.entsoe_url),
            norges_bank_url: non_empty(NORGES_BANK_URL_ENV).unwrap_or(defaults.norges_bank_url),
            token: non_empty(TOKEN_ENV),
            ..defaults
        }
    }

    pub fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(Error::MissingToken(TOKEN_ENV))
    }
}
