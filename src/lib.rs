#![forbid(unsafe_code)]

//! Day-ahead electricity prices from the ENTSO-E Transparency Platform.
//!
//! The crate turns loose command-line style arguments into a price query:
//! bidding zones may be given as codes or group keywords, and dates as
//! absolute dates or relative keywords. Prices come back as a [`PriceTable`]
//! in EUR/MWh, optionally converted to NOK/kWh with Norges Bank exchange
//! rates.
//!
//! **Resolving arguments**
//! ```
//! use chrono::NaiveDate;
//! use entsoe_prices::{ResolvedDate, ZoneRegistry, resolve_date};
//!
//! let registry = ZoneRegistry::entsoe();
//! let zones = registry.expand(&["norway", "SE3"])?;
//! assert_eq!(zones.codes()[0], "NO1");
//! assert_eq!(zones.len(), 6);
//!
//! let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
//! assert_eq!(
//!     resolve_date("YEAR+W", today)?,
//!     ResolvedDate::Date(NaiveDate::from_ymd_opt(2025, 1, 8).unwrap())
//! );
//! assert_eq!(resolve_date("LAST_SDAC", today)?, ResolvedDate::LastSdac);
//! # Ok::<(), entsoe_prices::Error>(())
//! ```
//!
//! **Fetching prices**
//! ```no_run
//! use entsoe_prices::{EntsoeClient, Resolution, ResolvedDate, Settings, ZoneRegistry};
//!
//! let settings = Settings::from_env(); // reads MY_ENTSOE_TOKEN
//! let registry = ZoneRegistry::entsoe();
//! let zones = registry.expand(&["NO1"])?;
//! let client = EntsoeClient::new(settings, registry)?;
//! let today = chrono::Utc::now().date_naive();
//! let table = client.day_ahead_prices(&zones, ResolvedDate::Date(today), ResolvedDate::LastSdac, Resolution::SdacMtu)?;
//! println!("{} rows in {}", table.len(), table.unit());
//! # Ok::<(), entsoe_prices::Error>(())
//! ```

mod client;
mod config;
mod currency;
mod date;
mod document;
mod error;
mod plot;
mod resolution;
mod series;
mod table;
mod zones;

pub use crate::client::EntsoeClient;
pub use crate::config::{Settings, TOKEN_ENV};
pub use crate::currency::{ExchangeRates, NorgesBankClient};
pub use crate::date::{DateRange, ResolvedDate, last_sdac_date, resolve as resolve_date};
pub use crate::document::{Document, parse_document};
pub use crate::error::{Error, Result};
pub use crate::plot::{plot_path, write_html as write_plot};
pub use crate::resolution::Resolution;
pub use crate::series::PriceSeries;
pub use crate::table::{PriceTable, PriceUnit, ZoneSummary, ensure_parent_dir};
pub use crate::zones::{BiddingZone, ZoneGroup, ZoneRegistry, ZoneSet, expand as expand_zones};
