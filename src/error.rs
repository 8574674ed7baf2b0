use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid date token {token:?}: {reason}")]
    InvalidDateToken { token: String, reason: String },

    #[error("unknown bidding zone token(s): {}", .0.join(", "))]
    UnknownZoneToken(Vec<String>),

    #[error("no bidding zones given")]
    EmptyZoneSet,

    #[error("start date {start} must be before end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid resolution {0:?} (expected SDAC_MTU, 15min, 30min or 60min)")]
    InvalidResolution(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("missing ENTSO-E security token, set {0} in the environment or in .env")]
    MissingToken(&'static str),

    #[error("no prices available: {0}")]
    NoData(String),

    #[error("output directory does not exist: {}", .0.display())]
    MissingOutputDir(PathBuf),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    pub(crate) fn date_token(token: &str, reason: impl Into<String>) -> Self {
        Error::InvalidDateToken {
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised by local argument validation, before any
    /// network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidDateToken { .. }
                | Error::UnknownZoneToken(_)
                | Error::EmptyZoneSet
                | Error::InvalidDateRange { .. }
                | Error::InvalidResolution(_)
        )
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            e if e.is_validation() => 2,
            Error::MissingToken(_) => 3,
            Error::NoData(_) => 4,
            _ => 1,
        }
    }
}
