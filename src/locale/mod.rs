pub mod moroccan;

pub use moroccan::MoroccanArabic;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("expected at least {expected} tokens, found {found}")]
    TooFewTokens { expected: usize, found: usize },

    #[error("unrecognized month name '{0}'")]
    UnknownMonth(String),

    #[error("invalid {field} value '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{year}-{month}-{day} is not a calendar date")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("invalid time of day '{0}'")]
    InvalidTime(String),
}

/// Maps a locale-specific date string to a calendar day.
///
/// Implementations must be pure: the same input always yields the same day
/// or the same error. There is no fallback date.
pub trait DayParser: Send + Sync {
    fn locale_name(&self) -> &'static str;

    /// Calendar day used as the partition key.
    fn parse_day(&self, raw: &str) -> Result<NaiveDate, DateError>;

    /// Day plus time of day, for documents mirrored into the search index.
    fn parse_datetime(&self, raw: &str) -> Result<NaiveDateTime, DateError>;
}

/// Look up a parser by its configured locale name.
pub fn parser_for(name: &str) -> Option<Box<dyn DayParser>> {
    match name {
        "ar-MA" | "moroccan_arabic" => Some(Box::new(MoroccanArabic)),
        _ => None,
    }
}

/// Locale names accepted by `parser_for`.
pub fn supported_locales() -> &'static [&'static str] {
    &["ar-MA", "moroccan_arabic"]
}
