use super::{DateError, DayParser};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Moroccan Arabic dates as printed by the news site:
/// `"<weekday> <day> <month> <year> - <HH:MM>"`, e.g. "الإثنين 22 أبريل 2024 - 21:21".
#[derive(Debug, Clone, Copy, Default)]
pub struct MoroccanArabic;

const DAY_TOKEN: usize = 1;
const MONTH_TOKEN: usize = 2;
const YEAR_TOKEN: usize = 3;
const TIME_TOKEN: usize = 5;

const MONTHS: [(&str, u32); 12] = [
    ("يناير", 1),
    ("فبراير", 2),
    ("مارس", 3),
    ("أبريل", 4),
    ("ماي", 5),
    ("يونيو", 6),
    ("يوليوز", 7),
    ("غشت", 8),
    ("شتنبر", 9),
    ("أكتوبر", 10),
    ("نونبر", 11),
    ("دجنبر", 12),
];

fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(month, _)| *month == name)
        .map(|(_, number)| *number)
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, DateError> {
    value.parse().map_err(|_| DateError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

impl MoroccanArabic {
    fn date_from_tokens(tokens: &[&str]) -> Result<NaiveDate, DateError> {
        if tokens.len() <= YEAR_TOKEN {
            return Err(DateError::TooFewTokens {
                expected: YEAR_TOKEN + 1,
                found: tokens.len(),
            });
        }

        let month = month_number(tokens[MONTH_TOKEN])
            .ok_or_else(|| DateError::UnknownMonth(tokens[MONTH_TOKEN].to_string()))?;
        let day: u32 = parse_field("day", tokens[DAY_TOKEN])?;
        let year: i32 = parse_field("year", tokens[YEAR_TOKEN])?;

        NaiveDate::from_ymd_opt(year, month, day)
            .ok_or(DateError::InvalidDate { year, month, day })
    }
}

impl DayParser for MoroccanArabic {
    fn locale_name(&self) -> &'static str {
        "ar-MA"
    }

    fn parse_day(&self, raw: &str) -> Result<NaiveDate, DateError> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        Self::date_from_tokens(&tokens)
    }

    fn parse_datetime(&self, raw: &str) -> Result<NaiveDateTime, DateError> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        if tokens.len() <= TIME_TOKEN {
            return Err(DateError::TooFewTokens {
                expected: TIME_TOKEN + 1,
                found: tokens.len(),
            });
        }

        let date = Self::date_from_tokens(&tokens)?;
        let time = NaiveTime::parse_from_str(tokens[TIME_TOKEN], "%H:%M")
            .map_err(|_| DateError::InvalidTime(tokens[TIME_TOKEN].to_string()))?;

        Ok(date.and_time(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_every_month_name() {
        let parser = MoroccanArabic;
        for (name, number) in MONTHS {
            let raw = format!("الإثنين 15 {} 2024 - 10:00", name);
            assert_eq!(parser.parse_day(&raw).unwrap(), ymd(2024, number, 15), "{}", name);
        }
    }

    #[test]
    fn test_day_ignores_time_suffix() {
        let parser = MoroccanArabic;
        assert_eq!(
            parser.parse_day("الإثنين 22 أبريل 2024 - 21:21").unwrap(),
            ymd(2024, 4, 22)
        );
        assert_eq!(parser.parse_day("الإثنين 22 أبريل 2024").unwrap(), ymd(2024, 4, 22));
    }

    #[test]
    fn test_extra_whitespace() {
        let parser = MoroccanArabic;
        assert_eq!(
            parser.parse_day("  الثلاثاء   23  أبريل 2024 -  08:05 ").unwrap(),
            ymd(2024, 4, 23)
        );
    }

    #[test]
    fn test_missing_tokens() {
        let parser = MoroccanArabic;
        assert_eq!(
            parser.parse_day("الإثنين 22 أبريل"),
            Err(DateError::TooFewTokens { expected: 4, found: 3 })
        );
        assert_eq!(
            parser.parse_day(""),
            Err(DateError::TooFewTokens { expected: 4, found: 0 })
        );
    }

    #[test]
    fn test_unknown_month() {
        let parser = MoroccanArabic;
        assert_eq!(
            parser.parse_day("Monday 22 April 2024 - 21:21"),
            Err(DateError::UnknownMonth("April".to_string()))
        );
    }

    #[test]
    fn test_invalid_numbers() {
        let parser = MoroccanArabic;
        assert!(matches!(
            parser.parse_day("الإثنين xx أبريل 2024"),
            Err(DateError::InvalidNumber { field: "day", .. })
        ));
        assert!(matches!(
            parser.parse_day("الإثنين 22 أبريل two"),
            Err(DateError::InvalidNumber { field: "year", .. })
        ));
    }

    #[test]
    fn test_impossible_date() {
        let parser = MoroccanArabic;
        assert_eq!(
            parser.parse_day("الجمعة 31 فبراير 2024"),
            Err(DateError::InvalidDate { year: 2024, month: 2, day: 31 })
        );
    }

    #[test]
    fn test_parse_datetime() {
        let parser = MoroccanArabic;
        let dt = parser.parse_datetime("الإثنين 22 أبريل 2024 - 21:21").unwrap();
        assert_eq!(dt.format("%Y-%m-%dT%H:%M:%S").to_string(), "2024-04-22T21:21:00");

        assert!(matches!(
            parser.parse_datetime("الإثنين 22 أبريل 2024"),
            Err(DateError::TooFewTokens { expected: 6, found: 4 })
        ));
        assert_eq!(
            parser.parse_datetime("الإثنين 22 أبريل 2024 - 25:99"),
            Err(DateError::InvalidTime("25:99".to_string()))
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let parser = MoroccanArabic;
        let raw = "السبت 1 يونيو 2024 - 00:00";
        assert_eq!(parser.parse_day(raw), parser.parse_day(raw));
    }
}
