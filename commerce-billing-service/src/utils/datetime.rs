//! Parsing for the date and date-time formats accepted on the wire.
//!
//! Date-times are `YYYY-MM-DD HH:MM:SS` interpreted as UTC, or RFC 3339.
//! Dates are `YYYY-MM-DD`, or any accepted date-time (the date part is kept).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .or_else(|| parse_date_time(value).map(|dt| dt.date_naive()))
}

/// `#[serde(with = "date_time")]` for required date-time fields.
pub mod date_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date_time(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date time {}", raw)))
    }
}

/// `#[serde(default, with = "option_date_time")]` for optional date-time fields.
pub mod option_date_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_date_time(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date time {}", raw))),
            None => Ok(None),
        }
    }
}

/// `#[serde(default, with = "option_date")]` for optional calendar dates.
pub mod option_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => serializer.serialize_str(&date.format(super::DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::parse_date(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date {}", raw))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde::Deserialize;

    #[test]
    fn test_parse_space_separated_as_utc() {
        let dt = parse_date_time("2024-03-05 14:30:00").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));
        assert_eq!((dt.hour(), dt.minute()), (14, 30));
    }

    #[test]
    fn test_parse_rfc3339_converts_to_utc() {
        let dt = parse_date_time("2024-03-05T14:30:00+02:00").unwrap();
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn test_parse_date_accepts_date_time() {
        assert_eq!(
            parse_date("2024-03-05 23:59:59"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(parse_date("2024-03-05"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(parse_date("05/03/2024"), None);
    }

    #[derive(Deserialize)]
    struct Dates {
        #[serde(default, with = "option_date")]
        due: Option<NaiveDate>,
        #[serde(default, with = "option_date_time")]
        at: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_optional_fields_accept_null_and_missing() {
        let parsed: Dates = serde_json::from_str(r#"{"due": null}"#).unwrap();
        assert!(parsed.due.is_none());
        assert!(parsed.at.is_none());

        let parsed: Dates =
            serde_json::from_str(r#"{"due": "2024-01-31", "at": "2024-01-31 10:00:00"}"#).unwrap();
        assert_eq!(parsed.due, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert!(parsed.at.is_some());
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        assert!(serde_json::from_str::<Dates>(r#"{"due": "not-a-date"}"#).is_err());
    }
}
