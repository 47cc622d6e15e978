// used for timestamps everywhere
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// ISO-8601 date-time text, as written by [`format_iso`]
    pub static ref ISO: Regex = Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}").unwrap();
    /// ISO-8601 text that is still wrapped in JSON quotes
    pub static ref ISO_QUOTE: Regex = Regex::new(r#"^"[0-9]{4}-[0-9]{2}-[0-9]{2}T"#).unwrap();
}

const DATE_TIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S",
    "%d/%m/%Y %H:%M:%S",
];
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y%m%d", "%d/%m/%Y", "%d-%b-%Y"];

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Text form used by the JSON codec; fractional seconds only when present.
pub fn format_iso(t: &NaiveDateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Parses ISO-8601 text, with or without an offset (offsets are folded into UTC).
pub fn parse_iso(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in &DATE_TIME_FORMATS[..2] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            return Some(t);
        }
    }
    DateTime::parse_from_rfc3339(text).ok().map(|t| t.naive_utc())
}

/// Lenient date parsing: ISO, common date-only layouts (UK day-first for
/// slashes), and the literals `now` and `today`.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    match text.to_lowercase().as_str() {
        "now" => return Some(now()),
        "today" => return Some(midnight(Utc::now().date_naive())),
        _ => (),
    }
    if let Some(t) = parse_iso(text) {
        return Some(t);
    }
    for format in &DATE_TIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            return Some(t);
        }
    }
    for format in &DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, format) {
            return Some(midnight(d));
        }
    }
    None
}
