use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

pub const HOURS_PER_DAY: i64 = 24;
pub const SECONDS_PER_HOUR: f64 = 3600.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse an export timestamp as local wall time. Offsets are accepted but not
/// applied, so the calendar month is the one written in the file.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, fmt) {
            return Some(parsed.naive_local());
        }
    }

    let raw = raw.strip_suffix(" UTC").unwrap_or(raw);
    let raw = raw.strip_suffix('Z').unwrap_or(raw);
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(parsed);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(start), Some(end)) => (end - start).num_days() as u32,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub year: i32,
    pub month: u32,
    pub days: u32,
}

impl MonthWindow {
    pub fn containing(ts: NaiveDateTime) -> Self {
        let year = ts.year();
        let month = ts.month();
        Self {
            year,
            month,
            days: days_in_month(year, month),
        }
    }

    pub fn hours(self) -> i64 {
        i64::from(self.days) * HOURS_PER_DAY
    }

    pub fn seconds(self) -> i64 {
        self.hours() * SECONDS_PER_HOUR as i64
    }
}

/// Whole days between the earliest start and latest end, counting both ends.
pub fn span_days(min_start: NaiveDateTime, max_end: NaiveDateTime) -> i64 {
    (max_end - min_start).num_days() + 1
}

pub fn parse_quantity(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
