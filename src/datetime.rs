use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike,
};
use regex::Regex;
use std::sync::LazyLock;

/// Label appended to every rendered timestamp. Times are never converted,
/// only labelled.
pub const TIMEZONE_LABEL: &str = "EST";

/// Door time defaults to this many hours before the start.
pub const DOOR_LEAD_HOURS: i64 = 1;

/// End time is always this many hours after the start.
pub const SHOW_LENGTH_HOURS: i64 = 3;

/// A bare hour below 12 with no meridiem is read as PM. Venue listings
/// overwhelmingly advertise evening shows ("Doors: 7").
pub const ASSUME_EVENING: bool = true;

enum Pattern {
    DateTime(&'static str),
    Date(&'static str),
}

const EXPLICIT_PATTERNS: &[Pattern] = &[
    Pattern::DateTime("%m/%d/%Y %I:%M %p"),
    Pattern::DateTime("%m/%d/%Y %I:%M %p EST"),
    Pattern::DateTime("%B %d, %Y %I:%M %p"),
    Pattern::DateTime("%b %d, %Y %I:%M %p"),
    Pattern::Date("%B %d, %Y"),
    Pattern::Date("%b %d, %Y"),
    Pattern::Date("%m/%d/%Y"),
    Pattern::DateTime("%Y-%m-%d %H:%M:%S"),
    Pattern::DateTime("%Y-%m-%dT%H:%M:%S"),
    Pattern::Date("%Y-%m-%d"),
];

const FLEXIBLE_PATTERNS: &[Pattern] = &[
    Pattern::DateTime("%B %d %Y %I:%M %p"),
    Pattern::DateTime("%B %d %Y %H:%M"),
    Pattern::DateTime("%d %B %Y %I:%M %p"),
    Pattern::DateTime("%d %B %Y %H:%M"),
    Pattern::DateTime("%m/%d/%Y %I:%M %p"),
    Pattern::DateTime("%m/%d/%Y %H:%M"),
    Pattern::DateTime("%m-%d-%Y %I:%M %p"),
    Pattern::DateTime("%m/%d/%y %I:%M %p"),
    Pattern::DateTime("%Y-%m-%d %I:%M %p"),
    Pattern::DateTime("%Y-%m-%d %H:%M"),
    Pattern::DateTime("%Y-%m-%dT%H:%M"),
    Pattern::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    Pattern::DateTime("%Y/%m/%d %H:%M"),
    Pattern::Date("%B %d %Y"),
    Pattern::Date("%d %B %Y"),
    Pattern::Date("%m/%d/%Y"),
    Pattern::Date("%m-%d-%Y"),
    Pattern::Date("%m/%d/%y"),
    Pattern::Date("%Y/%m/%d"),
];

const MONTH_ABBREVIATIONS: [(&str, u32); 12] = [
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

static MONTH_DAY_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\w+)\s+(\d{1,2}),?\s+(\d{4})(?:\s+(\d{1,2}):(\d{2})\s*(am|pm))?")
        .expect("month/day/year regex must compile")
});

static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2})(?::(\d{2}))?\s*(am|pm)?").expect("clock regex must compile")
});

static DOORS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Doors:\s*(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)")
        .expect("doors regex must compile")
});

static SHOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Show:\s*(\d{1,2}(?::\d{2})?\s*(?:am|pm)?)").expect("show regex must compile")
});

static DATE_IN_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\w+\s+\d{1,2},?\s+\d{4}|\d{1,2}[/-]\d{1,2}[/-]\d{2,4})")
        .expect("date-in-text regex must compile")
});

static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tues?|wed|thur?s?|fri|sat|sun)\b\.?,?",
    )
    .expect("weekday regex must compile")
});

static ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").expect("ordinal regex must compile")
});

static MERIDIEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d)\s*([ap])\.?m\b\.?").expect("meridiem regex must compile")
});

static BARE_HOUR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|[^:\d])(\d{1,2}) ([ap]m)\b").expect("bare hour regex must compile")
});

static TIME_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2}(?::\d{2})? [ap]m)\s*(?:-|–|to)\s*\d{1,2}(?::\d{2})? ?[ap]m\b")
        .expect("time range regex must compile")
});

static CONNECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+at\s+|\s*@\s*|\s*\|\s*").expect("connective regex must compile"));

static SEPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsept\b").expect("sept regex must compile"));

static TRAILING_ZONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:EST|EDT|CST|CDT|MST|MDT|PST|PDT|ET|CT|MT|PT|UTC|GMT)$")
        .expect("trailing zone regex must compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferredTime {
    pub at: NaiveDateTime,
    pub date_inferred: bool,
}

impl InferredTime {
    fn exact(at: NaiveDateTime) -> Self {
        Self {
            at,
            date_inferred: false,
        }
    }
}

pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    try_patterns(text, EXPLICIT_PATTERNS)
        .or_else(|| parse_flexible(text))
        .or_else(|| parse_month_day_year(text))
}

pub fn format_datetime(at: NaiveDateTime) -> String {
    let (is_pm, hour) = at.hour12();
    format!(
        "{:02}/{:02}/{} {}:{:02} {} {}",
        at.month(),
        at.day(),
        at.year(),
        hour,
        at.minute(),
        if is_pm { "PM" } else { "AM" },
        TIMEZONE_LABEL
    )
}

pub fn derive_door_and_end(
    start: NaiveDateTime,
    explicit_door: Option<&str>,
    raw_start: &str,
) -> (NaiveDateTime, NaiveDateTime) {
    let door = explicit_door
        .and_then(parse_datetime)
        .or_else(|| doors_fragment(raw_start).map(|time| start.date().and_time(time)))
        .unwrap_or_else(|| start - Duration::hours(DOOR_LEAD_HOURS));
    let end = start + Duration::hours(SHOW_LENGTH_HOURS);
    (door, end)
}

pub fn resolve_start_time(text: &str) -> Option<InferredTime> {
    resolve_start_time_on(text, Local::now().date_naive())
}

pub fn resolve_start_time_on(text: &str, today: NaiveDate) -> Option<InferredTime> {
    if has_time_markers(text)
        && let Some(show) = extract_show_time_on(text, today)
    {
        return Some(show);
    }

    parse_datetime(text)
        .map(InferredTime::exact)
        .or_else(|| extract_show_time_on(text, today))
}

pub fn extract_show_time(text: &str) -> Option<InferredTime> {
    extract_show_time_on(text, Local::now().date_naive())
}

pub fn extract_show_time_on(text: &str, today: NaiveDate) -> Option<InferredTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let fragment = SHOW_RE.captures(text)?.get(1)?.as_str().trim().to_string();
    let time = parse_clock(&fragment)?;

    let date = DATE_IN_TEXT_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_datetime(m.as_str()))
        .map(|dt| dt.date());

    Some(match date {
        Some(date) => InferredTime::exact(date.and_time(time)),
        None => InferredTime {
            at: today.and_time(time),
            date_inferred: true,
        },
    })
}

pub fn doors_fragment(text: &str) -> Option<NaiveTime> {
    let fragment = DOORS_RE.captures(text)?.get(1)?.as_str().trim().to_string();
    parse_clock(&fragment)
}

pub fn has_time_markers(text: &str) -> bool {
    text.contains("Show:") || text.contains("Doors:")
}

pub fn parse_clock(text: &str) -> Option<NaiveTime> {
    let caps = CLOCK_RE.captures(text)?;
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(meridiem) if meridiem == "pm" && hour != 12 => hour += 12,
        Some(meridiem) if meridiem == "am" && hour == 12 => hour = 0,
        Some(_) => {}
        None if ASSUME_EVENING && hour < 12 => hour += 12,
        None => {}
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn try_patterns(text: &str, patterns: &[Pattern]) -> Option<NaiveDateTime> {
    patterns.iter().find_map(|pattern| match pattern {
        Pattern::DateTime(format) => NaiveDateTime::parse_from_str(text, format).ok(),
        Pattern::Date(format) => NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0)),
    })
}

fn parse_flexible(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_local());
    }

    let cleaned = clean_date_text(text);
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&cleaned) {
        return Some(dt.naive_local());
    }
    try_patterns(&cleaned, FLEXIBLE_PATTERNS)
}

fn clean_date_text(text: &str) -> String {
    let working = WEEKDAY_RE.replace_all(text, " ");
    let working = ORDINAL_RE.replace_all(&working, "$1");
    let working = SEPT_RE.replace_all(&working, "Sep");
    let working = MERIDIEM_RE.replace_all(&working, "$1 ${2}m");
    let working = TIME_RANGE_RE.replace_all(&working, "$1");
    let working = BARE_HOUR_RE.replace_all(&working, "${1}${2}:00 $3");
    let working = CONNECTIVE_RE.replace_all(&working, " ");
    let working = working.replace(',', " ");
    let working = working.split_whitespace().collect::<Vec<_>>().join(" ");
    TRAILING_ZONE_RE.replace(&working, "").trim().to_string()
}

fn parse_month_day_year(text: &str) -> Option<NaiveDateTime> {
    let caps = MONTH_DAY_YEAR_RE.captures(text)?;
    let month_key = caps
        .get(1)?
        .as_str()
        .chars()
        .take(3)
        .collect::<String>()
        .to_ascii_lowercase();
    let month = MONTH_ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == month_key)
        .map(|(_, month)| *month)?;
    let day: u32 = caps.get(2)?.as_str().parse().ok()?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let (Some(hour), Some(minute)) = (caps.get(4), caps.get(5)) else {
        return date.and_hms_opt(0, 0, 0);
    };
    let mut hour: u32 = hour.as_str().parse().ok()?;
    let minute: u32 = minute.as_str().parse().ok()?;
    match caps.get(6).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        Some("pm") if hour != 12 => hour += 12,
        Some("am") if hour == 12 => hour = 0,
        _ => {}
    }
    date.and_hms_opt(hour, minute, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn explicit_formats_parse() {
        assert_eq!(
            parse_datetime("11/26/2025 5:30 PM"),
            Some(at(2025, 11, 26, 17, 30))
        );
        assert_eq!(
            parse_datetime("November 26, 2025 5:30 pm"),
            Some(at(2025, 11, 26, 17, 30))
        );
        assert_eq!(
            parse_datetime("Nov 26, 2025"),
            Some(at(2025, 11, 26, 0, 0))
        );
        assert_eq!(
            parse_datetime("2025-11-26T19:00:00"),
            Some(at(2025, 11, 26, 19, 0))
        );
        assert_eq!(parse_datetime("2025-11-26"), Some(at(2025, 11, 26, 0, 0)));
    }

    #[test]
    fn canonical_rendering_parses_back() {
        let start = at(2025, 3, 18, 22, 45);
        let rendered = format_datetime(start);
        assert_eq!(rendered, "03/18/2025 10:45 PM EST");
        assert_eq!(parse_datetime(&rendered), Some(start));
    }

    #[test]
    fn flexible_parser_handles_loose_text() {
        assert_eq!(
            parse_datetime("2025-11-26T19:00:00-05:00"),
            Some(at(2025, 11, 26, 19, 0))
        );
        assert_eq!(
            parse_datetime("Wednesday, November 26th, 2025 at 8pm"),
            Some(at(2025, 11, 26, 20, 0))
        );
        assert_eq!(
            parse_datetime("Sat Dec 6 2025 7:30 p.m."),
            Some(at(2025, 12, 6, 19, 30))
        );
        assert_eq!(
            parse_datetime("11-26-2025 9:00 PM"),
            Some(at(2025, 11, 26, 21, 0))
        );
        assert_eq!(
            parse_datetime("November 26, 2025 8:00 PM - 11:00 PM"),
            Some(at(2025, 11, 26, 20, 0))
        );
        assert_eq!(
            parse_datetime("2025-11-26T19:30"),
            Some(at(2025, 11, 26, 19, 30))
        );
    }

    #[test]
    fn regex_fallback_finds_embedded_date() {
        assert_eq!(
            parse_datetime("Tickets on sale now! Nov 26, 2025 5:30 pm at the club"),
            Some(at(2025, 11, 26, 17, 30))
        );
        assert_eq!(
            parse_datetime("Live: December 31 2025 with special guests"),
            Some(at(2025, 12, 31, 0, 0))
        );
    }

    #[test]
    fn unparseable_input_is_none() {
        assert_eq!(parse_datetime(""), None);
        assert_eq!(parse_datetime("   "), None);
        assert_eq!(parse_datetime("not a date"), None);
        assert_eq!(None.and_then(parse_datetime), None);
    }

    #[test]
    fn format_uses_twelve_hour_clock_without_leading_zero() {
        assert_eq!(format_datetime(at(2025, 11, 26, 0, 0)), "11/26/2025 12:00 AM EST");
        assert_eq!(format_datetime(at(2025, 11, 26, 12, 0)), "11/26/2025 12:00 PM EST");
        assert_eq!(format_datetime(at(2025, 1, 5, 9, 5)), "01/05/2025 9:05 AM EST");
        assert_eq!(format_datetime(at(2025, 1, 5, 21, 5)), "01/05/2025 9:05 PM EST");
    }

    #[test]
    fn door_defaults_to_one_hour_before_and_end_three_after() {
        let start = parse_datetime("11/26/2025 5:30 PM").unwrap();
        let (door, end) = derive_door_and_end(start, None, "11/26/2025 5:30 PM");
        assert_eq!(format_datetime(door), "11/26/2025 4:30 PM EST");
        assert_eq!(format_datetime(end), "11/26/2025 8:30 PM EST");
    }

    #[test]
    fn explicit_door_wins_over_fragment() {
        let start = at(2025, 11, 26, 20, 0);
        let (door, _) = derive_door_and_end(
            start,
            Some("11/26/2025 6:15 PM"),
            "November 26, 2025 Doors: 7:00 pm",
        );
        assert_eq!(door, at(2025, 11, 26, 18, 15));
    }

    #[test]
    fn unparseable_explicit_door_falls_back_to_fragment() {
        let start = at(2025, 11, 26, 20, 0);
        let (door, end) = derive_door_and_end(
            start,
            Some("early"),
            "November 26, 2025 Doors: 7:00 pm // Show: 8:00 pm",
        );
        assert_eq!(door, at(2025, 11, 26, 19, 0));
        assert_eq!(end, at(2025, 11, 26, 23, 0));
    }

    #[test]
    fn doors_and_show_fragments_share_the_date() {
        let raw = "November 26, 2025 Doors: 7:00 pm // Show: 8:00 pm";
        let today = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let start = resolve_start_time_on(raw, today).unwrap();
        assert!(!start.date_inferred);
        assert_eq!(format_datetime(start.at), "11/26/2025 8:00 PM EST");

        let (door, _) = derive_door_and_end(start.at, None, raw);
        assert_eq!(format_datetime(door), "11/26/2025 7:00 PM EST");
    }

    #[test]
    fn show_without_date_uses_today_and_is_flagged() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        let show = extract_show_time_on("Doors: 7 // Show: 8", today).unwrap();
        assert!(show.date_inferred);
        assert_eq!(show.at, at(2026, 2, 14, 20, 0));
    }

    #[test]
    fn bare_hours_follow_evening_policy() {
        assert_eq!(parse_clock("7"), NaiveTime::from_hms_opt(19, 0, 0));
        assert_eq!(parse_clock("7:30"), NaiveTime::from_hms_opt(19, 30, 0));
        assert_eq!(parse_clock("14:00"), NaiveTime::from_hms_opt(14, 0, 0));
        assert_eq!(parse_clock("12"), NaiveTime::from_hms_opt(12, 0, 0));
        assert_eq!(parse_clock("12 am"), NaiveTime::from_hms_opt(0, 0, 0));
        assert_eq!(parse_clock("11 AM"), NaiveTime::from_hms_opt(11, 0, 0));
        assert_eq!(parse_clock("late"), None);
    }

    #[test]
    fn plain_start_text_skips_fragment_logic() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
        let start = resolve_start_time_on("Dec 5, 2025 9:00 PM", today).unwrap();
        assert_eq!(start.at, at(2025, 12, 5, 21, 0));
        assert_eq!(resolve_start_time_on("TBA", today), None);
    }
}
