use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_iso, r"^(\d{4})-(\d{1,2})-(\d{1,2})$");
re!(re_slash_full_year, r"^(\d{1,2})/(\d{1,2})/(\d{4})$");
re!(re_dash_full_year, r"^(\d{1,2})-(\d{1,2})-(\d{4})$");
re!(re_slash_short_year, r"^(\d{1,2})/(\d{1,2})/(\d{2})$");
re!(re_compact, r"^(\d{4})(\d{2})(\d{2})$");
re!(re_canonical, r"^(\d{4})-(\d{2})-(\d{2})$");

/// How to read day/month-ambiguous dates such as `03/04/2026`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormatHint {
    #[serde(rename = "MM/DD/YYYY")]
    MonthFirst,
    #[serde(rename = "DD/MM/YYYY")]
    DayFirst,
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl fmt::Display for DateFormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFormatHint::MonthFirst => write!(f, "MM/DD/YYYY"),
            DateFormatHint::DayFirst => write!(f, "DD/MM/YYYY"),
            DateFormatHint::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for DateFormatHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "MM/DD/YYYY" => Ok(DateFormatHint::MonthFirst),
            "DD/MM/YYYY" => Ok(DateFormatHint::DayFirst),
            s if s.eq_ignore_ascii_case("auto") => Ok(DateFormatHint::Auto),
            other => Err(format!("Unknown date format hint: '{other}'")),
        }
    }
}

fn ymd(year: &str, month: &str, day: &str) -> String {
    format!("{year}-{month:0>2}-{day:0>2}")
}

fn month_first(m: &Captures<'_>) -> String {
    ymd(&m[3], &m[1], &m[2])
}

fn short_year(m: &Captures<'_>) -> String {
    let yy: u32 = m[3].parse().unwrap_or(0);
    let year = if yy >= 70 { 1900 + yy } else { 2000 + yy };
    ymd(&year.to_string(), &m[1], &m[2])
}

type PatternFn = fn(&Captures<'_>) -> String;

/// Ordered cascade; first match wins.
const PATTERNS: &[(fn() -> &'static Regex, PatternFn)] = &[
    (re_iso, |m| ymd(&m[1], &m[2], &m[3])),
    (re_slash_full_year, month_first),
    (re_dash_full_year, month_first),
    (re_slash_short_year, short_year),
    (re_compact, |m| ymd(&m[1], &m[2], &m[3])),
];

/// Normalize a bank-export date into `YYYY-MM-DD`.
///
/// Returns `None` for anything unrecognised. The result is only shape-checked;
/// use [`is_valid_date`] to reject impossible calendar days.
pub fn parse_date(text: &str, hint: DateFormatHint) -> Option<String> {
    let trimmed = text.trim();

    if hint == DateFormatHint::DayFirst {
        if let Some(m) = re_slash_full_year().captures(trimmed) {
            return Some(ymd(&m[3], &m[2], &m[1]));
        }
    }

    PATTERNS
        .iter()
        .find_map(|(re, build)| re().captures(trimmed).map(|m| build(&m)))
}

/// Whether a canonical `YYYY-MM-DD` string names a real proleptic Gregorian day.
pub fn is_valid_date(canonical: &str) -> bool {
    to_naive_date(canonical).is_some()
}

/// Parse a canonical `YYYY-MM-DD` string, rejecting impossible days.
pub fn to_naive_date(canonical: &str) -> Option<NaiveDate> {
    let m = re_canonical().captures(canonical)?;
    let year: i32 = m[1].parse().ok()?;
    let month: u32 = m[2].parse().ok()?;
    let day: u32 = m[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse and validate in one step.
pub fn normalize_date(text: &str, hint: DateFormatHint) -> Option<NaiveDate> {
    parse_date(text, hint).and_then(|s| to_naive_date(&s))
}
