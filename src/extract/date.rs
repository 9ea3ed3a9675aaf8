//! Date / deadline extraction
//!
//! Resolves Vietnamese date phrases against a reference day. Every result
//! is a `NaiveDate`; callers serialize it as ISO-8601.

use chrono::{Datelike, Days, Months, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

/// Month/day pair for period phrases that map to a fixed day of the year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

/// "đầu năm" deadline. Jan 31 rather than Jan 1 is the established product
/// behaviour; override through [`DateExtractor::with_start_of_year`].
pub const START_OF_YEAR: MonthDay = MonthDay { month: 1, day: 31 };

/// "giữa năm" deadline
pub const MID_YEAR: MonthDay = MonthDay { month: 6, day: 30 };

/// "cuối năm" deadline
pub const END_OF_YEAR: MonthDay = MonthDay { month: 12, day: 31 };

/// Day used for "đầu tháng N"
pub const START_OF_MONTH_DAY: u32 = 1;

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap();
    static ref SLASH_FULL: Regex = Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap();
    static ref DASH_FULL: Regex = Regex::new(r"\b(\d{1,2})-(\d{1,2})-(\d{4})\b").unwrap();
    static ref SLASH_SHORT: Regex = Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").unwrap();
    static ref VERBOSE_DATE: Regex =
        Regex::new(r"ngày\s+(\d{1,2})\s+tháng\s+(\d{1,2})(?:\s+năm\s+(\d{4}))?").unwrap();

    static ref NEXT_WEEK: Regex = Regex::new(r"tuần\s+(?:sau|tới)").unwrap();
    static ref NEXT_MONTH: Regex = Regex::new(r"tháng\s+(?:sau|tới)").unwrap();
    static ref END_OF_NEXT_MONTH: Regex = Regex::new(r"cuối\s+tháng\s+(?:sau|tới)").unwrap();

    static ref PERIOD_OF_MONTH: Regex =
        Regex::new(r"(cuối|đầu)\s+tháng(?:\s+(\d{1,2}))?").unwrap();
    static ref MONTH_NUMBER: Regex = Regex::new(r"tháng\s+(\d{1,2})\b").unwrap();

    static ref NEXT_YEAR_MARKER: Regex = Regex::new(r"năm\s+(?:sau|tới|nữa)").unwrap();
    /// A year only counts after "năm" or as "tháng N/YYYY"; bare numbers may be amounts
    static ref EXPLICIT_YEAR: Regex =
        Regex::new(r"(?:năm|tháng\s+\d{1,2}\s*/)\s*((?:19|20)\d{2})\b").unwrap();
}

/// Date extractor with configurable period mappings
#[derive(Debug, Clone, Copy)]
pub struct DateExtractor {
    start_of_year: MonthDay,
    mid_year: MonthDay,
    end_of_year: MonthDay,
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self {
            start_of_year: START_OF_YEAR,
            mid_year: MID_YEAR,
            end_of_year: END_OF_YEAR,
        }
    }
}

impl DateExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_of_year(mut self, month_day: MonthDay) -> Self {
        self.start_of_year = month_day;
        self
    }

    /// Resolve the first recognised date phrase in `text`
    pub fn extract(&self, text: &str, reference: NaiveDate) -> Option<NaiveDate> {
        let lowered = text.to_lowercase();
        let text = lowered.as_str();

        if let Some(date) = absolute_date(text, reference) {
            return Some(date);
        }

        if let Some(date) = relative_day(text, reference) {
            return Some(date);
        }

        if let Some(date) = relative_period(text, reference) {
            return Some(date);
        }

        let year = resolve_year(text, reference);

        if let Some(date) = self.period_phrase(text, reference, year) {
            return Some(date);
        }

        if let Some(caps) = MONTH_NUMBER.captures(text) {
            let month: u32 = caps[1].parse().ok()?;
            return last_day_of_month(year, month);
        }

        if NEXT_YEAR_MARKER.is_match(text) {
            return reference.checked_add_months(Months::new(12));
        }

        None
    }

    fn period_phrase(&self, text: &str, reference: NaiveDate, year: i32) -> Option<NaiveDate> {
        if text.contains("cuối năm") {
            return month_day(year, self.end_of_year);
        }
        if text.contains("đầu năm") {
            return month_day(year, self.start_of_year);
        }
        if text.contains("giữa năm") {
            return month_day(year, self.mid_year);
        }

        let caps = PERIOD_OF_MONTH.captures(text)?;
        let is_end = &caps[1] == "cuối";

        match caps.get(2) {
            Some(m) => {
                let month: u32 = m.as_str().parse().ok()?;
                if is_end {
                    last_day_of_month(year, month)
                } else {
                    NaiveDate::from_ymd_opt(year, month, START_OF_MONTH_DAY)
                }
            }
            None if is_end => last_day_of_month(reference.year(), reference.month()),
            None => {
                let next = reference.checked_add_months(Months::new(1))?;
                NaiveDate::from_ymd_opt(next.year(), next.month(), START_OF_MONTH_DAY)
            }
        }
    }
}

/// Resolve a date with the default period mappings
pub fn extract_date(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    DateExtractor::default().extract(text, reference)
}

fn absolute_date(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DATE.captures(text) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }
    if let Some(caps) = SLASH_FULL.captures(text) {
        return ymd(&caps[3], &caps[2], &caps[1]);
    }
    if let Some(caps) = DASH_FULL.captures(text) {
        return ymd(&caps[3], &caps[2], &caps[1]);
    }
    if let Some(caps) = SLASH_SHORT.captures(text) {
        let year = resolve_year(text, reference).to_string();
        return ymd(&year, &caps[2], &caps[1]);
    }
    if let Some(caps) = VERBOSE_DATE.captures(text) {
        let year = match caps.get(3) {
            Some(y) => y.as_str().to_string(),
            None => resolve_year(text, reference).to_string(),
        };
        return ymd(&year, &caps[2], &caps[1]);
    }
    None
}

fn relative_day(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    if text.contains("hôm nay") {
        Some(reference)
    } else if text.contains("ngày mai") {
        reference.checked_add_days(Days::new(1))
    } else if text.contains("hôm qua") {
        reference.checked_sub_days(Days::new(1))
    } else {
        None
    }
}

fn relative_period(text: &str, reference: NaiveDate) -> Option<NaiveDate> {
    if NEXT_WEEK.is_match(text) {
        return reference.checked_add_days(Days::new(7));
    }
    if END_OF_NEXT_MONTH.is_match(text) {
        let next = reference.checked_add_months(Months::new(1))?;
        return last_day_of_month(next.year(), next.month());
    }
    if NEXT_MONTH.is_match(text) {
        // chrono clamps to the last valid day (Jan 31 → Feb 28/29)
        return reference.checked_add_months(Months::new(1));
    }
    None
}

fn resolve_year(text: &str, reference: NaiveDate) -> i32 {
    if let Some(year) = EXPLICIT_YEAR
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
    {
        return year;
    }
    if NEXT_YEAR_MARKER.is_match(text) {
        return reference.year() + 1;
    }
    reference.year()
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn month_day(year: i32, md: MonthDay) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, md.month, md.day)
}

/// Last calendar day of `month` in `year`
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    first.checked_add_months(Months::new(1))?.pred_opt()
}

/// First day of the month containing `date`
pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
