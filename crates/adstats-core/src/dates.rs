use std::sync::OnceLock;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use regex::Regex;
use tracing::warn;

/// The first date the ad archive has data for.
pub fn archive_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 5, 7).unwrap_or(NaiveDate::MIN)
}

// ── DateIndexer ───────────────────────────────────────────────────────────────

/// Maps calendar dates to dense day offsets from a fixed epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateIndexer {
    epoch: NaiveDate,
}

impl Default for DateIndexer {
    fn default() -> Self {
        Self::new(archive_epoch())
    }
}

impl DateIndexer {
    pub fn new(epoch: NaiveDate) -> Self {
        Self { epoch }
    }

    pub fn epoch(&self) -> NaiveDate {
        self.epoch
    }

    /// Day offset of `date`, or `None` when it precedes the epoch.
    pub fn index(&self, date: NaiveDate) -> Option<usize> {
        let days = (date - self.epoch).num_days();
        usize::try_from(days).ok()
    }

    /// Inverse of [`DateIndexer::index`].
    pub fn date_at(&self, index: usize) -> NaiveDate {
        self.epoch + chrono::Duration::days(index as i64)
    }

    /// Number of dense slots needed to cover the epoch up to and including
    /// `last`. Zero when `last` precedes the epoch.
    pub fn span_through(&self, last: NaiveDate) -> usize {
        self.index(last).map_or(0, |i| i + 1)
    }

    /// ISO labels for the first `len` slots, for report axes.
    pub fn labels(&self, len: usize) -> Vec<String> {
        (0..len)
            .map(|i| self.date_at(i).format("%Y-%m-%d").to_string())
            .collect()
    }
}

// ── Archive date parsing ──────────────────────────────────────────────────────

fn leading_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d{4}-\d{2}-\d{2})").expect("regex is valid"))
}

/// Parse an archive delivery time into its calendar date.
///
/// Accepts `YYYY-MM-DD` and any ISO-8601 timestamp that starts with it
/// (`2021-03-01T10:00:00+0000`); the time of day is ignored.
pub fn parse_archive_date(raw: &str) -> Option<NaiveDate> {
    let caps = leading_date().captures(raw)?;
    NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()
}

/// Inclusive day count from `start` to `end`, never less than one.
pub fn active_days(start: NaiveDate, end: NaiveDate) -> u32 {
    let days = (end - start).num_days() + 1;
    u32::try_from(days.max(1)).unwrap_or(u32::MAX)
}

// ── "Today" resolution ────────────────────────────────────────────────────────

/// Resolve a timezone setting: an IANA name, or `"auto"` for the system
/// zone. Unrecognised names fall back to UTC with a warning.
pub fn resolve_timezone(setting: &str) -> Tz {
    let name = if setting.eq_ignore_ascii_case("auto") {
        iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
    } else {
        setting.to_string()
    };

    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", name);
        Tz::UTC
    })
}

/// The current calendar date in `tz`.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}
