//! Series keys and the compatibility rules used for sibling grouping.

use std::time::Duration;

use thiserror::Error;

use crate::dicom::AttributeSet;

/// Maximum acquisition time difference between files of one series.
///
/// Tiles captured in the same sweep are written seconds apart, so files
/// whose acquisition times differ by less than this belong together.
pub const DEFAULT_TIME_TOLERANCE: Duration = Duration::from_secs(150);

/// Options that control [`SeriesKey::compatible`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    pub check_series_number: bool,
    pub time_tolerance: Duration,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            check_series_number: true,
            time_tolerance: DEFAULT_TIME_TOLERANCE,
        }
    }
}

/// Why a candidate file was not grouped with the opened file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("acquisition date missing")]
    MissingDate,

    #[error("acquisition date differs")]
    DateMismatch,

    #[error("acquisition time missing or unparseable")]
    MissingTime,

    #[error("acquisition time outside tolerance")]
    TimeOutOfTolerance,

    #[error("series number differs")]
    SeriesNumberMismatch,

    #[error("specimen identifier differs")]
    SpecimenMismatch,

    #[error("instance UID lineage differs")]
    UidLineageMismatch,

    #[error("only one file has an instance UID")]
    UidPresenceMismatch,

    #[error("no instance number")]
    NoInstanceNumber,

    #[error("attributes unreadable: {0}")]
    Unreadable(String),
}

/// Comparison tuple for grouping files into a series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesKey {
    pub acquisition_date: Option<String>,
    /// Seconds since midnight.
    pub acquisition_time: Option<f64>,
    pub series_number: Option<i64>,
    pub specimen_id: Option<String>,
    /// All dot components of the instance UID except the last two.
    pub uid_prefix: Option<String>,
}

impl SeriesKey {
    pub fn from_attributes(attrs: &AttributeSet) -> Self {
        Self {
            acquisition_date: attrs
                .acquisition_date
                .as_deref()
                .map(clean)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            acquisition_time: attrs.acquisition_time.as_deref().and_then(parse_time),
            series_number: attrs.series_number,
            specimen_id: attrs.specimen_id.as_deref().map(|s| clean(s).to_string()),
            uid_prefix: attrs.sop_instance_uid.as_deref().map(uid_prefix),
        }
    }

    /// Check whether `candidate` belongs to the same series as `self`.
    ///
    /// # Errors
    /// Returns the first rule the candidate violates.
    pub fn compatible(&self, candidate: &SeriesKey, options: &MatchOptions) -> Result<(), Rejection> {
        match (&self.acquisition_date, &candidate.acquisition_date) {
            (Some(a), Some(b)) if a == b => {}
            (Some(_), Some(_)) => return Err(Rejection::DateMismatch),
            _ => return Err(Rejection::MissingDate),
        }

        match (self.acquisition_time, candidate.acquisition_time) {
            (Some(a), Some(b)) => {
                if (a - b).abs() >= options.time_tolerance.as_secs_f64() {
                    return Err(Rejection::TimeOutOfTolerance);
                }
            }
            _ => return Err(Rejection::MissingTime),
        }

        if options.check_series_number && self.series_number != candidate.series_number {
            return Err(Rejection::SeriesNumberMismatch);
        }

        if self.specimen_id != candidate.specimen_id {
            return Err(Rejection::SpecimenMismatch);
        }

        match (&self.uid_prefix, &candidate.uid_prefix) {
            (Some(a), Some(b)) if a != b => return Err(Rejection::UidLineageMismatch),
            (Some(_), None) | (None, Some(_)) => return Err(Rejection::UidPresenceMismatch),
            _ => {}
        }

        Ok(())
    }
}

fn clean(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || c == '\0')
}

/// Parse a DICOM `TM` value (`HHMMSS.FFFFFF`) into seconds since midnight.
///
/// Minutes and seconds may be omitted. The legacy `HH:MM:SS` form is also
/// accepted.
pub fn parse_time(value: &str) -> Option<f64> {
    let value: String = clean(value).chars().filter(|&c| c != ':').collect();
    let (whole, fraction) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value.as_str(), ""),
    };

    if !whole.bytes().all(|b| b.is_ascii_digit()) || !matches!(whole.len(), 2 | 4 | 6) {
        return None;
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let field = |range: std::ops::Range<usize>| -> f64 {
        whole
            .get(range)
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0) as f64
    };

    let hours = field(0..2);
    let minutes = field(2..4);
    let seconds = field(4..6);
    let fraction = if fraction.is_empty() {
        0.0
    } else {
        format!("0.{}", fraction).parse::<f64>().unwrap_or(0.0)
    };

    Some(hours * 3600.0 + minutes * 60.0 + seconds + fraction)
}

/// All dot-separated components of `uid` except the last two.
pub fn uid_prefix(uid: &str) -> String {
    let parts: Vec<&str> = clean(uid).split('.').collect();
    let keep = parts.len().saturating_sub(2);
    parts[..keep].join(".")
}
