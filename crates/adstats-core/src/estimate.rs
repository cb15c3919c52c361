//! Interval estimates reported by the archive in place of exact figures.

use serde::{Deserialize, Serialize};

use crate::error::RejectReason;

// ── RawNumber ─────────────────────────────────────────────────────────────────

/// A number as it appears in archive JSON: the API sends most numbers as
/// strings (`"lower_bound": "100"`), older dumps as plain numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawNumber {
    /// Read as an integer. Floats are accepted only when they carry no
    /// fractional part.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RawNumber::Int(i) => Some(*i),
            RawNumber::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            RawNumber::Float(_) => None,
            RawNumber::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_fraction(&self) -> Option<f64> {
        match self {
            RawNumber::Int(i) => Some(*i as f64),
            RawNumber::Float(f) => Some(*f),
            RawNumber::Text(s) => s.trim().parse().ok(),
        }
    }

    fn raw(&self) -> String {
        match self {
            RawNumber::Int(i) => i.to_string(),
            RawNumber::Float(f) => f.to_string(),
            RawNumber::Text(s) => s.clone(),
        }
    }

    fn invalid(&self, field: &'static str) -> RejectReason {
        RejectReason::InvalidNumber {
            field,
            raw: self.raw(),
        }
    }

    /// Read as a non-negative integer or reject on behalf of `field`.
    pub fn integer_for(&self, field: &'static str) -> Result<i64, RejectReason> {
        self.as_integer()
            .filter(|v| *v >= 0)
            .ok_or_else(|| self.invalid(field))
    }

    /// Read as a finite, non-negative fraction or reject on behalf of
    /// `field`. `"NaN"` and `"inf"` parse as floats but are refused here.
    pub fn fraction_for(&self, field: &'static str) -> Result<f64, RejectReason> {
        self.as_fraction()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| self.invalid(field))
    }
}

impl From<i64> for RawNumber {
    fn from(v: i64) -> Self {
        RawNumber::Int(v)
    }
}

// ── RawRange ──────────────────────────────────────────────────────────────────

/// `{lower_bound, upper_bound?}` exactly as delivered by the archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<RawNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<RawNumber>,
}

impl RawRange {
    pub fn new(lower: i64, upper: Option<i64>) -> Self {
        Self {
            lower_bound: Some(lower.into()),
            upper_bound: upper.map(RawNumber::from),
        }
    }
}

// ── EstimatedValue ────────────────────────────────────────────────────────────

/// A `{lower, average, upper}` interval.
///
/// `average` is always the midpoint; a source without an upper bound yields
/// a zero-width interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatedValue {
    pub lower: f64,
    pub average: f64,
    pub upper: f64,
}

impl EstimatedValue {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            average: (lower + upper) / 2.0,
            upper,
        }
    }

    /// Parse `range` without conversion.
    pub fn parse(range: &RawRange, field: &'static str) -> Result<Self, RejectReason> {
        Self::parse_with(range, field, |x| x)
    }

    /// Parse `range`, applying `convert` to each bound before averaging.
    ///
    /// A missing `lower_bound` rejects the containing record. A missing
    /// `upper_bound` makes the estimate a point (`upper == lower`). Negative
    /// or non-finite bounds, before or after conversion, are rejected.
    pub fn parse_with(
        range: &RawRange,
        field: &'static str,
        convert: impl Fn(f64) -> f64,
    ) -> Result<Self, RejectReason> {
        let bound = |raw: &RawNumber| -> Result<f64, RejectReason> {
            let value = convert(raw.integer_for(field)? as f64);
            if value.is_finite() && value >= 0.0 {
                Ok(value)
            } else {
                Err(RejectReason::InvalidNumber {
                    field,
                    raw: value.to_string(),
                })
            }
        };

        let lower = bound(
            range
                .lower_bound
                .as_ref()
                .ok_or(RejectReason::MissingBound(field))?,
        )?;
        let upper = match &range.upper_bound {
            Some(raw) => bound(raw)?,
            None => lower,
        };

        Ok(Self::new(lower, upper))
    }

    /// The average spread evenly over `days` days.
    pub fn average_per_day(&self, days: u32) -> f64 {
        self.average / f64::from(days.max(1))
    }
}
