//! Raw archive records and their normalized [`AdRecord`] form.

use std::borrow::Borrow;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::categories::{AgeRange, Gender, Region};
use crate::currency::CurrencyTable;
use crate::dates::{self, DateIndexer};
use crate::distribution::CategoryDistribution;
use crate::error::{RejectReason, Result, StatsError};
use crate::estimate::{EstimatedValue, RawNumber, RawRange};

// ── Raw input schema ──────────────────────────────────────────────────────────

/// Label for a share whose facet is absent or `null`.
const UNKNOWN_LABEL: &str = "unknown";

/// One `{percentage, gender, age}` group of the demographic distribution.
///
/// An absent or `null` facet reads as `"unknown"`, so only that facet's
/// weight is lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDemographicShare {
    pub percentage: RawNumber,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
}

/// One `{percentage, region}` group of the region distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRegionShare {
    pub percentage: RawNumber,
    #[serde(default)]
    pub region: Option<String>,
}

/// A single ad exactly as delivered by the archive fetcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAd {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub page_id: String,
    #[serde(default)]
    pub ad_delivery_start_time: Option<String>,
    #[serde(default)]
    pub ad_delivery_stop_time: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub spend: Option<RawRange>,
    #[serde(default)]
    pub impressions: Option<RawRange>,
    #[serde(default, alias = "estimated_audience_size")]
    pub potential_reach: Option<RawRange>,
    #[serde(default)]
    pub demographic_distribution: Vec<RawDemographicShare>,
    #[serde(default, alias = "delivery_by_region")]
    pub region_distribution: Vec<RawRegionShare>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match RawNumber::deserialize(deserializer)? {
        RawNumber::Int(i) => i.to_string(),
        RawNumber::Float(f) => f.to_string(),
        RawNumber::Text(s) => s,
    })
}

// ── RecordContext ─────────────────────────────────────────────────────────────

/// How far past `as_of` an unbounded context still accepts delivery days.
/// Keeps a bogus stop time such as `9999-12-31` from widening every dense
/// series to millions of slots.
pub const MAX_LOOKAHEAD_DAYS: i64 = 366;

/// Everything besides the raw record that construction depends on.
///
/// `as_of` stands in for "now" whenever a record has no stop time; pin it
/// for reproducible runs.
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub indexer: DateIndexer,
    pub as_of: NaiveDate,
    pub currencies: CurrencyTable,
    /// Last day of the reporting window. Records starting after it are
    /// rejected and end dates are capped to it.
    pub window_end: Option<NaiveDate>,
}

impl RecordContext {
    /// Context whose reporting window ends at `as_of`.
    pub fn new(epoch: NaiveDate, as_of: NaiveDate, currencies: CurrencyTable) -> Self {
        Self {
            indexer: DateIndexer::new(epoch),
            as_of,
            currencies,
            window_end: Some(as_of),
        }
    }

    /// Context without a reporting window: explicit stop times are taken
    /// as-is past `as_of`, up to [`MAX_LOOKAHEAD_DAYS`] beyond it.
    pub fn unbounded(epoch: NaiveDate, as_of: NaiveDate, currencies: CurrencyTable) -> Self {
        Self {
            window_end: None,
            ..Self::new(epoch, as_of, currencies)
        }
    }

    /// Dense series length needed to cover this context's window.
    pub fn series_len(&self) -> usize {
        self.indexer.span_through(self.window_end.unwrap_or(self.as_of))
    }

    /// Last day any record may be active on: the window end, or the
    /// lookahead limit for an unbounded context.
    pub fn horizon(&self) -> NaiveDate {
        self.window_end
            .unwrap_or(self.as_of + chrono::Duration::days(MAX_LOOKAHEAD_DAYS))
    }
}

// ── AdRecord ──────────────────────────────────────────────────────────────────

/// One normalized ad. Built once from a [`RawAd`] and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct AdRecord {
    pub id: String,
    pub party: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Day offset of `start_date` from the archive epoch.
    pub start_index: usize,
    /// Inclusive day count; always at least 1.
    pub active_days: u32,
    pub impressions: EstimatedValue,
    /// EUR-normalized spend.
    pub spending: EstimatedValue,
    /// `None` when the archive reported no audience estimate (distinct from
    /// a reach of zero).
    pub potential_reach: Option<EstimatedValue>,
    pub spending_per_day: f64,
    pub impressions_per_day: f64,
    pub potential_reach_per_day: Option<f64>,
    pub gender_distribution: CategoryDistribution<Gender>,
    pub age_distribution: CategoryDistribution<AgeRange>,
    pub region_distribution: CategoryDistribution<Region>,
}

impl AdRecord {
    /// Normalize `raw` for `party`. Any fatal condition rejects the whole
    /// record with [`StatsError::MalformedRecord`].
    pub fn from_raw(raw: &RawAd, party: &str, ctx: &RecordContext) -> Result<Self> {
        Self::build(raw, party, ctx).map_err(|reason| StatsError::malformed(&raw.id, reason))
    }

    fn build(
        raw: &RawAd,
        party: &str,
        ctx: &RecordContext,
    ) -> std::result::Result<Self, RejectReason> {
        let start_raw = raw
            .ad_delivery_start_time
            .as_deref()
            .ok_or(RejectReason::MissingField("ad_delivery_start_time"))?;
        let start_date = dates::parse_archive_date(start_raw)
            .ok_or_else(|| RejectReason::InvalidDate(start_raw.to_string()))?;
        let start_index = ctx
            .indexer
            .index(start_date)
            .ok_or_else(|| RejectReason::BeforeEpoch(start_date.to_string()))?;
        let horizon = ctx.horizon();
        if start_date > horizon {
            return Err(RejectReason::AfterWindow(start_date.to_string()));
        }

        let end_date = match raw.ad_delivery_stop_time.as_deref() {
            Some(stop) => dates::parse_archive_date(stop)
                .ok_or_else(|| RejectReason::InvalidDate(stop.to_string()))?,
            None => ctx.as_of,
        }
        .min(horizon);
        let active_days = dates::active_days(start_date, end_date);

        let impressions = EstimatedValue::parse(
            raw.impressions
                .as_ref()
                .ok_or(RejectReason::MissingBound("impressions"))?,
            "impressions",
        )?;

        let currency = raw
            .currency
            .as_deref()
            .ok_or(RejectReason::MissingField("currency"))?;
        let rate = ctx.currencies.rate(currency)?;
        let spending = EstimatedValue::parse_with(
            raw.spend.as_ref().ok_or(RejectReason::MissingBound("spend"))?,
            "spend",
            |x| x * rate,
        )?;

        let potential_reach = raw
            .potential_reach
            .as_ref()
            .map(|range| EstimatedValue::parse(range, "potential_reach"))
            .transpose()?;

        let mut gender_distribution = CategoryDistribution::new();
        let mut age_distribution = CategoryDistribution::new();
        for share in &raw.demographic_distribution {
            let percentage = share.percentage.fraction_for("percentage")?;
            let gender = share.gender.as_deref().unwrap_or(UNKNOWN_LABEL);
            let age = share.age.as_deref().unwrap_or(UNKNOWN_LABEL);
            gender_distribution.add_share(gender, percentage);
            age_distribution.add_share(age, percentage);
        }

        let mut region_distribution = CategoryDistribution::new();
        for share in &raw.region_distribution {
            let percentage = share.percentage.fraction_for("percentage")?;
            let region = share.region.as_deref().unwrap_or(UNKNOWN_LABEL);
            region_distribution.add_share(region, percentage);
        }

        debug!(
            id = %raw.id,
            party,
            %start_date,
            active_days,
            spend = spending.average,
            "normalized ad"
        );

        Ok(Self {
            id: raw.id.clone(),
            party: party.to_string(),
            start_date,
            end_date,
            start_index,
            active_days,
            impressions,
            spending,
            spending_per_day: spending.average_per_day(active_days),
            impressions_per_day: impressions.average_per_day(active_days),
            potential_reach_per_day: potential_reach.map(|r| r.average_per_day(active_days)),
            potential_reach,
            gender_distribution,
            age_distribution,
            region_distribution,
        })
    }

    pub fn has_potential_reach(&self) -> bool {
        self.potential_reach.is_some()
    }

    /// Date offsets of every day this ad was active.
    pub fn active_indices(&self) -> std::ops::Range<usize> {
        self.start_index..self.start_index + self.active_days as usize
    }
}

impl fmt::Display for AdRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.party, self.start_date.format("%Y-%m-%d"))
    }
}

/// Pick the ad with the higher average spend per day.
///
/// Ties and a missing right operand keep the left one; `None` comes back
/// only when both sides are `None`.
pub fn most_expensive<T: Borrow<AdRecord>>(left: Option<T>, right: Option<T>) -> Option<T> {
    match (left, right) {
        (None, None) => None,
        (Some(l), None) => Some(l),
        (None, Some(r)) => Some(r),
        (Some(l), Some(r)) => {
            if l.borrow().spending_per_day >= r.borrow().spending_per_day {
                Some(l)
            } else {
                Some(r)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ctx() -> RecordContext {
        RecordContext::new(dates::archive_epoch(), d(2021, 3, 31), CurrencyTable::default())
    }

    fn raw(value: serde_json::Value) -> RawAd {
        serde_json::from_value(value).unwrap()
    }

    fn usd_ad() -> RawAd {
        raw(json!({
            "id": "1",
            "page_id": "42",
            "ad_delivery_start_time": "2021-03-01",
            "ad_delivery_stop_time": "2021-03-02",
            "currency": "USD",
            "spend": {"lower_bound": "100", "upper_bound": "300"},
            "impressions": {"lower_bound": "1000", "upper_bound": "2000"},
            "demographic_distribution": [
                {"percentage": "0.3", "gender": "female", "age": "25-34"},
                {"percentage": "0.5", "gender": "male", "age": "25-34"},
                {"percentage": "0.2", "gender": "unknown", "age": "65+"}
            ],
            "region_distribution": [
                {"region": "Drenthe", "percentage": "0.4"},
                {"region": "Unknown", "percentage": "0.6"}
            ]
        }))
    }

    #[test]
    fn test_usd_spend_is_converted_and_spread_per_day() {
        let ad = AdRecord::from_raw(&usd_ad(), "D66", &ctx()).unwrap();
        assert!((ad.spending.lower - 85.0).abs() < 1e-9);
        assert!((ad.spending.upper - 255.0).abs() < 1e-9);
        assert!((ad.spending.average - 170.0).abs() < 1e-9);
        assert_eq!(ad.active_days, 2);
        assert!((ad.spending_per_day - 85.0).abs() < 1e-9);
        assert!((ad.impressions_per_day - 750.0).abs() < 1e-9);
        assert_eq!(ad.party, "D66");
        assert_eq!(ad.to_string(), "D66 on 2021-03-01");
    }

    #[test]
    fn test_demographics_fold_into_both_axes() {
        let ad = AdRecord::from_raw(&usd_ad(), "D66", &ctx()).unwrap();
        assert!((ad.gender_distribution.weight(Gender::Female) - 0.3).abs() < 1e-12);
        assert!((ad.gender_distribution.weight(Gender::Male) - 0.5).abs() < 1e-12);
        assert!((ad.age_distribution.weight(AgeRange::From25To34) - 0.8).abs() < 1e-12);
        assert!((ad.age_distribution.weight(AgeRange::From65) - 0.2).abs() < 1e-12);
        assert!((ad.region_distribution.weight(Region::Drenthe) - 0.4).abs() < 1e-12);
        assert_eq!(ad.region_distribution.weight(Region::Utrecht), 0.0);
    }

    #[test]
    fn test_missing_reach_is_flagged_not_zero() {
        let ad = AdRecord::from_raw(&usd_ad(), "D66", &ctx()).unwrap();
        assert!(!ad.has_potential_reach());
        assert!(ad.potential_reach_per_day.is_none());

        let mut with_reach = usd_ad();
        with_reach.potential_reach = Some(RawRange::new(0, None));
        let ad = AdRecord::from_raw(&with_reach, "D66", &ctx()).unwrap();
        assert!(ad.has_potential_reach());
        assert_eq!(ad.potential_reach_per_day, Some(0.0));
    }

    #[test]
    fn test_missing_stop_time_uses_as_of() {
        let mut ongoing = usd_ad();
        ongoing.ad_delivery_stop_time = None;
        let ad = AdRecord::from_raw(&ongoing, "D66", &ctx()).unwrap();
        assert_eq!(ad.end_date, d(2021, 3, 31));
        assert_eq!(ad.active_days, 31);
        assert_eq!(ad.active_indices().len(), 31);
    }

    #[test]
    fn test_stop_time_capped_to_window() {
        let mut long = usd_ad();
        long.ad_delivery_stop_time = Some("2021-06-01".into());
        let ad = AdRecord::from_raw(&long, "D66", &ctx()).unwrap();
        assert_eq!(ad.end_date, d(2021, 3, 31));

        let unbounded =
            RecordContext::unbounded(dates::archive_epoch(), d(2021, 3, 31), CurrencyTable::default());
        let ad = AdRecord::from_raw(&long, "D66", &unbounded).unwrap();
        assert_eq!(ad.end_date, d(2021, 6, 1));
    }

    #[test]
    fn test_unbounded_stop_time_capped_at_lookahead() {
        let mut forever = usd_ad();
        forever.ad_delivery_stop_time = Some("9999-12-31".into());
        let unbounded =
            RecordContext::unbounded(dates::archive_epoch(), d(2021, 3, 31), CurrencyTable::default());
        let ad = AdRecord::from_raw(&forever, "D66", &unbounded).unwrap();
        assert_eq!(ad.end_date, d(2021, 3, 31) + chrono::Duration::days(MAX_LOOKAHEAD_DAYS));
        assert_eq!(ad.end_date, unbounded.horizon());

        let mut far_start = usd_ad();
        far_start.ad_delivery_start_time = Some("2030-01-01".into());
        far_start.ad_delivery_stop_time = None;
        let err = AdRecord::from_raw(&far_start, "D66", &unbounded).unwrap_err();
        assert_eq!(err.reject_reason().map(|r| r.kind()), Some("after-window"));
    }

    #[test]
    fn test_non_finite_percentage_rejected() {
        for bad in ["NaN", "inf"] {
            let mut ad = usd_ad();
            ad.region_distribution = vec![RawRegionShare {
                percentage: RawNumber::Text(bad.to_string()),
                region: Some("Utrecht".into()),
            }];
            let err = AdRecord::from_raw(&ad, "D66", &ctx()).unwrap_err();
            assert_eq!(
                err.reject_reason(),
                Some(&RejectReason::InvalidNumber {
                    field: "percentage",
                    raw: bad.to_string()
                })
            );
        }

        let mut ad = usd_ad();
        ad.demographic_distribution[0].percentage = RawNumber::Text("NaN".into());
        let err = AdRecord::from_raw(&ad, "D66", &ctx()).unwrap_err();
        assert_eq!(err.reject_reason().map(|r| r.kind()), Some("invalid-number"));
    }

    #[test]
    fn test_negative_spend_rejected() {
        let mut ad = usd_ad();
        ad.spend = Some(RawRange::new(-100, Some(300)));
        let err = AdRecord::from_raw(&ad, "D66", &ctx()).unwrap_err();
        assert_eq!(err.reject_reason().map(|r| r.kind()), Some("invalid-number"));
    }

    #[test]
    fn test_null_share_labels_lose_only_that_facet() {
        let ad = raw(json!({
            "id": "5",
            "ad_delivery_start_time": "2021-03-01",
            "ad_delivery_stop_time": "2021-03-01",
            "currency": "EUR",
            "spend": {"lower_bound": "0", "upper_bound": "99"},
            "impressions": {"lower_bound": "1000"},
            "demographic_distribution": [
                {"percentage": "0.7", "gender": null, "age": "18-24"},
                {"percentage": "0.3", "gender": "male"}
            ],
            "region_distribution": [
                {"percentage": "0.5", "region": null},
                {"percentage": "0.5", "region": "Limburg"}
            ]
        }));
        let record = AdRecord::from_raw(&ad, "SP", &ctx()).unwrap();
        assert_eq!(record.gender_distribution.total(), 0.3);
        assert_eq!(record.age_distribution.weight(AgeRange::From18To24), 0.7);
        assert_eq!(record.age_distribution.total(), 0.7);
        assert_eq!(record.region_distribution.weight(Region::Limburg), 0.5);
        assert_eq!(record.region_distribution.total(), 0.5);
    }

    #[test]
    fn test_pre_epoch_start_rejected() {
        let mut old = usd_ad();
        old.ad_delivery_start_time = Some("2018-05-06".into());
        let err = AdRecord::from_raw(&old, "D66", &ctx()).unwrap_err();
        assert_eq!(err.reject_reason().map(|r| r.kind()), Some("before-epoch"));
    }

    #[test]
    fn test_start_after_window_rejected() {
        let mut future = usd_ad();
        future.ad_delivery_start_time = Some("2021-04-01".into());
        let err = AdRecord::from_raw(&future, "D66", &ctx()).unwrap_err();
        assert_eq!(err.reject_reason().map(|r| r.kind()), Some("after-window"));
    }

    #[test]
    fn test_unknown_currency_rejected() {
        let mut gbp = usd_ad();
        gbp.currency = Some("GBP".into());
        let err = AdRecord::from_raw(&gbp, "D66", &ctx()).unwrap_err();
        assert!(matches!(
            err.reject_reason(),
            Some(RejectReason::UnknownCurrency(code)) if code == "GBP"
        ));
    }

    #[test]
    fn test_missing_spend_bound_rejected() {
        let mut ad = usd_ad();
        ad.spend = Some(RawRange::default());
        let err = AdRecord::from_raw(&ad, "D66", &ctx()).unwrap_err();
        assert_eq!(err.reject_reason(), Some(&RejectReason::MissingBound("spend")));
    }

    #[test]
    fn test_numeric_ids_and_aliases_deserialize() {
        let ad = raw(json!({
            "id": 123,
            "page_id": 456,
            "ad_delivery_start_time": "2021-03-01T10:00:00+0000",
            "currency": "EUR",
            "spend": {"lower_bound": 0, "upper_bound": 99},
            "impressions": {"lower_bound": 1000},
            "estimated_audience_size": {"lower_bound": 10000, "upper_bound": 50000},
            "delivery_by_region": [{"region": "Utrecht", "percentage": 1.0}]
        }));
        assert_eq!(ad.id, "123");
        assert_eq!(ad.page_id, "456");
        let record = AdRecord::from_raw(&ad, "VVD", &ctx()).unwrap();
        assert_eq!(record.potential_reach.map(|r| r.average), Some(30000.0));
        assert_eq!(record.region_distribution.weight(Region::Utrecht), 1.0);
    }

    fn ad_with_rate(id: &str, spend: i64, days: u32) -> AdRecord {
        let mut r = usd_ad();
        r.id = id.to_string();
        r.currency = Some("EUR".into());
        r.spend = Some(RawRange::new(spend, None));
        r.ad_delivery_stop_time = Some(
            (d(2021, 3, 1) + chrono::Duration::days(i64::from(days) - 1))
                .format("%Y-%m-%d")
                .to_string(),
        );
        AdRecord::from_raw(&r, "CDA", &ctx()).unwrap()
    }

    #[test]
    fn test_most_expensive_compares_per_day_rate() {
        let cheap_long = ad_with_rate("a", 1000, 10);
        let pricey_short = ad_with_rate("b", 300, 1);
        let winner = most_expensive(Some(&cheap_long), Some(&pricey_short)).unwrap();
        assert_eq!(winner.id, "b");
        let winner = most_expensive(Some(&pricey_short), Some(&cheap_long)).unwrap();
        assert_eq!(winner.id, "b");
    }

    #[test]
    fn test_most_expensive_null_handling_and_ties() {
        let a = ad_with_rate("a", 100, 1);
        let b = ad_with_rate("b", 100, 1);
        assert!(most_expensive::<&AdRecord>(None, None).is_none());
        assert_eq!(most_expensive(None, Some(&a)).unwrap().id, "a");
        assert_eq!(most_expensive(Some(&a), None).unwrap().id, "a");
        assert_eq!(most_expensive(Some(&a), Some(&a)).unwrap().id, "a");
        assert_eq!(most_expensive(Some(&a), Some(&b)).unwrap().id, "a");
        assert_eq!(most_expensive(Some(&b), Some(&a)).unwrap().id, "b");
    }
}
