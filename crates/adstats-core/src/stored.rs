//! Persisted per-ad rows and the demographic-weighted read path used by
//! reporting.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::categories::{AgeRange, Demographic, Gender, Region};
use crate::distribution::CategoryDistribution;
use crate::error::{Result, StatsError};
use crate::estimate::EstimatedValue;
use crate::record::AdRecord;

// ── DataType ──────────────────────────────────────────────────────────────────

/// The quantity a reporting query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    #[serde(rename = "number-of-ads", alias = "count")]
    Count,
    Spending,
    Impressions,
    #[serde(rename = "estimated-audience-size", alias = "audience-size")]
    AudienceSize,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::Count,
        DataType::Spending,
        DataType::Impressions,
        DataType::AudienceSize,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Count => "number-of-ads",
            DataType::Spending => "spending",
            DataType::Impressions => "impressions",
            DataType::AudienceSize => "estimated-audience-size",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "number-of-ads" | "count" => Ok(DataType::Count),
            "spending" => Ok(DataType::Spending),
            "impressions" => Ok(DataType::Impressions),
            "estimated-audience-size" | "audience-size" => Ok(DataType::AudienceSize),
            other => Err(StatsError::InvalidQuery(format!("unknown data type: {other}"))),
        }
    }
}

// ── DemographicWeightedReader ─────────────────────────────────────────────────

/// Answers "amount of X for demographic Y" against one ad.
pub trait DemographicWeightedReader {
    fn active_days(&self) -> u32;

    /// Average total amount for `data_type`; `Count` is not asked for.
    fn average_amount(&self, data_type: DataType) -> f64;

    /// Fraction of the audience in `demographic`; `Total` is not asked for.
    fn category_weight(&self, demographic: Demographic) -> f64;

    /// Amount of `data_type` attributed to `demographic`, either over the
    /// ad's whole run or per active day.
    ///
    /// `Count` is always 1, whatever the demographic or per-day flag.
    fn amount_for(&self, data_type: DataType, demographic: Demographic, per_day: bool) -> f64 {
        if data_type == DataType::Count {
            return 1.0;
        }

        let mut amount = self.average_amount(data_type);
        if per_day {
            amount /= f64::from(self.active_days().max(1));
        }

        match demographic {
            Demographic::Total => amount,
            other => amount * self.category_weight(other),
        }
    }

    /// String-keyed form of [`DemographicWeightedReader::amount_for`].
    /// Unknown data types or demographics are an [`StatsError::InvalidQuery`].
    fn query(&self, data_type: &str, demographic: &str, per_day: bool) -> Result<f64> {
        let data_type: DataType = data_type.parse()?;
        let demographic: Demographic = demographic.parse()?;
        Ok(self.amount_for(data_type, demographic, per_day))
    }
}

// ── StoredAd ──────────────────────────────────────────────────────────────────

/// The persisted form of an [`AdRecord`]: one flat row per ad, with one
/// weight column per canonical category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAd {
    pub ad_id: String,
    pub party: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active_days: u32,
    pub spending: EstimatedValue,
    pub impressions: EstimatedValue,
    #[serde(default)]
    pub audience_size: Option<EstimatedValue>,
    pub gender: CategoryDistribution<Gender>,
    pub age: CategoryDistribution<AgeRange>,
    pub region: CategoryDistribution<Region>,
}

impl StoredAd {
    pub fn has_audience_size(&self) -> bool {
        self.audience_size.is_some()
    }
}

impl From<&AdRecord> for StoredAd {
    fn from(ad: &AdRecord) -> Self {
        Self {
            ad_id: ad.id.clone(),
            party: ad.party.clone(),
            start_date: ad.start_date,
            end_date: ad.end_date,
            active_days: ad.active_days,
            spending: ad.spending,
            impressions: ad.impressions,
            audience_size: ad.potential_reach,
            gender: ad.gender_distribution.clone(),
            age: ad.age_distribution.clone(),
            region: ad.region_distribution.clone(),
        }
    }
}

fn weight_in(
    gender: &CategoryDistribution<Gender>,
    age: &CategoryDistribution<AgeRange>,
    region: &CategoryDistribution<Region>,
    demographic: Demographic,
) -> f64 {
    match demographic {
        Demographic::Total => 1.0,
        Demographic::Gender(g) => gender.weight(g),
        Demographic::Age(a) => age.weight(a),
        Demographic::Region(r) => region.weight(r),
    }
}

impl DemographicWeightedReader for StoredAd {
    fn active_days(&self) -> u32 {
        self.active_days
    }

    fn average_amount(&self, data_type: DataType) -> f64 {
        match data_type {
            DataType::Count => 1.0,
            DataType::Spending => self.spending.average,
            DataType::Impressions => self.impressions.average,
            // Stored rows without an audience estimate read as zero.
            DataType::AudienceSize => self.audience_size.map_or(0.0, |a| a.average),
        }
    }

    fn category_weight(&self, demographic: Demographic) -> f64 {
        weight_in(&self.gender, &self.age, &self.region, demographic)
    }
}

impl DemographicWeightedReader for AdRecord {
    fn active_days(&self) -> u32 {
        self.active_days
    }

    fn average_amount(&self, data_type: DataType) -> f64 {
        match data_type {
            DataType::Count => 1.0,
            DataType::Spending => self.spending.average,
            DataType::Impressions => self.impressions.average,
            DataType::AudienceSize => self.potential_reach.map_or(0.0, |a| a.average),
        }
    }

    fn category_weight(&self, demographic: Demographic) -> f64 {
        weight_in(
            &self.gender_distribution,
            &self.age_distribution,
            &self.region_distribution,
            demographic,
        )
    }
}
