//! Multi-axis statistics over a batch of normalized ads.
//!
//! One [`StatisticsAccumulator`] is created per run, folded over every
//! accepted [`AdRecord`] and then serialized. Folding is a pure sequence of
//! additions, so the order in which records arrive does not change the
//! totals.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::rc::Rc;

use chrono::NaiveDate;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use adstats_core::categories::{AgeRange, ByCategory, Category, Gender, Region};
use adstats_core::distribution::CategoryDistribution;
use adstats_core::estimate::EstimatedValue;
use adstats_core::record::{most_expensive, AdRecord};

// ── GlobalTotals ──────────────────────────────────────────────────────────────

/// Scalar totals across every party.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalTotals {
    pub ads: u64,
    pub ads_without_potential_reach: u64,
    pub spending_lower: f64,
    pub spending_average: f64,
    pub spending_upper: f64,
}

impl GlobalTotals {
    fn add(&mut self, ad: &AdRecord) {
        self.ads += 1;
        if !ad.has_potential_reach() {
            self.ads_without_potential_reach += 1;
        }
        self.spending_lower += ad.spending.lower;
        self.spending_average += ad.spending.average;
        self.spending_upper += ad.spending.upper;
    }
}

// ── CategoryTotals ────────────────────────────────────────────────────────────

/// Weighted spend and impressions per canonical category of one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotals<C: Category> {
    pub spending: Vec<f64>,
    pub impressions: Vec<f64>,
    _axis: PhantomData<C>,
}

impl<C: Category> Default for CategoryTotals<C> {
    fn default() -> Self {
        Self {
            spending: vec![0.0; C::count()],
            impressions: vec![0.0; C::count()],
            _axis: PhantomData,
        }
    }
}

impl<C: Category> CategoryTotals<C> {
    fn add(&mut self, dist: &CategoryDistribution<C>, spending: f64, impressions: f64) {
        for (category, weight) in dist.iter() {
            self.spending[category.index()] += weight * spending;
            self.impressions[category.index()] += weight * impressions;
        }
    }

    pub fn spending_for(&self, category: C) -> f64 {
        self.spending[category.index()]
    }

    pub fn impressions_for(&self, category: C) -> f64 {
        self.impressions[category.index()]
    }
}

impl<C: Category> Serialize for CategoryTotals<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("CategoryTotals", 2)?;
        st.serialize_field("spending", &ByCategory::<C, f64>::new(&self.spending))?;
        st.serialize_field("impressions", &ByCategory::<C, f64>::new(&self.impressions))?;
        st.end()
    }
}

// ── DailySeries ───────────────────────────────────────────────────────────────

/// Dense per-day series indexed by date offset from the archive epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailySeries {
    pub ads: Vec<u64>,
    pub spending: Vec<f64>,
    pub impressions: Vec<f64>,
    pub potential_reach: Vec<f64>,
}

impl DailySeries {
    fn with_len(days: usize) -> Self {
        Self {
            ads: vec![0; days],
            spending: vec![0.0; days],
            impressions: vec![0.0; days],
            potential_reach: vec![0.0; days],
        }
    }

    fn resize(&mut self, days: usize) {
        self.ads.resize(days, 0);
        self.spending.resize(days, 0.0);
        self.impressions.resize(days, 0.0);
        self.potential_reach.resize(days, 0.0);
    }

    fn add(&mut self, ad: &AdRecord) {
        for day in ad.active_indices() {
            self.ads[day] += 1;
            self.spending[day] += ad.spending_per_day;
            self.impressions[day] += ad.impressions_per_day;
            if let Some(reach) = ad.potential_reach_per_day {
                self.potential_reach[day] += reach;
            }
        }
    }
}

/// Per-day weighted spend and impressions for each category of one axis,
/// indexed `[category][day]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDailySeries<C: Category> {
    pub spending: Vec<Vec<f64>>,
    pub impressions: Vec<Vec<f64>>,
    _axis: PhantomData<C>,
}

impl<C: Category> CategoryDailySeries<C> {
    fn with_len(days: usize) -> Self {
        Self {
            spending: vec![vec![0.0; days]; C::count()],
            impressions: vec![vec![0.0; days]; C::count()],
            _axis: PhantomData,
        }
    }

    fn resize(&mut self, days: usize) {
        for series in self.spending.iter_mut().chain(self.impressions.iter_mut()) {
            series.resize(days, 0.0);
        }
    }

    fn add(&mut self, dist: &CategoryDistribution<C>, ad: &AdRecord) {
        for (category, weight) in dist.iter() {
            let spending = weight * ad.spending_per_day;
            let impressions = weight * ad.impressions_per_day;
            for day in ad.active_indices() {
                self.spending[category.index()][day] += spending;
                self.impressions[category.index()][day] += impressions;
            }
        }
    }

    pub fn spending_for(&self, category: C) -> &[f64] {
        &self.spending[category.index()]
    }

    pub fn impressions_for(&self, category: C) -> &[f64] {
        &self.impressions[category.index()]
    }
}

impl<C: Category> Serialize for CategoryDailySeries<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("CategoryDailySeries", 2)?;
        st.serialize_field("spending", &ByCategory::<C, Vec<f64>>::new(&self.spending))?;
        st.serialize_field(
            "impressions",
            &ByCategory::<C, Vec<f64>>::new(&self.impressions),
        )?;
        st.end()
    }
}

// ── PartyStatistics ───────────────────────────────────────────────────────────

/// Everything accumulated for one party.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyStatistics {
    pub ads: u64,
    pub spending: f64,
    pub impressions: f64,
    pub per_region: CategoryTotals<Region>,
    pub per_gender: CategoryTotals<Gender>,
    pub per_age: CategoryTotals<AgeRange>,
    pub per_date: DailySeries,
    pub per_region_per_date: CategoryDailySeries<Region>,
    pub per_gender_per_date: CategoryDailySeries<Gender>,
    pub per_age_per_date: CategoryDailySeries<AgeRange>,
}

impl PartyStatistics {
    fn with_len(days: usize) -> Self {
        Self {
            ads: 0,
            spending: 0.0,
            impressions: 0.0,
            per_region: CategoryTotals::default(),
            per_gender: CategoryTotals::default(),
            per_age: CategoryTotals::default(),
            per_date: DailySeries::with_len(days),
            per_region_per_date: CategoryDailySeries::with_len(days),
            per_gender_per_date: CategoryDailySeries::with_len(days),
            per_age_per_date: CategoryDailySeries::with_len(days),
        }
    }

    fn resize(&mut self, days: usize) {
        self.per_date.resize(days);
        self.per_region_per_date.resize(days);
        self.per_gender_per_date.resize(days);
        self.per_age_per_date.resize(days);
    }

    fn add(&mut self, ad: &AdRecord) {
        self.ads += 1;
        self.spending += ad.spending.average;
        self.impressions += ad.impressions.average;

        let (spending, impressions) = (ad.spending.average, ad.impressions.average);
        self.per_region.add(&ad.region_distribution, spending, impressions);
        self.per_gender.add(&ad.gender_distribution, spending, impressions);
        self.per_age.add(&ad.age_distribution, spending, impressions);

        self.per_date.add(ad);
        self.per_region_per_date.add(&ad.region_distribution, ad);
        self.per_gender_per_date.add(&ad.gender_distribution, ad);
        self.per_age_per_date.add(&ad.age_distribution, ad);
    }
}

// ── MostExpensiveAd ───────────────────────────────────────────────────────────

/// Report summary of the ad with the highest average spend per day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MostExpensiveAd {
    pub id: String,
    pub party: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active_days: u32,
    pub spending: EstimatedValue,
    pub spending_per_day: f64,
}

impl From<&AdRecord> for MostExpensiveAd {
    fn from(ad: &AdRecord) -> Self {
        Self {
            id: ad.id.clone(),
            party: ad.party.clone(),
            start_date: ad.start_date,
            end_date: ad.end_date,
            active_days: ad.active_days,
            spending: ad.spending,
            spending_per_day: ad.spending_per_day,
        }
    }
}

fn serialize_most_expensive<S: Serializer>(
    ad: &Option<Rc<AdRecord>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    ad.as_deref().map(MostExpensiveAd::from).serialize(serializer)
}

// ── StatisticsAccumulator ─────────────────────────────────────────────────────

/// The batch-wide aggregate: global totals, per-party totals, per-party ×
/// category totals and the dense per-day series.
///
/// Every party in the roster and every canonical category is present from
/// the start, so categories that never receive an ad stay explicit zeros.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsAccumulator {
    days: usize,
    totals: GlobalTotals,
    #[serde(rename = "most_expensive_ad", serialize_with = "serialize_most_expensive")]
    most_expensive: Option<Rc<AdRecord>>,
    parties: BTreeMap<String, PartyStatistics>,
}

impl StatisticsAccumulator {
    /// Create an empty aggregate for `parties`, with `days` dense slots per
    /// series.
    pub fn new<I, S>(parties: I, days: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parties = parties
            .into_iter()
            .map(|p| (p.into(), PartyStatistics::with_len(days)))
            .collect();
        Self {
            days,
            totals: GlobalTotals::default(),
            most_expensive: None,
            parties,
        }
    }

    /// Fold one accepted ad into every total.
    ///
    /// A party outside the roster gets its own zeroed entry. An ad active
    /// past the last slot widens every series so all stay the same length;
    /// record construction caps that at the context's horizon.
    pub fn fold(&mut self, ad: AdRecord) {
        let needed = ad.active_indices().end;
        if needed > self.days {
            self.resize(needed);
        }

        let ad = Rc::new(ad);
        self.totals.add(&ad);
        self.most_expensive = most_expensive(self.most_expensive.take(), Some(Rc::clone(&ad)));

        let days = self.days;
        self.parties
            .entry(ad.party.clone())
            .or_insert_with(|| PartyStatistics::with_len(days))
            .add(&ad);
    }

    /// Fold every ad of `ads`, consuming and returning the aggregate.
    pub fn fold_all(mut self, ads: impl IntoIterator<Item = AdRecord>) -> Self {
        for ad in ads {
            self.fold(ad);
        }
        self
    }

    fn resize(&mut self, days: usize) {
        for party in self.parties.values_mut() {
            party.resize(days);
        }
        self.days = days;
    }

    /// Length of every per-day series.
    pub fn days(&self) -> usize {
        self.days
    }

    pub fn totals(&self) -> &GlobalTotals {
        &self.totals
    }

    pub fn most_expensive(&self) -> Option<&AdRecord> {
        self.most_expensive.as_deref()
    }

    pub fn party(&self, name: &str) -> Option<&PartyStatistics> {
        self.parties.get(name)
    }

    /// Parties in name order.
    pub fn parties(&self) -> impl Iterator<Item = (&str, &PartyStatistics)> {
        self.parties.iter().map(|(k, v)| (k.as_str(), v))
    }
}
