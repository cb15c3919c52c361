//! Weighted category distributions and the label normalization that builds
//! them.
//!
//! Shares whose label maps to no canonical category are dropped, never
//! redistributed, so a distribution may sum to less than 1.0.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::categories::Category;

/// What happened to a single `(label, percentage)` share.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShareOutcome<C> {
    /// Added to the given canonical category.
    Mapped(C),
    /// The label was `"unknown"` (any case); dropped silently.
    Unknown,
    /// The label is known to be outside the canonical set; dropped.
    Foreign,
    /// The label is not recognized at all; dropped with a warning.
    Unrecognized,
}

/// Accumulated fractional weight per canonical category of one axis.
///
/// Every category is always present; categories that received no share
/// hold an explicit `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDistribution<C: Category> {
    weights: Vec<f64>,
    _axis: PhantomData<C>,
}

impl<C: Category> Default for CategoryDistribution<C> {
    fn default() -> Self {
        Self {
            weights: vec![0.0; C::count()],
            _axis: PhantomData,
        }
    }
}

impl<C: Category> CategoryDistribution<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a distribution from a sequence of raw `(label, percentage)`
    /// shares.
    pub fn from_shares<'a, I>(shares: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut dist = Self::new();
        for (label, percentage) in shares {
            dist.add_share(label, percentage);
        }
        dist
    }

    /// Fold one raw share into the distribution.
    pub fn add_share(&mut self, raw_label: &str, percentage: f64) -> ShareOutcome<C> {
        if let Some(category) = C::from_archive_label(raw_label) {
            self.weights[category.index()] += percentage;
            return ShareOutcome::Mapped(category);
        }

        if raw_label.eq_ignore_ascii_case("unknown") {
            return ShareOutcome::Unknown;
        }

        if C::is_known_foreign(raw_label) {
            debug!(
                axis = C::AXIS,
                label = raw_label,
                "dropping {:.2}% outside the canonical set",
                100.0 * percentage
            );
            return ShareOutcome::Foreign;
        }

        warn!(
            axis = C::AXIS,
            label = raw_label,
            "unrecognized {} label {:?} ({:.2}%)",
            C::AXIS,
            raw_label,
            100.0 * percentage
        );
        ShareOutcome::Unrecognized
    }

    pub fn weight(&self, category: C) -> f64 {
        self.weights[category.index()]
    }

    /// Sum of all canonical weights; at most the mass of the mapped shares.
    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// `(category, weight)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (C, f64)> + '_ {
        C::ALL.iter().map(move |c| (*c, self.weights[c.index()]))
    }

    /// Overwrite a category's weight; used when restoring stored records.
    pub fn set(&mut self, category: C, weight: f64) {
        self.weights[category.index()] = weight;
    }
}

impl<C: Category> Serialize for CategoryDistribution<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(C::count()))?;
        for (category, weight) in self.iter() {
            map.serialize_entry(category.label(), &weight)?;
        }
        map.end()
    }
}

impl<'de, C: Category> Deserialize<'de> for CategoryDistribution<C> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DistributionVisitor<C>(PhantomData<C>);

        impl<'de, C: Category> Visitor<'de> for DistributionVisitor<C> {
            type Value = CategoryDistribution<C>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a map of {} labels to weights", C::AXIS)
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut dist = CategoryDistribution::new();
                while let Some((label, weight)) = access.next_entry::<String, f64>()? {
                    let category = C::ALL
                        .iter()
                        .find(|c| c.label() == label)
                        .ok_or_else(|| de::Error::custom(format!("unknown {} {label}", C::AXIS)))?;
                    dist.set(*category, weight);
                }
                Ok(dist)
            }
        }

        deserializer.deserialize_map(DistributionVisitor(PhantomData))
    }
}
