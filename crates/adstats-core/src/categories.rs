//! Canonical gender, age and region categories.
//!
//! Every aggregation axis is a closed enum, so distributions and per-category
//! totals are fixed-size arrays indexed by [`Category::index`] rather than
//! maps that grow at runtime.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// One closed set of canonical categories (one aggregation axis).
pub trait Category: Copy + Eq + fmt::Debug + 'static {
    /// Every member, in report order.
    const ALL: &'static [Self];
    /// Axis name used in diagnostics and report keys.
    const AXIS: &'static str;

    /// Canonical label, e.g. `"female"`, `"65+"` or `"Noord-Brabant"`.
    fn label(self) -> &'static str;

    /// Position of this member in [`Category::ALL`].
    fn index(self) -> usize;

    /// Map a label as reported by the archive to its canonical member.
    fn from_archive_label(raw: &str) -> Option<Self>;

    /// Labels that are known to fall outside the canonical set and are
    /// dropped without a warning.
    fn is_known_foreign(_raw: &str) -> bool {
        false
    }

    fn count() -> usize {
        Self::ALL.len()
    }
}

macro_rules! canonical_category {
    (
        $(#[$meta:meta])*
        $name:ident, $axis:literal {
            $($variant:ident => $label:literal $(| $alias:literal)*,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant,)+
        }

        impl Category for $name {
            const ALL: &'static [Self] = &[$($name::$variant,)+];
            const AXIS: &'static str = $axis;

            fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            fn index(self) -> usize {
                self as usize
            }

            fn from_archive_label(raw: &str) -> Option<Self> {
                match raw {
                    $($label $(| $alias)* => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn is_known_foreign(raw: &str) -> bool {
                <$name>::FOREIGN_LABELS.contains(&raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

canonical_category! {
    /// Gender as reported in the demographic distribution.
    Gender, "gender" {
        Female => "female",
        Male => "male",
    }
}

canonical_category! {
    /// Age bracket as reported in the demographic distribution.
    AgeRange, "age" {
        From13To17 => "13-17",
        From18To24 => "18-24",
        From25To34 => "25-34",
        From35To44 => "35-44",
        From45To54 => "45-54",
        From55To64 => "55-64",
        From65 => "65+",
    }
}

canonical_category! {
    /// Dutch province.
    Region, "region" {
        Drenthe => "Drenthe",
        Flevoland => "Flevoland",
        Friesland => "Friesland" | "Fryslân",
        Gelderland => "Gelderland",
        Groningen => "Groningen",
        Limburg => "Limburg",
        NoordBrabant => "Noord-Brabant" | "North Brabant",
        NoordHolland => "Noord-Holland" | "North Holland",
        Overijssel => "Overijssel",
        Utrecht => "Utrecht",
        Zeeland => "Zeeland",
        ZuidHolland => "Zuid-Holland" | "South Holland",
    }
}

impl Gender {
    const FOREIGN_LABELS: &'static [&'static str] = &[];
}

impl AgeRange {
    const FOREIGN_LABELS: &'static [&'static str] = &[];
}

impl Region {
    /// Regions outside the Netherlands that show up for ads delivered
    /// across the border.
    const FOREIGN_LABELS: &'static [&'static str] = &[
        "Nordrhein-Westfalen",
        "Flemish Region",
        "Niedersachsen",
        "Wallonia",
        "Brussels",
        "Mandalay",
        "Bonaire, Sint Eustatius and Saba",
        "Aruba",
        "Curaçao",
    ];
}

// ── ByCategory ────────────────────────────────────────────────────────────────

/// Serializes a slice indexed by [`Category::index`] as a `{label: value}`
/// map in canonical order.
pub struct ByCategory<'a, C, T> {
    values: &'a [T],
    _axis: PhantomData<C>,
}

impl<'a, C: Category, T> ByCategory<'a, C, T> {
    pub fn new(values: &'a [T]) -> Self {
        Self {
            values,
            _axis: PhantomData,
        }
    }
}

impl<C: Category, T: Serialize> Serialize for ByCategory<'_, C, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(C::count()))?;
        for category in C::ALL {
            if let Some(value) = self.values.get(category.index()) {
                map.serialize_entry(category.label(), value)?;
            }
        }
        map.end()
    }
}

// ── Demographic ───────────────────────────────────────────────────────────────

/// A demographic selector for read-side queries: the whole audience or one
/// canonical category on any axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demographic {
    Total,
    Gender(Gender),
    Age(AgeRange),
    Region(Region),
}

impl FromStr for Demographic {
    type Err = StatsError;

    /// Accepts `"total"` or any canonical label, exactly as spelled in
    /// [`Category::label`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "total" {
            return Ok(Demographic::Total);
        }
        if let Some(g) = Gender::ALL.iter().find(|g| g.label() == s) {
            return Ok(Demographic::Gender(*g));
        }
        if let Some(a) = AgeRange::ALL.iter().find(|a| a.label() == s) {
            return Ok(Demographic::Age(*a));
        }
        if let Some(r) = Region::ALL.iter().find(|r| r.label() == s) {
            return Ok(Demographic::Region(*r));
        }
        Err(StatsError::InvalidQuery(format!("unknown demographic: {s}")))
    }
}
