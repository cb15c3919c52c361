//! Report serialization.
//!
//! Writes `general-data.json` with the cross-party view, one `<party>.json`
//! per party, and optionally `stored-ads.jsonl` with one row per accepted
//! ad.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use adstats_core::dates::DateIndexer;
use adstats_core::error::{Result, StatsError};
use adstats_core::stored::StoredAd;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::accumulator::{GlobalTotals, MostExpensiveAd, PartyStatistics, StatisticsAccumulator};
use crate::pipeline::{BatchMetadata, BatchOutcome};

pub const GENERAL_REPORT_FILE: &str = "general-data.json";
pub const STORED_ADS_FILE: &str = "stored-ads.jsonl";

// ── Report types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartySummary {
    pub ads: u64,
    pub spending: f64,
    pub impressions: f64,
}

/// Party names ranked descending by each headline metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyOrder {
    #[serde(rename = "number-of-ads")]
    pub ads: Vec<String>,
    pub spending: Vec<String>,
    pub impressions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GeneralReport<'a> {
    pub last_updated: NaiveDate,
    pub dates: Vec<String>,
    pub metadata: &'a BatchMetadata,
    pub totals: &'a GlobalTotals,
    pub most_expensive_ad: Option<MostExpensiveAd>,
    pub parties: BTreeMap<&'a str, PartySummary>,
    pub order: PartyOrder,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PartyReport<'a> {
    pub party: &'a str,
    pub last_updated: NaiveDate,
    pub dates: Vec<String>,
    #[serde(flatten)]
    pub statistics: &'a PartyStatistics,
}

// ── Builders ──────────────────────────────────────────────────────────────────

fn ranked(stats: &StatisticsAccumulator, key: impl Fn(&PartyStatistics) -> f64) -> Vec<String> {
    let mut parties: Vec<(&str, f64)> = stats.parties().map(|(n, p)| (n, key(p))).collect();
    // Stable sort keeps name order between equal values.
    parties.sort_by(|a, b| b.1.total_cmp(&a.1));
    parties.into_iter().map(|(n, _)| n.to_string()).collect()
}

/// Assemble the cross-party report.
pub fn general_report<'a>(
    outcome: &'a BatchOutcome,
    indexer: &DateIndexer,
    as_of: NaiveDate,
) -> GeneralReport<'a> {
    let stats = &outcome.statistics;
    GeneralReport {
        last_updated: as_of,
        dates: indexer.labels(stats.days()),
        metadata: &outcome.metadata,
        totals: stats.totals(),
        most_expensive_ad: stats.most_expensive().map(MostExpensiveAd::from),
        parties: stats
            .parties()
            .map(|(name, p)| {
                let summary = PartySummary {
                    ads: p.ads,
                    spending: p.spending,
                    impressions: p.impressions,
                };
                (name, summary)
            })
            .collect(),
        order: PartyOrder {
            ads: ranked(stats, |p| p.ads as f64),
            spending: ranked(stats, |p| p.spending),
            impressions: ranked(stats, |p| p.impressions),
        },
    }
}

// ── Writers ───────────────────────────────────────────────────────────────────

/// File name for a party's report. Anything other than letters, digits,
/// `-` and `_` becomes `_`, so names like `GL/PvdA` or `../x` stay inside
/// the output directory.
pub fn party_file_name(party: &str) -> String {
    let stem: String = party
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "_".to_string() } else { stem };
    format!("{stem}.json")
}

/// Per-party file names, refusing two parties that would share a file or
/// collide with a fixed report file.
fn party_file_names<'a>(stats: &'a StatisticsAccumulator) -> Result<Vec<(&'a str, String)>> {
    let mut owners: HashMap<String, &str> = HashMap::new();
    let mut names = Vec::new();
    for (party, _) in stats.parties() {
        let name = party_file_name(party);
        if name == GENERAL_REPORT_FILE {
            return Err(StatsError::Config(format!(
                "party {party:?} would overwrite {GENERAL_REPORT_FILE}"
            )));
        }
        if let Some(other) = owners.insert(name.clone(), party) {
            return Err(StatsError::Config(format!(
                "parties {other:?} and {party:?} both map to report file {name}"
            )));
        }
        names.push((party, name));
    }
    Ok(names)
}

/// Write `value` as pretty JSON via a temp file and rename.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn write_stored_ads(path: &Path, rows: &[StoredAd]) -> Result<()> {
    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Write every report file for `outcome` into `output_dir`, creating it if
/// needed. Returns the paths written.
pub fn write_reports(
    outcome: &BatchOutcome,
    output_dir: &Path,
    indexer: &DateIndexer,
    as_of: NaiveDate,
) -> Result<Vec<PathBuf>> {
    let file_names = party_file_names(&outcome.statistics)?;
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    let general = output_dir.join(GENERAL_REPORT_FILE);
    write_json(&general, &general_report(outcome, indexer, as_of))?;
    written.push(general);

    let dates = indexer.labels(outcome.statistics.days());
    for ((party, statistics), (_, file_name)) in outcome.statistics.parties().zip(&file_names) {
        let path = output_dir.join(file_name);
        let report = PartyReport {
            party,
            last_updated: as_of,
            dates: dates.clone(),
            statistics,
        };
        write_json(&path, &report)?;
        written.push(path);
    }

    if let Some(rows) = &outcome.stored_ads {
        let path = output_dir.join(STORED_ADS_FILE);
        write_stored_ads(&path, rows)?;
        written.push(path);
    }

    info!("Wrote {} report files to {}", written.len(), output_dir.display());
    Ok(written)
}
