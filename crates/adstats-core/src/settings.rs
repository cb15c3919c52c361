use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

use crate::currency::CurrencyTable;
use crate::dates::{resolve_timezone, today_in};
use crate::record::RecordContext;

/// Parties tracked by default, in report order.
pub const DEFAULT_PARTIES: &str =
    "BBB,BIJ1,BVNL,CDA,CU,D66,DENK,FvD,GL,JA21,PVV,PvdA,PvdD,SGP,SP,VOLT,VVD";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Aggregate political ad archive records into per-party statistics
#[derive(Parser, Debug, Clone)]
#[command(
    name = "adstats",
    about = "Aggregate political ad archive records into per-party statistics",
    version
)]
pub struct Settings {
    /// Raw ad records: a .json/.jsonl file or a directory scanned recursively
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// JSON object mapping page_id to party
    #[arg(long)]
    pub pages: Option<PathBuf>,

    /// Directory the report files are written to
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Date that stands in for "now" (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Timezone used to determine today's date (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// First date the archive has data for
    #[arg(long, default_value = "2018-05-07")]
    pub epoch: NaiveDate,

    /// USD to EUR conversion rate
    #[arg(long, default_value = "0.85", value_parser = parse_rate)]
    pub usd_rate: f64,

    /// Parties to report on, comma separated
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_PARTIES)]
    pub parties: Vec<String>,

    /// Also write every accepted ad as a JSON line
    #[arg(long)]
    pub stored_ads: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,
}

/// Currency rates must be finite and non-negative.
fn parse_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw.parse().map_err(|e| format!("{raw:?}: {e}"))?;
    if rate.is_finite() && rate >= 0.0 {
        Ok(rate)
    } else {
        Err(format!("rate must be a finite, non-negative number, got {raw}"))
    }
}

impl Settings {
    /// `~/.adstats`, or `./.adstats` when no home directory is known.
    pub fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".adstats")
    }

    pub fn input_path(&self) -> PathBuf {
        self.input
            .clone()
            .unwrap_or_else(|| Self::base_dir().join("raw"))
    }

    pub fn pages_path(&self) -> PathBuf {
        self.pages
            .clone()
            .unwrap_or_else(|| Self::base_dir().join("pages.json"))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| Self::base_dir().join("parsed"))
    }

    /// The pinned as-of date, or today in the configured timezone.
    pub fn resolve_as_of(&self) -> NaiveDate {
        self.as_of
            .unwrap_or_else(|| today_in(resolve_timezone(&self.timezone)))
    }

    /// Build the record construction context for this run.
    pub fn record_context(&self) -> RecordContext {
        RecordContext::new(
            self.epoch,
            self.resolve_as_of(),
            CurrencyTable::with_usd_rate(self.usd_rate),
        )
    }
}
