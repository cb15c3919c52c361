//! Batch pipeline: resolve parties, normalize records, fold the survivors.
//!
//! A rejected record is logged, tallied and skipped; it never touches the
//! aggregate, and the batch carries on with the next record.

use std::collections::{BTreeMap, HashMap};

use adstats_core::error::{RejectReason, Result, StatsError};
use adstats_core::record::{AdRecord, RawAd, RecordContext};
use adstats_core::stored::StoredAd;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::accumulator::StatisticsAccumulator;
use crate::reader::LoadedAds;

// ── Public types ──────────────────────────────────────────────────────────────

/// Counters describing one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchMetadata {
    /// Raw records offered to the pipeline.
    pub records_read: usize,
    /// Records folded into the aggregate.
    pub records_accepted: usize,
    /// Rejected records, keyed by [`RejectReason::kind`].
    pub records_rejected: BTreeMap<&'static str, usize>,
}

/// Rejection kind for entries the loader could not decode into a raw ad.
pub const UNDECODABLE: &str = "undecodable";

impl BatchMetadata {
    pub fn total_rejected(&self) -> usize {
        self.records_rejected.values().sum()
    }

    /// Count `count` entries that never became a raw ad as read and rejected.
    pub fn count_undecodable(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.records_read += count;
        *self.records_rejected.entry(UNDECODABLE).or_default() += count;
    }
}

/// The complete output of [`run_batch`].
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub statistics: StatisticsAccumulator,
    pub metadata: BatchMetadata,
    /// Persistence rows for every accepted ad, when requested.
    pub stored_ads: Option<Vec<StoredAd>>,
}

/// Per-run inputs besides the raw records themselves.
#[derive(Debug, Clone)]
pub struct BatchConfig<'a> {
    pub context: &'a RecordContext,
    pub pages: &'a HashMap<String, String>,
    pub parties: &'a [String],
    pub keep_stored_ads: bool,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full batch over `raw_ads`.
pub fn run_batch(raw_ads: &[RawAd], config: &BatchConfig<'_>) -> BatchOutcome {
    let mut statistics =
        StatisticsAccumulator::new(config.parties.iter().cloned(), config.context.series_len());
    let mut metadata = BatchMetadata {
        records_read: raw_ads.len(),
        ..BatchMetadata::default()
    };
    let mut stored_ads = config.keep_stored_ads.then(Vec::new);

    for raw in raw_ads {
        let ad = match build_record(raw, config) {
            Ok(ad) => ad,
            Err(err) => {
                let kind = err.reject_reason().map_or("other", RejectReason::kind);
                warn!(kind, "skipping ad: {}", err);
                *metadata.records_rejected.entry(kind).or_default() += 1;
                continue;
            }
        };

        if let Some(rows) = stored_ads.as_mut() {
            rows.push(StoredAd::from(&ad));
        }
        statistics.fold(ad);
        metadata.records_accepted += 1;
    }

    info!(
        read = metadata.records_read,
        accepted = metadata.records_accepted,
        rejected = metadata.total_rejected(),
        "batch complete"
    );
    debug!(rejected = ?metadata.records_rejected, "rejections by kind");

    BatchOutcome {
        statistics,
        metadata,
        stored_ads,
    }
}

/// Run the batch over everything the loader produced, counting its
/// undecodable entries alongside the per-record rejections.
pub fn run_loaded(loaded: &LoadedAds, config: &BatchConfig<'_>) -> BatchOutcome {
    let mut outcome = run_batch(&loaded.ads, config);
    outcome.metadata.count_undecodable(loaded.undecodable);
    if loaded.undecodable > 0 {
        warn!(count = loaded.undecodable, "undecodable entries skipped while loading");
    }
    outcome
}

fn build_record(raw: &RawAd, config: &BatchConfig<'_>) -> Result<AdRecord> {
    let party = config.pages.get(&raw.page_id).ok_or_else(|| {
        StatsError::malformed(&raw.id, RejectReason::UnknownPage(raw.page_id.clone()))
    })?;
    AdRecord::from_raw(raw, party, config.context)
}
