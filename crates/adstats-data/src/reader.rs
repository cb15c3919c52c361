//! Input discovery and loading.
//!
//! Raw ad records arrive as `.json` files (a top-level array, or an archive
//! API page with a `data` array) or `.jsonl` files with one record per line.
//! Unreadable lines and entries are logged, counted and skipped so one bad
//! dump does not sink the batch.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use adstats_core::error::{Result, StatsError};
use adstats_core::record::RawAd;
use serde_json::Value;
use tracing::{debug, warn};

// ── Public API ────────────────────────────────────────────────────────────────

/// Raw ads read from disk, plus the number of entries that could not be
/// decoded into a [`RawAd`].
#[derive(Debug, Clone, Default)]
pub struct LoadedAds {
    pub ads: Vec<RawAd>,
    /// Undecodable array entries and JSONL lines. A `.json` file that is not
    /// JSON at all counts once.
    pub undecodable: usize,
}

impl LoadedAds {
    fn extend(&mut self, other: LoadedAds) {
        self.ads.extend(other.ads);
        self.undecodable += other.undecodable;
    }
}

/// Find every `.json` / `.jsonl` file under `data_path`, sorted by path.
/// A path that is itself a file is returned as the only entry.
pub fn find_record_files(data_path: &Path) -> Vec<PathBuf> {
    if !data_path.exists() {
        warn!("Data path does not exist: {}", data_path.display());
        return Vec::new();
    }
    if data_path.is_file() {
        return vec![data_path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_record_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load every raw ad under `data_path`, in file order.
pub fn load_raw_ads(data_path: &Path) -> Result<LoadedAds> {
    if !data_path.exists() {
        return Err(StatsError::DataPathNotFound(data_path.to_path_buf()));
    }

    let files = find_record_files(data_path);
    if files.is_empty() {
        return Err(StatsError::NoDataFiles(data_path.to_path_buf()));
    }

    let mut loaded = LoadedAds::default();
    for file in &files {
        let from_file = match extension(file) {
            Some("jsonl") => load_jsonl_file(file)?,
            _ => load_json_file(file)?,
        };
        debug!(
            "Loaded {} ads from {} ({} undecodable)",
            from_file.ads.len(),
            file.display(),
            from_file.undecodable
        );
        loaded.extend(from_file);
    }

    debug!("Loaded {} ads from {} files", loaded.ads.len(), files.len());
    Ok(loaded)
}

/// Load the `page_id → party` map from a JSON object.
pub fn load_page_map(path: &Path) -> Result<HashMap<String, String>> {
    let content = read_file(path)?;
    let value: Value = serde_json::from_str(&content)?;
    let Value::Object(entries) = value else {
        return Err(StatsError::Config(format!(
            "{} must contain a JSON object of page_id to party",
            path.display()
        )));
    };

    let mut pages = HashMap::with_capacity(entries.len());
    for (page_id, party) in entries {
        match party {
            Value::String(party) => {
                pages.insert(page_id, party);
            }
            other => warn!("Ignoring page {} with non-string party {}", page_id, other),
        }
    }
    Ok(pages)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn is_record_file(path: &Path) -> bool {
    matches!(extension(path), Some("json") | Some("jsonl"))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| StatsError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode one JSON value into `loaded`, logging and counting failures.
fn decode_into(loaded: &mut LoadedAds, value: Value, origin: &Path) {
    match serde_json::from_value::<RawAd>(value) {
        Ok(ad) => loaded.ads.push(ad),
        Err(e) => {
            warn!("Skipping undecodable ad in {}: {}", origin.display(), e);
            loaded.undecodable += 1;
        }
    }
}

fn load_json_file(path: &Path) -> Result<LoadedAds> {
    let content = read_file(path)?;
    let value: Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Skipping unparseable file {}: {}", path.display(), e);
            return Ok(LoadedAds {
                ads: Vec::new(),
                undecodable: 1,
            });
        }
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut page) => match page.remove("data") {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(page)],
        },
        other => {
            warn!("Skipping {}: unexpected top-level {}", path.display(), other);
            return Ok(LoadedAds {
                ads: Vec::new(),
                undecodable: 1,
            });
        }
    };

    let mut loaded = LoadedAds::default();
    for item in items {
        decode_into(&mut loaded, item, path);
    }
    Ok(loaded)
}

fn load_jsonl_file(path: &Path) -> Result<LoadedAds> {
    let file = std::fs::File::open(path).map_err(|source| StatsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = std::io::BufReader::new(file);

    let mut loaded = LoadedAds::default();
    for (line_no, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("Skipping unreadable line {} of {}: {}", line_no + 1, path.display(), e);
                loaded.undecodable += 1;
                continue;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => decode_into(&mut loaded, value, path),
            Err(e) => {
                warn!(
                    "Skipping unparseable line {} of {}: {}",
                    line_no + 1,
                    path.display(),
                    e
                );
                loaded.undecodable += 1;
            }
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const AD: &str = r#"{"id": "1", "page_id": "10", "ad_delivery_start_time": "2021-03-01", "currency": "EUR", "spend": {"lower_bound": "0"}, "impressions": {"lower_bound": "0"}}"#;

    #[test]
    fn test_find_record_files_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("2021").join("03");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join("b.json"), "[]").unwrap();
        fs::write(nested.join("a.jsonl"), "").unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let files = find_record_files(tmp.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("2021/03/a.jsonl"));
        assert!(files[1].ends_with("b.json"));
    }

    #[test]
    fn test_find_record_files_missing_path() {
        assert!(find_record_files(Path::new("/definitely/not/here")).is_empty());
    }

    #[test]
    fn test_load_json_array_and_api_page() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.json"), format!("[{AD}, {AD}]")).unwrap();
        fs::write(
            tmp.path().join("b.json"),
            format!(r#"{{"data": [{AD}], "paging": {{}}}}"#),
        )
        .unwrap();

        let loaded = load_raw_ads(tmp.path()).unwrap();
        assert_eq!(loaded.ads.len(), 3);
        assert_eq!(loaded.ads[0].page_id, "10");
        assert_eq!(loaded.undecodable, 0);
    }

    #[test]
    fn test_load_jsonl_skips_bad_lines() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("ads.jsonl");
        fs::write(&file, format!("{AD}\n\nnot json\n{{\"no_id\": true}}\n{AD}\n")).unwrap();

        let loaded = load_raw_ads(&file).unwrap();
        assert_eq!(loaded.ads.len(), 2);
        assert_eq!(loaded.undecodable, 2);
    }

    #[test]
    fn test_undecodable_entries_are_counted() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("a.json"),
            format!(r#"[{AD}, {{"page_id": "10"}}, {{"id": "2", "demographic_distribution": [{{"gender": "male"}}]}}]"#),
        )
        .unwrap();
        fs::write(tmp.path().join("b.json"), "{not json").unwrap();
        fs::write(tmp.path().join("c.json"), "42").unwrap();

        let loaded = load_raw_ads(tmp.path()).unwrap();
        assert_eq!(loaded.ads.len(), 1);
        assert_eq!(loaded.undecodable, 4);
    }

    #[test]
    fn test_null_share_label_still_loads() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("ads.jsonl");
        fs::write(
            &file,
            r#"{"id": "3", "demographic_distribution": [{"percentage": "1", "gender": null, "age": "65+"}]}"#,
        )
        .unwrap();

        let loaded = load_raw_ads(&file).unwrap();
        assert_eq!(loaded.ads.len(), 1);
        assert_eq!(loaded.undecodable, 0);
        assert_eq!(loaded.ads[0].demographic_distribution[0].gender, None);
    }

    #[test]
    fn test_load_raw_ads_errors() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            load_raw_ads(tmp.path()),
            Err(StatsError::NoDataFiles(_))
        ));
        assert!(matches!(
            load_raw_ads(&tmp.path().join("missing")),
            Err(StatsError::DataPathNotFound(_))
        ));
    }

    #[test]
    fn test_load_page_map() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("pages.json");
        fs::write(&file, r#"{"10": "VVD", "11": "D66", "12": 5}"#).unwrap();

        let pages = load_page_map(&file).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages["10"], "VVD");
    }

    #[test]
    fn test_load_page_map_rejects_non_object() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("pages.json");
        fs::write(&file, "[1, 2]").unwrap();
        assert!(matches!(load_page_map(&file), Err(StatsError::Config(_))));
        assert!(matches!(
            load_page_map(&tmp.path().join("nope.json")),
            Err(StatsError::FileRead { .. })
        ));
    }
}
