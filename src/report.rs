// src/report.rs

use crate::model::PrProfile;
use crate::period::Timeframe;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

/// Contributor activity within one period. Merge averages stay 0 when the
/// author had no merge that period.
#[derive(Debug, Default, Serialize)]
pub struct ContributorPeriodStats {
    pub count: u64,
    pub avg_ttm: f64,
    pub avg_additions: f64,
    pub avg_deletions: f64,
    pub avg_commits: f64,
    pub closed: u64,
    pub comments: u64,
    pub reviews_received: u64,
}

/// Every per-period statistic for one timeframe. Field names are the
/// serialized keys and are the contract with the visualization layer.
#[derive(Debug, Default, Serialize)]
pub struct TimeframeBundle {
    pub periods: Vec<String>,
    pub unique_author_counts: BTreeMap<String, usize>,
    pub no_merge_author_counts: BTreeMap<String, usize>,
    pub first_time_author_counts: BTreeMap<String, usize>,
    pub prolific_commenter_counts: BTreeMap<String, usize>,
    pub merge_access_counts: BTreeMap<String, usize>,
    pub merge_access_users: BTreeMap<String, Vec<String>>,
    pub unique_authors: BTreeMap<String, Vec<String>>,
    pub no_merge_authors: BTreeMap<String, Vec<String>>,
    pub first_time_authors: BTreeMap<String, Vec<String>>,
    pub prolific_commenter_details: BTreeMap<String, IndexMap<String, u64>>,
    pub merges_by_actor: BTreeMap<String, IndexMap<String, u64>>,
    pub avg_time_to_merge: BTreeMap<String, f64>,
    pub median_time_to_merge: BTreeMap<String, f64>,
    pub prs_by_author: BTreeMap<String, IndexMap<String, u64>>,
    pub avg_time_to_merge_excl_top5: BTreeMap<String, f64>,
    pub avg_time_to_merge_excl_maintainers: BTreeMap<String, f64>,
    pub ttm_by_size: IndexMap<&'static str, BTreeMap<String, f64>>,
    pub contributor_stats: IndexMap<String, BTreeMap<String, ContributorPeriodStats>>,
    pub review_by_pr_age: IndexMap<&'static str, BTreeMap<String, u64>>,
    pub label_counts_pr: BTreeMap<String, IndexMap<String, u64>>,
    pub label_counts_issue: BTreeMap<String, IndexMap<String, u64>>,
}

impl TimeframeBundle {
    pub fn empty(periods: Vec<String>) -> Self {
        Self {
            periods,
            ..Default::default()
        }
    }
}

/// The final document handed to the visualization layer.
#[derive(Debug, Serialize)]
pub struct Report {
    pub comment_threshold: u64,
    pub timeframes: IndexMap<&'static str, TimeframeBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_profiles: Option<BTreeMap<u64, PrProfile>>,
}

/// Merge the per-timeframe bundles into one report, in the canonical
/// year / quarter / month order. Purely structural.
pub fn assemble(
    comment_threshold: u64,
    mut bundles: Vec<(Timeframe, TimeframeBundle)>,
    pr_profiles: Option<BTreeMap<u64, PrProfile>>,
) -> Report {
    let mut timeframes = IndexMap::new();
    for tf in Timeframe::ALL {
        if let Some(pos) = bundles.iter().position(|(b_tf, _)| *b_tf == tf) {
            let (_, bundle) = bundles.swap_remove(pos);
            timeframes.insert(tf.name(), bundle);
        }
    }
    Report {
        comment_threshold,
        timeframes,
        pr_profiles,
    }
}

/// Write the report as JSON and return its size in bytes.
pub fn write(report: &Report, path: &Path) -> Result<u64> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), report)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    let size = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_orders_timeframes_canonically() {
        let bundles = vec![
            (Timeframe::Month, TimeframeBundle::empty(vec![])),
            (Timeframe::Year, TimeframeBundle::empty(vec![])),
            (Timeframe::Quarter, TimeframeBundle::empty(vec![])),
        ];
        let report = assemble(100, bundles, None);
        let keys: Vec<&&str> = report.timeframes.keys().collect();
        assert_eq!(keys, vec![&"year", &"quarter", &"month"]);
    }

    #[test]
    fn test_report_keys_are_stable() {
        let report = assemble(
            100,
            vec![(Timeframe::Year, TimeframeBundle::empty(vec!["2021".into()]))],
            None,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["comment_threshold"], 100);
        let year = &json["timeframes"]["year"];
        for key in [
            "periods",
            "unique_author_counts",
            "no_merge_author_counts",
            "first_time_author_counts",
            "prolific_commenter_counts",
            "merge_access_counts",
            "merge_access_users",
            "unique_authors",
            "no_merge_authors",
            "first_time_authors",
            "prolific_commenter_details",
            "merges_by_actor",
            "avg_time_to_merge",
            "median_time_to_merge",
            "prs_by_author",
            "avg_time_to_merge_excl_top5",
            "avg_time_to_merge_excl_maintainers",
            "ttm_by_size",
            "contributor_stats",
            "review_by_pr_age",
            "label_counts_pr",
            "label_counts_issue",
        ] {
            assert!(year.get(key).is_some(), "missing key {key}");
        }
        // Profiles are omitted, not serialized as null.
        assert!(json.get("pr_profiles").is_none());
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let report = assemble(100, vec![], None);
        let size = write(&report, &path).unwrap();
        assert!(size > 0);
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["comment_threshold"], 100);
    }
}
