// src/aggregate.rs

use crate::model::*;
use crate::period::{period_keys, Timeframe};
use crate::report::{ContributorPeriodStats, TimeframeBundle};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A commenter is "prolific" in a period when their comment count strictly
/// exceeds this.
pub const COMMENT_THRESHOLD: u64 = 100;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Phase 1: facts computed once over the whole corpus, then projected into
/// every timeframe's periods. Must be complete before any per-period fold
/// that depends on them runs.
#[derive(Debug)]
pub struct GlobalFacts {
    /// Author -> date of their first merged PR anywhere in the corpus.
    pub first_merge: HashMap<String, DateTime<Utc>>,
    /// Every handle that has ever performed a merge action.
    pub maintainers: HashSet<String>,
    /// Top 5 authors by total merged-PR count, ties broken by handle.
    pub top5_authors: HashSet<String>,
}

impl GlobalFacts {
    pub fn compute(corpus: &Corpus) -> Self {
        let mut first_merge: HashMap<String, DateTime<Utc>> = HashMap::new();
        let mut totals: HashMap<&str, u64> = HashMap::new();
        for pr in &corpus.merged_prs {
            let first = first_merge
                .entry(pr.author.clone())
                .or_insert(pr.merged_at);
            if pr.merged_at < *first {
                *first = pr.merged_at;
            }
            *totals.entry(pr.author.as_str()).or_insert(0) += 1;
        }

        let maintainers = corpus
            .merge_actions
            .iter()
            .map(|m| m.actor.clone())
            .collect();

        let mut ranked: Vec<(&str, u64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let top5_authors = ranked
            .into_iter()
            .take(5)
            .map(|(author, _)| author.to_string())
            .collect();

        Self {
            first_merge,
            maintainers,
            top5_authors,
        }
    }
}

/// Run Phase 2 for all three timeframes. The folds only read the shared
/// immutable corpus and global facts, so they run in parallel.
pub fn aggregate_all(corpus: &Corpus, facts: &GlobalFacts) -> Vec<(Timeframe, TimeframeBundle)> {
    Timeframe::ALL
        .par_iter()
        .map(|&tf| (tf, aggregate_timeframe(corpus, facts, tf)))
        .collect()
}

fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / SECONDS_PER_DAY
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        round1(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Middle element of the sorted list by integer-divide index; even-length
/// lists take the lower middle, never an interpolation.
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    round1(sorted[(sorted.len() - 1) / 2])
}

/// Mean over the entries whose author is NOT in the exclusion set. Shared by
/// the top-5 and maintainer variants; an emptied-out list averages to 0.
fn mean_excluding(values: &[(f64, &str)], excluded: &HashSet<String>) -> f64 {
    let kept: Vec<f64> = values
        .iter()
        .filter(|(_, author)| !excluded.contains(*author))
        .map(|(value, _)| *value)
        .collect();
    mean(&kept)
}

/// Frequency map ordered by descending count, ties by name, preserving that
/// order in the serialized output.
fn count_ordered(counts: &HashMap<String, u64>) -> IndexMap<String, u64> {
    let mut entries: Vec<(&String, &u64)> = counts.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    entries.into_iter().map(|(k, v)| (k.clone(), *v)).collect()
}

/// Per-author per-period accumulation for contributor_stats.
#[derive(Debug, Default)]
struct ContribAcc {
    ttm: Vec<f64>,
    additions: Vec<f64>,
    deletions: Vec<f64>,
    commits: Vec<f64>,
    closed: u64,
    comments: u64,
    reviews_received: u64,
}

impl ContribAcc {
    fn stats(&self) -> ContributorPeriodStats {
        ContributorPeriodStats {
            count: self.ttm.len() as u64,
            avg_ttm: mean(&self.ttm),
            avg_additions: mean(&self.additions),
            avg_deletions: mean(&self.deletions),
            avg_commits: mean(&self.commits),
            closed: self.closed,
            comments: self.comments,
            reviews_received: self.reviews_received,
        }
    }
}

/// Phase 2 for one timeframe: fold every corpus list by that timeframe's
/// period key, then materialize all statistics over the union of periods
/// seen anywhere, with 0/empty defaults for the gaps.
pub fn aggregate_timeframe(
    corpus: &Corpus,
    facts: &GlobalFacts,
    tf: Timeframe,
) -> TimeframeBundle {
    let key_of = |dt: &DateTime<Utc>| period_keys(dt).get(tf).to_string();

    let mut universe: BTreeSet<String> = BTreeSet::new();

    // Merged-PR metrics, bucketed by merge date.
    let mut merged_authors: HashMap<String, BTreeSet<&str>> = HashMap::new();
    let mut prs_by_author: HashMap<String, HashMap<String, u64>> = HashMap::new();
    let mut ttm: HashMap<String, Vec<f64>> = HashMap::new();
    let mut ttm_with_author: HashMap<String, Vec<(f64, &str)>> = HashMap::new();
    let mut ttm_by_size: HashMap<(SizeBucket, String), Vec<f64>> = HashMap::new();
    let mut contributors: HashMap<&str, BTreeMap<String, ContribAcc>> = HashMap::new();
    for pr in &corpus.merged_prs {
        let period = key_of(&pr.merged_at);
        universe.insert(period.clone());

        let days = days_between(pr.created_at, pr.merged_at);
        merged_authors
            .entry(period.clone())
            .or_default()
            .insert(&pr.author);
        *prs_by_author
            .entry(period.clone())
            .or_default()
            .entry(pr.author.clone())
            .or_insert(0) += 1;
        ttm.entry(period.clone()).or_default().push(days);
        ttm_with_author
            .entry(period.clone())
            .or_default()
            .push((days, pr.author.as_str()));
        ttm_by_size
            .entry((SizeBucket::classify(pr.additions + pr.deletions), period.clone()))
            .or_default()
            .push(days);

        let acc = contributors
            .entry(pr.author.as_str())
            .or_default()
            .entry(period)
            .or_default();
        acc.ttm.push(days);
        acc.additions.push(pr.additions as f64);
        acc.deletions.push(pr.deletions as f64);
        acc.commits.push(pr.commits as f64);
    }

    // All-PR metrics, bucketed by creation date.
    let mut all_authors: HashMap<String, BTreeSet<&str>> = HashMap::new();
    for pr in &corpus.opened_prs {
        let period = key_of(&pr.created_at);
        universe.insert(period.clone());
        all_authors.entry(period).or_default().insert(&pr.author);
    }

    // Closed-without-merge, bucketed by close date.
    for pr in &corpus.closed_prs {
        let period = key_of(&pr.closed_at);
        universe.insert(period.clone());
        contributors
            .entry(pr.author.as_str())
            .or_default()
            .entry(period)
            .or_default()
            .closed += 1;
    }

    // Merge actions, bucketed by merge date.
    let mut merge_access: HashMap<String, BTreeSet<&str>> = HashMap::new();
    let mut merges_by_actor: HashMap<String, HashMap<String, u64>> = HashMap::new();
    for action in &corpus.merge_actions {
        let period = key_of(&action.date);
        universe.insert(period.clone());
        merge_access
            .entry(period.clone())
            .or_default()
            .insert(&action.actor);
        *merges_by_actor
            .entry(period)
            .or_default()
            .entry(action.actor.clone())
            .or_insert(0) += 1;
    }

    // Comments and reviews, bucketed by event date.
    let mut comment_counts: HashMap<String, HashMap<String, u64>> = HashMap::new();
    for comment in &corpus.comments {
        let period = key_of(&comment.date);
        universe.insert(period.clone());
        let count = comment_counts
            .entry(period.clone())
            .or_default()
            .entry(comment.handle.clone())
            .or_insert(0);
        *count += 1;
        contributors
            .entry(comment.handle.as_str())
            .or_default()
            .entry(period)
            .or_default()
            .comments += 1;
    }
    for review in &corpus.received_reviews {
        let period = key_of(&review.date);
        universe.insert(period.clone());
        contributors
            .entry(review.pr_author.as_str())
            .or_default()
            .entry(period)
            .or_default()
            .reviews_received += 1;
    }
    let mut age_counts: HashMap<(AgeBucket, String), u64> = HashMap::new();
    for event in &corpus.aged_review_events {
        let period = key_of(&event.date);
        universe.insert(period.clone());
        *age_counts
            .entry((AgeBucket::classify(event.age_days), period))
            .or_insert(0) += 1;
    }

    // Labels, bucketed by PR/issue creation date.
    let mut pr_label_counts: HashMap<String, HashMap<String, u64>> = HashMap::new();
    let mut issue_label_counts: HashMap<String, HashMap<String, u64>> = HashMap::new();
    for (uses, counts) in [
        (&corpus.pr_labels, &mut pr_label_counts),
        (&corpus.issue_labels, &mut issue_label_counts),
    ] {
        for label_use in uses.iter() {
            let period = key_of(&label_use.created_at);
            universe.insert(period.clone());
            *counts
                .entry(period)
                .or_default()
                .entry(label_use.label.clone())
                .or_insert(0) += 1;
        }
    }

    // Projection of the global first-merge fact onto this timeframe.
    let mut first_time_authors: HashMap<String, BTreeSet<&str>> = HashMap::new();
    for (author, first_date) in &facts.first_merge {
        let period = key_of(first_date);
        universe.insert(period.clone());
        first_time_authors
            .entry(period)
            .or_default()
            .insert(author);
    }

    // Materialize every statistic over the full period universe.
    let periods: Vec<String> = universe.into_iter().collect();
    let mut bundle = TimeframeBundle::empty(periods.clone());

    let names = |set: Option<&BTreeSet<&str>>| -> Vec<String> {
        set.map_or_else(Vec::new, |s| s.iter().map(|n| n.to_string()).collect())
    };

    for p in &periods {
        let merged_set = merged_authors.get(p);
        let all_set = all_authors.get(p);
        let no_merge: Vec<String> = match (all_set, merged_set) {
            (Some(all), Some(merged)) => all.difference(merged).map(|n| n.to_string()).collect(),
            (Some(all), None) => names(Some(all)),
            (None, _) => Vec::new(),
        };
        let access_set = merge_access.get(p);
        let first_set = first_time_authors.get(p);
        let prolific: HashMap<String, u64> = comment_counts
            .get(p)
            .map(|counts| {
                counts
                    .iter()
                    .filter(|(_, &c)| c > COMMENT_THRESHOLD)
                    .map(|(u, &c)| (u.clone(), c))
                    .collect()
            })
            .unwrap_or_default();
        let ttm_values = ttm.get(p).map(Vec::as_slice).unwrap_or(&[]);
        let ttm_authors = ttm_with_author.get(p).map(Vec::as_slice).unwrap_or(&[]);

        bundle
            .unique_author_counts
            .insert(p.clone(), merged_set.map_or(0, |s| s.len()));
        bundle
            .no_merge_author_counts
            .insert(p.clone(), no_merge.len());
        bundle
            .first_time_author_counts
            .insert(p.clone(), first_set.map_or(0, |s| s.len()));
        bundle
            .prolific_commenter_counts
            .insert(p.clone(), prolific.len());
        bundle
            .merge_access_counts
            .insert(p.clone(), access_set.map_or(0, |s| s.len()));
        bundle
            .merge_access_users
            .insert(p.clone(), names(access_set));
        bundle.unique_authors.insert(p.clone(), names(merged_set));
        bundle.no_merge_authors.insert(p.clone(), no_merge);
        bundle
            .first_time_authors
            .insert(p.clone(), names(first_set));
        bundle
            .prolific_commenter_details
            .insert(p.clone(), count_ordered(&prolific));
        bundle.merges_by_actor.insert(
            p.clone(),
            merges_by_actor.get(p).map(|c| count_ordered(c)).unwrap_or_default(),
        );
        bundle.avg_time_to_merge.insert(p.clone(), mean(ttm_values));
        bundle
            .median_time_to_merge
            .insert(p.clone(), median(ttm_values));
        bundle.prs_by_author.insert(
            p.clone(),
            prs_by_author.get(p).map(|c| count_ordered(c)).unwrap_or_default(),
        );
        bundle.avg_time_to_merge_excl_top5.insert(
            p.clone(),
            mean_excluding(ttm_authors, &facts.top5_authors),
        );
        bundle.avg_time_to_merge_excl_maintainers.insert(
            p.clone(),
            mean_excluding(ttm_authors, &facts.maintainers),
        );
        bundle.label_counts_pr.insert(
            p.clone(),
            pr_label_counts.get(p).map(|c| count_ordered(c)).unwrap_or_default(),
        );
        bundle.label_counts_issue.insert(
            p.clone(),
            issue_label_counts.get(p).map(|c| count_ordered(c)).unwrap_or_default(),
        );
    }

    for bucket in SizeBucket::ALL {
        let per_period = bundle.ttm_by_size.entry(bucket.label()).or_default();
        for p in &periods {
            let values = ttm_by_size
                .get(&(bucket, p.clone()))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            per_period.insert(p.clone(), mean(values));
        }
    }

    for bucket in AgeBucket::ALL {
        let per_period = bundle.review_by_pr_age.entry(bucket.label()).or_default();
        for p in &periods {
            let count = age_counts.get(&(bucket, p.clone())).copied().unwrap_or(0);
            per_period.insert(p.clone(), count);
        }
    }

    // Authors ordered by descending total merged count, ties by handle.
    let mut ranked: Vec<(&&str, &BTreeMap<String, ContribAcc>)> = contributors.iter().collect();
    ranked.sort_by(|a, b| {
        let merged_a: usize = a.1.values().map(|acc| acc.ttm.len()).sum();
        let merged_b: usize = b.1.values().map(|acc| acc.ttm.len()).sum();
        merged_b.cmp(&merged_a).then_with(|| a.0.cmp(b.0))
    });
    for (author, by_period) in ranked {
        let stats: BTreeMap<String, ContributorPeriodStats> = by_period
            .iter()
            .map(|(p, acc)| (p.clone(), acc.stats()))
            .collect();
        bundle.contributor_stats.insert(author.to_string(), stats);
    }

    bundle
}
