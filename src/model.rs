// src/model.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One PR backup file: the pull itself, its event timeline, and the
/// standalone review-thread comments (a separate list, not timeline events).
#[derive(Debug, Deserialize)]
pub struct PullFile {
    pub pull: Pull,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
pub struct Pull {
    pub number: u64,
    pub user: Actor,
    pub created_at: String,
    #[serde(default)]
    pub additions: Option<i64>,
    #[serde(default)]
    pub deletions: Option<i64>,
    #[serde(default)]
    pub commits: Option<i64>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// One issue backup file. Issues contribute comment and label counts only,
/// never PR or merge statistics.
#[derive(Debug, Deserialize)]
pub struct IssueFile {
    #[serde(default)]
    pub issue: Option<Issue>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// One timeline event. Most kinds carry their actor in `user` (or `actor`)
/// and their timestamp in `created_at`; review events may only have
/// `submitted_at`, and commit events use the nested `author` / `committer`
/// objects instead.
#[derive(Debug, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub user: Option<Actor>,
    #[serde(default)]
    pub actor: Option<Actor>,
    #[serde(default)]
    pub author: Option<CommitIdent>,
    #[serde(default)]
    pub committer: Option<CommitIdent>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawComment {
    #[serde(default)]
    pub user: Option<Actor>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Actor {
    #[serde(default)]
    pub login: Option<String>,
}

/// Identity attached to a `committed` event. Unlike every other event kind
/// the handle lives under `author` and the timestamp under `committer.date`.
#[derive(Debug, Deserialize)]
pub struct CommitIdent {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Category of a classified timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Commits,
    Comments,
    Reviews,
    Pushes,
    Merged,
    Closed,
    Reopened,
    ReviewComments,
    Other,
}

/// PR size by total changed lines (additions + deletions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeBucket {
    S,
    M,
    L,
}

impl SizeBucket {
    pub const ALL: [SizeBucket; 3] = [SizeBucket::S, SizeBucket::M, SizeBucket::L];

    pub fn classify(changed_lines: i64) -> Self {
        if changed_lines <= 50 {
            SizeBucket::S
        } else if changed_lines <= 500 {
            SizeBucket::M
        } else {
            SizeBucket::L
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SizeBucket::S => "S",
            SizeBucket::M => "M",
            SizeBucket::L => "L",
        }
    }
}

/// Age of a review/comment event relative to its PR's creation, in fixed
/// half-open day ranges. The first matching range wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeBucket {
    Under1Week,
    Weeks1To4,
    Months1To3,
    Months3To6,
    Months6To12,
    Years1To2,
    Over2Years,
}

impl AgeBucket {
    pub const ALL: [AgeBucket; 7] = [
        AgeBucket::Under1Week,
        AgeBucket::Weeks1To4,
        AgeBucket::Months1To3,
        AgeBucket::Months3To6,
        AgeBucket::Months6To12,
        AgeBucket::Years1To2,
        AgeBucket::Over2Years,
    ];

    pub fn classify(age_days: i64) -> Self {
        if age_days < 7 {
            AgeBucket::Under1Week
        } else if age_days < 30 {
            AgeBucket::Weeks1To4
        } else if age_days < 90 {
            AgeBucket::Months1To3
        } else if age_days < 180 {
            AgeBucket::Months3To6
        } else if age_days < 365 {
            AgeBucket::Months6To12
        } else if age_days < 730 {
            AgeBucket::Years1To2
        } else {
            AgeBucket::Over2Years
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgeBucket::Under1Week => "<1w",
            AgeBucket::Weeks1To4 => "1-4w",
            AgeBucket::Months1To3 => "1-3m",
            AgeBucket::Months3To6 => "3-6m",
            AgeBucket::Months6To12 => "6-12m",
            AgeBucket::Years1To2 => "1-2y",
            AgeBucket::Over2Years => "2y+",
        }
    }
}

/// A timeline event after classification: canonical handle, parsed
/// timestamp, category. Noise kinds, bot handles, and events with a missing
/// user or timestamp never make it this far.
#[derive(Debug, Clone)]
pub struct ClassifiedEvent {
    pub handle: String,
    pub date: DateTime<Utc>,
    pub category: ActivityCategory,
}

/// Engagement snapshot derived once per PR from its classified timeline.
#[derive(Debug, Clone, Serialize)]
pub struct PrProfile {
    pub participants_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_response_days: Option<f64>,
    pub comments_received: u64,
    pub author_self_updates: u64,
    pub longest_inactivity_gap_days: i64,
    pub daily_activity: BTreeMap<NaiveDate, BTreeMap<ActivityCategory, u64>>,
}

#[derive(Debug, Clone)]
pub struct MergedPr {
    pub merged_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub additions: i64,
    pub deletions: i64,
    pub commits: i64,
}

#[derive(Debug, Clone)]
pub struct OpenedPr {
    pub created_at: DateTime<Utc>,
    pub author: String,
}

#[derive(Debug, Clone)]
pub struct ClosedPr {
    pub closed_at: DateTime<Utc>,
    pub author: String,
}

/// One press of the merge button: who merged, and when.
#[derive(Debug, Clone)]
pub struct MergeAction {
    pub date: DateTime<Utc>,
    pub actor: String,
}

/// One comment or review made by `handle`, from a PR or an issue.
#[derive(Debug, Clone)]
pub struct CommentEvent {
    pub date: DateTime<Utc>,
    pub handle: String,
}

/// A review received by a PR author from someone else.
#[derive(Debug, Clone)]
pub struct ReceivedReview {
    pub date: DateTime<Utc>,
    pub pr_author: String,
}

/// A non-self review/comment event on a PR, with the PR's age at that point.
#[derive(Debug, Clone)]
pub struct AgedReviewEvent {
    pub date: DateTime<Utc>,
    pub age_days: i64,
}

/// One label occurrence, bucketed by the creation date of its PR or issue.
#[derive(Debug, Clone)]
pub struct LabelUse {
    pub created_at: DateTime<Utc>,
    pub label: String,
}

/// Round to one decimal, the precision every day-valued statistic is
/// reported at.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// The complete ingested corpus: every list the aggregator folds over, plus
/// the per-PR profiles. Immutable once ingestion finishes.
#[derive(Debug, Default)]
pub struct Corpus {
    pub merged_prs: Vec<MergedPr>,
    pub opened_prs: Vec<OpenedPr>,
    pub closed_prs: Vec<ClosedPr>,
    pub merge_actions: Vec<MergeAction>,
    pub comments: Vec<CommentEvent>,
    pub received_reviews: Vec<ReceivedReview>,
    pub aged_review_events: Vec<AgedReviewEvent>,
    pub pr_labels: Vec<LabelUse>,
    pub issue_labels: Vec<LabelUse>,
    pub profiles: BTreeMap<u64, PrProfile>,
}
