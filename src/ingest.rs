// src/ingest.rs

use crate::identity::IdentityResolver;
use crate::model::*;
use crate::period::parse_timestamp;
use crate::profile;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Notification-only event kinds, dropped before classification regardless
/// of category.
const EXCLUDED_EVENTS: [&str; 5] = [
    "subscribed",
    "mentioned",
    "referenced",
    "locked",
    "unlocked",
];

/// Automation accounts excluded from every statistic. Matched on the
/// canonical handle, i.e. after identity resolution.
const BOT_HANDLES: [&str; 4] = [
    "DrahtBot",
    "github-actions[bot]",
    "dependabot[bot]",
    "codecov[bot]",
];

fn is_bot(handle: &str) -> bool {
    BOT_HANDLES.contains(&handle)
}

fn categorize(kind: &str) -> ActivityCategory {
    match kind {
        "committed" => ActivityCategory::Commits,
        "commented" => ActivityCategory::Comments,
        "reviewed" => ActivityCategory::Reviews,
        "head_ref_force_pushed" => ActivityCategory::Pushes,
        "merged" => ActivityCategory::Merged,
        "closed" => ActivityCategory::Closed,
        "reopened" => ActivityCategory::Reopened,
        _ => ActivityCategory::Other,
    }
}

/// Extract (handle, timestamp) from one raw event. Commit events are the
/// special case: the actor sits under `author` and the timestamp under
/// `committer.date`. Everything else reads `user` (falling back to `actor`)
/// and `created_at`, with `submitted_at` as the review-specific fallback.
fn event_handle_and_date<'a>(ev: &'a RawEvent, kind: &str) -> (Option<&'a str>, Option<&'a str>) {
    if kind == "committed" {
        let handle = ev
            .author
            .as_ref()
            .and_then(|a| a.login.as_deref().or(a.name.as_deref()));
        let date = ev.committer.as_ref().and_then(|c| c.date.as_deref());
        return (handle, date);
    }
    let handle = ev
        .user
        .as_ref()
        .and_then(|u| u.login.as_deref())
        .or_else(|| ev.actor.as_ref().and_then(|a| a.login.as_deref()));
    let mut date = ev.created_at.as_deref();
    if date.is_none() && kind == "reviewed" {
        date = ev.submitted_at.as_deref();
    }
    (handle, date)
}

/// Classify a record's timeline events plus its standalone review-thread
/// comments. Noise kinds, bot handles, and entries missing a user or a
/// parseable timestamp are silently dropped.
fn classify_events(
    events: &[RawEvent],
    comments: &[RawComment],
    resolver: &IdentityResolver,
) -> Vec<ClassifiedEvent> {
    let mut out = Vec::new();

    for ev in events {
        let Some(kind) = ev.event.as_deref() else {
            continue;
        };
        if EXCLUDED_EVENTS.contains(&kind) {
            continue;
        }
        let (handle, date) = event_handle_and_date(ev, kind);
        let (Some(handle), Some(date)) = (handle, date) else {
            continue;
        };
        let Some(date) = parse_timestamp(date) else {
            continue;
        };
        let handle = resolver.resolve(handle);
        if is_bot(&handle) {
            continue;
        }
        out.push(ClassifiedEvent {
            handle,
            date,
            category: categorize(kind),
        });
    }

    for c in comments {
        let Some(handle) = c.user.as_ref().and_then(|u| u.login.as_deref()) else {
            continue;
        };
        let Some(date) = c.created_at.as_deref().and_then(parse_timestamp) else {
            continue;
        };
        let handle = resolver.resolve(handle);
        if is_bot(&handle) {
            continue;
        }
        out.push(ClassifiedEvent {
            handle,
            date,
            category: ActivityCategory::ReviewComments,
        });
    }

    out
}

fn is_comment_kind(category: ActivityCategory) -> bool {
    matches!(
        category,
        ActivityCategory::Comments | ActivityCategory::Reviews | ActivityCategory::ReviewComments
    )
}

fn ingest_pull(data: PullFile, resolver: &IdentityResolver, corpus: &mut Corpus) -> Result<()> {
    let events = classify_events(&data.events, &data.comments, resolver);
    for ev in events.iter().filter(|e| is_comment_kind(e.category)) {
        corpus.comments.push(CommentEvent {
            date: ev.date,
            handle: ev.handle.clone(),
        });
    }

    let login = data
        .pull
        .user
        .login
        .as_deref()
        .with_context(|| format!("PR #{} has no author login", data.pull.number))?;
    let author = resolver.resolve(login);
    // Author-keyed statistics drop when the author is a bot; label counts
    // and human merge actions on the bot's PR still count.
    let author_is_bot = is_bot(&author);
    // A creation timestamp with no date component drops the record from all
    // three timeframes at once.
    let Some(created_at) = parse_timestamp(&data.pull.created_at) else {
        return Ok(());
    };

    if !author_is_bot {
        corpus.opened_prs.push(OpenedPr {
            created_at,
            author: author.clone(),
        });
    }
    for label in &data.pull.labels {
        corpus.pr_labels.push(LabelUse {
            created_at,
            label: label.name.clone(),
        });
    }

    for ev in events.iter().filter(|e| e.handle != author) {
        if is_comment_kind(ev.category) {
            corpus.aged_review_events.push(AgedReviewEvent {
                date: ev.date,
                age_days: (ev.date - created_at).num_days(),
            });
        }
        if ev.category == ActivityCategory::Reviews && !author_is_bot {
            corpus.received_reviews.push(ReceivedReview {
                date: ev.date,
                pr_author: author.clone(),
            });
        }
    }

    // Terminal outcome: one scan, first merged and first closed remembered
    // independently, merged wins when both exist.
    let mut merge_event: Option<&RawEvent> = None;
    let mut close_event: Option<&RawEvent> = None;
    for ev in &data.events {
        match ev.event.as_deref() {
            Some("merged") if merge_event.is_none() => merge_event = Some(ev),
            Some("closed") if close_event.is_none() => close_event = Some(ev),
            _ => {}
        }
    }

    if let Some(ev) = merge_event {
        if let Some(merged_at) = ev.created_at.as_deref().and_then(parse_timestamp) {
            if !author_is_bot {
                corpus.merged_prs.push(MergedPr {
                    merged_at,
                    created_at,
                    author: author.clone(),
                    additions: data.pull.additions.unwrap_or(0),
                    deletions: data.pull.deletions.unwrap_or(0),
                    commits: data.pull.commits.unwrap_or(0),
                });
            }
            if let Some(login) = ev.actor.as_ref().and_then(|a| a.login.as_deref()) {
                let actor = resolver.resolve(login);
                if !is_bot(&actor) {
                    corpus.merge_actions.push(MergeAction {
                        date: merged_at,
                        actor,
                    });
                }
            }
        }
    } else if let Some(ev) = close_event {
        if let Some(closed_at) = ev.created_at.as_deref().and_then(parse_timestamp) {
            if !author_is_bot {
                corpus.closed_prs.push(ClosedPr {
                    closed_at,
                    author: author.clone(),
                });
            }
        }
    }

    if !author_is_bot {
        corpus
            .profiles
            .insert(data.pull.number, profile::build_profile(&author, created_at, &events));
    }

    Ok(())
}

fn ingest_issue(data: IssueFile, resolver: &IdentityResolver, corpus: &mut Corpus) {
    let events = classify_events(&data.events, &[], resolver);
    for ev in events.iter().filter(|e| is_comment_kind(e.category)) {
        corpus.comments.push(CommentEvent {
            date: ev.date,
            handle: ev.handle.clone(),
        });
    }

    let Some(issue) = data.issue else {
        return;
    };
    let Some(created_at) = issue.created_at.as_deref().and_then(parse_timestamp) else {
        return;
    };
    for label in &issue.labels {
        corpus.issue_labels.push(LabelUse {
            created_at,
            label: label.name.clone(),
        });
    }
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

fn read_record<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("corrupt record {}", path.display()))
}

/// Read the whole backup into one immutable corpus. An unreadable or
/// unparseable record file aborts the run; a missing issues directory only
/// drops the issue-derived statistics.
pub fn read_backup(backup_dir: &Path, resolver: &IdentityResolver) -> Result<Corpus> {
    let mut corpus = Corpus::default();

    let pulls_dir = backup_dir.join("pulls");
    let pull_files = json_files(&pulls_dir)
        .with_context(|| format!("no pulls directory under {}", backup_dir.display()))?;
    log::info!("Reading {} PR records", pull_files.len());

    let bar = ProgressBar::new(pull_files.len() as u64);
    bar.set_message("Reading PRs");
    for path in &pull_files {
        let data: PullFile = read_record(path)?;
        ingest_pull(data, resolver, &mut corpus)?;
        bar.inc(1);
    }
    bar.finish_with_message("PRs ingested");

    let issues_dir = backup_dir.join("issues");
    match json_files(&issues_dir) {
        Err(_) => {
            log::warn!(
                "no issues directory at {}, continuing with PR data only",
                issues_dir.display()
            );
        }
        Ok(issue_files) => {
            log::info!("Reading {} issue records", issue_files.len());
            let bar = ProgressBar::new(issue_files.len() as u64);
            bar.set_message("Reading issues");
            for path in &issue_files {
                let data: IssueFile = read_record(path)?;
                ingest_issue(data, resolver, &mut corpus);
                bar.inc(1);
            }
            bar.finish_with_message("Issues ingested");
        }
    }

    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn pull_file(value: serde_json::Value) -> PullFile {
        serde_json::from_value(value).unwrap()
    }

    fn sample_pull() -> serde_json::Value {
        json!({
            "pull": {
                "number": 7,
                "user": {"login": "alice"},
                "created_at": "2021-01-01T00:00:00Z",
                "additions": 10,
                "deletions": 20,
                "commits": 2,
                "labels": [{"name": "bug"}, {"name": "refactor"}]
            },
            "events": [
                {"event": "subscribed", "user": {"login": "noisy"}, "created_at": "2021-01-01T01:00:00Z"},
                {"event": "commented", "user": {"login": "bob"}, "created_at": "2021-01-02T00:00:00Z"},
                {"event": "reviewed", "user": {"login": "carol"}, "submitted_at": "2021-01-02T12:00:00Z"},
                {"event": "commented", "user": {"login": "DrahtBot"}, "created_at": "2021-01-02T13:00:00Z"},
                {"event": "committed",
                 "author": {"name": "alice"},
                 "committer": {"name": "alice", "date": "2021-01-03T00:00:00Z"}},
                {"event": "closed", "actor": {"login": "dan"}, "created_at": "2021-01-04T00:00:00Z"},
                {"event": "merged", "actor": {"login": "dan"}, "created_at": "2021-01-05T00:00:00Z"}
            ],
            "comments": [
                {"user": {"login": "erin"}, "created_at": "2021-01-02T06:00:00Z"},
                {"user": null, "created_at": "2021-01-02T07:00:00Z"},
                {"user": {"login": "frank"}, "created_at": "bad"}
            ]
        })
    }

    #[test]
    fn test_classification_filters_noise_bots_and_malformed() {
        let data = pull_file(sample_pull());
        let events = classify_events(&data.events, &data.comments, &IdentityResolver::empty());
        // subscribed event, bot comment, userless comment and short-date
        // comment are all gone; 5 timeline events + 1 review comment remain.
        assert_eq!(events.len(), 6);
        assert!(events.iter().all(|e| e.handle != "DrahtBot"));
        assert!(events
            .iter()
            .any(|e| e.category == ActivityCategory::ReviewComments && e.handle == "erin"));
    }

    #[test]
    fn test_commit_event_reads_nested_fields() {
        let data = pull_file(sample_pull());
        let events = classify_events(&data.events, &[], &IdentityResolver::empty());
        let commit = events
            .iter()
            .find(|e| e.category == ActivityCategory::Commits)
            .unwrap();
        assert_eq!(commit.handle, "alice");
        assert_eq!(commit.date, parse_timestamp("2021-01-03T00:00:00Z").unwrap());
    }

    #[test]
    fn test_reviewed_event_falls_back_to_submitted_at() {
        let data = pull_file(sample_pull());
        let events = classify_events(&data.events, &[], &IdentityResolver::empty());
        let review = events
            .iter()
            .find(|e| e.category == ActivityCategory::Reviews)
            .unwrap();
        assert_eq!(review.handle, "carol");
        assert_eq!(review.date, parse_timestamp("2021-01-02T12:00:00Z").unwrap());
    }

    #[test]
    fn test_merged_takes_precedence_over_earlier_closed() {
        let mut corpus = Corpus::default();
        ingest_pull(pull_file(sample_pull()), &IdentityResolver::empty(), &mut corpus).unwrap();
        assert_eq!(corpus.merged_prs.len(), 1);
        assert!(corpus.closed_prs.is_empty());
        assert_eq!(corpus.merge_actions.len(), 1);
        assert_eq!(corpus.merge_actions[0].actor, "dan");
        assert_eq!(
            corpus.merged_prs[0].merged_at,
            parse_timestamp("2021-01-05T00:00:00Z").unwrap()
        );
    }

    #[test]
    fn test_closed_only_pull() {
        let mut corpus = Corpus::default();
        let data = pull_file(json!({
            "pull": {"number": 9, "user": {"login": "alice"}, "created_at": "2021-01-05T00:00:00Z"},
            "events": [
                {"event": "closed", "actor": {"login": "bob"}, "created_at": "2021-01-06T00:00:00Z"},
                {"event": "reopened", "actor": {"login": "alice"}, "created_at": "2021-01-07T00:00:00Z"},
                {"event": "closed", "actor": {"login": "bob"}, "created_at": "2021-01-08T00:00:00Z"}
            ]
        }));
        ingest_pull(data, &IdentityResolver::empty(), &mut corpus).unwrap();
        assert!(corpus.merged_prs.is_empty());
        // Only the first close of a close/reopen/close cycle counts.
        assert_eq!(corpus.closed_prs.len(), 1);
        assert_eq!(
            corpus.closed_prs[0].closed_at,
            parse_timestamp("2021-01-06T00:00:00Z").unwrap()
        );
    }

    #[test]
    fn test_labels_and_profile_and_aged_events() {
        let mut corpus = Corpus::default();
        ingest_pull(pull_file(sample_pull()), &IdentityResolver::empty(), &mut corpus).unwrap();
        assert_eq!(corpus.pr_labels.len(), 2);
        assert!(corpus.profiles.contains_key(&7));
        // bob + carol + erin comment-kind events from non-authors.
        assert_eq!(corpus.aged_review_events.len(), 3);
        assert_eq!(corpus.received_reviews.len(), 1);
        assert_eq!(corpus.received_reviews[0].pr_author, "alice");
    }

    #[test]
    fn test_read_backup_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let pulls = dir.path().join("pulls");
        fs::create_dir(&pulls).unwrap();
        let mut f = File::create(pulls.join("7.json")).unwrap();
        write!(f, "{}", sample_pull()).unwrap();

        // No issues directory: tolerated.
        let corpus = read_backup(dir.path(), &IdentityResolver::empty()).unwrap();
        assert_eq!(corpus.opened_prs.len(), 1);
        assert_eq!(corpus.merged_prs.len(), 1);
        assert!(corpus.issue_labels.is_empty());
    }

    #[test]
    fn test_corrupt_record_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pulls = dir.path().join("pulls");
        fs::create_dir(&pulls).unwrap();
        let mut f = File::create(pulls.join("bad.json")).unwrap();
        write!(f, "{{not json").unwrap();

        assert!(read_backup(dir.path(), &IdentityResolver::empty()).is_err());
    }

    #[test]
    fn test_bot_authored_pull_keeps_only_identity_free_stats() {
        let mut corpus = Corpus::default();
        let data = pull_file(json!({
            "pull": {
                "number": 11,
                "user": {"login": "dependabot[bot]"},
                "created_at": "2021-01-01T00:00:00Z",
                "labels": [{"name": "dependencies"}]
            },
            "events": [
                {"event": "merged", "actor": {"login": "bob"}, "created_at": "2021-01-02T00:00:00Z"}
            ]
        }));
        ingest_pull(data, &IdentityResolver::empty(), &mut corpus).unwrap();
        assert!(corpus.opened_prs.is_empty());
        assert!(corpus.merged_prs.is_empty());
        assert!(corpus.profiles.is_empty());
        // The human merge action and the label occurrence survive.
        assert_eq!(corpus.merge_actions.len(), 1);
        assert_eq!(corpus.merge_actions[0].actor, "bob");
        assert_eq!(corpus.pr_labels.len(), 1);
    }

    #[test]
    fn test_rename_rewrites_all_attributions() {
        let dir = tempfile::tempdir().unwrap();
        let map_path = dir.path().join("map.json");
        fs::write(&map_path, r#"{"bob": "robert", "dan": "daniel"}"#).unwrap();
        let resolver = IdentityResolver::from_file(&map_path).unwrap();

        let mut corpus = Corpus::default();
        ingest_pull(pull_file(sample_pull()), &resolver, &mut corpus).unwrap();

        assert!(corpus.comments.iter().any(|c| c.handle == "robert"));
        assert!(corpus.comments.iter().all(|c| c.handle != "bob"));
        assert_eq!(corpus.merge_actions[0].actor, "daniel");
        // robert, carol, erin, and daniel all touched the PR.
        assert_eq!(corpus.profiles[&7].participants_count, 4);
    }

    #[test]
    fn test_issue_contributes_comments_and_labels_only() {
        let mut corpus = Corpus::default();
        let data: IssueFile = serde_json::from_value(json!({
            "issue": {
                "created_at": "2021-03-01T00:00:00Z",
                "labels": [{"name": "question"}]
            },
            "events": [
                {"event": "commented", "user": {"login": "bob"}, "created_at": "2021-03-02T00:00:00Z"}
            ]
        }))
        .unwrap();
        ingest_issue(data, &IdentityResolver::empty(), &mut corpus);
        assert_eq!(corpus.comments.len(), 1);
        assert_eq!(corpus.issue_labels.len(), 1);
        assert!(corpus.opened_prs.is_empty());
    }
}
