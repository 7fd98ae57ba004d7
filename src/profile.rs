// src/profile.rs

use crate::model::{round1, ActivityCategory, ClassifiedEvent, PrProfile};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Build the engagement snapshot for one PR from its combined, already
/// classified event + review-comment timeline. Single pass over the events;
/// the histogram keys are calendar days.
pub fn build_profile(
    author: &str,
    created_at: DateTime<Utc>,
    events: &[ClassifiedEvent],
) -> PrProfile {
    let mut participants: HashSet<&str> = HashSet::new();
    let mut first_response: Option<DateTime<Utc>> = None;
    let mut comments_received = 0u64;
    let mut author_self_updates = 0u64;
    let mut daily_activity: BTreeMap<_, BTreeMap<ActivityCategory, u64>> = BTreeMap::new();

    let creation_day = created_at.date_naive();

    for ev in events {
        let day = ev.date.date_naive();
        *daily_activity
            .entry(day)
            .or_default()
            .entry(ev.category)
            .or_insert(0) += 1;

        if ev.handle == author {
            // Same-day commits are initial-commit noise; only activity on a
            // later calendar day counts as a self-update.
            let is_update = matches!(
                ev.category,
                ActivityCategory::Commits | ActivityCategory::Pushes
            );
            if is_update && day > creation_day {
                author_self_updates += 1;
            }
            continue;
        }

        participants.insert(&ev.handle);
        if ev.date > created_at && first_response.map_or(true, |cur| ev.date < cur) {
            first_response = Some(ev.date);
        }
        if matches!(
            ev.category,
            ActivityCategory::Comments
                | ActivityCategory::Reviews
                | ActivityCategory::ReviewComments
        ) {
            comments_received += 1;
        }
    }

    let first_response_days = first_response
        .map(|dt| round1((dt - created_at).num_seconds() as f64 / SECONDS_PER_DAY));

    let mut longest_gap = 0i64;
    let mut days = daily_activity.keys();
    if let Some(mut prev) = days.next().copied() {
        for &day in days {
            longest_gap = longest_gap.max((day - prev).num_days());
            prev = day;
        }
    }

    PrProfile {
        participants_count: participants.len(),
        first_response_days,
        comments_received,
        author_self_updates,
        longest_inactivity_gap_days: longest_gap,
        daily_activity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::parse_timestamp;

    fn ev(handle: &str, ts: &str, category: ActivityCategory) -> ClassifiedEvent {
        ClassifiedEvent {
            handle: handle.to_string(),
            date: parse_timestamp(ts).unwrap(),
            category,
        }
    }

    #[test]
    fn test_empty_timeline() {
        let created = parse_timestamp("2021-01-01T00:00:00Z").unwrap();
        let profile = build_profile("alice", created, &[]);
        assert_eq!(profile.participants_count, 0);
        assert_eq!(profile.first_response_days, None);
        assert_eq!(profile.comments_received, 0);
        assert_eq!(profile.longest_inactivity_gap_days, 0);
    }

    #[test]
    fn test_first_response_skips_author_and_pre_creation() {
        let created = parse_timestamp("2021-01-01T00:00:00Z").unwrap();
        let events = vec![
            // Author activity never counts as a response.
            ev("alice", "2021-01-01T01:00:00Z", ActivityCategory::Comments),
            // A backdated event before creation is not a response either.
            ev("bob", "2020-12-31T00:00:00Z", ActivityCategory::Comments),
            ev("bob", "2021-01-02T12:00:00Z", ActivityCategory::Comments),
            ev("carol", "2021-01-03T00:00:00Z", ActivityCategory::Reviews),
        ];
        let profile = build_profile("alice", created, &events);
        assert_eq!(profile.first_response_days, Some(1.5));
        assert_eq!(profile.participants_count, 2);
    }

    #[test]
    fn test_comments_received_counts_non_author_comment_kinds() {
        let created = parse_timestamp("2021-01-01T00:00:00Z").unwrap();
        let events = vec![
            ev("alice", "2021-01-02T00:00:00Z", ActivityCategory::Comments),
            ev("bob", "2021-01-02T00:00:00Z", ActivityCategory::Comments),
            ev("bob", "2021-01-03T00:00:00Z", ActivityCategory::Reviews),
            ev("bob", "2021-01-04T00:00:00Z", ActivityCategory::ReviewComments),
            ev("bob", "2021-01-05T00:00:00Z", ActivityCategory::Merged),
        ];
        let profile = build_profile("alice", created, &events);
        assert_eq!(profile.comments_received, 3);
    }

    #[test]
    fn test_self_updates_exclude_creation_day() {
        let created = parse_timestamp("2021-01-01T00:00:00Z").unwrap();
        let events = vec![
            ev("alice", "2021-01-01T10:00:00Z", ActivityCategory::Commits),
            ev("alice", "2021-01-02T00:00:00Z", ActivityCategory::Commits),
            ev("alice", "2021-01-03T00:00:00Z", ActivityCategory::Pushes),
            ev("alice", "2021-01-04T00:00:00Z", ActivityCategory::Comments),
        ];
        let profile = build_profile("alice", created, &events);
        assert_eq!(profile.author_self_updates, 2);
    }

    #[test]
    fn test_daily_activity_and_longest_gap() {
        let created = parse_timestamp("2021-01-01T00:00:00Z").unwrap();
        let events = vec![
            ev("alice", "2021-01-01T10:00:00Z", ActivityCategory::Commits),
            ev("bob", "2021-01-01T12:00:00Z", ActivityCategory::Comments),
            ev("bob", "2021-01-01T13:00:00Z", ActivityCategory::Comments),
            ev("bob", "2021-01-04T00:00:00Z", ActivityCategory::Reviews),
            ev("alice", "2021-01-14T00:00:00Z", ActivityCategory::Commits),
        ];
        let profile = build_profile("alice", created, &events);
        assert_eq!(profile.daily_activity.len(), 3);
        let first_day = profile
            .daily_activity
            .get(&created.date_naive())
            .unwrap();
        assert_eq!(first_day.get(&ActivityCategory::Comments), Some(&2));
        assert_eq!(first_day.get(&ActivityCategory::Commits), Some(&1));
        assert_eq!(profile.longest_inactivity_gap_days, 10);
    }
}
