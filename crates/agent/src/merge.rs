//! Chat history merging.
//!
//! Merging concatenates the sources in the order given, deduplicates by
//! message id keeping the first occurrence, then stable-sorts by timestamp.
//! Ties therefore resolve to concatenation order. A message with an empty id
//! has no identity to deduplicate on, so the merge fails outright.
//!
//! Merging never truncates; the history cap applies only when a turn's
//! messages are appended to the persisted context.

use std::collections::HashSet;
use tracing::debug;

use bruin_core::error::MergeError;
use bruin_core::message::TimestampedMessage;

/// Merge multiple history sources into one deduplicated, time-ordered view.
pub fn merge_histories(
    sources: &[&[TimestampedMessage]],
) -> Result<Vec<TimestampedMessage>, MergeError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged: Vec<TimestampedMessage> = Vec::new();

    for source in sources {
        for message in *source {
            if message.id.is_empty() {
                return Err(MergeError::MissingId {
                    timestamp: message.timestamp,
                });
            }
            if seen.insert(message.id.as_str()) {
                merged.push(message.clone());
            } else {
                debug!(message_id = %message.id, "dropping duplicate message in merge");
            }
        }
    }

    // Stable sort: equal timestamps keep concatenation order
    merged.sort_by_key(|m| m.timestamp);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        assert!(merge_histories(&[]).unwrap().is_empty());
        assert!(merge_histories(&[&[], &[]]).unwrap().is_empty());
    }

    #[test]
    fn merge_sorts_across_sources() {
        let a = vec![
            TimestampedMessage::user("third").at(at("2026-05-11T12:02:00Z")),
            TimestampedMessage::user("first").at(at("2026-05-11T12:00:00Z")),
        ];
        let b = vec![TimestampedMessage::ai("second").at(at("2026-05-11T12:01:00Z"))];

        let merged = merge_histories(&[&a, &b]).unwrap();
        let contents: Vec<_> = merged.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let shared = TimestampedMessage::user("shared").at(at("2026-05-11T12:00:00Z"));
        let mut later_copy = shared.clone();
        later_copy.content = "same id, different text".into();

        let a = vec![shared.clone()];
        let b = vec![later_copy];

        let merged = merge_histories(&[&a, &b]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].content, "shared");
    }

    #[test]
    fn equal_timestamps_keep_concatenation_order() {
        let ts = at("2026-05-11T12:00:00Z");
        let a = vec![TimestampedMessage::user("from a").at(ts)];
        let b = vec![TimestampedMessage::user("from b").at(ts)];

        let merged = merge_histories(&[&a, &b]).unwrap();
        let contents: Vec<_> = merged.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["from a", "from b"]);
    }

    #[test]
    fn empty_id_is_a_hard_error() {
        let mut message = TimestampedMessage::user("anonymous");
        message.id = String::new();
        let source = vec![message];

        let err = merge_histories(&[&source]).unwrap_err();
        assert!(matches!(err, MergeError::MissingId { .. }));
    }

    #[test]
    fn merge_is_idempotent() {
        let history = vec![
            TimestampedMessage::user("first").at(at("2026-05-11T12:00:00Z")),
            TimestampedMessage::ai("second").at(at("2026-05-11T12:01:00Z")),
            TimestampedMessage::user("third").at(at("2026-05-11T12:02:00Z")),
        ];

        let once = merge_histories(&[&history]).unwrap();
        let twice = merge_histories(&[&history, &history]).unwrap();

        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.content, b.content);
        }
    }

    #[test]
    fn merge_never_truncates() {
        let source: Vec<_> = (0..100)
            .map(|i| {
                TimestampedMessage::user(format!("m{i}"))
                    .at(at("2026-05-11T12:00:00Z") + chrono::Duration::seconds(i))
            })
            .collect();
        let merged = merge_histories(&[&source]).unwrap();
        assert_eq!(merged.len(), 100);
    }
}
