//! Composite recency/length ranking of retrieved passages.
//!
//! Scores are recomputed from scratch on every call; nothing is cached
//! between runs because the index is reseeded from empty state on each
//! handshake.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::RetrievedPassage;

/// RFC-2822 style date carried in message headers.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";
const SECONDS_PER_DAY: f64 = 86_400.0;

/// A retrieved passage with its composite rank score attached.
#[derive(Debug, Clone)]
pub struct RankedPassage {
    pub passage: RetrievedPassage,
    pub rank_score: f64,
}

/// Rank passages by `weight_recency * recency + weight_length * length`.
///
/// With both weights at zero the call is a no-op: the first `top_k` items
/// come back in input order. Weights are honored as given, without clamping
/// or normalization; out-of-range values are the caller's contract to keep.
pub fn rank(
    items: Vec<RetrievedPassage>,
    top_k: Option<usize>,
    weight_recency: f64,
    weight_length: f64,
) -> Vec<RankedPassage> {
    rank_at(Utc::now(), items, top_k, weight_recency, weight_length)
}

fn rank_at(
    now: DateTime<Utc>,
    items: Vec<RetrievedPassage>,
    top_k: Option<usize>,
    weight_recency: f64,
    weight_length: f64,
) -> Vec<RankedPassage> {
    if weight_recency == 0.0 && weight_length == 0.0 {
        return truncate(no_op_rank(items), top_k);
    }

    // Maximum length across the current candidate set, recomputed per call.
    let max_length = items.iter().map(|i| i.text.len()).max().unwrap_or(0);

    let mut ranked: Vec<RankedPassage> = items
        .into_iter()
        .map(|passage| {
            let length_score = if weight_length > 0.0 && max_length > 0 {
                passage.text.len() as f64 / max_length as f64
            } else {
                0.0
            };

            let recency_score = if weight_recency > 0.0 {
                recency_score(now, &passage.payload.date)
            } else {
                0.0
            };

            let rank_score = weight_recency * recency_score + weight_length * length_score;
            RankedPassage {
                passage,
                rank_score,
            }
        })
        .collect();

    // Stable sort: ties keep their original relative order.
    ranked.sort_by(|a, b| {
        b.rank_score
            .partial_cmp(&a.rank_score)
            .unwrap_or(Ordering::Equal)
    });

    truncate(ranked, top_k)
}

/// `1 / (1 + days_since)`, approaching 1 for messages sent moments ago.
/// Unparseable or missing dates degrade to the minimum score, never an error.
fn recency_score(now: DateTime<Utc>, date: &str) -> f64 {
    match DateTime::parse_from_str(date, DATE_FORMAT) {
        Ok(parsed) => {
            let seconds_since = (now - parsed.with_timezone(&Utc)).num_seconds() as f64;
            1.0 / (1.0 + seconds_since / SECONDS_PER_DAY)
        }
        Err(_) => 0.0,
    }
}

fn no_op_rank(items: Vec<RetrievedPassage>) -> Vec<RankedPassage> {
    items
        .into_iter()
        .map(|passage| RankedPassage {
            passage,
            rank_score: 0.0,
        })
        .collect()
}

fn truncate(mut ranked: Vec<RankedPassage>, top_k: Option<usize>) -> Vec<RankedPassage> {
    if let Some(k) = top_k {
        ranked.truncate(k);
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PassagePayload;
    use chrono::{Duration, TimeZone};

    fn passage(text: &str, date: &str) -> RetrievedPassage {
        RetrievedPassage {
            text: text.to_string(),
            similarity: None,
            payload: PassagePayload {
                thread_id: "t1".to_string(),
                date: date.to_string(),
                ..Default::default()
            },
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn days_ago(now: DateTime<Utc>, days: i64) -> String {
        (now - Duration::days(days))
            .format(DATE_FORMAT)
            .to_string()
    }

    fn texts(ranked: &[RankedPassage]) -> Vec<&str> {
        ranked.iter().map(|r| r.passage.text.as_str()).collect()
    }

    #[test]
    fn test_zero_weights_is_a_no_op() {
        let now = fixed_now();
        let items = vec![
            passage("c", &days_ago(now, 1)),
            passage("a", &days_ago(now, 30)),
            passage("b", &days_ago(now, 7)),
        ];
        let ranked = rank_at(now, items, Some(2), 0.0, 0.0);
        assert_eq!(texts(&ranked), vec!["c", "a"]);
    }

    #[test]
    fn test_truncation_length_for_all_valid_k() {
        let now = fixed_now();
        for k in 0..6 {
            let items = vec![
                passage("one", &days_ago(now, 1)),
                passage("two", &days_ago(now, 2)),
                passage("three", &days_ago(now, 3)),
            ];
            let ranked = rank_at(now, items, Some(k), 1.0, 1.0);
            assert_eq!(ranked.len(), k.min(3));
        }
    }

    #[test]
    fn test_no_top_k_returns_all() {
        let now = fixed_now();
        let items = vec![
            passage("one", &days_ago(now, 1)),
            passage("two", &days_ago(now, 2)),
        ];
        assert_eq!(rank_at(now, items, None, 1.0, 0.0).len(), 2);
    }

    #[test]
    fn test_recency_monotonicity_for_equal_lengths() {
        let now = fixed_now();
        let items = vec![
            passage("same len", &days_ago(now, 20)),
            passage("same len", &days_ago(now, 2)),
        ];
        let ranked = rank_at(now, items, None, 1.0, 0.0);
        assert_eq!(ranked[0].passage.payload.date, days_ago(now, 2));
        assert!(ranked[0].rank_score > ranked[1].rank_score);
    }

    #[test]
    fn test_recent_short_beats_old_long_on_recency_only() {
        let now = fixed_now();
        let items = vec![
            passage("short", &days_ago(now, 0)),
            passage("a much longer passage here", &days_ago(now, 30)),
        ];
        let ranked = rank_at(now, items, None, 1.0, 0.0);
        assert_eq!(texts(&ranked)[0], "short");
    }

    #[test]
    fn test_long_beats_recent_on_length_only() {
        let now = fixed_now();
        let items = vec![
            passage("short", &days_ago(now, 0)),
            passage("a much longer passage here", &days_ago(now, 30)),
        ];
        let ranked = rank_at(now, items, None, 0.0, 1.0);
        assert_eq!(texts(&ranked)[0], "a much longer passage here");
    }

    #[test]
    fn test_ties_preserve_input_order() {
        let now = fixed_now();
        let date = days_ago(now, 5);
        let items = vec![
            passage("first", &date),
            passage("third", &date),
            passage("fifth", &date),
        ];
        // Equal length and equal date: scores tie, input order survives.
        let ranked = rank_at(now, items, None, 1.0, 1.0);
        assert_eq!(texts(&ranked), vec!["first", "third", "fifth"]);
    }

    #[test]
    fn test_unparseable_date_ranks_as_oldest() {
        let now = fixed_now();
        let items = vec![
            passage("same len", "not a date at all"),
            passage("same len", &days_ago(now, 300)),
        ];
        let ranked = rank_at(now, items, None, 1.0, 0.0);
        assert_eq!(ranked[0].passage.payload.date, days_ago(now, 300));
        assert_eq!(ranked[1].rank_score, 0.0);
    }

    #[test]
    fn test_all_empty_texts_do_not_divide_by_zero() {
        let now = fixed_now();
        let items = vec![passage("", &days_ago(now, 1)), passage("", &days_ago(now, 2))];
        let ranked = rank_at(now, items, None, 0.0, 1.0);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].rank_score, 0.0);
    }

    #[test]
    fn test_length_score_normalizes_against_current_set() {
        let now = fixed_now();
        let date = days_ago(now, 1);
        let items = vec![passage("aaaaaaaaaa", &date), passage("aaaaa", &date)];
        let ranked = rank_at(now, items, None, 0.0, 1.0);
        assert_eq!(ranked[0].rank_score, 1.0);
        assert_eq!(ranked[1].rank_score, 0.5);
    }

    #[test]
    fn test_out_of_range_weights_are_honored() {
        let now = fixed_now();
        let date = days_ago(now, 1);
        let items = vec![passage("aaaaaaaaaa", &date), passage("aaaaa", &date)];
        // Weights above 1 are not clamped; scores scale right past 1.0.
        let ranked = rank_at(now, items, None, 0.0, 2.0);
        assert_eq!(ranked[0].rank_score, 2.0);
        assert_eq!(ranked[1].rank_score, 1.0);
    }
}
