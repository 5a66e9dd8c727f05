//! Per-cluster metrics and story classification.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use story_types::Item;

use crate::cluster::Cluster;
use crate::coherence::CoherenceScorer;
use crate::snapshot::Snapshot;
use crate::tokenize::{tokenize, TokenSet};

/// Thresholds for the story-candidate flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRules {
    /// Minimum member count
    pub min_items: usize,
    /// Minimum distinct authors
    pub min_authors: usize,
}

impl Default for StoryRules {
    fn default() -> Self {
        Self {
            min_items: 3,
            min_authors: 2,
        }
    }
}

impl StoryRules {
    pub fn is_story(&self, member_count: usize, unique_authors: usize) -> bool {
        member_count >= self.min_items && unique_authors >= self.min_authors
    }
}

/// Metrics derived for one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetrics {
    /// Mean pairwise Jaccard; `None` when undefined
    pub coherence: Option<f64>,
    pub unique_authors: usize,
    pub span_hours: f64,
    pub is_story_candidate: bool,
}

/// Count distinct authors; items without a handle each count once.
pub fn unique_author_count<'a>(items: impl IntoIterator<Item = &'a Item>) -> usize {
    items
        .into_iter()
        .map(|item| {
            item.author_key()
                .unwrap_or_else(|| format!("__anon:{}", item.id))
        })
        .collect::<HashSet<_>>()
        .len()
}

/// Computes metrics for clusters of one snapshot.
pub struct MetricsEngine {
    rules: StoryRules,
    token_cap: usize,
    scorer: CoherenceScorer,
}

impl MetricsEngine {
    pub fn new(rules: StoryRules, token_cap: usize, scorer: CoherenceScorer) -> Self {
        Self {
            rules,
            token_cap,
            scorer,
        }
    }

    /// Compute metrics for one cluster.
    pub fn measure(&mut self, snapshot: &Snapshot, cluster: &Cluster) -> ClusterMetrics {
        let members: Vec<&Item> = cluster.members.iter().map(|&i| snapshot.item(i)).collect();

        let token_sets: Vec<TokenSet> = members
            .iter()
            .map(|item| tokenize(item.headline(), self.token_cap))
            .collect();
        let refs: Vec<&TokenSet> = token_sets.iter().collect();
        let coherence = self.scorer.score(&refs);

        let unique_authors = unique_author_count(members.iter().copied());

        ClusterMetrics {
            coherence,
            unique_authors,
            span_hours: cluster.span_hours(),
            is_story_candidate: self.rules.is_story(cluster.member_count(), unique_authors),
        }
    }

    /// Compute metrics for every cluster, in cluster order.
    pub fn measure_all(&mut self, snapshot: &Snapshot, clusters: &[Cluster]) -> Vec<ClusterMetrics> {
        clusters
            .iter()
            .map(|cluster| self.measure(snapshot, cluster))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn item(id: &str, author: Option<&str>, text: &str, hour: i64) -> Item {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut item = Item::new(id, id, base + Duration::hours(hour), text)
            .with_normalized_text(text)
            .with_embedding(vec![1.0f32, 0.0]);
        if let Some(author) = author {
            item = item.with_author(author);
        }
        item
    }

    fn cluster(snapshot: &Snapshot) -> Cluster {
        let members: Vec<usize> = (0..snapshot.len()).collect();
        let times: Vec<_> = members.iter().map(|&i| snapshot.item(i).created_at).collect();
        Cluster {
            id: 1,
            members,
            earliest: *times.iter().min().unwrap(),
            latest: *times.iter().max().unwrap(),
        }
    }

    fn engine() -> MetricsEngine {
        MetricsEngine::new(StoryRules::default(), 240, CoherenceScorer::new(40, Some(7)))
    }

    #[test]
    fn test_unique_authors_case_insensitive() {
        let items = vec![
            item("a", Some("@Alice"), "x", 0),
            item("b", Some("alice"), "x", 0),
            item("c", Some("Bob"), "x", 0),
        ];
        assert_eq!(unique_author_count(&items), 2);
    }

    #[test]
    fn test_anonymous_items_count_individually() {
        let items = vec![
            item("a", None, "x", 0),
            item("b", None, "x", 0),
            item("c", Some(" "), "x", 0),
        ];
        assert_eq!(unique_author_count(&items), 3);
    }

    #[test]
    fn test_story_candidate_requires_size_and_authors() {
        let rules = StoryRules::default();
        assert!(rules.is_story(3, 2));
        assert!(!rules.is_story(2, 2));
        assert!(!rules.is_story(5, 1));
    }

    #[test]
    fn test_measure_story_cluster() {
        let snapshot = Snapshot::build(vec![
            item("a", Some("alice"), "Fed cuts rates", 0),
            item("b", Some("bob"), "Fed cuts rates again", 2),
            item("c", None, "fed cuts rates", 4),
        ]);
        let metrics = engine().measure(&snapshot, &cluster(&snapshot));

        assert_eq!(metrics.unique_authors, 3);
        assert!(metrics.is_story_candidate);
        assert_eq!(metrics.span_hours, 4.0);
        let coherence = metrics.coherence.unwrap();
        assert!((0.0..=1.0).contains(&coherence));
    }

    #[test]
    fn test_measure_single_author_not_story() {
        let snapshot = Snapshot::build(vec![
            item("a", Some("alice"), "launch today", 0),
            item("b", Some("ALICE"), "launch today", 1),
            item("c", Some("@alice"), "launch today", 2),
        ]);
        let metrics = engine().measure(&snapshot, &cluster(&snapshot));
        assert_eq!(metrics.unique_authors, 1);
        assert!(!metrics.is_story_candidate);
        assert_eq!(metrics.coherence, Some(1.0));
    }

    #[test]
    fn test_measure_undefined_coherence() {
        let snapshot = Snapshot::build(vec![
            item("a", Some("alice"), "the of", 0),
            item("b", Some("bob"), "an it", 1),
        ]);
        let metrics = engine().measure(&snapshot, &cluster(&snapshot));
        assert_eq!(metrics.coherence, None);
    }
}
