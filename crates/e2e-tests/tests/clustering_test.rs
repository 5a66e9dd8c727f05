//! End-to-end clustering tests for story-cluster.
//!
//! Covers the graph, component and filter stages over items loaded from
//! the RocksDB store.

use std::collections::HashSet;

use chrono::Duration;
use pretty_assertions::assert_eq;

use e2e_tests::{
    ingest_items, make_item, reference_now, seeded_settings, synthetic_items, TestHarness,
};
use story_cluster::{
    build_edges, normalize_clusters, ClusterFilter, SimilarityEdge, SimilarityGraph, Snapshot,
    VectorLoader,
};
use story_types::ClusteringSettings;

/// Four items with the pairwise similarities
/// AB 0.95, AC 0.40, BC 0.50, AD 0.10, BD 0.05, CD 0.90 at threshold 0.86.
#[test]
fn test_scenario_a_score_table() {
    let scores = [
        (0, 1, 0.95),
        (0, 2, 0.40),
        (1, 2, 0.50),
        (0, 3, 0.10),
        (1, 3, 0.05),
        (2, 3, 0.90),
    ];
    let edges: Vec<SimilarityEdge> = scores
        .iter()
        .filter(|(_, _, score)| *score >= 0.86)
        .map(|&(a, b, score)| SimilarityEdge { a, b, score })
        .collect();

    let graph = SimilarityGraph::from_edges(4, &edges);
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.connected_components(), vec![vec![0, 1], vec![2, 3]]);
}

#[tokio::test]
async fn test_scenario_a_through_pipeline() {
    let harness = TestHarness::new();
    ingest_items(
        &harness.storage,
        &[
            make_item("A", "ann", 4.0, "Markets rally on rate cut", vec![1.0, 0.0, 0.0, 0.0]),
            make_item("B", "ben", 3.0, "Markets rally after rate cut", vec![0.95, 0.3122, 0.0, 0.0]),
            make_item("C", "cat", 2.0, "Storm hits the coast", vec![0.0, 0.0, 1.0, 0.0]),
            make_item("D", "dan", 1.0, "Coastal storm damage", vec![0.0, 0.0, 0.9, 0.4359]),
        ],
    );

    let report = harness
        .pipeline(seeded_settings())
        .run_detailed(reference_now())
        .await
        .unwrap();

    let members: Vec<Vec<String>> = report.clusters.iter().map(|c| c.member_ids.clone()).collect();
    assert_eq!(members, vec![vec!["A", "B"], vec!["C", "D"]]);
    assert_eq!(report.clusters[0].id, 1);
    assert_eq!(report.clusters[1].id, 2);
}

/// Three near-identical items spread over ten days with a three-day span limit.
#[tokio::test]
async fn test_scenario_b_span_filter() {
    let harness = TestHarness::new();
    let now = reference_now();
    ingest_items(
        &harness.storage,
        &[
            make_item("x", "a", 0.0, "same story", vec![1.0, 0.0]),
            make_item("y", "b", 120.0, "same story", vec![0.999, 0.01]),
            make_item("z", "c", 240.0, "same story", vec![0.998, 0.02]),
        ],
    );

    // Ten days exceed the lookback cap, so load the window directly
    let items = VectorLoader::new(harness.source().as_ref(), 100)
        .load(now - Duration::days(11))
        .await
        .unwrap();
    let snapshot = Snapshot::build(items);
    assert_eq!(snapshot.len(), 3);

    let detection = harness.pipeline(seeded_settings()).detect(&snapshot, 0.86);
    assert_eq!(detection.edge_count, 3);
    assert!(detection.clusters.is_empty());

    let components =
        SimilarityGraph::from_edges(3, &build_edges(snapshot.vectors(), 0.86)).connected_components();
    let clusters = normalize_clusters(&snapshot, components, &ClusterFilter::new(2, 11.0));
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].member_count(), 3);
}

#[tokio::test]
async fn test_partition_and_filters_on_synthetic_data() {
    let harness = TestHarness::new();
    ingest_items(&harness.storage, &synthetic_items(7, 5, 6, 20, 32, 20.0));

    let settings = ClusteringSettings {
        min_cluster_size: 3,
        max_day_span: 1.0,
        ..seeded_settings()
    };
    let report = harness
        .pipeline(settings)
        .run_detailed(reference_now())
        .await
        .unwrap();

    let mut seen = HashSet::new();
    for cluster in &report.clusters {
        assert!(cluster.member_count >= 3);
        assert!(cluster.span_hours / 24.0 <= 1.0);
        for id in &cluster.member_ids {
            assert!(seen.insert(id.clone()), "{} appears in two clusters", id);
        }
        if let Some(c) = cluster.coherence {
            assert!((0.0..=1.0).contains(&c));
        }
    }

    assert_eq!(report.summary.eligible_items, 50);
    assert_eq!(report.summary.cluster_count, 5);
    assert_eq!(report.summary.covered_items, 30);
    assert!(seen.iter().all(|id| id.starts_with('t')));

    let ids: Vec<u32> = report.clusters.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    for pair in report.clusters.windows(2) {
        assert!(pair[0].earliest <= pair[1].earliest);
    }
}

#[tokio::test]
async fn test_superseded_and_ineligible_items_are_ignored() {
    let harness = TestHarness::new();
    let original = make_item("p1-v1", "ann", 2.0, "Launch delayed", vec![1.0, 0.0]);
    let mut updated = make_item("p1-v2", "ann", 1.5, "Launch delayed again", vec![1.0, 0.0]);
    updated.external_id = original.external_id.clone();
    updated.version = 1;
    let mut retweet = make_item("rt", "bob", 1.0, "Launch delayed", vec![1.0, 0.0]);
    retweet.is_retweet = true;
    let peer = make_item("p2", "cat", 1.0, "Launch delayed", vec![0.99, 0.01]);

    ingest_items(&harness.storage, &[original, updated, retweet, peer]);

    let report = harness
        .pipeline(seeded_settings())
        .run_detailed(reference_now())
        .await
        .unwrap();

    assert_eq!(report.summary.eligible_items, 2);
    assert_eq!(report.clusters.len(), 1);
    assert_eq!(report.clusters[0].member_ids, vec!["p1-v2", "p2"]);
}

#[tokio::test]
async fn test_small_pages_load_everything() {
    let harness = TestHarness::new();
    ingest_items(&harness.storage, &synthetic_items(3, 4, 5, 7, 16, 10.0));

    let settings = ClusteringSettings {
        page_size: 3,
        ..seeded_settings()
    };
    let snapshot = harness
        .pipeline(settings)
        .load_snapshot(reference_now())
        .await
        .unwrap();

    assert_eq!(snapshot.eligible_count(), 27);
    assert_eq!(snapshot.skipped(), 0);
    let ids: HashSet<&str> = snapshot.items().iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids.len(), 27);
}
