//! Immutable view of a loaded item batch.
//!
//! The snapshot parses embeddings once. Every threshold in a sweep borrows
//! the same snapshot, so the batch is never re-fetched or mutated between
//! runs.

use tracing::{debug, warn};

use story_types::Item;

/// Items with a usable embedding, indexed `0..N`.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    items: Vec<Item>,
    vectors: Vec<Vec<f32>>,
    eligible_count: usize,
    skipped: usize,
    dimension: Option<usize>,
}

impl Snapshot {
    /// Build a snapshot from the eligible item set.
    ///
    /// Items whose embedding does not parse are dropped and counted in
    /// [`Snapshot::skipped`]; they still count as eligible for coverage. The
    /// shared dimension is the most common vector length (ties go to the
    /// length seen first), and vectors of any other length are skipped too.
    pub fn build(items: Vec<Item>) -> Self {
        let mut snapshot = Self {
            eligible_count: items.len(),
            ..Self::default()
        };

        let parsed: Vec<(Item, Option<Vec<f32>>)> = items
            .into_iter()
            .map(|item| {
                let vector = item.embedding.as_ref().and_then(|e| e.parse());
                (item, vector)
            })
            .collect();

        snapshot.dimension = dominant_dimension(parsed.iter().filter_map(|(_, v)| v.as_ref()));

        for (item, vector) in parsed {
            let Some(vector) = vector else {
                debug!(item_id = %item.id, "Unparsable embedding, skipping item");
                snapshot.skipped += 1;
                continue;
            };

            if Some(vector.len()) != snapshot.dimension {
                warn!(
                    item_id = %item.id,
                    expected = ?snapshot.dimension,
                    actual = vector.len(),
                    "Embedding dimension mismatch, skipping item"
                );
                snapshot.skipped += 1;
                continue;
            }

            snapshot.items.push(item);
            snapshot.vectors.push(vector);
        }

        snapshot
    }

    /// Number of items with a usable embedding.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items handed to [`Snapshot::build`].
    pub fn eligible_count(&self) -> usize {
        self.eligible_count
    }

    /// Items excluded for an unusable embedding.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Shared embedding dimension, if any item had one.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, index: usize) -> &Item {
        &self.items[index]
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }
}

/// Most common vector length; the earliest-seen length wins a tie.
fn dominant_dimension<'a>(vectors: impl Iterator<Item = &'a Vec<f32>>) -> Option<usize> {
    // (length, count) in order of first appearance
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for vector in vectors {
        match counts.iter_mut().find(|(len, _)| *len == vector.len()) {
            Some((_, count)) => *count += 1,
            None => counts.push((vector.len(), 1)),
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (len, count) in counts {
        match best {
            Some((_, top)) if top >= count => {}
            _ => best = Some((len, count)),
        }
    }
    best.map(|(len, _)| len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use story_types::EmbeddingField;

    fn item(id: &str, embedding: Option<EmbeddingField>) -> Item {
        let mut item = Item::new(id, id, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(), id)
            .with_normalized_text(id);
        item.embedding = embedding;
        item
    }

    #[test]
    fn test_build_keeps_parseable_vectors() {
        let snapshot = Snapshot::build(vec![
            item("a", Some(EmbeddingField::Values(vec![1.0, 0.0]))),
            item("b", Some(EmbeddingField::Encoded("[0.0, 1.0]".to_string()))),
        ]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.eligible_count(), 2);
        assert_eq!(snapshot.skipped(), 0);
        assert_eq!(snapshot.dimension(), Some(2));
        assert_eq!(snapshot.vectors()[1], vec![0.0f32, 1.0]);
    }

    #[test]
    fn test_build_skips_unparsable_without_failing() {
        let snapshot = Snapshot::build(vec![
            item("a", Some(EmbeddingField::Values(vec![1.0, 0.0]))),
            item("b", Some(EmbeddingField::Encoded("{broken".to_string()))),
            item("c", None),
        ]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.eligible_count(), 3);
        assert_eq!(snapshot.skipped(), 2);
        assert_eq!(snapshot.item(0).id, "a");
    }

    #[test]
    fn test_build_skips_mismatched_dimension() {
        let snapshot = Snapshot::build(vec![
            item("a", Some(EmbeddingField::Values(vec![1.0, 0.0]))),
            item("short", Some(EmbeddingField::Values(vec![1.0]))),
            item("b", Some(EmbeddingField::Values(vec![0.0, 1.0]))),
        ]);
        assert_eq!(snapshot.dimension(), Some(2));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.skipped(), 1);
        assert_eq!(snapshot.item(1).id, "b");
    }

    #[test]
    fn test_build_ignores_malformed_first_vector() {
        let snapshot = Snapshot::build(vec![
            item("bad", Some(EmbeddingField::Values(vec![0.5]))),
            item("a", Some(EmbeddingField::Values(vec![1.0, 0.0, 0.0]))),
            item("b", Some(EmbeddingField::Values(vec![0.99, 0.1, 0.0]))),
            item("c", Some(EmbeddingField::Values(vec![0.98, 0.15, 0.0]))),
        ]);
        assert_eq!(snapshot.dimension(), Some(3));
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.skipped(), 1);
        let ids: Vec<&str> = snapshot.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dimension_tie_goes_to_first_seen() {
        let snapshot = Snapshot::build(vec![
            item("a", Some(EmbeddingField::Values(vec![1.0]))),
            item("b", Some(EmbeddingField::Values(vec![1.0, 0.0]))),
            item("c", Some(EmbeddingField::Values(vec![0.5]))),
            item("d", Some(EmbeddingField::Values(vec![0.0, 1.0]))),
        ]);
        assert_eq!(snapshot.dimension(), Some(1));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.skipped(), 2);
    }

    #[test]
    fn test_build_empty() {
        let snapshot = Snapshot::build(Vec::new());
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.dimension(), None);
    }
}
