//! Vector similarity functions.
//!
//! Pure Rust implementations without external dependencies. Scores are
//! accumulated in `f64` so threshold comparisons do not depend on the
//! order in which pairs are visited.

/// Calculate cosine similarity between two vectors.
///
/// Returns value in [-1.0, 1.0] where 1.0 = identical direction.
/// Defined as 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");
    cosine_with_norms(a, b, norm(a), norm(b))
}

/// Euclidean norm of a vector.
pub fn norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn cosine_with_norms(a: &[f32], b: &[f32], norm_a: f64, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

/// All pairwise cosine similarities for a fixed vector set.
///
/// The matrix does not depend on any threshold, so a sweep computes it once
/// and re-filters it per threshold. Only the strict upper triangle is kept.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    n: usize,
    scores: Vec<f64>,
}

impl SimilarityMatrix {
    /// Compute the matrix for the given vectors. O(N²) comparisons.
    pub fn compute(vectors: &[Vec<f32>]) -> Self {
        let n = vectors.len();
        let norms: Vec<f64> = vectors.iter().map(|v| norm(v)).collect();
        let mut scores = Vec::with_capacity(n.saturating_sub(1) * n / 2);

        for i in 0..n {
            for j in (i + 1)..n {
                scores.push(cosine_with_norms(&vectors[i], &vectors[j], norms[i], norms[j]));
            }
        }

        Self { n, scores }
    }

    /// Number of vectors the matrix was built from.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Number of unordered pairs stored.
    pub fn pair_count(&self) -> usize {
        self.scores.len()
    }

    /// Similarity of `i` and `j`; 1.0 on the diagonal.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        match i.cmp(&j) {
            std::cmp::Ordering::Equal => 1.0,
            std::cmp::Ordering::Less => self.scores[self.offset(i, j)],
            std::cmp::Ordering::Greater => self.scores[self.offset(j, i)],
        }
    }

    /// Iterate over every unordered pair `(i, j, score)` with `i < j`.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n).flat_map(move |i| {
            ((i + 1)..self.n).map(move |j| (i, j, self.scores[self.offset(i, j)]))
        })
    }

    fn offset(&self, i: usize, j: usize) -> usize {
        // Rows before i hold (n-1) + (n-2) + ... + (n-i) entries
        i * self.n - i * (i + 1) / 2 + (j - i - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
        assert_eq!(cosine_similarity(&b, &a), 0.0);
    }

    #[test]
    fn test_cosine_similarity_is_symmetric() {
        let vectors = vec![
            vec![0.3, -0.7, 0.2],
            vec![0.9, 0.1, -0.4],
            vec![-0.5, 0.5, 0.5],
            vec![0.12, 0.33, 0.91],
        ];
        for a in &vectors {
            for b in &vectors {
                assert_eq!(cosine_similarity(a, b), cosine_similarity(b, a));
            }
        }
    }

    #[test]
    fn test_matrix_matches_direct_computation() {
        let vectors = vec![
            vec![0.3, -0.7, 0.2],
            vec![0.9, 0.1, -0.4],
            vec![-0.5, 0.5, 0.5],
            vec![0.0, 0.0, 0.0],
        ];
        let matrix = SimilarityMatrix::compute(&vectors);
        assert_eq!(matrix.len(), 4);
        assert_eq!(matrix.pair_count(), 6);

        for i in 0..4 {
            for j in 0..4 {
                if i == j {
                    assert_eq!(matrix.get(i, j), 1.0);
                } else {
                    assert_eq!(matrix.get(i, j), cosine_similarity(&vectors[i], &vectors[j]));
                }
            }
        }
    }

    #[test]
    fn test_matrix_pairs_cover_upper_triangle() {
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
        let matrix = SimilarityMatrix::compute(&vectors);
        let pairs: Vec<(usize, usize)> = matrix.pairs().map(|(i, j, _)| (i, j)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn test_matrix_empty_and_single() {
        assert!(SimilarityMatrix::compute(&[]).is_empty());
        let single = SimilarityMatrix::compute(&[vec![1.0]]);
        assert_eq!(single.pair_count(), 0);
        assert_eq!(single.pairs().count(), 0);
    }
}
