//! K-fold partitions and single train/test splits.
//!
//! Every generator takes the random source explicitly; callers own one
//! generator per repetition so that partitions never share mutable state.

use crate::evaluate::search::EvaluationError;
use ndarray::ArrayView1;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldStrategy {
    /// Shuffle all rows, then cut into contiguous chunks.
    Shuffled,
    /// Shuffle each class separately and deal it evenly across folds, so every
    /// fold keeps roughly the overall class balance.
    Stratified,
}

/// Row indices of one training/held-out pair. Both lists are sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partitions the rows behind `labels` into `n_folds` folds.
///
/// Fails with `InsufficientSamples` when a fold's training or held-out part
/// would be missing a class, since neither fitting nor ROC-AUC is then defined.
pub fn k_fold<R: Rng + ?Sized>(
    labels: ArrayView1<f64>,
    n_folds: usize,
    strategy: FoldStrategy,
    rng: &mut R,
) -> Result<Vec<Fold>, EvaluationError> {
    let n = labels.len();
    if n_folds < 2 {
        return Err(EvaluationError::InvalidConfiguration(format!(
            "cross-validation needs at least 2 folds, got {}",
            n_folds
        )));
    }
    if n_folds > n {
        return Err(EvaluationError::InsufficientSamples {
            context: "k-fold partition (more folds than samples)",
            negatives: labels.iter().filter(|&&y| y <= 0.5).count(),
            positives: labels.iter().filter(|&&y| y > 0.5).count(),
        });
    }

    let assignments: Vec<Vec<usize>> = match strategy {
        FoldStrategy::Shuffled => {
            let mut indices: Vec<usize> = (0..n).collect();
            indices.shuffle(rng);
            balanced_chunks(&indices, n_folds)
        }
        FoldStrategy::Stratified => {
            let (mut negatives, mut positives) = split_by_class(labels);
            negatives.shuffle(rng);
            positives.shuffle(rng);
            let neg_chunks = balanced_chunks(&negatives, n_folds);
            // Deal positives starting from the last fold so the folds that
            // received an extra negative are the last to receive an extra positive.
            let mut pos_chunks = balanced_chunks(&positives, n_folds);
            pos_chunks.reverse();
            neg_chunks
                .into_iter()
                .zip(pos_chunks)
                .map(|(mut neg, pos)| {
                    neg.extend(pos);
                    neg
                })
                .collect()
        }
    };

    let folds: Vec<Fold> = (0..n_folds)
        .map(|held_out| {
            let mut test = assignments[held_out].clone();
            test.sort_unstable();
            let mut train: Vec<usize> = assignments
                .iter()
                .enumerate()
                .filter(|(f, _)| *f != held_out)
                .flat_map(|(_, chunk)| chunk.iter().copied())
                .collect();
            train.sort_unstable();
            Fold { train, test }
        })
        .collect();

    for fold in &folds {
        ensure_both_classes(labels, &fold.test, "held-out fold")?;
        ensure_both_classes(labels, &fold.train, "training fold")?;
    }
    Ok(folds)
}

/// A single stratified train/test split. `test_fraction` must lie strictly
/// between 0 and 1; each class contributes at least one row to each side.
pub fn train_test_split<R: Rng + ?Sized>(
    labels: ArrayView1<f64>,
    test_fraction: f64,
    rng: &mut R,
) -> Result<Fold, EvaluationError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(EvaluationError::InvalidConfiguration(format!(
            "test fraction must lie in (0, 1), got {}",
            test_fraction
        )));
    }
    let (negatives, positives) = split_by_class(labels);
    if negatives.len() < 2 || positives.len() < 2 {
        return Err(EvaluationError::InsufficientSamples {
            context: "train/test split (each class needs at least 2 rows)",
            negatives: negatives.len(),
            positives: positives.len(),
        });
    }

    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::with_capacity(labels.len());
    for mut class in [negatives, positives] {
        class.shuffle(rng);
        let n_test = ((class.len() as f64) * test_fraction).round() as usize;
        let n_test = n_test.clamp(1, class.len() - 1);
        test.extend_from_slice(&class[..n_test]);
        train.extend_from_slice(&class[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok(Fold { train, test })
}

fn split_by_class(labels: ArrayView1<f64>) -> (Vec<usize>, Vec<usize>) {
    let mut negatives = Vec::new();
    let mut positives = Vec::new();
    for (i, &y) in labels.iter().enumerate() {
        if y > 0.5 {
            positives.push(i);
        } else {
            negatives.push(i);
        }
    }
    (negatives, positives)
}

/// Cuts `indices` into `k` contiguous chunks whose sizes differ by at most one;
/// the first `len % k` chunks receive the extra element.
fn balanced_chunks(indices: &[usize], k: usize) -> Vec<Vec<usize>> {
    let base = indices.len() / k;
    let extra = indices.len() % k;
    let mut chunks = Vec::with_capacity(k);
    let mut start = 0;
    for f in 0..k {
        let size = base + usize::from(f < extra);
        chunks.push(indices[start..start + size].to_vec());
        start += size;
    }
    chunks
}

fn ensure_both_classes(
    labels: ArrayView1<f64>,
    rows: &[usize],
    context: &'static str,
) -> Result<(), EvaluationError> {
    let positives = rows.iter().filter(|&&i| labels[i] > 0.5).count();
    let negatives = rows.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(EvaluationError::InsufficientSamples {
            context,
            negatives,
            positives,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn alternating_labels(n: usize) -> Array1<f64> {
        Array1::from_shape_fn(n, |i| (i % 2) as f64)
    }

    #[test]
    fn folds_partition_every_row_exactly_once() {
        let labels = alternating_labels(103);
        for strategy in [FoldStrategy::Shuffled, FoldStrategy::Stratified] {
            let mut rng = StdRng::seed_from_u64(4);
            let folds = k_fold(labels.view(), 5, strategy, &mut rng).unwrap();
            assert_eq!(folds.len(), 5);
            let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..103).collect::<Vec<_>>());
            for fold in &folds {
                assert_eq!(fold.train.len() + fold.test.len(), 103);
                assert!(fold.test.iter().all(|i| !fold.train.contains(i)));
            }
        }
    }

    #[test]
    fn stratified_folds_keep_class_balance() {
        // 30 negatives, 10 positives
        let labels = Array1::from_shape_fn(40, |i| if i < 10 { 1.0 } else { 0.0 });
        let mut rng = StdRng::seed_from_u64(8);
        let folds = k_fold(labels.view(), 5, FoldStrategy::Stratified, &mut rng).unwrap();
        for fold in &folds {
            let positives = fold.test.iter().filter(|&&i| labels[i] > 0.5).count();
            assert_eq!(positives, 2);
            assert_eq!(fold.test.len(), 8);
        }
    }

    #[test]
    fn same_seed_gives_same_partition() {
        let labels = alternating_labels(50);
        let a = k_fold(labels.view(), 3, FoldStrategy::Shuffled, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = k_fold(labels.view(), 3, FoldStrategy::Shuffled, &mut StdRng::seed_from_u64(1)).unwrap();
        let c = k_fold(labels.view(), 3, FoldStrategy::Shuffled, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn too_few_minority_samples_fail() {
        // Only 2 positives cannot populate 5 held-out folds.
        let labels = Array1::from_shape_fn(20, |i| if i < 2 { 1.0 } else { 0.0 });
        let mut rng = StdRng::seed_from_u64(0);
        let err = k_fold(labels.view(), 5, FoldStrategy::Stratified, &mut rng).unwrap_err();
        assert!(matches!(err, EvaluationError::InsufficientSamples { .. }));
    }

    #[test]
    fn fold_count_is_validated() {
        let labels = alternating_labels(10);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            k_fold(labels.view(), 1, FoldStrategy::Shuffled, &mut rng),
            Err(EvaluationError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            k_fold(labels.view(), 11, FoldStrategy::Shuffled, &mut rng),
            Err(EvaluationError::InsufficientSamples { .. })
        ));
    }

    #[test]
    fn split_is_stratified_and_disjoint() {
        let labels = Array1::from_shape_fn(100, |i| if i < 30 { 1.0 } else { 0.0 });
        let mut rng = StdRng::seed_from_u64(12);
        let split = train_test_split(labels.view(), 0.3, &mut rng).unwrap();
        assert_eq!(split.test.len(), 30);
        assert_eq!(split.train.len(), 70);
        let test_pos = split.test.iter().filter(|&&i| labels[i] > 0.5).count();
        assert_eq!(test_pos, 9);
        assert!(split.test.iter().all(|i| !split.train.contains(i)));
    }

    #[test]
    fn split_fraction_is_validated() {
        let labels = alternating_labels(10);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            train_test_split(labels.view(), 1.0, &mut rng),
            Err(EvaluationError::InvalidConfiguration(_))
        ));
    }
}
