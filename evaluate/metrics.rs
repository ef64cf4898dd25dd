use crate::evaluate::search::EvaluationError;
use itertools::Itertools;
use ndarray::ArrayView1;

/// Area under the ROC curve for binary `labels` and continuous `scores`.
///
/// Computed as the Mann–Whitney statistic: the probability that a randomly
/// chosen positive scores higher than a randomly chosen negative, with tied
/// scores counted as one half (average ranks).
pub fn roc_auc(labels: ArrayView1<f64>, scores: ArrayView1<f64>) -> Result<f64, EvaluationError> {
    if labels.len() != scores.len() {
        return Err(EvaluationError::DimensionMismatch {
            context: "scores vs. labels",
            expected: labels.len(),
            found: scores.len(),
        });
    }

    let n_pos = labels.iter().filter(|&&y| y > 0.5).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(EvaluationError::InsufficientSamples {
            context: "ROC-AUC",
            negatives: n_neg,
            positives: n_pos,
        });
    }

    let order: Vec<usize> = (0..scores.len())
        .sorted_by(|&a, &b| scores[a].total_cmp(&scores[b]))
        .collect();

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; the tie group spans ranks start+1 ..= end.
        let average_rank = (start + 1 + end) as f64 / 2.0;
        let tied_positives = order[start..end]
            .iter()
            .filter(|&&i| labels[i] > 0.5)
            .count();
        rank_sum_pos += average_rank * tied_positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}
