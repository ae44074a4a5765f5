//! Binary classification metrics with positive label 1.

use crate::core::ClassificationMetrics;
use ndarray::ArrayView1;

/// Label treated as the positive class.
pub const POSITIVE_LABEL: f64 = 1.0;

/// Fraction of matching labels; 0 for empty input.
#[must_use]
pub fn accuracy(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    ratio(correct, y_true.len())
}

/// Accuracy, precision, recall and F1. Undefined ratios (no predicted or no
/// actual positives) are reported as 0.
#[must_use]
pub fn classification_metrics(
    y_true: ArrayView1<'_, f64>,
    y_pred: ArrayView1<'_, f64>,
) -> ClassificationMetrics {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        match (t == POSITIVE_LABEL, p == POSITIVE_LABEL) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    ClassificationMetrics {
        accuracy: accuracy(y_true, y_pred),
        precision,
        recall,
        f1,
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_metrics() {
        let y_true = array![1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let y_pred = array![1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let m = classification_metrics(y_true.view(), y_pred.view());

        assert!((m.accuracy - 4.0 / 6.0).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions() {
        let m = classification_metrics(array![1.0, 0.0].view(), array![0.0, 0.0].view());
        assert!((m.accuracy - 0.5).abs() < 1e-12);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn test_empty_input() {
        let empty = ndarray::Array1::<f64>::zeros(0);
        assert_eq!(accuracy(empty.view(), empty.view()), 0.0);
    }
}
