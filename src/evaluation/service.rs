//! Held-out split and metric computation.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::common::error::{ScreenError, ScreenResult};
use crate::features::ScaledFeatures;
use crate::training::domain::Classifier;

use super::domain::{ClassMetrics, ClassificationReport};

/// Shuffled `(train, test)` row indices. Same `seed`, same split.
///
/// The test partition gets `ceil(n * test_fraction)` rows; both sides must be non-empty.
pub fn train_test_split(
    n: usize,
    test_fraction: f64,
    seed: u64,
) -> ScreenResult<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ScreenError::config(format!(
            "test_fraction {test_fraction} outside (0, 1)"
        )));
    }
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(ScreenError::degenerate(format!(
            "cannot split {n} rows with test_fraction {test_fraction}"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let test = indices.split_off(n - n_test);
    Ok((indices, test))
}

/// Per-class report over `names` (label, display name). Labels outside `names`
/// still count towards accuracy.
pub fn classification_report(
    y_true: &[usize],
    y_pred: &[usize],
    names: &[(usize, &str)],
) -> ScreenResult<ClassificationReport> {
    if y_true.len() != y_pred.len() {
        return Err(ScreenError::schema(y_true.len(), y_pred.len()));
    }
    if y_true.is_empty() {
        return Err(ScreenError::degenerate("cannot evaluate zero rows"));
    }

    let classes: Vec<ClassMetrics> = names
        .iter()
        .map(|&(label, name)| {
            let mut tp = 0usize;
            let mut fp = 0usize;
            let mut fn_count = 0usize;
            for (&t, &p) in y_true.iter().zip(y_pred) {
                match (t == label, p == label) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_count += 1,
                    (false, false) => {}
                }
            }
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_count);
            ClassMetrics {
                label,
                name: name.to_string(),
                precision,
                recall,
                f1: f1(precision, recall),
                support: tp + fn_count,
            }
        })
        .collect();

    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    let k = classes.len().max(1) as f64;

    Ok(ClassificationReport {
        accuracy: ratio(correct, y_true.len()),
        macro_precision: classes.iter().map(|c| c.precision).sum::<f64>() / k,
        macro_recall: classes.iter().map(|c| c.recall).sum::<f64>() / k,
        macro_f1: classes.iter().map(|c| c.f1).sum::<f64>() / k,
        support: y_true.len(),
        classes,
    })
}

/// Predict every row with `model` and report against `y_true`.
pub fn evaluate(
    model: &dyn Classifier,
    x: &[ScaledFeatures],
    y_true: &[usize],
    names: &[(usize, &str)],
) -> ScreenResult<ClassificationReport> {
    let y_pred = model.predict_all(x)?;
    classification_report(y_true, &y_pred, names)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}
