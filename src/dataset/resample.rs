use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::LabelledCollection;
use crate::{EvalError, Result};

/// Pools train and test, then redraws a split with the same per-class counts as
/// the original train split.
pub fn stratified_resample(
    train: &LabelledCollection,
    test: &LabelledCollection,
    random_state: u64,
) -> Result<(LabelledCollection, LabelledCollection)> {
    let pooled_x = train.x.concat(&test.x)?;
    let pooled_y: Vec<String> = train.y.iter().chain(test.y.iter()).cloned().collect();

    let mut train_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in &train.y {
        *train_counts.entry(label.as_str()).or_default() += 1;
    }

    let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, label) in pooled_y.iter().enumerate() {
        by_class.entry(label.as_str()).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(random_state);
    let mut train_idx = Vec::with_capacity(train.n_cases());
    let mut test_idx = Vec::with_capacity(test.n_cases());
    for (label, mut indices) in by_class {
        indices.shuffle(&mut rng);
        let n_train = train_counts.get(label).copied().unwrap_or(0);
        train_idx.extend_from_slice(&indices[..n_train]);
        test_idx.extend_from_slice(&indices[n_train..]);
    }

    if test_idx.is_empty() {
        return Err(EvalError::InvalidInput("resampling left the test split empty".to_string()));
    }

    split(&pooled_x, &pooled_y, &train_idx, &test_idx)
}

/// Unstratified resample used for regression targets.
pub fn resample(
    train: &LabelledCollection,
    test: &LabelledCollection,
    random_state: u64,
) -> Result<(LabelledCollection, LabelledCollection)> {
    let pooled_x = train.x.concat(&test.x)?;
    let pooled_y: Vec<String> = train.y.iter().chain(test.y.iter()).cloned().collect();

    let mut indices: Vec<usize> = (0..pooled_y.len()).collect();
    let mut rng = StdRng::seed_from_u64(random_state);
    indices.shuffle(&mut rng);

    let (train_idx, test_idx) = indices.split_at(train.n_cases());
    split(&pooled_x, &pooled_y, train_idx, test_idx)
}

fn split(
    x: &super::TimeSeriesCollection,
    y: &[String],
    train_idx: &[usize],
    test_idx: &[usize],
) -> Result<(LabelledCollection, LabelledCollection)> {
    let pick = |indices: &[usize]| -> Result<LabelledCollection> {
        LabelledCollection::new(x.select(indices)?, indices.iter().map(|&i| y[i].clone()).collect())
    };
    Ok((pick(train_idx)?, pick(test_idx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TimeSeriesCollection;
    use crate::Matrix;

    fn labelled(start: usize, labels: &[&str]) -> LabelledCollection {
        let x = Matrix::from_shape_fn((labels.len(), 3), |(i, j)| {
            (start + i) as f64 + j as f64 * 0.1
        });
        LabelledCollection::new(
            TimeSeriesCollection::from_matrix(&x).unwrap(),
            labels.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    fn count(labels: &[String], class: &str) -> usize {
        labels.iter().filter(|l| *l == class).count()
    }

    #[test]
    fn test_stratified_resample_keeps_class_counts() {
        let train = labelled(0, &["a", "a", "b", "b", "b"]);
        let test = labelled(100, &["a", "b", "a", "a"]);

        let (new_train, new_test) = stratified_resample(&train, &test, 3).unwrap();
        assert_eq!(new_train.n_cases(), 5);
        assert_eq!(new_test.n_cases(), 4);
        assert_eq!(count(&new_train.y, "a"), 2);
        assert_eq!(count(&new_train.y, "b"), 3);
        assert_eq!(count(&new_test.y, "a"), 3);
        assert_eq!(count(&new_test.y, "b"), 1);
    }

    #[test]
    fn test_resample_is_deterministic_per_seed() {
        let train = labelled(0, &["1", "2", "3"]);
        let test = labelled(10, &["4", "5"]);

        let (a, _) = resample(&train, &test, 7).unwrap();
        let (b, _) = resample(&train, &test, 7).unwrap();
        assert_eq!(a.y, b.y);
        assert_eq!(a.n_cases(), 3);
    }
}
