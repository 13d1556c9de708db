use std::collections::BTreeMap;

use ndarray::{Array2, Axis};

use crate::{EvalError, Matrix, Result, Vector};

fn check_lengths(a: usize, b: usize) -> Result<()> {
    if a != b {
        return Err(EvalError::InvalidInput(
            "y_true and y_pred must have the same length".to_string(),
        ));
    }
    if a == 0 {
        return Err(EvalError::InvalidInput("metrics need at least one sample".to_string()));
    }
    Ok(())
}

pub fn mean_squared_error(y_true: &Vector, y_pred: &Vector) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len())?;

    let diff = y_true - y_pred;
    Ok(diff.mapv(|x| x * x).sum() / diff.len() as f64)
}

pub fn mean_absolute_error(y_true: &Vector, y_pred: &Vector) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len())?;

    let diff = y_true - y_pred;
    Ok(diff.mapv(|x| x.abs()).sum() / diff.len() as f64)
}

pub fn r2_score(y_true: &Vector, y_pred: &Vector) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len())?;

    let y_mean = y_true.sum() / y_true.len() as f64;
    let ss_res = (y_true - y_pred).mapv(|x| x * x).sum();
    let ss_tot = y_true.mapv(|x| (x - y_mean) * (x - y_mean)).sum();

    if ss_tot == 0.0 {
        return Ok(1.0); // Perfect prediction when variance is zero
    }

    Ok(1.0 - ss_res / ss_tot)
}

/// Davies-Bouldin index of a partition of the rows of `x` (lower is better).
///
/// Cluster scatter is the mean Euclidean distance of members to their centroid,
/// separation the Euclidean distance between centroids.
pub fn davies_bouldin_score(x: &Matrix, labels: &[usize]) -> Result<f64> {
    check_lengths(x.nrows(), labels.len())?;

    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        members.entry(label).or_default().push(i);
    }
    let n_labels = members.len();
    if n_labels < 2 || n_labels >= x.nrows() {
        return Err(EvalError::InvalidInput(format!(
            "number of labels is {}, valid values are 2 to n_samples - 1 (inclusive)",
            n_labels
        )));
    }

    let euclidean = |a: ndarray::ArrayView1<'_, f64>, b: ndarray::ArrayView1<'_, f64>| {
        a.iter().zip(b.iter()).map(|(p, q)| (p - q) * (p - q)).sum::<f64>().sqrt()
    };

    let mut centroids = Matrix::zeros((n_labels, x.ncols()));
    let mut scatter = Vec::with_capacity(n_labels);
    for (k, indices) in members.values().enumerate() {
        let cluster = x.select(Axis(0), indices);
        let centroid = cluster
            .mean_axis(Axis(0))
            .ok_or_else(|| EvalError::Numerical("empty cluster".to_string()))?;
        let spread = cluster
            .rows()
            .into_iter()
            .map(|row| euclidean(row, centroid.view()))
            .sum::<f64>()
            / indices.len() as f64;
        centroids.row_mut(k).assign(&centroid);
        scatter.push(spread);
    }

    let mut separation = Matrix::zeros((n_labels, n_labels));
    for i in 0..n_labels {
        for j in 0..n_labels {
            separation[[i, j]] = euclidean(centroids.row(i), centroids.row(j));
        }
    }

    if scatter.iter().all(|s| s.abs() < 1e-12) || separation.iter().all(|d| d.abs() < 1e-12) {
        return Ok(0.0);
    }

    let mut total = 0.0;
    for i in 0..n_labels {
        let worst = (0..n_labels)
            .filter(|&j| j != i && separation[[i, j]] > 0.0)
            .map(|j| (scatter[i] + scatter[j]) / separation[[i, j]])
            .fold(0.0, f64::max);
        total += worst;
    }
    Ok(total / n_labels as f64)
}

/// Rows are true classes, columns predicted clusters, both in sorted order.
fn contingency(y_true: &[usize], y_pred: &[usize]) -> Array2<f64> {
    let index = |values: &[usize]| -> BTreeMap<usize, usize> {
        let mut distinct: Vec<usize> = values.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        distinct.into_iter().enumerate().map(|(i, v)| (v, i)).collect()
    };
    let rows = index(y_true);
    let cols = index(y_pred);

    let mut table = Array2::zeros((rows.len(), cols.len()));
    for (t, p) in y_true.iter().zip(y_pred) {
        table[[rows[t], cols[p]]] += 1.0;
    }
    table
}

/// Accuracy under the best one-to-one mapping of clusters onto classes.
pub fn clustering_accuracy_score(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len())?;

    let table = contingency(y_true, y_pred);
    let size = table.nrows().max(table.ncols());
    let max_count = table.iter().copied().fold(0.0, f64::max);

    let mut cost = Array2::from_elem((size, size), max_count);
    for ((i, j), &count) in table.indexed_iter() {
        cost[[i, j]] = max_count - count;
    }

    let assignment = hungarian(&cost);
    let matched: f64 = assignment
        .iter()
        .enumerate()
        .filter(|&(i, &j)| i < table.nrows() && j < table.ncols())
        .map(|(i, &j)| table[[i, j]])
        .sum();
    Ok(matched / y_true.len() as f64)
}

/// Minimum cost assignment on a square matrix; entry `i` is the column given
/// to row `i`.
fn hungarian(cost: &Array2<f64>) -> Vec<usize> {
    let n = cost.nrows();
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; n + 1];
    let mut p = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=n {
                if !used[j] {
                    let cur = cost[[i0 - 1, j - 1]] - u[i0] - v[j];
                    if cur < minv[j] {
                        minv[j] = cur;
                        way[j] = j0;
                    }
                    if minv[j] < delta {
                        delta = minv[j];
                        j1 = j;
                    }
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0; n];
    for j in 1..=n {
        if p[j] != 0 {
            assignment[p[j] - 1] = j - 1;
        }
    }
    assignment
}

fn comb2(n: f64) -> f64 {
    n * (n - 1.0) / 2.0
}

struct PairCounts {
    joint: f64,
    rows: f64,
    cols: f64,
    total: f64,
}

fn pair_counts(y_true: &[usize], y_pred: &[usize]) -> PairCounts {
    let table = contingency(y_true, y_pred);
    PairCounts {
        joint: table.iter().map(|&n| comb2(n)).sum(),
        rows: table.sum_axis(Axis(1)).iter().map(|&n| comb2(n)).sum(),
        cols: table.sum_axis(Axis(0)).iter().map(|&n| comb2(n)).sum(),
        total: comb2(y_true.len() as f64),
    }
}

/// Fraction of case pairs on which the two labellings agree.
pub fn rand_score(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    let counts = pair_counts(y_true, y_pred);
    if counts.total == 0.0 {
        return Ok(1.0);
    }
    Ok((counts.total + 2.0 * counts.joint - counts.rows - counts.cols) / counts.total)
}

pub fn adjusted_rand_score(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    check_lengths(y_true.len(), y_pred.len())?;
    let counts = pair_counts(y_true, y_pred);
    if counts.total == 0.0 {
        return Ok(1.0);
    }

    let expected = counts.rows * counts.cols / counts.total;
    let max_index = (counts.rows + counts.cols) / 2.0;
    if (max_index - expected).abs() < f64::EPSILON {
        return Ok(1.0);
    }
    Ok((counts.joint - expected) / (max_index - expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mean_squared_error() {
        let y_true = array![1.0, 2.0, 3.0];
        let y_pred = array![1.0, 2.0, 5.0];

        let mse = mean_squared_error(&y_true, &y_pred).unwrap();
        assert!((mse - 4.0 / 3.0).abs() < 1e-10);
        assert!(mean_squared_error(&y_true, &array![1.0]).is_err());
    }

    #[test]
    fn test_mean_absolute_error() {
        let mae = mean_absolute_error(&array![1.0, 2.0], &array![2.0, 0.0]).unwrap();
        assert!((mae - 1.5).abs() < 1e-10);
    }

    #[test]
    fn test_r2_score() {
        let y_true = array![1.0, 2.0, 3.0, 4.0];
        let y_pred = array![1.0, 2.0, 3.0, 4.0];

        let r2 = r2_score(&y_true, &y_pred).unwrap();
        assert!((r2 - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_davies_bouldin_score() {
        let x = array![[0.0, 0.0], [0.0, 2.0], [10.0, 0.0], [10.0, 2.0]];
        // Scatter 1.0 in both clusters, centroids 10 apart.
        let score = davies_bouldin_score(&x, &[0, 0, 1, 1]).unwrap();
        assert!((score - 0.2).abs() < 1e-10);

        let mixed = davies_bouldin_score(&x, &[0, 1, 0, 1]).unwrap();
        assert!(mixed > score);
    }

    #[test]
    fn test_davies_bouldin_label_count() {
        let x = array![[0.0], [1.0], [2.0]];
        assert!(davies_bouldin_score(&x, &[0, 0, 0]).is_err());
        assert!(davies_bouldin_score(&x, &[0, 1, 2]).is_err());
        assert_eq!(davies_bouldin_score(&array![[1.0], [1.0], [1.0]], &[0, 0, 1]).unwrap(), 0.0);
    }

    #[test]
    fn test_clustering_accuracy_permuted_labels() {
        let y_true = [0, 0, 1, 1, 2, 2];
        let y_pred = [2, 2, 0, 0, 1, 1];
        assert!((clustering_accuracy_score(&y_true, &y_pred).unwrap() - 1.0).abs() < 1e-10);

        let y_pred = [1, 1, 1, 0, 0, 0];
        assert!((clustering_accuracy_score(&y_true, &y_pred).unwrap() - 4.0 / 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_clustering_accuracy_more_clusters_than_classes() {
        let y_true = [0, 0, 1, 1];
        let y_pred = [0, 1, 2, 2];
        assert!((clustering_accuracy_score(&y_true, &y_pred).unwrap() - 0.75).abs() < 1e-10);
    }

    #[test]
    fn test_rand_scores() {
        let y_true = [0, 0, 1, 1];
        assert!((adjusted_rand_score(&y_true, &[1, 1, 0, 0]).unwrap() - 1.0).abs() < 1e-10);
        assert!((rand_score(&y_true, &[1, 1, 0, 0]).unwrap() - 1.0).abs() < 1e-10);

        // Reference values from a standard implementation.
        let ari = adjusted_rand_score(&[0, 0, 1, 2], &[0, 0, 1, 1]).unwrap();
        assert!((ari - 0.5714285714285714).abs() < 1e-10);
        let ri = rand_score(&[0, 0, 1, 1], &[0, 0, 1, 2]).unwrap();
        assert!((ri - 0.8333333333333334).abs() < 1e-10);
    }
}
