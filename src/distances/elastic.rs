//! Elastic distances computed by dynamic programming over a banded cost matrix.
//!
//! Each distance also exposes its alignment path, recovered by walking its own
//! cost matrix back from the final cell.

use ndarray::{s, Array2, ArrayView1, ArrayView2};

use super::pointwise::{point_euclidean, point_squared};
use super::Band;

/// Dynamic time warping with squared pointwise cost.
pub fn dtw_distance(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>, window: f64) -> f64 {
    dtw_cost_matrix(x, y, window, |i, j| point_squared(x, i, y, j))[[x.ncols(), y.ncols()]]
}

/// Weighted DTW: the pointwise cost is scaled by a logistic weight on the
/// phase difference `|i - j|`, with steepness `g`.
pub fn wdtw_distance(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>, window: f64, g: f64) -> f64 {
    wdtw_cost_matrix(x, y, window, g)[[x.ncols(), y.ncols()]]
}

fn wdtw_cost_matrix(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    g: f64,
) -> Array2<f64> {
    let max_len = x.ncols().max(y.ncols());
    let half = max_len as f64 / 2.0;
    let weights: Vec<f64> = (0..max_len)
        .map(|k| 1.0 / (1.0 + (-g * (k as f64 - half)).exp()))
        .collect();

    dtw_cost_matrix(x, y, window, |i, j| weights[i.abs_diff(j)] * point_squared(x, i, y, j))
}

fn dtw_cost_matrix(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    pointwise: impl Fn(usize, usize) -> f64,
) -> Array2<f64> {
    let (n, m) = (x.ncols(), y.ncols());
    let band = Band::sakoe_chiba(n, m, window);
    let mut cost = Array2::from_elem((n + 1, m + 1), f64::INFINITY);
    cost[[0, 0]] = 0.0;

    for i in 0..n {
        for j in band.columns(i) {
            let best = cost[[i, j]].min(cost[[i, j + 1]]).min(cost[[i + 1, j]]);
            cost[[i + 1, j + 1]] = pointwise(i, j) + best;
        }
    }
    cost
}

/// Cheapest monotone path from the last cell of `cost` back to `(0, 0)`.
/// Ties prefer the diagonal, then the row above.
fn min_cost_path(cost: ArrayView2<'_, f64>) -> Vec<(usize, usize)> {
    let (mut i, mut j) = (cost.nrows() - 1, cost.ncols() - 1);
    let mut path = vec![(i, j)];
    while (i, j) != (0, 0) {
        if i == 0 {
            j -= 1;
        } else if j == 0 {
            i -= 1;
        } else {
            let diag = cost[[i - 1, j - 1]];
            let up = cost[[i - 1, j]];
            let left = cost[[i, j - 1]];
            if diag <= up && diag <= left {
                i -= 1;
                j -= 1;
            } else if up <= left {
                i -= 1;
            } else {
                j -= 1;
            }
        }
        path.push((i, j));
    }
    path.reverse();
    path
}

/// Drops the leading row and column of a `(n + 1, m + 1)` cost matrix.
fn inner(cost: &Array2<f64>) -> ArrayView2<'_, f64> {
    cost.slice(s![1.., 1..])
}

/// Warping path of the DTW alignment between `x` and `y`, from `(0, 0)` to
/// `(n - 1, m - 1)`.
pub fn dtw_alignment_path(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
) -> Vec<(usize, usize)> {
    let cost = dtw_cost_matrix(x, y, window, |i, j| point_squared(x, i, y, j));
    min_cost_path(inner(&cost))
}

pub fn wdtw_alignment_path(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    g: f64,
) -> Vec<(usize, usize)> {
    min_cost_path(inner(&wdtw_cost_matrix(x, y, window, g)))
}

/// Edit distance with real penalty; gaps are charged their distance to `g`.
pub fn erp_distance(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>, window: f64, g: f64) -> f64 {
    erp_cost_matrix(x, y, window, g)[[x.ncols(), y.ncols()]]
}

pub fn erp_alignment_path(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    g: f64,
) -> Vec<(usize, usize)> {
    min_cost_path(inner(&erp_cost_matrix(x, y, window, g)))
}

fn erp_cost_matrix(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    g: f64,
) -> Array2<f64> {
    let (n, m) = (x.ncols(), y.ncols());
    let band = Band::sakoe_chiba(n, m, window);
    let gap = |series: ArrayView2<'_, f64>, t: usize| gap_cost(series.column(t), g);

    let mut cost = Array2::from_elem((n + 1, m + 1), f64::INFINITY);
    cost[[0, 0]] = 0.0;
    for i in 0..n {
        cost[[i + 1, 0]] = cost[[i, 0]] + gap(x, i);
    }
    for j in 0..m {
        cost[[0, j + 1]] = cost[[0, j]] + gap(y, j);
    }

    for i in 0..n {
        for j in band.columns(i) {
            let matched = cost[[i, j]] + point_euclidean(x, i, y, j);
            let x_gap = cost[[i, j + 1]] + gap(x, i);
            let y_gap = cost[[i + 1, j]] + gap(y, j);
            cost[[i + 1, j + 1]] = matched.min(x_gap).min(y_gap);
        }
    }
    cost
}

fn gap_cost(point: ArrayView1<'_, f64>, g: f64) -> f64 {
    point.iter().map(|v| (v - g) * (v - g)).sum::<f64>().sqrt()
}

/// Edit distance on real sequences, normalised by the longer length.
///
/// Without an explicit threshold, `epsilon` is a quarter of the largest
/// standard deviation of the two series.
pub fn edr_distance(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    epsilon: Option<f64>,
) -> f64 {
    let (n, m) = (x.ncols(), y.ncols());
    edr_cost_matrix(x, y, window, epsilon)[[n, m]] / n.max(m) as f64
}

pub fn edr_alignment_path(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    epsilon: Option<f64>,
) -> Vec<(usize, usize)> {
    min_cost_path(inner(&edr_cost_matrix(x, y, window, epsilon)))
}

fn edr_cost_matrix(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    epsilon: Option<f64>,
) -> Array2<f64> {
    let (n, m) = (x.ncols(), y.ncols());
    let epsilon = epsilon.unwrap_or_else(|| {
        let spread = |s: ArrayView2<'_, f64>| {
            s.iter().copied().collect::<ndarray::Array1<f64>>().std(0.0)
        };
        spread(x).max(spread(y)) / 4.0
    });
    let band = Band::sakoe_chiba(n, m, window);

    let mut cost = Array2::from_elem((n + 1, m + 1), f64::INFINITY);
    cost[[0, 0]] = 0.0;
    for i in 0..n {
        for j in band.columns(i) {
            let substitution = if point_euclidean(x, i, y, j) < epsilon { 0.0 } else { 1.0 };
            cost[[i + 1, j + 1]] = (cost[[i, j]] + substitution)
                .min(cost[[i, j + 1]] + 1.0)
                .min(cost[[i + 1, j]] + 1.0);
        }
    }
    cost
}

/// One minus the normalised longest common subsequence, where two points match
/// when they are within `epsilon` of each other.
pub fn lcss_distance(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    epsilon: f64,
) -> f64 {
    let (n, m) = (x.ncols(), y.ncols());
    1.0 - lcss_lengths(x, y, window, epsilon)[[n, m]] / n.min(m) as f64
}

/// Matched pairs of the longest common subsequence, in time order.
pub fn lcss_alignment_path(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    epsilon: f64,
) -> Vec<(usize, usize)> {
    let (n, m) = (x.ncols(), y.ncols());
    let band = Band::sakoe_chiba(n, m, window);
    let lengths = lcss_lengths(x, y, window, epsilon);

    let mut path = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if band.contains(i - 1, j - 1) && point_euclidean(x, i - 1, y, j - 1) <= epsilon {
            path.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if lengths[[i - 1, j]] > lengths[[i, j - 1]] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    path.reverse();
    path
}

fn lcss_lengths(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    epsilon: f64,
) -> Array2<f64> {
    let (n, m) = (x.ncols(), y.ncols());
    let band = Band::sakoe_chiba(n, m, window);

    let mut lengths = Array2::<f64>::zeros((n + 1, m + 1));
    for i in 0..n {
        for j in band.columns(i) {
            lengths[[i + 1, j + 1]] = if point_euclidean(x, i, y, j) <= epsilon {
                lengths[[i, j]] + 1.0
            } else {
                lengths[[i, j + 1]].max(lengths[[i + 1, j]])
            };
        }
    }
    lengths
}

/// Move-split-merge, applied to each channel independently and summed.
pub fn msm_distance(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>, window: f64, c: f64) -> f64 {
    msm_cost_matrix(x, y, window, c)[[x.ncols() - 1, y.ncols() - 1]]
}

/// Path through the channel-summed MSM cost matrix.
pub fn msm_alignment_path(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    c: f64,
) -> Vec<(usize, usize)> {
    min_cost_path(msm_cost_matrix(x, y, window, c).view())
}

fn msm_cost_matrix(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    c: f64,
) -> Array2<f64> {
    let band = Band::sakoe_chiba(x.ncols(), y.ncols(), window);
    let mut total = Array2::zeros((x.ncols(), y.ncols()));
    for (xc, yc) in x.rows().into_iter().zip(y.rows()) {
        total += &univariate_msm(xc, yc, &band, c);
    }
    total
}

fn univariate_msm(
    x: ArrayView1<'_, f64>,
    y: ArrayView1<'_, f64>,
    band: &Band,
    c: f64,
) -> Array2<f64> {
    let (n, m) = (x.len(), y.len());
    let mut cost = Array2::from_elem((n, m), f64::INFINITY);
    cost[[0, 0]] = (x[0] - y[0]).abs();

    for i in 1..n {
        if band.contains(i, 0) {
            cost[[i, 0]] = cost[[i - 1, 0]] + split_merge_cost(x[i], x[i - 1], y[0], c);
        }
    }
    for j in 1..m {
        if band.contains(0, j) {
            cost[[0, j]] = cost[[0, j - 1]] + split_merge_cost(y[j], x[0], y[j - 1], c);
        }
    }

    for i in 1..n {
        for j in band.columns(i) {
            if j == 0 {
                continue;
            }
            let moved = cost[[i - 1, j - 1]] + (x[i] - y[j]).abs();
            let split = cost[[i - 1, j]] + split_merge_cost(x[i], x[i - 1], y[j], c);
            let merged = cost[[i, j - 1]] + split_merge_cost(y[j], x[i], y[j - 1], c);
            cost[[i, j]] = moved.min(split).min(merged);
        }
    }
    cost
}

fn split_merge_cost(new_point: f64, x: f64, y: f64, c: f64) -> f64 {
    if (x <= new_point && new_point <= y) || (y <= new_point && new_point <= x) {
        c
    } else {
        c + (new_point - x).abs().min((new_point - y).abs())
    }
}

/// Time warp edit distance. Both series are prefixed with a zero point so the
/// first real point has a predecessor.
pub fn twe_distance(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    nu: f64,
    lmbda: f64,
) -> f64 {
    twe_cost_matrix(x, y, window, nu, lmbda)[[x.ncols(), y.ncols()]]
}

pub fn twe_alignment_path(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    nu: f64,
    lmbda: f64,
) -> Vec<(usize, usize)> {
    min_cost_path(inner(&twe_cost_matrix(x, y, window, nu, lmbda)))
}

fn twe_cost_matrix(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    window: f64,
    nu: f64,
    lmbda: f64,
) -> Array2<f64> {
    let (n, m) = (x.ncols(), y.ncols());
    let band = Band::sakoe_chiba(n, m, window);
    let x = pad_with_zero(x);
    let y = pad_with_zero(y);
    let (x, y) = (x.view(), y.view());
    let delete_x = |i: usize| point_euclidean(x, i - 1, x, i) + nu + lmbda;
    let delete_y = |j: usize| point_euclidean(y, j - 1, y, j) + nu + lmbda;

    let mut cost = Array2::from_elem((n + 1, m + 1), f64::INFINITY);
    cost[[0, 0]] = 0.0;
    for i in 1..=n {
        for j in band.columns(i - 1).map(|j| j + 1) {
            let deleted_x = cost[[i - 1, j]] + delete_x(i);
            let deleted_y = cost[[i, j - 1]] + delete_y(j);
            let matched = cost[[i - 1, j - 1]]
                + point_euclidean(x, i, y, j)
                + point_euclidean(x, i - 1, y, j - 1)
                + nu * 2.0 * i.abs_diff(j) as f64;
            cost[[i, j]] = deleted_x.min(deleted_y).min(matched);
        }
    }
    cost
}

fn pad_with_zero(x: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut padded = Array2::zeros((x.nrows(), x.ncols() + 1));
    padded.slice_mut(s![.., 1..]).assign(&x);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn is_monotone(path: &[(usize, usize)]) -> bool {
        path.windows(2).all(|pair| {
            let (di, dj) = (pair[1].0 - pair[0].0, pair[1].1 - pair[0].1);
            di <= 1 && dj <= 1 && di + dj > 0
        })
    }

    #[test]
    fn test_dtw_identical_and_shifted() {
        let x = array![[1.0, 2.0, 3.0, 4.0]];
        let y = array![[1.0, 1.0, 2.0, 3.0, 4.0]];
        assert_eq!(dtw_distance(x.view(), x.view(), 1.0), 0.0);
        assert_eq!(dtw_distance(x.view(), y.view(), 1.0), 0.0);
    }

    #[test]
    fn test_dtw_zero_window_matches_squared() {
        let x = array![[0.0, 1.0, 2.0, 1.0]];
        let y = array![[1.0, 2.0, 1.0, 0.0]];
        let squared = crate::distances::squared_distance(x.view(), y.view());
        assert!((dtw_distance(x.view(), y.view(), 0.0) - squared).abs() < 1e-10);
        assert!(dtw_distance(x.view(), y.view(), 1.0) < squared);
    }

    #[test]
    fn test_wdtw_reference_values() {
        let x = array![[0.0, 1.0, 2.0]];
        let y = array![[1.0, 2.0, 3.0]];
        // DTW is 2 via (0,0) (1,0) (2,1) (2,2); with g = 0 every weight is 0.5.
        assert!((dtw_distance(x.view(), y.view(), 1.0) - 2.0).abs() < 1e-10);
        assert!((wdtw_distance(x.view(), y.view(), 1.0, 0.0) - 1.0).abs() < 1e-10);

        // Only the two zero-lag cells cost anything: 2 / (1 + e^0.075).
        let expected = 2.0 / (1.0 + 0.075_f64.exp());
        assert!((wdtw_distance(x.view(), y.view(), 1.0, 0.05) - expected).abs() < 1e-10);
        assert!((expected - 0.9625175682429296).abs() < 1e-12);
    }

    #[test]
    fn test_alignment_path_endpoints() {
        let x = array![[0.0, 1.0, 2.0]];
        let y = array![[0.0, 0.0, 1.0, 2.0, 2.0]];
        let path = dtw_alignment_path(x.view(), y.view(), 1.0);

        assert_eq!(path, vec![(0, 0), (0, 1), (1, 2), (2, 3), (2, 4)]);
        assert!(is_monotone(&path));
    }

    #[test]
    fn test_erp_gap_penalty() {
        let x = array![[1.0, 2.0]];
        let y = array![[1.0, 2.0, 0.0]];
        // Best alignment deletes the trailing zero against a gap of value 0.
        assert!(erp_distance(x.view(), y.view(), 1.0, 0.0).abs() < 1e-10);
        assert!((erp_distance(x.view(), y.view(), 1.0, 1.0) - 1.0).abs() < 1e-10);

        // Gap against the extra 3 costs |3 - 0.5|.
        let z = array![[1.0, 2.0, 3.0]];
        assert!((erp_distance(x.view(), z.view(), 1.0, 0.5) - 2.5).abs() < 1e-10);
        let path = erp_alignment_path(x.view(), z.view(), 1.0, 0.5);
        assert_eq!(path, vec![(0, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_edr_and_lcss_bounds() {
        let x = array![[0.0, 1.0, 2.0, 3.0]];
        let y = array![[10.0, 11.0, 12.0, 13.0]];
        assert_eq!(edr_distance(x.view(), x.view(), 1.0, Some(0.1)), 0.0);
        assert_eq!(edr_distance(x.view(), y.view(), 1.0, Some(0.1)), 1.0);
        assert_eq!(lcss_distance(x.view(), x.view(), 1.0, 0.1), 0.0);
        assert_eq!(lcss_distance(x.view(), y.view(), 1.0, 0.1), 1.0);
    }

    #[test]
    fn test_lcss_path_holds_matches_only() {
        let x = array![[0.0, 5.0, 1.0, 2.0]];
        let y = array![[0.0, 1.0, 2.0]];
        let path = lcss_alignment_path(x.view(), y.view(), 1.0, 0.1);
        assert_eq!(path, vec![(0, 0), (2, 1), (3, 2)]);
        assert!(lcss_alignment_path(x.view(), array![[9.0]].view(), 1.0, 0.1).is_empty());
    }

    #[test]
    fn test_msm_move_and_split() {
        let x = array![[1.0, 2.0]];
        assert_eq!(msm_distance(x.view(), x.view(), 1.0, 1.0), 0.0);

        let y = array![[1.0, 2.0, 2.0]];
        // Repeating the final point is a single split costing c.
        assert!((msm_distance(x.view(), y.view(), 1.0, 0.5) - 0.5).abs() < 1e-10);
        let path = msm_alignment_path(x.view(), y.view(), 1.0, 0.5);
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(1, 2)));
        assert!(is_monotone(&path));
    }

    #[test]
    fn test_twe_reference_values() {
        let x = array![[1.0, 3.0, 2.0], [0.0, 1.0, 0.0]];
        assert!(twe_distance(x.view(), x.view(), 1.0, 0.001, 1.0).abs() < 1e-10);

        // Matching 1-1 is free, matching 2-3 costs |2 - 3| and the stiffness
        // term vanishes on the diagonal.
        let a = array![[1.0, 2.0]];
        let b = array![[1.0, 3.0]];
        assert!((twe_distance(a.view(), b.view(), 1.0, 0.5, 1.0) - 1.0).abs() < 1e-10);

        // Deleting the trailing 2 costs |2 - 1| + nu + lmbda.
        let c = array![[1.0]];
        assert!((twe_distance(a.view(), c.view(), 1.0, 0.5, 1.0) - 2.5).abs() < 1e-10);
        let path = twe_alignment_path(a.view(), c.view(), 1.0, 0.5, 1.0);
        assert_eq!(path, vec![(0, 0), (1, 0)]);
    }
}
