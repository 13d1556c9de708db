use ndarray::ArrayView2;

/// Sum of squared differences over all channels. Series of different lengths
/// are compared over the shorter length.
pub fn squared_distance(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> f64 {
    let length = x.ncols().min(y.ncols());
    let mut total = 0.0;
    for (xc, yc) in x.rows().into_iter().zip(y.rows()) {
        for t in 0..length {
            let diff = xc[t] - yc[t];
            total += diff * diff;
        }
    }
    total
}

pub fn euclidean_distance(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> f64 {
    squared_distance(x, y).sqrt()
}

/// Squared difference between time point `i` of `x` and `j` of `y` across channels.
pub(crate) fn point_squared(
    x: ArrayView2<'_, f64>,
    i: usize,
    y: ArrayView2<'_, f64>,
    j: usize,
) -> f64 {
    x.column(i)
        .iter()
        .zip(y.column(j).iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

pub(crate) fn point_euclidean(
    x: ArrayView2<'_, f64>,
    i: usize,
    y: ArrayView2<'_, f64>,
    j: usize,
) -> f64 {
    point_squared(x, i, y, j).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_euclidean_distance() {
        let x = array![[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]];
        let y = array![[11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0, 18.0, 19.0, 20.0]];
        assert!((euclidean_distance(x.view(), y.view()) - 31.622776601683793).abs() < 1e-10);
    }

    #[test]
    fn test_squared_distance_multivariate_unequal() {
        let x = array![[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]];
        let y = array![[2.0, 2.0], [1.0, 1.0]];
        assert_eq!(squared_distance(x.view(), y.view()), 3.0);
    }
}
