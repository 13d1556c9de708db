//! Tabular linear regressors used behind the time series adapter.
//!
//! - `LinearRegression`: ordinary least squares
//! - `Ridge`: least squares with an L2 penalty
//!
//! # Examples
//!
//! ```rust
//! use tsml_eval::linear_model::Ridge;
//! use tsml_eval::regression::TabularRegressor;
//! use ndarray::array;
//!
//! let x = array![[1.0], [2.0], [3.0]];
//! let y = array![2.0, 4.0, 6.0];
//!
//! let mut model = Ridge::new().alpha(0.1);
//! model.fit(&x, &y).unwrap();
//! let predictions = model.predict(&x).unwrap();
//! assert_eq!(predictions.len(), 3);
//! ```

mod linear_regression;
mod ridge;

pub use linear_regression::LinearRegression;
pub use ridge::Ridge;

use ndarray::Axis;

use crate::{EvalError, Matrix, Result, Vector};

pub(crate) fn check_fit_shapes(x: &Matrix, y: &Vector) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(EvalError::DimensionMismatch {
            expected: x.nrows(),
            got: y.len(),
        });
    }
    if x.nrows() == 0 {
        return Err(EvalError::InvalidInput("X must have at least one sample".to_string()));
    }
    Ok(())
}

pub(crate) fn linear_predict(x: &Matrix, coefficients: &Vector, intercept: f64) -> Result<Vector> {
    if x.ncols() != coefficients.len() {
        return Err(EvalError::DimensionMismatch {
            expected: coefficients.len(),
            got: x.ncols(),
        });
    }
    Ok(x.dot(coefficients) + intercept)
}

/// Column means of `x`, the centred copy and the mean of `y`.
pub(crate) fn center(x: &Matrix, y: &Vector) -> Result<(Matrix, Vector, Vector, f64)> {
    let y_mean = y
        .mean()
        .ok_or_else(|| EvalError::InvalidInput("y must not be empty".to_string()))?;
    let x_means = x
        .mean_axis(Axis(0))
        .ok_or_else(|| EvalError::InvalidInput("X must not be empty".to_string()))?;

    let mut x_centered = x.clone();
    for mut row in x_centered.axis_iter_mut(Axis(0)) {
        row -= &x_means;
    }
    let y_centered = y - y_mean;
    Ok((x_centered, y_centered, x_means, y_mean))
}

/// Gaussian elimination with partial pivoting.
pub(crate) fn solve_linear_system(a: &Matrix, b: &Vector) -> Result<Vector> {
    let n = a.nrows();
    let mut aug = Matrix::zeros((n, n + 1));
    aug.slice_mut(ndarray::s![.., ..n]).assign(a);
    aug.column_mut(n).assign(b);

    for i in 0..n {
        let max_row = (i..n)
            .max_by(|&p, &q| aug[(p, i)].abs().total_cmp(&aug[(q, i)].abs()))
            .unwrap_or(i);

        if aug[(max_row, i)].abs() < 1e-10 {
            return Err(EvalError::Numerical("Matrix is singular or nearly singular".to_string()));
        }

        if max_row != i {
            for j in 0..=n {
                aug.swap((i, j), (max_row, j));
            }
        }

        for k in (i + 1)..n {
            let factor = aug[(k, i)] / aug[(i, i)];
            for j in i..=n {
                aug[(k, j)] -= factor * aug[(i, j)];
            }
        }
    }

    let mut x = Vector::zeros(n);
    for i in (0..n).rev() {
        x[i] = aug[(i, n)];
        for j in (i + 1)..n {
            x[i] -= aug[(i, j)] * x[j];
        }
        x[i] /= aug[(i, i)];
    }

    Ok(x)
}
