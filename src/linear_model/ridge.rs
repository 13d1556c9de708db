use ndarray::Axis;
use serde::Serialize;

use super::{center, check_fit_shapes, linear_predict, solve_linear_system};
use crate::regression::TabularRegressor;
use crate::{EvalError, Matrix, Result, Vector};

#[derive(Clone, Debug, Serialize)]
struct RidgeParams {
    alpha: f64,
    fit_intercept: bool,
    normalize: bool,
}

#[derive(Clone, Debug)]
pub struct Ridge {
    pub coefficients: Option<Vector>,
    pub intercept: Option<f64>,
    params: RidgeParams,
}

impl Ridge {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            params: RidgeParams {
                alpha: 1.0,
                fit_intercept: true,
                normalize: false,
            },
        }
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        if alpha < 0.0 {
            panic!("alpha must be non-negative, got {}", alpha);
        }
        self.params.alpha = alpha;
        self
    }

    pub fn fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.params.fit_intercept = fit_intercept;
        self
    }

    pub fn normalize(mut self, normalize: bool) -> Self {
        self.params.normalize = normalize;
        self
    }

    pub fn score(&self, x: &Matrix, y: &Vector) -> Result<f64> {
        let y_pred = self.predict(x)?;
        crate::metrics::r2_score(y, &y_pred)
    }

    /// Solves on optionally scaled columns and maps the coefficients back.
    fn solve_scaled(&self, x: Matrix, y: &Vector) -> Result<Vector> {
        if !self.params.normalize {
            return self.solve_ridge_equation(&x, y);
        }

        let (x_normalized, x_scales) = normalize_features(x);
        let coeffs_scaled = self.solve_ridge_equation(&x_normalized, y)?;
        Ok(&coeffs_scaled / &x_scales)
    }

    fn solve_ridge_equation(&self, x: &Matrix, y: &Vector) -> Result<Vector> {
        let xt = x.t();
        let mut regularized_xtx = xt.dot(x);
        regularized_xtx.diag_mut().mapv_inplace(|d| d + self.params.alpha);

        solve_linear_system(&regularized_xtx, &xt.dot(y))
    }
}

/// Divides each column by its standard deviation; constant columns keep a scale of 1.
fn normalize_features(mut x: Matrix) -> (Matrix, Vector) {
    let x_std = x
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s > 1e-10 { s } else { 1.0 });
    for (mut col, &std) in x.axis_iter_mut(Axis(1)).zip(x_std.iter()) {
        col /= std;
    }
    (x, x_std)
}

impl Default for Ridge {
    fn default() -> Self {
        Self::new()
    }
}

impl TabularRegressor for Ridge {
    fn name(&self) -> &'static str {
        "Ridge"
    }

    fn fit(&mut self, x: &Matrix, y: &Vector) -> Result<()> {
        check_fit_shapes(x, y)?;

        let (coeffs, intercept) = if self.params.fit_intercept {
            let (x_centered, y_centered, x_means, y_mean) = center(x, y)?;
            let coeffs = self.solve_scaled(x_centered, &y_centered)?;
            let intercept = y_mean - coeffs.dot(&x_means);
            (coeffs, intercept)
        } else {
            (self.solve_scaled(x.clone(), y)?, 0.0)
        };

        self.coefficients = Some(coeffs);
        self.intercept = Some(intercept);
        Ok(())
    }

    fn predict(&self, x: &Matrix) -> Result<Vector> {
        let coeffs = self.coefficients.as_ref().ok_or(EvalError::NotFitted("Model"))?;
        linear_predict(x, coeffs, self.intercept.unwrap_or(0.0))
    }

    fn parameter_info(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.params)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_unpenalised_fit_is_exact() {
        let x = array![[0.0], [1.5], [3.0], [4.5]];
        let y = array![1.0, 4.0, 7.0, 10.0];

        let mut model = Ridge::new().alpha(0.0);
        model.fit(&x, &y).unwrap();

        let fitted = model.predict(&x).unwrap();
        assert!(fitted.iter().zip(y.iter()).all(|(p, t)| (p - t).abs() < 1e-10));
    }

    #[test]
    fn test_penalty_halves_slope() {
        // Centred sxx = 11.25 and sxy = 22.5, slope = 22.5 / (11.25 + alpha).
        let x = array![[0.0], [1.5], [3.0], [4.5]];
        let y = array![1.0, 4.0, 7.0, 10.0];

        let mut model = Ridge::new().alpha(11.25);
        model.fit(&x, &y).unwrap();

        let coeffs = model.coefficients.as_ref().unwrap();
        assert!((coeffs[0] - 1.0).abs() < 1e-10);
        assert!((model.intercept.unwrap() - 3.25).abs() < 1e-10);
    }

    #[test]
    fn test_no_intercept_passes_through_origin() {
        let x = array![[0.5], [1.0], [1.5], [2.0]];
        let y = array![1.5, 3.0, 4.5, 6.0];

        let mut model = Ridge::new().alpha(0.1).fit_intercept(false);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.intercept, Some(0.0));
        // 22.5 / (7.5 + 0.1)
        let slope = model.coefficients.as_ref().unwrap()[0];
        assert!((slope - 22.5 / 7.6).abs() < 1e-10);
    }

    #[test]
    fn test_flattened_series_rows() {
        let x = array![
            [1.0, 0.0, 2.0],
            [2.0, 1.0, 0.0],
            [0.0, 2.0, 1.0],
            [3.0, 3.0, 3.0],
            [1.0, 1.0, 0.0]
        ];
        let y = x.dot(&array![1.0, -1.0, 0.5]) + 2.0;

        let mut model = Ridge::new().alpha(1e-6);
        model.fit(&x, &y).unwrap();
        assert!(model.score(&x, &y).unwrap() > 0.999);
    }

    #[test]
    fn test_normalize_handles_mixed_scales() {
        let x = array![[1.0, 100.0], [2.0, 250.0], [3.0, 280.0], [4.0, 410.0]];
        let y = array![5.0, 8.0, 11.0, 14.0];

        let mut model = Ridge::new().alpha(1.0).normalize(true);
        model.fit(&x, &y).unwrap();
        assert!(model.score(&x, &y).unwrap() > 0.5);
    }

    #[test]
    #[should_panic(expected = "alpha must be non-negative")]
    fn test_negative_alpha_panics() {
        let _ = Ridge::new().alpha(-0.5);
    }

    #[test]
    fn test_unfitted_and_mismatched_inputs() {
        let model = Ridge::new();
        assert!(matches!(model.predict(&array![[1.0]]), Err(EvalError::NotFitted(_))));

        let mut model = Ridge::new();
        assert!(model.fit(&array![[1.0], [2.0]], &array![1.0]).is_err());

        model.fit(&array![[1.0], [2.0]], &array![1.0, 2.0]).unwrap();
        assert!(model.predict(&array![[1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_parameter_info() {
        let info = Ridge::new().alpha(0.5).parameter_info().unwrap();
        assert_eq!(info, r#"{"alpha":0.5,"fit_intercept":true,"normalize":false}"#);
    }
}
