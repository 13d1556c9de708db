use serde::Serialize;
use tracing::debug;

use super::{center, check_fit_shapes, linear_predict, solve_linear_system};
use crate::regression::TabularRegressor;
use crate::{EvalError, Matrix, Result, Vector};

#[derive(Clone, Debug)]
pub struct LinearRegression {
    pub coefficients: Option<Vector>,
    pub intercept: Option<f64>,
    fit_intercept: bool,
}

#[derive(Serialize)]
struct LinearRegressionParams {
    fit_intercept: bool,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::with_intercept(true)
    }

    pub fn with_intercept(fit_intercept: bool) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept,
        }
    }

    pub fn score(&self, x: &Matrix, y: &Vector) -> Result<f64> {
        let y_pred = self.predict(x)?;
        crate::metrics::r2_score(y, &y_pred)
    }

    /// Normal equations, or gradient descent when `XᵀX` is singular
    /// (collinear columns, more timepoints than cases).
    fn solve(&self, x: &Matrix, y: &Vector) -> Result<Vector> {
        let xt = x.t();
        match solve_linear_system(&xt.dot(x), &xt.dot(y)) {
            Ok(coeffs) => Ok(coeffs),
            Err(EvalError::Numerical(_)) => {
                debug!("normal equations singular, falling back to gradient descent");
                gradient_descent(x, y)
            }
            Err(e) => Err(e),
        }
    }
}

/// Full batch gradient descent on the mean squared error. The step size is the
/// inverse of the trace bound on the largest eigenvalue of `XᵀX / n`.
fn gradient_descent(x: &Matrix, y: &Vector) -> Result<Vector> {
    let n_samples = x.nrows() as f64;
    let lipschitz = x.mapv(|v| v * v).sum() / n_samples;
    let mut weights = Vector::zeros(x.ncols());
    if lipschitz < 1e-12 {
        return Ok(weights);
    }

    let learning_rate = 1.0 / lipschitz;
    let max_iterations = 50_000;
    let tolerance = 1e-12;

    for _ in 0..max_iterations {
        let error = x.dot(&weights) - y;
        let gradient = x.t().dot(&error) / n_samples;
        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(EvalError::Numerical("Gradient descent diverged".to_string()));
        }
        if gradient.dot(&gradient) < tolerance {
            break;
        }
        weights.scaled_add(-learning_rate, &gradient);
    }

    Ok(weights)
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl TabularRegressor for LinearRegression {
    fn name(&self) -> &'static str {
        "LinearRegression"
    }

    fn fit(&mut self, x: &Matrix, y: &Vector) -> Result<()> {
        check_fit_shapes(x, y)?;

        let (coeffs, intercept) = if self.fit_intercept {
            let (x_centered, y_centered, x_means, y_mean) = center(x, y)?;
            let coeffs = self.solve(&x_centered, &y_centered)?;
            let intercept = y_mean - coeffs.dot(&x_means);
            (coeffs, intercept)
        } else {
            (self.solve(x, y)?, 0.0)
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
        Ok(serde_json::to_string(&LinearRegressionParams {
            fit_intercept: self.fit_intercept,
        })?)
    }
}
