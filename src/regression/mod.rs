//! Regressor traits and the adapter that lets a tabular regressor consume
//! time series.
//!
//! The adapter flattens each case into one row: unequal length cases are zero
//! padded to the longest training case and channels are concatenated end to
//! end. Which of those conversions are allowed is set on construction.

use serde_json::json;
use tracing::debug;

use crate::dataset::{Dataset, TimeSeriesCollection};
use crate::preprocessing::{FillValue, PadLength, Padder};
use crate::{EvalError, Matrix, Result, Vector};

/// Regressor over flat feature rows.
pub trait TabularRegressor: Clone {
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &Matrix, y: &Vector) -> Result<()>;

    fn predict(&self, x: &Matrix) -> Result<Vector>;

    /// Seeds any randomness used in `fit`. Deterministic models ignore it.
    fn set_random_state(&mut self, _random_state: u64) {}

    fn parameter_info(&self) -> Result<String>;
}

/// Regressor over collections of `(n_channels, n_timepoints)` cases.
pub trait TimeSeriesRegressor {
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &TimeSeriesCollection, y: &Vector) -> Result<()>;

    fn predict(&self, x: &TimeSeriesCollection) -> Result<Vector>;

    fn parameter_info(&self) -> Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub equal_length_only: bool,
    pub univariate_only: bool,
}

#[derive(Clone, Debug)]
pub struct TabularRegressorAdapter<R: TabularRegressor> {
    pub regressor: Option<R>,
    pad_unequal: bool,
    concatenate_channels: bool,
    clone_estimator: bool,
    random_state: Option<u64>,
    fitted: Option<FittedState<R>>,
}

#[derive(Clone, Debug)]
struct FittedState<R> {
    /// Present when fitting worked on a clone.
    regressor: Option<R>,
    n_channels: usize,
    series_length: usize,
}

impl<R: TabularRegressor> TabularRegressorAdapter<R> {
    pub fn new(regressor: R) -> Self {
        Self {
            regressor: Some(regressor),
            ..Self::empty()
        }
    }

    /// An adapter with no regressor set; `fit` fails until one is assigned.
    pub fn empty() -> Self {
        Self {
            regressor: None,
            pad_unequal: false,
            concatenate_channels: false,
            clone_estimator: true,
            random_state: None,
            fitted: None,
        }
    }

    pub fn pad_unequal(mut self, pad_unequal: bool) -> Self {
        self.pad_unequal = pad_unequal;
        self
    }

    pub fn concatenate_channels(mut self, concatenate_channels: bool) -> Self {
        self.concatenate_channels = concatenate_channels;
        self
    }

    pub fn clone_estimator(mut self, clone_estimator: bool) -> Self {
        self.clone_estimator = clone_estimator;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            equal_length_only: !self.pad_unequal,
            univariate_only: !self.concatenate_channels,
        }
    }

    /// The regressor that was fitted, either the clone or the wrapped one.
    pub fn fitted_regressor(&self) -> Option<&R> {
        let state = self.fitted.as_ref()?;
        state.regressor.as_ref().or(self.regressor.as_ref())
    }

    fn validate(&self, x: &TimeSeriesCollection) -> Result<()> {
        if !self.concatenate_channels && !x.is_univariate() {
            return Err(EvalError::InvalidInput(format!(
                "{} channels found but the adapter only accepts univariate data, \
                 set concatenate_channels",
                x.n_channels()
            )));
        }
        if !self.pad_unequal && !x.is_equal_length() {
            return Err(EvalError::InvalidInput(
                "unequal length series found but the adapter only accepts equal length data, \
                 set pad_unequal"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn convert(&self, x: &TimeSeriesCollection, series_length: usize) -> Result<Matrix> {
        if !self.pad_unequal || (x.is_equal_length() && x.min_length() == series_length) {
            return x.to_matrix();
        }

        let padder = Padder::new(PadLength::Fixed(series_length))
            .fill_value(FillValue::Constant(0.0));
        padder.transform(x)?.to_matrix()
    }
}

impl<R: TabularRegressor> Default for TabularRegressorAdapter<R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<R: TabularRegressor> TimeSeriesRegressor for TabularRegressorAdapter<R> {
    fn name(&self) -> &'static str {
        "TabularRegressorAdapter"
    }

    fn fit(&mut self, x: &TimeSeriesCollection, y: &Vector) -> Result<()> {
        if self.regressor.is_none() {
            return Err(EvalError::InvalidParameter("Regressor not set".to_string()));
        }
        if x.n_cases() != y.len() {
            return Err(EvalError::DimensionMismatch {
                expected: x.n_cases(),
                got: y.len(),
            });
        }
        self.validate(x)?;

        let series_length = x.max_length();
        let table = Dataset::new(self.convert(x, series_length)?, y.clone())?;
        debug!(
            rows = table.n_samples(),
            cols = table.n_features(),
            "converted series to table"
        );

        let fitted = match self.regressor.as_mut() {
            Some(regressor) if !self.clone_estimator => {
                regressor.fit(&table.features, &table.labels)?;
                None
            }
            Some(regressor) => {
                let mut clone = regressor.clone();
                if let Some(seed) = self.random_state {
                    clone.set_random_state(seed);
                }
                clone.fit(&table.features, &table.labels)?;
                Some(clone)
            }
            None => return Err(EvalError::InvalidParameter("Regressor not set".to_string())),
        };

        self.fitted = Some(FittedState {
            regressor: fitted,
            n_channels: x.n_channels(),
            series_length,
        });
        Ok(())
    }

    fn predict(&self, x: &TimeSeriesCollection) -> Result<Vector> {
        let state = self.fitted.as_ref().ok_or(EvalError::NotFitted(self.name()))?;
        let regressor = self.fitted_regressor().ok_or(EvalError::NotFitted(self.name()))?;
        if x.n_channels() != state.n_channels {
            return Err(EvalError::DimensionMismatch {
                expected: state.n_channels,
                got: x.n_channels(),
            });
        }
        self.validate(x)?;

        let flat = self.convert(x, state.series_length)?;
        regressor.predict(&flat)
    }

    fn parameter_info(&self) -> Result<String> {
        let regressor = match &self.regressor {
            Some(r) => json!({
                "name": r.name(),
                "params": serde_json::from_str::<serde_json::Value>(&r.parameter_info()?)?,
            }),
            None => serde_json::Value::Null,
        };
        let info = json!({
            "regressor": regressor,
            "pad_unequal": self.pad_unequal,
            "concatenate_channels": self.concatenate_channels,
            "clone_estimator": self.clone_estimator,
            "random_state": self.random_state,
        });
        Ok(info.to_string())
    }
}

/// Contiguous folds sized like an unshuffled k-fold split: the first
/// `n_cases % n_folds` folds hold one extra case.
pub fn kfold_indices(n_cases: usize, n_folds: usize) -> Result<Vec<Vec<usize>>> {
    if n_folds < 2 || n_folds > n_cases {
        return Err(EvalError::InvalidParameter(format!(
            "n_folds={} must be between 2 and n_cases={}",
            n_folds, n_cases
        )));
    }

    let base = n_cases / n_folds;
    let extra = n_cases % n_folds;
    let mut folds = Vec::with_capacity(n_folds);
    let mut start = 0;
    for fold in 0..n_folds {
        let size = base + usize::from(fold < extra);
        folds.push((start..start + size).collect());
        start += size;
    }
    Ok(folds)
}

/// Out-of-fold predictions for every case, each fold predicted by a fresh
/// copy of `regressor` fitted on the remaining folds.
pub fn cross_val_predict<T>(
    regressor: &T,
    x: &TimeSeriesCollection,
    y: &Vector,
    n_folds: usize,
) -> Result<Vector>
where
    T: TimeSeriesRegressor + Clone,
{
    if x.n_cases() != y.len() {
        return Err(EvalError::DimensionMismatch {
            expected: x.n_cases(),
            got: y.len(),
        });
    }

    let mut predictions = Vector::zeros(y.len());
    for (fold, test_idx) in kfold_indices(x.n_cases(), n_folds)?.iter().enumerate() {
        let train_idx: Vec<usize> = (0..x.n_cases()).filter(|i| !test_idx.contains(i)).collect();
        let y_train = Vector::from_iter(train_idx.iter().map(|&i| y[i]));

        let mut model = regressor.clone();
        model.fit(&x.select(&train_idx)?, &y_train)?;
        let fold_preds = model.predict(&x.select(test_idx)?)?;
        for (&i, &p) in test_idx.iter().zip(fold_preds.iter()) {
            predictions[i] = p;
        }
        debug!(fold, n_test = test_idx.len(), "cross validation fold done");
    }
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear_model::{LinearRegression, Ridge};
    use ndarray::array;

    fn univariate() -> (TimeSeriesCollection, Vector) {
        let x = TimeSeriesCollection::from_matrix(&array![
            [1.0, 0.0, 1.0],
            [2.0, 1.0, 0.0],
            [3.0, 1.0, 1.0],
            [4.0, 0.0, 0.0],
            [5.0, 1.0, 1.0]
        ])
        .unwrap();
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0];
        (x, y)
    }

    #[test]
    fn test_adapter_fits_equal_length() {
        let (x, y) = univariate();
        let mut adapter = TabularRegressorAdapter::new(LinearRegression::new());
        adapter.fit(&x, &y).unwrap();

        let predictions = adapter.predict(&x).unwrap();
        for (pred, actual) in predictions.iter().zip(y.iter()) {
            assert!((pred - actual).abs() < 1e-8);
        }
        // The wrapped regressor stays untouched when cloning.
        assert!(adapter.regressor.as_ref().unwrap().coefficients.is_none());
        assert!(adapter.fitted_regressor().unwrap().coefficients.is_some());
    }

    #[test]
    fn test_adapter_without_clone_fits_in_place() {
        let (x, y) = univariate();
        let mut adapter = TabularRegressorAdapter::new(Ridge::new()).clone_estimator(false);
        adapter.fit(&x, &y).unwrap();
        assert!(adapter.regressor.as_ref().unwrap().coefficients.is_some());
        assert_eq!(adapter.predict(&x).unwrap().len(), 5);
    }

    #[test]
    fn test_adapter_requires_regressor() {
        let (x, y) = univariate();
        let mut adapter: TabularRegressorAdapter<Ridge> = TabularRegressorAdapter::empty();
        match adapter.fit(&x, &y) {
            Err(EvalError::InvalidParameter(msg)) => assert_eq!(msg, "Regressor not set"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(adapter.predict(&x).is_err());
    }

    #[test]
    fn test_adapter_rejects_unsupported_input() {
        let multivariate = TimeSeriesCollection::new(vec![
            array![[1.0, 2.0], [3.0, 4.0]],
            array![[2.0, 2.0], [1.0, 4.0]],
        ])
        .unwrap();
        let unequal =
            TimeSeriesCollection::new(vec![array![[1.0, 2.0, 3.0]], array![[2.0, 2.0]]]).unwrap();
        let y = array![1.0, 2.0];

        let mut adapter = TabularRegressorAdapter::new(Ridge::new());
        assert!(adapter.fit(&multivariate, &y).is_err());
        assert!(adapter.fit(&unequal, &y).is_err());
        assert!(adapter.fit(&unequal, &array![1.0]).is_err());
    }

    #[test]
    fn test_adapter_pads_and_concatenates() {
        let x = TimeSeriesCollection::new(vec![
            array![[1.0, 2.0, 3.0], [0.0, 1.0, 0.0]],
            array![[2.0, 2.0], [1.0, 1.0]],
            array![[0.0, 1.0, 1.0], [1.0, 0.0, 0.0]],
        ])
        .unwrap();
        let y = array![1.0, 2.0, 3.0];

        let mut adapter = TabularRegressorAdapter::new(Ridge::new())
            .pad_unequal(true)
            .concatenate_channels(true);
        adapter.fit(&x, &y).unwrap();
        assert_eq!(adapter.fitted_regressor().unwrap().coefficients.as_ref().unwrap().len(), 6);

        // Shorter cases at predict time are padded to the fitted length.
        let short = TimeSeriesCollection::new(vec![array![[1.0], [1.0]]]).unwrap();
        assert_eq!(adapter.predict(&short).unwrap().len(), 1);

        let univariate = TimeSeriesCollection::new(vec![array![[1.0, 2.0, 3.0]]]).unwrap();
        assert!(adapter.predict(&univariate).is_err());
    }

    #[test]
    fn test_capabilities() {
        let adapter = TabularRegressorAdapter::new(Ridge::new()).pad_unequal(true);
        assert_eq!(
            adapter.capabilities(),
            Capabilities {
                equal_length_only: false,
                univariate_only: true
            }
        );
    }

    #[test]
    fn test_parameter_info() {
        let adapter = TabularRegressorAdapter::new(Ridge::new()).random_state(3);
        let info: serde_json::Value =
            serde_json::from_str(&adapter.parameter_info().unwrap()).unwrap();
        assert_eq!(info["regressor"]["name"], "Ridge");
        assert_eq!(info["regressor"]["params"]["alpha"], 1.0);
        assert_eq!(info["random_state"], 3);
    }

    #[test]
    fn test_kfold_indices() {
        let folds = kfold_indices(7, 3).unwrap();
        assert_eq!(folds, vec![vec![0, 1, 2], vec![3, 4], vec![5, 6]]);
        assert!(kfold_indices(3, 4).is_err());
        assert!(kfold_indices(3, 1).is_err());
    }

    #[test]
    fn test_cross_val_predict() {
        let (x, y) = univariate();
        let adapter = TabularRegressorAdapter::new(Ridge::new().alpha(1e-6));
        let predictions = cross_val_predict(&adapter, &x, &y, 5).unwrap();

        assert_eq!(predictions.len(), 5);
        // The middle cases are interpolated by a model fit on the others.
        assert!((predictions[2] - y[2]).abs() < 0.5);
    }
}
