//! Time series collections, the `.ts` reader and train/test resampling.
//!
//! A collection holds one `(n_channels, n_timepoints)` array per case. Cases
//! may have different lengths but always share the channel count.

mod resample;
mod tabular;
mod ts_file;

pub use resample::{resample, stratified_resample};
pub use tabular::Dataset;
pub use ts_file::{load_ts_file, TsHeader};

use std::path::Path;

use ndarray::{s, Array2, ArrayView2};
use tracing::debug;

use crate::{EvalError, Matrix, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeriesCollection {
    cases: Vec<Array2<f64>>,
}

impl TimeSeriesCollection {
    pub fn new(cases: Vec<Array2<f64>>) -> Result<Self> {
        let first = cases.first().ok_or_else(|| {
            EvalError::InvalidInput("collection must contain at least one case".to_string())
        })?;
        let n_channels = first.nrows();
        if n_channels == 0 {
            return Err(EvalError::InvalidInput(
                "cases must have at least one channel".to_string(),
            ));
        }

        for (i, case) in cases.iter().enumerate() {
            if case.nrows() != n_channels {
                return Err(EvalError::InvalidInput(format!(
                    "case {} has {} channels, expected {}",
                    i,
                    case.nrows(),
                    n_channels
                )));
            }
            if case.ncols() == 0 {
                return Err(EvalError::InvalidInput(format!("case {} is empty", i)));
            }
        }

        Ok(Self { cases })
    }

    /// Each row of `x` becomes a univariate case.
    pub fn from_matrix(x: &Matrix) -> Result<Self> {
        let cases = x
            .rows()
            .into_iter()
            .map(|row| row.to_owned().insert_axis(ndarray::Axis(0)))
            .collect();
        Self::new(cases)
    }

    pub fn n_cases(&self) -> usize {
        self.cases.len()
    }

    pub fn n_channels(&self) -> usize {
        self.cases[0].nrows()
    }

    pub fn is_univariate(&self) -> bool {
        self.n_channels() == 1
    }

    pub fn is_equal_length(&self) -> bool {
        self.min_length() == self.max_length()
    }

    pub fn min_length(&self) -> usize {
        self.cases.iter().map(|c| c.ncols()).min().unwrap_or(0)
    }

    pub fn max_length(&self) -> usize {
        self.cases.iter().map(|c| c.ncols()).max().unwrap_or(0)
    }

    pub fn case(&self, i: usize) -> ArrayView2<'_, f64> {
        self.cases[i].view()
    }

    pub fn iter(&self) -> impl Iterator<Item = ArrayView2<'_, f64>> + '_ {
        self.cases.iter().map(|c| c.view())
    }

    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let mut cases = Vec::with_capacity(indices.len());
        for &i in indices {
            let case = self.cases.get(i).ok_or_else(|| {
                EvalError::InvalidInput(format!(
                    "case index {} out of range for {} cases",
                    i,
                    self.n_cases()
                ))
            })?;
            cases.push(case.clone());
        }
        Self::new(cases)
    }

    pub fn concat(&self, other: &Self) -> Result<Self> {
        if self.n_channels() != other.n_channels() {
            return Err(EvalError::DimensionMismatch {
                expected: self.n_channels(),
                got: other.n_channels(),
            });
        }
        let mut cases = self.cases.clone();
        cases.extend(other.cases.iter().cloned());
        Self::new(cases)
    }

    /// Flattens equal length cases into `(n_cases, n_channels * length)`, channels
    /// laid end to end.
    pub fn to_matrix(&self) -> Result<Matrix> {
        if !self.is_equal_length() {
            return Err(EvalError::InvalidInput(
                "cannot flatten unequal length series into a matrix".to_string(),
            ));
        }

        let length = self.max_length();
        let width = self.n_channels() * length;
        let mut out = Matrix::zeros((self.n_cases(), width));
        for (i, case) in self.cases.iter().enumerate() {
            for (c, channel) in case.rows().into_iter().enumerate() {
                out.slice_mut(s![i, c * length..(c + 1) * length]).assign(&channel);
            }
        }
        Ok(out)
    }
}

/// Cases paired with their string labels (class names or regression targets).
#[derive(Clone, Debug)]
pub struct LabelledCollection {
    pub x: TimeSeriesCollection,
    pub y: Vec<String>,
}

impl LabelledCollection {
    pub fn new(x: TimeSeriesCollection, y: Vec<String>) -> Result<Self> {
        if x.n_cases() != y.len() {
            return Err(EvalError::InvalidInput(format!(
                "number of cases ({}) and labels ({}) must match",
                x.n_cases(),
                y.len()
            )));
        }
        Ok(Self { x, y })
    }

    pub fn n_cases(&self) -> usize {
        self.x.n_cases()
    }

    /// Parses the labels as numeric regression targets.
    pub fn targets(&self) -> Result<crate::Vector> {
        self.y
            .iter()
            .map(|label| {
                label.trim().parse::<f64>().map_err(|_| {
                    EvalError::InvalidInput(format!("target '{}' is not numeric", label))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(crate::Vector::from)
    }
}

/// Train and test splits for one problem, as read from disk.
#[derive(Clone, Debug)]
pub struct ExperimentData {
    pub train: LabelledCollection,
    pub test: LabelledCollection,
    /// True when the caller still has to resample the default split.
    pub needs_resample: bool,
}

/// Loads `<problem_path>/<dataset>/<dataset>_TRAIN.ts` and the matching test file.
///
/// With `predefined_resample` the files carry the resample id,
/// `<dataset><resample_id>_TRAIN.ts`, and no further resampling is needed.
pub fn load_experiment_data(
    problem_path: impl AsRef<Path>,
    dataset: &str,
    resample_id: u64,
    predefined_resample: bool,
) -> Result<ExperimentData> {
    let dir = problem_path.as_ref().join(dataset);
    let stem = if predefined_resample {
        format!("{}{}", dataset, resample_id)
    } else {
        dataset.to_string()
    };

    let train_path = dir.join(format!("{}_TRAIN.ts", stem));
    let test_path = dir.join(format!("{}_TEST.ts", stem));
    debug!(train = %train_path.display(), test = %test_path.display(), "loading experiment data");

    let (train_x, train_y) = load_ts_file(&train_path)?;
    let (test_x, test_y) = load_ts_file(&test_path)?;

    Ok(ExperimentData {
        train: LabelledCollection::new(train_x, train_y)?,
        test: LabelledCollection::new(test_x, test_y)?,
        needs_resample: resample_id != 0 && !predefined_resample,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_collection_shape_queries() {
        let x = TimeSeriesCollection::new(vec![
            array![[1.0, 2.0, 3.0]],
            array![[4.0, 5.0]],
        ])
        .unwrap();

        assert_eq!(x.n_cases(), 2);
        assert!(x.is_univariate());
        assert!(!x.is_equal_length());
        assert_eq!(x.min_length(), 2);
        assert_eq!(x.max_length(), 3);
        assert!(x.to_matrix().is_err());
    }

    #[test]
    fn test_collection_rejects_mixed_channels() {
        let result = TimeSeriesCollection::new(vec![
            array![[1.0, 2.0]],
            array![[1.0, 2.0], [3.0, 4.0]],
        ]);
        assert!(result.is_err());
        assert!(TimeSeriesCollection::new(Vec::new()).is_err());
    }

    #[test]
    fn test_to_matrix_concatenates_channels() {
        let x = TimeSeriesCollection::new(vec![
            array![[1.0, 2.0], [3.0, 4.0]],
            array![[5.0, 6.0], [7.0, 8.0]],
        ])
        .unwrap();

        let flat = x.to_matrix().unwrap();
        assert_eq!(flat, array![[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]]);
    }

    #[test]
    fn test_select_and_concat() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let x = TimeSeriesCollection::from_matrix(&x).unwrap();
        let picked = x.select(&[2, 0]).unwrap();
        assert_eq!(picked.case(0), array![[3.0, 3.0]]);

        let joined = picked.concat(&x).unwrap();
        assert_eq!(joined.n_cases(), 5);
        assert!(x.select(&[3]).is_err());
    }

    #[test]
    fn test_labelled_collection_targets() {
        let x = TimeSeriesCollection::from_matrix(&array![[1.0], [2.0]]).unwrap();
        let labels = vec!["0.5".to_string(), "2".to_string()];
        let data = LabelledCollection::new(x.clone(), labels).unwrap();
        assert_eq!(data.targets().unwrap(), array![0.5, 2.0]);

        assert!(LabelledCollection::new(x, vec!["a".to_string()]).is_err());
    }
}
