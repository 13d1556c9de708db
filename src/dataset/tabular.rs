use crate::{EvalError, Matrix, Result, Vector};

/// Flat feature matrix with numeric targets, the input of the tabular regressors.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub features: Matrix,
    pub labels: Vector,
}

impl Dataset {
    pub fn new(features: Matrix, labels: Vector) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(EvalError::DimensionMismatch {
                expected: features.nrows(),
                got: labels.len(),
            });
        }

        Ok(Self { features, labels })
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_new_checks_row_count() {
        let features = array![[0.1, 0.2, 0.3], [1.1, 1.2, 1.3]];
        let dataset = Dataset::new(features, array![4.0, 5.0]).unwrap();
        assert_eq!(dataset.n_samples(), 2);
        assert_eq!(dataset.n_features(), 3);

        match Dataset::new(array![[0.1, 0.2]], array![4.0, 5.0]) {
            Err(EvalError::DimensionMismatch { expected, got }) => {
                assert_eq!((expected, got), (1, 2))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
