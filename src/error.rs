use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors raised while loading data, fitting estimators or writing results.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("{0} not fitted. Call fit() first.")]
    NotFitted(&'static str),

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("numerical error: {0}")]
    Numerical(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = EvalError::NotFitted("TimeSeriesKMeans");
        assert_eq!(err.to_string(), "TimeSeriesKMeans not fitted. Call fit() first.");

        let err = EvalError::Parse {
            path: PathBuf::from("a.ts"),
            line: 7,
            message: "bad value".to_string(),
        };
        assert_eq!(err.to_string(), "a.ts:7: bad value");
    }
}
