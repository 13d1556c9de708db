//! Experiment tooling for benchmarking time series estimators.
//!
//! The crate loads labelled `.ts` datasets, trains clusterers and regressors on
//! them and writes prediction files in the tsml results layout so that runs can
//! be aggregated downstream.
//!
//! ```rust
//! use tsml_eval::cluster::{TimeSeriesClusterer, TimeSeriesKMeans};
//! use tsml_eval::dataset::TimeSeriesCollection;
//! use tsml_eval::distances::Metric;
//! use ndarray::array;
//!
//! let x = TimeSeriesCollection::from_matrix(&array![
//!     [0.0, 0.1, 0.0],
//!     [0.1, 0.0, 0.1],
//!     [5.0, 5.1, 5.0],
//!     [5.1, 5.0, 5.1]
//! ]).unwrap();
//!
//! let mut kmeans = TimeSeriesKMeans::new(2).metric(Metric::Euclidean).random_state(1);
//! let labels = kmeans.fit_predict(&x).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//! ```

pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

pub mod cluster;
pub mod dataset;
pub mod distances;
pub mod error;
pub mod experiments;
pub mod linear_model;
pub mod metrics;
pub mod preprocessing;
pub mod regression;

pub use error::{EvalError, Result};

pub type Vector = Array1<f64>;
pub type Matrix = Array2<f64>;
