//! Partitional clustering of time series under elastic distances.
//!
//! This module provides:
//! - `TimeSeriesKMeans`: Lloyd's algorithm with mean or barycentre averaging
//! - `TimeSeriesKMedoids`: Lloyd's algorithm with medoid centres
//! - `tuning`: grid searches over distance parameters scored by the
//!   Davies-Bouldin index
//!
//! # Examples
//!
//! ```rust
//! use tsml_eval::cluster::{InitAlgorithm, TimeSeriesClusterer, TimeSeriesKMedoids};
//! use tsml_eval::dataset::TimeSeriesCollection;
//! use tsml_eval::distances::{DistanceParams, Metric};
//! use ndarray::array;
//!
//! let x = TimeSeriesCollection::from_matrix(&array![
//!     [0.0, 1.0, 2.0, 1.0],
//!     [0.0, 0.0, 1.0, 2.0],
//!     [9.0, 8.0, 9.0, 8.0],
//!     [8.0, 9.0, 8.0, 9.0]
//! ]).unwrap();
//!
//! let mut kmedoids = TimeSeriesKMedoids::new(2)
//!     .metric(Metric::Dtw)
//!     .distance_params(DistanceParams::default().window(0.2))
//!     .init_algorithm(InitAlgorithm::KMeansPlusPlus)
//!     .random_state(0);
//! let labels = kmedoids.fit_predict(&x).unwrap();
//! assert_eq!(labels[2], labels[3]);
//! ```

mod kmeans;
mod kmedoids;
pub mod tuning;

pub use kmeans::{AveragingMethod, TimeSeriesKMeans};
pub use kmedoids::TimeSeriesKMedoids;

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::dataset::TimeSeriesCollection;
use crate::distances::{distance_to_many, DistanceParams, Metric};
use crate::{EvalError, Matrix, Result};

/// Common surface of the clusterers driven by the experiment runner.
pub trait TimeSeriesClusterer {
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &TimeSeriesCollection) -> Result<()>;

    fn predict(&self, x: &TimeSeriesCollection) -> Result<Vec<usize>>;

    /// One-hot cluster membership, one column per cluster.
    fn predict_proba(&self, x: &TimeSeriesCollection) -> Result<Matrix> {
        Ok(one_hot(&self.predict(x)?, self.n_clusters()))
    }

    fn fit_predict(&mut self, x: &TimeSeriesCollection) -> Result<Vec<usize>> {
        self.fit(x)?;
        self.labels()
            .map(|labels| labels.to_vec())
            .ok_or(EvalError::NotFitted(self.name()))
    }

    fn n_clusters(&self) -> usize;

    fn set_n_clusters(&mut self, n_clusters: usize);

    /// Cluster assignment of the training cases.
    fn labels(&self) -> Option<&[usize]>;

    /// Single-line description of the parameters for results files.
    fn parameter_info(&self) -> Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitAlgorithm {
    /// Random labels for every case, centres averaged from them.
    #[serde(rename = "random")]
    Random,
    /// Distinct random cases as centres.
    #[serde(rename = "forgy")]
    Forgy,
    #[serde(rename = "kmeans++")]
    KMeansPlusPlus,
}

impl InitAlgorithm {
    pub const ALL: [InitAlgorithm; 3] = [
        InitAlgorithm::KMeansPlusPlus,
        InitAlgorithm::Random,
        InitAlgorithm::Forgy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InitAlgorithm::Random => "random",
            InitAlgorithm::Forgy => "forgy",
            InitAlgorithm::KMeansPlusPlus => "kmeans++",
        }
    }
}

impl fmt::Display for InitAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InitAlgorithm {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(InitAlgorithm::Random),
            "forgy" => Ok(InitAlgorithm::Forgy),
            "kmeans++" | "k-means++" => Ok(InitAlgorithm::KMeansPlusPlus),
            other => Err(EvalError::InvalidParameter(format!(
                "Invalid init algorithm: {}. Must be 'kmeans++', 'random' or 'forgy'",
                other
            ))),
        }
    }
}

pub fn one_hot(labels: &[usize], n_clusters: usize) -> Matrix {
    let width = labels.iter().map(|&l| l + 1).max().unwrap_or(0).max(n_clusters);
    let mut probs = Matrix::zeros((labels.len(), width));
    for (i, &label) in labels.iter().enumerate() {
        probs[[i, label]] = 1.0;
    }
    probs
}

pub(crate) fn make_rng(random_state: Option<u64>) -> StdRng {
    match random_state {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

pub(crate) fn check_fit_input(
    x: &TimeSeriesCollection,
    n_clusters: usize,
    params: &DistanceParams,
) -> Result<()> {
    if n_clusters == 0 {
        return Err(EvalError::InvalidParameter("n_clusters must be > 0".to_string()));
    }
    if x.n_cases() < n_clusters {
        return Err(EvalError::InvalidInput(format!(
            "n_cases={} should be >= n_clusters={}",
            x.n_cases(),
            n_clusters
        )));
    }
    params.validate()
}

/// Nearest centre per case and the distance to it.
pub(crate) fn assign(
    x: &TimeSeriesCollection,
    centres: &[Array2<f64>],
    metric: Metric,
    params: &DistanceParams,
) -> Result<(Vec<usize>, Vec<f64>)> {
    let mut labels = Vec::with_capacity(x.n_cases());
    let mut distances = Vec::with_capacity(x.n_cases());
    for case in x.iter() {
        let to_centres = distance_to_many(case, centres, metric, params)?;
        let (closest, d) = to_centres.iter().enumerate().fold(
            (0, f64::INFINITY),
            |best, (k, &d)| if d < best.1 { (k, d) } else { best },
        );
        labels.push(closest);
        distances.push(d);
    }
    Ok((labels, distances))
}

/// Gives every empty cluster the case currently farthest from its own centre.
/// Returns the indices of the moved cases and their new clusters.
pub(crate) fn fill_empty_clusters(
    labels: &mut [usize],
    distances: &mut [f64],
    n_clusters: usize,
) -> Vec<(usize, usize)> {
    let mut moved = Vec::new();
    loop {
        let mut sizes = vec![0usize; n_clusters];
        for &label in labels.iter() {
            sizes[label] += 1;
        }
        let Some(empty) = sizes.iter().position(|&s| s == 0) else {
            break;
        };

        // Only take from clusters that keep at least one member.
        let donor = (0..labels.len())
            .filter(|&i| sizes[labels[i]] > 1)
            .max_by(|&a, &b| distances[a].total_cmp(&distances[b]));
        let Some(donor) = donor else {
            break;
        };

        labels[donor] = empty;
        distances[donor] = 0.0;
        moved.push((donor, empty));
    }
    moved
}

/// Chooses `n_clusters` distinct case indices with k-means++ seeding over the
/// supplied distance function.
pub(crate) fn kmeans_plus_plus_indices(
    n_cases: usize,
    n_clusters: usize,
    rng: &mut StdRng,
    mut dist: impl FnMut(usize, usize) -> Result<f64>,
) -> Result<Vec<usize>> {
    let mut chosen = vec![rng.gen_range(0..n_cases)];
    let mut min_dist: Vec<f64> = (0..n_cases)
        .map(|i| dist(i, chosen[0]))
        .collect::<Result<_>>()?;

    while chosen.len() < n_clusters {
        let weights: Vec<f64> = (0..n_cases)
            .map(|i| if chosen.contains(&i) { 0.0 } else { min_dist[i].max(0.0) })
            .collect();

        let next = match WeightedIndex::new(&weights) {
            Ok(index) => index.sample(rng),
            // Every remaining case sits on a centre, pick uniformly among them.
            Err(_) => {
                let remaining: Vec<usize> =
                    (0..n_cases).filter(|i| !chosen.contains(i)).collect();
                remaining[rng.gen_range(0..remaining.len())]
            }
        };

        for (i, current) in min_dist.iter_mut().enumerate() {
            *current = current.min(dist(i, next)?);
        }
        chosen.push(next);
    }
    Ok(chosen)
}

pub(crate) fn random_indices(n_cases: usize, n_clusters: usize, rng: &mut StdRng) -> Vec<usize> {
    sample(rng, n_cases, n_clusters).into_vec()
}
