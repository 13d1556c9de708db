//! Brute force tuning of a single distance parameter.
//!
//! Each candidate value trains a fresh k-means model on the training data and
//! is scored with the Davies-Bouldin index of the resulting partition (lower is
//! better). Ground truth labels are never consulted. A candidate that collapses
//! to fewer than two clusters, or gives every case its own cluster, scores
//! `f64::MAX`.

use std::fmt::Debug;

use tracing::info;

use super::{InitAlgorithm, TimeSeriesClusterer, TimeSeriesKMeans, TimeSeriesKMedoids};
use crate::dataset::TimeSeriesCollection;
use crate::distances::{DistanceParams, Metric};
use crate::metrics::davies_bouldin_score;
use crate::{Matrix, Result};

/// Outcome of a grid search. Ties keep the earliest candidate.
#[derive(Clone, Debug, PartialEq)]
pub struct TuningResult<P> {
    pub best: P,
    pub best_score: f64,
    pub scores: Vec<(P, f64)>,
}

/// Evaluates `score` on every candidate and keeps the lowest.
pub fn grid_search<P, I, F>(candidates: I, mut score: F) -> Result<TuningResult<P>>
where
    P: Copy + Debug,
    I: IntoIterator<Item = P>,
    F: FnMut(P) -> Result<f64>,
{
    let mut scores = Vec::new();
    let mut best: Option<(P, f64)> = None;
    for candidate in candidates {
        let s = score(candidate)?;
        if best.is_none_or(|(_, b)| s < b) {
            best = Some((candidate, s));
        }
        scores.push((candidate, s));
    }

    let (best, best_score) = best.ok_or_else(|| {
        crate::EvalError::InvalidParameter("empty parameter grid".to_string())
    })?;
    info!(?best, best_score, "grid search finished");
    Ok(TuningResult {
        best,
        best_score,
        scores,
    })
}

/// Fits `clusterer` on `x` and scores its training partition.
pub fn score_partition(
    clusterer: &mut dyn TimeSeriesClusterer,
    x: &TimeSeriesCollection,
    flat: &Matrix,
) -> Result<f64> {
    clusterer.fit(x)?;
    let predictions = clusterer.predict(x)?;

    let mut distinct = predictions.clone();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() <= 1 || distinct.len() >= flat.nrows() {
        return Ok(f64::MAX);
    }
    davies_bouldin_score(flat, &predictions)
}

/// `count` values `0, step, 2 * step, ...` rounded to clean decimals.
pub fn parameter_grid(step: f64, count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| (i as f64 * step * 1e6).round() / 1e6)
        .collect()
}

fn tune_kmeans_parameter(
    metric: Metric,
    x: &TimeSeriesCollection,
    n_clusters: usize,
    random_state: Option<u64>,
    grid: Vec<f64>,
    label: &str,
    apply: impl Fn(DistanceParams, f64) -> DistanceParams,
) -> Result<TuningResult<f64>> {
    let flat = x.to_matrix()?;
    grid_search(grid, |value| {
        let params = apply(DistanceParams::default(), value);
        let mut kmeans = kmeans_for(metric, params, n_clusters, random_state);
        let score = score_partition(&mut kmeans, x, &flat)?;
        info!(
            n_clusters = distinct_clusters(&kmeans),
            parameter = label,
            value,
            score,
            "candidate scored"
        );
        Ok(score)
    })
}

fn kmeans_for(
    metric: Metric,
    params: DistanceParams,
    n_clusters: usize,
    random_state: Option<u64>,
) -> TimeSeriesKMeans {
    let kmeans = TimeSeriesKMeans::new(n_clusters)
        .metric(metric)
        .distance_params(params);
    match random_state {
        Some(seed) => kmeans.random_state(seed),
        None => kmeans,
    }
}

fn distinct_clusters(clusterer: &dyn TimeSeriesClusterer) -> usize {
    let mut labels = clusterer.labels().map(|l| l.to_vec()).unwrap_or_default();
    labels.sort_unstable();
    labels.dedup();
    labels.len()
}

fn best_value(
    metric: Metric,
    x: &TimeSeriesCollection,
    n_clusters: usize,
    random_state: Option<u64>,
    grid: Vec<f64>,
    label: &str,
    apply: impl Fn(DistanceParams, f64) -> DistanceParams,
) -> Result<f64> {
    let result =
        tune_kmeans_parameter(metric, x, n_clusters, random_state, grid, label, apply)?;
    Ok(result.best)
}

/// Warping window over `0.00..=0.19`.
pub fn tune_window(
    metric: Metric,
    x: &TimeSeriesCollection,
    n_clusters: usize,
    random_state: Option<u64>,
) -> Result<f64> {
    let grid = parameter_grid(0.01, 20);
    best_value(metric, x, n_clusters, random_state, grid, "window", DistanceParams::window)
}

/// MSM cost `c` over `0.0..=4.75`.
pub fn tune_msm(
    x: &TimeSeriesCollection,
    n_clusters: usize,
    random_state: Option<u64>,
) -> Result<f64> {
    let grid = parameter_grid(0.25, 20);
    best_value(Metric::Msm, x, n_clusters, random_state, grid, "c", DistanceParams::c)
}

/// WDTW weight `g` over `0.0..=0.95`.
pub fn tune_wdtw(
    x: &TimeSeriesCollection,
    n_clusters: usize,
    random_state: Option<u64>,
) -> Result<f64> {
    let grid = parameter_grid(0.05, 20);
    best_value(Metric::Wdtw, x, n_clusters, random_state, grid, "g", DistanceParams::g)
}

/// ERP gap value `g` over `0.0..=1.8`.
pub fn tune_erp(
    x: &TimeSeriesCollection,
    n_clusters: usize,
    random_state: Option<u64>,
) -> Result<f64> {
    let grid = parameter_grid(0.2, 10);
    best_value(Metric::Erp, x, n_clusters, random_state, grid, "g", DistanceParams::g)
}

/// EDR threshold over `0.00..=0.19`.
pub fn tune_edr(
    x: &TimeSeriesCollection,
    n_clusters: usize,
    random_state: Option<u64>,
) -> Result<f64> {
    let grid = parameter_grid(0.01, 20);
    best_value(Metric::Edr, x, n_clusters, random_state, grid, "epsilon", DistanceParams::epsilon)
}

/// LCSS threshold over `0.00..=0.19`.
pub fn tune_lcss(
    x: &TimeSeriesCollection,
    n_clusters: usize,
    random_state: Option<u64>,
) -> Result<f64> {
    let grid = parameter_grid(0.01, 20);
    best_value(Metric::Lcss, x, n_clusters, random_state, grid, "epsilon", DistanceParams::epsilon)
}

/// TWE stiffness `nu` over `0.0..=0.75` crossed with penalty `lmbda` over
/// `0.0..=0.8`. Returns `(nu, lmbda)`.
pub fn tune_twe(
    x: &TimeSeriesCollection,
    n_clusters: usize,
    random_state: Option<u64>,
) -> Result<(f64, f64)> {
    let flat = x.to_matrix()?;
    let nus = parameter_grid(0.25, 4);
    let lambdas = parameter_grid(0.2, 5);
    let grid: Vec<(f64, f64)> = nus
        .iter()
        .flat_map(|&nu| lambdas.iter().map(move |&lmbda| (nu, lmbda)))
        .collect();

    let result = grid_search(grid, |(nu, lmbda)| {
        let params = DistanceParams::default().nu(nu).lmbda(lmbda);
        let mut kmeans = kmeans_for(Metric::Twe, params, n_clusters, random_state);
        let score = score_partition(&mut kmeans, x, &flat)?;
        info!(
            n_clusters = distinct_clusters(&kmeans),
            nu,
            lmbda,
            score,
            "candidate scored"
        );
        Ok(score)
    })?;
    Ok(result.best)
}

/// Picks the k-medoids initialisation with the best partition.
pub fn tune_init_algorithm(
    metric: Metric,
    x: &TimeSeriesCollection,
    n_clusters: usize,
    random_state: Option<u64>,
) -> Result<InitAlgorithm> {
    let flat = x.to_matrix()?;
    let result = grid_search(InitAlgorithm::ALL, |init| {
        let kmedoids = TimeSeriesKMedoids::new(n_clusters)
            .metric(metric)
            .init_algorithm(init);
        let mut kmedoids = match random_state {
            Some(seed) => kmedoids.random_state(seed),
            None => kmedoids,
        };
        let score = score_partition(&mut kmedoids, x, &flat)?;
        info!(
            n_clusters = distinct_clusters(&kmedoids),
            init = %init,
            score,
            "candidate scored"
        );
        Ok(score)
    })?;
    Ok(result.best)
}
