use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    assign, check_fit_input, fill_empty_clusters, kmeans_plus_plus_indices, make_rng,
    random_indices, InitAlgorithm, TimeSeriesClusterer,
};
use crate::dataset::TimeSeriesCollection;
use crate::distances::{alignment_path, distance, squared_distance, DistanceParams, Metric};
use crate::{EvalError, Result};

const BA_MAX_ITERS: usize = 30;
const BA_TOL: f64 = 1e-5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AveragingMethod {
    /// Pointwise mean, equal length series only.
    Mean,
    /// Barycentre averaging along the alignment paths of the clustering metric.
    Ba,
}

impl fmt::Display for AveragingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AveragingMethod::Mean => f.write_str("mean"),
            AveragingMethod::Ba => f.write_str("ba"),
        }
    }
}

impl FromStr for AveragingMethod {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(AveragingMethod::Mean),
            "ba" | "dba" => Ok(AveragingMethod::Ba),
            other => Err(EvalError::InvalidParameter(format!(
                "Invalid averaging method: {}. Must be 'mean' or 'ba'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct KMeansParams {
    n_clusters: usize,
    init_algorithm: InitAlgorithm,
    metric: Metric,
    distance_params: DistanceParams,
    n_init: usize,
    max_iter: usize,
    tol: f64,
    averaging_method: AveragingMethod,
    random_state: Option<u64>,
}

/// Time series k-means: Lloyd's iterations under any supported distance,
/// restarted `n_init` times keeping the run with the lowest inertia.
#[derive(Clone, Debug)]
pub struct TimeSeriesKMeans {
    pub cluster_centers: Option<Vec<Array2<f64>>>,
    pub labels: Option<Vec<usize>>,
    /// Sum of distances from each training case to its centre.
    pub inertia: Option<f64>,
    pub n_iter: Option<usize>,
    params: KMeansParams,
}

struct LloydsRun {
    centres: Vec<Array2<f64>>,
    labels: Vec<usize>,
    inertia: f64,
    n_iter: usize,
}

impl TimeSeriesKMeans {
    pub fn new(n_clusters: usize) -> Self {
        if n_clusters == 0 {
            panic!("n_clusters must be > 0, got {}", n_clusters);
        }

        Self {
            cluster_centers: None,
            labels: None,
            inertia: None,
            n_iter: None,
            params: KMeansParams {
                n_clusters,
                init_algorithm: InitAlgorithm::Random,
                metric: Metric::Dtw,
                distance_params: DistanceParams::default(),
                n_init: 10,
                max_iter: 300,
                tol: 1e-6,
                averaging_method: AveragingMethod::Mean,
                random_state: None,
            },
        }
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.params.metric = metric;
        self
    }

    pub fn distance_params(mut self, distance_params: DistanceParams) -> Self {
        self.params.distance_params = distance_params;
        self
    }

    pub fn init_algorithm(mut self, init_algorithm: InitAlgorithm) -> Self {
        self.params.init_algorithm = init_algorithm;
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        if n_init == 0 {
            panic!("n_init must be > 0, got {}", n_init);
        }
        self.params.n_init = n_init;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.params.max_iter = max_iter;
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.params.tol = tol;
        self
    }

    pub fn averaging_method(mut self, averaging_method: AveragingMethod) -> Self {
        self.params.averaging_method = averaging_method;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.params.random_state = Some(random_state);
        self
    }

    fn lloyds(&self, x: &TimeSeriesCollection, rng: &mut StdRng) -> Result<LloydsRun> {
        let p = &self.params;
        let mut centres = self.initial_centres(x, rng)?;
        let mut prev_inertia = f64::INFINITY;
        let mut labels = Vec::new();
        let mut n_iter = 0;

        for iteration in 0..p.max_iter.max(1) {
            n_iter = iteration + 1;
            let (mut current, mut distances) =
                assign(x, &centres, p.metric, &p.distance_params)?;
            let moved = fill_empty_clusters(&mut current, &mut distances, p.n_clusters);
            for (case, cluster) in moved {
                centres[cluster] = x.case(case).to_owned();
            }
            let inertia: f64 = distances.iter().sum();
            labels = current;

            if (prev_inertia - inertia).abs() < p.tol {
                prev_inertia = inertia;
                break;
            }
            prev_inertia = inertia;

            for (k, centre) in centres.iter_mut().enumerate() {
                let members: Vec<usize> =
                    (0..labels.len()).filter(|&i| labels[i] == k).collect();
                if !members.is_empty() {
                    *centre = self.average(x, &members, centre)?;
                }
            }
        }

        Ok(LloydsRun {
            centres,
            labels,
            inertia: prev_inertia,
            n_iter,
        })
    }

    fn initial_centres(
        &self,
        x: &TimeSeriesCollection,
        rng: &mut StdRng,
    ) -> Result<Vec<Array2<f64>>> {
        let p = &self.params;
        let n = x.n_cases();
        let indices = match p.init_algorithm {
            InitAlgorithm::Forgy => random_indices(n, p.n_clusters, rng),
            InitAlgorithm::KMeansPlusPlus => {
                kmeans_plus_plus_indices(n, p.n_clusters, rng, |i, j| {
                    distance(x.case(i), x.case(j), p.metric, &p.distance_params)
                })?
            }
            InitAlgorithm::Random => {
                // Every cluster gets one guaranteed member, the rest are random.
                let seeds = random_indices(n, p.n_clusters, rng);
                let mut labels: Vec<usize> =
                    (0..n).map(|_| rng.gen_range(0..p.n_clusters)).collect();
                for (k, &i) in seeds.iter().enumerate() {
                    labels[i] = k;
                }
                let mut centres = Vec::with_capacity(p.n_clusters);
                for k in 0..p.n_clusters {
                    let members: Vec<usize> = (0..n).filter(|&i| labels[i] == k).collect();
                    let start = x.case(seeds[k]).to_owned();
                    centres.push(self.average(x, &members, &start)?);
                }
                return Ok(centres);
            }
        };
        Ok(indices.into_iter().map(|i| x.case(i).to_owned()).collect())
    }

    fn average(
        &self,
        x: &TimeSeriesCollection,
        members: &[usize],
        current: &Array2<f64>,
    ) -> Result<Array2<f64>> {
        let p = &self.params;
        match p.averaging_method {
            AveragingMethod::Mean => mean_average(x, members),
            AveragingMethod::Ba => {
                barycentre_average(x, members, current, p.metric, &p.distance_params)
            }
        }
    }
}

fn mean_average(x: &TimeSeriesCollection, members: &[usize]) -> Result<Array2<f64>> {
    let first = x.case(members[0]);
    let mut sum = Array2::<f64>::zeros(first.raw_dim());
    for &i in members {
        let case = x.case(i);
        if case.raw_dim() != sum.raw_dim() {
            return Err(EvalError::InvalidInput(
                "mean averaging requires equal length series".to_string(),
            ));
        }
        sum += &case;
    }
    Ok(sum / members.len() as f64)
}

/// Barycentre averaging: repeatedly aligns every member to the current
/// average under `metric` and replaces each average point with the mean of the
/// points aligned to it. Points no member aligns to keep their value.
fn barycentre_average(
    x: &TimeSeriesCollection,
    members: &[usize],
    start: &Array2<f64>,
    metric: Metric,
    params: &DistanceParams,
) -> Result<Array2<f64>> {
    let mut centre = start.clone();
    for _ in 0..BA_MAX_ITERS {
        let mut sum = Array2::<f64>::zeros(centre.raw_dim());
        let mut count = Array1::<f64>::zeros(centre.ncols());
        for &i in members {
            let case = x.case(i);
            for (c, t) in alignment_path(centre.view(), case, metric, params)? {
                let mut column = sum.column_mut(c);
                column += &case.column(t);
                count[c] += 1.0;
            }
        }
        for (c, mut column) in sum.columns_mut().into_iter().enumerate() {
            if count[c] > 0.0 {
                column /= count[c];
            } else {
                column.assign(&centre.column(c));
            }
        }

        let shift = squared_distance(centre.view(), sum.view());
        centre = sum;
        if shift < BA_TOL {
            break;
        }
    }
    Ok(centre)
}

impl TimeSeriesClusterer for TimeSeriesKMeans {
    fn name(&self) -> &'static str {
        "TimeSeriesKMeans"
    }

    fn fit(&mut self, x: &TimeSeriesCollection) -> Result<()> {
        check_fit_input(x, self.params.n_clusters, &self.params.distance_params)?;
        if self.params.averaging_method == AveragingMethod::Mean && !x.is_equal_length() {
            return Err(EvalError::InvalidInput(
                "mean averaging requires equal length series, use barycentre averaging".to_string(),
            ));
        }

        let mut rng = make_rng(self.params.random_state);
        let mut best: Option<LloydsRun> = None;
        for run in 0..self.params.n_init {
            let result = self.lloyds(x, &mut rng)?;
            debug!(
                run,
                inertia = result.inertia,
                n_iter = result.n_iter,
                "k-means restart finished"
            );
            if best.as_ref().is_none_or(|b| result.inertia < b.inertia) {
                best = Some(result);
            }
        }

        let best =
            best.ok_or_else(|| EvalError::Numerical("k-means produced no run".to_string()))?;
        self.cluster_centers = Some(best.centres);
        self.labels = Some(best.labels);
        self.inertia = Some(best.inertia);
        self.n_iter = Some(best.n_iter);
        Ok(())
    }

    fn predict(&self, x: &TimeSeriesCollection) -> Result<Vec<usize>> {
        let centres = self
            .cluster_centers
            .as_ref()
            .ok_or(EvalError::NotFitted(self.name()))?;
        if x.n_channels() != centres[0].nrows() {
            return Err(EvalError::DimensionMismatch {
                expected: centres[0].nrows(),
                got: x.n_channels(),
            });
        }
        let (labels, _) = assign(x, centres, self.params.metric, &self.params.distance_params)?;
        Ok(labels)
    }

    fn n_clusters(&self) -> usize {
        self.params.n_clusters
    }

    fn set_n_clusters(&mut self, n_clusters: usize) {
        self.params.n_clusters = n_clusters;
    }

    fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    fn parameter_info(&self) -> Result<String> {
        let mut info = serde_json::to_string(&self.params)?;
        if let (Some(inertia), Some(n_iter)) = (self.inertia, self.n_iter) {
            info.push_str(&format!(",inertia,{},n_its,{}", inertia, n_iter));
        }
        Ok(info)
    }
}
