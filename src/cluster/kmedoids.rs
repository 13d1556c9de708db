use ndarray::Array2;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::debug;

use super::{
    assign, check_fit_input, fill_empty_clusters, kmeans_plus_plus_indices, make_rng,
    random_indices, InitAlgorithm, TimeSeriesClusterer,
};
use crate::dataset::TimeSeriesCollection;
use crate::distances::{pairwise_distance, DistanceParams, Metric};
use crate::{EvalError, Matrix, Result};

#[derive(Clone, Debug, PartialEq, Serialize)]
struct KMedoidsParams {
    n_clusters: usize,
    init_algorithm: InitAlgorithm,
    metric: Metric,
    distance_params: DistanceParams,
    n_init: usize,
    max_iter: usize,
    tol: f64,
    random_state: Option<u64>,
}

/// Time series k-medoids with the alternate update: each centre moves to the
/// member with the smallest total distance to the rest of its cluster.
#[derive(Clone, Debug)]
pub struct TimeSeriesKMedoids {
    pub cluster_centers: Option<Vec<Array2<f64>>>,
    pub medoid_indices: Option<Vec<usize>>,
    pub labels: Option<Vec<usize>>,
    pub inertia: Option<f64>,
    pub n_iter: Option<usize>,
    params: KMedoidsParams,
}

struct MedoidsRun {
    medoids: Vec<usize>,
    labels: Vec<usize>,
    inertia: f64,
    n_iter: usize,
}

impl TimeSeriesKMedoids {
    pub fn new(n_clusters: usize) -> Self {
        if n_clusters == 0 {
            panic!("n_clusters must be > 0, got {}", n_clusters);
        }

        Self {
            cluster_centers: None,
            medoid_indices: None,
            labels: None,
            inertia: None,
            n_iter: None,
            params: KMedoidsParams {
                n_clusters,
                init_algorithm: InitAlgorithm::Random,
                metric: Metric::Dtw,
                distance_params: DistanceParams::default(),
                n_init: 10,
                max_iter: 300,
                tol: 1e-6,
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

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.params.random_state = Some(random_state);
        self
    }

    fn run(&self, pairwise: &Matrix, rng: &mut StdRng) -> Result<MedoidsRun> {
        let p = &self.params;
        let n = pairwise.nrows();
        let mut medoids = match p.init_algorithm {
            InitAlgorithm::KMeansPlusPlus => {
                kmeans_plus_plus_indices(n, p.n_clusters, rng, |i, j| Ok(pairwise[[i, j]]))?
            }
            InitAlgorithm::Random | InitAlgorithm::Forgy => random_indices(n, p.n_clusters, rng),
        };

        let mut prev_inertia = f64::INFINITY;
        let mut labels = Vec::new();
        let mut n_iter = 0;

        for iteration in 0..p.max_iter.max(1) {
            n_iter = iteration + 1;
            let (mut current, mut distances) = nearest_medoids(pairwise, &medoids);
            for (case, cluster) in fill_empty_clusters(&mut current, &mut distances, p.n_clusters) {
                medoids[cluster] = case;
            }
            let inertia: f64 = distances.iter().sum();
            labels = current;

            if (prev_inertia - inertia).abs() < p.tol {
                prev_inertia = inertia;
                break;
            }
            prev_inertia = inertia;

            let updated: Vec<usize> = (0..p.n_clusters)
                .map(|k| {
                    let members: Vec<usize> = (0..n).filter(|&i| labels[i] == k).collect();
                    members
                        .iter()
                        .copied()
                        .min_by(|&a, &b| {
                            let cost = |m: usize| {
                                members.iter().map(|&j| pairwise[[m, j]]).sum::<f64>()
                            };
                            cost(a).total_cmp(&cost(b))
                        })
                        .unwrap_or(medoids[k])
                })
                .collect();

            if updated == medoids {
                break;
            }
            medoids = updated;
        }

        Ok(MedoidsRun {
            medoids,
            labels,
            inertia: prev_inertia,
            n_iter,
        })
    }
}

fn nearest_medoids(pairwise: &Matrix, medoids: &[usize]) -> (Vec<usize>, Vec<f64>) {
    (0..pairwise.nrows())
        .map(|i| {
            medoids
                .iter()
                .enumerate()
                .fold((0, f64::INFINITY), |best, (k, &m)| {
                    let d = pairwise[[i, m]];
                    if d < best.1 { (k, d) } else { best }
                })
        })
        .unzip()
}

impl TimeSeriesClusterer for TimeSeriesKMedoids {
    fn name(&self) -> &'static str {
        "TimeSeriesKMedoids"
    }

    fn fit(&mut self, x: &TimeSeriesCollection) -> Result<()> {
        check_fit_input(x, self.params.n_clusters, &self.params.distance_params)?;
        let pairwise = pairwise_distance(x, self.params.metric, &self.params.distance_params)?;

        let mut rng = make_rng(self.params.random_state);
        let mut best: Option<MedoidsRun> = None;
        for run in 0..self.params.n_init {
            let result = self.run(&pairwise, &mut rng)?;
            debug!(
                run,
                inertia = result.inertia,
                n_iter = result.n_iter,
                "k-medoids restart finished"
            );
            if best.as_ref().is_none_or(|b| result.inertia < b.inertia) {
                best = Some(result);
            }
        }

        let best =
            best.ok_or_else(|| EvalError::Numerical("k-medoids produced no run".to_string()))?;
        self.cluster_centers = Some(best.medoids.iter().map(|&i| x.case(i).to_owned()).collect());
        self.medoid_indices = Some(best.medoids);
        self.labels = Some(best.labels);
        self.inertia = Some(best.inertia);
        self.n_iter = Some(best.n_iter);
        Ok(())
    }

    fn predict(&self, x: &TimeSeriesCollection) -> Result<Vec<usize>> {
        let centres = self.cluster_centers.as_ref().ok_or(EvalError::NotFitted(self.name()))?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_groups() -> TimeSeriesCollection {
        TimeSeriesCollection::new(vec![
            array![[0.0, 1.0, 0.0, 1.0]],
            array![[0.0, 0.0, 1.0, 1.0, 0.0]],
            array![[1.0, 0.0, 1.0]],
            array![[7.0, 8.0, 7.0, 8.0]],
            array![[8.0, 8.0, 7.0]],
            array![[7.5, 7.5, 7.5, 7.5, 7.5]],
        ])
        .unwrap()
    }

    #[test]
    fn test_kmedoids_unequal_length() {
        let x = two_groups();
        let mut kmedoids = TimeSeriesKMedoids::new(2)
            .metric(Metric::Msm)
            .init_algorithm(InitAlgorithm::KMeansPlusPlus)
            .random_state(5);
        let labels = kmedoids.fit_predict(&x).unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);

        // Medoids are training cases assigned to their own cluster.
        let medoids = kmedoids.medoid_indices.as_ref().unwrap();
        for (k, &m) in medoids.iter().enumerate() {
            assert_eq!(labels[m], k);
        }
    }

    #[test]
    fn test_kmedoids_predict_matches_training_labels() {
        let x = two_groups();
        for init in InitAlgorithm::ALL {
            let mut kmedoids = TimeSeriesKMedoids::new(2).init_algorithm(init).random_state(1);
            kmedoids.fit(&x).unwrap();
            assert_eq!(kmedoids.predict(&x).unwrap(), kmedoids.labels.clone().unwrap());
        }
    }

    #[test]
    fn test_kmedoids_errors() {
        let x = two_groups();
        assert!(TimeSeriesKMedoids::new(2).predict(&x).is_err());
        assert!(TimeSeriesKMedoids::new(7).fit(&x).is_err());

        let bad_window = DistanceParams::default().window(2.0);
        assert!(TimeSeriesKMedoids::new(2).distance_params(bad_window).fit(&x).is_err());
    }
}
