//! Distance functions between time series.
//!
//! Every function takes `(n_channels, n_timepoints)` views. Elastic distances
//! accept series of different lengths; the warping window is a proportion of
//! the longer series and builds a Sakoe-Chiba band around the diagonal.
//!
//! ```rust
//! use tsml_eval::distances::{distance, DistanceParams, Metric};
//! use ndarray::array;
//!
//! let x = array![[1.0, 2.0, 3.0, 4.0]];
//! let y = array![[1.0, 1.0, 2.0, 3.0, 4.0]];
//!
//! let params = DistanceParams::default();
//! let d = distance(x.view(), y.view(), Metric::Dtw, &params).unwrap();
//! assert_eq!(d, 0.0);
//! ```

mod elastic;
mod pointwise;

pub use elastic::{
    dtw_alignment_path, dtw_distance, edr_alignment_path, edr_distance, erp_alignment_path,
    erp_distance, lcss_alignment_path, lcss_distance, msm_alignment_path, msm_distance,
    twe_alignment_path, twe_distance, wdtw_alignment_path, wdtw_distance,
};
pub use pointwise::{euclidean_distance, squared_distance};

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::dataset::TimeSeriesCollection;
use crate::{EvalError, Matrix, Result, Vector};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Euclidean,
    Squared,
    Dtw,
    Wdtw,
    Erp,
    Edr,
    Lcss,
    Msm,
    Twe,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::Squared => "squared",
            Metric::Dtw => "dtw",
            Metric::Wdtw => "wdtw",
            Metric::Erp => "erp",
            Metric::Edr => "edr",
            Metric::Lcss => "lcss",
            Metric::Msm => "msm",
            Metric::Twe => "twe",
        }
    }

    /// Lock-step metrics compare aligned points only and need equal lengths
    /// for a meaningful result.
    pub fn is_elastic(&self) -> bool {
        !matches!(self, Metric::Euclidean | Metric::Squared)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" | "ed" => Ok(Metric::Euclidean),
            "squared" => Ok(Metric::Squared),
            "dtw" => Ok(Metric::Dtw),
            "wdtw" => Ok(Metric::Wdtw),
            "erp" => Ok(Metric::Erp),
            "edr" => Ok(Metric::Edr),
            "lcss" => Ok(Metric::Lcss),
            "msm" => Ok(Metric::Msm),
            "twe" => Ok(Metric::Twe),
            other => Err(EvalError::InvalidParameter(format!(
                "unknown distance '{}'",
                other
            ))),
        }
    }
}

/// Hyperparameters shared by the elastic distances. Each metric reads only the
/// fields it uses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceParams {
    /// Warping window as a proportion of the longer series, in `[0, 1]`.
    pub window: f64,
    /// Match threshold for EDR and LCSS. EDR falls back to a quarter of the
    /// largest standard deviation and LCSS to 1.0 when unset.
    pub epsilon: Option<f64>,
    /// WDTW weight steepness and ERP gap value.
    pub g: f64,
    /// MSM split/merge cost.
    pub c: f64,
    /// TWE stiffness.
    pub nu: f64,
    /// TWE edit penalty.
    pub lmbda: f64,
}

impl Default for DistanceParams {
    fn default() -> Self {
        Self {
            window: 1.0,
            epsilon: None,
            g: 0.05,
            c: 1.0,
            nu: 0.001,
            lmbda: 1.0,
        }
    }
}

impl DistanceParams {
    pub fn window(mut self, window: f64) -> Self {
        self.window = window;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }

    pub fn g(mut self, g: f64) -> Self {
        self.g = g;
        self
    }

    pub fn c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn nu(mut self, nu: f64) -> Self {
        self.nu = nu;
        self
    }

    pub fn lmbda(mut self, lmbda: f64) -> Self {
        self.lmbda = lmbda;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.window) {
            return Err(EvalError::InvalidParameter(format!(
                "window must be in [0, 1], got {}",
                self.window
            )));
        }
        if self.epsilon.is_some_and(|e| e < 0.0)
            || self.c < 0.0
            || self.nu < 0.0
            || self.lmbda < 0.0
        {
            return Err(EvalError::InvalidParameter(
                "epsilon, c, nu and lmbda must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_pair(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> Result<()> {
    if x.nrows() != y.nrows() {
        return Err(EvalError::DimensionMismatch {
            expected: x.nrows(),
            got: y.nrows(),
        });
    }
    if x.ncols() == 0 || y.ncols() == 0 {
        return Err(EvalError::InvalidInput(
            "cannot compute a distance to an empty series".to_string(),
        ));
    }
    Ok(())
}

pub fn distance(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    metric: Metric,
    params: &DistanceParams,
) -> Result<f64> {
    check_pair(x, y)?;

    let d = match metric {
        Metric::Euclidean => euclidean_distance(x, y),
        Metric::Squared => squared_distance(x, y),
        Metric::Dtw => dtw_distance(x, y, params.window),
        Metric::Wdtw => wdtw_distance(x, y, params.window, params.g),
        Metric::Erp => erp_distance(x, y, params.window, params.g),
        Metric::Edr => edr_distance(x, y, params.window, params.epsilon),
        Metric::Lcss => lcss_distance(x, y, params.window, params.epsilon.unwrap_or(1.0)),
        Metric::Msm => msm_distance(x, y, params.window, params.c),
        Metric::Twe => twe_distance(x, y, params.window, params.nu, params.lmbda),
    };
    Ok(d)
}

/// Time point pairs aligned by `metric`, ordered from the start of both
/// series. Lock-step metrics pair equal indices and need equal lengths. The
/// LCSS path holds matched points only and may be empty.
pub fn alignment_path(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    metric: Metric,
    params: &DistanceParams,
) -> Result<Vec<(usize, usize)>> {
    check_pair(x, y)?;

    let path = match metric {
        Metric::Euclidean | Metric::Squared => {
            if x.ncols() != y.ncols() {
                return Err(EvalError::DimensionMismatch {
                    expected: x.ncols(),
                    got: y.ncols(),
                });
            }
            (0..x.ncols()).map(|t| (t, t)).collect()
        }
        Metric::Dtw => dtw_alignment_path(x, y, params.window),
        Metric::Wdtw => wdtw_alignment_path(x, y, params.window, params.g),
        Metric::Erp => erp_alignment_path(x, y, params.window, params.g),
        Metric::Edr => edr_alignment_path(x, y, params.window, params.epsilon),
        Metric::Lcss => lcss_alignment_path(x, y, params.window, params.epsilon.unwrap_or(1.0)),
        Metric::Msm => msm_alignment_path(x, y, params.window, params.c),
        Metric::Twe => twe_alignment_path(x, y, params.window, params.nu, params.lmbda),
    };
    Ok(path)
}

/// Symmetric `(n_cases, n_cases)` distance matrix.
pub fn pairwise_distance(
    x: &TimeSeriesCollection,
    metric: Metric,
    params: &DistanceParams,
) -> Result<Matrix> {
    let n = x.n_cases();
    let mut distances = Matrix::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = distance(x.case(i), x.case(j), metric, params)?;
            distances[[i, j]] = d;
            distances[[j, i]] = d;
        }
    }
    Ok(distances)
}

/// Distance from `x` to each of `others`.
pub fn distance_to_many(
    x: ArrayView2<'_, f64>,
    others: &[Array2<f64>],
    metric: Metric,
    params: &DistanceParams,
) -> Result<Vector> {
    others
        .iter()
        .map(|other| distance(x, other.view(), metric, params))
        .collect::<Result<Vec<_>>>()
        .map(Vector::from)
}

/// Inclusive column range allowed in each row of an `n x m` cost matrix.
#[derive(Clone, Debug)]
pub(crate) struct Band {
    lo: Vec<usize>,
    hi: Vec<usize>,
}

impl Band {
    pub(crate) fn sakoe_chiba(n: usize, m: usize, window: f64) -> Self {
        let radius = (window.clamp(0.0, 1.0) * n.max(m) as f64).floor() as usize;
        let mut lo = Vec::with_capacity(n);
        let mut hi = Vec::with_capacity(n);

        if n == 1 {
            lo.push(0);
            hi.push(m - 1);
            return Self { lo, hi };
        }

        // Diagonal position of row i is i * (m - 1) / (n - 1), kept in integers.
        let num = m - 1;
        let den = n - 1;
        let floor_at = |i: usize| i * num / den;
        let ceil_at = |i: usize| (i * num).div_ceil(den);

        for i in 0..n {
            let reach = if i + 1 < n {
                ceil_at(i).max(ceil_at(i + 1).saturating_sub(1))
            } else {
                ceil_at(i)
            };
            lo.push(floor_at(i).saturating_sub(radius));
            hi.push((reach + radius).min(m - 1));
        }

        Self { lo, hi }
    }

    pub(crate) fn contains(&self, i: usize, j: usize) -> bool {
        j >= self.lo[i] && j <= self.hi[i]
    }

    pub(crate) fn columns(&self, i: usize) -> std::ops::RangeInclusive<usize> {
        self.lo[i]..=self.hi[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_metric_parsing() {
        assert_eq!("DTW".parse::<Metric>().unwrap(), Metric::Dtw);
        assert_eq!("msm".parse::<Metric>().unwrap().to_string(), "msm");
        assert!("manhattan".parse::<Metric>().is_err());
    }

    #[test]
    fn test_band_zero_window_is_diagonal() {
        let band = Band::sakoe_chiba(4, 4, 0.0);
        for i in 0..4 {
            assert_eq!(band.columns(i), i..=i);
        }
    }

    #[test]
    fn test_band_full_window_covers_matrix() {
        let band = Band::sakoe_chiba(3, 5, 1.0);
        for i in 0..3 {
            assert_eq!(band.columns(i), 0..=4);
        }
    }

    #[test]
    fn test_band_unequal_lengths_stays_connected() {
        let band = Band::sakoe_chiba(3, 7, 0.0);
        assert!(band.contains(0, 0));
        assert!(band.contains(2, 6));
        for i in 1..3 {
            assert!(band.lo[i] <= band.hi[i - 1] + 1);
        }
    }

    #[test]
    fn test_distance_rejects_channel_mismatch() {
        let x = array![[1.0, 2.0]];
        let y = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(distance(x.view(), y.view(), Metric::Dtw, &DistanceParams::default()).is_err());
    }

    #[test]
    fn test_pairwise_distance_is_symmetric() {
        let x = array![[0.0, 0.0], [3.0, 4.0], [6.0, 8.0]];
        let x = TimeSeriesCollection::from_matrix(&x).unwrap();
        let d = pairwise_distance(&x, Metric::Euclidean, &DistanceParams::default()).unwrap();

        assert!((d[[0, 1]] - 5.0).abs() < 1e-10);
        assert!((d[[0, 2]] - 10.0).abs() < 1e-10);
        assert_eq!(d[[1, 2]], d[[2, 1]]);
        assert_eq!(d[[1, 1]], 0.0);
    }

    #[test]
    fn test_alignment_path_per_metric() {
        let x = array![[0.0, 1.0, 2.0, 1.0]];
        let y = array![[0.0, 2.0, 1.0]];
        let params = DistanceParams::default().epsilon(0.5);
        let elastic = [
            Metric::Dtw,
            Metric::Wdtw,
            Metric::Erp,
            Metric::Edr,
            Metric::Msm,
            Metric::Twe,
        ];
        for metric in elastic {
            let path = alignment_path(x.view(), y.view(), metric, &params).unwrap();
            assert_eq!(path.first(), Some(&(0, 0)), "{}", metric);
            assert_eq!(path.last(), Some(&(3, 2)), "{}", metric);
        }

        let lcss = alignment_path(x.view(), y.view(), Metric::Lcss, &params).unwrap();
        assert!(lcss.iter().all(|&(i, j)| (x[[0, i]] - y[[0, j]]).abs() <= 0.5));

        let same = alignment_path(x.view(), x.view(), Metric::Euclidean, &params).unwrap();
        assert_eq!(same, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
        assert!(alignment_path(x.view(), y.view(), Metric::Squared, &params).is_err());
    }

    #[test]
    fn test_params_validation() {
        assert!(DistanceParams::default().validate().is_ok());
        assert!(DistanceParams::default().window(1.5).validate().is_err());
        assert!(DistanceParams::default().c(-1.0).validate().is_err());
    }
}
