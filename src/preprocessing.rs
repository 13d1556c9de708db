use ndarray::{s, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dataset::TimeSeriesCollection;
use crate::{EvalError, Matrix, Result, Vector};

/// Column-wise standardisation. Constant columns are centred but not scaled.
#[derive(Clone, Debug, Default)]
pub struct StandardScaler {
    mean: Option<Vector>,
    std: Option<Vector>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self { mean: None, std: None }
    }

    pub fn fit(&mut self, data: &Matrix) -> Result<()> {
        let mean = data.mean_axis(Axis(0)).ok_or_else(|| {
            EvalError::InvalidInput("cannot fit a scaler on empty data".to_string())
        })?;
        let std = data
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 { s } else { 1.0 });

        self.mean = Some(mean);
        self.std = Some(std);
        Ok(())
    }

    pub fn transform(&self, data: &Matrix) -> Result<Matrix> {
        let (mean, std) = match (self.mean.as_ref(), self.std.as_ref()) {
            (Some(mean), Some(std)) => (mean, std),
            _ => return Err(EvalError::NotFitted("StandardScaler")),
        };
        if data.ncols() != mean.len() {
            return Err(EvalError::DimensionMismatch {
                expected: mean.len(),
                got: data.ncols(),
            });
        }

        let mut result = data.clone();
        for mut row in result.axis_iter_mut(Axis(0)) {
            row -= mean;
            row /= std;
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, data: &Matrix) -> Result<Matrix> {
        self.fit(data)?;
        self.transform(data)
    }
}

/// Z-normalises every channel of every case on its own.
pub fn normalise_series(x: &TimeSeriesCollection) -> Result<TimeSeriesCollection> {
    let mut cases = Vec::with_capacity(x.n_cases());
    for case in x.iter() {
        // The scaler works on columns, so scale the (time, channel) view.
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&case.t().to_owned())?;
        cases.push(scaled.reversed_axes());
    }
    TimeSeriesCollection::new(cases)
}

/// Maps string class labels onto `0..n_classes` in sorted label order.
#[derive(Clone, Debug, Default)]
pub struct LabelEncoder {
    classes: Option<Vec<String>>,
}

impl LabelEncoder {
    pub fn new() -> Self {
        Self { classes: None }
    }

    pub fn fit(&mut self, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Err(EvalError::InvalidInput(
                "cannot fit a label encoder on no labels".to_string(),
            ));
        }
        let mut classes = labels.to_vec();
        classes.sort();
        classes.dedup();
        self.classes = Some(classes);
        Ok(())
    }

    pub fn transform(&self, labels: &[String]) -> Result<Vec<usize>> {
        let classes = self.classes.as_ref().ok_or(EvalError::NotFitted("LabelEncoder"))?;
        labels
            .iter()
            .map(|label| {
                classes.binary_search(label).map_err(|_| {
                    EvalError::InvalidInput(format!("label '{}' was not seen in fit", label))
                })
            })
            .collect()
    }

    pub fn fit_transform(&mut self, labels: &[String]) -> Result<Vec<usize>> {
        self.fit(labels)?;
        self.transform(labels)
    }

    pub fn classes(&self) -> Option<&[String]> {
        self.classes.as_deref()
    }

    /// Renders the mapping as `{'a': 0, 'b': 1}` for results file headers.
    pub fn encoding_description(&self) -> String {
        let entries: Vec<String> = self
            .classes
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, label)| format!("'{}': {}", label, i))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PadLength {
    /// Shortest case seen in fit.
    Min,
    /// Longest case seen in fit.
    Max,
    Fixed(usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FillValue {
    Constant(f64),
    Mean,
    Median,
    Min,
    Max,
    Last,
}

impl FillValue {
    fn value_for(&self, channel: ndarray::ArrayView1<'_, f64>) -> f64 {
        match self {
            FillValue::Constant(v) => *v,
            FillValue::Mean => channel.mean().unwrap_or(0.0),
            FillValue::Median => {
                let mut values = channel.to_vec();
                values.sort_by(|a, b| a.total_cmp(b));
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                }
            }
            FillValue::Min => channel.iter().copied().fold(f64::INFINITY, f64::min),
            FillValue::Max => channel.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            FillValue::Last => channel[channel.len() - 1],
        }
    }
}

/// Pads unequal length cases to a common length.
#[derive(Clone, Debug)]
pub struct Padder {
    pad_length: PadLength,
    fill_value: FillValue,
    add_noise: Option<f64>,
    error_on_long: bool,
    random_state: Option<u64>,
    fitted_length: Option<usize>,
}

impl Padder {
    pub fn new(pad_length: PadLength) -> Self {
        Self {
            pad_length,
            fill_value: FillValue::Constant(0.0),
            add_noise: None,
            error_on_long: true,
            random_state: None,
            fitted_length: None,
        }
    }

    pub fn fill_value(mut self, fill_value: FillValue) -> Self {
        self.fill_value = fill_value;
        self
    }

    pub fn add_noise(mut self, add_noise: f64) -> Self {
        if add_noise <= 0.0 {
            panic!("add_noise must be > 0, got {}", add_noise);
        }
        self.add_noise = Some(add_noise);
        self
    }

    pub fn error_on_long(mut self, error_on_long: bool) -> Self {
        self.error_on_long = error_on_long;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    pub fn fit(&mut self, x: &TimeSeriesCollection) -> Result<()> {
        self.fitted_length = Some(match self.pad_length {
            PadLength::Min => x.min_length(),
            PadLength::Max => x.max_length(),
            PadLength::Fixed(n) => n,
        });
        Ok(())
    }

    pub fn transform(&self, x: &TimeSeriesCollection) -> Result<TimeSeriesCollection> {
        let pad_length = match self.pad_length {
            PadLength::Fixed(n) => n,
            _ => self.fitted_length.ok_or(EvalError::NotFitted("Padder"))?,
        };

        if self.error_on_long && x.max_length() > pad_length {
            return Err(EvalError::InvalidInput(format!(
                "series of length {} is longer than the pad length {}",
                x.max_length(),
                pad_length
            )));
        }

        let mut rng = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut cases = Vec::with_capacity(x.n_cases());
        for case in x.iter() {
            let length = case.ncols();
            if length >= pad_length {
                cases.push(case.to_owned());
                continue;
            }

            let mut padded = Array2::zeros((case.nrows(), pad_length));
            for (c, channel) in case.rows().into_iter().enumerate() {
                let fill = self.fill_value.value_for(channel);
                let mut row = padded.row_mut(c);
                row.slice_mut(s![..length]).assign(&channel);
                row.slice_mut(s![length..]).fill(fill);
                if let Some(noise) = self.add_noise {
                    let range = Uniform::new(0.0, noise);
                    let jitter = Vector::random_using(pad_length - length, range, &mut rng);
                    let mut tail = row.slice_mut(s![length..]);
                    tail += &jitter;
                }
            }
            cases.push(padded);
        }

        TimeSeriesCollection::new(cases)
    }

    pub fn fit_transform(&mut self, x: &TimeSeriesCollection) -> Result<TimeSeriesCollection> {
        self.fit(x)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let mut scaler = StandardScaler::new();

        let scaled = scaler.fit_transform(&data).unwrap();
        assert_eq!(scaled.shape(), data.shape());
        let means = scaled.mean_axis(Axis(0)).unwrap();
        assert!(means.iter().all(|m| m.abs() < 1e-10));
    }

    #[test]
    fn test_standard_scaler_constant_column() {
        let data = array![[1.0, 3.0], [1.0, 5.0]];
        let scaled = StandardScaler::new().fit_transform(&data).unwrap();
        assert_eq!(scaled.column(0), array![0.0, 0.0]);
    }

    #[test]
    fn test_normalise_series_per_channel() {
        let case = array![[1.0, 2.0, 3.0], [10.0, 10.0, 10.0]];
        let x = TimeSeriesCollection::new(vec![case]).unwrap();
        let z = normalise_series(&x).unwrap();
        let case = z.case(0);

        assert!(case.row(0).mean().unwrap().abs() < 1e-10);
        assert!((case.row(0).std(0.0) - 1.0).abs() < 1e-10);
        assert_eq!(case.row(1), array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_label_encoder() {
        let labels: Vec<String> = ["b", "a", "c", "a"].iter().map(|s| s.to_string()).collect();
        let mut encoder = LabelEncoder::new();
        let encoded = encoder.fit_transform(&labels).unwrap();

        assert_eq!(encoded, vec![1, 0, 2, 0]);
        assert_eq!(encoder.encoding_description(), "{'a': 0, 'b': 1, 'c': 2}");
        assert!(encoder.transform(&["d".to_string()]).is_err());
        assert!(LabelEncoder::new().transform(&labels).is_err());
    }

    #[test]
    fn test_padder_max_and_fill() {
        let x = TimeSeriesCollection::new(vec![array![[1.0, 2.0, 3.0]], array![[4.0]]]).unwrap();

        let padded = Padder::new(PadLength::Max).fit_transform(&x).unwrap();
        assert!(padded.is_equal_length());
        assert_eq!(padded.case(1), array![[4.0, 0.0, 0.0]]);

        let padded = Padder::new(PadLength::Fixed(4))
            .fill_value(FillValue::Last)
            .fit_transform(&x)
            .unwrap();
        assert_eq!(padded.case(0), array![[1.0, 2.0, 3.0, 3.0]]);
    }

    #[test]
    fn test_padder_rejects_long_series() {
        let x = TimeSeriesCollection::new(vec![array![[1.0, 2.0, 3.0]], array![[4.0]]]).unwrap();
        assert!(Padder::new(PadLength::Fixed(2)).fit_transform(&x).is_err());

        let kept = Padder::new(PadLength::Min).error_on_long(false).fit_transform(&x).unwrap();
        assert_eq!(kept.case(0).ncols(), 3);
    }

    #[test]
    fn test_padder_noise_stays_in_range() {
        let x =
            TimeSeriesCollection::new(vec![array![[1.0, 1.0, 1.0, 1.0]], array![[1.0]]]).unwrap();
        let padded = Padder::new(PadLength::Max)
            .add_noise(0.5)
            .random_state(0)
            .fit_transform(&x)
            .unwrap();

        for v in padded.case(1).iter().skip(1) {
            assert!(*v >= 0.0 && *v < 0.5);
        }
    }
}
