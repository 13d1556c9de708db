//! Reader for the `.ts` time series file format.
//!
//! A file is a block of `@` header tags closed by `@data`, followed by one case
//! per line. Channels are separated by `:`, values by `,` and the final field
//! holds the class label or regression target. `?` marks a missing value.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;

use super::TimeSeriesCollection;
use crate::{EvalError, Result};

/// Header tags read before `@data`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TsHeader {
    pub problem_name: Option<String>,
    pub timestamps: bool,
    pub missing: bool,
    pub univariate: Option<bool>,
    pub dimensions: Option<usize>,
    pub equal_length: Option<bool>,
    pub series_length: Option<usize>,
    /// Declared class labels, empty for regression problems.
    pub class_labels: Vec<String>,
    pub target_label: bool,
}

pub fn load_ts_file(path: impl AsRef<Path>) -> Result<(TimeSeriesCollection, Vec<String>)> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    let (_, x, y) = parse_ts(&content, path)?;
    Ok((x, y))
}

pub(crate) fn parse_ts(
    content: &str,
    path: &Path,
) -> Result<(TsHeader, TimeSeriesCollection, Vec<String>)> {
    let err = |line: usize, message: String| EvalError::Parse {
        path: PathBuf::from(path),
        line,
        message,
    };

    let mut header = TsHeader::default();
    let mut in_data = false;
    let mut cases = Vec::new();
    let mut labels = Vec::new();
    let mut n_channels: Option<usize> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if !in_data {
            if !line.starts_with('@') {
                return Err(err(line_no, "data found before @data tag".to_string()));
            }
            let mut tokens = line.split_whitespace();
            let tag = tokens.next().unwrap_or_default().to_ascii_lowercase();
            let rest: Vec<&str> = tokens.collect();
            match tag.as_str() {
                "@problemname" => header.problem_name = rest.first().map(|s| s.to_string()),
                "@timestamps" => header.timestamps = parse_flag(&rest, line_no, &err)?,
                "@missing" => header.missing = parse_flag(&rest, line_no, &err)?,
                "@univariate" => header.univariate = Some(parse_flag(&rest, line_no, &err)?),
                "@equallength" => header.equal_length = Some(parse_flag(&rest, line_no, &err)?),
                "@dimension" | "@dimensions" => {
                    header.dimensions = Some(parse_count(&rest, line_no, &err)?)
                }
                "@serieslength" => header.series_length = Some(parse_count(&rest, line_no, &err)?),
                "@classlabel" => {
                    if parse_flag(&rest, line_no, &err)? {
                        header.class_labels = rest[1..].iter().map(|s| s.to_string()).collect();
                        if header.class_labels.is_empty() {
                            let message = "@classLabel true declares no labels".to_string();
                            return Err(err(line_no, message));
                        }
                    }
                }
                "@targetlabel" => header.target_label = parse_flag(&rest, line_no, &err)?,
                "@data" => in_data = true,
                _ => return Err(err(line_no, format!("unknown header tag {}", tag))),
            }
            continue;
        }

        if header.timestamps {
            return Err(err(line_no, "timestamped series are not supported".to_string()));
        }

        let fields: Vec<&str> = line.split(':').collect();
        let Some((label, channels)) = fields
            .split_last()
            .filter(|(_, channels)| !channels.is_empty())
        else {
            return Err(err(line_no, "expected at least one channel and a label".to_string()));
        };
        let label = label.trim().to_string();

        match n_channels {
            None => n_channels = Some(channels.len()),
            Some(n) if n != channels.len() => {
                let message = format!("expected {} channels, found {}", n, channels.len());
                return Err(err(line_no, message));
            }
            Some(_) => {}
        }

        let mut values: Vec<Vec<f64>> = Vec::with_capacity(channels.len());
        for channel in channels {
            let parsed = channel
                .split(',')
                .map(|v| parse_value(v.trim()))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|v| err(line_no, format!("invalid value '{}'", v)))?;
            values.push(parsed);
        }

        // Channels of one case must line up; pad the short ones with NaN.
        let length = values.iter().map(|v| v.len()).max().unwrap_or(0);
        let mut case = Array2::from_elem((values.len(), length), f64::NAN);
        for (c, channel) in values.iter().enumerate() {
            for (t, v) in channel.iter().enumerate() {
                case[[c, t]] = *v;
            }
        }

        if !header.class_labels.is_empty() && !header.class_labels.contains(&label) {
            return Err(err(line_no, format!("label '{}' is not a declared class", label)));
        }

        cases.push(case);
        labels.push(label);
    }

    if !in_data {
        return Err(err(content.lines().count(), "missing @data tag".to_string()));
    }
    if cases.is_empty() {
        return Err(err(content.lines().count(), "file contains no cases".to_string()));
    }
    if let Some(dims) = header.dimensions {
        if Some(dims) != n_channels {
            return Err(err(
                content.lines().count(),
                format!("@dimensions {} but data has {} channels", dims, n_channels.unwrap_or(0)),
            ));
        }
    }

    Ok((header, TimeSeriesCollection::new(cases)?, labels))
}

fn parse_value(v: &str) -> std::result::Result<f64, String> {
    if v == "?" || v.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    v.parse::<f64>().map_err(|_| v.to_string())
}

fn parse_flag(
    rest: &[&str],
    line: usize,
    err: &impl Fn(usize, String) -> EvalError,
) -> Result<bool> {
    match rest.first().map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        other => Err(err(line, format!("expected true or false, found {:?}", other))),
    }
}

fn parse_count(
    rest: &[&str],
    line: usize,
    err: &impl Fn(usize, String) -> EvalError,
) -> Result<usize> {
    rest.first()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| err(line, "expected a non-negative integer".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const UNIVARIATE: &str = "\
# comment line
@problemName Toy
@timeStamps false
@missing false
@univariate true
@equalLength true
@seriesLength 3
@classLabel true a b
@data
1.0,2.0,3.0:a
4,5,6:b
";

    #[test]
    fn test_parse_univariate() {
        let (header, x, y) = parse_ts(UNIVARIATE, Path::new("toy.ts")).unwrap();
        assert_eq!(header.problem_name.as_deref(), Some("Toy"));
        assert_eq!(header.class_labels, vec!["a", "b"]);
        assert_eq!(x.n_cases(), 2);
        assert_eq!(x.case(1), array![[4.0, 5.0, 6.0]]);
        assert_eq!(y, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_multivariate_unequal_with_missing() {
        let content = "@univariate false\n@dimensions 2\n@targetLabel true\n@data\n\
                       1,2:3,?:0.5\n1,2,3:4,5,6:1.5\n";
        let (header, x, y) = parse_ts(content, Path::new("m.ts")).unwrap();
        assert!(header.target_label);
        assert_eq!(x.n_channels(), 2);
        assert!(!x.is_equal_length());
        assert!(x.case(0)[[1, 1]].is_nan());
        assert_eq!(y, vec!["0.5", "1.5"]);
    }

    #[test]
    fn test_parse_errors_report_line() {
        let content = "@classLabel true a\n@data\n1,2,x:a\n";
        match parse_ts(content, Path::new("bad.ts")) {
            Err(EvalError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other),
        }

        let undeclared = "@classLabel true a\n@data\n1,2:b\n";
        assert!(parse_ts(undeclared, Path::new("bad.ts")).is_err());
        assert!(parse_ts("@univariate true\n", Path::new("bad.ts")).is_err());
        assert!(parse_ts("@data\n1,2:a\n1,2:3,4:b\n", Path::new("bad.ts")).is_err());
    }

    #[test]
    fn test_load_ts_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Toy_TRAIN.ts");
        fs::write(&path, UNIVARIATE).unwrap();

        let (x, y) = load_ts_file(&path).unwrap();
        assert_eq!(x.n_cases(), 2);
        assert_eq!(y.len(), 2);
        assert!(load_ts_file(dir.path().join("missing.ts")).is_err());
    }
}
