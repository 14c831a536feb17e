//! Statistical operations applied to windowed samples.
//!
//! `Operation` is a closed enum mapping each configured operation name to a
//! pure function over `&[f64]`. Operation names coming from configuration are
//! resolved through `FromStr`, never by evaluating text as code.
//!
//! Numeric contracts:
//! - every operation rejects an empty sample (`EmptySample`)
//! - every operation rejects NaN inputs (`NonFiniteSample`)
//! - `stdev` is the sample standard deviation (n - 1 denominator) and
//!   requires at least two values (`InsufficientSample`)
//! - `q1`/`q3` use 4-division exclusive-method quantiles with linear
//!   interpolation; defined for any sample of two or more values, and a
//!   single-element sample yields that element

use crate::kafka_aggregator::error::StatisticsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The supported window aggregation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Min,
    Q1,
    Mean,
    Median,
    Stdev,
    Q3,
    Max,
}

impl Operation {
    /// All supported operations, in canonical order.
    pub const ALL: [Operation; 7] = [
        Operation::Min,
        Operation::Q1,
        Operation::Mean,
        Operation::Median,
        Operation::Stdev,
        Operation::Q3,
        Operation::Max,
    ];

    /// The operation name used in configuration and derived field names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Min => "min",
            Operation::Q1 => "q1",
            Operation::Mean => "mean",
            Operation::Median => "median",
            Operation::Stdev => "stdev",
            Operation::Q3 => "q3",
            Operation::Max => "max",
        }
    }

    /// Comma-separated list of the supported operation names, for error
    /// messages.
    pub fn supported() -> String {
        Operation::ALL
            .iter()
            .map(|op| op.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Apply the operation to a sample of values.
    pub fn apply(&self, values: &[f64]) -> Result<f64, StatisticsError> {
        let name = self.as_str();
        if values.is_empty() {
            return Err(StatisticsError::EmptySample { operation: name });
        }
        if values.iter().any(|v| v.is_nan()) {
            return Err(StatisticsError::NonFiniteSample { operation: name });
        }
        match self {
            Operation::Min => Ok(fold_min(values)),
            Operation::Max => Ok(fold_max(values)),
            Operation::Mean => Ok(mean(values)),
            Operation::Median => Ok(median(values)),
            Operation::Stdev => stdev(values),
            Operation::Q1 => Ok(quartile(values, 1)),
            Operation::Q3 => Ok(quartile(values, 3)),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" => Ok(Operation::Min),
            "q1" => Ok(Operation::Q1),
            "mean" => Ok(Operation::Mean),
            "median" => Ok(Operation::Median),
            "stdev" => Ok(Operation::Stdev),
            "q3" => Ok(Operation::Q3),
            "max" => Ok(Operation::Max),
            other => Err(format!(
                "Invalid operation '{}'. Allowed values are: {}.",
                other,
                Operation::supported()
            )),
        }
    }
}

fn fold_min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn fold_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("NaN rejected before sorting"));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn stdev(values: &[f64]) -> Result<f64, StatisticsError> {
    let n = values.len();
    if n < 2 {
        return Err(StatisticsError::InsufficientSample {
            operation: "stdev",
            required: 2,
            actual: n,
        });
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    Ok(variance.sqrt())
}

/// The i-th quartile cut point (i in 1..=3), exclusive method.
///
/// Matches `statistics.quantiles(data, n=4)` from the Python standard
/// library: cut points are linearly interpolated at position i*(n+1)/4 with
/// the index clamped to the data range. A one-element sample degenerates to
/// that element instead of erroring, so small windows still aggregate.
fn quartile(values: &[f64], i: i64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("NaN rejected before sorting"));
    let ld = sorted.len() as i64;
    if ld == 1 {
        return sorted[0];
    }
    let m = ld + 1;
    let j = (i * m / 4).clamp(1, ld - 1);
    // Exact integer math; delta may leave [0, 4) when j was clamped.
    let delta = i * m - j * 4;
    (sorted[(j - 1) as usize] * (4 - delta) as f64 + sorted[j as usize] * delta as f64) / 4.0
}
