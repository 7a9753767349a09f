//! Model fitting primitives
//!
//! - Ordinary least squares regression for the next temperature
//! - Random forest classification for the next rain flag
//! - Seeded train/test splitting and the scores used to report fit quality
//!
//! Feature matrices are `ndarray` arrays with one row per labeled reading.

mod forest;
mod linear;

pub use forest::{ClassPrediction, ForestParams, RandomForestClassifier};
pub use linear::LinearRegression;

use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of a train/test partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n` with a fixed seed and hold out `ceil(test_fraction * n)` rows
///
/// The same seed and size always give the same partition, so both targets
/// are evaluated on the same rows.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Split {
    let n_test = ((test_fraction * n as f64).ceil() as usize).min(n);
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Split {
        train,
        test: indices,
    }
}

/// Coefficient of determination
///
/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(actual: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let Some(mean) = actual.mean() else {
        return 0.0;
    };
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot = actual.mapv(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Fraction of exact matches
pub fn accuracy(actual: ArrayView1<i64>, predicted: ArrayView1<i64>) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let hits = actual.iter().zip(predicted.iter()).filter(|(a, p)| a == p).count();
    hits as f64 / actual.len() as f64
}
