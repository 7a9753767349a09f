//! Ordinary least squares regression
//!
//! Fits `y = intercept + coefficients · x` without regularization. Inputs
//! are centered so the intercept falls out of the means, and the normal
//! equations are solved through a symmetric eigendecomposition of `XᵀX`.
//! Directions with (numerically) zero variance are dropped, which yields the
//! minimum-norm solution for constant channels or fewer rows than features.

use crate::error::{PipelineError, Result};
use linfa_linalg::eigh::EighInto;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Relative eigenvalue cutoff below which a direction counts as degenerate
const RANK_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegression {
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(PipelineError::Training(format!(
                "cannot fit a regressor on a {}x{} feature matrix",
                x.nrows(),
                x.ncols()
            )));
        }
        if x.nrows() != y.len() {
            return Err(PipelineError::Training(format!(
                "feature rows ({}) and targets ({}) differ in length",
                x.nrows(),
                y.len()
            )));
        }

        let n = x.nrows() as f64;
        let x_mean = x.sum_axis(Axis(0)) / n;
        let y_mean = y.sum() / n;

        let centered = &x - &x_mean;
        let gram = centered.t().dot(&centered);
        let moment = centered.t().dot(&(&y - y_mean));

        let (eigenvalues, eigenvectors) = gram
            .eigh_into()
            .map_err(|e| PipelineError::Training(format!("least squares solve failed: {e}")))?;

        let largest = eigenvalues.fold(0.0_f64, |acc, v| acc.max(*v));
        let cutoff = largest * RANK_TOLERANCE;
        let projections = eigenvectors.t().dot(&moment);
        let scaled: Array1<f64> = eigenvalues
            .iter()
            .zip(projections.iter())
            .map(|(&lambda, &p)| if largest > 0.0 && lambda > cutoff { p / lambda } else { 0.0 })
            .collect();
        let coefficients = eigenvectors.dot(&scaled);
        let intercept = y_mean - coefficients.dot(&x_mean);

        Ok(Self {
            coefficients: coefficients.to_vec(),
            intercept,
        })
    }

    pub fn predict(&self, features: ArrayView1<f64>) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.iter())
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }

    pub fn predict_batch(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict(row)).collect()
    }

    /// R² on the given rows
    pub fn score(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> f64 {
        super::r2_score(y, self.predict_batch(x).view())
    }
}
