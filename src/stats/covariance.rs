//! # Covariance
//!
//! $$
//! \Sigma_{ij} = \sigma_i \sigma_j \rho_{ij},\qquad
//! \hat\Sigma_{\text{LW}} = \delta\, m I + (1-\delta) S
//! $$
//!
//! Pluggable covariance estimators, correlation construction and the
//! positive-semidefiniteness check used before any allocation.

use nalgebra::DMatrix;
use ndarray::Array2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use tracing::debug;

use crate::data::returns::ReturnPanel;
use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;

/// Estimates a per-period covariance matrix from a `periods × assets`
/// return matrix.
pub trait CovarianceEstimator {
  fn covariance(&self, returns: &Array2<f64>) -> AnalyticsResult<Array2<f64>>;
}

fn ensure_observations(returns: &Array2<f64>) -> AnalyticsResult<()> {
  if returns.ncols() == 0 {
    return Err(AnalyticsError::input("return matrix has no assets"));
  }
  if returns.nrows() < 2 {
    return Err(AnalyticsError::insufficient(2, returns.nrows()));
  }
  Ok(())
}

/// Unbiased sample covariance (`n - 1` denominator).
#[derive(Clone, Copy, Debug, Default)]
pub struct SampleCovariance;

impl CovarianceEstimator for SampleCovariance {
  fn covariance(&self, returns: &Array2<f64>) -> AnalyticsResult<Array2<f64>> {
    ensure_observations(returns)?;
    returns
      .t()
      .cov(1.0)
      .map_err(|e| AnalyticsError::unstable(format!("sample covariance failed: {e}")))
  }
}

/// Ledoit-Wolf shrinkage towards a scaled identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct LedoitWolf;

impl LedoitWolf {
  /// Shrunk covariance and the shrinkage intensity in `[0, 1]`.
  pub fn estimate(&self, returns: &Array2<f64>) -> AnalyticsResult<(Array2<f64>, f64)> {
    ensure_observations(returns)?;
    let (t, n) = returns.dim();
    let mean = returns
      .mean_axis(Axis(0))
      .ok_or_else(|| AnalyticsError::insufficient(2, t))?;
    let x = returns - &mean;
    let s = x.t().dot(&x) / t as f64;

    let m = s.diag().sum() / n as f64;
    let mut target = Array2::<f64>::eye(n);
    target *= m;
    let d2 = (&s - &target).mapv(|v| v * v).sum() / n as f64;

    let mut b2_bar = 0.0;
    for row in x.axis_iter(Axis(0)) {
      let mut acc = 0.0;
      for i in 0..n {
        for j in 0..n {
          let v = row[i] * row[j] - s[[i, j]];
          acc += v * v;
        }
      }
      b2_bar += acc / n as f64;
    }
    b2_bar /= (t * t) as f64;

    let shrinkage = if d2 > 0.0 { b2_bar.min(d2) / d2 } else { 0.0 };
    debug!(shrinkage, "ledoit-wolf shrinkage intensity");
    Ok((&target * shrinkage + &s * (1.0 - shrinkage), shrinkage))
  }
}

impl CovarianceEstimator for LedoitWolf {
  fn covariance(&self, returns: &Array2<f64>) -> AnalyticsResult<Array2<f64>> {
    self.estimate(returns).map(|(cov, _)| cov)
  }
}

/// Estimator selection for configuration structs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CovarianceMethod {
  #[default]
  Sample,
  LedoitWolf,
}

impl CovarianceEstimator for CovarianceMethod {
  fn covariance(&self, returns: &Array2<f64>) -> AnalyticsResult<Array2<f64>> {
    match self {
      CovarianceMethod::Sample => SampleCovariance.covariance(returns),
      CovarianceMethod::LedoitWolf => LedoitWolf.covariance(returns),
    }
  }
}

/// Correlation implied by a covariance matrix. Zero-variance assets get zero
/// correlation with everything else.
pub fn corr_from_cov(cov: &Array2<f64>) -> Array2<f64> {
  let n = cov.nrows();
  let sd: Vec<f64> = (0..n).map(|i| cov[[i, i]].max(0.0).sqrt()).collect();

  Array2::from_shape_fn((n, n), |(i, j)| {
    let denom = sd[i] * sd[j];
    if i == j {
      1.0
    } else if denom > 1e-15 {
      (cov[[i, j]] / denom).clamp(-1.0, 1.0)
    } else {
      0.0
    }
  })
}

/// Pearson correlation matrix of a return panel.
pub fn correlation_matrix(returns: &ReturnPanel) -> AnalyticsResult<Array2<f64>> {
  SampleCovariance
    .covariance(returns.matrix())
    .map(|cov| corr_from_cov(&cov))
}

/// Build a covariance matrix from per-asset volatilities and a correlation
/// matrix.
pub fn covariance_from_corr(sigmas: &[f64], corr: &Array2<f64>) -> Array2<f64> {
  let n = sigmas.len();
  Array2::from_shape_fn((n, n), |(i, j)| {
    let c = corr
      .get((i, j))
      .copied()
      .unwrap_or(if i == j { 1.0 } else { 0.0 });
    sigmas[i] * sigmas[j] * c
  })
}

/// Extreme eigenvalues of a symmetric matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spectrum {
  pub min: f64,
  pub max: f64,
}

/// Verify that `cov` is square, finite, symmetric and positive
/// semidefinite up to a relative tolerance.
pub fn check_psd(cov: &Array2<f64>) -> AnalyticsResult<Spectrum> {
  let (rows, cols) = cov.dim();
  if rows != cols {
    return Err(AnalyticsError::input(format!(
      "covariance must be square, got {rows}x{cols}"
    )));
  }
  if rows == 0 {
    return Err(AnalyticsError::input("covariance is empty"));
  }
  if cov.iter().any(|v| !v.is_finite()) {
    return Err(AnalyticsError::unstable("covariance holds non-finite entries"));
  }

  let scale = cov.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
  let asymmetric = (0..rows)
    .flat_map(|i| (0..i).map(move |j| (i, j)))
    .any(|(i, j)| (cov[[i, j]] - cov[[j, i]]).abs() > 1e-10 * scale.max(1e-300));
  if asymmetric {
    return Err(AnalyticsError::unstable("covariance is not symmetric"));
  }

  let m = DMatrix::from_fn(rows, cols, |i, j| cov[[i, j]]);
  let eigenvalues = m.symmetric_eigenvalues();
  let min = eigenvalues.min();
  let max = eigenvalues.max();

  if min < -1e-8 * max.abs().max(1e-300) {
    return Err(AnalyticsError::unstable(format!(
      "covariance is not positive semidefinite (min eigenvalue {min:e})"
    )));
  }

  Ok(Spectrum {
    min: min.max(0.0),
    max: max.max(0.0),
  })
}
