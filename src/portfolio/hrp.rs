//! # Hierarchical Risk Parity
//!
//! $$
//! d_{ij} = \sqrt{\tfrac{1-\rho_{ij}}{2}},\qquad
//! \alpha = 1 - \frac{V_L}{V_L + V_R}
//! $$
//!
//! Correlation-distance clustering, quasi-diagonal ordering and recursive
//! bisection. No matrix inversion is involved.

use std::collections::VecDeque;

use ndarray::Array2;
use tracing::debug;

use super::linkage::Linkage;
use crate::data::returns::ReturnPanel;
use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;
use crate::stats::covariance::CovarianceEstimator;
use crate::stats::covariance::corr_from_cov;

/// HRP weights together with the tree they were derived from.
#[derive(Clone, Debug, PartialEq)]
pub struct HrpAllocation {
  /// Weights in the input asset order, summing to one.
  pub weights: Vec<f64>,
  /// Quasi-diagonal permutation of the asset indices.
  pub order: Vec<usize>,
  pub linkage: Linkage,
}

/// Metric distance `sqrt((1 - rho) / 2)` for every pair.
pub fn correlation_distance(corr: &Array2<f64>) -> Array2<f64> {
  corr.mapv(|rho| ((1.0 - rho) / 2.0).max(0.0).sqrt())
}

/// Variance of an equally weighted sub-basket.
fn cluster_variance(indices: &[usize], cov: &Array2<f64>) -> f64 {
  let w = 1.0 / indices.len() as f64;
  let mut var = 0.0;
  for &a in indices {
    for &b in indices {
      var += cov[[a, b]];
    }
  }
  var * w * w
}

/// Split ordered clusters by position until every cluster is a single asset.
fn recursive_bisection(order: &[usize], cov: &Array2<f64>) -> Vec<f64> {
  let mut weights = vec![1.0; cov.nrows()];
  let mut clusters = VecDeque::from([order]);

  while let Some(cluster) = clusters.pop_front() {
    if cluster.len() <= 1 {
      continue;
    }
    let (left, right) = cluster.split_at(cluster.len() / 2);
    let var_left = cluster_variance(left, cov);
    let var_right = cluster_variance(right, cov);
    let denom = var_left + var_right;
    let alpha = if denom > 0.0 { 1.0 - var_left / denom } else { 0.5 };

    for &i in left {
      weights[i] *= alpha;
    }
    for &i in right {
      weights[i] *= 1.0 - alpha;
    }
    clusters.push_back(left);
    clusters.push_back(right);
  }

  weights
}

/// HRP weights from a covariance matrix and its correlation matrix.
pub fn hrp_weights(cov: &Array2<f64>, corr: &Array2<f64>) -> AnalyticsResult<HrpAllocation> {
  let n = cov.nrows();
  if n == 0 {
    return Err(AnalyticsError::input("HRP needs at least one asset"));
  }
  if cov.dim() != (n, n) || corr.dim() != (n, n) {
    return Err(AnalyticsError::input(format!(
      "covariance {:?} and correlation {:?} must both be {n}x{n}",
      cov.dim(),
      corr.dim()
    )));
  }
  if cov.iter().chain(corr.iter()).any(|v| !v.is_finite()) {
    return Err(AnalyticsError::unstable("HRP inputs hold non-finite values"));
  }

  // Rows of the distance matrix are the clustering features.
  let linkage = Linkage::ward(&correlation_distance(corr))?;
  let order = linkage.quasi_diagonal();
  let mut weights = recursive_bisection(&order, cov);

  let total: f64 = weights.iter().sum();
  if total <= 0.0 || !total.is_finite() {
    return Err(AnalyticsError::unstable("HRP weights collapsed to zero"));
  }
  for w in &mut weights {
    *w /= total;
  }

  debug!(assets = n, ?order, "hrp allocation");
  Ok(HrpAllocation {
    weights,
    order,
    linkage,
  })
}

/// HRP on a return panel with a pluggable covariance estimator.
///
/// A single asset gets weight one without any estimation. Fewer than two
/// return observations is an insufficient-data error; callers wanting an
/// allocation anyway should fall back to equal weights explicitly.
pub fn hrp_from_returns<E: CovarianceEstimator + ?Sized>(
  returns: &ReturnPanel,
  estimator: &E,
) -> AnalyticsResult<HrpAllocation> {
  match returns.n_assets() {
    0 => Err(AnalyticsError::input("HRP needs at least one asset")),
    1 => Ok(HrpAllocation {
      weights: vec![1.0],
      order: vec![0],
      linkage: Linkage::ward(&Array2::zeros((1, 1)))?,
    }),
    _ => {
      let cov = estimator.covariance(returns.matrix())?;
      let corr = corr_from_cov(&cov);
      hrp_weights(&cov, &corr)
    }
  }
}
