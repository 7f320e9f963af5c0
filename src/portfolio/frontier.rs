//! # Efficient Frontier
//!
//! $$
//! r^\*_k = \mu_{\min} + \frac{k}{N-1}(\mu_{\max}-\mu_{\min}),\quad k = 0,\dots,N-1
//! $$
//!
//! Sweep of target returns through the target-return optimizer.

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use super::market::MarketModel;
use super::optimizers::OptimizerConfig;
use super::optimizers::min_variance_for_target;
use super::types::FrontierCurve;
use super::types::FrontierPoint;

/// `points` evenly spaced targets between the lowest and highest
/// single-asset expected return.
pub fn target_grid(lo: f64, hi: f64, points: usize) -> Vec<f64> {
  match points {
    0 => Vec::new(),
    1 => vec![lo],
    _ => {
      let step = (hi - lo) / (points - 1) as f64;
      // Pin the last level so rounding never pushes it past `hi`.
      (0..points)
        .map(|k| if k == points - 1 { hi } else { lo + step * k as f64 })
        .collect()
    }
  }
}

/// Trace the frontier. Levels the optimizer cannot solve are dropped, so the
/// curve holds only feasible points, sorted by ascending risk.
#[instrument(skip_all, fields(assets = model.n_assets(), points = points))]
pub fn efficient_frontier(model: &MarketModel, points: usize, cfg: &OptimizerConfig) -> FrontierCurve {
  let (lo, hi) = model.return_range();
  let targets = target_grid(lo, hi, points);

  let results: Vec<_> = targets
    .par_iter()
    .map(|&target| (target, min_variance_for_target(model, target, cfg)))
    .collect();

  // Warnings are emitted on the calling thread, inside the frontier span.
  let mut solved: Vec<FrontierPoint> = results
    .into_iter()
    .filter_map(|(target, res)| match res {
      Ok(p) => Some(FrontierPoint::new(p.volatility, p.expected_return, p.weights)),
      Err(err) => {
        warn!(target, error = %err, "frontier level dropped");
        None
      }
    })
    .collect();

  solved.sort_by_key(|p| (OrderedFloat(p.risk), OrderedFloat(p.expected_return)));
  debug!(requested = points, solved = solved.len(), "efficient frontier traced");

  FrontierCurve {
    assets: model.assets().to_vec(),
    points: solved,
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::Array2;
  use ndarray::array;
  use tracing_test::traced_test;

  use super::*;

  fn model() -> MarketModel {
    let cov = array![[0.04, 0.006, 0.0], [0.006, 0.09, 0.012], [0.0, 0.012, 0.16]];
    MarketModel::from_parts(
      vec!["A".into(), "B".into(), "C".into()],
      array![0.04, 0.08, 0.12],
      cov,
      Array2::zeros((4, 3)),
    )
    .unwrap()
  }

  #[test]
  fn grid_spans_range() {
    assert!(target_grid(0.0, 1.0, 0).is_empty());
    assert_eq!(target_grid(0.1, 0.3, 1), vec![0.1]);
    let g = target_grid(0.1, 0.3, 5);
    assert_eq!(g.len(), 5);
    assert_eq!(g[0], 0.1);
    assert_eq!(g[4], 0.3);
    assert_abs_diff_eq!(g[2], 0.2, epsilon = 1e-15);
  }

  #[test]
  fn frontier_is_sorted_and_long_only() {
    let curve = efficient_frontier(&model(), 10, &OptimizerConfig::default());
    assert_eq!(curve.len(), 10);
    for w in curve.points.windows(2) {
      assert!(w[0].risk <= w[1].risk);
    }
    for p in &curve.points {
      assert_abs_diff_eq!(p.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
      assert!(p.weights.iter().all(|w| (0.0..=1.0).contains(w)));
    }
    let top = curve.points.last().unwrap();
    assert_abs_diff_eq!(top.expected_return, 0.12, epsilon = 1e-9);
  }

  #[test]
  fn zero_points_gives_empty_curve() {
    let curve = efficient_frontier(&model(), 0, &OptimizerConfig::default());
    assert!(curve.is_empty());
    assert_eq!(curve.assets.len(), 3);
  }

  #[traced_test]
  #[test]
  fn unsolved_levels_are_dropped() {
    // No solver iterations: only the endpoints and the level met by the
    // equal-weight start survive.
    let cfg = OptimizerConfig {
      max_iters: 0,
      ..OptimizerConfig::default()
    };
    let curve = efficient_frontier(&model(), 5, &cfg);
    assert!(curve.len() < 5);
    assert!(!curve.is_empty());
    for w in curve.points.windows(2) {
      assert!(w[0].risk <= w[1].risk);
    }
    let returns: Vec<f64> = curve.points.iter().map(|p| p.expected_return).collect();
    assert!(returns.iter().any(|r| (r - 0.04).abs() < 1e-9));
    assert!(returns.iter().any(|r| (r - 0.12).abs() < 1e-9));
    assert!(logs_contain("frontier level dropped"));
  }
}
