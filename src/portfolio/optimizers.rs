//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf{w}\in\Delta} \mathbf{w}^\top\Sigma\mathbf{w}
//! \quad\text{s.t.}\quad \mu^\top\mathbf{w} = r^\*
//! $$
//!
//! Long-only mean-variance, maximum-Sharpe and minimum-CVaR allocation.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;
use tracing::instrument;

use super::market::MarketModel;
use super::qp::Domain;
use super::qp::QpProblem;
use super::qp::QpSettings;
use super::qp::solve;
use super::types::Objective;
use super::types::OptimizedPortfolio;
use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;

/// Solver settings shared by every objective.
#[derive(Clone, Copy, Debug)]
pub struct OptimizerConfig {
  /// Annual risk-free rate for Sharpe.
  pub risk_free_rate: f64,
  /// Tail probability for CVaR.
  pub cvar_alpha: f64,
  /// Iteration cap per solver pass.
  pub max_iters: u64,
  /// Convergence tolerance on iterates and constraint residuals.
  pub tolerance: f64,
  /// Weights below this are zeroed before renormalizing.
  pub weight_cutoff: f64,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      risk_free_rate: 0.0,
      cvar_alpha: 0.05,
      max_iters: 20_000,
      tolerance: 1e-10,
      weight_cutoff: 1e-8,
    }
  }
}

impl OptimizerConfig {
  fn qp_settings(&self) -> QpSettings {
    QpSettings {
      max_iters: self.max_iters as usize,
      tolerance: self.tolerance,
    }
  }

  /// Largest residual accepted on the return constraint.
  fn residual_tolerance(&self, scale: f64) -> f64 {
    (self.tolerance * 1e4).max(1e-8) * scale.abs().max(1.0)
  }
}

fn softmax(x: &[f64]) -> Vec<f64> {
  if x.is_empty() {
    return Vec::new();
  }

  let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = x.iter().map(|&v| (v - max_x).exp()).collect();
  let sum: f64 = exps.iter().sum();

  if sum < 1e-15 {
    vec![1.0 / x.len() as f64; x.len()]
  } else {
    exps.iter().map(|&e| e / sum).collect()
  }
}

/// Mean loss over the worst `alpha` share of periods, as a positive number.
pub fn empirical_cvar(returns: &mut [f64], alpha: f64) -> f64 {
  if returns.is_empty() {
    return 0.0;
  }

  returns.sort_by(|a, b| a.total_cmp(b));
  let cutoff = ((returns.len() as f64) * alpha.clamp(0.0, 1.0)).ceil() as usize;
  let cutoff = cutoff.max(1).min(returns.len());
  let tail_mean: f64 = returns[..cutoff].iter().sum::<f64>() / cutoff as f64;

  -tail_mean
}

/// Clip to `[0, 1]`, zero dust below `cutoff` and renormalize to sum 1.
pub(crate) fn finalize_weights(raw: &Array1<f64>, cutoff: f64) -> AnalyticsResult<Array1<f64>> {
  if raw.iter().any(|w| !w.is_finite()) {
    return Err(AnalyticsError::unstable("solver returned non-finite weights"));
  }
  let mut w = raw.mapv(|x| {
    let c = x.clamp(0.0, 1.0);
    if c < cutoff { 0.0 } else { c }
  });
  let total = w.sum();
  if total <= 0.0 {
    return Err(AnalyticsError::unstable("solver returned all-zero weights"));
  }
  w /= total;
  Ok(w)
}

/// Performance summary of a weight vector under the model.
pub(crate) fn evaluate(model: &MarketModel, w: Array1<f64>, cfg: &OptimizerConfig) -> OptimizedPortfolio {
  let expected_return = model.expected_return(&w);
  let volatility = model.variance(&w).sqrt();
  let sharpe = (volatility > 0.0).then(|| (expected_return - cfg.risk_free_rate) / volatility);
  let mut scenario = model.scenario_returns(&w).to_vec();
  let cvar = empirical_cvar(&mut scenario, cfg.cvar_alpha);

  OptimizedPortfolio {
    weights: w.to_vec(),
    expected_return,
    volatility,
    sharpe,
    cvar,
  }
}

fn equal_start(n: usize) -> Array1<f64> {
  Array1::from_elem(n, 1.0 / n as f64)
}

fn min_variance_raw(model: &MarketModel, cfg: &OptimizerConfig) -> AnalyticsResult<Array1<f64>> {
  let n = model.n_assets();
  let problem = QpProblem {
    q: model.cov(),
    domain: Domain::Simplex,
    equality: None,
    max_eigenvalue: model.spectrum().max,
  };
  let sol = solve(&problem, equal_start(n), &cfg.qp_settings());
  if !sol.converged {
    debug!(iterations = sol.iterations, "min-variance stopped at iteration cap");
  }
  Ok(sol.x)
}

/// Minimum-variance long-only portfolio.
pub fn min_variance(model: &MarketModel, cfg: &OptimizerConfig) -> AnalyticsResult<OptimizedPortfolio> {
  let w = finalize_weights(&min_variance_raw(model, cfg)?, cfg.weight_cutoff)?;
  Ok(evaluate(model, w, cfg))
}

/// Minimum variance at an annualized target return.
///
/// Targets outside `[min mu, max mu]` are infeasible for a long-only
/// portfolio. A target at either end is met only by the assets sharing that
/// extreme return, so the problem reduces to min-variance over them.
pub fn min_variance_for_target(
  model: &MarketModel,
  target: f64,
  cfg: &OptimizerConfig,
) -> AnalyticsResult<OptimizedPortfolio> {
  if !target.is_finite() {
    return Err(AnalyticsError::input(format!("target return {target} is not finite")));
  }

  let (lo, hi) = model.return_range();
  let edge = 1e-12 * lo.abs().max(hi.abs()).max(1.0);
  if target > hi + edge || target < lo - edge {
    return Err(AnalyticsError::infeasible(format!(
      "target return {target:.6} outside attainable range [{lo:.6}, {hi:.6}]"
    )));
  }

  let n = model.n_assets();
  let extreme = if (target - hi).abs() <= edge {
    Some(hi)
  } else if (target - lo).abs() <= edge {
    Some(lo)
  } else {
    None
  };

  let raw = if let Some(level) = extreme {
    let idx: Vec<usize> = (0..n).filter(|&i| (model.mu()[i] - level).abs() <= edge).collect();
    let sub = model.subset(&idx)?;
    let sub_w = min_variance_raw(&sub, cfg)?;
    let mut w = Array1::zeros(n);
    for (k, &i) in idx.iter().enumerate() {
      w[i] = sub_w[k];
    }
    w
  } else {
    let problem = QpProblem {
      q: model.cov(),
      domain: Domain::Simplex,
      equality: Some((model.mu().clone(), target)),
      max_eigenvalue: model.spectrum().max,
    };
    let sol = solve(&problem, equal_start(n), &cfg.qp_settings());
    if sol.residual > cfg.residual_tolerance(target) {
      return Err(AnalyticsError::unstable(format!(
        "target-return solve did not converge (residual {:e} after {} iterations)",
        sol.residual, sol.iterations
      )));
    }
    sol.x
  };

  let w = finalize_weights(&raw, cfg.weight_cutoff)?;
  Ok(evaluate(model, w, cfg))
}

/// Maximum-Sharpe long-only portfolio.
///
/// Solved as `min y' Sigma y` over `y >= 0` with `(mu - r_f)' y = 1`, then
/// `w = y / sum(y)`. Infeasible when no asset beats the risk-free rate.
pub fn max_sharpe(model: &MarketModel, cfg: &OptimizerConfig) -> AnalyticsResult<OptimizedPortfolio> {
  let excess = model.mu().mapv(|m| m - cfg.risk_free_rate);
  let positive = excess.mapv(|e| e.max(0.0));
  let norm_sq = positive.dot(&positive);
  if norm_sq <= 0.0 {
    return Err(AnalyticsError::infeasible(
      "no asset has an expected return above the risk-free rate",
    ));
  }

  let problem = QpProblem {
    q: model.cov(),
    domain: Domain::Orthant,
    equality: Some((excess, 1.0)),
    max_eigenvalue: model.spectrum().max,
  };
  let sol = solve(&problem, positive / norm_sq, &cfg.qp_settings());
  if sol.residual > cfg.residual_tolerance(1.0) {
    return Err(AnalyticsError::unstable(format!(
      "max-sharpe solve did not converge (residual {:e})",
      sol.residual
    )));
  }

  let total = sol.x.sum();
  if total <= 0.0 || !total.is_finite() {
    return Err(AnalyticsError::unstable("max-sharpe solution has no positive weight"));
  }
  let w = finalize_weights(&(sol.x / total), cfg.weight_cutoff)?;
  Ok(evaluate(model, w, cfg))
}

struct CVaRCost {
  scenarios: Array2<f64>,
  alpha: f64,
}

impl CostFunction for CVaRCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let w = Array1::from(softmax(x));
    let mut port_returns = self.scenarios.dot(&w).to_vec();
    Ok(empirical_cvar(&mut port_returns, self.alpha))
  }
}

/// Minimum historical CVaR long-only portfolio via Nelder-Mead over a
/// softmax parameterisation of the simplex.
pub fn min_cvar(model: &MarketModel, cfg: &OptimizerConfig) -> AnalyticsResult<OptimizedPortfolio> {
  let n = model.n_assets();
  if model.scenarios().nrows() == 0 {
    return Err(AnalyticsError::insufficient(1, 0));
  }
  if n == 1 {
    return Ok(evaluate(model, Array1::ones(1), cfg));
  }

  let cost = CVaRCost {
    scenarios: model.scenarios().clone(),
    alpha: cfg.cvar_alpha,
  };

  let x0 = vec![0.0; n];
  let mut simplex = Vec::with_capacity(n + 1);
  simplex.push(x0.clone());
  for i in 0..n {
    let mut point = x0.clone();
    point[i] = 1.0;
    simplex.push(point);
  }

  let solver = NelderMead::new(simplex)
    .with_sd_tolerance(cfg.tolerance)
    .map_err(|e| AnalyticsError::unstable(format!("nelder-mead setup failed: {e}")))?;
  let res = Executor::new(cost, solver)
    .configure(|state| state.max_iters(cfg.max_iters))
    .run()
    .map_err(|e| AnalyticsError::unstable(format!("min-cvar solve failed: {e}")))?;
  let best = res
    .state
    .best_param
    .ok_or_else(|| AnalyticsError::unstable("min-cvar solve produced no iterate"))?;

  let w = finalize_weights(&Array1::from(softmax(&best)), cfg.weight_cutoff)?;
  Ok(evaluate(model, w, cfg))
}

/// Dispatch on the objective.
#[instrument(skip_all, fields(%objective, assets = model.n_assets()))]
pub fn optimize(
  model: &MarketModel,
  objective: Objective,
  cfg: &OptimizerConfig,
) -> AnalyticsResult<OptimizedPortfolio> {
  match objective {
    Objective::MinVariance => min_variance(model, cfg),
    Objective::MaxSharpe => max_sharpe(model, cfg),
    Objective::MinCVaR => min_cvar(model, cfg),
    Objective::MinVarianceWithTargetReturn(target) => min_variance_for_target(model, target, cfg),
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;
  use crate::error::ErrorKind;

  fn diagonal_model(mu: Array1<f64>, vars: &[f64]) -> MarketModel {
    let n = vars.len();
    let cov = Array2::from_shape_fn((n, n), |(i, j)| if i == j { vars[i] } else { 0.0 });
    let scenarios = Array2::from_shape_fn((8, n), |(t, j)| {
      let sign = if (t + j) % 2 == 0 { 1.0 } else { -1.0 };
      sign * vars[j].sqrt() / 16.0
    });
    MarketModel::from_parts((0..n).map(|i| format!("F{i}")).collect(), mu, cov, scenarios).unwrap()
  }

  fn assert_valid(w: &[f64]) {
    assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    assert!(w.iter().all(|x| (0.0..=1.0).contains(x)));
  }

  #[test]
  fn min_variance_matches_inverse_variance_for_diagonal_cov() {
    let model = diagonal_model(array![0.05, 0.08], &[0.04, 0.09]);
    let res = min_variance(&model, &OptimizerConfig::default()).unwrap();
    assert_valid(&res.weights);
    assert_abs_diff_eq!(res.weights[0], 0.09 / 0.13, epsilon = 1e-6);
    assert!(res.volatility <= 0.2);
  }

  #[test]
  fn target_return_is_met() {
    let model = diagonal_model(array![0.05, 0.10, 0.15], &[0.04, 0.09, 0.16]);
    let res = min_variance_for_target(&model, 0.12, &OptimizerConfig::default()).unwrap();
    assert_valid(&res.weights);
    assert_abs_diff_eq!(res.expected_return, 0.12, epsilon = 1e-6);
  }

  #[test]
  fn unreachable_target_is_infeasible() {
    let model = diagonal_model(array![0.05, 0.10], &[0.04, 0.09]);
    for target in [0.2, 0.0] {
      let err = min_variance_for_target(&model, target, &OptimizerConfig::default()).unwrap_err();
      assert_eq!(err.kind(), ErrorKind::InfeasibleObjective);
    }
  }

  #[test]
  fn extreme_target_concentrates_on_best_asset() {
    let model = diagonal_model(array![0.05, 0.10], &[0.04, 0.09]);
    let res = min_variance_for_target(&model, 0.10, &OptimizerConfig::default()).unwrap();
    assert_eq!(res.weights, vec![0.0, 1.0]);
  }

  #[test]
  fn max_sharpe_matches_closed_form_for_diagonal_cov() {
    // Unconstrained tangency weights are proportional to Sigma^-1 (mu - rf),
    // all positive here so the long-only optimum coincides.
    let model = diagonal_model(array![0.06, 0.12], &[0.04, 0.09]);
    let cfg = OptimizerConfig {
      risk_free_rate: 0.02,
      ..OptimizerConfig::default()
    };
    let res = max_sharpe(&model, &cfg).unwrap();
    let raw = [0.04 / 0.04, 0.10 / 0.09];
    let total: f64 = raw.iter().sum();
    assert_abs_diff_eq!(res.weights[0], raw[0] / total, epsilon = 1e-5);
    assert!(res.sharpe.unwrap() > 0.0);
  }

  #[test]
  fn max_sharpe_without_positive_excess_is_infeasible() {
    let model = diagonal_model(array![0.01, 0.02], &[0.04, 0.09]);
    let cfg = OptimizerConfig {
      risk_free_rate: 0.05,
      ..OptimizerConfig::default()
    };
    assert_eq!(
      max_sharpe(&model, &cfg).unwrap_err().kind(),
      ErrorKind::InfeasibleObjective
    );
  }

  #[test]
  fn min_cvar_produces_valid_weights() {
    let model = diagonal_model(array![0.05, 0.08, 0.1], &[0.04, 0.09, 0.01]);
    let cfg = OptimizerConfig {
      cvar_alpha: 0.25,
      max_iters: 2_000,
      tolerance: 1e-8,
      ..OptimizerConfig::default()
    };
    let res = min_cvar(&model, &cfg).unwrap();
    assert_valid(&res.weights);
    let equal = evaluate(&model, equal_start(3), &cfg);
    assert!(res.cvar <= equal.cvar + 1e-6);
  }

  #[test]
  fn empirical_cvar_averages_worst_tail() {
    let mut r = vec![0.02, -0.05, 0.01, -0.01];
    assert_abs_diff_eq!(empirical_cvar(&mut r, 0.5), 0.03, epsilon = 1e-12);
    assert_eq!(empirical_cvar(&mut [], 0.05), 0.0);
  }

  #[test]
  fn finalize_clips_and_renormalizes() {
    let w = finalize_weights(&array![0.7, 0.300001, -1e-10, 1e-12], 1e-8).unwrap();
    assert_valid(&w.to_vec());
    assert_eq!(w[2], 0.0);
    assert_eq!(w[3], 0.0);
    assert!(finalize_weights(&array![f64::NAN, 1.0], 1e-8).is_err());
  }
}
