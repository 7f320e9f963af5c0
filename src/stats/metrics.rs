//! # Risk Metrics
//!
//! $$
//! \text{Sharpe} = \frac{\bar r P - r_f}{s_r \sqrt{P}},\qquad
//! \text{MDD} = \min_t \left(\frac{\text{NAV}_t}{\max_{s \le t}\text{NAV}_s} - 1\right)
//! $$
//!
//! Annualized return/risk statistics of a periodic return series. Every
//! ratio is `None` when undefined; a series with fewer than two observations
//! yields a record where every field is `None`.

use statrs::statistics::Statistics;

/// Settings for [`risk_metrics`].
#[derive(Clone, Copy, Debug)]
pub struct MetricsConfig {
  /// Periods per year used for annualization.
  pub periods_per_year: f64,
  /// Annual risk-free rate.
  pub risk_free_rate: f64,
  /// Value reported for Sortino when there is no downside and the excess
  /// return is positive.
  pub sortino_cap: f64,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      periods_per_year: 252.0,
      risk_free_rate: 0.0,
      sortino_cap: 100.0,
    }
  }
}

/// Standardized risk/return record. Ratios are decimal fractions, not percent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RiskMetrics {
  /// Number of return observations the record was computed from.
  pub observations: usize,
  /// Mean periodic return × periods per year.
  pub annualized_return: Option<f64>,
  /// `nav_last / nav_first - 1` on the compounded path, so the first
  /// period sets the starting level.
  pub cumulative_return: Option<f64>,
  /// Sample standard deviation × √(periods per year).
  pub annualized_volatility: Option<f64>,
  pub sharpe: Option<f64>,
  pub sortino: Option<f64>,
  /// Worst peak-to-trough decline, ≤ 0.
  pub max_drawdown: Option<f64>,
  pub calmar: Option<f64>,
}

impl RiskMetrics {
  /// Record for a series too short to measure.
  pub fn insufficient(observations: usize) -> Self {
    Self {
      observations,
      ..Self::default()
    }
  }

  /// Whether the record is the "insufficient data" sentinel.
  pub fn is_insufficient(&self) -> bool {
    self.observations < 2
  }
}

/// Worst drawdown of a NAV path.
pub fn max_drawdown(nav: &[f64]) -> f64 {
  let mut peak = f64::NEG_INFINITY;
  let mut worst = 0.0_f64;
  for &v in nav {
    peak = peak.max(v);
    if peak > 0.0 {
      worst = worst.min(v / peak - 1.0);
    }
  }
  worst
}

/// Drawdown at every point of a NAV path.
pub fn drawdown_series(nav: &[f64]) -> Vec<f64> {
  let mut peak = f64::NEG_INFINITY;
  nav
    .iter()
    .map(|&v| {
      peak = peak.max(v);
      if peak > 0.0 { v / peak - 1.0 } else { 0.0 }
    })
    .collect()
}

/// Target downside deviation, annualized: only periods below `target`
/// contribute, averaged over all periods.
fn downside_deviation(returns: &[f64], target: f64, periods_per_year: f64) -> f64 {
  let sum_sq: f64 = returns
    .iter()
    .filter(|&&r| r < target)
    .map(|&r| (r - target).powi(2))
    .sum();
  (sum_sq / returns.len() as f64).sqrt() * periods_per_year.sqrt()
}

/// Running product of `1 + r`, one value per return. The first period's
/// return is the starting level, not a move.
fn compounded(returns: &[f64]) -> Vec<f64> {
  returns
    .iter()
    .scan(1.0, |acc, r| {
      *acc *= 1.0 + r;
      Some(*acc)
    })
    .collect()
}

/// Compute the full metrics record of a periodic return series.
pub fn risk_metrics(returns: &[f64], cfg: &MetricsConfig) -> RiskMetrics {
  let n = returns.len();
  if n < 2 {
    return RiskMetrics::insufficient(n);
  }

  let p = cfg.periods_per_year;
  let annualized_return = returns.mean() * p;
  let annualized_volatility = returns.std_dev() * p.sqrt();

  let nav = compounded(returns);
  let cumulative_return = nav[nav.len() - 1] / nav[0] - 1.0;
  let drawdown = max_drawdown(&nav);

  let excess = annualized_return - cfg.risk_free_rate;
  let sharpe = (annualized_volatility > 0.0).then(|| excess / annualized_volatility);

  let downside = downside_deviation(returns, cfg.risk_free_rate / p, p);
  let sortino = if downside > 0.0 {
    excess / downside
  } else if excess > 0.0 {
    cfg.sortino_cap
  } else {
    0.0
  };

  let calmar = (drawdown < 0.0).then(|| annualized_return / drawdown.abs());

  RiskMetrics {
    observations: n,
    annualized_return: Some(annualized_return),
    cumulative_return: Some(cumulative_return),
    annualized_volatility: Some(annualized_volatility),
    sharpe,
    sortino: Some(sortino),
    max_drawdown: Some(drawdown),
    calmar,
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::data::returns::simple_returns;

  #[test]
  fn reference_series_matches_known_values() {
    let returns = simple_returns(&[100.0, 110.0, 99.0, 105.0]);
    let m = risk_metrics(&returns, &MetricsConfig::default());

    assert_eq!(m.observations, 3);
    assert_abs_diff_eq!(m.annualized_volatility.unwrap(), 1.6818, epsilon = 1e-3);
    assert_abs_diff_eq!(m.sharpe.unwrap(), 3.0, epsilon = 0.1);
    assert_abs_diff_eq!(m.max_drawdown.unwrap(), -0.10, epsilon = 1e-9);
    assert_abs_diff_eq!(m.cumulative_return.unwrap(), 1.05 / 1.1 - 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(m.calmar.unwrap(), m.annualized_return.unwrap() / 0.10, epsilon = 1e-9);
  }

  #[test]
  fn nav_starts_at_first_compounded_level() {
    let returns = simple_returns(&[100.0, 90.0, 95.0]);
    let m = risk_metrics(&returns, &MetricsConfig::default());
    assert_abs_diff_eq!(m.cumulative_return.unwrap(), 95.0 / 90.0 - 1.0, epsilon = 1e-12);
    assert_eq!(m.max_drawdown, Some(0.0));
    assert_eq!(m.calmar, None);
  }

  #[test]
  fn short_series_is_insufficient_not_zero() {
    for returns in [vec![], vec![0.01]] {
      let m = risk_metrics(&returns, &MetricsConfig::default());
      assert!(m.is_insufficient());
      assert_eq!(m.annualized_volatility, None);
      assert_eq!(m.sharpe, None);
      assert_eq!(m.max_drawdown, None);
      assert_eq!(m.cumulative_return, None);
    }
  }

  #[test]
  fn flat_series_has_undefined_ratios() {
    let m = risk_metrics(&[0.0, 0.0, 0.0], &MetricsConfig::default());
    assert_eq!(m.annualized_volatility, Some(0.0));
    assert_eq!(m.sharpe, None);
    assert_eq!(m.calmar, None);
    assert_eq!(m.max_drawdown, Some(0.0));
    assert_eq!(m.sortino, Some(0.0));
  }

  #[test]
  fn sortino_is_capped_without_downside() {
    let cfg = MetricsConfig::default();
    let m = risk_metrics(&[0.01, 0.02, 0.015], &cfg);
    assert_eq!(m.sortino, Some(cfg.sortino_cap));
    assert!(m.sortino.unwrap().is_finite());
  }

  #[test]
  fn sortino_uses_risk_free_threshold() {
    let cfg = MetricsConfig {
      risk_free_rate: 0.0252 * 252.0 / 10.0,
      ..MetricsConfig::default()
    };
    // threshold = 0.00252 per period; 0.002 falls below it.
    let returns = [0.01, 0.002, 0.01];
    let m = risk_metrics(&returns, &cfg);
    let target = cfg.risk_free_rate / 252.0;
    let dd = ((0.002_f64 - target).powi(2) / 3.0).sqrt() * 252.0_f64.sqrt();
    let excess = m.annualized_return.unwrap() - cfg.risk_free_rate;
    assert_abs_diff_eq!(m.sortino.unwrap(), excess / dd, epsilon = 1e-9);
  }

  #[test]
  fn risk_free_rate_shifts_sharpe() {
    let returns = simple_returns(&[100.0, 110.0, 99.0, 105.0]);
    let base = risk_metrics(&returns, &MetricsConfig::default());
    let cfg = MetricsConfig {
      risk_free_rate: 0.5,
      ..MetricsConfig::default()
    };
    let shifted = risk_metrics(&returns, &cfg);
    let vol = base.annualized_volatility.unwrap();
    assert_abs_diff_eq!(
      base.sharpe.unwrap() - shifted.sharpe.unwrap(),
      0.5 / vol,
      epsilon = 1e-12
    );
  }

  #[test]
  fn drawdown_tracks_running_peak() {
    let dd = drawdown_series(&[1.0, 1.2, 0.9, 1.3, 1.17]);
    assert_abs_diff_eq!(dd[2], -0.25, epsilon = 1e-12);
    assert_abs_diff_eq!(dd[4], -0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(max_drawdown(&[1.0, 1.2, 0.9, 1.3, 1.17]), -0.25, epsilon = 1e-12);
  }
}
