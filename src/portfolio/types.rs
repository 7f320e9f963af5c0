//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\min_{\mathbf{w}\in\Delta} \mathcal{L}(\mathbf{w})
//! $$
//!
//! Shared enums and result containers for allocation.

use std::fmt;
use std::str::FromStr;

use impl_new_derive::ImplNew;

use crate::error::AnalyticsError;

/// Mean-variance objective variants. Every variant is long-only with
/// `0 <= w <= 1` and `sum(w) = 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Objective {
  /// Minimum portfolio variance.
  MinVariance,
  /// Maximum `(mu_p - r_f) / sigma_p`.
  MaxSharpe,
  /// Minimum historical conditional value-at-risk.
  MinCVaR,
  /// Minimum variance subject to `mu_p = target` (annualized).
  MinVarianceWithTargetReturn(f64),
}

impl fmt::Display for Objective {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::MinVariance => f.write_str("min-variance"),
      Self::MaxSharpe => f.write_str("max-sharpe"),
      Self::MinCVaR => f.write_str("min-cvar"),
      Self::MinVarianceWithTargetReturn(t) => write!(f, "target:{t}"),
    }
  }
}

impl FromStr for Objective {
  type Err = AnalyticsError;

  /// Parse `min-variance`, `max-sharpe`, `min-cvar` or `target:<annual return>`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.trim().to_lowercase();
    if let Some(target) = lower.strip_prefix("target:") {
      let t: f64 = target
        .parse()
        .map_err(|_| AnalyticsError::input(format!("invalid target return '{target}'")))?;
      return Ok(Self::MinVarianceWithTargetReturn(t));
    }

    match lower.as_str() {
      "min-variance" | "minvariance" | "min-vol" => Ok(Self::MinVariance),
      "max-sharpe" | "maxsharpe" => Ok(Self::MaxSharpe),
      "min-cvar" | "mincvar" | "cvar" => Ok(Self::MinCVaR),
      _ => Err(AnalyticsError::input(format!("unknown objective '{s}'"))),
    }
  }
}

/// Output of a mean-variance optimization run. Weights follow the asset
/// order of the market model they were solved on.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimizedPortfolio {
  pub weights: Vec<f64>,
  /// Annualized expected return `w' mu`.
  pub expected_return: f64,
  /// Annualized volatility `sqrt(w' Sigma w)`.
  pub volatility: f64,
  /// `None` when volatility is zero.
  pub sharpe: Option<f64>,
  /// Historical per-period CVaR (positive loss) at the configured tail level.
  pub cvar: f64,
}

/// One point of the efficient frontier.
#[derive(Clone, Debug, PartialEq, ImplNew)]
pub struct FrontierPoint {
  /// Annualized volatility.
  pub risk: f64,
  /// Annualized expected return.
  pub expected_return: f64,
  pub weights: Vec<f64>,
}

/// Feasible frontier points, ordered by ascending risk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrontierCurve {
  pub assets: Vec<String>,
  pub points: Vec<FrontierPoint>,
}

impl FrontierCurve {
  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  /// Point with the lowest risk.
  pub fn min_risk(&self) -> Option<&FrontierPoint> {
    self.points.first()
  }
}
