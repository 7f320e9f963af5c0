//! # Portfolio Synthesis
//!
//! $$
//! r^{p}_t = \sum_j w_j r_{t,j},\qquad \text{NAV}^{p}_0 = 100
//! $$
//!
//! A weighted basket of panel assets viewed as one virtual fund.

use std::cell::OnceCell;
use std::collections::HashMap;

use ndarray::Array1;
use ndarray::Axis;
use ndarray::s;
use tracing::warn;

use super::weights::MissingAssetPolicy;
use super::weights::WeightVector;
use crate::data::panel::AlignedPanel;
use crate::data::returns::nav_from_returns;
use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;
use crate::stats::metrics::MetricsConfig;
use crate::stats::metrics::RiskMetrics;
use crate::stats::metrics::risk_metrics;

/// NAV level of the first panel date.
pub const NAV_BASE: f64 = 100.0;

/// Weighted subset of an aligned panel. The panel is borrowed read-only;
/// return and NAV views are derived on first use.
#[derive(Debug)]
pub struct Portfolio<'a> {
  panel: &'a AlignedPanel,
  weights: WeightVector,
  columns: Vec<usize>,
  fractions: Vec<f64>,
  returns: OnceCell<Vec<f64>>,
  nav: OnceCell<Vec<f64>>,
}

impl<'a> Portfolio<'a> {
  /// Intersect normalized `weights` with the panel columns. Under
  /// [`MissingAssetPolicy::Drop`] the share of a missing asset is held as
  /// cash; [`MissingAssetPolicy::Renormalize`] spreads it over the rest.
  pub fn new(
    panel: &'a AlignedPanel,
    weights: &WeightVector,
    policy: MissingAssetPolicy,
  ) -> AnalyticsResult<Self> {
    let mut kept = Vec::with_capacity(weights.len());
    let mut columns = Vec::with_capacity(weights.len());

    for (id, w) in weights.iter() {
      match panel.column_of(id) {
        Some(j) => {
          kept.push((id.to_string(), w));
          columns.push(j);
        }
        None if policy == MissingAssetPolicy::Strict => {
          return Err(AnalyticsError::input(format!("asset '{id}' is not in the panel")));
        }
        None => warn!(asset = id, weight = w, "weighted asset missing from panel, dropped"),
      }
    }

    if kept.is_empty() {
      return Err(AnalyticsError::input("no weighted asset overlaps the panel"));
    }

    let weights = match policy {
      MissingAssetPolicy::Renormalize => WeightVector::from_raw(kept.clone())?,
      MissingAssetPolicy::Drop | MissingAssetPolicy::Strict => weights.clone(),
    };
    let fractions = kept
      .iter()
      .map(|(id, _)| weights.get(id).unwrap_or(0.0))
      .collect();

    Ok(Self {
      panel,
      weights,
      columns,
      fractions,
      returns: OnceCell::new(),
      nav: OnceCell::new(),
    })
  }

  pub fn panel(&self) -> &AlignedPanel {
    self.panel
  }

  /// Requested weights, renormalized over the held assets only under
  /// [`MissingAssetPolicy::Renormalize`].
  pub fn weights(&self) -> &WeightVector {
    &self.weights
  }

  /// Fraction of the portfolio held in panel assets. Below 1 when dropped
  /// assets leave a cash share.
  pub fn invested(&self) -> f64 {
    self.fractions.iter().sum()
  }

  /// Weighted periodic returns, one per panel date after the first.
  pub fn returns(&self) -> &[f64] {
    self.returns.get_or_init(|| {
      let n = self.panel.len();
      if n < 2 {
        return Vec::new();
      }
      let prices = self.panel.prices().select(Axis(1), &self.columns);
      let asset_returns = &prices.slice(s![1.., ..]) / &prices.slice(s![..n - 1, ..]) - 1.0;
      let w = Array1::from(self.fractions.clone());
      asset_returns.dot(&w).to_vec()
    })
  }

  /// NAV on every panel date, starting at [`NAV_BASE`]. The first date
  /// carries a zero return.
  pub fn nav(&self) -> &[f64] {
    self.nav.get_or_init(|| {
      if self.panel.is_empty() {
        Vec::new()
      } else {
        nav_from_returns(self.returns(), NAV_BASE)
      }
    })
  }

  pub fn metrics(&self, cfg: &MetricsConfig) -> RiskMetrics {
    risk_metrics(self.returns(), cfg)
  }

  /// Weighted expense ratio `sum(w_i * ter_i)`. Assets without a known
  /// (finite) ratio contribute zero.
  pub fn weighted_expense_ratio(&self, ratios: &HashMap<String, f64>) -> f64 {
    self
      .weights
      .iter()
      .filter_map(|(id, w)| ratios.get(id).filter(|r| r.is_finite()).map(|r| w * r))
      .sum()
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;
  use tracing_test::traced_test;

  use super::*;
  use crate::data::panel::AlignOptions;
  use crate::data::returns::simple_returns;
  use crate::data::series::AssetSeries;
  use crate::error::ErrorKind;

  fn panel() -> AlignedPanel {
    let d = |day| NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
    let a = AssetSeries::new("A", vec![(d(1), 100.0), (d(2), 110.0), (d(3), 99.0), (d(4), 105.0)]).unwrap();
    let b = AssetSeries::new("B", vec![(d(1), 50.0), (d(2), 50.5), (d(3), 51.0), (d(4), 50.0)]).unwrap();
    AlignedPanel::align(&[a, b], AlignOptions::default()).unwrap()
  }

  #[test]
  fn single_asset_reproduces_its_returns() {
    let panel = panel();
    let w = WeightVector::new(vec![("A".into(), 1.0)]).unwrap();
    let p = Portfolio::new(&panel, &w, MissingAssetPolicy::Strict).unwrap();
    let expected = simple_returns(&panel.column("A").unwrap().to_vec());
    assert_eq!(p.returns().len(), expected.len());
    for (a, b) in p.returns().iter().zip(expected.iter()) {
      assert_abs_diff_eq!(*a, *b, epsilon = 1e-15);
    }
    assert_abs_diff_eq!(p.nav()[3], 105.0, epsilon = 1e-9);
  }

  #[test]
  fn blends_returns_by_weight() {
    let panel = panel();
    let w = WeightVector::from_raw(vec![("A".into(), 60.0), ("B".into(), 40.0)]).unwrap();
    let p = Portfolio::new(&panel, &w, MissingAssetPolicy::Drop).unwrap();
    assert_abs_diff_eq!(p.returns()[0], 0.6 * 0.10 + 0.4 * 0.01, epsilon = 1e-12);
    assert_eq!(p.nav().len(), panel.len());
    assert_eq!(p.nav()[0], NAV_BASE);
  }

  #[traced_test]
  #[test]
  fn missing_assets_follow_policy() {
    let panel = panel();
    let w = WeightVector::from_raw(vec![("A".into(), 1.0), ("Z".into(), 1.0)]).unwrap();

    let dropped = Portfolio::new(&panel, &w, MissingAssetPolicy::Drop).unwrap();
    assert_eq!(dropped.weights().get("A"), Some(0.5));
    assert_abs_diff_eq!(dropped.invested(), 0.5, epsilon = 1e-15);
    assert!(logs_contain("missing from panel"));

    let renormalized = Portfolio::new(&panel, &w, MissingAssetPolicy::Renormalize).unwrap();
    assert_eq!(renormalized.weights().get("A"), Some(1.0));
    assert_eq!(renormalized.weights().get("Z"), None);

    let strict = Portfolio::new(&panel, &w, MissingAssetPolicy::Strict).unwrap_err();
    assert_eq!(strict.kind(), ErrorKind::Input);
  }

  #[test]
  fn dropped_share_is_held_as_cash() {
    let panel = panel();
    let w = WeightVector::from_raw(vec![("A".into(), 1.0), ("Z".into(), 1.0)]).unwrap();

    let dropped = Portfolio::new(&panel, &w, MissingAssetPolicy::Drop).unwrap();
    assert_abs_diff_eq!(dropped.returns()[0], 0.05, epsilon = 1e-12);
    assert_abs_diff_eq!(dropped.nav()[1], 105.0, epsilon = 1e-9);

    let renormalized = Portfolio::new(&panel, &w, MissingAssetPolicy::Renormalize).unwrap();
    assert_abs_diff_eq!(renormalized.returns()[0], 0.10, epsilon = 1e-12);
  }

  #[test]
  fn no_overlap_is_an_input_error() {
    let panel = panel();
    let w = WeightVector::new(vec![("Z".into(), 1.0)]).unwrap();
    assert!(Portfolio::new(&panel, &w, MissingAssetPolicy::Drop).is_err());
    assert!(Portfolio::new(&panel, &WeightVector::default(), MissingAssetPolicy::Drop).is_err());
  }

  #[test]
  fn expense_ratio_treats_unknown_as_zero() {
    let panel = panel();
    let w = WeightVector::from_raw(vec![("A".into(), 3.0), ("B".into(), 1.0)]).unwrap();
    let p = Portfolio::new(&panel, &w, MissingAssetPolicy::Drop).unwrap();

    let mut ratios = HashMap::new();
    assert_eq!(p.weighted_expense_ratio(&ratios), 0.0);
    ratios.insert("A".to_string(), 0.002);
    assert_abs_diff_eq!(p.weighted_expense_ratio(&ratios), 0.0015, epsilon = 1e-15);
    ratios.insert("B".to_string(), 0.006);
    assert_abs_diff_eq!(p.weighted_expense_ratio(&ratios), 0.003, epsilon = 1e-15);
  }

  #[test]
  fn metrics_use_portfolio_returns() {
    let panel = panel();
    let w = WeightVector::new(vec![("A".into(), 1.0)]).unwrap();
    let p = Portfolio::new(&panel, &w, MissingAssetPolicy::Drop).unwrap();
    let m = p.metrics(&MetricsConfig::default());
    assert_abs_diff_eq!(m.max_drawdown.unwrap(), -0.10, epsilon = 1e-9);
  }
}
