//! # Returns
//!
//! $$
//! r_t = \frac{P_t}{P_{t-1}} - 1,\qquad \text{NAV}_t = \text{NAV}_0 \prod_{s \le t} (1 + r_s)
//! $$
//!
//! Periodic simple returns and NAV reconstruction.

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use ndarray::s;

use super::panel::AlignedPanel;
use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;

/// Simple returns of a price sequence; the first (undefined) point is dropped.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
  prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Rebuild a NAV path from returns, starting at `base`. The output has one
/// more point than the input.
pub fn nav_from_returns(returns: &[f64], base: f64) -> Vec<f64> {
  let mut nav = Vec::with_capacity(returns.len() + 1);
  nav.push(base);
  let mut level = base;
  for r in returns {
    level *= 1.0 + r;
    nav.push(level);
  }
  nav
}

/// Per-asset periodic returns over a shared axis. Row `t` holds the returns
/// realised on `dates[t]`; the panel's first date has no return.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnPanel {
  dates: Vec<NaiveDate>,
  assets: Vec<String>,
  returns: Array2<f64>,
}

impl ReturnPanel {
  /// Returns of every asset of an aligned price panel.
  pub fn from_prices(panel: &AlignedPanel) -> Self {
    let prices = panel.prices();
    let n = prices.nrows();
    let returns = if n < 2 {
      Array2::zeros((0, prices.ncols()))
    } else {
      let prev = prices.slice(s![..n - 1, ..]);
      let next = prices.slice(s![1.., ..]);
      &next / &prev - 1.0
    };

    Self {
      dates: panel.dates().iter().skip(1).copied().collect(),
      assets: panel.assets().to_vec(),
      returns,
    }
  }

  /// Build from raw parts, e.g. synthetic scenarios.
  pub fn from_parts(
    dates: Vec<NaiveDate>,
    assets: Vec<String>,
    returns: Array2<f64>,
  ) -> AnalyticsResult<Self> {
    if returns.nrows() != dates.len() || returns.ncols() != assets.len() {
      return Err(AnalyticsError::input(format!(
        "return matrix is {}x{} but axis is {}x{}",
        returns.nrows(),
        returns.ncols(),
        dates.len(),
        assets.len()
      )));
    }
    if returns.iter().any(|r| !r.is_finite()) {
      return Err(AnalyticsError::input("return matrix holds non-finite values"));
    }
    Ok(Self {
      dates,
      assets,
      returns,
    })
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  /// Rows are periods, columns are assets.
  pub fn matrix(&self) -> &Array2<f64> {
    &self.returns
  }

  /// Number of return observations.
  pub fn len(&self) -> usize {
    self.returns.nrows()
  }

  pub fn is_empty(&self) -> bool {
    self.returns.nrows() == 0
  }

  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  pub fn column(&self, id: &str) -> Option<ArrayView1<'_, f64>> {
    self
      .assets
      .iter()
      .position(|a| a == id)
      .map(|j| self.returns.column(j))
  }

  /// Returns of one asset as a plain vector.
  pub fn series(&self, id: &str) -> Option<Vec<f64>> {
    self.column(id).map(|c| c.to_vec())
  }

  /// Iterate `(asset, returns)` pairs in column order.
  pub fn iter_assets(&self) -> impl Iterator<Item = (&str, ArrayView1<'_, f64>)> {
    self
      .assets
      .iter()
      .zip(self.returns.axis_iter(Axis(1)))
      .map(|(a, c)| (a.as_str(), c))
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::data::panel::AlignOptions;
  use crate::data::series::AssetSeries;

  #[test]
  fn simple_returns_drop_first_point() {
    let r = simple_returns(&[100.0, 110.0, 99.0, 105.0]);
    assert_eq!(r.len(), 3);
    assert_abs_diff_eq!(r[0], 0.10, epsilon = 1e-12);
    assert_abs_diff_eq!(r[1], -0.10, epsilon = 1e-12);
    assert_abs_diff_eq!(r[2], 105.0 / 99.0 - 1.0, epsilon = 1e-12);
  }

  #[test]
  fn nav_rebuild_and_redifference_round_trip() {
    let returns = vec![0.01, -0.02, 0.005, 0.0, 0.03];
    let nav = nav_from_returns(&returns, 100.0);
    assert_eq!(nav[0], 100.0);
    let back = simple_returns(&nav);
    for (a, b) in returns.iter().zip(back.iter()) {
      assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
  }

  #[test]
  fn panel_returns_have_one_less_row() {
    let d = |day| NaiveDate::from_ymd_opt(2025, 1, day).unwrap();
    let a = AssetSeries::new("A", vec![(d(1), 100.0), (d(2), 110.0), (d(3), 120.0)]).unwrap();
    let b = AssetSeries::new("B", vec![(d(1), 100.0), (d(2), 100.0), (d(3), 90.0)]).unwrap();
    let panel = AlignedPanel::align(&[a, b], AlignOptions::default()).unwrap();
    let returns = ReturnPanel::from_prices(&panel);

    assert_eq!(returns.len(), 2);
    assert_eq!(returns.dates(), &[d(2), d(3)]);
    assert_abs_diff_eq!(returns.matrix()[[0, 0]], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(returns.matrix()[[1, 1]], -0.1, epsilon = 1e-12);
    assert_eq!(returns.iter_assets().count(), 2);
  }

  #[test]
  fn single_row_panel_has_no_returns() {
    let d = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let a = AssetSeries::new("A", vec![(d, 100.0)]).unwrap();
    let panel = AlignedPanel::align(&[a], AlignOptions::default()).unwrap();
    let returns = ReturnPanel::from_prices(&panel);
    assert!(returns.is_empty());
    assert!(returns.dates().is_empty());
  }
}
