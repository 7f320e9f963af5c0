//! # Market Model
//!
//! $$
//! \mu = P\,\bar{\mathbf r},\qquad \Sigma = P\,\hat\Sigma_{\text{period}}
//! $$
//!
//! Annualized expected returns, covariance and the historical scenarios an
//! optimizer works on.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use tracing::debug;

use crate::data::returns::ReturnPanel;
use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;
use crate::stats::covariance::CovarianceEstimator;
use crate::stats::covariance::Spectrum;
use crate::stats::covariance::check_psd;

#[derive(Clone, Debug)]
pub struct MarketModel {
  assets: Vec<String>,
  mu: Array1<f64>,
  cov: Array2<f64>,
  scenarios: Array2<f64>,
  spectrum: Spectrum,
}

impl MarketModel {
  /// Estimate the model from a return panel.
  pub fn from_returns<E: CovarianceEstimator + ?Sized>(
    returns: &ReturnPanel,
    estimator: &E,
    periods_per_year: f64,
  ) -> AnalyticsResult<Self> {
    if returns.n_assets() == 0 {
      return Err(AnalyticsError::input("return panel has no assets"));
    }
    if returns.len() < 2 {
      return Err(AnalyticsError::insufficient(2, returns.len()));
    }

    let matrix = returns.matrix();
    let mu = matrix
      .mean_axis(Axis(0))
      .ok_or_else(|| AnalyticsError::insufficient(2, 0))?
      * periods_per_year;
    let cov = estimator.covariance(matrix)? * periods_per_year;

    Self::from_parts(returns.assets().to_vec(), mu, cov, matrix.clone())
  }

  /// Assemble a model from annualized moments and per-period scenarios
  /// (`periods × assets`).
  pub fn from_parts(
    assets: Vec<String>,
    mu: Array1<f64>,
    cov: Array2<f64>,
    scenarios: Array2<f64>,
  ) -> AnalyticsResult<Self> {
    let n = assets.len();
    if n == 0 {
      return Err(AnalyticsError::input("market model has no assets"));
    }
    if mu.len() != n || cov.dim() != (n, n) || scenarios.ncols() != n {
      return Err(AnalyticsError::input(format!(
        "dimension mismatch: {n} assets, mu {}, cov {:?}, scenarios {:?}",
        mu.len(),
        cov.dim(),
        scenarios.dim()
      )));
    }
    if mu.iter().any(|v| !v.is_finite()) {
      return Err(AnalyticsError::unstable("expected returns hold non-finite values"));
    }

    let spectrum = check_psd(&cov)?;
    debug!(assets = n, min_eig = spectrum.min, max_eig = spectrum.max, "market model ready");
    Ok(Self {
      assets,
      mu,
      cov,
      scenarios,
      spectrum,
    })
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  /// Annualized expected returns.
  pub fn mu(&self) -> &Array1<f64> {
    &self.mu
  }

  /// Annualized covariance.
  pub fn cov(&self) -> &Array2<f64> {
    &self.cov
  }

  /// Historical per-period returns, rows are periods.
  pub fn scenarios(&self) -> &Array2<f64> {
    &self.scenarios
  }

  pub fn spectrum(&self) -> Spectrum {
    self.spectrum
  }

  pub fn expected_return(&self, w: &Array1<f64>) -> f64 {
    self.mu.dot(w)
  }

  pub fn variance(&self, w: &Array1<f64>) -> f64 {
    w.dot(&self.cov.dot(w)).max(0.0)
  }

  /// Per-period portfolio returns under each historical scenario.
  pub fn scenario_returns(&self, w: &Array1<f64>) -> Array1<f64> {
    self.scenarios.dot(w)
  }

  /// Smallest and largest single-asset expected return.
  pub fn return_range(&self) -> (f64, f64) {
    self
      .mu
      .iter()
      .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &m| (lo.min(m), hi.max(m)))
  }

  /// Restrict the model to a subset of asset indices.
  pub(crate) fn subset(&self, idx: &[usize]) -> AnalyticsResult<Self> {
    Self::from_parts(
      idx.iter().map(|&i| self.assets[i].clone()).collect(),
      self.mu.select(Axis(0), idx),
      self.cov.select(Axis(0), idx).select(Axis(1), idx),
      self.scenarios.select(Axis(1), idx),
    )
  }
}
