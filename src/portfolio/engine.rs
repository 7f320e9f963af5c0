//! # Analysis Engine
//!
//! $$
//! \text{panel} \xrightarrow{\;r\;} (\mu, \Sigma) \xrightarrow{\;\text{HRP}\,|\,\text{MV}\;} \mathbf{w}
//! $$
//!
//! High-level orchestration API: per-request metrics, portfolio reports,
//! allocation and frontier tracing over an aligned panel.

use std::collections::HashMap;

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::info;
use tracing::instrument;

use super::frontier::efficient_frontier;
use super::hrp::hrp_from_returns;
use super::market::MarketModel;
use super::optimizers::OptimizerConfig;
use super::optimizers::optimize;
use super::synthesis::Portfolio;
use super::types::FrontierCurve;
use super::types::Objective;
use super::weights::MissingAssetPolicy;
use super::weights::WeightVector;
use crate::data::horizon::Horizon;
use crate::data::panel::AlignOptions;
use crate::data::panel::AlignedPanel;
use crate::data::provider::NavProvider;
use crate::data::provider::load_panel;
use crate::data::returns::ReturnPanel;
use crate::error::AnalyticsResult;
use crate::error::ErrorKind;
use crate::stats::covariance::CovarianceMethod;
use crate::stats::covariance::correlation_matrix;
use crate::stats::metrics::MetricsConfig;
use crate::stats::metrics::RiskMetrics;
use crate::stats::metrics::risk_metrics;

/// Allocation strategy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AllocationMethod {
  /// Hierarchical Risk Parity.
  Hrp,
  MeanVariance(Objective),
}

/// Runtime configuration for [`AnalysisEngine`].
#[derive(Clone, Debug)]
pub struct AnalysisConfig {
  pub metrics: MetricsConfig,
  pub optimizer: OptimizerConfig,
  /// Covariance estimator used by both allocators.
  pub covariance: CovarianceMethod,
  /// Number of frontier levels.
  pub frontier_points: usize,
  /// Treatment of weights naming assets absent from the panel.
  pub missing_assets: MissingAssetPolicy,
  pub align: AlignOptions,
}

impl Default for AnalysisConfig {
  fn default() -> Self {
    Self {
      metrics: MetricsConfig::default(),
      optimizer: OptimizerConfig::default(),
      covariance: CovarianceMethod::Sample,
      frontier_points: 20,
      missing_assets: MissingAssetPolicy::Drop,
      align: AlignOptions::default(),
    }
  }
}

/// Result of an allocation request.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
  pub weights: WeightVector,
  /// Integer percentages summing to 100, in the same order as `weights`.
  pub percentages: Vec<(String, i64)>,
  /// Model annualized return; `None` without enough history to estimate it.
  pub expected_return: Option<f64>,
  /// Model annualized volatility; `None` without enough history to estimate it.
  pub volatility: Option<f64>,
}

/// Everything a caller needs to render a weighted portfolio.
#[derive(Clone, Debug, PartialEq)]
pub struct PortfolioReport {
  /// Effective weights after panel intersection.
  pub weights: WeightVector,
  pub dates: Vec<NaiveDate>,
  /// Base-100 NAV on every date.
  pub nav: Vec<f64>,
  pub metrics: RiskMetrics,
  /// Weighted expense ratio, when ratios were supplied.
  pub expense_ratio: Option<f64>,
}

/// Correlation matrix with its asset labels.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationTable {
  pub assets: Vec<String>,
  pub matrix: Array2<f64>,
}

/// Single entry point for analysis requests. Holds configuration only, so
/// one engine can serve concurrent requests.
#[derive(Clone, Debug, Default)]
pub struct AnalysisEngine {
  config: AnalysisConfig,
}

impl AnalysisEngine {
  pub fn new(config: AnalysisConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &AnalysisConfig {
    &self.config
  }

  /// Load, align and restrict a panel from a NAV provider.
  pub fn load<P: NavProvider + ?Sized>(
    &self,
    provider: &P,
    assets: &[&str],
    horizon: &Horizon,
  ) -> AnalyticsResult<AlignedPanel> {
    load_panel(provider, assets, horizon, self.config.align)
  }

  /// Metrics of every panel asset on its own, in column order.
  #[instrument(skip_all, fields(assets = panel.assets().len()))]
  pub fn asset_metrics(&self, panel: &AlignedPanel) -> Vec<(String, RiskMetrics)> {
    let returns = ReturnPanel::from_prices(panel);
    let cfg = self.config.metrics;
    let columns: Vec<(String, Vec<f64>)> = returns
      .iter_assets()
      .map(|(id, r)| (id.to_string(), r.to_vec()))
      .collect();
    columns
      .into_par_iter()
      .map(|(id, r)| {
        let m = risk_metrics(&r, &cfg);
        (id, m)
      })
      .collect()
  }

  /// Synthesize the weighted portfolio and measure it.
  pub fn portfolio_report(&self, panel: &AlignedPanel, weights: &WeightVector) -> AnalyticsResult<PortfolioReport> {
    self.report(panel, weights, None)
  }

  /// [`Self::portfolio_report`] plus the weighted expense ratio. Assets
  /// missing from `ratios` count as zero cost.
  pub fn portfolio_report_with_expenses(
    &self,
    panel: &AlignedPanel,
    weights: &WeightVector,
    ratios: &HashMap<String, f64>,
  ) -> AnalyticsResult<PortfolioReport> {
    self.report(panel, weights, Some(ratios))
  }

  #[instrument(skip_all, fields(assets = weights.len()))]
  fn report(
    &self,
    panel: &AlignedPanel,
    weights: &WeightVector,
    ratios: Option<&HashMap<String, f64>>,
  ) -> AnalyticsResult<PortfolioReport> {
    let portfolio = Portfolio::new(panel, weights, self.config.missing_assets)?;
    let metrics = portfolio.metrics(&self.config.metrics);
    let expense_ratio = ratios.map(|r| portfolio.weighted_expense_ratio(r));
    info!(
      observations = metrics.observations,
      sharpe = ?metrics.sharpe,
      ?expense_ratio,
      "portfolio report"
    );
    Ok(PortfolioReport {
      weights: portfolio.weights().clone(),
      dates: panel.dates().to_vec(),
      nav: portfolio.nav().to_vec(),
      metrics,
      expense_ratio,
    })
  }

  /// Annualized market model of the panel under the configured estimator.
  pub fn market_model(&self, panel: &AlignedPanel) -> AnalyticsResult<MarketModel> {
    MarketModel::from_returns(
      &ReturnPanel::from_prices(panel),
      &self.config.covariance,
      self.config.metrics.periods_per_year,
    )
  }

  /// Allocate across every panel asset.
  ///
  /// HRP with fewer than two return observations fails with insufficient
  /// data; use [`WeightVector::equal`] as the explicit fallback.
  #[instrument(skip_all, fields(method = ?method, assets = panel.assets().len()))]
  pub fn allocate(&self, panel: &AlignedPanel, method: AllocationMethod) -> AnalyticsResult<Allocation> {
    let (weights, expected_return, volatility) = match method {
      AllocationMethod::Hrp => {
        let returns = ReturnPanel::from_prices(panel);
        let hrp = hrp_from_returns(&returns, &self.config.covariance)?;
        let weights = WeightVector::from_solution(returns.assets(), &hrp.weights)?;
        // A lone asset needs no history for its weight but has no moments.
        let w = Array1::from(hrp.weights);
        let moments = match self.market_model(panel) {
          Ok(m) => Some((m.expected_return(&w), m.variance(&w).sqrt())),
          Err(e) if e.kind() == ErrorKind::InsufficientData => None,
          Err(e) => return Err(e),
        };
        (weights, moments.map(|m| m.0), moments.map(|m| m.1))
      }
      AllocationMethod::MeanVariance(objective) => {
        let model = self.market_model(panel)?;
        let res = optimize(&model, objective, &self.config.optimizer)?;
        (
          WeightVector::from_solution(model.assets(), &res.weights)?,
          Some(res.expected_return),
          Some(res.volatility),
        )
      }
    };

    let percentages = weights.to_percentages()?;
    info!(?expected_return, ?volatility, "allocation ready");
    Ok(Allocation {
      weights,
      percentages,
      expected_return,
      volatility,
    })
  }

  /// Efficient frontier of the panel assets.
  pub fn efficient_frontier(&self, panel: &AlignedPanel) -> AnalyticsResult<FrontierCurve> {
    let model = self.market_model(panel)?;
    Ok(efficient_frontier(
      &model,
      self.config.frontier_points,
      &self.config.optimizer,
    ))
  }

  /// Pearson correlation of the panel's asset returns.
  pub fn correlation(&self, panel: &AlignedPanel) -> AnalyticsResult<CorrelationTable> {
    let returns = ReturnPanel::from_prices(panel);
    Ok(CorrelationTable {
      assets: returns.assets().to_vec(),
      matrix: correlation_matrix(&returns)?,
    })
  }
}
