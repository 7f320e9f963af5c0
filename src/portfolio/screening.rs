//! # Screening
//!
//! $$
//! \text{rank}_i \propto \frac{\hat r_i - r_f}{\hat \sigma_i}
//! $$
//!
//! Candidate universe filtering and Sharpe ranking ahead of allocation.

use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use crate::data::returns::simple_returns;
use crate::data::series::AssetSeries;
use crate::stats::metrics::MetricsConfig;
use crate::stats::metrics::RiskMetrics;
use crate::stats::metrics::risk_metrics;

/// Filters applied when building a candidate universe.
#[derive(Clone, Copy, Debug)]
pub struct ScreeningCriteria {
  /// Minimum number of return observations per asset.
  pub min_observations: usize,
  /// Minimum annualized return; ignored when no asset passes it.
  pub min_annualized_return: Option<f64>,
  /// Number of assets kept after ranking.
  pub top_n: usize,
}

impl Default for ScreeningCriteria {
  fn default() -> Self {
    Self {
      min_observations: 252,
      min_annualized_return: None,
      top_n: 50,
    }
  }
}

/// An asset that survived screening.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenedAsset {
  pub id: String,
  pub metrics: RiskMetrics,
}

fn by_sharpe_desc(a: &ScreenedAsset, b: &ScreenedAsset) -> Ordering {
  match (a.metrics.sharpe, b.metrics.sharpe) {
    (Some(x), Some(y)) => y.total_cmp(&x),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  }
}

/// Score every series on its own history, filter, rank by Sharpe (undefined
/// Sharpe last) and keep the top `top_n`. Ties keep input order.
pub fn screen(series: &[AssetSeries], criteria: &ScreeningCriteria, cfg: &MetricsConfig) -> Vec<ScreenedAsset> {
  let scored: Vec<ScreenedAsset> = series
    .par_iter()
    .filter_map(|s| {
      let returns = simple_returns(&s.prices());
      (returns.len() >= criteria.min_observations.max(2)).then(|| ScreenedAsset {
        id: s.id().to_string(),
        metrics: risk_metrics(&returns, cfg),
      })
    })
    .collect();

  let mut candidates = match criteria.min_annualized_return {
    Some(floor) => {
      let passing: Vec<ScreenedAsset> = scored
        .iter()
        .filter(|a| a.metrics.annualized_return.is_some_and(|r| r >= floor))
        .cloned()
        .collect();
      if passing.is_empty() && !scored.is_empty() {
        warn!(floor, candidates = scored.len(), "no asset meets the return floor, filter ignored");
        scored
      } else {
        passing
      }
    }
    None => scored,
  };

  candidates.sort_by(by_sharpe_desc);
  candidates.truncate(criteria.top_n);
  debug!(input = series.len(), kept = candidates.len(), "screened universe");
  candidates
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use chrono::NaiveDate;
  use tracing_test::traced_test;

  use super::*;

  fn trending(id: &str, days: usize, drift: f64, wiggle: f64) -> AssetSeries {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut price = 100.0;
    let points = (0..days)
      .map(|i| {
        let shock = if i % 2 == 0 { wiggle } else { -wiggle };
        if i > 0 {
          price *= 1.0 + drift + shock;
        }
        (start + Duration::days(i as i64), price)
      })
      .collect();
    AssetSeries::new(id, points).unwrap()
  }

  fn criteria(min_obs: usize) -> ScreeningCriteria {
    ScreeningCriteria {
      min_observations: min_obs,
      ..ScreeningCriteria::default()
    }
  }

  #[test]
  fn drops_short_histories_and_ranks_by_sharpe() {
    let universe = vec![
      trending("LOW", 40, 0.0005, 0.01),
      trending("HIGH", 40, 0.002, 0.01),
      trending("SHORT", 10, 0.01, 0.001),
    ];
    let out = screen(&universe, &criteria(20), &MetricsConfig::default());
    let ids: Vec<&str> = out.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["HIGH", "LOW"]);
  }

  #[traced_test]
  #[test]
  fn return_floor_falls_back_when_nothing_passes() {
    let universe = vec![trending("A", 30, 0.0001, 0.01), trending("B", 30, 0.0002, 0.01)];
    let cfg = ScreeningCriteria {
      min_observations: 20,
      min_annualized_return: Some(10.0),
      top_n: 50,
    };
    let out = screen(&universe, &cfg, &MetricsConfig::default());
    assert_eq!(out.len(), 2);
    assert!(logs_contain("filter ignored"));
  }

  #[test]
  fn return_floor_filters_when_something_passes() {
    let universe = vec![trending("A", 30, -0.001, 0.01), trending("B", 30, 0.002, 0.01)];
    let cfg = ScreeningCriteria {
      min_observations: 20,
      min_annualized_return: Some(0.0),
      top_n: 50,
    };
    let out = screen(&universe, &cfg, &MetricsConfig::default());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "B");
  }

  #[test]
  fn keeps_top_n() {
    let universe: Vec<AssetSeries> = (0..5)
      .map(|i| trending(&format!("F{i}"), 30, 0.0005 * i as f64, 0.01))
      .collect();
    let cfg = ScreeningCriteria {
      min_observations: 20,
      min_annualized_return: None,
      top_n: 2,
    };
    let out = screen(&universe, &cfg, &MetricsConfig::default());
    assert_eq!(out.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["F4", "F3"]);
  }
}
