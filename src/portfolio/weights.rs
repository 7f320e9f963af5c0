//! # Weights
//!
//! $$
//! p_i = \operatorname{round}(100\, w_i),\qquad
//! p_{\arg\max w} \mathrel{+}= 100 - \textstyle\sum_j p_j
//! $$
//!
//! Weight vectors and their integer-percent rendering.

use std::collections::HashSet;

use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;

const SUM_TOLERANCE: f64 = 1e-6;

/// How weight entries without a matching panel column are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingAssetPolicy {
  /// Drop the entry and log a warning. Its share stays uninvested.
  #[default]
  Drop,
  /// Drop the entry, log a warning and renormalize the remaining weights.
  Renormalize,
  /// Reject the request with an input error.
  Strict,
}

/// Asset id → fraction in `[0, 1]`. Entries keep their insertion order and
/// the fractions sum to 1 unless the vector is empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightVector {
  entries: Vec<(String, f64)>,
}

impl WeightVector {
  /// Validate fractional weights that already sum to one.
  pub fn new(entries: Vec<(String, f64)>) -> AnalyticsResult<Self> {
    check_unique(&entries)?;
    if let Some((id, w)) = entries
      .iter()
      .find(|(_, w)| !w.is_finite() || !(0.0..=1.0).contains(w))
    {
      return Err(AnalyticsError::input(format!(
        "weight {w} for '{id}' is outside [0, 1]"
      )));
    }
    let total: f64 = entries.iter().map(|(_, w)| w).sum();
    if !entries.is_empty() && (total - 1.0).abs() > SUM_TOLERANCE {
      return Err(AnalyticsError::input(format!(
        "weights sum to {total}, expected 1"
      )));
    }
    Ok(Self { entries })
  }

  /// Normalize arbitrary non-negative weights (e.g. percentages) to
  /// fractions of their sum.
  pub fn from_raw(entries: Vec<(String, f64)>) -> AnalyticsResult<Self> {
    check_unique(&entries)?;
    if let Some((id, w)) = entries.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
      return Err(AnalyticsError::input(format!("invalid weight {w} for '{id}'")));
    }
    let total: f64 = entries.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
      return Err(AnalyticsError::input("total weight is zero"));
    }
    Ok(Self {
      entries: entries.into_iter().map(|(id, w)| (id, w / total)).collect(),
    })
  }

  /// Pair solver output with asset ids. Weights are clipped to `[0, 1]` and
  /// renormalized.
  pub fn from_solution(assets: &[String], weights: &[f64]) -> AnalyticsResult<Self> {
    if assets.len() != weights.len() {
      return Err(AnalyticsError::input(format!(
        "{} assets but {} weights",
        assets.len(),
        weights.len()
      )));
    }
    Self::from_raw(
      assets
        .iter()
        .cloned()
        .zip(weights.iter().map(|w| w.clamp(0.0, 1.0)))
        .collect(),
    )
  }

  /// Equal weights, the explicit fallback when an allocator has too little
  /// history to work with.
  pub fn equal<S: AsRef<str>>(assets: &[S]) -> Self {
    let n = assets.len();
    Self {
      entries: assets
        .iter()
        .map(|a| (a.as_ref().to_string(), 1.0 / n as f64))
        .collect(),
    }
  }

  /// Keep the `max_assets` largest weights and renormalize. Ties keep the
  /// earlier entry.
  pub fn concentrate(&self, max_assets: usize) -> AnalyticsResult<Self> {
    if max_assets == 0 {
      return Err(AnalyticsError::input("cannot concentrate into zero assets"));
    }
    if self.entries.len() <= max_assets {
      return Ok(self.clone());
    }

    let mut order: Vec<usize> = (0..self.entries.len()).collect();
    order.sort_by(|&a, &b| self.entries[b].1.total_cmp(&self.entries[a].1));
    let mut keep = order[..max_assets].to_vec();
    keep.sort_unstable();

    Self::from_raw(keep.into_iter().map(|i| self.entries[i].clone()).collect())
  }

  pub fn get(&self, id: &str) -> Option<f64> {
    self
      .entries
      .iter()
      .find(|(a, _)| a == id)
      .map(|(_, w)| *w)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.entries.iter().map(|(a, w)| (a.as_str(), *w))
  }

  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(a, _)| a.as_str())
  }

  pub fn values(&self) -> Vec<f64> {
    self.entries.iter().map(|(_, w)| *w).collect()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn into_entries(self) -> Vec<(String, f64)> {
    self.entries
  }

  /// Integer percentages summing to exactly 100.
  pub fn to_percentages(&self) -> AnalyticsResult<Vec<(String, i64)>> {
    let pct = integer_percentages(&self.values())?;
    Ok(
      self
        .entries
        .iter()
        .map(|(a, _)| a.clone())
        .zip(pct)
        .collect(),
    )
  }
}

fn check_unique(entries: &[(String, f64)]) -> AnalyticsResult<()> {
  let mut seen = HashSet::with_capacity(entries.len());
  for (id, _) in entries {
    if !seen.insert(id.as_str()) {
      return Err(AnalyticsError::input(format!("duplicate weight for '{id}'")));
    }
  }
  Ok(())
}

/// Round fractional weights to integer percentages that sum to exactly 100.
///
/// Weights are first normalized to fractions of their sum, each is rounded
/// half-to-even, and the remainder goes to the largest weight (first one on
/// ties). Only the total is guaranteed: a negative remainder can push that
/// entry below zero, as with 22 equal weights.
pub fn integer_percentages(weights: &[f64]) -> AnalyticsResult<Vec<i64>> {
  if weights.is_empty() {
    return Err(AnalyticsError::input("no weights to round"));
  }
  if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
    return Err(AnalyticsError::input("weights must be finite and non-negative"));
  }
  let total: f64 = weights.iter().sum();
  if total <= 0.0 {
    return Err(AnalyticsError::input("total weight is zero"));
  }

  let mut pct: Vec<i64> = weights
    .iter()
    .map(|w| (w / total * 100.0).round_ties_even() as i64)
    .collect();
  let remainder = 100 - pct.iter().sum::<i64>();

  let mut top = 0;
  for (i, w) in weights.iter().enumerate() {
    if *w > weights[top] {
      top = i;
    }
  }
  pct[top] += remainder;
  Ok(pct)
}
