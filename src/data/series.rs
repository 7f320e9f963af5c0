//! # Asset Series
//!
//! $$
//! \{(t_i, P_i)\}_{i=1}^n,\quad t_1 < t_2 < \dots < t_n,\quad P_i > 0
//! $$
//!
//! Validated per-asset price history.

use chrono::NaiveDate;

use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;

/// Ordered `(date, price)` history of a single asset.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetSeries {
  id: String,
  points: Vec<(NaiveDate, f64)>,
}

impl AssetSeries {
  /// Build a series, rejecting empty input, non-increasing dates and
  /// non-positive or non-finite prices.
  pub fn new(id: impl Into<String>, points: Vec<(NaiveDate, f64)>) -> AnalyticsResult<Self> {
    let id = id.into();
    if points.is_empty() {
      return Err(AnalyticsError::input(format!("series '{id}' is empty")));
    }

    for (i, &(date, price)) in points.iter().enumerate() {
      if !price.is_finite() || price <= 0.0 {
        return Err(AnalyticsError::input(format!(
          "series '{id}' has invalid price {price} on {date}"
        )));
      }
      if i > 0 && date <= points[i - 1].0 {
        return Err(AnalyticsError::input(format!(
          "series '{id}' dates are not strictly increasing at {date}"
        )));
      }
    }

    Ok(Self { id, points })
  }

  /// Sort by date first, keeping the last price for duplicated dates, then
  /// validate. Useful for raw provider output.
  pub fn from_unsorted(
    id: impl Into<String>,
    mut points: Vec<(NaiveDate, f64)>,
  ) -> AnalyticsResult<Self> {
    points.sort_by_key(|&(date, _)| date);
    let mut dedup: Vec<(NaiveDate, f64)> = Vec::with_capacity(points.len());
    for point in points {
      match dedup.last_mut() {
        Some(last) if last.0 == point.0 => *last = point,
        _ => dedup.push(point),
      }
    }
    Self::new(id, dedup)
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub fn points(&self) -> &[(NaiveDate, f64)] {
    &self.points
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn first_date(&self) -> NaiveDate {
    self.points[0].0
  }

  pub fn last_date(&self) -> NaiveDate {
    self.points[self.points.len() - 1].0
  }

  /// Prices in date order.
  pub fn prices(&self) -> Vec<f64> {
    self.points.iter().map(|&(_, p)| p).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;

  fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
  }

  #[test]
  fn rejects_empty_series() {
    let err = AssetSeries::new("A", vec![]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
  }

  #[test]
  fn rejects_non_positive_and_nan_prices() {
    assert!(AssetSeries::new("A", vec![(d(1), 100.0), (d(2), 0.0)]).is_err());
    assert!(AssetSeries::new("A", vec![(d(1), -1.0)]).is_err());
    assert!(AssetSeries::new("A", vec![(d(1), f64::NAN)]).is_err());
  }

  #[test]
  fn rejects_unordered_or_duplicated_dates() {
    assert!(AssetSeries::new("A", vec![(d(2), 1.0), (d(1), 1.0)]).is_err());
    assert!(AssetSeries::new("A", vec![(d(1), 1.0), (d(1), 2.0)]).is_err());
  }

  #[test]
  fn from_unsorted_sorts_and_keeps_last_duplicate() {
    let s = AssetSeries::from_unsorted("A", vec![(d(3), 3.0), (d(1), 1.0), (d(3), 4.0)]).unwrap();
    assert_eq!(s.points(), &[(d(1), 1.0), (d(3), 4.0)]);
    assert_eq!(s.first_date(), d(1));
    assert_eq!(s.last_date(), d(3));
  }
}
