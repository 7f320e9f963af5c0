//! # Aligned Panel
//!
//! $$
//! P_{t,j} = P_{\tau(t),j},\quad \tau(t) = \max\{s \le t : P_{s,j}\ \text{observed}\}
//! $$
//!
//! Multi-asset price panel on a shared date axis (union of input dates,
//! forward-filled once), with horizon restriction.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use tracing::debug;

use super::horizon::Horizon;
use super::series::AssetSeries;
use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;

/// Alignment options.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlignOptions {
  /// Reindex to every calendar day between the first and last date before
  /// forward-filling, instead of the union of observed dates.
  pub calendar_daily: bool,
}

/// Asset id → price per date over a shared, strictly increasing date axis.
///
/// Rows are dates, columns are assets. Every cell holds a positive price.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedPanel {
  dates: Vec<NaiveDate>,
  assets: Vec<String>,
  prices: Array2<f64>,
}

impl AlignedPanel {
  /// Align a set of series on the union of their dates and forward-fill.
  ///
  /// Leading dates on which some asset has not started trading yet are
  /// dropped, so the panel starts at the latest first date.
  pub fn align(series: &[AssetSeries], options: AlignOptions) -> AnalyticsResult<Self> {
    if series.is_empty() {
      return Err(AnalyticsError::input("no series to align"));
    }

    let mut seen = BTreeSet::new();
    for s in series {
      if !seen.insert(s.id()) {
        return Err(AnalyticsError::input(format!("duplicate asset id '{}'", s.id())));
      }
    }

    let start = series.iter().map(|s| s.first_date()).max().unwrap_or(NaiveDate::MIN);
    let axis: Vec<NaiveDate> = if options.calendar_daily {
      let end = series.iter().map(|s| s.last_date()).max().unwrap_or(start);
      start.iter_days().take_while(|d| *d <= end).collect()
    } else {
      series
        .iter()
        .flat_map(|s| s.points().iter().map(|&(d, _)| d))
        .filter(|d| *d >= start)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
    };

    let mut prices = Array2::<f64>::zeros((axis.len(), series.len()));
    for (j, s) in series.iter().enumerate() {
      let points = s.points();
      let mut cursor = 0;
      let mut last = None;
      for (i, date) in axis.iter().enumerate() {
        while cursor < points.len() && points[cursor].0 <= *date {
          last = Some(points[cursor].1);
          cursor += 1;
        }
        // `start` is every series' first date or later, so `last` is set.
        prices[[i, j]] = last.unwrap_or(f64::NAN);
      }
    }

    let panel = Self {
      dates: axis,
      assets: series.iter().map(|s| s.id().to_string()).collect(),
      prices,
    };
    debug!(
      dates = panel.len(),
      assets = panel.assets.len(),
      "aligned price panel"
    );
    Ok(panel)
  }

  /// Build a panel directly from an already aligned matrix.
  pub fn from_parts(
    dates: Vec<NaiveDate>,
    assets: Vec<String>,
    prices: Array2<f64>,
  ) -> AnalyticsResult<Self> {
    if prices.nrows() != dates.len() || prices.ncols() != assets.len() {
      return Err(AnalyticsError::input(format!(
        "price matrix is {}x{} but axis is {}x{}",
        prices.nrows(),
        prices.ncols(),
        dates.len(),
        assets.len()
      )));
    }
    if dates.windows(2).any(|w| w[0] >= w[1]) {
      return Err(AnalyticsError::input("panel dates are not strictly increasing"));
    }
    if let Some(bad) = prices.iter().find(|p| !p.is_finite() || **p <= 0.0) {
      return Err(AnalyticsError::input(format!("panel holds invalid price {bad}")));
    }
    Ok(Self {
      dates,
      assets,
      prices,
    })
  }

  /// Restrict to a horizon. The anchor is the last date of the panel.
  pub fn restrict(&self, horizon: &Horizon) -> AnalyticsResult<Self> {
    let Some(anchor) = self.dates.last().copied() else {
      return Ok(self.clone());
    };
    let Some((start, end)) = horizon.window(anchor)? else {
      return Ok(self.clone());
    };

    let rows: Vec<usize> = self
      .dates
      .iter()
      .enumerate()
      .filter(|(_, d)| **d >= start && **d <= end)
      .map(|(i, _)| i)
      .collect();

    debug!(%horizon, %start, %end, kept = rows.len(), "restricted panel to horizon");
    Ok(Self {
      dates: rows.iter().map(|&i| self.dates[i]).collect(),
      assets: self.assets.clone(),
      prices: self.prices.select(Axis(0), &rows),
    })
  }

  /// Reindex to every calendar day between the first and last date and
  /// forward-fill.
  pub fn resample_calendar_daily(&self) -> Self {
    let (Some(&first), Some(&last)) = (self.dates.first(), self.dates.last()) else {
      return self.clone();
    };

    let axis: Vec<NaiveDate> = first.iter_days().take_while(|d| *d <= last).collect();
    let mut prices = Array2::<f64>::zeros((axis.len(), self.assets.len()));
    let mut src = 0;
    for (i, date) in axis.iter().enumerate() {
      while src + 1 < self.dates.len() && self.dates[src + 1] <= *date {
        src += 1;
      }
      prices.row_mut(i).assign(&self.prices.row(src));
    }

    Self {
      dates: axis,
      assets: self.assets.clone(),
      prices,
    }
  }

  /// Keep only the named assets, in the given order. Unknown ids are ignored.
  pub fn select(&self, ids: &[&str]) -> Self {
    let cols: Vec<usize> = ids.iter().filter_map(|id| self.column_of(id)).collect();
    Self {
      dates: self.dates.clone(),
      assets: cols.iter().map(|&j| self.assets[j].clone()).collect(),
      prices: self.prices.select(Axis(1), &cols),
    }
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  /// Number of dates.
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn column_of(&self, id: &str) -> Option<usize> {
    self.assets.iter().position(|a| a == id)
  }

  pub fn column(&self, id: &str) -> Option<ArrayView1<'_, f64>> {
    self.column_of(id).map(|j| self.prices.column(j))
  }

  /// Last date of the axis, the anchor for relative horizons.
  pub fn anchor(&self) -> Option<NaiveDate> {
    self.dates.last().copied()
  }

  /// Prices of one asset as an owned vector.
  pub fn series(&self, id: &str) -> Option<Array1<f64>> {
    self.column(id).map(|c| c.to_owned())
  }
}
