//! # NAV Provider
//!
//! $$
//! \text{asset id} \mapsto \{(t_i, P_i)\} \;\|\; \varnothing
//! $$
//!
//! Contract for the external price source and the load → align → restrict step.

use std::collections::HashMap;

use tracing::debug;
use tracing::warn;

use super::horizon::Horizon;
use super::panel::AlignOptions;
use super::panel::AlignedPanel;
use super::series::AssetSeries;
use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;

/// Source of historical prices.
///
/// `Ok(None)` is the explicit "no data" signal. Errors are opaque transport
/// or storage failures of the provider itself.
pub trait NavProvider {
  fn nav(&self, asset: &str) -> anyhow::Result<Option<AssetSeries>>;
}

/// Provider backed by a map, for callers that already hold the data.
#[derive(Clone, Debug, Default)]
pub struct InMemoryNavProvider {
  series: HashMap<String, AssetSeries>,
}

impl InMemoryNavProvider {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, series: AssetSeries) {
    self.series.insert(series.id().to_string(), series);
  }
}

impl FromIterator<AssetSeries> for InMemoryNavProvider {
  fn from_iter<I: IntoIterator<Item = AssetSeries>>(iter: I) -> Self {
    let mut provider = Self::new();
    for s in iter {
      provider.insert(s);
    }
    provider
  }
}

impl NavProvider for InMemoryNavProvider {
  fn nav(&self, asset: &str) -> anyhow::Result<Option<AssetSeries>> {
    Ok(self.series.get(asset).cloned())
  }
}

/// Fetch every asset, align the series and restrict the panel to `horizon`.
///
/// Assets without data, or whose provider call fails, are skipped and logged.
/// Fails with an input error when nothing is left to align.
pub fn load_panel<P: NavProvider + ?Sized>(
  provider: &P,
  assets: &[&str],
  horizon: &Horizon,
  options: AlignOptions,
) -> AnalyticsResult<AlignedPanel> {
  let mut series = Vec::with_capacity(assets.len());
  for &asset in assets {
    match provider.nav(asset) {
      Ok(Some(s)) => series.push(s),
      Ok(None) => warn!(asset, "no price data, asset skipped"),
      Err(err) => warn!(asset, error = %err, "price provider failed, asset skipped"),
    }
  }

  if series.is_empty() {
    return Err(AnalyticsError::input("no price data for any requested asset"));
  }

  debug!(requested = assets.len(), loaded = series.len(), "loaded price series");
  AlignedPanel::align(&series, options)?.restrict(horizon)
}
