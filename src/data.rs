//! # Data
//!
//! $$
//! r_t = \frac{P_t}{P_{t-1}} - 1
//! $$
//!
//! Price series intake, horizon restriction, panel alignment and returns.

pub mod horizon;
pub mod panel;
pub mod provider;
pub mod returns;
pub mod series;

pub use horizon::Horizon;
pub use panel::AlignOptions;
pub use panel::AlignedPanel;
pub use provider::InMemoryNavProvider;
pub use provider::NavProvider;
pub use provider::load_panel;
pub use returns::ReturnPanel;
pub use returns::nav_from_returns;
pub use returns::simple_returns;
pub use series::AssetSeries;
