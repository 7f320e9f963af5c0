//! # portfolio-lab
//!
//! $$
//! \{(t_i, P_{i})\}_{\text{asset}} \longrightarrow
//! \big(\text{RiskMetrics},\ \mathbf{w},\ \text{FrontierCurve}\big)
//! $$
//!
//! Risk/return analytics and allocation over historical price series.
//!
//! The pipeline runs, leaves first:
//!
//! - [`data`]: horizon parsing, panel alignment, periodic returns and the
//!   [`data::NavProvider`] contract for the external price source.
//! - [`stats`]: annualized risk metrics and covariance estimation.
//! - [`portfolio`]: weighted portfolio synthesis, hierarchical risk parity,
//!   long-only mean-variance optimization, the efficient frontier and
//!   integer-percent weight rendering.
//!
//! Every call is pure over its inputs. [`portfolio::AnalysisEngine`] bundles
//! the configuration for callers that want a single entry point.

pub mod data;
pub mod error;
pub mod portfolio;
pub mod stats;

pub use error::AnalyticsError;
pub use error::AnalyticsResult;
pub use error::ErrorKind;
