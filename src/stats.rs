//! # Stats
//!
//! $$
//! \hat\mu = \bar r P,\qquad \hat\Sigma = S P
//! $$
//!
//! Statistical building blocks: risk metrics of a return series and
//! covariance/correlation estimation.
pub mod covariance;
pub mod metrics;

pub use covariance::CovarianceEstimator;
pub use covariance::CovarianceMethod;
pub use covariance::LedoitWolf;
pub use covariance::SampleCovariance;
pub use metrics::MetricsConfig;
pub use metrics::RiskMetrics;
pub use metrics::risk_metrics;
