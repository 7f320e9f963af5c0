//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Portfolio synthesis, hierarchical risk parity, mean-variance optimization
//! and efficient-frontier construction.

pub mod engine;
pub mod frontier;
pub mod hrp;
pub mod linkage;
pub mod market;
pub mod optimizers;
mod qp;
pub mod screening;
pub mod synthesis;
pub mod types;
pub mod weights;

pub use engine::AllocationMethod;
pub use engine::Allocation;
pub use engine::AnalysisConfig;
pub use engine::AnalysisEngine;
pub use engine::CorrelationTable;
pub use engine::PortfolioReport;
pub use frontier::efficient_frontier;
pub use hrp::HrpAllocation;
pub use hrp::hrp_from_returns;
pub use hrp::hrp_weights;
pub use linkage::Linkage;
pub use market::MarketModel;
pub use optimizers::OptimizerConfig;
pub use optimizers::optimize;
pub use screening::ScreenedAsset;
pub use screening::ScreeningCriteria;
pub use screening::screen;
pub use synthesis::Portfolio;
pub use types::FrontierCurve;
pub use types::FrontierPoint;
pub use types::Objective;
pub use types::OptimizedPortfolio;
pub use weights::MissingAssetPolicy;
pub use weights::WeightVector;
pub use weights::integer_percentages;
