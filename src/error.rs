//! # Errors
//!
//! $$
//! \text{request} \mapsto \text{metrics} \;\|\; \text{weights} \;\|\; \text{error kind}
//! $$
//!
//! Failure taxonomy shared by every stage of the analysis pipeline.

use thiserror::Error;

/// Result type for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Coarse error classification, so callers can pick a remediation without
/// matching on payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Input,
  InsufficientData,
  InfeasibleObjective,
  NumericalInstability,
}

/// Errors raised by the analytics core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
  /// Malformed request: bad horizon token, non-positive or NaN price,
  /// empty series, inconsistent dimensions.
  #[error("invalid input: {reason}")]
  Input {
    /// What was wrong with the input.
    reason: String,
  },

  /// Fewer observations than the computation needs.
  #[error("insufficient data: need at least {required} observations, got {available}")]
  InsufficientData {
    /// Minimum number of observations required.
    required: usize,
    /// Number of observations available.
    available: usize,
  },

  /// The objective has no feasible solution under the long-only constraints.
  #[error("infeasible objective: {reason}")]
  InfeasibleObjective {
    /// Why the objective cannot be met.
    reason: String,
  },

  /// Covariance is not positive semidefinite or the solver did not converge.
  #[error("numerical instability: {reason}")]
  NumericalInstability {
    /// Diagnostic detail.
    reason: String,
  },
}

impl AnalyticsError {
  pub fn input(reason: impl Into<String>) -> Self {
    Self::Input {
      reason: reason.into(),
    }
  }

  pub fn insufficient(required: usize, available: usize) -> Self {
    Self::InsufficientData {
      required,
      available,
    }
  }

  pub fn infeasible(reason: impl Into<String>) -> Self {
    Self::InfeasibleObjective {
      reason: reason.into(),
    }
  }

  pub fn unstable(reason: impl Into<String>) -> Self {
    Self::NumericalInstability {
      reason: reason.into(),
    }
  }

  /// Classification of this error.
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Input { .. } => ErrorKind::Input,
      Self::InsufficientData { .. } => ErrorKind::InsufficientData,
      Self::InfeasibleObjective { .. } => ErrorKind::InfeasibleObjective,
      Self::NumericalInstability { .. } => ErrorKind::NumericalInstability,
    }
  }
}
