//! # Errors
//!
//! Error taxonomy shared by every portfolio component.
//!
use thiserror::Error;

/// Errors raised by estimation, sampling, optimization and data providers.
///
/// Every variant is returned to the immediate caller. Nothing in the crate
/// retries or swallows them; fallback policy (another starting point, a
/// different date range) belongs to the caller.
#[derive(Debug, Error)]
pub enum PortfolioError {
  /// Malformed price history, non-positive prices, bad counts or configuration.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// A price-history provider could not supply the requested data.
  #[error("data unavailable: {0}")]
  DataUnavailable(String),

  /// The optimizer did not reach a feasible stationary point.
  #[error(
    "optimizer did not converge after {iterations} iterations (objective {objective:.6})"
  )]
  Convergence {
    /// Best iterate found before the solver gave up.
    weights: Vec<f64>,
    /// Iterations performed.
    iterations: u64,
    /// Objective (negative Sharpe ratio) at `weights`.
    objective: f64,
  },

  /// Portfolio volatility is zero, so the Sharpe ratio is undefined.
  #[error("degenerate input: {0}")]
  DegenerateInput(String),
}

impl PortfolioError {
  pub(crate) fn invalid(msg: impl Into<String>) -> Self {
    Self::InvalidInput(msg.into())
  }

  pub(crate) fn unavailable(msg: impl Into<String>) -> Self {
    Self::DataUnavailable(msg.into())
  }
}

/// Result alias for portfolio operations.
pub type Result<T> = std::result::Result<T, PortfolioError>;
