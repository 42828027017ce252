//! # Portfolio Statistics
//!
//! $$
//! \mu_p=\mu^\top\mathbf w,\qquad \sigma_p=\sqrt{\mathbf w^\top\Sigma\mathbf w},\qquad
//! S=\frac{\mu_p}{\sigma_p}
//! $$
//!
use ndarray::Array1;
use ndarray::Array2;

use super::types::PortfolioPoint;
use super::types::ReturnMatrix;
use super::types::ReturnMoments;
use super::types::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// Volatility at or below this is treated as zero.
pub const MIN_VOLATILITY: f64 = 1e-15;

pub(crate) fn portfolio_return(w: &Array1<f64>, mean: &Array1<f64>) -> f64 {
  w.dot(mean)
}

pub(crate) fn portfolio_variance(w: &Array1<f64>, cov: &Array2<f64>) -> f64 {
  w.dot(&cov.dot(w))
}

/// Score `weights` against annualized moments.
///
/// A portfolio whose volatility is zero has no Sharpe ratio; instead of
/// producing `inf` or `NaN` this fails with [`PortfolioError::DegenerateInput`].
pub fn evaluate(weights: &WeightVector, moments: &ReturnMoments) -> Result<PortfolioPoint> {
  if weights.len() != moments.n_assets() {
    return Err(PortfolioError::invalid(format!(
      "{} weights for {} assets",
      weights.len(),
      moments.n_assets()
    )));
  }

  let w = weights.as_array();
  let expected_return = portfolio_return(w, moments.mean());
  // Rounding can push a PSD quadratic form marginally below zero.
  let volatility = portfolio_variance(w, moments.covariance()).max(0.0).sqrt();

  if volatility <= MIN_VOLATILITY {
    return Err(PortfolioError::DegenerateInput(format!(
      "portfolio volatility is zero (expected return {expected_return:.6}); Sharpe ratio undefined"
    )));
  }

  Ok(PortfolioPoint {
    weights: weights.clone(),
    expected_return,
    volatility,
    sharpe_ratio: expected_return / volatility,
  })
}

/// Score `weights` directly against a return matrix, annualizing with
/// `trading_periods_per_year`.
pub fn evaluate_returns(
  weights: &WeightVector,
  returns: &ReturnMatrix,
  trading_periods_per_year: usize,
) -> Result<PortfolioPoint> {
  let moments = returns.moments(trading_periods_per_year)?;
  evaluate(weights, &moments)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;
  use crate::quant::portfolio::data::estimate_log_returns;
  use crate::quant::portfolio::types::PriceHistory;

  fn moments() -> ReturnMoments {
    ReturnMoments::new(
      vec!["A".into(), "B".into()],
      array![0.10, 0.05],
      array![[0.04, 0.006], [0.006, 0.09]],
      252,
    )
    .unwrap()
  }

  #[test]
  fn evaluate_matches_quadratic_form() {
    let w = WeightVector::new(array![0.6, 0.4]).unwrap();
    let p = evaluate(&w, &moments()).unwrap();

    let ret = 0.6 * 0.10 + 0.4 * 0.05;
    let var: f64 = 0.36 * 0.04 + 2.0 * 0.24 * 0.006 + 0.16 * 0.09;
    assert_abs_diff_eq!(p.expected_return(), ret, epsilon = 1e-15);
    assert_abs_diff_eq!(p.volatility(), var.sqrt(), epsilon = 1e-15);
    assert_abs_diff_eq!(p.sharpe_ratio(), ret / var.sqrt(), epsilon = 1e-12);
  }

  #[test]
  fn mismatched_dimensions_are_invalid() {
    let w = WeightVector::uniform(3).unwrap();
    assert!(matches!(
      evaluate(&w, &moments()),
      Err(PortfolioError::InvalidInput(_))
    ));
  }

  #[test]
  fn constant_single_asset_is_degenerate() {
    let h = PriceHistory::new(vec!["FLAT".into()], array![[10.0], [10.0], [10.0], [10.0]]).unwrap();
    let r = estimate_log_returns(&h).unwrap();
    let w = WeightVector::uniform(1).unwrap();

    let err = evaluate_returns(&w, &r, 252).unwrap_err();
    assert!(matches!(err, PortfolioError::DegenerateInput(_)));
  }
}
