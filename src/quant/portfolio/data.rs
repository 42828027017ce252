//! # Portfolio Data Utilities
//!
//! $$
//! r_{t,i}=\ln\frac{P_{t,i}}{P_{t-1,i}},\qquad
//! \mu = K\,\bar r,\qquad \Sigma = K\,\widehat{\operatorname{Cov}}(r)
//! $$
//!
//! Log-return estimation and annualized moment construction.
use ndarray::s;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use super::types::PriceHistory;
use super::types::ReturnMatrix;
use super::types::ReturnMoments;
use crate::error::PortfolioError;
use crate::error::Result;

/// Convert a price history into per-period log-returns.
///
/// Every price is checked before any arithmetic: a zero, negative or
/// non-finite price fails with [`PortfolioError::InvalidInput`]. The first row
/// has no predecessor and is dropped, so the result has `T-1` rows.
pub fn estimate_log_returns(history: &PriceHistory) -> Result<ReturnMatrix> {
  let prices = history.prices();
  let t = prices.nrows();

  if t < 2 {
    return Err(PortfolioError::invalid(format!(
      "need at least 2 price rows to compute returns, got {t}"
    )));
  }
  if prices.ncols() == 0 {
    return Err(PortfolioError::invalid("price history has no asset columns"));
  }

  if let Some(((row, col), price)) = prices
    .indexed_iter()
    .find(|(_, p)| !p.is_finite() || **p <= 0.0)
  {
    return Err(PortfolioError::invalid(format!(
      "price {price} for asset '{}' at row {row} must be finite and positive",
      history.assets()[col]
    )));
  }

  let returns = (&prices.slice(s![1.., ..]) / &prices.slice(s![..t - 1, ..])).mapv(f64::ln);

  Ok(ReturnMatrix {
    assets: history.assets().to_vec(),
    returns,
  })
}

impl ReturnMatrix {
  /// Annualized mean vector and sample covariance (`ddof = 1`).
  ///
  /// Requires at least two return rows; a single observation has no sample
  /// covariance.
  pub fn moments(&self, trading_periods_per_year: usize) -> Result<ReturnMoments> {
    if trading_periods_per_year == 0 {
      return Err(PortfolioError::invalid(
        "trading periods per year must be at least 1",
      ));
    }
    if self.returns.nrows() < 2 {
      return Err(PortfolioError::invalid(format!(
        "need at least 2 return observations to estimate covariance, got {}",
        self.returns.nrows()
      )));
    }

    let k = trading_periods_per_year as f64;
    let mean = self
      .returns
      .mean_axis(Axis(0))
      .ok_or_else(|| PortfolioError::invalid("return matrix is empty"))?
      * k;

    // Rows of the transposed view are variables, columns are observations.
    let mut covariance = self
      .returns
      .t()
      .cov(1.0)
      .map_err(|_| PortfolioError::invalid("return matrix is empty"))?
      * k;

    let n = covariance.nrows();
    for i in 0..n {
      for j in (i + 1)..n {
        let avg = 0.5 * (covariance[[i, j]] + covariance[[j, i]]);
        covariance[[i, j]] = avg;
        covariance[[j, i]] = avg;
      }
    }

    ReturnMoments::new(self.assets.clone(), mean, covariance, trading_periods_per_year)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  fn history(prices: ndarray::Array2<f64>) -> PriceHistory {
    let names = (0..prices.ncols()).map(|i| format!("A{i}")).collect();
    PriceHistory::new(names, prices).unwrap()
  }

  #[test]
  fn log_returns_drop_first_row_and_recover_ratios() {
    let prices = array![
      [100.0, 50.0, 10.0],
      [101.0, 49.0, 10.5],
      [99.5, 51.2, 10.4],
      [102.3, 50.8, 11.0],
    ];
    let h = history(prices.clone());
    let r = estimate_log_returns(&h).unwrap();

    assert_eq!(r.returns().dim(), (3, 3));
    for t in 0..3 {
      for i in 0..3 {
        let ratio = prices[[t + 1, i]] / prices[[t, i]];
        assert_abs_diff_eq!(r.returns()[[t, i]].exp(), ratio, epsilon = 1e-12);
      }
    }
  }

  #[test]
  fn non_positive_price_is_rejected() {
    for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
      let h = history(array![[1.0, 2.0], [1.1, bad], [1.2, 2.2]]);
      let err = estimate_log_returns(&h).unwrap_err();
      assert!(matches!(err, PortfolioError::InvalidInput(_)), "{bad}");
    }
  }

  #[test]
  fn single_row_history_is_rejected() {
    let h = history(array![[1.0, 2.0]]);
    assert!(matches!(
      estimate_log_returns(&h),
      Err(PortfolioError::InvalidInput(_))
    ));
  }

  #[test]
  fn moments_are_annualized_sample_statistics() {
    let h = history(array![[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [4.0, 2.0]]);
    let r = estimate_log_returns(&h).unwrap();
    let m = r.moments(252).unwrap();

    let ln2 = 2.0_f64.ln();
    // Column 0 = [ln2, 0, ln2], column 1 = [0, ln2, 0].
    assert_abs_diff_eq!(m.mean()[0], 252.0 * 2.0 * ln2 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(m.mean()[1], 252.0 * ln2 / 3.0, epsilon = 1e-12);

    let var = ln2 * ln2 / 3.0;
    assert_abs_diff_eq!(m.covariance()[[0, 0]], 252.0 * var, epsilon = 1e-12);
    assert_abs_diff_eq!(m.covariance()[[1, 1]], 252.0 * var, epsilon = 1e-12);
    assert_abs_diff_eq!(m.covariance()[[0, 1]], -252.0 * var, epsilon = 1e-12);
    assert_eq!(m.covariance()[[0, 1]], m.covariance()[[1, 0]]);
  }

  #[test]
  fn moments_need_two_observations() {
    let h = history(array![[1.0], [1.1]]);
    let r = estimate_log_returns(&h).unwrap();
    assert_eq!(r.n_periods(), 1);
    assert!(r.moments(252).is_err());
    assert!(estimate_log_returns(&history(array![[1.0], [1.1], [1.2]]))
      .unwrap()
      .moments(0)
      .is_err());
  }
}
