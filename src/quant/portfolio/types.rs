//! # Portfolio Types
//!
//! $$
//! \mathbf{w}\in\Delta^{N-1}=\{\mathbf{w}\in\mathbb R^N:\ \mathbf 1^\top\mathbf{w}=1,\ 0\le w_i\le 1\}
//! $$
//!
//! Price, return and allocation containers shared by the estimation, sampling
//! and optimization stages.
use std::collections::HashSet;

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;

use crate::error::PortfolioError;
use crate::error::Result;

/// Trading periods per year used for annualization when nothing else is given.
pub const TRADING_DAYS_PER_YEAR: usize = 252;

/// Default number of Monte-Carlo portfolios drawn per run.
pub const DEFAULT_SAMPLE_COUNT: usize = 10_000;

/// Tolerance on the budget and bound constraints of a [`WeightVector`].
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Dense `[T dates × N assets]` matrix of prices, rows ordered by date.
///
/// The caller is responsible for aligning and cleaning the series; the matrix
/// has no missing values.
#[derive(Clone, Debug)]
pub struct PriceHistory {
  assets: Vec<String>,
  dates: Option<Vec<NaiveDate>>,
  prices: Array2<f64>,
}

impl PriceHistory {
  /// Build an undated history. Validates shape and identifiers only; price
  /// values are checked when returns are estimated.
  pub fn new(assets: Vec<String>, prices: Array2<f64>) -> Result<Self> {
    if assets.is_empty() {
      return Err(PortfolioError::invalid("price history needs at least one asset"));
    }
    if assets.len() != prices.ncols() {
      return Err(PortfolioError::invalid(format!(
        "{} asset identifiers for {} price columns",
        assets.len(),
        prices.ncols()
      )));
    }

    let mut seen = HashSet::with_capacity(assets.len());
    for asset in &assets {
      if asset.trim().is_empty() {
        return Err(PortfolioError::invalid("asset identifiers must be non-empty"));
      }
      if !seen.insert(asset.as_str()) {
        return Err(PortfolioError::invalid(format!("duplicate asset '{asset}'")));
      }
    }

    Ok(Self {
      assets,
      dates: None,
      prices,
    })
  }

  /// Attach one strictly increasing date per row.
  pub fn with_dates(mut self, dates: Vec<NaiveDate>) -> Result<Self> {
    if dates.len() != self.prices.nrows() {
      return Err(PortfolioError::invalid(format!(
        "{} dates for {} price rows",
        dates.len(),
        self.prices.nrows()
      )));
    }
    if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
      return Err(PortfolioError::invalid(format!(
        "dates must be strictly increasing ({} followed by {})",
        pair[0], pair[1]
      )));
    }

    self.dates = Some(dates);
    Ok(self)
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn dates(&self) -> Option<&[NaiveDate]> {
    self.dates.as_deref()
  }

  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  /// Number of dated rows `T`.
  pub fn n_periods(&self) -> usize {
    self.prices.nrows()
  }

  /// Number of assets `N`.
  pub fn n_assets(&self) -> usize {
    self.prices.ncols()
  }
}

/// `[T-1 × N]` per-period log-returns, same column order as the source history.
#[derive(Clone, Debug)]
pub struct ReturnMatrix {
  pub(crate) assets: Vec<String>,
  pub(crate) returns: Array2<f64>,
}

impl ReturnMatrix {
  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn returns(&self) -> &Array2<f64> {
    &self.returns
  }

  pub fn n_periods(&self) -> usize {
    self.returns.nrows()
  }

  pub fn n_assets(&self) -> usize {
    self.returns.ncols()
  }
}

/// Annualized mean vector and covariance matrix of a [`ReturnMatrix`].
#[derive(Clone, Debug)]
pub struct ReturnMoments {
  assets: Vec<String>,
  mean: Array1<f64>,
  covariance: Array2<f64>,
  trading_periods_per_year: usize,
}

impl ReturnMoments {
  /// Wrap externally estimated moments. The covariance must be square,
  /// symmetric, finite and have a non-negative diagonal.
  pub fn new(
    assets: Vec<String>,
    mean: Array1<f64>,
    covariance: Array2<f64>,
    trading_periods_per_year: usize,
  ) -> Result<Self> {
    let n = mean.len();
    if n == 0 {
      return Err(PortfolioError::invalid("moments need at least one asset"));
    }
    if assets.len() != n {
      return Err(PortfolioError::invalid(format!(
        "{} asset identifiers for {n} means",
        assets.len()
      )));
    }
    if covariance.dim() != (n, n) {
      return Err(PortfolioError::invalid(format!(
        "covariance shape {:?} does not match {n} assets",
        covariance.dim()
      )));
    }
    if mean.iter().chain(covariance.iter()).any(|v| !v.is_finite()) {
      return Err(PortfolioError::invalid("moments contain non-finite values"));
    }
    for i in 0..n {
      if covariance[[i, i]] < 0.0 {
        return Err(PortfolioError::invalid(format!(
          "negative variance for asset '{}'",
          assets[i]
        )));
      }
      for j in (i + 1)..n {
        let (a, b) = (covariance[[i, j]], covariance[[j, i]]);
        if (a - b).abs() > 1e-12 * a.abs().max(b.abs()).max(1.0) {
          return Err(PortfolioError::invalid("covariance matrix is not symmetric"));
        }
      }
    }

    Ok(Self {
      assets,
      mean,
      covariance,
      trading_periods_per_year,
    })
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  /// Annualized expected return per asset.
  pub fn mean(&self) -> &Array1<f64> {
    &self.mean
  }

  /// Annualized covariance matrix.
  pub fn covariance(&self) -> &Array2<f64> {
    &self.covariance
  }

  pub fn trading_periods_per_year(&self) -> usize {
    self.trading_periods_per_year
  }

  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }
}

/// Long-only, fully invested allocation: components in `[0, 1]` summing to one.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightVector(Array1<f64>);

impl WeightVector {
  /// Validate `weights` against the budget and bound constraints using
  /// [`WEIGHT_TOLERANCE`].
  pub fn new(weights: Array1<f64>) -> Result<Self> {
    Self::with_tolerance(weights, WEIGHT_TOLERANCE)
  }

  /// Validate `weights` with an explicit tolerance.
  pub fn with_tolerance(weights: Array1<f64>, tolerance: f64) -> Result<Self> {
    if weights.is_empty() {
      return Err(PortfolioError::invalid("weight vector is empty"));
    }
    if let Some((i, w)) = weights
      .iter()
      .enumerate()
      .find(|(_, w)| !w.is_finite() || **w < -tolerance || **w > 1.0 + tolerance)
    {
      return Err(PortfolioError::invalid(format!(
        "weight {i} = {w} is outside [0, 1]"
      )));
    }
    let sum = weights.sum();
    if (sum - 1.0).abs() > tolerance {
      return Err(PortfolioError::invalid(format!(
        "weights sum to {sum}, expected 1"
      )));
    }

    Ok(Self(weights))
  }

  /// Equal-weight allocation `1/n`.
  pub fn uniform(n: usize) -> Result<Self> {
    if n == 0 {
      return Err(PortfolioError::invalid("weight vector is empty"));
    }
    Ok(Self(Array1::from_elem(n, 1.0 / n as f64)))
  }

  /// Normalize non-negative raw scores by their sum.
  pub fn from_unnormalized(raw: Array1<f64>) -> Result<Self> {
    if raw.iter().any(|v| !v.is_finite() || *v < 0.0) {
      return Err(PortfolioError::invalid(
        "raw weights must be finite and non-negative",
      ));
    }
    let total = raw.sum();
    if total <= 0.0 {
      return Err(PortfolioError::invalid("raw weights sum to zero"));
    }
    Self::new(raw / total)
  }

  pub fn as_array(&self) -> &Array1<f64> {
    &self.0
  }

  pub fn to_vec(&self) -> Vec<f64> {
    self.0.to_vec()
  }

  pub fn iter(&self) -> impl Iterator<Item = &f64> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn into_inner(self) -> Array1<f64> {
    self.0
  }
}

/// A scored allocation. Built only by [`super::statistics::evaluate`].
#[derive(Clone, Debug, PartialEq)]
pub struct PortfolioPoint {
  pub(crate) weights: WeightVector,
  pub(crate) expected_return: f64,
  pub(crate) volatility: f64,
  pub(crate) sharpe_ratio: f64,
}

impl PortfolioPoint {
  pub fn weights(&self) -> &WeightVector {
    &self.weights
  }

  /// Annualized expected return.
  pub fn expected_return(&self) -> f64 {
    self.expected_return
  }

  /// Annualized volatility.
  pub fn volatility(&self) -> f64 {
    self.volatility
  }

  /// `expected_return / volatility` (risk-free rate 0).
  pub fn sharpe_ratio(&self) -> f64 {
    self.sharpe_ratio
  }
}
