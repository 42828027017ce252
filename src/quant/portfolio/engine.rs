//! # Portfolio Engine
//!
//! $$
//! P\ \xrightarrow{\ln}\ R\ \xrightarrow{\times 252}\ (\mu,\Sigma)\ \longrightarrow\
//! \{\mathbf w_k\}_{k=1}^{K}\ \cup\ \mathbf w^\*=\arg\max_{\mathbf w\in\Delta}S(\mathbf w)
//! $$
//!
//! High-level orchestration: fetch prices, estimate moments, sample the
//! feasible set and solve for the maximum-Sharpe allocation.

use chrono::NaiveDate;
use tracing::info;

use super::data::estimate_log_returns;
use super::optimizers::optimize_sharpe;
use super::optimizers::OptimizationReport;
use super::optimizers::OptimizerConfig;
use super::provider::HistoryRequest;
use super::provider::PriceHistoryProvider;
use super::sampler::chunk_rng;
use super::sampler::random_weights;
use super::sampler::sample_portfolios_par;
use super::sampler::sample_portfolios_seeded;
use super::types::PortfolioPoint;
use super::types::PriceHistory;
use super::types::ReturnMoments;
use super::types::WeightVector;
use super::types::DEFAULT_SAMPLE_COUNT;
use super::types::TRADING_DAYS_PER_YEAR;
use crate::error::PortfolioError;
use crate::error::Result;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct PortfolioEngineConfig {
  /// Asset identifiers, in output order.
  pub assets: Vec<String>,
  /// First date of the price window (inclusive).
  pub start: NaiveDate,
  /// Last date of the price window (inclusive).
  pub end: NaiveDate,
  /// Annualization constant for mean and covariance.
  pub trading_periods_per_year: usize,
  /// Number of Monte-Carlo portfolios.
  pub sample_count: usize,
  /// Sampling seed; a random one is drawn when `None`.
  pub seed: Option<u64>,
  /// Sample over rayon and run the optimizer alongside.
  pub parallel: bool,
  /// Sharpe solver settings.
  pub optimizer: OptimizerConfig,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      assets: ["AAPL", "WMT", "TSLA", "GE", "AMZN", "DB"]
        .into_iter()
        .map(String::from)
        .collect(),
      start: NaiveDate::from_ymd_opt(2012, 1, 1).unwrap_or_default(),
      end: NaiveDate::from_ymd_opt(2017, 1, 1).unwrap_or_default(),
      trading_periods_per_year: TRADING_DAYS_PER_YEAR,
      sample_count: DEFAULT_SAMPLE_COUNT,
      seed: None,
      parallel: false,
      optimizer: OptimizerConfig::default(),
    }
  }
}

impl PortfolioEngineConfig {
  /// Reject configurations no run could succeed with.
  pub fn validate(&self) -> Result<()> {
    if self.assets.is_empty() {
      return Err(PortfolioError::invalid("at least one asset is required"));
    }
    for (i, asset) in self.assets.iter().enumerate() {
      if asset.trim().is_empty() {
        return Err(PortfolioError::invalid("asset identifiers must be non-empty"));
      }
      if self.assets[..i].contains(asset) {
        return Err(PortfolioError::invalid(format!("duplicate asset '{asset}'")));
      }
    }
    if self.start > self.end {
      return Err(PortfolioError::invalid(format!(
        "start date {} is after end date {}",
        self.start, self.end
      )));
    }
    if self.trading_periods_per_year == 0 {
      return Err(PortfolioError::invalid(
        "trading periods per year must be at least 1",
      ));
    }
    if self.sample_count == 0 {
      return Err(PortfolioError::invalid("sample count must be at least 1"));
    }
    Ok(())
  }

  pub fn history_request(&self) -> HistoryRequest {
    HistoryRequest {
      assets: self.assets.clone(),
      start: self.start,
      end: self.end,
    }
  }
}

/// Everything one engine run produces.
#[derive(Clone, Debug)]
pub struct FrontierRun {
  /// Annualized moments the run was scored against.
  pub moments: ReturnMoments,
  /// Sampled portfolios in generation order.
  pub samples: Vec<PortfolioPoint>,
  /// Maximum-Sharpe allocation.
  pub optimum: OptimizationReport,
  /// Seed actually used for sampling.
  pub seed: u64,
}

impl FrontierRun {
  pub fn optimal(&self) -> &PortfolioPoint {
    &self.optimum.point
  }

  /// Optimal weight per asset, in configuration order.
  pub fn allocation(&self) -> Vec<(String, f64)> {
    self
      .moments
      .assets()
      .iter()
      .cloned()
      .zip(self.optimum.weights().iter().copied())
      .collect()
  }

  /// Sample with the highest Sharpe ratio.
  pub fn best_sample(&self) -> Option<&PortfolioPoint> {
    self
      .samples
      .iter()
      .max_by(|a, b| a.sharpe_ratio().total_cmp(&b.sharpe_ratio()))
  }
}

/// Single entry point for efficient-frontier runs.
#[derive(Clone, Debug)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// Fetch the configured window from `provider` and run on it.
  ///
  /// Provider failures are returned unchanged.
  pub fn run<P: PriceHistoryProvider + ?Sized>(&self, provider: &P) -> Result<FrontierRun> {
    self.config.validate()?;
    let request = self.config.history_request();
    info!(
      assets = request.assets.len(),
      start = %request.start,
      end = %request.end,
      "fetching price history"
    );
    let history = provider.fetch(&request)?;
    self.run_history(&history)
  }

  /// Run on an already loaded history.
  pub fn run_history(&self, history: &PriceHistory) -> Result<FrontierRun> {
    self.config.validate()?;
    let returns = estimate_log_returns(history)?;
    let moments = returns.moments(self.config.trading_periods_per_year)?;
    info!(
      assets = moments.n_assets(),
      observations = returns.n_periods(),
      "estimated return moments"
    );
    self.run_moments(moments)
  }

  /// Sample and optimize against precomputed moments.
  pub fn run_moments(&self, moments: ReturnMoments) -> Result<FrontierRun> {
    self.config.validate()?;
    let seed = self.config.seed.unwrap_or_else(rand::random);
    let count = self.config.sample_count;
    info!(samples = count, seed, parallel = self.config.parallel, "sampling portfolios");

    let (samples, optimum) = if self.config.parallel {
      // Chunk 0 of the parallel sampler starts with this draw, so the
      // optimizer sees the same start as in the serial path.
      let initial = random_weights(moments.n_assets(), &mut chunk_rng(seed, 0))?;
      let (samples, optimum) = rayon::join(
        || sample_portfolios_par(&moments, count, seed),
        || optimize_sharpe(&initial, &moments, &self.config.optimizer),
      );
      (samples?, optimum?)
    } else {
      let samples = sample_portfolios_seeded(&moments, count, seed)?;
      let initial = match samples.first() {
        Some(p) => p.weights().clone(),
        None => WeightVector::uniform(moments.n_assets())?,
      };
      let optimum = optimize_sharpe(&initial, &moments, &self.config.optimizer)?;
      (samples, optimum)
    };

    info!(
      expected_return = optimum.point.expected_return(),
      volatility = optimum.point.volatility(),
      sharpe_ratio = optimum.point.sharpe_ratio(),
      iterations = optimum.iterations,
      "optimal portfolio found"
    );

    Ok(FrontierRun {
      moments,
      samples,
      optimum,
      seed,
    })
  }
}
