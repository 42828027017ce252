//! # Portfolio
//!
//! $$
//! \mathbf{w}^\* = \arg\max_{\mathbf w\in\Delta^{N-1}} \frac{\mu^\top\mathbf w}{\sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}}
//! $$
//!
//! Mean-variance estimation, Monte-Carlo exploration of the long-only
//! feasible set and maximum-Sharpe optimization.

pub mod data;
pub mod engine;
pub mod optimizers;
pub mod provider;
pub mod report;
pub mod sampler;
pub mod statistics;
pub mod types;

pub use data::estimate_log_returns;
pub use engine::FrontierRun;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use optimizers::OptimizationReport;
pub use optimizers::OptimizerConfig;
pub use optimizers::SharpeObjective;
pub use optimizers::SpectralProjectedGradient;
pub use optimizers::Termination;
pub use optimizers::optimize_sharpe;
pub use provider::CsvProvider;
pub use provider::HistoryRequest;
pub use provider::InMemoryProvider;
pub use provider::PriceHistoryProvider;
pub use provider::parse_price_csv;
pub use report::details_table;
pub use report::weights_table;
pub use sampler::random_weights;
pub use sampler::sample_portfolios;
pub use sampler::sample_portfolios_par;
pub use sampler::sample_portfolios_seeded;
pub use statistics::evaluate;
pub use statistics::evaluate_returns;
pub use types::PortfolioPoint;
pub use types::PriceHistory;
pub use types::ReturnMatrix;
pub use types::ReturnMoments;
pub use types::WeightVector;
