//! # markowitz-rs
//!
//! $$
//! \max_{\mathbf w}\ \frac{\mu^\top\mathbf w}{\sqrt{\mathbf w^\top\Sigma\mathbf w}}
//! \quad\text{s.t.}\quad \mathbf 1^\top\mathbf w=1,\ 0\le w_i\le 1
//! $$
//!
//! Efficient-frontier allocation under Modern Portfolio Theory: log-return
//! moments from price histories, Monte-Carlo sampling of long-only portfolios
//! and a projected-gradient maximum-Sharpe solver.
//!
//! ```ignore
//! use markowitz_rs::quant::portfolio::{CsvProvider, PortfolioEngine, PortfolioEngineConfig};
//!
//! let engine = PortfolioEngine::new(PortfolioEngineConfig::default());
//! let run = engine.run(&CsvProvider::new("prices.csv"))?;
//! println!("{}", run.render_report());
//! ```

pub mod error;
pub mod quant;
pub mod visualization;

pub use error::PortfolioError;
pub use error::Result;
