use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use markowitz_rs::quant::portfolio::CsvProvider;
use markowitz_rs::quant::portfolio::OptimizerConfig;
use markowitz_rs::quant::portfolio::PortfolioEngine;
use markowitz_rs::quant::portfolio::PortfolioEngineConfig;
use markowitz_rs::quant::portfolio::PriceHistoryProvider;
use markowitz_rs::visualization::write_frontier_html;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
  author,
  version,
  about = "Efficient-frontier portfolio allocation by Monte-Carlo sampling and Sharpe maximization",
  after_help = "EXAMPLES:
    # All columns of a wide CSV (date,AAPL,WMT,...)
    markowitz --prices prices.csv

    # Selected assets and window, reproducible, with a chart
    markowitz --prices prices.csv --assets AAPL,WMT,TSLA --start 2012-01-01 --end 2017-01-01 --seed 42 --plot frontier.html"
)]
struct Args {
  /// Wide CSV of close prices: `date,ASSET1,ASSET2,...`
  #[arg(long)]
  prices: Option<PathBuf>,

  /// Download daily closes from Yahoo Finance instead of reading a CSV
  #[cfg(feature = "yahoo")]
  #[arg(long)]
  yahoo: bool,

  /// Comma-separated asset identifiers (default: every CSV column)
  #[arg(long, value_delimiter = ',')]
  assets: Vec<String>,

  /// First date of the window (YYYY-MM-DD, inclusive)
  #[arg(long)]
  start: Option<NaiveDate>,

  /// Last date of the window (YYYY-MM-DD, inclusive)
  #[arg(long)]
  end: Option<NaiveDate>,

  /// Number of random portfolios
  #[arg(long, default_value_t = 10_000)]
  samples: usize,

  /// Sampling seed (random when omitted)
  #[arg(long)]
  seed: Option<u64>,

  /// Trading periods per year used for annualization
  #[arg(long, default_value_t = 252)]
  trading_days: usize,

  /// Sample in parallel and run the optimizer concurrently
  #[arg(long)]
  parallel: bool,

  /// Optimizer iteration budget
  #[arg(long, default_value_t = 1000)]
  max_iters: u64,

  /// Optimizer stationarity tolerance
  #[arg(long, default_value_t = 1e-6)]
  tolerance: f64,

  /// Write the frontier chart to this HTML file
  #[arg(long)]
  plot: Option<PathBuf>,
}

struct Source {
  provider: Box<dyn PriceHistoryProvider>,
  assets: Vec<String>,
  /// Window defaults to every row when set.
  whole_file: bool,
}

#[cfg(feature = "yahoo")]
fn yahoo_source(args: &Args) -> anyhow::Result<Option<Source>> {
  if !args.yahoo {
    return Ok(None);
  }
  if args.assets.is_empty() {
    bail!("--yahoo needs --assets");
  }
  let yahoo = markowitz_rs::quant::yahoo::YahooProvider::new()?;
  Ok(Some(Source {
    provider: Box::new(yahoo),
    assets: args.assets.clone(),
    whole_file: false,
  }))
}

#[cfg(not(feature = "yahoo"))]
fn yahoo_source(_args: &Args) -> anyhow::Result<Option<Source>> {
  Ok(None)
}

fn provider(args: &Args) -> anyhow::Result<Source> {
  if let Some(source) = yahoo_source(args)? {
    return Ok(source);
  }

  let Some(path) = &args.prices else {
    bail!("no price source given, pass --prices <csv>");
  };
  let csv = CsvProvider::new(path);
  let assets = if args.assets.is_empty() {
    csv
      .load()
      .with_context(|| format!("reading {}", path.display()))?
      .assets()
      .to_vec()
  } else {
    args.assets.clone()
  };
  Ok(Source {
    provider: Box::new(csv),
    assets,
    whole_file: true,
  })
}

/// Date window: explicit flags win, otherwise all rows of a file or the
/// engine's default window for a remote source.
fn window(
  start: Option<NaiveDate>,
  end: Option<NaiveDate>,
  whole_file: bool,
) -> (NaiveDate, NaiveDate) {
  let defaults = PortfolioEngineConfig::default();
  let (lo, hi) = if whole_file {
    (NaiveDate::MIN, NaiveDate::MAX)
  } else {
    (defaults.start, defaults.end)
  };
  (start.unwrap_or(lo), end.unwrap_or(hi))
}

fn main() -> anyhow::Result<()> {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(env_filter).init();
  let args = Args::parse();

  let source = provider(&args)?;
  let (start, end) = window(args.start, args.end, source.whole_file);
  let config = PortfolioEngineConfig {
    assets: source.assets,
    start,
    end,
    trading_periods_per_year: args.trading_days,
    sample_count: args.samples,
    seed: args.seed,
    parallel: args.parallel,
    optimizer: OptimizerConfig {
      max_iters: args.max_iters,
      tolerance: args.tolerance,
      ..OptimizerConfig::default()
    },
  };

  let engine = PortfolioEngine::new(config);
  let run = engine
    .run(&*source.provider)
    .with_context(|| format!("portfolio run failed for {:#?}", engine.config()))?;

  println!("{}", run.render_report());

  if let Some(path) = &args.plot {
    write_frontier_html(&run.samples, run.optimal(), path)
      .with_context(|| format!("writing chart to {}", path.display()))?;
    info!(path = %path.display(), "wrote frontier chart");
  }

  Ok(())
}
