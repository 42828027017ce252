//! # Report Tables
//!
//! Plain-text summaries of an optimal allocation.
use prettytable::format;
use prettytable::row;
use prettytable::Table;

use super::engine::FrontierRun;
use super::types::PortfolioPoint;
use super::types::WeightVector;

/// Weight per asset in percent, three decimals.
pub fn weights_table(assets: &[String], weights: &WeightVector) -> Table {
  let mut table = Table::new();
  table.set_format(*format::consts::FORMAT_BOX_CHARS);
  table.set_titles(row!["Stock Name", "Weighting"]);
  for (asset, w) in assets.iter().zip(weights.iter()) {
    table.add_row(row![asset, format!("{:.3}%", w * 100.0)]);
  }
  table
}

/// Expected return and volatility in percent, Sharpe ratio as a number.
pub fn details_table(point: &PortfolioPoint) -> Table {
  let mut table = Table::new();
  table.set_format(*format::consts::FORMAT_BOX_CHARS);
  table.set_titles(row!["Expected Return", "Expected Volatility", "Sharpe Ratio"]);
  table.add_row(row![
    format!("{:.3}%", point.expected_return() * 100.0),
    format!("{:.3}%", point.volatility() * 100.0),
    format!("{:.4}", point.sharpe_ratio())
  ]);
  table
}

impl FrontierRun {
  /// Weights table followed by the details table.
  pub fn render_report(&self) -> String {
    format!(
      "{}\n{}",
      weights_table(self.moments.assets(), self.optimum.weights()),
      details_table(self.optimal())
    )
  }
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::*;
  use crate::quant::portfolio::statistics::evaluate;
  use crate::quant::portfolio::types::ReturnMoments;

  fn point() -> PortfolioPoint {
    let m = ReturnMoments::new(
      vec!["AAPL".into(), "WMT".into()],
      array![0.2, 0.1],
      array![[0.04, 0.0], [0.0, 0.01]],
      252,
    )
    .unwrap();
    evaluate(&WeightVector::new(array![0.25, 0.75]).unwrap(), &m).unwrap()
  }

  #[test]
  fn weights_are_rendered_in_percent() {
    let p = point();
    let text = weights_table(&["AAPL".into(), "WMT".into()], p.weights()).to_string();
    assert!(text.contains("Stock Name"));
    assert!(text.contains("AAPL"));
    assert!(text.contains("25.000%"));
    assert!(text.contains("75.000%"));
  }

  #[test]
  fn details_show_return_volatility_and_sharpe() {
    let p = point();
    let text = details_table(&p).to_string();
    // 0.25 * 0.2 + 0.75 * 0.1 = 0.125
    assert!(text.contains("12.500%"));
    assert!(text.contains("Sharpe Ratio"));
    assert!(text.contains(&format!("{:.4}", p.sharpe_ratio())));
  }
}
