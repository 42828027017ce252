//! # Visualization
//!
//! $$
//! \{(\sigma_k,\mu_k)\}_{k=1}^{K}\ \cup\ (\sigma^\*,\mu^\*) \mapsto \text{risk/return scatter}
//! $$
//!
use std::path::Path;

use plotly::common::ColorBar;
use plotly::common::ColorScale;
use plotly::common::ColorScalePalette;
use plotly::common::Marker;
use plotly::common::Mode;
use plotly::layout::Axis;
use plotly::Layout;
use plotly::Plot;
use plotly::Scatter;

use crate::quant::portfolio::PortfolioPoint;

fn hover(point: &PortfolioPoint) -> String {
  format!(
    "return: {:.4}<br>volatility: {:.4}<br>sharpe: {:.4}",
    point.expected_return(),
    point.volatility(),
    point.sharpe_ratio()
  )
}

/// Sampled portfolios in the (volatility, return) plane, coloured by Sharpe
/// ratio, with the optimum as a separate, larger marker.
pub fn frontier_plot(samples: &[PortfolioPoint], optimum: &PortfolioPoint) -> Plot {
  let vols: Vec<f64> = samples.iter().map(PortfolioPoint::volatility).collect();
  let rets: Vec<f64> = samples.iter().map(PortfolioPoint::expected_return).collect();
  let sharpe: Vec<f64> = samples.iter().map(PortfolioPoint::sharpe_ratio).collect();
  let text: Vec<String> = samples.iter().map(hover).collect();

  let cloud = Scatter::new(vols, rets)
    .mode(Mode::Markers)
    .marker(
      Marker::new()
        .size(4)
        .color_array(sharpe)
        .color_scale(ColorScale::Palette(ColorScalePalette::Viridis))
        .show_scale(true)
        .color_bar(ColorBar::new().title("Sharpe Ratio")),
    )
    .name("Portfolios")
    .hover_text_array(text)
    .hover_template("%{hovertext}<extra></extra>");

  let best = Scatter::new(vec![optimum.volatility()], vec![optimum.expected_return()])
    .mode(Mode::Markers)
    .marker(Marker::new().size(16))
    .name("Optimal Point")
    .hover_text_array(vec![hover(optimum)])
    .hover_template("%{hovertext}<extra></extra>");

  let mut plot = Plot::new();
  plot.add_trace(cloud);
  plot.add_trace(best);
  plot.set_layout(
    Layout::new()
      .title("Optimal Portfolio")
      .x_axis(Axis::new().title("Expected Volatility"))
      .y_axis(Axis::new().title("Expected Returns")),
  );
  plot
}

/// Write [`frontier_plot`] as a standalone HTML page.
pub fn write_frontier_html(
  samples: &[PortfolioPoint],
  optimum: &PortfolioPoint,
  path: impl AsRef<Path>,
) -> std::io::Result<()> {
  std::fs::write(path, frontier_plot(samples, optimum).to_html())
}
