//! # Yahoo Finance
//!
//! Daily adjusted close prices downloaded through `yahoo_finance_api`, aligned
//! on the dates every requested ticker traded. Adjusted closes fold splits and
//! dividends into the series, so log returns stay free of corporate-action jumps.
use std::collections::BTreeMap;

use chrono::Datelike;
use chrono::NaiveDate;
use ndarray::Array2;
use time::Month;
use time::OffsetDateTime;
use tracing::debug;
use yahoo_finance_api as yahoo;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::quant::portfolio::provider::HistoryRequest;
use crate::quant::portfolio::provider::PriceHistoryProvider;
use crate::quant::portfolio::types::PriceHistory;

/// Blocking provider backed by a private single-threaded tokio runtime.
pub struct YahooProvider {
  connector: yahoo::YahooConnector,
  runtime: tokio::runtime::Runtime,
}

impl YahooProvider {
  pub fn new() -> Result<Self> {
    let connector = yahoo::YahooConnector::new()
      .map_err(|e| PortfolioError::unavailable(format!("yahoo connector: {e}")))?;
    let runtime = tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .map_err(|e| PortfolioError::unavailable(format!("tokio runtime: {e}")))?;
    Ok(Self { connector, runtime })
  }

  /// Adjusted close per trading day.
  fn closes(
    &self,
    ticker: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
  ) -> Result<BTreeMap<NaiveDate, f64>> {
    let response = self
      .runtime
      .block_on(self.connector.get_quote_history(ticker, start, end))
      .map_err(|e| PortfolioError::unavailable(format!("{ticker}: {e}")))?;
    let quotes = response
      .quotes()
      .map_err(|e| PortfolioError::unavailable(format!("{ticker}: {e}")))?;
    debug!(ticker, quotes = quotes.len(), "downloaded quotes");

    daily_series(
      ticker,
      quotes.iter().map(|q| (q.timestamp as i64, q.adjclose)),
    )
  }
}

/// Key `(unix timestamp, price)` pairs by their UTC calendar day.
fn daily_series(
  ticker: &str,
  points: impl IntoIterator<Item = (i64, f64)>,
) -> Result<BTreeMap<NaiveDate, f64>> {
  points
    .into_iter()
    .map(|(timestamp, price)| {
      let date = OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| PortfolioError::unavailable(format!("{ticker}: {e}")))?
        .date();
      Ok((from_time_date(date)?, price))
    })
    .collect()
}

fn to_offset(date: NaiveDate) -> Result<OffsetDateTime> {
  let month = Month::try_from(date.month() as u8).map_err(|e| PortfolioError::invalid(e.to_string()))?;
  let day = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
    .map_err(|e| PortfolioError::invalid(e.to_string()))?;
  Ok(day.midnight().assume_utc())
}

fn from_time_date(date: time::Date) -> Result<NaiveDate> {
  NaiveDate::from_ymd_opt(date.year(), u8::from(date.month()) as u32, date.day() as u32)
    .ok_or_else(|| PortfolioError::unavailable(format!("unrepresentable date {date}")))
}

impl PriceHistoryProvider for YahooProvider {
  fn fetch(&self, request: &HistoryRequest) -> Result<PriceHistory> {
    let start = to_offset(request.start)?;
    // The end date is inclusive.
    let end = to_offset(request.end)? + time::Duration::DAY;

    let series = request
      .assets
      .iter()
      .map(|ticker| self.closes(ticker, start, end))
      .collect::<Result<Vec<_>>>()?;

    let Some((first, rest)) = series.split_first() else {
      return Err(PortfolioError::invalid("no tickers requested"));
    };
    let dates: Vec<NaiveDate> = first
      .keys()
      .filter(|d| **d >= request.start && **d <= request.end)
      .filter(|d| rest.iter().all(|s| s.contains_key(d)))
      .copied()
      .collect();
    if dates.is_empty() {
      return Err(PortfolioError::unavailable(format!(
        "no common trading days between {} and {}",
        request.start, request.end
      )));
    }

    let prices = Array2::from_shape_fn((dates.len(), series.len()), |(t, i)| {
      series[i].get(&dates[t]).copied().unwrap_or(f64::NAN)
    });
    PriceHistory::new(request.assets.clone(), prices)?.with_dates(dates)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_map_to_trading_days() {
    // 2020-01-02 14:30 UTC and 2020-01-03 14:30 UTC
    let series = daily_series("AAPL", [(1_577_975_400, 73.4), (1_578_061_800, 72.7)]).unwrap();
    let days: Vec<_> = series.into_iter().collect();
    assert_eq!(
      days,
      [
        (NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(), 73.4),
        (NaiveDate::from_ymd_opt(2020, 1, 3).unwrap(), 72.7),
      ]
    );
    assert!(daily_series("AAPL", [(i64::MAX, 1.0)]).is_err());
  }

  #[test]
  fn inclusive_window_round_trips_dates() {
    let day = NaiveDate::from_ymd_opt(2016, 12, 30).unwrap();
    let offset = to_offset(day).unwrap();
    assert_eq!(from_time_date(offset.date()).unwrap(), day);
  }
}
