//! # Price-History Providers
//!
//! $$
//! (\text{assets},\ [t_0, t_1])\ \mapsto\ P\in\mathbb R_{>0}^{T\times N}
//! $$
//!
//! Sources of aligned close-price matrices. Providers report missing data as
//! [`PortfolioError::DataUnavailable`] and never fabricate prices.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use chrono::NaiveDate;
use csv::StringRecord;
use ndarray::Array2;
use ndarray::Axis;

use super::types::PriceHistory;
use crate::error::PortfolioError;
use crate::error::Result;

/// Assets and inclusive date range to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryRequest {
  pub assets: Vec<String>,
  pub start: NaiveDate,
  pub end: NaiveDate,
}

/// Anything that can supply a [`PriceHistory`] for a [`HistoryRequest`].
pub trait PriceHistoryProvider {
  fn fetch(&self, request: &HistoryRequest) -> Result<PriceHistory>;
}

/// Serves requests from a dated history already held in memory.
#[derive(Clone, Debug)]
pub struct InMemoryProvider {
  history: PriceHistory,
}

impl InMemoryProvider {
  pub fn new(history: PriceHistory) -> Result<Self> {
    if history.dates().is_none() {
      return Err(PortfolioError::invalid(
        "in-memory provider needs a dated price history",
      ));
    }
    Ok(Self { history })
  }

  pub fn history(&self) -> &PriceHistory {
    &self.history
  }
}

impl PriceHistoryProvider for InMemoryProvider {
  fn fetch(&self, request: &HistoryRequest) -> Result<PriceHistory> {
    if request.start > request.end {
      return Err(PortfolioError::invalid(format!(
        "start date {} is after end date {}",
        request.start, request.end
      )));
    }

    let columns = request
      .assets
      .iter()
      .map(|asset| {
        self
          .history
          .assets()
          .iter()
          .position(|a| a == asset)
          .ok_or_else(|| PortfolioError::unavailable(format!("unknown asset '{asset}'")))
      })
      .collect::<Result<Vec<_>>>()?;

    let all_dates = self.history.dates().unwrap_or_default();
    let rows: Vec<usize> = all_dates
      .iter()
      .enumerate()
      .filter(|(_, d)| **d >= request.start && **d <= request.end)
      .map(|(i, _)| i)
      .collect();

    if rows.is_empty() {
      return Err(PortfolioError::unavailable(format!(
        "no trading data between {} and {}",
        request.start, request.end
      )));
    }

    let prices = self
      .history
      .prices()
      .select(Axis(1), &columns)
      .select(Axis(0), &rows);
    let dates = rows.iter().map(|&i| all_dates[i]).collect();

    PriceHistory::new(request.assets.clone(), prices)?.with_dates(dates)
  }
}

/// Parse a wide CSV (`date,ASSET1,ASSET2,...` with ISO dates) into a dated
/// history. Rows with an empty cell are dropped so every remaining row is
/// aligned; rows are sorted by date.
pub fn parse_price_csv<R: Read>(reader: R) -> Result<PriceHistory> {
  let mut rdr = csv::ReaderBuilder::new()
    .has_headers(true)
    .trim(csv::Trim::All)
    .from_reader(reader);
  let headers = rdr
    .headers()
    .map_err(|e| PortfolioError::unavailable(format!("cannot read header: {e}")))?
    .clone();

  let assets: Vec<String> = headers.iter().skip(1).map(ToString::to_string).collect();
  if assets.is_empty() {
    return Err(PortfolioError::unavailable(
      "price file header has no asset columns",
    ));
  }

  let mut rows: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
  for record in rdr.records() {
    let record = record.map_err(|e| PortfolioError::unavailable(e.to_string()))?;
    if let Some((date, values)) = parse_row(&record)? {
      if rows.insert(date, values).is_some() {
        return Err(PortfolioError::unavailable(format!("duplicate date {date}")));
      }
    }
  }

  if rows.is_empty() {
    return Err(PortfolioError::unavailable("price file has no complete rows"));
  }

  let n = assets.len();
  let dates: Vec<NaiveDate> = rows.keys().copied().collect();
  let flat: Vec<f64> = rows.into_values().flatten().collect();
  let prices = Array2::from_shape_vec((dates.len(), n), flat)
    .map_err(|e| PortfolioError::unavailable(e.to_string()))?;

  PriceHistory::new(assets, prices)?.with_dates(dates)
}

/// `None` when the row has an empty price cell.
fn parse_row(record: &StringRecord) -> Result<Option<(NaiveDate, Vec<f64>)>> {
  let line = record.position().map_or(0, |p| p.line());
  let date_cell = record.get(0).unwrap_or_default();
  let date = NaiveDate::parse_from_str(date_cell, "%Y-%m-%d").map_err(|e| {
    PortfolioError::unavailable(format!("line {line}: bad date '{date_cell}': {e}"))
  })?;

  if record.iter().skip(1).any(str::is_empty) {
    return Ok(None);
  }

  let values = record
    .iter()
    .skip(1)
    .map(|c| {
      c.parse::<f64>()
        .map_err(|e| PortfolioError::unavailable(format!("line {line}: bad price '{c}': {e}")))
    })
    .collect::<Result<Vec<_>>>()?;
  Ok(Some((date, values)))
}

/// Reads a wide CSV file on every fetch.
#[derive(Clone, Debug)]
pub struct CsvProvider {
  path: PathBuf,
}

impl CsvProvider {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
    }
  }

  pub fn load(&self) -> Result<PriceHistory> {
    let file = File::open(&self.path).map_err(|e| {
      PortfolioError::unavailable(format!("cannot open {}: {e}", self.path.display()))
    })?;
    parse_price_csv(file)
  }
}

impl PriceHistoryProvider for CsvProvider {
  fn fetch(&self, request: &HistoryRequest) -> Result<PriceHistory> {
    InMemoryProvider::new(self.load()?)?.fetch(request)
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  const CSV: &str = "date,AAPL,WMT,TSLA
2020-01-03,100.0,50.0,20.0
2020-01-02,99.0,49.5,19.0

2020-01-06,101.0,,21.0
2020-01-07,102.0,51.0,22.0
";

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn csv_is_sorted_and_aligned() {
    let h = parse_price_csv(CSV.as_bytes()).unwrap();
    assert_eq!(h.assets(), ["AAPL", "WMT", "TSLA"]);
    assert_eq!(
      h.dates().unwrap(),
      [d(2020, 1, 2), d(2020, 1, 3), d(2020, 1, 7)]
    );
    assert_eq!(h.prices()[[0, 0]], 99.0);
    assert_eq!(h.prices()[[2, 1]], 51.0);
  }

  #[test]
  fn bad_cells_are_data_errors() {
    let err = parse_price_csv("date,A\n2020-01-02,abc\n".as_bytes()).unwrap_err();
    assert!(matches!(err, PortfolioError::DataUnavailable(_)));
    let err = parse_price_csv("date,A\nnot-a-date,1.0\n".as_bytes()).unwrap_err();
    assert!(matches!(err, PortfolioError::DataUnavailable(_)));
    assert!(parse_price_csv("".as_bytes()).is_err());
  }

  #[test]
  fn quoted_fields_and_ragged_rows() {
    let h = parse_price_csv("\"date\",\"AAPL\",\"WMT\"\n\"2020-01-02\",\"1.0\",\"2.0\"\n".as_bytes())
      .unwrap();
    assert_eq!(h.assets(), ["AAPL", "WMT"]);
    assert_eq!(h.dates().unwrap(), [d(2020, 1, 2)]);
    assert_eq!(h.prices()[[0, 1]], 2.0);

    let err = parse_price_csv("date,A,B\n2020-01-02,1.0\n".as_bytes()).unwrap_err();
    assert!(matches!(err, PortfolioError::DataUnavailable(_)));
    let err = parse_price_csv("date,A\n2020-01-02,1.0\n2020-01-02,2.0\n".as_bytes()).unwrap_err();
    assert!(matches!(err, PortfolioError::DataUnavailable(_)));
  }

  #[test]
  fn in_memory_selects_assets_and_range() {
    let provider = InMemoryProvider::new(parse_price_csv(CSV.as_bytes()).unwrap()).unwrap();
    let h = provider
      .fetch(&HistoryRequest {
        assets: vec!["TSLA".into(), "AAPL".into()],
        start: d(2020, 1, 3),
        end: d(2020, 12, 31),
      })
      .unwrap();

    assert_eq!(h.assets(), ["TSLA", "AAPL"]);
    assert_eq!(h.n_periods(), 2);
    assert_eq!(h.prices()[[0, 0]], 20.0);
    assert_eq!(h.prices()[[1, 1]], 102.0);
  }

  #[test]
  fn unknown_asset_or_empty_range_is_unavailable() {
    let provider = InMemoryProvider::new(parse_price_csv(CSV.as_bytes()).unwrap()).unwrap();
    let unknown = provider.fetch(&HistoryRequest {
      assets: vec!["GE".into()],
      start: d(2020, 1, 1),
      end: d(2020, 12, 31),
    });
    assert!(matches!(unknown, Err(PortfolioError::DataUnavailable(_))));

    let empty = provider.fetch(&HistoryRequest {
      assets: vec!["AAPL".into()],
      start: d(2019, 1, 1),
      end: d(2019, 12, 31),
    });
    assert!(matches!(empty, Err(PortfolioError::DataUnavailable(_))));
  }

  #[test]
  fn csv_provider_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CSV.as_bytes()).unwrap();

    let provider = CsvProvider::new(file.path());
    let h = provider
      .fetch(&HistoryRequest {
        assets: vec!["WMT".into()],
        start: d(2020, 1, 1),
        end: d(2020, 1, 31),
      })
      .unwrap();
    assert_eq!(h.n_periods(), 3);

    let missing = CsvProvider::new("/definitely/not/here.csv").load();
    assert!(matches!(missing, Err(PortfolioError::DataUnavailable(_))));
  }
}
