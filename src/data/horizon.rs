//! # Horizon
//!
//! $$
//! [t_{\text{start}}, t_{\text{anchor}}],\quad t_{\text{anchor}} = \max_i t_i
//! $$
//!
//! Lookback window grammar: `{N}m`, `{N}d`, `1y|2y|3y|5y`, `YTD`, `max`,
//! `YYYY-MM-DD:YYYY-MM-DD`.

use std::fmt::Display;
use std::str::FromStr;

use chrono::Datelike;
use chrono::Days;
use chrono::Months;
use chrono::NaiveDate;

use crate::error::AnalyticsError;
use crate::error::AnalyticsResult;

/// Requested lookback window applied before analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Horizon {
  /// Last `N` calendar months before the anchor.
  Months(u32),
  /// Last `N` calendar days before the anchor.
  Days(u32),
  /// Last `N` years; only 1, 2, 3 and 5 are accepted by the parser.
  Years(u32),
  /// From January 1st of the anchor's year.
  #[default]
  YearToDate,
  /// Full history.
  Max,
  /// Absolute inclusive range.
  Range(NaiveDate, NaiveDate),
}

impl Horizon {
  /// Horizons offered to end users, in display order.
  pub const OPTIONS: [&'static str; 9] = ["1m", "3m", "6m", "YTD", "1y", "2y", "3y", "5y", "max"];

  /// Inclusive `[start, end]` window for a given anchor, `None` for [`Horizon::Max`].
  pub fn window(&self, anchor: NaiveDate) -> AnalyticsResult<Option<(NaiveDate, NaiveDate)>> {
    let start = match *self {
      Horizon::Max => return Ok(None),
      Horizon::Range(start, end) => return Ok(Some((start, end))),
      Horizon::Months(n) => anchor.checked_sub_months(Months::new(n)),
      Horizon::Years(n) => n
        .checked_mul(12)
        .and_then(|m| anchor.checked_sub_months(Months::new(m))),
      Horizon::Days(n) => anchor.checked_sub_days(Days::new(u64::from(n))),
      Horizon::YearToDate => NaiveDate::from_ymd_opt(anchor.year(), 1, 1),
    };

    start
      .map(|s| Some((s, anchor)))
      .ok_or_else(|| AnalyticsError::input(format!("horizon {self} underflows from {anchor}")))
  }
}

fn parse_count(digits: &str, token: &str) -> AnalyticsResult<u32> {
  match digits.parse::<u32>() {
    Ok(n) if n > 0 && digits.bytes().all(|b| b.is_ascii_digit()) => Ok(n),
    _ => Err(AnalyticsError::input(format!("unrecognized horizon '{token}'"))),
  }
}

fn parse_date(s: &str, token: &str) -> AnalyticsResult<NaiveDate> {
  NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
    .map_err(|e| AnalyticsError::input(format!("invalid date '{s}' in horizon '{token}': {e}")))
}

impl FromStr for Horizon {
  type Err = AnalyticsError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let token = s.trim();

    if let Some((start, end)) = token.split_once(':') {
      let start = parse_date(start, token)?;
      let end = parse_date(end, token)?;
      if start > end {
        return Err(AnalyticsError::input(format!(
          "horizon '{token}' starts after it ends"
        )));
      }
      return Ok(Horizon::Range(start, end));
    }

    if token.eq_ignore_ascii_case("max") {
      return Ok(Horizon::Max);
    }
    if token.eq_ignore_ascii_case("ytd") {
      return Ok(Horizon::YearToDate);
    }

    match token {
      "1y" => return Ok(Horizon::Years(1)),
      "2y" => return Ok(Horizon::Years(2)),
      "3y" => return Ok(Horizon::Years(3)),
      "5y" => return Ok(Horizon::Years(5)),
      _ => {}
    }

    if let Some(digits) = token.strip_suffix('m') {
      return parse_count(digits, token).map(Horizon::Months);
    }
    if let Some(digits) = token.strip_suffix('d') {
      return parse_count(digits, token).map(Horizon::Days);
    }

    Err(AnalyticsError::input(format!("unrecognized horizon '{token}'")))
  }
}

impl Display for Horizon {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Horizon::Months(n) => write!(f, "{n}m"),
      Horizon::Days(n) => write!(f, "{n}d"),
      Horizon::Years(n) => write!(f, "{n}y"),
      Horizon::YearToDate => write!(f, "YTD"),
      Horizon::Max => write!(f, "max"),
      Horizon::Range(start, end) => write!(f, "{start}:{end}"),
    }
  }
}
