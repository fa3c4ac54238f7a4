//! Incremental tier filters.
//!
//! Pure functions re-run on every keystroke against the loaded tier. They
//! always re-derive the match set from the full tier, so the result depends
//! only on (tier, query) and repeated calls are idempotent. Matches are
//! returned as indices into the tier, in tier order.
//!
//! An empty query field exempts its constraint. A year that is supplied but
//! is not an integer in `[1000, 10000]` rejects the whole call, which lets
//! the caller keep showing the previous results while the user is still typing.

use thiserror::Error;

use crate::models::{Brand, Car, Chassis, YearRange};
use crate::utils::{parse_leading_int, starts_with_ignore_case, strip_whitespace};

pub const MIN_QUERY_YEAR: i64 = 1000;
pub const MAX_QUERY_YEAR: i64 = 10000;

/// kW queries match within +/- this many kilowatts
pub const KW_TOLERANCE: i64 = 5;
/// HP queries match within +/- this many horsepower
pub const HP_TOLERANCE: i64 = 7;

/// Fuel selector value that disables the fuel constraint
pub const FUEL_ANY: &str = "all";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("'{0}' is not a year between 1000 and 10000")]
    InvalidYear(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandQuery {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChassisQuery {
    pub text: String,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarQuery {
    pub engine: String,
    pub year: String,
    pub kw: String,
    pub hp: String,
    pub fuel: String,
}

impl Default for CarQuery {
    fn default() -> Self {
        Self {
            engine: String::new(),
            year: String::new(),
            kw: String::new(),
            hp: String::new(),
            fuel: FUEL_ANY.to_string(),
        }
    }
}

/// Validate the year field. Empty means "no constraint".
pub fn parse_query_year(input: &str) -> Result<Option<i64>, FilterError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<i64>() {
        Ok(year) if (MIN_QUERY_YEAR..=MAX_QUERY_YEAR).contains(&year) => Ok(Some(year)),
        _ => Err(FilterError::InvalidYear(input.to_string())),
    }
}

fn matching_indices<T>(tier: &[T], pred: impl Fn(&T) -> bool) -> Vec<usize> {
    tier.iter()
        .enumerate()
        .filter(|(_, record)| pred(record))
        .map(|(i, _)| i)
        .collect()
}

/// Numeric match within a tolerance. A record value without a leading
/// integer fails any supplied constraint.
fn within_tolerance(value: &str, query: Option<i64>, tolerance: i64) -> bool {
    match query {
        None => true,
        Some(q) => parse_leading_int(value)
            .and_then(|v| v.checked_sub(q))
            .and_then(i64::checked_abs)
            .is_some_and(|distance| distance <= tolerance),
    }
}

fn year_matches(descriptor: &str, year: Option<i64>) -> bool {
    year.is_none() || YearRange::parse(descriptor).matches(year)
}

/// Case-insensitive prefix match on the brand name.
pub fn filter_brands(tier: &[Brand], query: &BrandQuery) -> Vec<usize> {
    matching_indices(tier, |brand| starts_with_ignore_case(&brand.name, &query.text))
}

pub fn filter_chassis(tier: &[Chassis], query: &ChassisQuery) -> Result<Vec<usize>, FilterError> {
    let year = parse_query_year(&query.year)?;
    let token = strip_whitespace(&query.text);

    Ok(matching_indices(tier, |chassis| {
        starts_with_ignore_case(&strip_whitespace(&chassis.name), &token)
            && year_matches(&chassis.year, year)
    }))
}

pub fn filter_cars(tier: &[Car], query: &CarQuery) -> Result<Vec<usize>, FilterError> {
    let year = parse_query_year(&query.year)?;
    let token = strip_whitespace(&query.engine);
    let kw = parse_leading_int(&query.kw);
    let hp = parse_leading_int(&query.hp);
    let fuel = query.fuel.trim();
    let any_fuel = fuel.is_empty() || fuel == FUEL_ANY;

    Ok(matching_indices(tier, |car| {
        car.engine_codes().any(|code| starts_with_ignore_case(&code, &token))
            && within_tolerance(&car.kw, kw, KW_TOLERANCE)
            && within_tolerance(&car.hp, hp, HP_TOLERANCE)
            && (any_fuel || car.fuel == fuel)
            && year_matches(&car.year, year)
    }))
}
