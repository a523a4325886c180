//! Query-parameter parsing and SQL predicate building for list endpoints.
//!
//! Handlers collect the raw query string as key/value pairs ([`QueryParams`]),
//! turn them into a typed filter, then let the filter append its `WHERE`
//! clause to a `sqlx::QueryBuilder`. Ownership scoping is always pushed
//! first, so no combination of parameters can widen the result set beyond
//! the caller's plants. All values are bound, never interpolated.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

use crate::error::{ApiError, ApiResult};
use crate::models::SensorData;

// ---

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

/// Raw query string as ordered key/value pairs; keys may repeat.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(pub Vec<(String, String)>);

impl QueryParams {
    /// First non-blank value under any of `keys` (aliases, in priority order).
    pub fn first(&self, keys: &[&str]) -> Option<&str> {
        // ---
        keys.iter().find_map(|key| {
            self.0
                .iter()
                .find(|(k, v)| k == key && !v.trim().is_empty())
                .map(|(_, v)| v.trim())
        })
    }

    /// Every value under `key`, in order.
    pub fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Integer id under any of `keys`; a non-integer value is a validation
    /// error on the first key.
    pub fn id(&self, keys: &[&str]) -> ApiResult<Option<i64>> {
        // ---
        match self.first(keys) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|_| ApiError::field(keys[0], "A valid integer is required.")),
        }
    }
}

/// Interpret a naive local time in `tz`. Times skipped by a DST jump move
/// forward by an hour.
fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    // ---
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an ISO-8601 datetime that carries its own offset.
fn parse_with_offset(raw: &str) -> Option<DateTime<FixedOffset>> {
    // ---
    DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
        OFFSET_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    })
}

/// Parse an ISO-8601 datetime. Values without an offset are read in `tz`.
pub fn parse_datetime(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    // ---
    let raw = raw.trim();
    if let Some(dt) = parse_with_offset(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| localize(naive, tz))
}

/// Parse a filter bound: an ISO datetime, else a bare `YYYY-MM-DD` taken as
/// local midnight. Anything else is treated as absent.
pub fn parse_bound(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    // ---
    parse_datetime(raw, tz).or_else(|| {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .ok()
            .and_then(|date| localize(date.and_time(NaiveTime::MIN), tz))
    })
}

/// Parse an end bound and push it to 23:59:59.999999 of its calendar day.
///
/// The day is taken in the value's own offset when it has one, else in `tz`.
pub fn parse_end_bound(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    // ---
    match parse_with_offset(raw.trim()) {
        Some(dt) => {
            let last = dt.date_naive().and_hms_micro_opt(23, 59, 59, 999_999)?;
            dt.offset()
                .from_local_datetime(&last)
                .single()
                .map(|end| end.with_timezone(&Utc))
        }
        None => parse_bound(raw, tz).and_then(|end| end_of_day(end, tz)),
    }
}

/// Last representable instant (23:59:59.999999) of the local calendar day
/// containing `instant`.
fn end_of_day(instant: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    // ---
    let day = instant.with_timezone(&tz).date_naive();
    let last = day.and_hms_micro_opt(23, 59, 59, 999_999)?;
    tz.from_local_datetime(&last)
        .latest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Relative window selected by `date_filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    Today,
    Week,
    Month,
}

impl FromStr for DateWindow {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(DateWindow::Today),
            "week" => Ok(DateWindow::Week),
            "month" => Ok(DateWindow::Month),
            _ => Err(()),
        }
    }
}

impl DateWindow {
    /// Start of the window ending at `now`.
    pub fn start(self, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        // ---
        match self {
            DateWindow::Today => {
                let midnight = now.with_timezone(&tz).date_naive().and_time(NaiveTime::MIN);
                localize(midnight, tz).unwrap_or(now)
            }
            DateWindow::Week => now - Duration::days(7),
            DateWindow::Month => now - Duration::days(30),
        }
    }
}

/// Inclusive timestamp bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Resolve `start`/`start_date`, `end`/`end_date` and `date_filter`.
    ///
    /// An explicit end always covers its whole calendar day. The relative
    /// window only applies when no explicit start was parsed.
    pub fn from_params(params: &QueryParams, now: DateTime<Utc>, tz: Tz) -> Self {
        // ---
        let explicit_start = params
            .first(&["start", "start_date"])
            .and_then(|raw| parse_bound(raw, tz));
        let end = params
            .first(&["end", "end_date"])
            .and_then(|raw| parse_end_bound(raw, tz));

        let start = explicit_start.or_else(|| {
            params
                .first(&["date_filter"])
                .and_then(|raw| raw.parse::<DateWindow>().ok())
                .map(|window| window.start(now, tz))
        });

        DateRange { start, end }
    }

    #[cfg(test)]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| ts >= start) && self.end.map_or(true, |end| ts <= end)
    }

    /// Append `AND column >= start AND column <= end` for the bounds present.
    pub fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>, column: &str) {
        // ---
        if let Some(start) = self.start {
            qb.push(format_args!(" AND {} >= ", column)).push_bind(start);
        }
        if let Some(end) = self.end {
            qb.push(format_args!(" AND {} <= ", column)).push_bind(end);
        }
    }
}

/// Output-quality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    A,
    B,
    C,
    D,
}

impl Category {
    pub fn column(self) -> &'static str {
        match self {
            Category::A => "category_a",
            Category::B => "category_b",
            Category::C => "category_c",
            Category::D => "category_d",
        }
    }

    fn parse(letter: &str) -> Option<Self> {
        match letter.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Category::A),
            "B" => Some(Category::B),
            "C" => Some(Category::C),
            "D" => Some(Category::D),
            _ => None,
        }
    }

    #[cfg(test)]
    fn count(self, row: &SensorData) -> i32 {
        match self {
            Category::A => row.category_a,
            Category::B => row.category_b,
            Category::C => row.category_c,
            Category::D => row.category_d,
        }
    }
}

/// Collect requested categories from repeated and comma-separated
/// `category` values. Unknown letters are ignored; duplicates collapse.
pub fn parse_categories(params: &QueryParams) -> Vec<Category> {
    // ---
    let mut categories: Vec<Category> = params
        .all("category")
        .flat_map(|value| value.split(','))
        .filter_map(Category::parse)
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

/// Filter over `sensor_data sd JOIN sensors s JOIN plants p`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorDataFilter {
    pub sensor_id: Option<i64>,
    pub plant_id: Option<i64>,
    pub item_id: Option<i64>,
    pub range: DateRange,
    pub categories: Vec<Category>,
}

impl SensorDataFilter {
    pub fn from_params(params: &QueryParams, now: DateTime<Utc>, tz: Tz) -> ApiResult<Self> {
        // ---
        Ok(SensorDataFilter {
            sensor_id: params.id(&["sensor", "sensor_id"])?,
            plant_id: params.id(&["plant", "plant_id"])?,
            item_id: params.id(&["item", "item_id"])?,
            range: DateRange::from_params(params, now, tz),
            categories: parse_categories(params),
        })
    }

    /// Append the `WHERE` clause, ownership first.
    ///
    /// Multiple categories are ANDed: a row must have a non-zero count in
    /// every requested category.
    pub fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>, user_id: i64) {
        // ---
        qb.push(" WHERE p.user_id = ").push_bind(user_id);

        match (self.sensor_id, self.plant_id) {
            (Some(sensor_id), plant_id) => {
                qb.push(" AND sd.sensor_id = ").push_bind(sensor_id);
                if let Some(plant_id) = plant_id {
                    qb.push(" AND s.plant_id = ").push_bind(plant_id);
                }
            }
            (None, Some(plant_id)) => {
                qb.push(" AND s.plant_id = ").push_bind(plant_id);
            }
            (None, None) => {}
        }

        if let Some(item_id) = self.item_id {
            qb.push(" AND sd.item_id = ").push_bind(item_id);
        }

        self.range.push_predicates(qb, "sd.timestamp");

        for category in &self.categories {
            qb.push(format_args!(" AND sd.{} > 0", category.column()));
        }
    }

    /// In-memory equivalent of the non-ownership predicates.
    #[cfg(test)]
    pub fn matches(&self, row: &SensorData) -> bool {
        // ---
        self.sensor_id.map_or(true, |id| row.sensor_id == id)
            && self.item_id.map_or(true, |id| row.item_id == Some(id))
            && self.range.contains(row.timestamp)
            && self.categories.iter().all(|c| c.count(row) > 0)
    }
}

/// Filter over `energy_consumption e JOIN plants p`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyFilter {
    pub sensor_id: Option<i64>,
    pub plant_id: Option<i64>,
    pub range: DateRange,
}

impl EnergyFilter {
    pub fn from_params(params: &QueryParams, now: DateTime<Utc>, tz: Tz) -> ApiResult<Self> {
        // ---
        Ok(EnergyFilter {
            sensor_id: params.id(&["sensor", "sensor_id"])?,
            plant_id: params.id(&["plant", "plant_id"])?,
            range: DateRange::from_params(params, now, tz),
        })
    }

    pub fn push_predicates(&self, qb: &mut QueryBuilder<'_, Postgres>, user_id: i64) {
        // ---
        qb.push(" WHERE p.user_id = ").push_bind(user_id);
        if let Some(sensor_id) = self.sensor_id {
            qb.push(" AND e.sensor_id = ").push_bind(sensor_id);
        }
        if let Some(plant_id) = self.plant_id {
            qb.push(" AND e.plant_id = ").push_bind(plant_id);
        }
        self.range.push_predicates(qb, "e.timestamp");
    }
}

/// Requested page, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// `page` defaults to 1 and must be a positive integer. `page_size`
    /// defaults to 20 when absent, non-numeric or zero, and is capped at 100.
    pub fn from_params(params: &QueryParams) -> ApiResult<Self> {
        // ---
        let page = match params.first(&["page"]) {
            None => 1,
            Some(raw) => match raw.parse::<i64>() {
                Ok(page) if page >= 1 => page,
                _ => return Err(ApiError::InvalidPage),
            },
        };
        let page_size = params
            .first(&["page_size"])
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|&size| size > 0)
            .map_or(DEFAULT_PAGE_SIZE, |size| size.min(MAX_PAGE_SIZE));

        Ok(PageRequest { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    pub fn last_page(&self, count: i64) -> i64 {
        ((count + self.page_size - 1) / self.page_size).max(1)
    }

    /// Pages past the last one do not exist; page 1 always does.
    pub fn check(&self, count: i64) -> ApiResult<()> {
        if self.page > self.last_page(count) {
            return Err(ApiError::InvalidPage);
        }
        Ok(())
    }
}

/// Paginated list body.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: PageRequest, count: i64, results: Vec<T>) -> Self {
        // ---
        let last = request.last_page(count);
        Page {
            count,
            next: (request.page < last).then_some(request.page + 1),
            previous: (request.page > 1).then_some(request.page - 1),
            results,
        }
    }
}

/// Field subset returned by `GET /sensor-data/metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Production,
    Weight,
    Quality,
}

impl Metric {
    pub fn from_params(params: &QueryParams) -> ApiResult<Self> {
        // ---
        match params.first(&["metric"]) {
            None => Err(ApiError::field("metric", "This field is required.")),
            Some("production") => Ok(Metric::Production),
            Some("weight") => Ok(Metric::Weight),
            Some("quality") => Ok(Metric::Quality),
            Some(other) => Err(ApiError::field(
                "metric",
                format!(
                    "Invalid metric \"{}\". Use one of: production, weight, quality.",
                    other
                ),
            )),
        }
    }

    pub fn project(self, row: &SensorData) -> MetricPoint {
        // ---
        match self {
            Metric::Production => MetricPoint::Production {
                timestamp: row.timestamp,
                items_scanned: row.items_scanned,
                items_processed: row.items_processed,
                items_discarded: row.items_discarded,
                processed_with_errors: row.processed_with_errors,
            },
            Metric::Weight => MetricPoint::Weight {
                timestamp: row.timestamp,
                current_weight_kg: row.current_weight_kg.clone(),
            },
            Metric::Quality => MetricPoint::Quality {
                timestamp: row.timestamp,
                category_a: row.category_a,
                category_b: row.category_b,
                category_c: row.category_c,
                category_d: row.category_d,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetricPoint {
    Production {
        timestamp: DateTime<Utc>,
        items_scanned: i32,
        items_processed: i32,
        items_discarded: i32,
        processed_with_errors: i32,
    },
    Weight {
        timestamp: DateTime<Utc>,
        current_weight_kg: Option<BigDecimal>,
    },
    Quality {
        timestamp: DateTime<Utc>,
        category_a: i32,
        category_b: i32,
        category_c: i32,
        category_d: i32,
    },
}

/// Aggregation returned by `GET /energy-consumption/metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyMetric {
    Daily,
    SensorCost,
}

impl EnergyMetric {
    pub fn from_params(params: &QueryParams) -> ApiResult<Self> {
        // ---
        match params.first(&["metric"]) {
            None => Err(ApiError::field("metric", "This field is required.")),
            Some("daily") => Ok(EnergyMetric::Daily),
            Some("sensor-cost") => Ok(EnergyMetric::SensorCost),
            Some(other) => Err(ApiError::field(
                "metric",
                format!("Invalid metric \"{}\". Use one of: daily, sensor-cost.", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::Timelike;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn reading_at(ts: DateTime<Utc>, categories: [i32; 4]) -> SensorData {
        // ---
        SensorData {
            id: 1,
            sensor_id: 4,
            sensor_name: "Belt scanner".into(),
            plant_name: "North Yard".into(),
            item_id: None,
            item_name: None,
            timestamp: ts,
            items_scanned: 10,
            items_processed: 8,
            items_discarded: 2,
            processed_with_errors: 1,
            current_weight_kg: None,
            category_a: categories[0],
            category_b: categories[1],
            category_c: categories[2],
            category_d: categories[3],
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_parse_bound_accepts_iso_then_date() {
        // ---
        let tz = chrono_tz::UTC;
        assert_eq!(parse_bound("2024-01-01T06:30:00Z", tz), Some(utc(2024, 1, 1, 6, 30)));
        assert_eq!(parse_bound("2024-01-01T06:30:00", tz), Some(utc(2024, 1, 1, 6, 30)));
        assert_eq!(parse_bound("2024-01-01T06:30", tz), Some(utc(2024, 1, 1, 6, 30)));
        assert_eq!(
            parse_bound("2024-01-01T06:30:00+05:30", tz),
            Some(utc(2024, 1, 1, 1, 0))
        );
        assert_eq!(parse_bound("2024-01-01", tz), Some(utc(2024, 1, 1, 0, 0)));
        assert_eq!(parse_bound("yesterday", tz), None);
        assert_eq!(parse_bound("2024-13-01", tz), None);
    }

    #[test]
    fn test_naive_bounds_use_reference_timezone() {
        // ---
        let tz: Tz = "Asia/Kolkata".parse().unwrap();
        assert_eq!(parse_bound("2024-01-01", tz), Some(utc(2023, 12, 31, 18, 30)));
        assert_eq!(
            parse_datetime("2024-01-01T10:00:00", tz),
            Some(utc(2024, 1, 1, 4, 30))
        );
    }

    #[test]
    fn test_date_only_end_includes_whole_day() {
        // ---
        let range = DateRange::from_params(
            &params(&[("end", "2024-01-01")]),
            utc(2024, 6, 1, 0, 0),
            chrono_tz::UTC,
        );

        let end = range.end.unwrap();
        assert_eq!((end.hour(), end.minute(), end.second()), (23, 59, 59));
        assert_eq!(end.nanosecond(), 999_999_000);

        assert!(range.contains(utc(2024, 1, 1, 0, 0)));
        assert!(range.contains(utc(2024, 1, 1, 23, 59)));
        assert!(!range.contains(utc(2024, 1, 2, 0, 0)));
    }

    #[test]
    fn test_end_with_offset_keeps_its_own_day() {
        // ---
        let range = DateRange::from_params(
            &params(&[("end", "2024-01-01T23:30:00-05:00")]),
            utc(2024, 6, 1, 0, 0),
            chrono_tz::UTC,
        );

        // 2024-01-01T23:59:59.999999-05:00
        let end = range.end.unwrap();
        assert_eq!(end, utc(2024, 1, 2, 4, 59) + Duration::microseconds(59_999_999));
        assert!(range.contains(utc(2024, 1, 2, 4, 0)));
        assert!(!range.contains(utc(2024, 1, 2, 12, 0)));
    }

    #[test]
    fn test_naive_end_uses_reference_zone() {
        // ---
        let tz: Tz = "Asia/Kolkata".parse().unwrap();
        let end = parse_end_bound("2024-01-01T10:00:00", tz).unwrap();
        assert_eq!(end, utc(2024, 1, 1, 18, 29) + Duration::microseconds(59_999_999));
    }

    #[test]
    fn test_unparseable_bounds_are_ignored() {
        // ---
        let range = DateRange::from_params(
            &params(&[("start_date", "soon"), ("end_date", "later")]),
            utc(2024, 6, 1, 0, 0),
            chrono_tz::UTC,
        );
        assert_eq!(range, DateRange::default());
    }

    #[test]
    fn test_today_window_starts_at_local_midnight() {
        // ---
        let now = utc(2024, 3, 10, 15, 30);
        let range =
            DateRange::from_params(&params(&[("date_filter", "today")]), now, chrono_tz::UTC);
        assert_eq!(range.start, Some(utc(2024, 3, 10, 0, 0)));
        assert_eq!(range.end, None);
        assert!(!range.contains(utc(2024, 3, 9, 23, 59)));
        assert!(range.contains(utc(2024, 3, 10, 0, 0)));

        // 20:00 UTC is already 01:30 on the 11th in Kolkata.
        let tz: Tz = "Asia/Kolkata".parse().unwrap();
        let now = utc(2024, 3, 10, 20, 0);
        assert_eq!(DateWindow::Today.start(now, tz), utc(2024, 3, 10, 18, 30));
    }

    #[test]
    fn test_week_and_month_windows() {
        // ---
        let now = utc(2024, 3, 31, 12, 0);
        assert_eq!(DateWindow::Week.start(now, chrono_tz::UTC), utc(2024, 3, 24, 12, 0));
        assert_eq!(DateWindow::Month.start(now, chrono_tz::UTC), utc(2024, 3, 1, 12, 0));
        assert!("fortnight".parse::<DateWindow>().is_err());
    }

    #[test]
    fn test_explicit_start_wins_over_window() {
        // ---
        let range = DateRange::from_params(
            &params(&[("start", "2024-01-05"), ("date_filter", "week")]),
            utc(2024, 3, 31, 12, 0),
            chrono_tz::UTC,
        );
        assert_eq!(range.start, Some(utc(2024, 1, 5, 0, 0)));
    }

    #[test]
    fn test_categories_accept_repeats_and_commas() {
        // ---
        let cats = parse_categories(&params(&[
            ("category", "b"),
            ("category", "A,C"),
            ("category", "Z"),
            ("category", "A"),
        ]));
        assert_eq!(cats, vec![Category::A, Category::B, Category::C]);
    }

    #[test]
    fn test_multiple_categories_require_all() {
        // ---
        let filter = SensorDataFilter::from_params(
            &params(&[("category", "A"), ("category", "B")]),
            utc(2024, 1, 10, 0, 0),
            chrono_tz::UTC,
        )
        .unwrap();

        let ts = utc(2024, 1, 1, 0, 0);
        assert!(filter.matches(&reading_at(ts, [1, 1, 0, 0])));
        assert!(!filter.matches(&reading_at(ts, [1, 0, 0, 0])));
        assert!(!filter.matches(&reading_at(ts, [0, 3, 0, 0])));

        let mut qb = QueryBuilder::<Postgres>::new("SELECT sd.id FROM sensor_data sd");
        filter.push_predicates(&mut qb, 7);
        assert!(qb
            .sql()
            .ends_with(" AND sd.category_a > 0 AND sd.category_b > 0"));
    }

    #[test]
    fn test_ownership_predicate_comes_first() {
        // ---
        let filter = SensorDataFilter::from_params(
            &params(&[("sensor_id", "4"), ("plant", "2"), ("item", "9"), ("end", "2024-01-01")]),
            utc(2024, 1, 10, 0, 0),
            chrono_tz::UTC,
        )
        .unwrap();

        let mut qb = QueryBuilder::<Postgres>::new("SELECT sd.id FROM sensor_data sd");
        filter.push_predicates(&mut qb, 7);
        assert_eq!(
            qb.sql(),
            "SELECT sd.id FROM sensor_data sd WHERE p.user_id = $1 AND sd.sensor_id = $2 \
             AND s.plant_id = $3 AND sd.item_id = $4 AND sd.timestamp <= $5"
        );
    }

    #[test]
    fn test_plant_without_sensor_filters_by_sensor_plant() {
        // ---
        let filter = SensorDataFilter::from_params(
            &params(&[("plant_id", "2")]),
            utc(2024, 1, 10, 0, 0),
            chrono_tz::UTC,
        )
        .unwrap();
        assert_eq!(filter.plant_id, Some(2));

        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        filter.push_predicates(&mut qb, 7);
        assert_eq!(qb.sql(), "SELECT 1 WHERE p.user_id = $1 AND s.plant_id = $2");
    }

    #[test]
    fn test_non_integer_id_is_field_error() {
        // ---
        let err = SensorDataFilter::from_params(
            &params(&[("sensor_id", "four")]),
            utc(2024, 1, 10, 0, 0),
            chrono_tz::UTC,
        )
        .unwrap_err();

        match err {
            ApiError::Validation(errors) => assert!(errors.contains_key("sensor")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_energy_filter_scopes_by_owner() {
        // ---
        let filter = EnergyFilter::from_params(
            &params(&[("sensor", "3"), ("start", "2024-02-01")]),
            utc(2024, 3, 1, 0, 0),
            chrono_tz::UTC,
        )
        .unwrap();

        let mut qb = QueryBuilder::<Postgres>::new("SELECT e.id FROM energy_consumption e");
        filter.push_predicates(&mut qb, 11);
        assert_eq!(
            qb.sql(),
            "SELECT e.id FROM energy_consumption e WHERE p.user_id = $1 \
             AND e.sensor_id = $2 AND e.timestamp >= $3"
        );
    }

    #[test]
    fn test_page_size_is_capped() {
        // ---
        let req = PageRequest::from_params(&params(&[("page_size", "500")])).unwrap();
        assert_eq!(req, PageRequest { page: 1, page_size: 100 });

        for raw in ["0", "-5", "lots"] {
            let req = PageRequest::from_params(&params(&[("page_size", raw)])).unwrap();
            assert_eq!(req.page_size, DEFAULT_PAGE_SIZE);
        }

        let req = PageRequest::from_params(&params(&[("page", "3"), ("page_size", "10")])).unwrap();
        assert_eq!(req.offset(), 20);
    }

    #[test]
    fn test_invalid_pages_are_not_found() {
        // ---
        assert!(PageRequest::from_params(&params(&[("page", "0")])).is_err());
        assert!(PageRequest::from_params(&params(&[("page", "two")])).is_err());

        let req = PageRequest::from_params(&params(&[("page", "3")])).unwrap();
        assert!(req.check(40).is_err());
        assert!(req.check(41).is_ok());

        let first = PageRequest::from_params(&params(&[])).unwrap();
        assert!(first.check(0).is_ok());
    }

    #[test]
    fn test_page_links() {
        // ---
        let req = PageRequest { page: 2, page_size: 20 };
        let page = Page::new(req, 45, vec![0u8; 20]);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));

        let last = Page::new(PageRequest { page: 3, page_size: 20 }, 45, vec![0u8; 5]);
        assert_eq!(last.next, None);

        let empty = Page::<u8>::new(PageRequest { page: 1, page_size: 20 }, 0, vec![]);
        assert_eq!((empty.next, empty.previous), (None, None));
    }

    #[test]
    fn test_quality_metric_projects_categories_only() {
        // ---
        let metric = Metric::from_params(&params(&[("metric", "quality")])).unwrap();
        let point = metric.project(&reading_at(utc(2024, 1, 1, 0, 0), [4, 3, 2, 1]));

        let value = serde_json::to_value(point).unwrap();
        let mut keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["category_a", "category_b", "category_c", "category_d", "timestamp"]
        );
        assert_eq!(value["category_a"], json!(4));
    }

    #[test]
    fn test_production_and_weight_metrics() {
        // ---
        let row = reading_at(utc(2024, 1, 1, 0, 0), [0; 4]);

        let value = serde_json::to_value(Metric::Production.project(&row)).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 5);
        assert_eq!(value["items_scanned"], json!(10));

        let value = serde_json::to_value(Metric::Weight.project(&row)).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 2);
        assert_eq!(value["current_weight_kg"], json!(null));
    }

    #[test]
    fn test_unknown_metric_is_rejected() {
        // ---
        for query in [params(&[("metric", "velocity")]), params(&[])] {
            match Metric::from_params(&query).unwrap_err() {
                ApiError::Validation(errors) => assert!(errors.contains_key("metric")),
                other => panic!("expected validation error, got {:?}", other),
            }
        }

        assert_eq!(
            EnergyMetric::from_params(&params(&[("metric", "sensor-cost")])).unwrap(),
            EnergyMetric::SensorCost
        );
        assert!(EnergyMetric::from_params(&params(&[("metric", "hourly")])).is_err());
    }
}
