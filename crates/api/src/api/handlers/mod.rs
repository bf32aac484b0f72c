// SPDX-FileCopyrightText: 2025 Aaron Dewes <aaron@nirvati.org>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, AppResult};

pub mod game_sides;
pub mod games;
pub mod leagues;
pub mod players;
pub mod seasons;
pub mod standings;
pub mod team_seasons;
pub mod teams;
pub mod users;

pub const DEFAULT_TIMEZONE: &str = "America/New_York";
const DEFAULT_PAGE_SIZE: i64 = 25;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub size: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, size: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let size = match size {
            Some(s) if s > MAX_PAGE_SIZE => MAX_PAGE_SIZE,
            Some(s) if s > 0 => s,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Serialize, Debug)]
pub struct Paged<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

impl<T> Paged<T> {
    pub fn new(data: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            data,
            total,
            page: pagination.page,
            size: pagination.size,
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
/// Use together with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

pub(crate) fn required_text(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trims optional free text; blank becomes `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Returns the canonical IANA spelling of `value`.
pub(crate) fn validate_timezone(value: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("timezone cannot be empty"));
    }
    Tz::from_str_insensitive(trimmed)
        .map(|tz| tz.name().to_string())
        .map_err(|_| AppError::validation(format!("invalid timezone: {trimmed}")))
}

pub(crate) fn parse_date(value: &str, field: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("{field} must be YYYY-MM-DD")))
}

/// Case-insensitive substring pattern for `ILIKE`. `None` when the search is blank.
pub(crate) fn search_pattern(q: Option<&str>) -> Option<String> {
    let q = q?.trim();
    if q.is_empty() {
        return None;
    }
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

pub(crate) fn require_positive_id(value: i64, field: &str) -> AppResult<i64> {
    if value <= 0 {
        return Err(AppError::validation(format!("{field} must be > 0")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        description: Option<Option<String>>,
    }

    #[test]
    fn test_pagination_defaults_and_clamps() {
        assert_eq!(Pagination::new(None, None), Pagination { page: 1, size: 25 });
        assert_eq!(Pagination::new(Some(0), Some(0)), Pagination { page: 1, size: 25 });
        assert_eq!(Pagination::new(Some(-2), Some(-5)), Pagination { page: 1, size: 25 });
        assert_eq!(Pagination::new(Some(3), Some(500)), Pagination { page: 3, size: 100 });
        assert_eq!(Pagination::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_absent_and_null_are_distinct() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.description, None);
        let cleared: Patch = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        let set: Patch = serde_json::from_str(r#"{"description":"x"}"#).unwrap();
        assert_eq!(set.description, Some(Some("x".to_string())));
    }

    #[test]
    fn test_timezone_validation_canonicalises() {
        assert_eq!(validate_timezone("America/New_york").unwrap(), "America/New_York");
        assert_eq!(validate_timezone(" Europe/Berlin ").unwrap(), "Europe/Berlin");
        assert!(validate_timezone("Mars/Olympus_Mons").is_err());
        assert!(validate_timezone("  ").is_err());
    }

    #[test]
    fn test_dates_and_text() {
        assert_eq!(
            parse_date("2025-01-31", "startsOn").unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
        );
        assert!(parse_date("31/01/2025", "startsOn").is_err());
        assert!(required_text("   ", "name").is_err());
        assert_eq!(required_text(" Winter ", "name").unwrap(), "Winter");
        assert_eq!(optional_text(Some("  ".into())), None);
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern(None), None);
        assert_eq!(search_pattern(Some("  ")), None);
        assert_eq!(search_pattern(Some("ace")).as_deref(), Some("%ace%"));
        assert_eq!(search_pattern(Some("50%_")).as_deref(), Some("%50\\%\\_%"));
    }
}
