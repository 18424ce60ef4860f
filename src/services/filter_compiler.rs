//! Turns raw filter input into a [`CompiledFilter`].
//!
//! Only fields that were actually supplied end up in the compiled filter;
//! an absent field means "no constraint". Every rejected field is reported
//! in one [`validator::ValidationErrors`] so the caller can show them all.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dto::candidate_dto::CandidateFiltersInput;
use crate::error::Result;
use crate::models::candidate::Candidate;
use crate::models::stage::Stage;
use crate::utils::time::{end_of_day_utc, start_of_day_utc};
use crate::utils::validation::FieldErrors;

pub const MAX_PER_PAGE: i64 = 100;
pub const DEFAULT_PER_PAGE: i64 = 20;
/// Keeps `(page - 1) * per_page` far inside `i64` and Postgres `OFFSET`.
pub const MAX_PAGE: i64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.per_page.max(0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_to: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl CompiledFilter {
    pub fn is_unconstrained(&self) -> bool {
        self.search.is_none()
            && self.stage.is_none()
            && self.salary_min.is_none()
            && self.salary_max.is_none()
            && self.created_from.is_none()
            && self.created_to.is_none()
    }

    /// Evaluates every supplied predicate against one candidate.
    ///
    /// A candidate without a salary never satisfies a salary bound.
    pub fn matches(&self, candidate: &Candidate) -> bool {
        if let Some(search) = &self.search {
            if !candidate
                .full_name
                .to_lowercase()
                .contains(&search.to_lowercase())
            {
                return false;
            }
        }
        if let Some(stage) = self.stage {
            if candidate.stage != stage {
                return false;
            }
        }
        if let Some(min) = self.salary_min {
            match candidate.salary_expectation {
                Some(salary) if salary >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = self.salary_max {
            match candidate.salary_expectation {
                Some(salary) if salary <= max => {}
                _ => return false,
            }
        }
        if let Some(from) = self.created_from {
            if candidate.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if candidate.created_at > to {
                return false;
            }
        }
        true
    }
}

fn supplied(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_salary(raw: &str, field: &'static str, errors: &mut FieldErrors) -> Option<Decimal> {
    match Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw)) {
        Ok(value) if value.is_sign_negative() && !value.is_zero() => {
            errors.add(field, "non_negative", format!("{} must not be negative", field));
            None
        }
        Ok(value) => Some(value),
        Err(_) => {
            errors.add(field, "number", format!("{} must be a number", field));
            None
        }
    }
}

#[derive(Clone, Copy)]
enum DayEdge {
    Start,
    End,
}

/// Accepts `YYYY-MM-DD` (expanded to the given edge of that UTC day) or a
/// full RFC 3339 timestamp.
fn parse_date_bound(
    raw: &str,
    field: &'static str,
    edge: DayEdge,
    errors: &mut FieldErrors,
) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(match edge {
            DayEdge::Start => start_of_day_utc(date),
            DayEdge::End => end_of_day_utc(date),
        });
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(_) => {
            errors.add(field, "date", format!("{} must be a YYYY-MM-DD date or RFC 3339 timestamp", field));
            None
        }
    }
}

fn parse_page_number(
    raw: &str,
    field: &'static str,
    max: Option<i64>,
    errors: &mut FieldErrors,
) -> Option<i64> {
    match raw.parse::<i64>() {
        Ok(n) if n >= 1 && max.map_or(true, |m| n <= m) => Some(n),
        _ => {
            let bound = max.map_or_else(|| "at least 1".to_string(), |m| format!("between 1 and {}", m));
            errors.add(field, "range", format!("{} must be an integer {}", field, bound));
            None
        }
    }
}

pub fn compile(input: &CandidateFiltersInput) -> Result<CompiledFilter> {
    let mut errors = FieldErrors::new();
    let mut filter = CompiledFilter {
        search: supplied(&input.search).map(str::to_string),
        ..CompiledFilter::default()
    };

    if let Some(raw) = supplied(&input.stage) {
        match raw.parse::<Stage>() {
            Ok(stage) => filter.stage = Some(stage),
            Err(err) => errors.add("stage", "stage", err.to_string()),
        }
    }

    filter.salary_min = supplied(&input.salary_min).and_then(|raw| parse_salary(raw, "salary_min", &mut errors));
    filter.salary_max = supplied(&input.salary_max).and_then(|raw| parse_salary(raw, "salary_max", &mut errors));
    filter.created_from = supplied(&input.created_from)
        .and_then(|raw| parse_date_bound(raw, "created_from", DayEdge::Start, &mut errors));
    filter.created_to = supplied(&input.created_to)
        .and_then(|raw| parse_date_bound(raw, "created_to", DayEdge::End, &mut errors));

    let page = supplied(&input.page).and_then(|raw| parse_page_number(raw, "page", Some(MAX_PAGE), &mut errors));
    let per_page = supplied(&input.per_page)
        .and_then(|raw| parse_page_number(raw, "per_page", Some(MAX_PER_PAGE), &mut errors));
    if page.is_some() || per_page.is_some() {
        filter.pagination = Some(Pagination {
            page: page.unwrap_or(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE),
        });
    }

    errors.into_result()?;
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::utils::time::to_rfc3339;
    use uuid::Uuid;

    fn input() -> CandidateFiltersInput {
        CandidateFiltersInput::default()
    }

    fn failed_fields(err: Error) -> Vec<String> {
        match err {
            Error::Validation(errors) => {
                let mut fields: Vec<String> = errors.field_errors().keys().map(|k| k.to_string()).collect();
                fields.sort();
                fields
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn candidate(name: &str, stage: Stage, salary: Option<i64>, created_at: &str) -> Candidate {
        let ts = DateTime::parse_from_rfc3339(created_at).unwrap().with_timezone(&Utc);
        Candidate {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            full_name: name.into(),
            email: "x@example.com".into(),
            phone: None,
            stage,
            salary_expectation: salary.map(|s| Decimal::new(s, 0)),
            source: None,
            created_by: Uuid::new_v4(),
            created_at: ts,
            updated_at: ts,
            version: 1,
        }
    }

    #[test]
    fn empty_input_compiles_to_no_constraints() {
        let filter = compile(&input()).unwrap();
        assert!(filter.is_unconstrained());
        assert_eq!(filter.pagination, None);
    }

    #[test]
    fn blank_fields_count_as_absent() {
        let mut raw = input();
        raw.search = Some("   ".into());
        raw.stage = Some("".into());
        let filter = compile(&raw).unwrap();
        assert!(filter.is_unconstrained());
    }

    #[test]
    fn date_only_bounds_expand_to_day_edges() {
        let mut raw = input();
        raw.created_from = Some("2024-01-01".into());
        raw.created_to = Some("2024-01-01".into());
        let filter = compile(&raw).unwrap();
        assert_eq!(to_rfc3339(filter.created_from.unwrap()), "2024-01-01T00:00:00.000Z");
        assert_eq!(to_rfc3339(filter.created_to.unwrap()), "2024-01-01T23:59:59.999Z");
    }

    #[test]
    fn timestamps_are_taken_as_is() {
        let mut raw = input();
        raw.created_from = Some("2024-03-10T12:30:00+02:00".into());
        let filter = compile(&raw).unwrap();
        assert_eq!(to_rfc3339(filter.created_from.unwrap()), "2024-03-10T10:30:00.000Z");
    }

    #[test]
    fn every_bad_field_is_named() {
        let mut raw = input();
        raw.stage = Some("archived".into());
        raw.salary_min = Some("-5".into());
        raw.salary_max = Some("lots".into());
        raw.created_to = Some("31/01/2024".into());
        let err = compile(&raw).unwrap_err();
        assert_eq!(failed_fields(err), vec!["created_to", "salary_max", "salary_min", "stage"]);
    }

    #[test]
    fn inverted_salary_range_is_accepted_and_matches_nothing() {
        let mut raw = input();
        raw.salary_min = Some("60000".into());
        raw.salary_max = Some("40000".into());
        let filter = compile(&raw).unwrap();
        let c = candidate("Ana", Stage::Applied, Some(50000), "2024-01-01T00:00:00Z");
        assert!(!filter.matches(&c));
    }

    #[test]
    fn stage_and_salary_scenario() {
        let mut raw = input();
        raw.stage = Some("interview".into());
        raw.salary_min = Some("40000".into());
        let filter = compile(&raw).unwrap();
        let interview = candidate("Carla", Stage::Interview, Some(50000), "2024-01-01T00:00:00Z");
        let applied = candidate("Ana", Stage::Applied, Some(60000), "2024-01-01T00:00:00Z");
        assert!(filter.matches(&interview));
        assert!(!filter.matches(&applied));
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let mut raw = input();
        raw.search = Some("  TORR ".into());
        let filter = compile(&raw).unwrap();
        assert_eq!(filter.search.as_deref(), Some("TORR"));
        assert!(filter.matches(&candidate("Ana Torres", Stage::Applied, None, "2024-01-01T00:00:00Z")));
        assert!(!filter.matches(&candidate("Bruno Diaz", Stage::Applied, None, "2024-01-01T00:00:00Z")));
    }

    #[test]
    fn missing_salary_never_satisfies_a_bound() {
        let mut raw = input();
        raw.salary_max = Some("100000".into());
        let filter = compile(&raw).unwrap();
        assert!(!filter.matches(&candidate("Ana", Stage::Applied, None, "2024-01-01T00:00:00Z")));
    }

    #[test]
    fn pagination_defaults_and_limits() {
        let mut raw = input();
        raw.page = Some("3".into());
        let filter = compile(&raw).unwrap();
        let pagination = filter.pagination.unwrap();
        assert_eq!(pagination, Pagination { page: 3, per_page: DEFAULT_PER_PAGE });
        assert_eq!(pagination.offset(), 40);

        raw.per_page = Some("101".into());
        assert_eq!(failed_fields(compile(&raw).unwrap_err()), vec!["per_page"]);
    }

    #[test]
    fn huge_page_numbers_are_rejected() {
        let mut raw = input();
        raw.page = Some(i64::MAX.to_string());
        raw.per_page = Some("100".into());
        assert_eq!(failed_fields(compile(&raw).unwrap_err()), vec!["page"]);

        raw.page = Some(MAX_PAGE.to_string());
        let pagination = compile(&raw).unwrap().pagination.unwrap();
        assert_eq!(pagination.offset(), (MAX_PAGE - 1) * 100);
    }

    #[test]
    fn offset_saturates_for_hand_built_pagination() {
        let pagination = Pagination {
            page: i64::MAX,
            per_page: MAX_PER_PAGE,
        };
        assert_eq!(pagination.offset(), i64::MAX);
    }
}
