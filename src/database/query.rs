use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Paging and ordering parameters shared by every list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// e.g. `company_name asc` or `created_at desc`
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

/// Pages past this are rejected rather than turned into an overflowing OFFSET
pub const MAX_PAGE: i64 = 1_000_000;

impl Pagination {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl ListParams {
    pub fn pagination(&self) -> Result<Pagination, ApiError> {
        let query = &config::config().query;
        Self::resolve_pagination(self.page, self.limit, query.default_limit, query.max_limit)
    }

    fn resolve_pagination(
        page: Option<i64>,
        limit: Option<i64>,
        default_limit: i64,
        max_limit: i64,
    ) -> Result<Pagination, ApiError> {
        let page = page.unwrap_or(1).max(1);
        if page > MAX_PAGE {
            return Err(ApiError::invalid_field("page", format!("Must be at most {}", MAX_PAGE)));
        }
        let limit = match limit {
            Some(l) if l > 0 => l.min(max_limit),
            _ => default_limit,
        };
        Ok(Pagination { page, limit })
    }

    /// Builds an ORDER BY body from `sort`, restricted to `allowed` columns.
    /// Ties are always broken by `id` so paging is stable.
    pub fn order_by(&self, allowed: &[&str], default: (&str, SortDirection)) -> Result<String, ApiError> {
        let (column, direction) = match self.sort.as_deref().map(str::trim) {
            None | Some("") => (default.0.to_string(), default.1),
            Some(spec) => parse_sort(spec, allowed)?,
        };
        Ok(format!("{} {}, id ASC", column, direction.to_sql()))
    }
}

fn parse_sort(spec: &str, allowed: &[&str]) -> Result<(String, SortDirection), ApiError> {
    let mut parts = spec.split_whitespace();
    let column = parts.next().unwrap_or_default();
    let direction = match parts.next() {
        None => SortDirection::Asc,
        Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
        Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
        Some(d) => return Err(ApiError::invalid_field("sort", format!("Unknown sort direction '{}'", d))),
    };

    if parts.next().is_some() {
        return Err(ApiError::invalid_field("sort", "Expected '<field> [asc|desc]'"));
    }

    if !allowed.contains(&column) {
        return Err(ApiError::invalid_field(
            "sort",
            format!("Cannot sort by '{}'. Allowed: {}", column, allowed.join(", ")),
        ));
    }

    Ok((column.to_string(), direction))
}

/// One page of results plus the total matching count
#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
        }
    }
}

/// Escape `%`, `_` and `\` so user search text matches literally in ILIKE
pub fn like_pattern(search: &str) -> String {
    let escaped = search
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[&str] = &["company_name", "created_at"];

    #[test]
    fn pagination_defaults_and_caps() {
        assert_eq!(
            ListParams::resolve_pagination(None, None, 50, 500).unwrap(),
            Pagination { page: 1, limit: 50 }
        );
        assert_eq!(
            ListParams::resolve_pagination(Some(0), Some(10_000), 50, 500).unwrap(),
            Pagination { page: 1, limit: 500 }
        );
        assert_eq!(ListParams::resolve_pagination(Some(3), Some(20), 50, 500).unwrap().offset(), 40);
    }

    #[test]
    fn huge_page_is_rejected() {
        let err = ListParams::resolve_pagination(Some(i64::MAX), Some(50), 20, 100).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let last = ListParams::resolve_pagination(Some(MAX_PAGE), Some(100), 20, 100).unwrap();
        assert_eq!(last.offset(), (MAX_PAGE - 1) * 100);
    }

    #[test]
    fn offset_saturates_instead_of_overflowing() {
        let pagination = Pagination { page: i64::MAX, limit: i64::MAX };
        assert_eq!(pagination.offset(), i64::MAX);
    }

    #[test]
    fn sort_defaults_when_absent() {
        let params = ListParams::default();
        let order = params.order_by(COLUMNS, ("created_at", SortDirection::Desc)).unwrap();
        assert_eq!(order, "created_at DESC, id ASC");
    }

    #[test]
    fn sort_parses_direction() {
        let params = ListParams { sort: Some("company_name DESC".to_string()), ..Default::default() };
        let order = params.order_by(COLUMNS, ("created_at", SortDirection::Desc)).unwrap();
        assert_eq!(order, "company_name DESC, id ASC");
    }

    #[test]
    fn sort_rejects_unknown_columns() {
        let params = ListParams { sort: Some("password_hash".to_string()), ..Default::default() };
        assert!(params.order_by(COLUMNS, ("created_at", SortDirection::Desc)).is_err());

        let params = ListParams { sort: Some("company_name; drop table".to_string()), ..Default::default() };
        assert!(params.order_by(COLUMNS, ("created_at", SortDirection::Desc)).is_err());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" acme "), "%acme%");
        assert_eq!(like_pattern("100%_"), "%100\\%\\_%");
    }
}
