//! Domain-specific shared validations

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::AppError;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const MAX_FUNDING_PAGE_SIZE: u32 = 200;

static YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").expect("valid year-month regex"));
static ID_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9]\d*(,[1-9]\d*)*$").expect("valid id list regex"));

pub fn require_text(value: &str, code: &'static str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(code, format!("{field} must not be empty")));
    }

    Ok(trimmed.to_string())
}

pub fn require_id(value: i64, code: &'static str, field: &str) -> Result<i64, AppError> {
    if value <= 0 {
        return Err(AppError::bad_request(
            code,
            format!("{field} must be a positive integer"),
        ));
    }

    Ok(value)
}

pub fn normalize_page(page: Option<u32>) -> Result<u32, AppError> {
    match page.unwrap_or(1) {
        0 => Err(AppError::bad_request("invalid_page", "page must be at least 1")),
        page => Ok(page),
    }
}

pub fn normalize_page_size(page_size: Option<u32>, max: u32) -> Result<u32, AppError> {
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size == 0 || page_size > max {
        return Err(AppError::bad_request(
            "invalid_page_size",
            format!("page_size must be between 1 and {max}"),
        ));
    }

    Ok(page_size)
}

/// Accepts `yyyy-MM` month stamps as used by the funding rounds endpoint.
pub fn normalize_year_month(
    value: Option<String>,
    field: &str,
) -> Result<Option<String>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let trimmed = value.trim();
    if !YEAR_MONTH.is_match(trimmed) {
        return Err(AppError::bad_request(
            "invalid_month",
            format!("{field} must use yyyy-MM format"),
        ));
    }

    Ok(Some(trimmed.to_string()))
}

/// Normalizes a comma-separated list of positive integer ids, tolerating whitespace.
pub fn normalize_id_list(value: &str, field: &str) -> Result<String, AppError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if !ID_LIST.is_match(&compact) {
        return Err(AppError::bad_request(
            "invalid_id_list",
            format!("{field} must be a comma-separated list of positive integer ids"),
        ));
    }

    Ok(compact)
}

/// Lower-cases and checks an enumerated option, falling back to `default` when absent.
pub fn normalize_choice(
    value: Option<String>,
    allowed: &[&str],
    default: &str,
    code: &'static str,
    field: &str,
) -> Result<String, AppError> {
    let normalized = value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| default.to_string());

    if !allowed.contains(&normalized.as_str()) {
        return Err(AppError::bad_request(
            code,
            format!("{field} must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::{
        normalize_choice, normalize_id_list, normalize_page_size, normalize_year_month,
        require_text, MAX_PAGE_SIZE,
    };

    #[test]
    fn rejects_blank_text() {
        let error = require_text("   ", "invalid_query", "query").expect_err("expected error");
        assert!(error.to_string().contains("bad request"));
    }

    #[test]
    fn page_size_defaults_and_bounds() {
        assert_eq!(normalize_page_size(None, MAX_PAGE_SIZE).expect("default"), 10);
        assert!(normalize_page_size(Some(0), MAX_PAGE_SIZE).is_err());
        assert!(normalize_page_size(Some(101), MAX_PAGE_SIZE).is_err());
        assert_eq!(normalize_page_size(Some(100), MAX_PAGE_SIZE).expect("max"), 100);
    }

    #[test]
    fn validates_year_month() {
        assert_eq!(
            normalize_year_month(Some(" 2024-03 ".to_string()), "start_time").expect("valid"),
            Some("2024-03".to_string())
        );
        assert!(normalize_year_month(Some("2024-13".to_string()), "start_time").is_err());
        assert!(normalize_year_month(Some("2024/03".to_string()), "start_time").is_err());
    }

    #[test]
    fn compacts_id_lists() {
        assert_eq!(normalize_id_list("1, 22 ,333", "tag_ids").expect("valid"), "1,22,333");
        assert!(normalize_id_list("1,,2", "tag_ids").is_err());
        assert!(normalize_id_list("0", "tag_ids").is_err());
        assert!(normalize_id_list("abc", "tag_ids").is_err());
    }

    #[test]
    fn normalizes_choice_case_insensitive() {
        let value = normalize_choice(
            Some(" ALL ".to_string()),
            &["basic", "all"],
            "basic",
            "invalid_scope",
            "investigation_scope",
        )
        .expect("valid choice");
        assert_eq!(value, "all");

        let error = normalize_choice(
            Some("everything".to_string()),
            &["basic", "all"],
            "basic",
            "invalid_scope",
            "investigation_scope",
        )
        .expect_err("expected invalid choice");
        assert_eq!(error.code(), "invalid_scope");
    }
}
