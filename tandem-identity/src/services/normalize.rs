//! Field normalizers shared by signup and every patchable resource.

use std::collections::BTreeSet;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{Gender, GenderFilter};

pub const DISPLAY_NAME_MAX: usize = 80;
pub const ABOUT_MAX: usize = 2000;
pub const LANG_MAX: usize = 35;
pub const TIMEZONE_MAX: usize = 64;

pub fn field_error(field: &'static str, message: impl Into<String>) -> AppError {
    AppError::with_details(
        ErrorCode::ValidationError,
        message,
        serde_json::json!({ "field": field }),
    )
}

/// Trimmed and lower-cased; must look like an address.
pub fn email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !validator::validate_email(email.as_str()) {
        return Err(field_error("email", "invalid email address"));
    }
    Ok(email)
}

pub fn display_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > DISPLAY_NAME_MAX {
        return Err(field_error(
            "display_name",
            format!("display name must be 1 to {DISPLAY_NAME_MAX} characters"),
        ));
    }
    Ok(name.to_string())
}

pub fn avatar_url(raw: &str) -> AppResult<String> {
    let url = raw.trim();
    if !validator::validate_url(url) {
        return Err(field_error("avatar_url", "avatar url is not a valid url"));
    }
    Ok(url.to_string())
}

pub fn age(value: i32) -> AppResult<i32> {
    if !(13..=120).contains(&value) {
        return Err(field_error("age", "age must be between 13 and 120"));
    }
    Ok(value)
}

pub fn gender(raw: &str) -> AppResult<Gender> {
    Gender::parse(raw).ok_or_else(|| field_error("gender", "gender must be male or female"))
}

pub fn gender_filter(raw: &str) -> AppResult<GenderFilter> {
    GenderFilter::parse(raw)
        .ok_or_else(|| field_error("gender_filter", "gender filter must be male, female or any"))
}

fn parse_country(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    (code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase())).then_some(code)
}

/// A single ISO 3166 alpha-2 code, upper-cased.
pub fn country_code(raw: &str) -> AppResult<String> {
    parse_country(raw).ok_or_else(|| field_error("country_code", "country code must be two letters"))
}

/// Upper-cases, drops malformed entries, deduplicates and sorts.
pub fn country_list(raw: &[String]) -> Vec<String> {
    raw.iter()
        .filter_map(|c| parse_country(c))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn language(field: &'static str, raw: &str) -> AppResult<String> {
    let lang = raw.trim();
    if lang.is_empty() || lang.chars().count() > LANG_MAX {
        return Err(field_error(field, format!("{field} must be 1 to {LANG_MAX} characters")));
    }
    Ok(lang.to_string())
}

pub fn level(field: &'static str, value: i16) -> AppResult<i16> {
    if !(1..=6).contains(&value) {
        return Err(field_error(field, format!("{field} must be between 1 and 6")));
    }
    Ok(value)
}

pub fn rating(value: i16) -> AppResult<i16> {
    if !(1..=5).contains(&value) {
        return Err(field_error("min_rating", "min_rating must be between 1 and 5"));
    }
    Ok(value)
}

pub fn about(raw: &str) -> AppResult<String> {
    let about = raw.trim();
    if about.chars().count() > ABOUT_MAX {
        return Err(field_error("about", format!("about must be at most {ABOUT_MAX} characters")));
    }
    Ok(about.to_string())
}

pub fn timezone(raw: &str) -> AppResult<String> {
    let tz = raw.trim();
    if tz.is_empty() || tz.chars().count() > TIMEZONE_MAX {
        return Err(field_error("timezone", format!("timezone must be 1 to {TIMEZONE_MAX} characters")));
    }
    Ok(tz.to_string())
}

/// Positive ids, deduplicated and sorted. At least one is required.
pub fn interest_ids(raw: &[i32]) -> AppResult<Vec<i32>> {
    if raw.is_empty() {
        return Err(field_error("interest_ids", "at least one interest is required"));
    }
    if raw.iter().any(|&id| id <= 0) {
        return Err(field_error("interest_ids", "interest ids must be positive"));
    }
    Ok(raw.iter().copied().collect::<BTreeSet<_>>().into_iter().collect())
}
