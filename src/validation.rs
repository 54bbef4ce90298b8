//! Field-level validation shared by the request types.

use serde::{Deserialize, Deserializer};

use crate::error::ApiError;

/// Deserialize helper distinguishing "field absent" (`None`) from
/// "field set to null" (`Some(None)`) in PATCH bodies. Use with `#[serde(default)]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trims and rejects blank or oversized required text
pub fn required_text(field: &str, value: &str, max_len: usize) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::invalid_field(field, "This field is required"));
    }
    if trimmed.chars().count() > max_len {
        return Err(ApiError::invalid_field(field, format!("Must be at most {} characters", max_len)));
    }
    Ok(trimmed.to_string())
}

/// Trims optional text, mapping blank strings to `None`
pub fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn validate_email(field: &str, email: &str) -> Result<(), ApiError> {
    let email = email.trim();
    let problem = match email.split_once('@') {
        None => Some("Invalid email format"),
        Some((local, domain)) => {
            if local.is_empty() || domain.is_empty() || domain.contains('@') {
                Some("Invalid email format")
            } else if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
                Some("Email domain must contain a dot")
            } else if email.chars().any(char::is_whitespace) {
                Some("Email cannot contain whitespace")
            } else {
                None
            }
        }
    };

    match problem {
        Some(msg) => Err(ApiError::invalid_field(field, msg)),
        None => Ok(()),
    }
}

/// ISO 4217 style code: three ASCII letters, normalised to upper case
pub fn normalize_currency(field: &str, currency: &str) -> Result<String, ApiError> {
    let code = currency.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::invalid_field(field, "Currency must be a 3-letter code"));
    }
    Ok(code.to_ascii_uppercase())
}

pub fn validate_http_url(field: &str, value: &str) -> Result<url::Url, ApiError> {
    let parsed = url::Url::parse(value.trim()).map_err(|_| ApiError::invalid_field(field, "Invalid URL"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ApiError::invalid_field(field, format!("Unsupported URL scheme '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(validate_email("email", "soc@acme.example").is_ok());
        assert!(validate_email("email", "no-at-sign").is_err());
        assert!(validate_email("email", "a@b@c.com").is_err());
        assert!(validate_email("email", "user@localhost").is_err());
        assert!(validate_email("email", "us er@acme.com").is_err());
    }

    #[test]
    fn currency_is_normalised() {
        assert_eq!(normalize_currency("currency", "eur").unwrap(), "EUR");
        assert!(normalize_currency("currency", "EURO").is_err());
        assert!(normalize_currency("currency", "U5D").is_err());
    }

    #[test]
    fn required_text_trims_and_limits() {
        assert_eq!(required_text("name", "  Acme  ", 10).unwrap(), "Acme");
        assert!(required_text("name", "   ", 10).is_err());
        assert!(required_text("name", "abcdefghijk", 10).is_err());
    }

    #[test]
    fn urls_must_be_http() {
        assert!(validate_http_url("base_url", "https://acme.atlassian.net").is_ok());
        assert!(validate_http_url("base_url", "ftp://files.example.com").is_err());
        assert!(validate_http_url("base_url", "not a url").is_err());
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        notes: Option<Option<String>>,
    }

    #[test]
    fn double_option_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.notes, None);
        let null: Patch = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(null.notes, Some(None));
        let set: Patch = serde_json::from_str(r#"{"notes": "x"}"#).unwrap();
        assert_eq!(set.notes, Some(Some("x".to_string())));
    }
}
