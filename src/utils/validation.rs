use crate::utils::error::{NavError, Result};
use chrono::NaiveDate;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(NavError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => {
            match url.scheme() {
                "http" | "https" => Ok(()),
                scheme => Err(NavError::InvalidConfigValueError {
                    field: field_name.to_string(),
                    value: url_str.to_string(),
                    reason: format!("Unsupported URL scheme: {}", scheme),
                }),
            }
        }
        Err(e) => Err(NavError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(NavError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(NavError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(NavError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(NavError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(NavError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 正規化 Google Ads 客戶 ID：移除 `-` 與空白，必須剛好 10 位數字
pub fn normalize_customer_id(field_name: &str, raw: &str) -> Result<String> {
    let digits: String = raw.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect();

    if digits.len() != 10 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(NavError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: raw.to_string(),
            reason: "Customer id must contain exactly 10 digits (e.g. 123-456-7890)".to_string(),
        });
    }

    Ok(digits)
}

pub const MAX_DATE_RANGE_DAYS: i64 = 730;

pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(NavError::validation(format!(
            "Start date {} is after end date {}",
            start, end
        )));
    }

    let span = (end - start).num_days() + 1;
    if span > MAX_DATE_RANGE_DAYS {
        return Err(NavError::validation(format!(
            "Date range spans {} days; the maximum is {}",
            span, MAX_DATE_RANGE_DAYS
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("provider.google_ads.endpoint", "https://example.com").is_ok());
        assert!(validate_url("provider.google_ads.endpoint", "http://example.com").is_ok());
        assert!(validate_url("provider.google_ads.endpoint", "").is_err());
        assert!(validate_url("provider.google_ads.endpoint", "invalid-url").is_err());
        assert!(validate_url("provider.google_ads.endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("audit.concurrency", 5, 1).is_ok());
        assert!(validate_positive_number("audit.concurrency", 0, 1).is_err());
    }

    #[test]
    fn test_normalize_customer_id() {
        assert_eq!(normalize_customer_id("customer_id", "123-456-7890").unwrap(), "1234567890");
        assert_eq!(normalize_customer_id("customer_id", " 1234567890 ").unwrap(), "1234567890");
        assert!(normalize_customer_id("customer_id", "123-456-789").is_err());
        assert!(normalize_customer_id("customer_id", "abc-def-ghij").is_err());
    }

    #[test]
    fn test_validate_date_range() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert!(validate_date_range(start, end).is_ok());
        assert!(validate_date_range(end, start).is_err());

        let far = NaiveDate::from_ymd_opt(2028, 6, 1).unwrap();
        assert!(validate_date_range(start, far).is_err());
    }
}