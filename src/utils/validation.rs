use crate::utils::error::{Result, UploaderError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(UploaderError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(UploaderError::InvalidConfigValue {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(UploaderError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(UploaderError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

/// Checks the extension of an uploaded or local file name, case-insensitively.
pub fn validate_file_extension(field_name: &str, file: &str, allowed_extensions: &[&str]) -> Result<()> {
    let extension = std::path::Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) if allowed_extensions.contains(&ext.as_str()) => Ok(()),
        Some(ext) => Err(UploaderError::validation(format!(
            "{}: unsupported file extension '{}'. Allowed extensions: {}",
            field_name,
            ext,
            allowed_extensions.join(", ")
        ))),
        None => Err(UploaderError::validation(format!(
            "{}: '{}' has no file extension",
            field_name, file
        ))),
    }
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| UploaderError::MissingConfig {
        field: field_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("store.database_url", "https://demo-default-rtdb.firebaseio.com/").is_ok());
        assert!(validate_url("store.database_url", "http://127.0.0.1:9000").is_ok());
        assert!(validate_url("store.database_url", "").is_err());
        assert!(validate_url("store.database_url", "invalid-url").is_err());
        assert!(validate_url("store.database_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("upload.preview_rows", 5, 1).is_ok());
        assert!(validate_positive_number("upload.preview_rows", 0, 1).is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        assert!(validate_file_extension("file", "people.csv", &["csv"]).is_ok());
        assert!(validate_file_extension("file", "PEOPLE.CSV", &["csv"]).is_ok());
        assert!(validate_file_extension("file", "people.xlsx", &["csv"]).is_err());
        assert!(validate_file_extension("file", "people", &["csv"]).is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let present = Some(3);
        assert_eq!(*validate_required_field("x", &present).unwrap(), 3);
        let missing: Option<u8> = None;
        assert!(validate_required_field("x", &missing).is_err());
    }
}
