use crate::adapters::credentials::Credentials;
use crate::utils::error::{Result, UploaderError};
use crate::utils::validation::{validate_positive_number, validate_required_field, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Loaded when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG_FILE: &str = "csv-uploader.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_url: Option<String>,
    pub credentials_path: Option<String>,
    pub auth_secret: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub preview_rows: usize,
    pub max_upload_bytes: usize,
    pub pending_ttl_seconds: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            preview_rows: 5,
            max_upload_bytes: 200 * 1024 * 1024,
            pending_ttl_seconds: 30 * 60,
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| UploaderError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// An explicit path must exist; otherwise [`DEFAULT_CONFIG_FILE`] is read
    /// if present, and built-in defaults are used if not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_file(path)
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                tracing::info!("Loading configuration from {}", DEFAULT_CONFIG_FILE);
                Self::from_file(DEFAULT_CONFIG_FILE)
            }
            None => Ok(Self::default()),
        }
    }

    /// 替換環境變數 (例如 ${DATABASE_URL})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| UploaderError::Config {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn database_url(&self) -> Result<&str> {
        validate_required_field("store.database_url", &self.store.database_url).map(String::as_str)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::resolve(
            self.store.credentials_path.as_deref(),
            self.store.auth_secret.as_deref(),
        )
    }

    pub fn store_timeout(&self) -> Option<Duration> {
        self.store.timeout_seconds.map(Duration::from_secs)
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.upload.pending_ttl_seconds)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_url("store.database_url", self.database_url()?)?;
        validate_positive_number("upload.preview_rows", self.upload.preview_rows, 1)?;
        validate_positive_number("upload.max_upload_bytes", self.upload.max_upload_bytes, 1)?;
        validate_positive_number(
            "upload.pending_ttl_seconds",
            self.upload.pending_ttl_seconds as usize,
            1,
        )?;
        if let Some(timeout) = self.store.timeout_seconds {
            validate_positive_number("store.timeout_seconds", timeout as usize, 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
host = "0.0.0.0"
port = 9000

[store]
database_url = "https://demo-default-rtdb.firebaseio.com/"
credentials_path = "service-account.json"
timeout_seconds = 30

[upload]
preview_rows = 10
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database_url().unwrap(), "https://demo-default-rtdb.firebaseio.com/");
        assert_eq!(config.upload.preview_rows, 10);
        assert_eq!(config.upload.max_upload_bytes, 200 * 1024 * 1024);
        assert_eq!(config.store_timeout(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.upload.preview_rows, 5);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, UploaderError::MissingConfig { .. }));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CSV_UPLOADER_TEST_DB_URL", "https://env-default-rtdb.firebaseio.com/");

        let toml_content = r#"
[store]
database_url = "${CSV_UPLOADER_TEST_DB_URL}"
credentials_path = "${CSV_UPLOADER_TEST_UNSET_VAR}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.database_url().unwrap(),
            "https://env-default-rtdb.firebaseio.com/"
        );
        assert_eq!(
            config.store.credentials_path.as_deref(),
            Some("${CSV_UPLOADER_TEST_UNSET_VAR}")
        );

        std::env::remove_var("CSV_UPLOADER_TEST_DB_URL");
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::from_toml_str(
            r#"
[store]
database_url = "invalid-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str(
            r#"
[store]
database_url = "https://demo.firebaseio.com"

[upload]
preview_rows = 0
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = AppConfig::from_toml_str(
            r#"
[store]
database_url = "https://demo.firebaseio.com"

[upload]
pending_ttl_seconds = 0
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("upload.pending_ttl_seconds"), "{}", err);
    }

    #[test]
    fn test_unset_credentials_variable_is_not_a_key_path() {
        let config = AppConfig::from_toml_str(
            r#"
[store]
database_url = "https://demo.firebaseio.com"
credentials_path = "${CSV_UPLOADER_TEST_UNSET_CREDENTIALS}"
auth_secret = "legacy-secret"
"#,
        )
        .unwrap();

        assert_eq!(
            config.credentials(),
            Credentials::DatabaseSecret("legacy-secret".to_string())
        );
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[store]\ndatabase_url = \"http://127.0.0.1:9000\"\n")
            .unwrap();

        let config = AppConfig::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.database_url().unwrap(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/csv-uploader.toml"))).is_err());
    }
}
