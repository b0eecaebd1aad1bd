use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploaderError {
    #[error("CSV parse error: {message}")]
    Parse { message: String },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Credentials error: {message}")]
    Credentials { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 使用者提供的檔案無法解析
    Input,
    /// 必填欄位缺漏或格式不符
    Validation,
    /// 遠端儲存或授權失敗
    Store,
    Configuration,
    System,
}

impl UploaderError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn credentials(message: impl Into<String>) -> Self {
        Self::Credentials {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse { .. } => ErrorCategory::Input,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Store { .. } | Self::Credentials { .. } => ErrorCategory::Store,
            Self::Config { .. } | Self::InvalidConfigValue { .. } | Self::MissingConfig { .. } => {
                ErrorCategory::Configuration
            }
            Self::Http(_) | Self::Io(_) | Self::Serialization(_) => ErrorCategory::System,
        }
    }

    /// The message as reported by the failing component, without the
    /// variant prefix added by `Display`.
    pub fn underlying_message(&self) -> String {
        match self {
            Self::Parse { message }
            | Self::Store { message }
            | Self::Validation { message }
            | Self::Credentials { message }
            | Self::Config { message } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Parse { message } => format!("Error reading CSV file: {}", message),
            Self::Store { message } | Self::Credentials { message } => {
                format!("Error uploading to Firebase: {}", message)
            }
            Self::Validation { message } => message.clone(),
            Self::MissingConfig { field } => format!("Missing required setting '{}'", field),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Check that the file is a UTF-8 encoded, comma-delimited CSV with a header row",
            ErrorCategory::Validation => "Fill in every required input and try again",
            ErrorCategory::Store => {
                "Check the database URL, the credentials file and the database rules, then retry the upload"
            }
            ErrorCategory::Configuration => "Fix the configuration file or command line flags",
            ErrorCategory::System => "Check network connectivity and file permissions",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Validation => 1,
            ErrorCategory::Store => 2,
            ErrorCategory::Configuration => 3,
            ErrorCategory::System => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, UploaderError>;
