use thiserror::Error;

/// solarfetch error types
#[derive(Error, Debug)]
pub enum SolarFetchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("NWP error: {0}")]
    Nwp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl SolarFetchError {
    /// Whether the error came from talking to a remote server
    pub fn is_transport(&self) -> bool {
        matches!(self, SolarFetchError::Api { .. } | SolarFetchError::Http(_))
    }
}

/// Result type for solarfetch operations
pub type Result<T> = std::result::Result<T, SolarFetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = SolarFetchError::Config("test error".to_string());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_error_display_api() {
        let err = SolarFetchError::Api {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API request failed with status 404: not found"
        );
    }

    #[test]
    fn test_error_display_parse() {
        let err = SolarFetchError::Parse("bad line".to_string());
        assert_eq!(err.to_string(), "Parse error: bad line");
    }

    #[test]
    fn test_is_transport() {
        let api = SolarFetchError::Api {
            status: 500,
            body: String::new(),
        };
        assert!(api.is_transport());
        assert!(!SolarFetchError::Nwp("x".to_string()).is_transport());
    }
}
