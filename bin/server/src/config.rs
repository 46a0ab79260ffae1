//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables. Nested keys use
//! a double underscore, e.g. `SESSION__MAX_AGE_SECONDS`.

use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Secret used to sign session tokens and CSRF cookies.
    pub auth_secret: String,

    /// Google OAuth client ID.
    pub google_client_id: String,

    /// Google OAuth client secret.
    pub google_client_secret: String,

    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Public origin of the application, used for redirects.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Enables debug-level logging for the auth layer.
    #[serde(default)]
    pub debug: bool,

    /// Accept `X-Forwarded-Host` / `X-Forwarded-Proto` when computing the
    /// request origin.
    #[serde(default = "default_trust_host")]
    pub trust_host: bool,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub pages: PagesConfig,
}

/// Session token lifetime and cookie settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a session token in seconds.
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: i64,

    /// Whether to set the Secure flag on cookies. When unset, follows the
    /// scheme of `base_url`.
    #[serde(default)]
    pub secure_cookies: Option<bool>,

    /// Interval between expired session row cleanups, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

/// Paths of the pages the auth layer redirects to.
#[derive(Debug, Clone, Deserialize)]
pub struct PagesConfig {
    #[serde(default = "default_sign_in_page")]
    pub sign_in: String,
    #[serde(default = "default_error_page")]
    pub error: String,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_trust_host() -> bool {
    true
}

fn default_max_age_seconds() -> i64 {
    30 * 24 * 60 * 60
}

fn default_cleanup_interval_seconds() -> u64 {
    3600
}

fn default_sign_in_page() -> String {
    "/auth/signin".to_string()
}

fn default_error_page() -> String {
    "/auth/error".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age_seconds: default_max_age_seconds(),
            secure_cookies: None,
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            sign_in: default_sign_in_page(),
            error: default_error_page(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(true),
        )
    }

    fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: Self = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        for (key, value) in [
            ("auth_secret", &self.auth_secret),
            ("google_client_id", &self.google_client_id),
            ("google_client_secret", &self.google_client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(config::ConfigError::Message(format!("{key} must not be empty")));
            }
        }
        if reqwest::Url::parse(&self.base_url).is_err() {
            return Err(config::ConfigError::Message(format!(
                "base_url '{}' is not an absolute URL",
                self.base_url
            )));
        }
        if self.session.max_age_seconds <= 0 {
            return Err(config::ConfigError::Message(
                "session.max_age_seconds must be positive".to_string(),
            ));
        }
        if self.session.cleanup_interval_seconds == 0 {
            return Err(config::ConfigError::Message(
                "session.cleanup_interval_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether cookies carry the Secure flag.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.session
            .secure_cookies
            .unwrap_or_else(|| self.base_url.starts_with("https://"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn load(json: &str) -> Result<ServerConfig, config::ConfigError> {
        ServerConfig::from_source(File::from_str(json, FileFormat::Json))
    }

    const MINIMAL: &str = r#"{
        "auth_secret": "s3cret",
        "google_client_id": "client",
        "google_client_secret": "shh",
        "database_url": "postgres://localhost/coursegate"
    }"#;

    #[test]
    fn defaults_apply() {
        let config = load(MINIMAL).expect("valid config");

        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert!(config.trust_host);
        assert!(!config.debug);
        assert_eq!(config.session.max_age_seconds, 2_592_000);
        assert_eq!(config.session.cleanup_interval_seconds, 3600);
        assert_eq!(config.pages.sign_in, "/auth/signin");
        assert_eq!(config.pages.error, "/auth/error");
        assert!(!config.secure_cookies());
    }

    #[test]
    fn https_base_url_enables_secure_cookies() {
        let json = MINIMAL.replace(
            "\"database_url\"",
            "\"base_url\": \"https://courses.example.com\", \"database_url\"",
        );
        assert!(load(&json).expect("valid config").secure_cookies());
    }

    #[test]
    fn nested_overrides() {
        let json = MINIMAL.replace(
            "\"database_url\"",
            r#""session": {"max_age_seconds": 60, "secure_cookies": true},
               "pages": {"sign_in": "/login"},
               "database_url""#,
        );
        let config = load(&json).expect("valid config");

        assert_eq!(config.session.max_age_seconds, 60);
        assert!(config.secure_cookies());
        assert_eq!(config.pages.sign_in, "/login");
        assert_eq!(config.pages.error, "/auth/error");
    }

    #[test]
    fn missing_secret_is_fatal() {
        let json = r#"{
            "google_client_id": "client",
            "google_client_secret": "shh",
            "database_url": "postgres://localhost/coursegate"
        }"#;
        assert!(load(json).is_err());
    }

    #[test]
    fn empty_secret_is_rejected() {
        let json = MINIMAL.replace("s3cret", "  ");
        assert!(load(&json).is_err());
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let json = MINIMAL.replace(
            "\"database_url\"",
            "\"base_url\": \"/app\", \"database_url\"",
        );
        assert!(load(&json).is_err());
    }

    #[test]
    fn zero_cleanup_interval_is_rejected() {
        let json = MINIMAL.replace(
            "\"database_url\"",
            r#""session": {"cleanup_interval_seconds": 0}, "database_url""#,
        );
        assert!(load(&json).is_err());
    }
}
