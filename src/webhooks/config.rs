//! Webhook server configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables. Command-line flags are applied on top by the
//! binary through the `with_*` builders.

use std::fmt;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::signature::SignatureVerifier;

/// Prefix of environment overrides, e.g. `OPSLEVEL_WEBHOOK__PORT=9000`
pub const ENV_PREFIX: &str = "OPSLEVEL_WEBHOOK";

/// Errors that can occur when loading webhook configuration.
#[derive(Debug, Error)]
pub enum WebhookConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] ConfigError),

    /// The configuration file path is invalid.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),

    /// No signing secret was provided.
    #[error("no webhook signing secret configured (set `secret`, OPSLEVEL_WEBHOOK__SECRET or --secret)")]
    MissingSecret,
}

/// Webhook server configuration
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Port to listen on
    pub port: u16,
    /// Address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub bind_address: String,
    /// Secret shared with OpsLevel for signing deliveries
    pub secret: Option<String>,
    /// Extra header names OpsLevel includes in the signed content
    #[serde(deserialize_with = "header_list")]
    pub additional_headers: Vec<String>,
    /// Accept deliveries whose signature does not match, logging the result
    pub report_only: bool,
}

/// Accept header names as a TOML array or a comma-separated string.
///
/// Environment values always arrive as strings, so the list form of
/// `OPSLEVEL_WEBHOOK__ADDITIONAL_HEADERS` is split here.
fn header_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HeaderList {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match HeaderList::deserialize(deserializer)? {
        HeaderList::List(names) => names,
        HeaderList::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect(),
    })
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "127.0.0.1".to_string(),
            secret: None,
            additional_headers: Vec::new(),
            report_only: false,
        }
    }
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("port", &self.port)
            .field("bind_address", &self.bind_address)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("additional_headers", &self.additional_headers)
            .field("report_only", &self.report_only)
            .finish()
    }
}

impl WebhookConfig {
    /// Create a new WebhookConfig with the given port
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Load configuration from an optional TOML file and the environment.
    ///
    /// Environment variables use the `OPSLEVEL_WEBHOOK` prefix and `__` as
    /// separator. `OPSLEVEL_WEBHOOK__ADDITIONAL_HEADERS` takes a
    /// comma-separated list. Values are taken verbatim, so a secret such as
    /// `00123` or `true` is not reinterpreted as a number or boolean.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration file does not exist
    /// - The configuration cannot be parsed
    /// - The path is invalid
    pub fn load(path: Option<&Path>) -> Result<Self, WebhookConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            let path_str = path
                .to_str()
                .ok_or_else(|| WebhookConfigError::InvalidPath(format!("{:?}", path)))?;

            if !path.exists() {
                return Err(WebhookConfigError::FileNotFound(path_str.to_string()));
            }

            builder = builder.add_source(File::with_name(path_str));
        }

        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the bind address
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// Set the webhook signing secret
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Set the extra signed header names
    pub fn with_additional_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Set report-only mode
    pub fn with_report_only(mut self, report_only: bool) -> Self {
        self.report_only = report_only;
        self
    }

    /// Get the full bind address (ip:port)
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Check that the configuration can verify deliveries
    pub fn validate(&self) -> Result<(), WebhookConfigError> {
        match self.secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(()),
            _ => Err(WebhookConfigError::MissingSecret),
        }
    }

    /// Build the verifier described by this configuration
    pub fn verifier(&self) -> Result<SignatureVerifier, WebhookConfigError> {
        self.validate()?;
        let secret = self.secret.as_deref().unwrap_or_default();
        Ok(SignatureVerifier::new(secret).with_additional_headers(self.additional_headers.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard};

    /// Serializes every test that reads the process environment through `load`.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Sets `OPSLEVEL_WEBHOOK__*` variables and removes them on drop.
    struct EnvVars {
        names: Vec<String>,
        _lock: MutexGuard<'static, ()>,
    }

    impl EnvVars {
        fn lock() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            Self {
                names: Vec::new(),
                _lock: lock,
            }
        }

        fn set(mut self, key: &str, value: &str) -> Self {
            let name = format!("{}__{}", ENV_PREFIX, key);
            std::env::set_var(&name, value);
            self.names.push(name);
            self
        }
    }

    impl Drop for EnvVars {
        fn drop(&mut self) {
            for name in &self.names {
                std::env::remove_var(name);
            }
        }
    }

    #[test]
    fn test_webhook_config_default() {
        let config = WebhookConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert!(config.secret.is_none());
        assert!(config.additional_headers.is_empty());
        assert!(!config.report_only);
    }

    #[test]
    fn test_webhook_config_builder() {
        let config = WebhookConfig::new(9000)
            .with_bind_address("0.0.0.0")
            .with_secret("s3cret")
            .with_additional_headers(["Content-Type", "Accept"])
            .with_report_only(true);

        assert_eq!(config.port, 9000);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.secret, Some("s3cret".to_string()));
        assert_eq!(config.additional_headers, vec!["Content-Type", "Accept"]);
        assert!(config.report_only);
        assert_eq!(config.with_port(9001).socket_addr(), "0.0.0.0:9001");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = WebhookConfig::default().with_secret("do-not-print");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("do-not-print"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            WebhookConfig::default().validate(),
            Err(WebhookConfigError::MissingSecret)
        ));
        assert!(matches!(
            WebhookConfig::default().with_secret("").validate(),
            Err(WebhookConfigError::MissingSecret)
        ));
        assert!(WebhookConfig::default().with_secret("x").validate().is_ok());
    }

    #[test]
    fn test_verifier_carries_additional_headers() {
        let verifier = WebhookConfig::default()
            .with_secret("x")
            .with_additional_headers(["From"])
            .verifier()
            .unwrap();
        assert_eq!(verifier.additional_headers().to_vec(), vec!["From".to_string()]);
    }

    #[test]
    fn test_load_missing_file() {
        let _env = EnvVars::lock();
        let err = WebhookConfig::load(Some(Path::new("/nonexistent/webhook.toml"))).unwrap_err();
        assert!(matches!(err, WebhookConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let _env = EnvVars::lock();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            port = 9100
            bind_address = "0.0.0.0"
            secret = "from-file"
            additional_headers = ["Content-Type", "Authorization"]
            report_only = true
            "#
        )
        .unwrap();

        let config = WebhookConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.secret, Some("from-file".to_string()));
        assert_eq!(
            config.additional_headers,
            vec!["Content-Type".to_string(), "Authorization".to_string()]
        );
        assert!(config.report_only);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let _env = EnvVars::lock();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "secret = \"only-secret\"").unwrap();

        let config = WebhookConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.secret, Some("only-secret".to_string()));
        assert!(config.additional_headers.is_empty());
        assert!(!config.report_only);
    }

    #[test]
    fn test_load_from_env() {
        let _env = EnvVars::lock()
            .set("PORT", "9001")
            .set("BIND_ADDRESS", "0.0.0.0")
            .set("SECRET", "env-secret")
            .set("REPORT_ONLY", "true");

        let config = WebhookConfig::load(None).unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.secret, Some("env-secret".to_string()));
        assert!(config.report_only);
    }

    #[test]
    fn test_env_additional_headers_comma_separated() {
        let _env = EnvVars::lock().set("ADDITIONAL_HEADERS", "Content-Type, Accept");

        let config = WebhookConfig::load(None).unwrap();
        assert_eq!(
            config.additional_headers,
            vec!["Content-Type".to_string(), "Accept".to_string()]
        );
    }

    #[test]
    fn test_env_secret_kept_verbatim() {
        for secret in ["00123", "TRUE", "1e5", "a,b"] {
            let _env = EnvVars::lock().set("SECRET", secret);

            let config = WebhookConfig::load(None).unwrap();
            assert_eq!(config.secret.as_deref(), Some(secret));
        }
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            port = 9100
            secret = "from-file"
            additional_headers = ["Authorization"]
            "#
        )
        .unwrap();

        let _env = EnvVars::lock()
            .set("PORT", "9200")
            .set("SECRET", "from-env");

        let config = WebhookConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.port, 9200);
        assert_eq!(config.secret, Some("from-env".to_string()));
        assert_eq!(config.additional_headers, vec!["Authorization".to_string()]);
    }
}
