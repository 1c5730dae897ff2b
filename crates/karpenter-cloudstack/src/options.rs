//! Operator options loaded from the environment

use karpenter_cloudstack_client::ClientConfig;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const ENV_API_URL: &str = "CLOUDSTACK_API_URL";
pub const ENV_API_KEY: &str = "CLOUDSTACK_API_KEY";
pub const ENV_SECRET_KEY: &str = "CLOUDSTACK_SECRET_KEY";
pub const ENV_VERIFY_SSL: &str = "CLOUDSTACK_VERIFY_SSL";
pub const ENV_CLUSTER_NAME: &str = "CLUSTER_NAME";
pub const ENV_CACHE_TTL_SECONDS: &str = "CLOUDSTACK_CACHE_TTL_SECONDS";
pub const ENV_INSTANCE_NAME_PREFIX: &str = "CLOUDSTACK_INSTANCE_NAME_PREFIX";

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_INSTANCE_NAME_PREFIX: &str = "karpenter";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OptionsError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Immutable operator settings
#[derive(Clone, PartialEq, Eq)]
pub struct Options {
    pub api_url: String,
    pub api_key: String,
    pub secret_key: String,
    pub verify_ssl: bool,
    pub cluster_name: String,
    pub cache_ttl: Duration,
    pub instance_name_prefix: String,
}

impl Options {
    /// Load options from environment variables
    ///
    /// Every missing required variable is reported in one error.
    pub fn from_env() -> Result<Self, OptionsError> {
        let mut missing = Vec::new();
        let mut required = |name: &str| match std::env::var(name) {
            Ok(value) if !value.is_empty() => value,
            _ => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let api_url = required(ENV_API_URL);
        let api_key = required(ENV_API_KEY);
        let secret_key = required(ENV_SECRET_KEY);
        let cluster_name = required(ENV_CLUSTER_NAME);

        if !missing.is_empty() {
            return Err(OptionsError::MissingEnvVars(missing));
        }

        // only an explicit "false" disables verification
        let verify_ssl = std::env::var(ENV_VERIFY_SSL).map_or(true, |v| v != "false");

        let cache_ttl = match std::env::var(ENV_CACHE_TTL_SECONDS) {
            Ok(value) => {
                let seconds = value.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                    OptionsError::InvalidValue {
                        name: ENV_CACHE_TTL_SECONDS.to_string(),
                        value: value.clone(),
                    }
                })?;
                Duration::from_secs(seconds)
            }
            Err(_) => DEFAULT_CACHE_TTL,
        };

        let instance_name_prefix = std::env::var(ENV_INSTANCE_NAME_PREFIX)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_INSTANCE_NAME_PREFIX.to_string());

        Ok(Self {
            api_url,
            api_key,
            secret_key,
            verify_ssl,
            cluster_name,
            cache_ttl,
            instance_name_prefix,
        })
    }

    /// Connection settings for a CloudStack client
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.api_url, &self.api_key, &self.secret_key)
            .with_verify_ssl(self.verify_ssl)
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("verify_ssl", &self.verify_ssl)
            .field("cluster_name", &self.cluster_name)
            .field("cache_ttl", &self.cache_ttl)
            .field("instance_name_prefix", &self.instance_name_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: [&str; 7] = [
        ENV_API_URL,
        ENV_API_KEY,
        ENV_SECRET_KEY,
        ENV_VERIFY_SSL,
        ENV_CLUSTER_NAME,
        ENV_CACHE_TTL_SECONDS,
        ENV_INSTANCE_NAME_PREFIX,
    ];

    /// Run `f` with exactly `vars` set among the option variables
    fn with_env<R>(vars: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let kvs: Vec<(&str, Option<&str>)> = ALL_VARS
            .iter()
            .map(|name| {
                let value = vars.iter().find(|(k, _)| k == name).map(|(_, v)| *v);
                (*name, value)
            })
            .collect();
        temp_env::with_vars(kvs, f)
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_API_URL, "https://cloud.example.com/client/api"),
            (ENV_API_KEY, "my-api-key"),
            (ENV_SECRET_KEY, "my-secret-key"),
            (ENV_CLUSTER_NAME, "prod"),
        ]
    }

    #[test]
    fn test_from_env_defaults() {
        let options = with_env(&required(), Options::from_env).unwrap();

        assert_eq!(options.api_url, "https://cloud.example.com/client/api");
        assert_eq!(options.cluster_name, "prod");
        assert!(options.verify_ssl);
        assert_eq!(options.cache_ttl, Duration::from_secs(900));
        assert_eq!(options.instance_name_prefix, "karpenter");
    }

    #[test]
    fn test_from_env_reports_all_missing() {
        let err = with_env(&[(ENV_API_KEY, "key")], Options::from_env).unwrap_err();

        assert_eq!(
            err,
            OptionsError::MissingEnvVars(vec![
                ENV_API_URL.to_string(),
                ENV_SECRET_KEY.to_string(),
                ENV_CLUSTER_NAME.to_string(),
            ])
        );
        assert_eq!(
            err.to_string(),
            "missing required environment variables: CLOUDSTACK_API_URL, CLOUDSTACK_SECRET_KEY, CLUSTER_NAME"
        );
    }

    #[test]
    fn test_verify_ssl_only_disabled_by_false() {
        let mut vars = required();
        vars.push((ENV_VERIFY_SSL, "false"));
        assert!(!with_env(&vars, Options::from_env).unwrap().verify_ssl);

        let mut vars = required();
        vars.push((ENV_VERIFY_SSL, "no"));
        assert!(with_env(&vars, Options::from_env).unwrap().verify_ssl);
    }

    #[test]
    fn test_optional_overrides() {
        let mut vars = required();
        vars.push((ENV_CACHE_TTL_SECONDS, "60"));
        vars.push((ENV_INSTANCE_NAME_PREFIX, "kp"));

        let options = with_env(&vars, Options::from_env).unwrap();
        assert_eq!(options.cache_ttl, Duration::from_secs(60));
        assert_eq!(options.instance_name_prefix, "kp");
    }

    #[test]
    fn test_invalid_cache_ttl() {
        let mut vars = required();
        vars.push((ENV_CACHE_TTL_SECONDS, "soon"));

        let err = with_env(&vars, Options::from_env).unwrap_err();
        assert!(matches!(err, OptionsError::InvalidValue { .. }));
    }

    #[test]
    fn test_client_config_and_redaction() {
        let options = with_env(&required(), Options::from_env).unwrap();

        let config = options.client_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout, Duration::from_secs(60));

        let debug = format!("{:?}", options);
        assert!(!debug.contains("my-api-key"));
        assert!(!debug.contains("my-secret-key"));
        assert!(debug.contains("<redacted>"));
    }
}
