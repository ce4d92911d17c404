use std::time::Duration;

use reqwest::Url;
use serde::Serialize;

use crate::auth::Credentials;
use crate::client::with_trailing_slash;
use crate::error::{Error, Result};

pub const ENV_REQUEST_TIMEOUT_MS: &str = "HOLLOWDHCP_REQUEST_TIMEOUT_MS";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    #[serde(serialize_with = "serialize_url")]
    pub base_url: Url,
    pub credentials: Credentials,
    pub request_timeout_ms: u64,
}

impl Config {
    /// Builds the configuration from plugin arguments and the process environment.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        Self::from_args_with(args, |name| std::env::var(name).ok())
    }

    /// Like [`from_args`](Self::from_args), reading variables through `lookup`.
    pub fn from_args_with<S, F>(args: &[S], lookup: F) -> Result<Self>
    where
        S: AsRef<str>,
        F: Fn(&str) -> Option<String>,
    {
        let [url] = args else {
            return Err(Error::InvalidArgumentCount { got: args.len() });
        };
        let base_url = parse_base_url(url.as_ref())?;

        let request_timeout_ms = match lookup(ENV_REQUEST_TIMEOUT_MS) {
            Some(value) => value.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!(
                    "{} must be a number of milliseconds",
                    ENV_REQUEST_TIMEOUT_MS
                ))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };

        let config = Self {
            base_url,
            credentials: Credentials::from_lookup(&lookup)?,
            request_timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig(format!(
                "{} must be greater than 0",
                ENV_REQUEST_TIMEOUT_MS
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Returns a copy safe to print.
    pub fn redacted(&self) -> Self {
        Self {
            credentials: self.credentials.redacted(),
            ..self.clone()
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|error| Error::InvalidUrl {
        url: raw.to_string(),
        reason: error.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }

    Ok(with_trailing_slash(url))
}

fn serialize_url<S>(url: &Url, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(url.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ENV_TOKEN;

    fn token_env(name: &str) -> Option<String> {
        (name == ENV_TOKEN).then(|| "abc".to_string())
    }

    #[test]
    fn test_single_url_argument() {
        let config = Config::from_args_with(&["https://hollow.sh"], token_env).unwrap();
        assert_eq!(config.base_url.as_str(), "https://hollow.sh/");
        assert_eq!(config.request_timeout(), Duration::from_millis(2000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_argument_count() {
        let none: [&str; 0] = [];
        assert!(matches!(
            Config::from_args_with(&none, token_env),
            Err(Error::InvalidArgumentCount { got: 0 })
        ));
        assert!(matches!(
            Config::from_args_with(&["https://a", "https://b"], token_env),
            Err(Error::InvalidArgumentCount { got: 2 })
        ));
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            Config::from_args_with(&["not a url"], token_env),
            Err(Error::InvalidUrl { .. })
        ));
        assert!(matches!(
            Config::from_args_with(&["ftp://hollow.sh"], token_env),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_missing_credentials() {
        let result = Config::from_args_with(&["https://hollow.sh"], |_| None);
        assert!(matches!(result, Err(Error::MissingConfiguration(_))));
    }

    #[test]
    fn test_timeout_override() {
        let lookup = |name: &str| match name {
            ENV_TOKEN => Some("abc".to_string()),
            ENV_REQUEST_TIMEOUT_MS => Some("250".to_string()),
            _ => None,
        };
        let config = Config::from_args_with(&["http://127.0.0.1:8080"], lookup).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_millis(250));

        let zero = |name: &str| match name {
            ENV_TOKEN => Some("abc".to_string()),
            ENV_REQUEST_TIMEOUT_MS => Some("0".to_string()),
            _ => None,
        };
        assert!(matches!(
            Config::from_args_with(&["http://127.0.0.1:8080"], zero),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_redacted_serialization() {
        let config = Config::from_args_with(&["https://hollow.sh"], token_env).unwrap();
        let printed = serde_json::to_string(&config.redacted()).unwrap();
        assert!(printed.contains("https://hollow.sh/"));
        assert!(!printed.contains("\"abc\""));
    }
}
