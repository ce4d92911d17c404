//! Credentials for the inventory service.
//!
//! Two modes are supported: a static bearer token, or the OAuth2
//! client-credentials flow against an OIDC issuer. Tokens from the flow are
//! cached until shortly before they expire.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

pub const ENV_TOKEN: &str = "HOLLOWDHCP_TOKEN";
pub const ENV_OIDC_ISSUER: &str = "HOLLOWDHCP_OIDC_ISSUER";
pub const ENV_OIDC_CLIENT_ID: &str = "HOLLOWDHCP_OIDC_CLIENT_ID";
pub const ENV_OIDC_CLIENT_SECRET: &str = "HOLLOWDHCP_OIDC_CLIENT_SECRET";
pub const ENV_OIDC_AUDIENCE: &str = "HOLLOWDHCP_OIDC_AUDIENCE";

const TOKEN_SCOPES: &str = "read:server read:instance";

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 300;

/// Upper bound on a reported `expires_in`; longer lifetimes are capped.
const MAX_TOKEN_LIFETIME_SECONDS: i64 = 86_400;

/// Tokens are refreshed this long before their reported expiry.
const TOKEN_EXPIRY_SKEW_SECONDS: i64 = 30;

#[derive(Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Credentials {
    StaticToken {
        token: String,
    },
    ClientCredentials {
        issuer: String,
        client_id: String,
        client_secret: String,
        audience: String,
    },
}

impl Credentials {
    /// Reads credentials through `lookup`, usually the process environment.
    ///
    /// A non-empty [`ENV_TOKEN`] selects the static token mode. Otherwise all
    /// four OIDC variables are required.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConfiguration`] naming the first absent variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(Error::MissingConfiguration(name))
        };

        if let Ok(token) = read(ENV_TOKEN) {
            return Ok(Self::StaticToken { token });
        }

        Ok(Self::ClientCredentials {
            issuer: read(ENV_OIDC_ISSUER)?,
            client_id: read(ENV_OIDC_CLIENT_ID)?,
            client_secret: read(ENV_OIDC_CLIENT_SECRET)?,
            audience: read(ENV_OIDC_AUDIENCE)?,
        })
    }

    /// Returns a copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        const MASK: &str = "<redacted>";
        match self {
            Self::StaticToken { .. } => Self::StaticToken {
                token: MASK.to_string(),
            },
            Self::ClientCredentials {
                issuer,
                client_id,
                audience,
                ..
            } => Self::ClientCredentials {
                issuer: issuer.clone(),
                client_id: client_id.clone(),
                client_secret: MASK.to_string(),
                audience: audience.clone(),
            },
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.redacted() {
            Self::StaticToken { token } => f.debug_struct("StaticToken").field("token", &token).finish(),
            Self::ClientCredentials {
                issuer,
                client_id,
                client_secret,
                audience,
            } => f
                .debug_struct("ClientCredentials")
                .field("issuer", &issuer)
                .field("client_id", &client_id)
                .field("client_secret", &client_secret)
                .field("audience", &audience)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Utc::now() + TimeDelta::seconds(TOKEN_EXPIRY_SKEW_SECONDS) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Produces bearer tokens for outgoing requests.
#[derive(Debug)]
pub struct TokenSource {
    credentials: Credentials,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Returns a bearer token, fetching a new one when the cache is stale.
    pub async fn bearer(&self, http: &reqwest::Client) -> Result<String> {
        let (issuer, client_id, client_secret, audience) = match &self.credentials {
            Credentials::StaticToken { token } => return Ok(token.clone()),
            Credentials::ClientCredentials {
                issuer,
                client_id,
                client_secret,
                audience,
            } => (issuer, client_id, client_secret, audience),
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.is_fresh()
        {
            return Ok(token.access_token.clone());
        }

        let token_url = token_url(issuer);
        debug!("Requesting access token from {}", token_url);

        let response = http
            .post(&token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("audience", audience.as_str()),
                ("scope", TOKEN_SCOPES),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Token {
                status: status.as_u16(),
                message: body,
            });
        }

        let issued: TokenResponse = serde_json::from_str(&body)?;
        let token = CachedToken {
            access_token: issued.access_token,
            expires_at: expiry_after(issued.expires_in),
        };
        let access_token = token.access_token.clone();
        *cached = Some(token);

        Ok(access_token)
    }
}

/// Expiry of a token issued now with the reported lifetime.
fn expiry_after(expires_in: Option<i64>) -> DateTime<Utc> {
    let lifetime = expires_in
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECONDS)
        .clamp(0, MAX_TOKEN_LIFETIME_SECONDS);
    Utc::now() + TimeDelta::seconds(lifetime)
}

fn token_url(issuer: &str) -> String {
    if issuer.ends_with('/') {
        format!("{}oauth2/token", issuer)
    } else {
        format!("{}/oauth2/token", issuer)
    }
}
