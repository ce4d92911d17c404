use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use crate::auth::{Credentials, TokenSource};
use crate::error::{Error, Result};
use crate::inventory::{
    InventoryApi, Server, ServerErrorBody, ServerListParams, ServerListResponse,
};

const SERVERS_PATH: &str = "api/v1/servers";

/// HTTP client for the inventory service.
///
/// Built once at startup and shared; `reqwest::Client` pools connections
/// internally and every method takes `&self`.
#[derive(Debug)]
pub struct InventoryClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: TokenSource,
}

impl InventoryClient {
    pub fn new(base_url: Url, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hollowdhcp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
            tokens: TokenSource::new(credentials),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|error| Error::InvalidUrl {
            url: format!("{}{}", self.base_url, path),
            reason: error.to_string(),
        })
    }
}

#[async_trait]
impl InventoryApi for InventoryClient {
    async fn list_servers(&self, params: &ServerListParams) -> Result<Vec<Server>> {
        let url = self.endpoint(SERVERS_PATH)?;
        let token = self.tokens.bearer(&self.http).await?;

        debug!("GET {} {:?}", url, params.query_pairs());

        let response = self
            .http
            .get(url)
            .query(&params.query_pairs())
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ServerErrorBody>(&body)
                .ok()
                .map(|error| {
                    if error.message.is_empty() {
                        error.error
                    } else {
                        error.message
                    }
                })
                .filter(|message| !message.is_empty())
                .unwrap_or(body);

            return Err(Error::Server {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ServerListResponse = serde_json::from_str(&body)?;
        Ok(envelope.records)
    }
}

/// Makes relative joins land under the base path instead of replacing its
/// last segment.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
