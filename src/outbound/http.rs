//! reqwest-backed [`OutboundClient`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use url::Url;

use super::{ClientError, NewSubmission, OutboundClient, body_snippet};
use crate::config::AppConfig;
use crate::events::{ExternalId, Submission};
use crate::models::Platform;

const N8N_API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// Outbound client talking to the configured platform base URLs.
#[derive(Debug, Clone)]
pub struct HttpOutboundClient {
    http: Client,
    docuseal_base: Url,
    docuseal_api_key: Option<String>,
    n8n_base: Url,
    n8n_api_key: Option<String>,
}

impl HttpOutboundClient {
    pub fn new(config: &AppConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            docuseal_base: parse_base(Platform::Docuseal, &config.docuseal.base_url)?,
            docuseal_api_key: config.docuseal.api_key.clone(),
            n8n_base: parse_base(Platform::N8n, &config.n8n.base_url)?,
            n8n_api_key: config.n8n.api_key.clone(),
        })
    }

    fn base(&self, platform: Platform) -> &Url {
        match platform {
            Platform::Docuseal => &self.docuseal_base,
            Platform::N8n => &self.n8n_base,
        }
    }

    /// Appends path segments to a platform base URL, escaping each one.
    /// Empty segments are skipped.
    fn endpoint<'a>(
        &self,
        platform: Platform,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, ClientError> {
        let mut url = self.base(platform).clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                platform,
                url: self.base(platform).to_string(),
                reason: "base URL cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments.into_iter().filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Resolves a configured n8n webhook path against the n8n base URL. The
    /// path is used as written, including any query string or escapes.
    fn webhook_url(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.base(Platform::N8n).as_str().trim_end_matches('/');
        let raw = format!("{}/{}", base, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| ClientError::InvalidUrl {
            platform: Platform::N8n,
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    fn docuseal_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.docuseal_api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn n8n_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.n8n_api_key {
            Some(key) => request.header(N8N_API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send(
        &self,
        platform: Platform,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ClientError> {
        let outcome = match request.send().await {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                warn!(%platform, operation, status, "Upstream call rejected");
                Err(ClientError::Http {
                    platform,
                    status,
                    body: body_snippet(&body),
                })
            }
            Err(source) => {
                warn!(%platform, operation, error = %source, "Upstream call failed");
                Err(ClientError::Network { platform, source })
            }
        };

        let result = if outcome.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "outbound_requests_total",
            "platform" => platform.as_str(),
            "operation" => operation,
            "outcome" => result
        )
        .increment(1);

        outcome
    }

    async fn decode<T: DeserializeOwned>(
        platform: Platform,
        response: Response,
    ) -> Result<T, ClientError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ClientError::Network { platform, source })?;
        serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode { platform, source })
    }
}

fn parse_base(platform: Platform, value: &str) -> Result<Url, ClientError> {
    Url::parse(value).map_err(|e| ClientError::InvalidUrl {
        platform,
        url: value.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl OutboundClient for HttpOutboundClient {
    async fn get_submission(&self, id: &ExternalId) -> Result<Submission, ClientError> {
        let url = self.endpoint(Platform::Docuseal, ["api", "submissions", id.as_str()])?;
        debug!(submission_id = %id, "Fetching submission");

        let request = self.docuseal_auth(self.http.get(url));
        let response = self
            .send(Platform::Docuseal, "get_submission", request)
            .await?;
        Self::decode(Platform::Docuseal, response).await
    }

    async fn create_submission(
        &self,
        template_id: &str,
        submission: &NewSubmission,
    ) -> Result<JsonValue, ClientError> {
        let url = self.endpoint(
            Platform::Docuseal,
            ["api", "templates", template_id, "submissions"],
        )?;
        debug!(template_id, "Creating submission");

        let request = self.docuseal_auth(self.http.post(url).json(submission));
        let response = self
            .send(Platform::Docuseal, "create_submission", request)
            .await?;
        Self::decode(Platform::Docuseal, response).await
    }

    async fn trigger_workflow(
        &self,
        workflow_id: &str,
        data: &JsonValue,
    ) -> Result<JsonValue, ClientError> {
        let url = self.endpoint(Platform::N8n, ["api", "v1", "workflows", workflow_id])?;
        debug!(workflow_id, "Triggering workflow");

        let request = self.n8n_auth(self.http.post(url).json(data));
        let response = self
            .send(Platform::N8n, "trigger_workflow", request)
            .await?;

        // Some workflow deployments answer with an empty body
        let bytes = response.bytes().await.map_err(|source| ClientError::Network {
            platform: Platform::N8n,
            source,
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonValue::Null);
        }
        serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode {
            platform: Platform::N8n,
            source,
        })
    }

    async fn send_webhook(&self, path: &str, data: &JsonValue) -> Result<(), ClientError> {
        let url = self.webhook_url(path)?;
        debug!(path, "Sending webhook");

        self.send(Platform::N8n, "send_webhook", self.http.post(url).json(data))
            .await?;
        Ok(())
    }
}
