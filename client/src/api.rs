//! HTTP client for the rule-set REST API.
//!
//! | Operation            | Method | Path                      |
//! |----------------------|--------|---------------------------|
//! | list rule sets       | GET    | `/rulesets?page=N&count=N`|
//! | rule set detail      | GET    | `/ruleset/{uuid}`         |
//! | batch detail refresh | POST   | `/rulesets/detail`        |
//!
//! Every response, including a failed send, is handed to the
//! [`ResponseDecoder`] as a [`RawResponse`]. HTTP status never short-circuits
//! decoding.

use crate::config::{Config, ConfigError};
use crate::error::{ClientError, Result};
use reqwest::{RequestBuilder, Url};
use rulesync_engine::{RawResponse, ResponseDecoder, RuleSet};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Page requested when the caller does not pick one.
pub const DEFAULT_PAGE: u32 = 1;
/// Page size requested when the caller does not pick one.
pub const DEFAULT_COUNT: u32 = 20;

/// Per-call cancellation and deadline.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Cancelling this token aborts the request with [`ClientError::Cancelled`]
    pub cancel: CancellationToken,
    /// Elapsing this turns into a transport failure
    pub deadline: Option<Duration>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[derive(Serialize)]
struct DetailRequest<'a> {
    uuids: &'a [String],
}

/// Client for the remote rule-set service.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: Url,
    decoder: ResponseDecoder,
}

impl RemoteClient {
    /// Build a client for `config.base_url`.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(config.base_url.clone()).into());
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            decoder: ResponseDecoder::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET `/rulesets?page=N&count=N`.
    pub async fn get_rule_sets(
        &self,
        page: u32,
        count: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<RuleSet>> {
        tracing::debug!(page, count, "Fetching rule set list");

        let request = self
            .http
            .get(self.endpoint(&["rulesets"])?)
            .query(&[("page", page), ("count", count)]);
        let raw = self.execute(request, ctx).await?;
        Ok(self.decoder.decode_array(&raw)?)
    }

    /// GET `/ruleset/{uuid}`.
    pub async fn get_rule_set_detail(&self, uuid: &str, ctx: &RequestContext) -> Result<RuleSet> {
        tracing::debug!(uuid = %uuid, "Fetching rule set detail");

        let request = self.http.get(self.endpoint(&["ruleset", uuid])?);
        let raw = self.execute(request, ctx).await?;
        Ok(self.decoder.decode_object(&raw)?)
    }

    /// POST `/rulesets/detail` with `{"uuids": [...]}`.
    pub async fn update_rule_set_list_detail(
        &self,
        uuids: &[String],
        ctx: &RequestContext,
    ) -> Result<Vec<RuleSet>> {
        tracing::debug!(count = uuids.len(), "Fetching rule set details in batch");

        let request = self
            .http
            .post(self.endpoint(&["rulesets", "detail"])?)
            .json(&DetailRequest { uuids });
        let raw = self.execute(request, ctx).await?;
        Ok(self.decoder.decode_array(&raw)?)
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send the request, honouring the context. Only cancellation is an error
    /// here; everything else becomes a [`RawResponse`].
    async fn execute(&self, request: RequestBuilder, ctx: &RequestContext) -> Result<RawResponse> {
        let fetch = async {
            match ctx.deadline {
                Some(deadline) => tokio::time::timeout(deadline, Self::fetch(request))
                    .await
                    .unwrap_or_else(|_| {
                        RawResponse::transport_failure(format!(
                            "deadline of {:?} elapsed",
                            deadline
                        ))
                    }),
                None => Self::fetch(request).await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                tracing::debug!("Request cancelled");
                Err(ClientError::Cancelled)
            }
            raw = fetch => Ok(raw),
        }
    }

    async fn fetch(request: RequestBuilder) -> RawResponse {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return RawResponse::transport_failure(e.to_string()),
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => RawResponse::new(status, body.to_vec()),
            Err(e) => RawResponse::transport_failure(e.to_string()),
        }
    }
}
