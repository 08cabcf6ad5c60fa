use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sweep_logging::{sweep_debug, sweep_info, sweep_warn};
use url::Url;

use crate::auth::TokenProvider;
use crate::{FailureKind, LabelChange, MessageId, SweepError};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/gmail/v1/users/me";

/// Header the sender address is read from.
const SENDER_HEADER: &str = "From";

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub api_base: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub query: String,
    pub page_size: usize,
    pub label: Option<String>,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListPage {
    pub ids: Vec<MessageId>,
    pub next_page_token: Option<String>,
}

/// The single header value a message is reduced to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMetadata {
    pub id: MessageId,
    pub from: Option<String>,
}

/// The three remote calls the pipeline is built on.
#[async_trait::async_trait]
pub trait MailApi: Send + Sync {
    async fn list_messages(&self, request: &ListRequest) -> Result<ListPage, SweepError>;

    async fn message_metadata(&self, id: &str) -> Result<MessageMetadata, SweepError>;

    /// All-or-nothing for the given IDs.
    async fn batch_modify(&self, ids: &[MessageId], change: &LabelChange)
        -> Result<(), SweepError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchModifyRequest<'a> {
    ids: &'a [MessageId],
    add_label_ids: &'a [String],
    remove_label_ids: &'a [String],
}

/// Gmail REST client authenticated with bearer tokens.
pub struct ReqwestMailApi {
    client: reqwest::Client,
    base: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl ReqwestMailApi {
    pub fn new(settings: ApiSettings, tokens: Arc<dyn TokenProvider>) -> Result<Self, SweepError> {
        let base = Url::parse(&settings.api_base)
            .map_err(|err| SweepError::new(FailureKind::Network, format!("invalid api base: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(SweepError::new(
                FailureKind::Network,
                format!("invalid api base: {}", settings.api_base),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| SweepError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            client,
            base,
            tokens,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `new` rejects cannot-be-a-base URLs, so the segments are always writable.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends the request built by `build`, refreshing the token exactly once on 401.
    async fn send_authorized<F>(&self, build: F) -> Result<reqwest::Response, SweepError>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self.tokens.token().await?;
        let response = build(&token).send().await.map_err(map_reqwest_error)?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        sweep_info!("Access token rejected; refreshing and retrying once");
        self.tokens.invalidate(&token).await;
        let token = self.tokens.token().await?;
        build(&token).send().await.map_err(map_reqwest_error)
    }
}

#[async_trait::async_trait]
impl MailApi for ReqwestMailApi {
    async fn list_messages(&self, request: &ListRequest) -> Result<ListPage, SweepError> {
        let mut url = self.endpoint(&["messages"]);
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("maxResults", &request.page_size.to_string());
            if let Some(label) = &request.label {
                params.append_pair("labelIds", label);
            }
            if let Some(token) = &request.page_token {
                params.append_pair("pageToken", token);
            }
            if !request.query.is_empty() {
                params.append_pair("q", &request.query);
            }
        }

        let response = self
            .send_authorized(|token| self.client.get(url.clone()).bearer_auth(token))
            .await?;
        let body = success_body(response, "list").await?;
        let parsed: ListResponse = parse_json(&body)?;

        Ok(ListPage {
            ids: parsed.messages.into_iter().filter_map(|m| m.id).collect(),
            next_page_token: parsed.next_page_token.filter(|token| !token.is_empty()),
        })
    }

    async fn message_metadata(&self, id: &str) -> Result<MessageMetadata, SweepError> {
        let mut url = self.endpoint(&["messages", id]);
        url.query_pairs_mut()
            .append_pair("format", "metadata")
            .append_pair("metadataHeaders", SENDER_HEADER);

        let response = self
            .send_authorized(|token| self.client.get(url.clone()).bearer_auth(token))
            .await?;
        let body = success_body(response, "get message").await?;
        let parsed: MetadataResponse = parse_json(&body)?;

        let from = parsed
            .payload
            .and_then(|payload| {
                payload
                    .headers
                    .into_iter()
                    .find(|header| header.name == SENDER_HEADER)
            })
            .map(|header| header.value);

        Ok(MessageMetadata {
            id: id.to_string(),
            from,
        })
    }

    async fn batch_modify(
        &self,
        ids: &[MessageId],
        change: &LabelChange,
    ) -> Result<(), SweepError> {
        let url = self.endpoint(&["messages", "batchModify"]);
        let body = serde_json::to_string(&BatchModifyRequest {
            ids,
            add_label_ids: &change.add,
            remove_label_ids: &change.remove,
        })
        .map_err(|err| SweepError::new(FailureKind::InvalidResponse, err.to_string()))?;

        let response = self
            .send_authorized(|token| {
                self.client
                    .post(url.clone())
                    .bearer_auth(token)
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone())
            })
            .await?;
        success_body(response, "batch modify").await?;
        Ok(())
    }
}

async fn success_body(response: reqwest::Response, operation: &str) -> Result<String, SweepError> {
    let status = response.status();
    sweep_debug!("{} {} -> {}", operation, response.url().path(), status);
    let text = response.text().await.map_err(map_reqwest_error)?;
    if !status.is_success() {
        sweep_warn!("{} failed ({}): {}", operation, status.as_u16(), text);
        return Err(SweepError::new(FailureKind::HttpStatus(status.as_u16()), text));
    }
    Ok(text)
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, SweepError> {
    serde_json::from_str(body)
        .map_err(|err| SweepError::new(FailureKind::InvalidResponse, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> SweepError {
    if err.is_timeout() {
        return SweepError::new(FailureKind::Timeout, err.to_string());
    }
    SweepError::new(FailureKind::Network, err.to_string())
}
