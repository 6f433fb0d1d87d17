//! Client for the REST API served by `bw serve`.

use super::exchange::{HttpExchange, LoggingExchange};
use super::{ObjectClient, TransportCapabilities, require_id};
use crate::envelope::{decode, decode_ack, decode_list, decode_status};
use crate::error::BwError;
use crate::filter::{ListFilter, to_query};
use crate::models::{MessageResult, Object, ObjectType, Status};
use crate::retry::{RetryPolicy, once};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TRANSPORT: &str = "rest";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENDPOINT_ENV: &str = "BW_SERVE_URL";
pub const DEBUG_HTTP_ENV: &str = "BW_DEBUG_HTTP";

pub struct RestClientBuilder {
    endpoint: Option<String>,
    timeout: Duration,
    retry_policy: RetryPolicy,
    debug_logging: Option<bool>,
    cancellation: Option<CancellationToken>,
    exchange: Option<Arc<dyn HttpExchange>>,
}

impl Default for RestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RestClientBuilder {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            debug_logging: None,
            cancellation: None,
            exchange: None,
        }
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Wrap the exchange in [`LoggingExchange`]
    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = Some(enabled);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Replace the underlying HTTP exchange; the timeout no longer applies.
    /// Debug logging still wraps it.
    pub fn exchange(mut self, exchange: Arc<dyn HttpExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn build(self) -> Result<RestClient, BwError> {
        let endpoint = self
            .endpoint
            .or_else(|| std::env::var(ENDPOINT_ENV).ok())
            .ok_or_else(|| BwError::Config(format!("{ENDPOINT_ENV} not set")))?;

        let endpoint = Url::parse(&endpoint)
            .map_err(|e| BwError::Config(format!("Invalid endpoint {endpoint}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(BwError::Config(format!("Invalid endpoint {endpoint}")));
        }

        let debug_logging = self.debug_logging.unwrap_or_else(|| {
            std::env::var(DEBUG_HTTP_ENV).is_ok_and(|v| v.parse().unwrap_or_default())
        });

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("bw-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BwError::Config(format!("Failed to build HTTP client: {e}")))?;

        let inner: Arc<dyn HttpExchange> = match self.exchange {
            Some(custom) => custom,
            None => Arc::new(http.clone()),
        };
        let exchange: Arc<dyn HttpExchange> = if debug_logging {
            Arc::new(LoggingExchange::new(inner))
        } else {
            inner
        };

        Ok(RestClient {
            endpoint,
            http,
            exchange,
            retry: self.retry_policy,
            cancel: self.cancellation.unwrap_or_default(),
        })
    }
}

#[derive(Serialize)]
struct UnlockRequest<'a> {
    password: &'a str,
}

pub struct RestClient {
    endpoint: Url,
    http: reqwest::Client,
    exchange: Arc<dyn HttpExchange>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl RestClient {
    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::new()
    }

    pub fn from_env() -> Result<Self, BwError> {
        RestClientBuilder::new().build()
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        // cannot-be-a-base endpoints are rejected by the builder
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn object_url(&self, object: &Object) -> Result<Url, BwError> {
        let id = require_id(object)?;
        Ok(self.url(&["object", object.object.as_str(), id]))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), BwError> {
        let request = request.build()?;
        let response = self.exchange.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }

    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, BwError> {
        self.send(request).await.map(|(_, body)| body)
    }
}

#[async_trait]
impl ObjectClient for RestClient {
    fn transport(&self) -> &'static str {
        TRANSPORT
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            delete_reports_not_found: false,
            distinguishes_missing_attachment: true,
        }
    }

    async fn create_object(&self, object: &Object) -> Result<Object, BwError> {
        tracing::debug!(object_type = %object.object, "Creating object");
        let url = self.url(&["object", object.object.as_str()]);

        self.retry
            .run("create_object", &self.cancel, || async {
                let body = self.fetch(self.http.post(url.clone()).json(object)).await?;
                decode(&body)
            })
            .await
    }

    async fn edit_object(&self, object: &Object) -> Result<Object, BwError> {
        tracing::debug!(object_type = %object.object, object_id = %object.id, "Editing object");
        let url = self.object_url(object)?;

        self.retry
            .run("edit_object", &self.cancel, || async {
                let body = self.fetch(self.http.put(url.clone()).json(object)).await?;
                decode(&body).map_err(BwError::recognize_not_found)
            })
            .await
    }

    async fn get_object(&self, object: &Object) -> Result<Object, BwError> {
        tracing::debug!(object_type = %object.object, object_id = %object.id, "Getting object");
        let url = self.object_url(object)?;

        self.retry
            .run("get_object", &self.cancel, || async {
                let body = self.fetch(self.http.get(url.clone())).await?;
                decode(&body).map_err(BwError::recognize_not_found)
            })
            .await
    }

    async fn delete_object(&self, object: &Object) -> Result<(), BwError> {
        tracing::debug!(object_type = %object.object, object_id = %object.id, "Deleting object");
        let url = self.object_url(object)?;

        once(&self.cancel, async {
            let body = self.fetch(self.http.delete(url)).await?;
            decode_ack(&body)
        })
        .await
    }

    async fn list_objects(
        &self,
        object_type: ObjectType,
        filters: &[ListFilter],
    ) -> Result<Vec<Object>, BwError> {
        tracing::debug!(object_type = %object_type, filters = filters.len(), "Listing objects");
        let url = self.url(&["list", "object", object_type.plural()]);
        let query = to_query(filters);

        self.retry
            .run("list_objects", &self.cancel, || async {
                let body = self
                    .fetch(self.http.get(url.clone()).query(&query))
                    .await?;
                decode_list(&body)
            })
            .await
    }

    async fn create_attachment(
        &self,
        item_id: &str,
        file_path: &Path,
    ) -> Result<Object, BwError> {
        tracing::debug!(item_id, "Creating attachment");
        let content = tokio::fs::read(file_path).await?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                BwError::InvalidObject(format!("{} has no file name", file_path.display()))
            })?;
        let url = self.url(&["attachment"]);

        self.retry
            .run("create_attachment", &self.cancel, || async {
                let part = reqwest::multipart::Part::bytes(content.clone())
                    .file_name(file_name.clone());
                let form = reqwest::multipart::Form::new().part("file", part);
                let request = self
                    .http
                    .post(url.clone())
                    .query(&[("itemid", item_id)])
                    .multipart(form);
                let body = self.fetch(request).await?;
                decode(&body)
            })
            .await
    }

    async fn get_attachment(
        &self,
        item_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, BwError> {
        tracing::debug!(item_id, attachment_id, "Getting attachment");
        let url = self.url(&["object", "attachment", attachment_id]);

        self.retry
            .run("get_attachment", &self.cancel, || async {
                let request = self
                    .http
                    .get(url.clone())
                    .query(&[("itemid", item_id)]);
                let (status, body) = self.send(request).await?;

                if status == StatusCode::NOT_FOUND {
                    return Err(BwError::AttachmentNotFound);
                }
                if !status.is_success() {
                    return Err(match decode_ack(&body) {
                        Err(e @ BwError::Backend { .. }) => e,
                        _ => BwError::Transport(format!("Unexpected status {status}")),
                    });
                }
                Ok(body)
            })
            .await
    }

    async fn delete_attachment(&self, item_id: &str, attachment_id: &str) -> Result<(), BwError> {
        tracing::debug!(item_id, attachment_id, "Deleting attachment");
        let url = self.url(&["object", "attachment", attachment_id]);

        once(&self.cancel, async {
            let request = self.http.delete(url).query(&[("itemid", item_id)]);
            let body = self.fetch(request).await?;
            decode_ack(&body)
        })
        .await
    }

    async fn unlock(&self, password: &str) -> Result<(), BwError> {
        tracing::debug!("Unlocking vault");
        let url = self.url(&["unlock"]);

        once(&self.cancel, async {
            let request = self.http.post(url).json(&UnlockRequest { password });
            let body = self.fetch(request).await?;
            decode::<MessageResult>(&body).map(|_| ())
        })
        .await
    }

    async fn login_with_password(&self, _username: &str, _password: &str) -> Result<(), BwError> {
        Err(unsupported("login"))
    }

    async fn login_with_api_key(
        &self,
        _password: &str,
        _client_id: &str,
        _client_secret: &str,
    ) -> Result<(), BwError> {
        Err(unsupported("login"))
    }

    async fn logout(&self) -> Result<(), BwError> {
        Err(unsupported("logout"))
    }

    async fn set_server(&self, _url: &str) -> Result<(), BwError> {
        Err(unsupported("switching servers"))
    }

    async fn sync(&self) -> Result<(), BwError> {
        tracing::debug!("Syncing vault");
        let url = self.url(&["sync"]);

        once(&self.cancel, async {
            let body = self.fetch(self.http.request(Method::POST, url)).await?;
            decode_ack(&body)
        })
        .await
    }

    async fn status(&self) -> Result<Status, BwError> {
        tracing::debug!("Getting status");
        let url = self.url(&["status"]);

        self.retry
            .run("status", &self.cancel, || async {
                let body = self.fetch(self.http.get(url.clone())).await?;
                decode_status(&body)
            })
            .await
    }

    fn session_key(&self) -> String {
        // `bw serve` holds the session itself
        String::new()
    }

    fn set_session_key(&self, _key: &str) {}
}

fn unsupported(operation: &'static str) -> BwError {
    BwError::Unsupported {
        operation,
        transport: TRANSPORT,
    }
}
