use async_trait::async_trait;
use std::sync::Arc;

/// One HTTP request/response exchange.
///
/// `RestClient` sends every request through this seam so decorators can be
/// composed at build time instead of patching a global client.
#[async_trait]
pub trait HttpExchange: Send + Sync {
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error>;
}

#[async_trait]
impl HttpExchange for reqwest::Client {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, reqwest::Error> {
        reqwest::Client::execute(self, request).await
    }
}

#[async_trait]
impl<T: HttpExchange + ?Sized> HttpExchange for Arc<T> {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, reqwest::Error> {
        (**self).execute(request).await
    }
}

/// Logs method, URL and status of each exchange at debug level. Bodies are never logged.
pub struct LoggingExchange<E> {
    inner: E,
}

impl<E> LoggingExchange<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<E: HttpExchange> HttpExchange for LoggingExchange<E> {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, reqwest::Error> {
        tracing::debug!(method = %request.method(), url = %request.url(), "Request");

        let response = self.inner.execute(request).await?;

        tracing::debug!(status = %response.status(), "Response");
        Ok(response)
    }
}
