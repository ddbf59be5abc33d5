use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use reel_shared::errors::{AppError, AppResult, TransportError};
use reel_shared::types::{ApiErrorResponse, ApiResponse, Paginated, PaginationParams};

use crate::config::SyncConfig;
use crate::models::Notification;
use crate::services::poll_source::PollSource;

/// Poll source backed by the dashboard REST API.
///
/// Routes (relative to `api_base_url`):
///   GET  /notifications?page=1&per_page=N
///   POST /notifications/{id}/read
///   POST /notifications/mark-all-read
#[derive(Clone)]
pub struct HttpPollSource {
    client: Client,
    base_url: Url,
    token: Option<String>,
    page_size: u64,
}

impl HttpPollSource {
    pub fn new(config: &SyncConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.api_base_url).map_err(|e| {
            AppError::invalid_config(format!("invalid api_base_url '{}': {e}", config.api_base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::invalid_config(format!(
                "api_base_url '{}' cannot be used as a base URL",
                config.api_base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token: config.api_token.clone().filter(|t| !t.is_empty()),
            page_size: config.page_size,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::network("base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejection(response).await);
        }

        let envelope = response
            .json::<ApiResponse<T>>()
            .await
            .map_err(map_reqwest_error)?;

        envelope.into_data().map_err(|message| TransportError::Status {
            status: status.as_u16(),
            code: None,
            message,
        })
    }
}

#[async_trait]
impl PollSource for HttpPollSource {
    async fn fetch_all(&self) -> Result<Vec<Notification>, TransportError> {
        let url = self.endpoint(&["notifications"])?;
        let request = self
            .client
            .get(url)
            .query(&PaginationParams::first_page(self.page_size));

        let page: Paginated<Notification> = self.send(request).await?;

        tracing::debug!(
            fetched = page.items.len(),
            total = page.total,
            "notifications fetched"
        );
        Ok(page.items)
    }

    async fn mark_one_read(&self, id: &str) -> Result<(), TransportError> {
        let url = self.endpoint(&["notifications", id, "read"])?;
        let _: serde_json::Value = self.send(self.client.post(url)).await?;

        tracing::debug!(notification_id = %id, "notification marked read upstream");
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), TransportError> {
        let url = self.endpoint(&["notifications", "mark-all-read"])?;
        let _: serde_json::Value = self.send(self.client.post(url)).await?;

        tracing::debug!("all notifications marked read upstream");
        Ok(())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() {
        TransportError::decode(err.to_string())
    } else {
        TransportError::network(err.to_string())
    }
}

async fn rejection(response: Response) -> TransportError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match ApiErrorResponse::parse(&body) {
        Some(parsed) => TransportError::Status {
            status: status.as_u16(),
            code: Some(parsed.error.code),
            message: parsed.error.message,
        },
        None => TransportError::status(
            status.as_u16(),
            status.canonical_reason().unwrap_or("unexpected status"),
        ),
    }
}
