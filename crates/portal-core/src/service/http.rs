use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::NotificationService;
use crate::config::ServiceConfig;
use crate::constants::routes;
use crate::error::ServiceError;
use crate::models::{NotificationEntry, NotificationId};

#[derive(Debug, Deserialize)]
struct UnreadCountResponse {
    count: u64,
}

/// Notification service reached over JSON/HTTP.
#[derive(Debug, Clone)]
pub struct HttpNotificationService {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpNotificationService {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ServiceError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::InvalidUrl(config.base_url.clone()));
        }

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ServiceError> {
        let bytes = Self::send(builder).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl NotificationService for HttpNotificationService {
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<NotificationEntry>, ServiceError> {
        let url = self.endpoint(routes::NOTIFICATIONS.split('/'));
        let builder = self
            .request(Method::GET, url)
            .query(&[("limit", limit), ("offset", offset)]);
        Self::send_json(builder).await
    }

    async fn unread_count(&self) -> Result<u64, ServiceError> {
        let url = self.endpoint(routes::UNREAD_COUNT.split('/'));
        let response: UnreadCountResponse = Self::send_json(self.request(Method::GET, url)).await?;
        Ok(response.count)
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), ServiceError> {
        let url = self.endpoint(
            routes::NOTIFICATIONS
                .split('/')
                .chain([id.as_str(), routes::MARK_READ_SUFFIX]),
        );
        Self::send(self.request(Method::PATCH, url)).await?;
        Ok(())
    }
}
