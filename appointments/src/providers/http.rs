//! HTTP/JSON adapters for the external collaborators.
//!
//! - `GET  {identity}/users/{id}`        → [`UserProfile`], 404 when absent
//! - `GET  {registry}/events/{id}`       → [`EventSummary`], 404 when absent
//! - `POST {notifications}/notifications` with a [`Notification`] body
//!
//! 5xx, 429 and transport failures are [`ProviderError::Unavailable`] (retryable);
//! any other non-success status is [`ProviderError::Rejected`].

use super::{
    EventRegistry, EventSummary, IdentityLookup, Notification, NotificationDispatcher,
    ProviderError, UserProfile,
};
use crate::types::{EventId, UserId};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

/// Base URL plus a shared connection pool
#[derive(Clone, Debug)]
struct Endpoint {
    client: Client,
    base: Url,
}

impl Endpoint {
    fn new(client: Client, base_url: &str) -> Result<Self, ProviderError> {
        let base = Url::parse(base_url)
            .map_err(|e| ProviderError::Malformed(format!("invalid base url '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ProviderError::Malformed(format!(
                "invalid base url '{base_url}': cannot be a base"
            )));
        }
        Ok(Self { client, base })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ProviderError::Malformed(format!("cannot extend url {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_optional<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>, ProviderError> {
        let url = self.url(segments)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| ProviderError::Malformed(e.to_string())),
            _ => Err(failure(response).await),
        }
    }
}

async fn failure(response: Response) -> ProviderError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::Unavailable(format!("{status}: {message}"))
    } else {
        ProviderError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

/// Identity lookup over HTTP
#[derive(Clone, Debug)]
pub struct HttpIdentityLookup {
    endpoint: Endpoint,
}

impl HttpIdentityLookup {
    /// Client for the identity service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Malformed`] if `base_url` is not an absolute URL.
    pub fn new(client: Client, base_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: Endpoint::new(client, base_url)?,
        })
    }
}

impl IdentityLookup for HttpIdentityLookup {
    async fn get_user(&self, id: &UserId) -> Result<Option<UserProfile>, ProviderError> {
        self.endpoint.get_optional(&["users", id.as_str()]).await
    }
}

/// Event registry over HTTP
#[derive(Clone, Debug)]
pub struct HttpEventRegistry {
    endpoint: Endpoint,
}

impl HttpEventRegistry {
    /// Client for the event registry at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Malformed`] if `base_url` is not an absolute URL.
    pub fn new(client: Client, base_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: Endpoint::new(client, base_url)?,
        })
    }
}

impl EventRegistry for HttpEventRegistry {
    async fn get_event(&self, id: &EventId) -> Result<Option<EventSummary>, ProviderError> {
        self.endpoint.get_optional(&["events", id.as_str()]).await
    }
}

/// Notification dispatcher over HTTP
#[derive(Clone, Debug)]
pub struct HttpNotificationDispatcher {
    endpoint: Endpoint,
}

impl HttpNotificationDispatcher {
    /// Client for the notification service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Malformed`] if `base_url` is not an absolute URL.
    pub fn new(client: Client, base_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: Endpoint::new(client, base_url)?,
        })
    }
}

impl NotificationDispatcher for HttpNotificationDispatcher {
    async fn notify(&self, notification: &Notification) -> Result<(), ProviderError> {
        let url = self.endpoint.url(&["notifications"])?;
        let response = self
            .endpoint
            .client
            .post(url)
            .json(notification)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(failure(response).await)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_url_escapes_ids_and_keeps_base_path() {
        let endpoint = Endpoint::new(Client::new(), "http://identity.local/api/").unwrap();
        let url = endpoint.url(&["users", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://identity.local/api/users/a%2Fb%20c");
    }

    #[test]
    fn test_rejects_relative_base_url() {
        assert!(matches!(
            HttpEventRegistry::new(Client::new(), "events.local"),
            Err(ProviderError::Malformed(_))
        ));
        assert!(HttpEventRegistry::new(Client::new(), "mailto:ops@example.com").is_err());
    }
}
