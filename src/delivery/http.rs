use async_trait::async_trait;
use url::Url;

use crate::config::ClientConfig;
use crate::delivery::retry::Transport;
use crate::error::{DeliveryError, Result};

/// HTTP transport for the collector's events endpoint.
///
/// One `send` posts one pre-serialized `{"events":[...]}` body. Success is
/// any 2xx; 429 and 5xx are classified retryable, other 4xx terminal.
pub(crate) struct CollectorTransport {
    client: reqwest::Client,
    events_url: Url,
    api_key: String,
}

impl CollectorTransport {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let base = Url::parse(config.base_url())
            .map_err(|e| crate::error::TracepipeError::Config(format!("invalid base_url: {e}")))?;
        let events_url = base
            .join("v1/events")
            .map_err(|e| crate::error::TracepipeError::Config(format!("invalid events url: {e}")))?;

        Ok(Self {
            client,
            events_url,
            api_key: config.api_key().to_string(),
        })
    }
}

#[async_trait]
impl Transport for CollectorTransport {
    async fn send(&self, payload: &[u8]) -> std::result::Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.events_url.clone())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .body(payload.to_vec())
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                Err(DeliveryError::from_status(status, body))
            }
            Err(e) => Err(DeliveryError::network(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_transport(base_url: &str) -> CollectorTransport {
        let config = ClientConfig::builder()
            .api_key("secret-token")
            .project_id("proj")
            .base_url(base_url)
            .build();
        CollectorTransport::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_posts_events_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/events"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_partial_json(serde_json::json!({"events": []})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = make_transport(&server.uri());
        let result = transport.send(b"{\"events\":[]}").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_5xx_classified_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
            .mount(&server)
            .await;

        let transport = make_transport(&server.uri());
        let err = transport.send(b"{\"events\":[]}").await.unwrap_err();
        assert_eq!(err.status, Some(503));
        assert!(err.retryable);
        assert!(err.message.contains("try later"));
    }

    #[tokio::test]
    async fn test_4xx_classified_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transport = make_transport(&server.uri());
        let err = transport.send(b"{\"events\":[]}").await.unwrap_err();
        assert_eq!(err.status, Some(401));
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Nothing listens on this port.
        let transport = make_transport("http://127.0.0.1:9");
        let err = transport.send(b"{\"events\":[]}").await.unwrap_err();
        assert!(err.status.is_none());
        assert!(err.retryable);
    }
}
