//! Voice access token API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::{api_client, ApiClient};
use crate::error::SoftphoneError;

#[derive(Debug, Clone, Serialize)]
pub struct VoiceTokenRequest<'a> {
    pub identity: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceTokenResponse {
    pub token: String,
}

/// Source of short-lived voice credentials for an agent identity
#[async_trait(?Send)]
pub trait TokenFetcher {
    async fn fetch_token(&self, identity: &str) -> Result<String, SoftphoneError>;
}

/// Fetches tokens from `POST {API_BASE}/voice/token`.
///
/// No retries and no caching: every call is one request.
#[derive(Clone)]
pub struct HttpTokenFetcher {
    client: ApiClient,
}

impl HttpTokenFetcher {
    pub fn new(client: ApiClient) -> Self {
        HttpTokenFetcher { client }
    }
}

impl Default for HttpTokenFetcher {
    fn default() -> Self {
        HttpTokenFetcher::new(api_client().clone())
    }
}

#[async_trait(?Send)]
impl TokenFetcher for HttpTokenFetcher {
    async fn fetch_token(&self, identity: &str) -> Result<String, SoftphoneError> {
        let response: VoiceTokenResponse = self
            .client
            .post("/voice/token", &VoiceTokenRequest { identity })
            .await
            .map_err(|e| {
                tracing::error!("Voice token request for {} failed: {}", identity, e);
                SoftphoneError::from(e)
            })?;
        Ok(response.token)
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_token_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/voice/token"))
            .and(body_json(serde_json::json!({ "identity": "agent1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "abc.def" })))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpTokenFetcher::new(ApiClient::new(&server.uri()));
        let token = fetcher.fetch_token("agent1").await.unwrap();
        assert_eq!(token, "abc.def");
    }

    #[tokio::test]
    async fn test_fetch_token_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/voice/token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = HttpTokenFetcher::new(ApiClient::new(&server.uri()));
        let err = fetcher.fetch_token("agent1").await.unwrap_err();
        match err {
            SoftphoneError::TokenRequest(msg) => assert!(msg.contains("500"), "unexpected message: {}", msg),
            other => panic!("expected TokenRequest, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_token_unparsable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/voice/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let fetcher = HttpTokenFetcher::new(ApiClient::new(&server.uri()));
        let result = fetcher.fetch_token("agent1").await;
        assert!(matches!(result, Err(SoftphoneError::TokenRequest(_))));
    }

    #[tokio::test]
    async fn test_fetch_token_no_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/voice/token"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpTokenFetcher::new(ApiClient::new(&server.uri()));
        assert!(fetcher.fetch_token("agent1").await.is_err());
        // MockServer verifies the expectation of a single request on drop
    }
}
