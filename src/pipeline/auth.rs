use reqwest::{Url, blocking::Client};
use serde::Deserialize;

use crate::{config::ApiConfig, error::StreamError};

/// Supplies the short-lived credential a socket session authenticates with.
pub trait TokenSource: Send + Sync {
    fn fetch_token(&self) -> Result<String, StreamError>;
}

#[derive(Debug, Deserialize)]
struct WsTokenResponse {
    ws_token: String,
}

/// Fetches `{ "ws_token": .. }` from the backend API.
#[derive(Debug, Clone)]
pub struct HttpTokenSource {
    client: Client,
    url: String,
}

impl HttpTokenSource {
    pub fn new(api: &ApiConfig) -> Self {
        Self {
            client: Client::new(),
            url: join_url(&api.base_url, &api.token_path),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TokenSource for HttpTokenSource {
    fn fetch_token(&self) -> Result<String, StreamError> {
        let response: WsTokenResponse = self
            .client
            .get(&self.url)
            .send()?
            .error_for_status()?
            .json()?;
        if response.ws_token.is_empty() {
            return Err(StreamError::EmptyToken);
        }
        Ok(response.ws_token)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Socket URL for `endpoint` carrying the token as the `param` query parameter.
pub fn socket_url(endpoint: &str, param: &str, token: &str) -> Result<Url, StreamError> {
    let mut url = Url::parse(endpoint).map_err(|err| StreamError::Url {
        url: endpoint.to_string(),
        reason: err.to_string(),
    })?;
    url.query_pairs_mut().append_pair(param, token);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_url_joins_base_and_path() {
        let api = ApiConfig {
            base_url: "http://localhost:8000/".to_string(),
            token_path: "/auth/ws-token".to_string(),
        };
        assert_eq!(
            HttpTokenSource::new(&api).url(),
            "http://localhost:8000/auth/ws-token"
        );
    }

    #[test]
    fn socket_url_encodes_token() {
        let url = socket_url("ws://localhost:8891", "token", "a b&c").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8891/?token=a+b%26c");

        let url = socket_url("ws://host:1/pose?model=x", "t", "abc").unwrap();
        assert_eq!(url.query(), Some("model=x&t=abc"));
    }

    #[test]
    fn bad_endpoint_is_reported() {
        assert!(matches!(
            socket_url("not a url", "token", "x"),
            Err(StreamError::Url { .. })
        ));
    }

    #[test]
    fn unreachable_api_is_a_token_error() {
        let api = ApiConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            token_path: "/auth/ws-token".to_string(),
        };
        assert!(matches!(
            HttpTokenSource::new(&api).fetch_token(),
            Err(StreamError::Token(_))
        ));
    }
}
