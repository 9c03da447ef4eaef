use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::config::CfCredentials;
use crate::error::{CfError, CfResult};

use super::models::{ApiInfo, TokenResponse};

const TOKEN_SUFFIX: &str = "/oauth/token";

/// Bearer token obtained through the password grant.
#[derive(Clone)]
pub struct BearerToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl BearerToken {
    pub fn new(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Tokens without an advertised lifetime never expire from our side.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - margin <= now,
            None => false,
        }
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoints tried when `/v2/info` does not advertise one, in order.
pub fn fallback_token_endpoints(api_endpoint: &str) -> Vec<String> {
    let api = api_endpoint.trim_end_matches('/');
    vec![
        format!("{}{TOKEN_SUFFIX}", api.replacen("api.", "uaa.", 1)),
        format!("{api}/uaa{TOKEN_SUFFIX}"),
        format!("{api}{TOKEN_SUFFIX}"),
    ]
}

/// Discovered endpoint wins outright; otherwise the fallback list is used.
pub fn candidate_token_endpoints(api_endpoint: &str, discovered: Option<String>) -> Vec<String> {
    match discovered {
        Some(endpoint) => vec![endpoint],
        None => fallback_token_endpoints(api_endpoint),
    }
}

pub(crate) async fn discover_token_endpoint(http: &Client, api_endpoint: &str) -> CfResult<String> {
    let url = format!("{}/v2/info", api_endpoint.trim_end_matches('/'));
    let response = http
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|source| CfError::transport(&url, source))?;

    if response.status() != StatusCode::OK {
        return Err(CfError::Status {
            url,
            status: response.status(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|source| CfError::transport(&url, source))?;
    let info: ApiInfo =
        serde_json::from_str(&body).map_err(|source| CfError::parse("api info", source))?;

    let authorization = info.authorization_endpoint.trim_end_matches('/');
    if authorization.is_empty() {
        return Err(CfError::MissingAuthorizationEndpoint { url });
    }

    let token_endpoint = format!("{authorization}{TOKEN_SUFFIX}");
    info!(%token_endpoint, "discovered OAuth token endpoint");
    Ok(token_endpoint)
}

pub(crate) async fn request_token(
    http: &Client,
    token_url: &str,
    credentials: &CfCredentials,
) -> CfResult<BearerToken> {
    let form = [
        ("grant_type", "password"),
        ("username", credentials.username.as_str()),
        ("password", credentials.password.as_str()),
    ];

    let response = http
        .post(token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
        .form(&form)
        .send()
        .await
        .map_err(|source| CfError::transport(token_url, source))?;

    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        debug!(%token_url, %status, %body, "token request rejected");
        return Err(CfError::Status {
            url: token_url.to_string(),
            status,
        });
    }

    let body = response
        .text()
        .await
        .map_err(|source| CfError::transport(token_url, source))?;
    let parsed: TokenResponse =
        serde_json::from_str(&body).map_err(|source| CfError::parse("token response", source))?;

    let expires_at = parsed
        .expires_in
        .filter(|seconds| *seconds > 0)
        .map(|seconds| Utc::now() + Duration::seconds(seconds));
    Ok(BearerToken::new(parsed.access_token, expires_at))
}

/// Runs discovery, then walks the candidate endpoints until one issues a token.
pub async fn obtain_token(http: &Client, credentials: &CfCredentials) -> CfResult<BearerToken> {
    let discovered = match discover_token_endpoint(http, &credentials.api_endpoint).await {
        Ok(endpoint) => Some(endpoint),
        Err(err) => {
            warn!(%err, "failed to discover OAuth endpoint, trying fallbacks");
            None
        }
    };

    let candidates = candidate_token_endpoints(&credentials.api_endpoint, discovered);
    let mut tried = Vec::with_capacity(candidates.len());
    for endpoint in candidates {
        debug!(%endpoint, "requesting token");
        match request_token(http, &endpoint, credentials).await {
            Ok(token) => {
                info!(%endpoint, "authenticated via OAuth password grant");
                return Ok(token);
            }
            Err(err) => {
                warn!(%endpoint, %err, "token endpoint failed");
                tried.push(endpoint);
            }
        }
    }

    Err(CfError::Authentication { tried })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn info_without_authorization_endpoint_is_reported_as_such() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/v2/info");
            then.status(200).json_body(json!({"api_version": "2.190.0"}));
        });

        let err = discover_token_endpoint(&Client::new(), &server.base_url())
            .await
            .expect_err("empty info should not yield an endpoint");
        match err {
            CfError::MissingAuthorizationEndpoint { url } => {
                assert_eq!(url, server.url("/v2/info"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn fallbacks_follow_substitution_order() {
        let endpoints = fallback_token_endpoints("https://api.sys.example.com/");
        assert_eq!(
            endpoints,
            vec![
                "https://uaa.sys.example.com/oauth/token".to_string(),
                "https://api.sys.example.com/uaa/oauth/token".to_string(),
                "https://api.sys.example.com/oauth/token".to_string(),
            ]
        );
    }

    #[test]
    fn discovered_endpoint_replaces_fallbacks() {
        let endpoints = candidate_token_endpoints(
            "https://api.sys.example.com",
            Some("https://login.sys.example.com/oauth/token".to_string()),
        );
        assert_eq!(endpoints, vec!["https://login.sys.example.com/oauth/token"]);
    }

    #[test]
    fn token_expiry_honours_margin() {
        let now = Utc::now();
        let token = BearerToken::new("abc", Some(now + Duration::seconds(30)));
        assert!(token.expires_within(now, Duration::seconds(60)));
        assert!(!token.expires_within(now, Duration::seconds(10)));
        assert!(!BearerToken::new("abc", None).expires_within(now, Duration::seconds(60)));
    }

    #[test]
    fn debug_output_hides_token() {
        let token = BearerToken::new("super-secret", None);
        assert!(!format!("{token:?}").contains("super-secret"));
    }
}
