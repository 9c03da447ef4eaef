use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CfError {
    #[error("authentication failed at all endpoints (tried: {})", .tried.join(", "))]
    Authentication { tried: Vec<String> },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: StatusCode },
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{url} did not advertise an authorization endpoint")]
    MissingAuthorizationEndpoint { url: String },
    #[error("historical usage report unavailable: {0}")]
    HistoricalReportUnavailable(String),
    #[error("failed to collect usage for org {org}: {source}")]
    PerOrgCollection {
        org: String,
        #[source]
        source: Box<CfError>,
    },
    #[error("configuration error: {0}")]
    Config(String),
}

impl CfError {
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        CfError::Transport {
            url: url.into(),
            source,
        }
    }

    pub fn parse(what: &'static str, source: serde_json::Error) -> Self {
        CfError::Parse { what, source }
    }

    pub fn per_org(org: impl Into<String>, source: CfError) -> Self {
        CfError::PerOrgCollection {
            org: org.into(),
            source: Box::new(source),
        }
    }

    /// True when the upstream answered 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            CfError::Status { status, .. } => *status == StatusCode::NOT_FOUND,
            CfError::PerOrgCollection { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

pub type CfResult<T> = Result<T, CfError>;

/// Errors surfaced by the HTTP endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No data available")]
    Unavailable,
    #[error("{0}")]
    Message(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Message(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(?self, %status, "request failed");
        (status, self.to_string()).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_error_lists_endpoints() {
        let err = CfError::Authentication {
            tried: vec![
                "https://uaa.sys.example.com/oauth/token".to_string(),
                "https://api.sys.example.com/uaa/oauth/token".to_string(),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("uaa.sys.example.com/oauth/token"));
        assert!(message.contains("api.sys.example.com/uaa/oauth/token"));
    }

    #[test]
    fn not_found_is_detected_through_per_org_wrapper() {
        let inner = CfError::Status {
            url: "https://api.example.com/v3/organizations/abc/usage_summary".to_string(),
            status: StatusCode::NOT_FOUND,
        };
        assert!(inner.is_not_found());
        let wrapped = CfError::per_org("org-a", inner);
        assert!(wrapped.is_not_found());
        assert!(!CfError::Config("missing".into()).is_not_found());
    }

    #[test]
    fn unavailable_maps_to_503() {
        let response = ApiError::Unavailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
