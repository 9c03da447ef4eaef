use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::config::CfCredentials;
use crate::error::{CfError, CfResult};

use super::auth::{obtain_token, BearerToken};
use super::models::{
    AppUsageReport, Organization, PagedResponse, ServiceInstance, ServiceOffering, ServicePlan,
    UsageSummary, UsageSummaryEnvelope,
};

/// Re-authenticate when the token has less than this left.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

const PAGE_SIZE: u32 = 1000;

/// Bearer-authenticated client for the CF v3 API.
pub struct CfClient {
    http: Client,
    credentials: CfCredentials,
    token: RwLock<Option<BearerToken>>,
}

impl CfClient {
    /// Builds the HTTP client without contacting the platform.
    pub fn new(credentials: CfCredentials) -> CfResult<Self> {
        if credentials.skip_ssl_validation {
            warn!("SSL certificate verification is disabled");
        }
        let http = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .danger_accept_invalid_certs(credentials.skip_ssl_validation)
            .build()
            .map_err(|source| CfError::transport(&credentials.api_endpoint, source))?;
        Ok(Self {
            http,
            credentials,
            token: RwLock::new(None),
        })
    }

    /// Uses an already issued token instead of running the password grant.
    pub fn with_token(credentials: CfCredentials, token: BearerToken) -> CfResult<Self> {
        let client = Self::new(credentials)?;
        Ok(Self {
            token: RwLock::new(Some(token)),
            ..client
        })
    }

    /// Builds the client and obtains the first token.
    pub async fn connect(credentials: CfCredentials) -> CfResult<Self> {
        let client = Self::new(credentials)?;
        client.authenticate().await?;
        Ok(client)
    }

    pub fn api_endpoint(&self) -> &str {
        &self.credentials.api_endpoint
    }

    pub fn app_usage_endpoint(&self) -> String {
        self.credentials
            .app_usage_endpoint
            .clone()
            .unwrap_or_else(|| self.credentials.api_endpoint.replacen("api.", "app-usage.", 1))
    }

    pub async fn authenticate(&self) -> CfResult<()> {
        let token = obtain_token(&self.http, &self.credentials).await?;
        *self.token.write().await = Some(token);
        Ok(())
    }

    /// Re-authenticates when no token is held or it is about to expire.
    pub async fn ensure_token(&self, now: DateTime<Utc>) -> CfResult<()> {
        let needs_refresh = match self.token.read().await.as_ref() {
            Some(token) => token.expires_within(now, Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)),
            None => true,
        };
        if needs_refresh {
            debug!("refreshing CF access token");
            self.authenticate().await?;
        }
        Ok(())
    }

    async fn bearer(&self) -> String {
        self.token
            .read()
            .await
            .as_ref()
            .map(|token| token.access_token.clone())
            .unwrap_or_default()
    }

    async fn get_url<T: DeserializeOwned>(&self, url: &str, what: &'static str) -> CfResult<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(self.bearer().await)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| CfError::transport(url, source))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(CfError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| CfError::transport(url, source))?;
        serde_json::from_str(&body).map_err(|source| CfError::parse(what, source))
    }

    /// GET a path relative to the configured API endpoint.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &'static str) -> CfResult<T> {
        let url = format!("{}{}", self.credentials.api_endpoint, path);
        self.get_url(&url, what).await
    }

    /// Follows `pagination.next.href` until exhausted, returning every page's
    /// resources in page order.
    pub async fn fetch_all_pages(&self, path: &str) -> CfResult<Vec<Value>> {
        let mut resources = Vec::new();
        let mut next = path.to_string();

        while !next.is_empty() && next != "null" {
            let page: PagedResponse = self.get_json(&next, "paginated response").await?;
            let href = page.next_href().map(relative_path);
            resources.extend(page.resources);
            match href {
                Some(href) => next = href,
                None => break,
            }
        }

        Ok(resources)
    }

    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        path: &str,
        what: &'static str,
    ) -> CfResult<Vec<T>> {
        self.fetch_all_pages(path)
            .await?
            .into_iter()
            .map(|resource| serde_json::from_value(resource).map_err(|source| CfError::parse(what, source)))
            .collect()
    }

    pub async fn organizations(&self) -> CfResult<Vec<Organization>> {
        self.fetch_all(&format!("/v3/organizations?per_page={PAGE_SIZE}"), "organization")
            .await
    }

    pub async fn service_plans(&self) -> CfResult<Vec<ServicePlan>> {
        self.fetch_all(&format!("/v3/service_plans?per_page={PAGE_SIZE}"), "service plan")
            .await
    }

    pub async fn service_offerings(&self) -> CfResult<Vec<ServiceOffering>> {
        self.fetch_all(
            &format!("/v3/service_offerings?per_page={PAGE_SIZE}"),
            "service offering",
        )
        .await
    }

    pub async fn service_instances(&self, org_guid: &str) -> CfResult<Vec<ServiceInstance>> {
        self.fetch_all(
            &format!("/v3/service_instances?organization_guids={org_guid}&per_page={PAGE_SIZE}"),
            "service instance",
        )
        .await
    }

    pub async fn usage_summary(&self, org_guid: &str) -> CfResult<UsageSummary> {
        let envelope: UsageSummaryEnvelope = self
            .get_json(
                &format!("/v3/organizations/{org_guid}/usage_summary"),
                "usage summary",
            )
            .await?;
        Ok(envelope.usage_summary)
    }

    /// Fetches the optional app-usage system report.
    pub async fn app_usage_report(&self) -> CfResult<AppUsageReport> {
        let url = format!("{}/system_report/app_usages", self.app_usage_endpoint());
        self.get_url(&url, "app usage report")
            .await
            .map_err(|err| {
                if err.is_not_found() {
                    CfError::HistoricalReportUnavailable(
                        "app-usage service not found (not deployed in this foundation)".to_string(),
                    )
                } else {
                    CfError::HistoricalReportUnavailable(err.to_string())
                }
            })
    }
}

/// Strips scheme and host from an absolute next-page link so the follow-up
/// request is issued against the configured API endpoint.
pub fn relative_path(href: &str) -> String {
    if !href.contains("://") {
        return href.to_string();
    }

    match Url::parse(href) {
        Ok(url) => match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        },
        Err(_) => {
            let parts: Vec<&str> = href.split('/').collect();
            if parts.len() >= 4 {
                format!("/{}", parts[3..].join("/"))
            } else {
                href.to_string()
            }
        }
    }
}
