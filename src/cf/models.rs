use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope shared by every paginated v3 collection.
#[derive(Debug, Clone, Deserialize)]
pub struct PagedResponse {
    #[serde(default)]
    pub resources: Vec<Value>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub next: Option<Link>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: Option<String>,
}

impl PagedResponse {
    /// The advertised next page, if any. A JSON `null`, missing link and empty
    /// href all end pagination.
    pub fn next_href(&self) -> Option<&str> {
        self.pagination
            .next
            .as_ref()
            .and_then(|link| link.href.as_deref())
            .filter(|href| !href.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationshipData {
    #[serde(default)]
    pub guid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<RelationshipData>,
}

impl Relationship {
    pub fn guid(&self) -> &str {
        self.data.as_ref().map(|data| data.guid.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Organization {
    pub name: String,
    pub guid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceInstanceRelationships {
    #[serde(default)]
    pub service_plan: Relationship,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInstance {
    pub guid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub relationships: ServiceInstanceRelationships,
}

impl ServiceInstance {
    pub fn plan_guid(&self) -> &str {
        self.relationships.service_plan.guid()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicePlanRelationships {
    #[serde(default)]
    pub service_offering: Relationship,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicePlan {
    pub guid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub relationships: ServicePlanRelationships,
}

impl ServicePlan {
    pub fn offering_guid(&self) -> &str {
        self.relationships.service_offering.guid()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceOffering {
    pub guid: String,
    pub name: String,
}

/// Point-in-time counts returned by `/v3/organizations/:guid/usage_summary`.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct UsageSummary {
    #[serde(default)]
    pub started_instances: u64,
    #[serde(default)]
    pub service_instances: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UsageSummaryEnvelope {
    pub usage_summary: UsageSummary,
}

/// Body of the app-usage service's `/system_report/app_usages`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppUsageReport {
    #[serde(default)]
    pub report_time: Option<String>,
    #[serde(default)]
    pub monthly_reports: Vec<MonthlyReport>,
    #[serde(default)]
    pub yearly_reports: Vec<YearlyReport>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonthlyReport {
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub average_app_instances: f64,
    #[serde(default)]
    pub maximum_app_instances: u64,
    #[serde(default)]
    pub app_instance_hours: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YearlyReport {
    pub year: i32,
    #[serde(default)]
    pub average_app_instances: f64,
    #[serde(default)]
    pub maximum_app_instances: u64,
    #[serde(default)]
    pub app_instance_hours: f64,
}

impl AppUsageReport {
    pub fn monthly_max(&self, year: i32, month: u32) -> u64 {
        self.monthly_reports
            .iter()
            .find(|report| report.month == month && report.year == year)
            .map(|report| report.maximum_app_instances)
            .unwrap_or(0)
    }

    pub fn yearly_max(&self, year: i32) -> u64 {
        self.yearly_reports
            .iter()
            .find(|report| report.year == year)
            .map(|report| report.maximum_app_instances)
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiInfo {
    #[serde(default)]
    pub authorization_endpoint: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}
