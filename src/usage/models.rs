use serde::{Deserialize, Serialize};

/// Per-organization counts for an org outside the skip set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUsage {
    pub name: String,
    #[serde(rename = "ais")]
    pub app_instances: u64,
    #[serde(rename = "sis")]
    pub service_instances: u64,
    #[serde(rename = "billable_sis")]
    pub billable_service_instances: u64,
}

/// Outcome of one collection run. Never mutated after construction; the
/// cache shares it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organizations: Vec<OrgUsage>,
    /// Includes skipped orgs.
    #[serde(rename = "total_ais")]
    pub total_app_instances: u64,
    /// Excludes skipped orgs.
    #[serde(rename = "total_billable_ais")]
    pub total_billable_app_instances: u64,
    #[serde(rename = "total_sis")]
    pub total_service_instances: u64,
    #[serde(rename = "total_billable_sis")]
    pub total_billable_service_instances: u64,
    #[serde(rename = "monthly_max_billable_ais")]
    pub monthly_max_billable_app_instances: u64,
    #[serde(rename = "yearly_max_billable_ais")]
    pub yearly_max_billable_app_instances: u64,
}

impl AggregateResult {
    /// Checks the relations that hold between the totals and the per-org list.
    pub fn is_consistent(&self) -> bool {
        let org_apps: u64 = self.organizations.iter().map(|org| org.app_instances).sum();
        let org_billable: u64 = self
            .organizations
            .iter()
            .map(|org| org.billable_service_instances)
            .sum();

        self.total_app_instances >= self.total_billable_app_instances
            && self.total_service_instances >= self.total_billable_service_instances
            && org_apps <= self.total_billable_app_instances
            && org_billable == self.total_billable_service_instances
            && self
                .organizations
                .iter()
                .all(|org| org.billable_service_instances <= org.service_instances)
    }
}
