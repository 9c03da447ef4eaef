use std::collections::HashSet;

use crate::cf::{CatalogTables, ServiceInstance};

/// Offering names metered for billing. Matching is exact and case-sensitive.
pub const DEFAULT_BILLABLE_OFFERINGS: [&str; 9] = [
    "p.mysql",
    "p-mysql",
    "p.rabbitmq",
    "p-rabbitmq",
    "p.redis",
    "p-redis",
    "postgres",
    "genai",
    "genai-service",
];

pub const UNKNOWN_PLAN: &str = "unknown-plan";
pub const UNKNOWN_OFFERING: &str = "unknown-offering";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillableOfferings(HashSet<String>);

impl BillableOfferings {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, offering_name: &str) -> bool {
        self.0.contains(offering_name)
    }
}

impl Default for BillableOfferings {
    fn default() -> Self {
        Self::new(DEFAULT_BILLABLE_OFFERINGS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Billable { offering: String },
    /// `reason` is the offering name, or `unknown-plan` / `unknown-offering`
    /// when a catalog lookup missed.
    NotBillable { reason: String },
}

impl Classification {
    pub fn is_billable(&self) -> bool {
        matches!(self, Classification::Billable { .. })
    }

    pub fn label(&self) -> &str {
        match self {
            Classification::Billable { offering } => offering,
            Classification::NotBillable { reason } => reason,
        }
    }
}

/// Resolves instance → plan → offering; any lookup miss is not billable.
pub fn classify(
    instance: &ServiceInstance,
    catalog: &CatalogTables,
    billable: &BillableOfferings,
) -> Classification {
    let Some(plan) = catalog.plan(instance.plan_guid()) else {
        return Classification::NotBillable {
            reason: UNKNOWN_PLAN.to_string(),
        };
    };
    let Some(offering) = catalog.offering(plan.offering_guid()) else {
        return Classification::NotBillable {
            reason: UNKNOWN_OFFERING.to_string(),
        };
    };

    if billable.contains(&offering.name) {
        Classification::Billable {
            offering: offering.name.clone(),
        }
    } else {
        Classification::NotBillable {
            reason: offering.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cf::{ServiceOffering, ServicePlan};
    use serde_json::json;

    fn catalog_with_offering(name: &str) -> CatalogTables {
        let plan: ServicePlan = serde_json::from_value(json!({
            "guid": "plan-1",
            "name": "small",
            "relationships": {"service_offering": {"data": {"guid": "offering-1"}}}
        }))
        .unwrap();
        let offering = ServiceOffering {
            guid: "offering-1".to_string(),
            name: name.to_string(),
        };
        CatalogTables::new(vec![plan], vec![offering])
    }

    fn instance_on(plan_guid: &str) -> ServiceInstance {
        serde_json::from_value(json!({
            "guid": "si-1",
            "name": "db",
            "relationships": {"service_plan": {"data": {"guid": plan_guid}}}
        }))
        .unwrap()
    }

    fn classify_offering(name: &str) -> Classification {
        classify(
            &instance_on("plan-1"),
            &catalog_with_offering(name),
            &BillableOfferings::default(),
        )
    }

    #[test]
    fn billable_offering_table() {
        assert!(classify_offering("p-mysql").is_billable());
        assert!(classify_offering("p.mysql").is_billable());
        assert!(classify_offering("genai-service").is_billable());
        assert!(classify_offering("postgres").is_billable());
        assert!(!classify_offering("mysql").is_billable());
        assert!(!classify_offering("P-MYSQL").is_billable());
        assert!(!classify_offering("user-provided").is_billable());
    }

    #[test]
    fn unknown_plan_is_not_billable() {
        let result = classify(
            &instance_on("missing-plan"),
            &catalog_with_offering("p-mysql"),
            &BillableOfferings::default(),
        );
        assert_eq!(
            result,
            Classification::NotBillable {
                reason: UNKNOWN_PLAN.to_string()
            }
        );
    }

    #[test]
    fn unknown_offering_is_not_billable() {
        let plan: ServicePlan = serde_json::from_value(json!({
            "guid": "plan-1",
            "name": "small",
            "relationships": {"service_offering": {"data": {"guid": "gone"}}}
        }))
        .unwrap();
        let catalog = CatalogTables::new(vec![plan], vec![]);
        let result = classify(
            &instance_on("plan-1"),
            &catalog,
            &BillableOfferings::default(),
        );
        assert_eq!(result.label(), UNKNOWN_OFFERING);
        assert!(!result.is_billable());
    }

    #[test]
    fn custom_billable_set_replaces_defaults() {
        let billable = BillableOfferings::new(["mysql"]);
        let result = classify(
            &instance_on("plan-1"),
            &catalog_with_offering("mysql"),
            &billable,
        );
        assert!(result.is_billable());
        assert!(!billable.contains("p-mysql"));
        assert_eq!(
            BillableOfferings::default(),
            BillableOfferings::new(DEFAULT_BILLABLE_OFFERINGS)
        );
    }
}
