pub mod auth;
pub mod catalog;
pub mod client;
pub mod models;

pub use auth::{candidate_token_endpoints, fallback_token_endpoints, BearerToken};
pub use catalog::{CatalogTables, ReferenceCatalog};
pub use client::{relative_path, CfClient};
pub use models::{
    AppUsageReport, MonthlyReport, Organization, ServiceInstance, ServiceOffering, ServicePlan,
    UsageSummary, YearlyReport,
};
