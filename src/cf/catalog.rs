use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::error::CfResult;

use super::client::CfClient;
use super::models::{ServiceOffering, ServicePlan};

/// Immutable plan/offering lookup tables for one catalog generation.
#[derive(Debug, Default)]
pub struct CatalogTables {
    plans: HashMap<String, ServicePlan>,
    offerings: HashMap<String, ServiceOffering>,
}

impl CatalogTables {
    pub fn new(plans: Vec<ServicePlan>, offerings: Vec<ServiceOffering>) -> Self {
        Self {
            plans: plans
                .into_iter()
                .map(|plan| (plan.guid.clone(), plan))
                .collect(),
            offerings: offerings
                .into_iter()
                .map(|offering| (offering.guid.clone(), offering))
                .collect(),
        }
    }

    pub fn plan(&self, guid: &str) -> Option<&ServicePlan> {
        self.plans.get(guid)
    }

    pub fn offering(&self, guid: &str) -> Option<&ServiceOffering> {
        self.offerings.get(guid)
    }

    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    pub fn offering_count(&self) -> usize {
        self.offerings.len()
    }
}

/// Shared catalog. Loads build a fresh table set and swap it in whole, so
/// readers holding a snapshot keep a consistent view.
#[derive(Debug, Default)]
pub struct ReferenceCatalog {
    tables: RwLock<Option<Arc<CatalogTables>>>,
}

impl ReferenceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paginates plans then offerings and publishes the result. On error the
    /// previous tables stay in place.
    pub async fn load(&self, client: &CfClient) -> CfResult<()> {
        let plans = client.service_plans().await?;
        let offerings = client.service_offerings().await?;
        let tables = CatalogTables::new(plans, offerings);
        info!(
            plans = tables.plan_count(),
            offerings = tables.offering_count(),
            "loaded service catalog"
        );
        self.publish(tables).await;
        Ok(())
    }

    pub async fn publish(&self, tables: CatalogTables) {
        *self.tables.write().await = Some(Arc::new(tables));
    }

    /// Current tables, or `None` before the first successful load.
    pub async fn snapshot(&self) -> Option<Arc<CatalogTables>> {
        self.tables.read().await.clone()
    }
}
