use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info, warn};

use crate::cf::{CatalogTables, CfClient, Organization, ReferenceCatalog};
use crate::config::UsageConfig;
use crate::error::{CfError, CfResult};

use super::classify::classify;
use super::models::{AggregateResult, OrgUsage};

/// Anything able to produce a fresh [`AggregateResult`]; the refresh loop
/// only depends on this seam.
#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn collect_usage(&self) -> CfResult<AggregateResult>;
}

pub struct UsageCollector {
    client: Arc<CfClient>,
    catalog: Arc<ReferenceCatalog>,
    config: UsageConfig,
}

#[derive(Debug, Default)]
struct Totals {
    app_instances: u64,
    billable_app_instances: u64,
    service_instances: u64,
    billable_service_instances: u64,
}

impl UsageCollector {
    pub fn new(client: Arc<CfClient>, catalog: Arc<ReferenceCatalog>, config: UsageConfig) -> Self {
        Self {
            client,
            catalog,
            config,
        }
    }

    /// One full collection run. Only organization enumeration is fatal; every
    /// per-org failure is logged and that org contributes nothing further.
    pub async fn collect(&self, now: DateTime<Utc>) -> CfResult<AggregateResult> {
        let catalog = self
            .catalog
            .snapshot()
            .await
            .ok_or_else(|| CfError::Config("reference catalog has not been loaded".to_string()))?;

        let orgs = self.client.organizations().await?;
        debug!(count = orgs.len(), "enumerated organizations");

        let mut totals = Totals::default();
        let mut organizations = Vec::new();

        for org in &orgs {
            debug!(org = %org.name, "processing organization");

            let summary = match self.client.usage_summary(&org.guid).await {
                Ok(summary) => summary,
                Err(err) => {
                    let err = CfError::per_org(&org.name, err);
                    warn!(%err, "failed to get usage summary");
                    continue;
                }
            };

            totals.app_instances += summary.started_instances;
            totals.service_instances += summary.service_instances;

            if self.config.should_skip(&org.name) {
                debug!(org = %org.name, "skipping org for billable counts");
                continue;
            }

            totals.billable_app_instances += summary.started_instances;

            let listed = match self.billable_instances(org, &catalog).await {
                Ok(count) => count,
                Err(err) => {
                    warn!(%err, "failed to get service instances");
                    continue;
                }
            };
            // the summary and the instance listing are separate reads
            let billable = listed.min(summary.service_instances);
            if billable < listed {
                warn!(
                    org = %org.name,
                    billable = listed,
                    service_instances = summary.service_instances,
                    "billable count exceeds usage summary, capping"
                );
            }

            totals.billable_service_instances += billable;
            organizations.push(OrgUsage {
                name: org.name.clone(),
                app_instances: summary.started_instances,
                service_instances: summary.service_instances,
                billable_service_instances: billable,
            });
        }

        let (monthly_max, yearly_max) = self.historical_maxima(now).await;

        Ok(AggregateResult {
            organizations,
            total_app_instances: totals.app_instances,
            total_billable_app_instances: totals.billable_app_instances,
            total_service_instances: totals.service_instances,
            total_billable_service_instances: totals.billable_service_instances,
            monthly_max_billable_app_instances: monthly_max,
            yearly_max_billable_app_instances: yearly_max,
        })
    }

    async fn billable_instances(&self, org: &Organization, catalog: &CatalogTables) -> CfResult<u64> {
        let instances = self
            .client
            .service_instances(&org.guid)
            .await
            .map_err(|err| CfError::per_org(&org.name, err))?;

        let mut billable = 0;
        for instance in &instances {
            let classification = classify(instance, catalog, &self.config.billable_offerings);
            if classification.is_billable() {
                billable += 1;
                debug!(org = %org.name, instance = %instance.name, offering = classification.label(), "billable service instance");
            } else {
                debug!(org = %org.name, instance = %instance.name, reason = classification.label(), "non-billable service instance");
            }
        }
        Ok(billable)
    }

    /// Current month/year maxima from the app-usage service, zero when the
    /// service is absent or the report lacks the period.
    async fn historical_maxima(&self, now: DateTime<Utc>) -> (u64, u64) {
        match self.client.app_usage_report().await {
            Ok(report) => {
                let monthly = report.monthly_max(now.year(), now.month());
                let yearly = report.yearly_max(now.year());
                debug!(monthly, yearly, "historical billable app instance maxima");
                (monthly, yearly)
            }
            Err(err) => {
                debug!(%err, "app usage report not available");
                (0, 0)
            }
        }
    }
}

#[async_trait]
impl UsageSource for UsageCollector {
    async fn collect_usage(&self) -> CfResult<AggregateResult> {
        let now = Utc::now();
        self.client.ensure_token(now).await?;

        if self.config.reload_catalog {
            if let Err(err) = self.catalog.load(&self.client).await {
                warn!(%err, "catalog reload failed, keeping previous tables");
            }
        }

        let result = self.collect(now).await?;
        if self.config.verbose {
            info!(
                total_ais = result.total_app_instances,
                billable_ais = result.total_billable_app_instances,
                total_sis = result.total_service_instances,
                billable_sis = result.total_billable_service_instances,
                "usage collection completed"
            );
        } else {
            info!("usage collection completed");
        }
        Ok(result)
    }
}
