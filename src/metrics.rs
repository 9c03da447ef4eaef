use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::usage::AggregateResult;

/// Content type of the rendered exposition text.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Gauges published for one [`AggregateResult`].
pub struct UsageGauges {
    pub total_app_instances: IntGauge,
    pub total_billable_app_instances: IntGauge,
    pub total_service_instances: IntGauge,
    pub total_billable_service_instances: IntGauge,
    pub monthly_max_billable_app_instances: IntGauge,
    pub yearly_max_billable_app_instances: IntGauge,
    pub org_app_instances: IntGaugeVec,
    pub org_service_instances: IntGaugeVec,
    pub org_billable_service_instances: IntGaugeVec,
}

impl UsageGauges {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            total_app_instances: IntGauge::new(
                "cf_total_application_instances",
                "Total number of application instances across all organizations (includes system)",
            )?,
            total_billable_app_instances: IntGauge::new(
                "cf_total_billable_application_instances",
                "Total number of billable application instances (excludes system org)",
            )?,
            total_service_instances: IntGauge::new(
                "cf_total_service_instances",
                "Total number of service instances across all organizations",
            )?,
            total_billable_service_instances: IntGauge::new(
                "cf_total_billable_service_instances",
                "Total number of billable service instances across all organizations",
            )?,
            monthly_max_billable_app_instances: IntGauge::new(
                "cf_monthly_max_billable_application_instances",
                "Maximum billable application instances this month",
            )?,
            yearly_max_billable_app_instances: IntGauge::new(
                "cf_yearly_max_billable_application_instances",
                "Maximum billable application instances this year",
            )?,
            org_app_instances: IntGaugeVec::new(
                Opts::new(
                    "cf_org_application_instances",
                    "Number of application instances per organization",
                ),
                &["org"],
            )?,
            org_service_instances: IntGaugeVec::new(
                Opts::new(
                    "cf_org_service_instances",
                    "Number of service instances per organization",
                ),
                &["org"],
            )?,
            org_billable_service_instances: IntGaugeVec::new(
                Opts::new(
                    "cf_org_billable_service_instances",
                    "Number of billable service instances per organization",
                ),
                &["org"],
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.total_app_instances.clone()))?;
        registry.register(Box::new(self.total_billable_app_instances.clone()))?;
        registry.register(Box::new(self.total_service_instances.clone()))?;
        registry.register(Box::new(self.total_billable_service_instances.clone()))?;
        registry.register(Box::new(self.monthly_max_billable_app_instances.clone()))?;
        registry.register(Box::new(self.yearly_max_billable_app_instances.clone()))?;
        registry.register(Box::new(self.org_app_instances.clone()))?;
        registry.register(Box::new(self.org_service_instances.clone()))?;
        registry.register(Box::new(self.org_billable_service_instances.clone()))?;
        Ok(())
    }

    pub fn observe(&self, result: &AggregateResult) {
        self.total_app_instances.set(gauge_value(result.total_app_instances));
        self.total_billable_app_instances
            .set(gauge_value(result.total_billable_app_instances));
        self.total_service_instances
            .set(gauge_value(result.total_service_instances));
        self.total_billable_service_instances
            .set(gauge_value(result.total_billable_service_instances));
        self.monthly_max_billable_app_instances
            .set(gauge_value(result.monthly_max_billable_app_instances));
        self.yearly_max_billable_app_instances
            .set(gauge_value(result.yearly_max_billable_app_instances));

        for org in &result.organizations {
            let labels = [org.name.as_str()];
            self.org_app_instances
                .with_label_values(&labels)
                .set(gauge_value(org.app_instances));
            self.org_service_instances
                .with_label_values(&labels)
                .set(gauge_value(org.service_instances));
            self.org_billable_service_instances
                .with_label_values(&labels)
                .set(gauge_value(org.billable_service_instances));
        }
    }
}

fn gauge_value(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Renders `result` in the Prometheus text format. A fresh registry per call
/// keeps orgs that vanished upstream from lingering.
pub fn render(result: &AggregateResult) -> prometheus::Result<String> {
    let registry = Registry::new();
    let gauges = UsageGauges::new()?;
    gauges.register(&registry)?;
    gauges.observe(result);

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
}
