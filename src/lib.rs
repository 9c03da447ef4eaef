pub mod cache;
pub mod cf;
pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod scheduler;
pub mod server;
pub mod telemetry;
pub mod usage;

pub use cache::{CacheEntry, ResultCache};
pub use cf::{CfClient, ReferenceCatalog};
pub use config::{CfCredentials, UsageConfig};
pub use error::{ApiError, CfError, CfResult};
pub use usage::{AggregateResult, OrgUsage, UsageCollector, UsageSource};
