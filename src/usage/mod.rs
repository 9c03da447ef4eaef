pub mod classify;
pub mod collector;
pub mod models;

pub use classify::{
    classify, BillableOfferings, Classification, DEFAULT_BILLABLE_OFFERINGS, UNKNOWN_OFFERING,
    UNKNOWN_PLAN,
};
pub use collector::{UsageCollector, UsageSource};
pub use models::{AggregateResult, OrgUsage};
