use std::fmt::Write;

use crate::usage::AggregateResult;

/// Pretty-printed JSON, two-space indented.
pub fn render_json(result: &AggregateResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

/// Line-oriented summary printed in CLI mode.
pub fn render_text(result: &AggregateResult) -> String {
    let mut out = String::new();
    for org in &result.organizations {
        let _ = writeln!(out, "Processing {}...", org.name);
        let _ = writeln!(out, "AIs: {}", org.app_instances);
        let _ = writeln!(
            out,
            "SIs: {} (Billable: {})",
            org.service_instances, org.billable_service_instances
        );
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "Total AIs: {} (Billable: {})",
        result.total_app_instances, result.total_billable_app_instances
    );
    let _ = writeln!(
        out,
        "Total SIs: {} (Billable: {})",
        result.total_service_instances, result.total_billable_service_instances
    );
    let _ = writeln!(
        out,
        "Monthly Max Billable AIs: {}",
        result.monthly_max_billable_app_instances
    );
    let _ = writeln!(
        out,
        "Yearly Max Billable AIs: {}",
        result.yearly_max_billable_app_instances
    );
    out
}
