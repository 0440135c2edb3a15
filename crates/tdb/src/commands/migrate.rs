//! Migrate command.
//!
//! Tenants are migrated concurrently; each store is still migrated by
//! exactly one task.

use anyhow::{bail, Result};
use colored::Colorize;
use tdb_core::{MigrationReport, TenantId};
use tokio::task::JoinSet;

use super::{parse_tenant, Context};

pub async fn execute(context: &Context, tenants: &[String], all: bool) -> Result<()> {
    let tenants: Vec<TenantId> = if all {
        context.provisioner.list_tenants()?
    } else {
        tenants.iter().map(|id| parse_tenant(id)).collect::<Result<_>>()?
    };

    if tenants.is_empty() {
        println!("{}", "No tenants found".yellow());
        return Ok(());
    }

    let mut tasks = JoinSet::new();
    for tenant in tenants {
        let provisioner = context.provisioner.clone();
        tasks.spawn_blocking(move || {
            let result = provisioner
                .ensure_current_with_report(&tenant)
                .map(|(_, report)| report);
            (tenant, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        results.push(joined?);
    }
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut failures = 0;
    for (tenant, result) in &results {
        match result {
            Ok(report) => println!("  {} {}", "✓".green(), describe(tenant, report)),
            Err(e) => {
                failures += 1;
                println!("  {} {}: {}", "✗".red(), tenant, e);
            }
        }
    }

    println!();
    if failures > 0 {
        bail!("{} of {} tenant(s) failed to migrate", failures, results.len());
    }
    println!("{}", format!("{} tenant(s) current", results.len()).green());
    Ok(())
}

fn describe(tenant: &TenantId, report: &MigrationReport) -> String {
    if report.is_noop() {
        return format!("{}: already at v{}", tenant, report.final_version);
    }

    let mut parts = Vec::new();
    if let Some(version) = report.reconciled_to {
        parts.push(format!("fast-forwarded to v{}", version));
    }
    if !report.applied.is_empty() {
        let applied: Vec<String> = report.applied.iter().map(|v| format!("v{}", v)).collect();
        parts.push(format!("applied {}", applied.join(", ")));
    }
    format!(
        "{}: v{} → v{} ({})",
        tenant,
        report.starting_version,
        report.final_version,
        parts.join("; ")
    )
}
