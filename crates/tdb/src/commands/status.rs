//! Tenant store status command.
//!
//! Read-only: never creates or migrates the store.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tdb_core::MigrationStatus;

use super::{parse_tenant, Context};

/// Status for JSON output.
#[derive(Debug, Serialize)]
struct TenantStatus {
    tenant: String,
    exists: bool,
    #[serde(flatten)]
    status: Option<MigrationStatus>,
}

pub fn execute(context: &Context, tenant: &str, json: bool) -> Result<()> {
    let tenant = parse_tenant(tenant)?;
    let status = context.provisioner.status(&tenant)?;

    if json {
        let output = TenantStatus {
            tenant: tenant.to_string(),
            exists: status.is_some(),
            status,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", format!("Tenant {}", tenant).cyan().bold());
    println!("{}", "─".repeat(50));

    let Some(status) = status else {
        println!("  Store: {}", "○ not provisioned".yellow());
        return Ok(());
    };

    println!(
        "  Path:    {}",
        context.provisioner.store_path(&tenant).display()
    );
    println!(
        "  Version: {} / {}",
        status.stored_version, status.latest_version
    );
    if let Some(version) = status.reconcilable_to {
        println!(
            "  Legacy:  {}",
            format!("schema matches v{}, will fast-forward", version).yellow()
        );
    }

    if status.is_current() {
        println!("  State:   {}", "✓ current".green());
    } else {
        println!("  State:   {}", format!("{} pending", status.pending.len()).yellow());
        for step in &status.pending {
            println!("    - v{} {}", step.version, step.name);
        }
    }

    Ok(())
}
