//! Tenant listing command.

use anyhow::Result;
use colored::Colorize;

use super::Context;

pub fn execute(context: &Context) -> Result<()> {
    let tenants = context.provisioner.list_tenants()?;
    if tenants.is_empty() {
        println!("{}", "No tenants found".yellow());
        return Ok(());
    }

    let latest = context.provisioner.schema().registry().latest();
    for tenant in tenants {
        match context.provisioner.status(&tenant) {
            Ok(Some(status)) if status.is_current() => {
                println!("  {} {} (v{})", "●".green(), tenant, status.stored_version)
            }
            Ok(Some(status)) => println!(
                "  {} {} (v{} of v{})",
                "●".yellow(),
                tenant,
                status.stored_version,
                latest
            ),
            Ok(None) => {}
            Err(e) => println!("  {} {} ({})", "✗".red(), tenant, e),
        }
    }

    Ok(())
}
