//! Catalogue validation command.

use anyhow::Result;
use colored::Colorize;

use super::Context;

pub fn execute(context: &Context) -> Result<()> {
    // Validation already ran when the context was built
    let schema = context.provisioner.schema();

    println!("{}", "Migration catalogue".cyan().bold());
    println!("{}", "─".repeat(50));
    for step in schema.registry().steps() {
        println!(
            "  v{:<4} {:<28} {} statement(s)",
            step.version,
            step.name,
            step.operations.len()
        );
    }

    println!();
    println!("{}", "Legacy signatures".cyan().bold());
    for signature in schema.signatures() {
        println!("  → v{:<3} {}", signature.version, signature.description);
    }

    println!();
    println!(
        "{}",
        format!(
            "✓ {} steps, latest v{}",
            schema.registry().steps().len(),
            schema.registry().latest()
        )
        .green()
    );
    Ok(())
}
