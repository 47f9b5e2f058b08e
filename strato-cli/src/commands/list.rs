use anyhow::{bail, Context, Result};

use strato_models::ResourceKind;

use crate::commands::build_registry;
use crate::config::Settings;

pub async fn run(kind: ResourceKind, output: String) -> Result<()> {
    if !kind.is_provisionable() {
        bail!("kind '{}' has no instance listing", kind);
    }

    let settings = Settings::load()?;
    let registry = build_registry(&settings, [kind]);
    let api = registry
        .product(kind)
        .context("no client registered for kind")?;

    let instances = api
        .list_instances()
        .await
        .with_context(|| format!("listing {kind} instances"))?;

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&instances)?);
        return Ok(());
    }

    println!(
        "{:<22} {:<20} {:<14} {:<22} {:<16}",
        "ID", "NAME", "STATUS", "VPC", "PUBLIC IP"
    );
    println!("{}", "-".repeat(96));
    for instance in &instances {
        println!(
            "{:<22} {:<20} {:<14} {:<22} {:<16}",
            instance.instance_id,
            instance.instance_name,
            instance.status,
            instance.vpc_id.as_deref().unwrap_or("-"),
            instance.public_ip.as_deref().unwrap_or("-"),
        );
    }
    println!();
    println!("{} instance(s) found", instances.len());

    Ok(())
}
