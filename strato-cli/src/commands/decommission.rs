use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use strato_models::ResourceKind;
use strato_orchestrations::allowlist::AllowListBinder;
use strato_orchestrations::teardown::{Decommissioner, TeardownTarget};

use crate::commands::build_registry;
use crate::config::{self, Settings};

pub async fn run(
    ids: Vec<String>,
    kind: Option<ResourceKind>,
    eips: Vec<String>,
    file: Option<PathBuf>,
    yes: bool,
) -> Result<()> {
    let settings = Settings::load()?;

    let targets: Vec<TeardownTarget> = if let Some(path) = file {
        config::load_teardown_file(&path)?.targets
    } else {
        let kind = kind.context("--kind is required when passing instance ids")?;
        if ids.is_empty() {
            bail!("no instance ids given");
        }
        ids.into_iter()
            .enumerate()
            .map(|(index, instance_id)| TeardownTarget {
                kind,
                instance_id,
                eip_address: eips.get(index).cloned(),
            })
            .collect()
    };
    if targets.is_empty() {
        bail!("nothing to decommission");
    }

    if !yes && !confirm(&targets)? {
        println!("Aborted.");
        return Ok(());
    }

    tracing::info!(count = targets.len(), "decommissioning resources");

    let kinds: HashSet<_> = targets.iter().map(|t| t.kind).collect();
    let registry = build_registry(&settings, kinds);
    let decommissioner = Decommissioner::new(registry, AllowListBinder::new(Vec::new()));

    let report = decommissioner.decommission(&targets).await;
    println!("{report}");

    if !report.fully_succeeded() {
        bail!(
            "teardown incomplete, failed: {} (re-run to retry)",
            report.failed_subjects().join(", ")
        );
    }
    Ok(())
}

fn confirm(targets: &[TeardownTarget]) -> Result<bool> {
    println!("About to decommission {} resource(s):", targets.len());
    for target in targets {
        match &target.eip_address {
            Some(address) => println!("  {} {} (+ eip {})", target.kind, target.instance_id, address),
            None => println!("  {} {}", target.kind, target.instance_id),
        }
    }
    print!("Proceed? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
