use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Result};

use strato_orchestrations::allowlist::AllowListBinder;
use strato_orchestrations::provision::Provisioner;

use crate::commands::build_registry;
use crate::config::{self, Settings};

pub async fn run(spec_path: PathBuf, only: Option<String>) -> Result<()> {
    let settings = Settings::load()?;
    let file = config::load_spec_file(&spec_path)?;

    let mut specs = file.resources;
    if let Some(name) = &only {
        specs.retain(|s| &s.name == name);
        if specs.is_empty() {
            bail!(
                "no resource named '{}' in {}",
                name,
                spec_path.display()
            );
        }
    }
    if specs.is_empty() {
        bail!("spec file {} contains no resources", spec_path.display());
    }
    for spec in &specs {
        if !spec.kind.is_provisionable() {
            bail!(
                "resource '{}': kind '{}' cannot be provisioned directly",
                spec.name,
                spec.kind
            );
        }
    }

    tracing::info!(
        spec_file = %spec_path.display(),
        count = specs.len(),
        "provisioning from spec file"
    );

    let kinds: HashSet<_> = specs.iter().map(|s| s.kind).collect();
    let registry = build_registry(&settings, kinds);
    let provisioner = Provisioner::new(registry, AllowListBinder::new(file.allow_lists));

    let report = provisioner.provision_batch(&specs).await;
    println!("{report}");

    if !report.fully_succeeded() {
        bail!(
            "provisioning incomplete, failed: {}",
            report.failed_subjects().join(", ")
        );
    }
    Ok(())
}
