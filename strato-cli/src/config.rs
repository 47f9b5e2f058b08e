use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use strato_models::{AllowListSpec, ResourceSpec};
use strato_orchestrations::http::GatewayConfig;
use strato_orchestrations::teardown::TeardownTarget;

/// Gateway connection settings, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            endpoint: std::env::var("STRATO_ENDPOINT")
                .context("STRATO_ENDPOINT must be set")?,
            access_key: std::env::var("STRATO_ACCESS_KEY")
                .context("STRATO_ACCESS_KEY must be set")?,
            secret_key: std::env::var("STRATO_SECRET_KEY")
                .context("STRATO_SECRET_KEY must be set")?,
            region: std::env::var("STRATO_REGION")
                .unwrap_or_else(|_| "region-a".to_string()),
        })
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            region: self.region.clone(),
        }
    }
}

/// A spec file: resources to provision plus the allow-list catalog they
/// reference by name.
#[derive(Debug, Default, Deserialize)]
pub struct SpecFile {
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    #[serde(default)]
    pub allow_lists: Vec<AllowListSpec>,
}

pub fn load_spec_file(path: &Path) -> Result<SpecFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading spec file {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing spec file {}", path.display()))
}

#[derive(Debug, Deserialize)]
pub struct TeardownFile {
    pub targets: Vec<TeardownTarget>,
}

pub fn load_teardown_file(path: &Path) -> Result<TeardownFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading teardown file {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing teardown file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use strato_models::ResourceKind;

    #[test]
    fn spec_file_parses_resources_and_catalog() {
        let yaml = "\
resources:
  - kind: cache
    name: c1
    zone: z1
    allow_lists:
      - office
allow_lists:
  - name: office
    entries:
      - 10.1.0.0/24
";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let parsed = load_spec_file(file.path()).unwrap();
        assert_eq!(parsed.resources.len(), 1);
        assert_eq!(parsed.resources[0].kind, ResourceKind::Cache);
        assert_eq!(parsed.allow_lists.len(), 1);
        assert_eq!(parsed.allow_lists[0].entries, vec!["10.1.0.0/24"]);
    }

    #[test]
    fn teardown_file_parses_targets() {
        let yaml = "\
targets:
  - kind: database
    instance_id: inst-1
    eip_address: 203.0.113.9
  - kind: cache
    instance_id: inst-2
";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let parsed = load_teardown_file(file.path()).unwrap();
        assert_eq!(parsed.targets.len(), 2);
        assert_eq!(parsed.targets[0].kind, ResourceKind::Database);
        assert_eq!(
            parsed.targets[0].eip_address.as_deref(),
            Some("203.0.113.9")
        );
        assert!(parsed.targets[1].eip_address.is_none());
    }

    #[test]
    fn malformed_spec_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"resources: [not, a, spec]").unwrap();
        assert!(load_spec_file(file.path()).is_err());
    }
}
