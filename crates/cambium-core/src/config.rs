use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::resolver::{MissingPolicy, ResolveMode};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub links: LinkConfig,
}

/// Workspace-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Name of the workspace
    pub name: String,
    /// Vaults whose union forms the note graph, in priority order
    pub vaults: Vec<VaultConfig>,
}

/// Individual vault configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Friendly name of the vault; qualifies note names across vaults
    pub name: String,
    /// Physical path to the vault directory
    pub path: PathBuf,
}

/// Link-resolution defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// What to do with references that resolve to nothing
    #[serde(default = "default_missing_policy")]
    pub missing: MissingPolicyConfig,
    /// Prefix prepended to image targets during resolution
    #[serde(default)]
    pub asset_prefix: Option<String>,
    /// Display prefix for resolved references
    #[serde(default)]
    pub link_prefix: Option<String>,
    /// Append-only broken-link log, relative to the first vault unless
    /// absolute
    #[serde(default = "default_diagnostics_log")]
    pub diagnostics_log: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingPolicyConfig {
    Fail,
    StubPage,
}

impl From<MissingPolicyConfig> for MissingPolicy {
    fn from(value: MissingPolicyConfig) -> Self {
        match value {
            MissingPolicyConfig::Fail => MissingPolicy::Fail,
            MissingPolicyConfig::StubPage => MissingPolicy::StubPage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolveModeConfig {
    ToSourceMarkup,
    ToRenderedMarkup,
    ToIdPermalink,
}

impl From<ResolveModeConfig> for ResolveMode {
    fn from(value: ResolveModeConfig) -> Self {
        match value {
            ResolveModeConfig::ToSourceMarkup => ResolveMode::SourceMarkup,
            ResolveModeConfig::ToRenderedMarkup => ResolveMode::RenderedMarkup,
            ResolveModeConfig::ToIdPermalink => ResolveMode::IdPermalink,
        }
    }
}

fn default_missing_policy() -> MissingPolicyConfig {
    MissingPolicyConfig::StubPage
}

fn default_diagnostics_log() -> PathBuf {
    PathBuf::from("missing-links.log")
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            missing: default_missing_policy(),
            asset_prefix: None,
            link_prefix: None,
            diagnostics_log: default_diagnostics_log(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspaceConfig {
                name: "Cambium Workspace".to_string(),
                vaults: vec![VaultConfig {
                    name: "main".to_string(),
                    path: PathBuf::from("."),
                }],
            },
            links: LinkConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Convenience for a single-vault workspace rooted at `path`.
    pub fn single_vault(path: impl Into<PathBuf>) -> Self {
        let mut config = EngineConfig::default();
        config.workspace.vaults = vec![VaultConfig {
            name: "main".to_string(),
            path: path.into(),
        }];
        config
    }

    /// Load config from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_round_trip() {
        let config = EngineConfig::single_vault("/tmp/vault");
        let yaml = config.to_yaml().unwrap();
        let back = EngineConfig::from_yaml(&yaml).unwrap();
        assert_eq!(back.workspace.vaults.len(), 1);
        assert_eq!(back.workspace.vaults[0].name, "main");
        assert_eq!(back.links.missing, MissingPolicyConfig::StubPage);
    }

    #[test]
    fn test_missing_policy_kebab_case() {
        let yaml = "workspace:\n  name: ws\n  vaults:\n    - name: main\n      path: /v\nlinks:\n  missing: fail\n";
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.links.missing, MissingPolicyConfig::Fail);
    }
}
