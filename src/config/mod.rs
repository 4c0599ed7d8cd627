pub mod env_file;

pub use env_file::*;

use crate::error::HarnessError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Variable naming the plugin under test, overriding the config file
pub const PLUGIN_VAR: &str = "VOLDRIVER";
pub const DEFAULT_PLUGIN: &str = "dateraiodev/docker-driver";
pub const DEFAULT_IMAGE: &str = "alpine:latest";
pub const DEFAULT_COMMAND: &str = "/bin/sh";
pub const DEFAULT_MOUNT_PATH: &str = "/data";

/// Everything the harness needs to drive a run
///
/// Loaded from an optional YAML file:
///
/// ```yaml
/// plugin: example/driver
/// plugin_options:
///   DEBUG: "1"
/// volume_options:
///   size: "1"
/// container_image: alpine:latest
/// container_command: /bin/sh -c true
/// mount_path: /data
/// nodes:
///   - name: node1
///     env_file: envs/node1
///   - name: node2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Plugin reference, also used as the volume driver name
    pub plugin: String,
    /// Settings applied when installing the plugin
    pub plugin_options: HashMap<String, String>,
    /// Driver options passed on volume creation
    pub volume_options: HashMap<String, String>,
    pub nodes: Vec<NodeConfig>,
    pub container_image: String,
    /// Shell-style command line for the test container
    pub container_command: String,
    pub mount_path: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            plugin: DEFAULT_PLUGIN.to_string(),
            plugin_options: HashMap::new(),
            volume_options: HashMap::new(),
            nodes: vec![NodeConfig::new("node1"), NodeConfig::new("node2")],
            container_image: DEFAULT_IMAGE.to_string(),
            container_command: DEFAULT_COMMAND.to_string(),
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
        }
    }
}

impl HarnessConfig {
    /// Build the config from an optional YAML file and the `VOLDRIVER` variable
    ///
    /// # Errors
    ///
    /// * The file could not be read
    /// * The file is not valid YAML for this config
    pub fn load(path: Option<&Path>) -> Result<Self, HarnessError> {
        let config = match path {
            Some(path) => {
                log::debug!("Loading config from {}", path.display());
                Self::from_yaml(&std::fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };

        Ok(config.with_plugin_override(std::env::var(PLUGIN_VAR).ok()))
    }

    /// Parse a YAML document, filling unset fields with defaults
    ///
    /// # Errors
    ///
    /// The document does not deserialize into a config.
    pub fn from_yaml(content: &str) -> Result<Self, HarnessError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Replace the plugin reference when `plugin` is set and non-empty
    #[must_use]
    pub fn with_plugin_override(mut self, plugin: Option<String>) -> Self {
        if let Some(plugin) = plugin.filter(|p| !p.trim().is_empty()) {
            log::debug!("Using plugin {plugin} from {PLUGIN_VAR}");
            self.plugin = plugin;
        }
        self
    }

    /// Check the config is usable before any engine is contacted
    ///
    /// # Errors
    ///
    /// * The plugin reference is empty
    /// * There are no nodes, or two nodes share a name
    /// * The container command is empty or cannot be split
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.plugin.trim().is_empty() {
            return Err(HarnessError::Config("plugin reference is empty".into()));
        }

        if self.nodes.is_empty() {
            return Err(HarnessError::Config("no nodes configured".into()));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.name.trim().is_empty() {
                return Err(HarnessError::Config("node name is empty".into()));
            }
            if !seen.insert(node.name.as_str()) {
                return Err(HarnessError::Config(format!(
                    "node {} is configured twice",
                    node.name
                )));
            }
        }

        if !self.mount_path.starts_with('/') {
            return Err(HarnessError::Config(format!(
                "mount path {} is not absolute",
                self.mount_path
            )));
        }

        self.command()?;
        Ok(())
    }

    /// The container command, split into arguments
    ///
    /// # Errors
    ///
    /// The command is empty or has unbalanced quotes.
    pub fn command(&self) -> Result<Vec<String>, HarnessError> {
        let cmd = shell_words::split(&self.container_command).map_err(|e| {
            HarnessError::Config(format!(
                "invalid container command `{}`: {e}",
                self.container_command
            ))
        })?;
        if cmd.is_empty() {
            return Err(HarnessError::Config("container command is empty".into()));
        }
        Ok(cmd)
    }
}

/// A node under test: a name and the env file pointing at its engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<PathBuf>,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env_file: None,
        }
    }

    #[must_use]
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// The env file to source; defaults to a file named after the node
    #[must_use]
    pub fn env_path(&self) -> PathBuf {
        self.env_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.name))
    }
}

/// Parses `NAME` or `NAME=ENV_FILE`
impl FromStr for NodeConfig {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, env_file) = match s.split_once('=') {
            Some((name, path)) => (name.trim(), Some(path.trim())),
            None => (s.trim(), None),
        };

        if name.is_empty() {
            return Err(HarnessError::Config(format!("invalid node `{s}`")));
        }

        let node = NodeConfig::new(name);
        Ok(match env_file.filter(|p| !p.is_empty()) {
            Some(path) => node.with_env_file(path),
            None => node,
        })
    }
}

impl fmt::Display for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.env_file {
            Some(path) => write!(f, "{}={}", self.name, path.display()),
            None => write!(f, "{}", self.name),
        }
    }
}
