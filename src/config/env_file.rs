use crate::error::HarnessError;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// Engine API version variable, defaulted when a node file leaves it unset
pub const API_VERSION_VAR: &str = "DOCKER_API_VERSION";
/// Version used when neither the node file nor the process sets [`API_VERSION_VAR`]
pub const DEFAULT_API_VERSION: &str = "1.37";

pub const DOCKER_HOST_VAR: &str = "DOCKER_HOST";
pub const DOCKER_TLS_VERIFY_VAR: &str = "DOCKER_TLS_VERIFY";
pub const DOCKER_CERT_PATH_VAR: &str = "DOCKER_CERT_PATH";

/// Variables that decide which engine a client talks to and how
pub const CONNECTION_VARS: [&str; 3] =
    [DOCKER_HOST_VAR, DOCKER_TLS_VERIFY_VAR, DOCKER_CERT_PATH_VAR];

static VALID_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("static regex is valid"));

/// The environment of a single node, as sourced from its env file
///
/// Node files are the shell snippets printed by `docker-machine env`:
///
/// ```text
/// export DOCKER_TLS_VERIFY="1"
/// export DOCKER_HOST="tcp://192.168.99.100:2376"
/// export DOCKER_CERT_PATH="/home/user/.docker/machine/machines/node1"
/// ```
///
/// The variables are kept in this map rather than exported into the process, so each node's
/// engine connection and plugin commands see only their own settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeEnv(HashMap<String, String>);

impl NodeEnv {
    /// Read and parse a node env file
    ///
    /// # Errors
    ///
    /// The file could not be read.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        log::debug!("Sourcing file: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| HarnessError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::parse(&content))
    }

    /// Parse env file content, falling back to the process' `DOCKER_API_VERSION`
    #[must_use]
    pub fn parse(content: &str) -> Self {
        Self::parse_with_fallback(content, std::env::var(API_VERSION_VAR).ok())
    }

    /// Parse env file content
    ///
    /// Only lines containing `=` are considered. A leading `export ` is dropped from the key and
    /// one pair of surrounding quotes from the value. Lines whose key is not a valid variable
    /// name are skipped. If `DOCKER_API_VERSION` is still unset afterwards, it becomes
    /// `api_version_fallback`, or [`DEFAULT_API_VERSION`].
    #[must_use]
    pub fn parse_with_fallback(content: &str, api_version_fallback: Option<String>) -> Self {
        let mut vars = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };

            let key = key.strip_prefix("export ").unwrap_or(key).trim();
            if !VALID_KEY.is_match(key) {
                log::debug!("Skipping malformed env line: {line}");
                continue;
            }

            let value = strip_quotes(value.trim());
            log::debug!("Setting k={key}, v={value}");
            vars.insert(key.to_string(), value.to_string());
        }

        if vars.get(API_VERSION_VAR).is_none_or(String::is_empty) {
            let version = api_version_fallback
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
            vars.insert(API_VERSION_VAR.to_string(), version);
        }

        NodeEnv(vars)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// The engine API version for this node, always present after parsing
    #[must_use]
    pub fn api_version(&self) -> &str {
        self.get(API_VERSION_VAR).unwrap_or(DEFAULT_API_VERSION)
    }

    #[must_use]
    pub fn docker_host(&self) -> Option<&str> {
        self.get(DOCKER_HOST_VAR).filter(|h| !h.is_empty())
    }

    /// Whether the node expects TLS, following the docker CLI (any non-empty value but `0`)
    #[must_use]
    pub fn tls_verify(&self) -> bool {
        self.get(DOCKER_TLS_VERIFY_VAR)
            .is_some_and(|v| !v.is_empty() && v != "0")
    }

    #[must_use]
    pub fn cert_path(&self) -> Option<&str> {
        self.get(DOCKER_CERT_PATH_VAR).filter(|p| !p.is_empty())
    }

    /// Fill in the connection variables from `lookup` when the node does not name a host
    ///
    /// A node file without `DOCKER_HOST` means "whatever engine the harness itself points at",
    /// which is what the `docker` CLI would pick from the process environment. Values already
    /// set by the node are kept.
    #[must_use]
    pub fn with_connection_defaults(&self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut env = self.clone();
        if self.docker_host().is_some() {
            return env;
        }

        for key in CONNECTION_VARS {
            if env.contains_key(key) {
                continue;
            }
            if let Some(value) = lookup(key) {
                env.0.insert(key.to_string(), value);
            }
        }
        env
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

impl From<HashMap<String, String>> for NodeEnv {
    fn from(map: HashMap<String, String>) -> Self {
        NodeEnv(map)
    }
}

impl From<NodeEnv> for HashMap<String, String> {
    fn from(env: NodeEnv) -> Self {
        env.0
    }
}

impl<'a> IntoIterator for &'a NodeEnv {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::hash_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
