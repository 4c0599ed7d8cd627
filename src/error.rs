use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Failed to read env file {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read file: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Failed to parse yaml: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Failed to connect to engine for node {node}: {reason}")]
    Connection { node: String, reason: String },
    #[error("Docker API error: {0}")]
    BollardError(#[from] bollard::errors::Error),
    #[error("`{command}` failed: {stderr}")]
    PluginCommand { command: String, stderr: String },
    /// The engine answered with something the harness cannot use
    #[error("Engine error: {0}")]
    Engine(String),
    #[error("Volume {0} not found")]
    VolumeNotFound(String),
    #[error("Driver does not match.  {actual} != {expected}")]
    DriverMismatch { actual: String, expected: String },
    #[error("Cleanup for node {node} panicked: {message}")]
    CleanupPanicked { node: String, message: String },
}
