use super::{ContainerInfo, ContainerSpec, Engine, PluginInfo, VolumeInfo};
use crate::config::{CONNECTION_VARS, NodeEnv};
use crate::error::HarnessError;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerCreateResponse, ContainerSummary, HostConfig, Volume};
use bollard::volume::{CreateVolumeOptions, ListVolumesOptions, RemoveVolumeOptions};
use bollard::{ClientVersion, Docker};
use futures_util::TryStreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Seconds before a request to the engine times out
const CONNECT_TIMEOUT: u64 = 120;

/// An [`Engine`] backed by a Docker daemon
///
/// Volume, container and image calls go through `bollard`. `bollard` does not cover the plugin
/// endpoints, so plugin calls run `docker plugin` with the node's environment, which points
/// the CLI at the same daemon.
#[derive(Debug)]
pub struct DockerEngine {
    client: Docker,
    env: NodeEnv,
    cli: PathBuf,
}

impl DockerEngine {
    /// Connect to the engine described by `env` and make sure it answers
    ///
    /// `DOCKER_HOST` selects the transport: a `unix://` socket, TCP, or TCP with TLS when
    /// `DOCKER_TLS_VERIFY` is set (certificates are read from `DOCKER_CERT_PATH`). A node without
    /// `DOCKER_HOST` takes the connection variables of the process, and the local defaults
    /// when those are unset too. Plugin commands are run with the same variables, so both
    /// reach the same engine.
    ///
    /// # Errors
    ///
    /// * `DOCKER_API_VERSION` is not a `major.minor` version
    /// * The client could not be created
    /// * The engine did not answer a ping
    pub async fn connect(node: &str, env: &NodeEnv) -> Result<Self, HarnessError> {
        let connection_error = |reason: String| HarnessError::Connection {
            node: node.to_string(),
            reason,
        };

        let env = env.with_connection_defaults(|key| std::env::var(key).ok());
        let version = parse_api_version(env.api_version())?;
        let client = match env.docker_host() {
            None => Docker::connect_with_local_defaults(),
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_socket(host, CONNECT_TIMEOUT, &version)
            }
            Some(host) if env.tls_verify() => {
                let certs = env.cert_path().map(PathBuf::from).ok_or_else(|| {
                    connection_error("DOCKER_TLS_VERIFY is set without DOCKER_CERT_PATH".into())
                })?;
                Docker::connect_with_ssl(
                    host,
                    &certs.join("key.pem"),
                    &certs.join("cert.pem"),
                    &certs.join("ca.pem"),
                    CONNECT_TIMEOUT,
                    &version,
                )
            }
            Some(host) => Docker::connect_with_http(host, CONNECT_TIMEOUT, &version),
        }
        .map_err(|e| connection_error(e.to_string()))?;

        if let Err(e) = client.ping().await {
            log::error!("Failed to ping docker server for {}: {}", node, e);
            return Err(connection_error(e.to_string()));
        }

        Ok(Self {
            client,
            env,
            cli: PathBuf::from("docker"),
        })
    }

    /// Use a different `docker` executable for plugin commands
    #[must_use]
    pub fn with_cli(mut self, cli: impl Into<PathBuf>) -> Self {
        self.cli = cli.into();
        self
    }

    /// `docker plugin <args>` with the node's variables, and none of the process' connection
    /// variables the node does not set
    fn plugin_cli(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.cli);
        command
            .arg("plugin")
            .args(args)
            .envs(self.env.iter())
            .stdin(Stdio::null());

        for key in CONNECTION_VARS {
            if !self.env.contains_key(key) {
                command.env_remove(key);
            }
        }
        command
    }

    async fn plugin_command(&self, args: &[String]) -> Result<String, HarnessError> {
        let command = format!("docker plugin {}", args.join(" "));
        log::debug!("Running `{}`", command);

        let output = self
            .plugin_cli(args)
            .output()
            .await
            .map_err(|e| HarnessError::PluginCommand {
                command: command.clone(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(HarnessError::PluginCommand {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn parse_api_version(version: &str) -> Result<ClientVersion, HarnessError> {
    let invalid = || HarnessError::Config(format!("invalid engine API version `{version}`"));

    let (major, minor) = version.trim().split_once('.').ok_or_else(invalid)?;
    Ok(ClientVersion {
        major_version: major.parse().map_err(|_| invalid())?,
        minor_version: minor.parse().map_err(|_| invalid())?,
    })
}

/// Split `repo[:tag]` for the image create endpoint, which wants the tag separately
fn split_image(image: &str) -> (&str, &str) {
    match image.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, tag),
        _ => (image, "latest"),
    }
}

fn parse_plugin_list(output: &str) -> Vec<PluginInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let id = fields.next()?.trim();
            let name = fields.next()?.trim();
            let enabled = fields.next().is_some_and(|e| e.trim() == "true");
            if id.is_empty() {
                return None;
            }
            Some(PluginInfo {
                id: id.to_string(),
                name: name.to_string(),
                enabled,
            })
        })
        .collect()
}

fn container_info(container: ContainerSummary) -> Result<ContainerInfo, HarnessError> {
    let id = container
        .id
        .ok_or_else(|| HarnessError::Engine("engine listed a container without an id".into()))?;

    Ok(ContainerInfo {
        id,
        names: container
            .names
            .unwrap_or_default()
            .into_iter()
            .map(|n| n.trim_start_matches('/').to_string())
            .collect(),
        image: container.image.unwrap_or_default(),
    })
}

impl From<Volume> for VolumeInfo {
    fn from(volume: Volume) -> Self {
        Self {
            name: volume.name,
            driver: volume.driver,
        }
    }
}

impl Engine for DockerEngine {
    #[tracing::instrument(skip(self, settings))]
    async fn install_plugin(
        &self,
        reference: &str,
        settings: &HashMap<String, String>,
    ) -> Result<(), HarnessError> {
        let mut settings: Vec<String> = settings
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        settings.sort();

        let mut args = vec![
            "install".to_string(),
            "--grant-all-permissions".to_string(),
            reference.to_string(),
        ];
        args.extend(settings);

        // The CLI only returns once the install has finished
        self.plugin_command(&args).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn disable_plugin(&self, reference: &str, force: bool) -> Result<(), HarnessError> {
        let mut args = vec!["disable".to_string()];
        if force {
            args.push("--force".to_string());
        }
        args.push(reference.to_string());

        self.plugin_command(&args).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_plugin(&self, reference: &str, force: bool) -> Result<(), HarnessError> {
        let mut args = vec!["rm".to_string()];
        if force {
            args.push("--force".to_string());
        }
        args.push(reference.to_string());

        self.plugin_command(&args).await?;
        Ok(())
    }

    async fn list_plugins(&self) -> Result<Vec<PluginInfo>, HarnessError> {
        let args = [
            "ls".to_string(),
            "--no-trunc".to_string(),
            "--format".to_string(),
            "{{.ID}}\t{{.Name}}\t{{.Enabled}}".to_string(),
        ];
        let output = self.plugin_command(&args).await?;
        Ok(parse_plugin_list(&output))
    }

    #[tracing::instrument(skip(self, options))]
    async fn create_volume(
        &self,
        name: &str,
        driver: &str,
        options: &HashMap<String, String>,
    ) -> Result<VolumeInfo, HarnessError> {
        let volume = self
            .client
            .create_volume(CreateVolumeOptions {
                name: name.to_string(),
                driver: driver.to_string(),
                driver_opts: options.clone(),
                ..Default::default()
            })
            .await
            .map_err(HarnessError::BollardError)?;

        Ok(volume.into())
    }

    async fn list_volumes(&self, name: Option<&str>) -> Result<Vec<VolumeInfo>, HarnessError> {
        let mut filters = HashMap::new();
        if let Some(name) = name {
            filters.insert("name".to_string(), vec![name.to_string()]);
        }

        let volumes = self
            .client
            .list_volumes(Some(ListVolumesOptions { filters }))
            .await
            .map_err(HarnessError::BollardError)?;

        Ok(volumes
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(VolumeInfo::from)
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn inspect_volume(&self, name: &str) -> Result<VolumeInfo, HarnessError> {
        let volume = self
            .client
            .inspect_volume(name)
            .await
            .map_err(HarnessError::BollardError)?;
        Ok(volume.into())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), HarnessError> {
        self.client
            .remove_volume(name, Some(RemoveVolumeOptions { force }))
            .await
            .map_err(HarnessError::BollardError)
    }

    #[tracing::instrument(skip(self))]
    async fn pull_image(&self, image: &str) -> Result<(), HarnessError> {
        let (repo, tag) = split_image(image);
        self.client
            .create_image(
                Some(CreateImageOptions {
                    from_image: repo,
                    tag,
                    ..Default::default()
                }),
                None,
                None,
            )
            .try_collect::<Vec<_>>()
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpec,
    ) -> Result<String, HarnessError> {
        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            host_config: Some(HostConfig {
                binds: Some(spec.binds.clone()),
                volume_driver: spec.volume_driver.clone(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let ContainerCreateResponse { id, warnings } = self
            .client
            .create_container(
                Some(CreateContainerOptions {
                    name: name.to_string(),
                    platform: None,
                }),
                config,
            )
            .await?;
        for warning in warnings {
            log::warn!("{}", warning);
        }

        Ok(id)
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerInfo>, HarnessError> {
        let containers = self
            .client
            .list_containers(Some(ListContainersOptions::<String> {
                all,
                ..Default::default()
            }))
            .await?;

        containers.into_iter().map(container_info).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn remove_container(&self, id: &str, force: bool) -> Result<(), HarnessError> {
        self.client
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_API_VERSION;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_api_version() {
        let version = parse_api_version("1.37").unwrap();
        assert_eq!(version.major_version, 1);
        assert_eq!(version.minor_version, 37);

        assert!(parse_api_version("latest").is_err());
        assert!(parse_api_version("1.x").is_err());
    }

    #[test]
    fn test_split_image() {
        assert_eq!(split_image("alpine:latest"), ("alpine", "latest"));
        assert_eq!(split_image("busybox"), ("busybox", "latest"));
        assert_eq!(
            split_image("registry:5000/team/app"),
            ("registry:5000/team/app", "latest")
        );
        assert_eq!(
            split_image("registry:5000/team/app:1.2"),
            ("registry:5000/team/app", "1.2")
        );
    }

    #[test]
    fn test_parse_plugin_list() {
        let output = "abc123\texample/driver:latest\ttrue\ndef456\tother/plugin:1.0\tfalse\n\n";
        let plugins = parse_plugin_list(output);

        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0].name, "example/driver:latest");
        assert!(plugins[0].enabled);
        assert!(!plugins[1].enabled);
    }

    #[test]
    fn test_container_info() {
        let info = container_info(ContainerSummary {
            id: Some("0123abcd".to_string()),
            names: Some(vec!["/node1-abcde".to_string()]),
            image: Some("alpine:latest".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(info.id, "0123abcd");
        assert_eq!(info.names, vec!["node1-abcde".to_string()]);
        assert_eq!(info.image, "alpine:latest");

        let err = container_info(ContainerSummary::default()).unwrap_err();
        assert!(matches!(err, HarnessError::Engine(_)));
    }

    fn engine_for(env: NodeEnv) -> DockerEngine {
        let version = parse_api_version(env.api_version()).unwrap();
        let client =
            Docker::connect_with_http("tcp://127.0.0.1:1", CONNECT_TIMEOUT, &version).unwrap();
        DockerEngine {
            client,
            env,
            cli: PathBuf::from("docker"),
        }
    }

    fn command_env(command: &Command) -> HashMap<String, Option<String>> {
        command
            .as_std()
            .get_envs()
            .map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    v.map(|v| v.to_string_lossy().into_owned()),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_plugin_cli_uses_the_resolved_host() {
        let process = |key: &str| match key {
            "DOCKER_HOST" => Some("tcp://10.0.0.9:2375".to_string()),
            _ => None,
        };
        let env = NodeEnv::parse_with_fallback("export DOCKER_API_VERSION=\"1.37\"", None)
            .with_connection_defaults(process);
        let engine = engine_for(env);

        let vars = command_env(&engine.plugin_cli(&["ls".to_string()]));

        assert_eq!(
            vars.get("DOCKER_HOST"),
            Some(&Some("tcp://10.0.0.9:2375".to_string()))
        );
        // The node sets no TLS variables, so none are inherited either
        assert_eq!(vars.get("DOCKER_TLS_VERIFY"), Some(&None));
        assert_eq!(vars.get("DOCKER_CERT_PATH"), Some(&None));
    }

    #[tokio::test]
    async fn test_plugin_cli_without_any_host() {
        let env = NodeEnv::parse_with_fallback("", None).with_connection_defaults(|_| None);
        let engine = engine_for(env);

        let command = engine.plugin_cli(&["ls".to_string()]);
        let vars = command_env(&command);

        // Falls back to the local socket, like the engine client
        assert_eq!(vars.get("DOCKER_HOST"), Some(&None));
        assert_eq!(
            vars.get("DOCKER_API_VERSION"),
            Some(&Some(DEFAULT_API_VERSION.to_string()))
        );
        let args: Vec<_> = command.as_std().get_args().collect();
        assert_eq!(args, vec!["plugin", "ls"]);
    }
}
