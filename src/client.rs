//! The per-node handle the test steps run against

use crate::config::HarnessConfig;
use crate::engine::{ContainerSpec, Engine};
use crate::error::HarnessError;
use std::collections::HashMap;
use uuid::Uuid;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of the random suffix on generated volume and container names
pub const NAME_SUFFIX_LEN: usize = 5;

/// A node under test
///
/// Each step method is a single call into the node's engine. The create steps remember the
/// name of what they created, and later steps operate on that volume or container.
#[derive(Debug)]
pub struct TestClient<E> {
    node: String,
    plugin: String,
    plugin_options: HashMap<String, String>,
    volume_options: HashMap<String, String>,
    image: String,
    cmd: Vec<String>,
    mount_path: String,
    engine: E,
    volume: String,
    container: String,
}

impl<E: Engine> TestClient<E> {
    /// Create a client for `node` using the plugin and container settings from `config`
    ///
    /// # Errors
    ///
    /// The configured container command cannot be split into arguments.
    pub fn new(
        config: &HarnessConfig,
        node: impl Into<String>,
        engine: E,
    ) -> Result<Self, HarnessError> {
        Ok(Self {
            node: node.into(),
            plugin: config.plugin.clone(),
            plugin_options: config.plugin_options.clone(),
            volume_options: config.volume_options.clone(),
            image: config.container_image.clone(),
            cmd: config.command()?,
            mount_path: config.mount_path.clone(),
            engine,
            volume: String::new(),
            container: String::new(),
        })
    }

    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    #[must_use]
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Name of the last volume created, empty before [`TestClient::create_volume`] succeeds
    #[must_use]
    pub fn volume(&self) -> &str {
        &self.volume
    }

    /// Name of the last container created, empty before a container step succeeds
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Install the plugin, granting all of its permissions
    ///
    /// # Errors
    ///
    /// The engine rejected or failed the installation.
    pub async fn install_plugin(&mut self) -> Result<(), HarnessError> {
        log::debug!("Installing plugin {} on {}", self.plugin, self.node);
        self.engine
            .install_plugin(&self.plugin, &self.plugin_options)
            .await
    }

    /// Disable then remove the plugin, both forced
    ///
    /// # Errors
    ///
    /// Either the disable or the remove call failed.
    pub async fn delete_plugin(&mut self) -> Result<(), HarnessError> {
        log::debug!("Deleting plugin {} on {}", self.plugin, self.node);
        self.engine.disable_plugin(&self.plugin, true).await?;
        self.engine.remove_plugin(&self.plugin, true).await
    }

    /// Create a volume named `{node}-{5 letters}` with the plugin as driver
    ///
    /// # Errors
    ///
    /// The engine failed to create the volume. The previous volume name is kept.
    pub async fn create_volume(&mut self) -> Result<(), HarnessError> {
        let name = self.generate_name();
        log::debug!("Creating volume {} with driver {}", name, self.plugin);

        self.engine
            .create_volume(&name, &self.plugin, &self.volume_options)
            .await?;
        self.volume = name;
        Ok(())
    }

    /// Check the engine lists a volume with exactly the stored name
    ///
    /// # Errors
    ///
    /// * No volume has been created yet
    /// * The engine has no volume with that name
    /// * Listing failed
    pub async fn confirm_volume(&mut self) -> Result<(), HarnessError> {
        log::debug!("Confirming volume {} with driver {}", self.volume, self.plugin);
        if self.volume.is_empty() {
            return Err(HarnessError::VolumeNotFound(self.volume.clone()));
        }

        let volumes = self.engine.list_volumes(Some(&self.volume)).await?;
        if !volumes.iter().any(|v| v.name == self.volume) {
            return Err(HarnessError::VolumeNotFound(self.volume.clone()));
        }
        Ok(())
    }

    /// Inspect the stored volume and check it is served by the plugin
    ///
    /// The volume is looked up by prefix, since some drivers append to the requested name.
    ///
    /// # Errors
    ///
    /// * No volume starts with the stored name
    /// * The reported driver is not the plugin
    /// * Listing or inspecting failed
    pub async fn inspect_volume(&mut self) -> Result<(), HarnessError> {
        log::debug!("Inspecting volume {} with driver {}", self.volume, self.plugin);
        if self.volume.is_empty() {
            return Err(HarnessError::VolumeNotFound(self.volume.clone()));
        }

        let volumes = self.engine.list_volumes(None).await?;
        let Some(found) = volumes
            .iter()
            .rev()
            .find(|v| v.name.starts_with(&self.volume))
        else {
            return Err(HarnessError::VolumeNotFound(self.volume.clone()));
        };

        let volume = self.engine.inspect_volume(&found.name).await?;
        if !same_driver(&volume.driver, &self.plugin) {
            return Err(HarnessError::DriverMismatch {
                actual: strip_latest(&volume.driver).to_string(),
                expected: self.plugin.clone(),
            });
        }
        Ok(())
    }

    /// Force-remove a single volume
    ///
    /// # Errors
    ///
    /// The engine failed to remove it.
    pub async fn delete_volume(&mut self, name: &str) -> Result<(), HarnessError> {
        log::debug!("Deleting volume {}", name);
        self.engine.remove_volume(name, true).await
    }

    /// Create a container named `{node}-{5 letters}` with the stored volume mounted
    ///
    /// The image is pulled first so the create call does not fail on a fresh node.
    ///
    /// # Errors
    ///
    /// Pulling the image or creating the container failed.
    pub async fn create_container_with_volume(&mut self) -> Result<(), HarnessError> {
        let name = self.generate_name();
        log::debug!("Creating container [{}] with volume [{}]", name, self.volume);

        self.engine.pull_image(&self.image).await?;

        let spec = ContainerSpec {
            image: self.image.clone(),
            cmd: self.cmd.clone(),
            binds: vec![format!("{}:{}", self.volume, self.mount_path)],
            volume_driver: Some(self.plugin.clone()),
        };
        let id = self.engine.create_container(&name, &spec).await?;
        log::debug!("Created container {} ({})", name, id);

        self.container = name;
        Ok(())
    }

    /// Force-remove every container on the node, stopped ones included
    ///
    /// Every container is attempted even after a failure.
    ///
    /// # Errors
    ///
    /// Listing failed, or the first removal error.
    pub async fn clean_containers(&mut self) -> Result<(), HarnessError> {
        log::debug!("Cleaning containers on {}", self.node);
        let containers = self.engine.list_containers(true).await?;

        let mut first_error = None;
        for container in containers {
            log::debug!("Cleaning container {}", container.id);
            if let Err(e) = self.engine.remove_container(&container.id, true).await {
                log::warn!("Failed to remove container {}: {}", container.id, e);
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Force-remove every volume on the node
    ///
    /// Stops at the first failure. The cleanup sequence treats any error from here as the end
    /// of the line for this node, unlike [`TestClient::clean_containers`].
    ///
    /// # Errors
    ///
    /// Listing or a removal failed.
    pub async fn clean_volumes(&mut self) -> Result<(), HarnessError> {
        log::debug!("Cleaning volumes on {}", self.node);
        let volumes = self.engine.list_volumes(None).await?;
        for volume in volumes {
            self.delete_volume(&volume.name).await?;
        }
        Ok(())
    }

    /// Log the node's containers at debug level
    ///
    /// # Errors
    ///
    /// Listing failed.
    pub async fn log_containers(&self) -> Result<(), HarnessError> {
        for container in self.engine.list_containers(false).await? {
            let short_id: String = container.id.chars().take(10).collect();
            log::debug!("[{}] container {} {}", self.node, short_id, container.image);
        }
        Ok(())
    }

    /// Log the node's volumes at debug level
    ///
    /// # Errors
    ///
    /// Listing failed.
    pub async fn log_volumes(&self) -> Result<(), HarnessError> {
        for volume in self.engine.list_volumes(None).await? {
            log::debug!("[{}] volume {} ({})", self.node, volume.name, volume.driver);
        }
        Ok(())
    }

    /// Log the node's plugins at debug level
    ///
    /// # Errors
    ///
    /// Listing failed.
    pub async fn log_plugins(&self) -> Result<(), HarnessError> {
        for plugin in self.engine.list_plugins().await? {
            let short_id: String = plugin.id.chars().take(10).collect();
            log::debug!(
                "[{}] plugin {} {} enabled={}",
                self.node,
                short_id,
                plugin.name,
                plugin.enabled
            );
        }
        Ok(())
    }

    fn generate_name(&self) -> String {
        format!("{}-{}", self.node, random_letters(NAME_SUFFIX_LEN))
    }
}

/// `n` random ASCII letters
#[must_use]
pub fn random_letters(n: usize) -> String {
    let mut out = String::with_capacity(n);
    while out.len() < n {
        for byte in Uuid::new_v4().as_bytes() {
            if out.len() == n {
                break;
            }
            out.push(char::from(LETTERS[usize::from(*byte) % LETTERS.len()]));
        }
    }
    out
}

fn strip_latest(reference: &str) -> &str {
    reference.strip_suffix(":latest").unwrap_or(reference)
}

/// Compare driver references, treating an explicit `:latest` tag as absent
#[must_use]
pub fn same_driver(reported: &str, configured: &str) -> bool {
    strip_latest(reported) == strip_latest(configured)
}
