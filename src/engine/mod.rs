//! The container engine calls the harness depends on
//!
//! [`Engine`] is the seam between the test steps and the remote engine API. [`DockerEngine`]
//! talks to a real daemon; tests drive the steps against an in-memory implementation.

use crate::error::HarnessError;
use std::collections::HashMap;
use std::future::Future;

mod docker;

pub use docker::DockerEngine;

/// A volume as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub name: String,
    pub driver: String,
}

/// A container as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
}

/// An installed plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

/// What to create a container with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub cmd: Vec<String>,
    /// `volume:path` bind entries
    pub binds: Vec<String>,
    pub volume_driver: Option<String>,
}

/// Remote engine operations, one per API call
///
/// Every future is `Send` so steps can run inside spawned tasks.
pub trait Engine: Send + Sync + 'static {
    /// Install a plugin, granting every permission it requests
    ///
    /// Resolves once the installation has fully completed.
    fn install_plugin(
        &self,
        reference: &str,
        settings: &HashMap<String, String>,
    ) -> impl Future<Output = Result<(), HarnessError>> + Send;

    fn disable_plugin(
        &self,
        reference: &str,
        force: bool,
    ) -> impl Future<Output = Result<(), HarnessError>> + Send;

    fn remove_plugin(
        &self,
        reference: &str,
        force: bool,
    ) -> impl Future<Output = Result<(), HarnessError>> + Send;

    fn list_plugins(&self) -> impl Future<Output = Result<Vec<PluginInfo>, HarnessError>> + Send;

    fn create_volume(
        &self,
        name: &str,
        driver: &str,
        options: &HashMap<String, String>,
    ) -> impl Future<Output = Result<VolumeInfo, HarnessError>> + Send;

    /// List volumes, optionally narrowed with the engine's `name` filter
    ///
    /// The engine's name filter is a substring match; callers wanting exact matches must
    /// filter the result themselves.
    fn list_volumes(
        &self,
        name: Option<&str>,
    ) -> impl Future<Output = Result<Vec<VolumeInfo>, HarnessError>> + Send;

    fn inspect_volume(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<VolumeInfo, HarnessError>> + Send;

    fn remove_volume(
        &self,
        name: &str,
        force: bool,
    ) -> impl Future<Output = Result<(), HarnessError>> + Send;

    /// Pull an image, resolving once the pull stream is drained
    fn pull_image(&self, image: &str) -> impl Future<Output = Result<(), HarnessError>> + Send;

    /// Create (but do not start) a container, returning its ID
    fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpec,
    ) -> impl Future<Output = Result<String, HarnessError>> + Send;

    /// List containers, including stopped ones when `all` is set
    fn list_containers(
        &self,
        all: bool,
    ) -> impl Future<Output = Result<Vec<ContainerInfo>, HarnessError>> + Send;

    fn remove_container(
        &self,
        id: &str,
        force: bool,
    ) -> impl Future<Output = Result<(), HarnessError>> + Send;
}
