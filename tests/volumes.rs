mod common;

use common::{is_docker_running, local_client};
use voltest::{Engine, HarnessError};

#[tokio::test]
async fn test_volume_steps_with_local_driver() -> color_eyre::Result<()> {
    if !is_docker_running() {
        println!("Skipping test: Docker is not running");
        return Ok(());
    }

    let mut client = local_client().await?;

    client.create_volume().await?;
    let volume = client.volume().to_string();
    assert!(volume.starts_with(&format!("{}-", client.node())));

    client.confirm_volume().await?;
    client.inspect_volume().await?;

    client.delete_volume(&volume).await?;
    let err = client.confirm_volume().await.unwrap_err();
    assert!(matches!(err, HarnessError::VolumeNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_container_with_local_volume() -> color_eyre::Result<()> {
    if !is_docker_running() {
        println!("Skipping test: Docker is not running");
        return Ok(());
    }

    let mut client = local_client().await?;
    client.create_volume().await?;
    client.create_container_with_volume().await?;

    let container = client.container().to_string();
    let listed = client
        .engine()
        .list_containers(true)
        .await?
        .into_iter()
        .any(|c| c.names.contains(&container));
    assert!(listed, "container {} should be listed", container);

    client.engine().remove_container(&container, true).await?;
    let volume = client.volume().to_string();
    client.delete_volume(&volume).await?;

    Ok(())
}

#[tokio::test]
async fn test_confirm_without_volume() -> color_eyre::Result<()> {
    if !is_docker_running() {
        println!("Skipping test: Docker is not running");
        return Ok(());
    }

    let mut client = local_client().await?;
    let err = client.confirm_volume().await.unwrap_err();
    assert!(matches!(err, HarnessError::VolumeNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_plugin_command_failure_is_reported() -> color_eyre::Result<()> {
    if !is_docker_running() {
        println!("Skipping test: Docker is not running");
        return Ok(());
    }

    let env = voltest::NodeEnv::parse("");
    let engine =
        voltest::DockerEngine::connect("node1", &env).await?.with_cli("/nonexistent/docker");

    let err = engine.list_plugins().await.unwrap_err();
    match err {
        HarnessError::PluginCommand { command, .. } => {
            assert!(command.starts_with("docker plugin ls"), "{}", command);
        }
        other => panic!("Expected a plugin command error, got {other:?}"),
    }

    Ok(())
}
