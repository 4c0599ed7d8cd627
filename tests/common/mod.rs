use std::process::Command;
use uuid::Uuid;
use voltest::{DockerEngine, HarnessConfig, NodeEnv, TestClient};

pub fn is_docker_running() -> bool {
    Command::new("docker")
        .arg("info")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// A client for the local daemon using its built-in `local` volume driver
///
/// The node name is unique per call, so generated volume and container names never clash
/// with anything else on the host.
pub async fn local_client() -> color_eyre::Result<TestClient<DockerEngine>> {
    let node = format!("voltest-{}", &Uuid::new_v4().simple().to_string()[..8]);
    let env = NodeEnv::parse("");
    let engine = DockerEngine::connect(&node, &env).await?;

    let config = HarnessConfig {
        plugin: "local".to_string(),
        container_command: "true".to_string(),
        ..HarnessConfig::default()
    };

    Ok(TestClient::new(&config, node, engine)?)
}
