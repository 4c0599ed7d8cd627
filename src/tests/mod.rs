mod runner;

use crate::client::TestClient;
use crate::config::HarnessConfig;
use memory::MemoryEngine;

pub(crate) const PLUGIN: &str = "example/driver";

pub(crate) fn test_config() -> HarnessConfig {
    HarnessConfig {
        plugin: PLUGIN.to_string(),
        ..HarnessConfig::default()
    }
}

pub(crate) fn client(node: &str, engine: MemoryEngine) -> TestClient<MemoryEngine> {
    TestClient::new(&test_config(), node, engine).unwrap()
}
