use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use voltest::{DockerEngine, HarnessConfig, NodeConfig, NodeEnv, TestClient, run};

/// Exercise a Docker volume plugin end to end on one or more nodes
#[derive(Parser, Debug)]
#[command(name = "voltest", version, about)]
struct Cli {
    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Skip the tests and only clean the nodes
    #[arg(long)]
    clean_only: bool,

    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Node to test, optionally with its env file (replaces the configured nodes)
    #[arg(long = "node", value_name = "NAME[=ENV_FILE]")]
    nodes: Vec<NodeConfig>,

    /// Exit with a failure status when any test or cleanup failed
    #[arg(long)]
    strict: bool,
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut config = HarnessConfig::load(cli.config.as_deref())?;
    if !cli.nodes.is_empty() {
        config.nodes = cli.nodes;
    }
    config.validate()?;
    log::info!(
        "Testing plugin {} on {} node(s)",
        config.plugin,
        config.nodes.len()
    );

    let mut clients = Vec::with_capacity(config.nodes.len());
    for node in &config.nodes {
        let env = NodeEnv::from_file(node.env_path())?;
        for (key, value) in &env {
            log::debug!("[{}] {}={}", node.name, key, value);
        }
        let engine = DockerEngine::connect(&node.name, &env).await?;
        clients.push(TestClient::new(&config, node.name.clone(), engine)?);
    }

    let outcome = run(clients, cli.clean_only).await;
    Ok(ExitCode::from(outcome.exit_status(cli.strict)))
}
