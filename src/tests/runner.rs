use super::memory::{MemoryEngine, Op};
use super::{PLUGIN, client, test_config};
use crate::client::TestClient;
use crate::config::HarnessConfig;
use crate::runner::{CHECKMARK, Outcome, Step, TestResult, XMARK, run_steps};
use pretty_assertions::assert_eq;

#[test]
fn test_step_names() {
    let names: Vec<&str> = Step::suite().iter().map(|s| s.name()).collect();
    assert_eq!(
        names,
        vec![
            "InstallPlugin",
            "CreateVolume",
            "ConfirmVolume",
            "InspectVolume",
            "CreateContainerWithVolume",
        ]
    );
    assert_eq!(Step::InspectVolume.to_string(), "InspectVolume");
}

#[test]
fn test_result_lines() {
    let pass = TestResult {
        step: Step::CreateVolume,
        node: "node1".to_string(),
        outcome: Outcome::Passed,
    };
    let fail = TestResult {
        step: Step::ConfirmVolume,
        node: "node2".to_string(),
        outcome: Outcome::Failed("Volume node2-abcde not found".to_string()),
    };

    let pass_line = pass.to_string();
    assert!(pass_line.contains(CHECKMARK));
    assert!(pass_line.contains("Test: CreateVolume [node1]"));
    assert!(!pass_line.contains("failed"));

    let fail_line = fail.to_string();
    assert!(fail_line.contains(XMARK));
    assert!(fail_line.contains("Test: ConfirmVolume [node2]"));
    assert!(
        fail_line.ends_with("Test ConfirmVolume failed. error: Volume node2-abcde not found")
    );
}

#[tokio::test]
async fn test_full_suite_passes() {
    let config = HarnessConfig {
        plugin: "example/driver:latest".to_string(),
        ..test_config()
    };
    let engine = MemoryEngine::new();
    let mut clients = vec![TestClient::new(&config, "node1", engine).unwrap()];

    let summary = run_steps(Step::suite(), &mut clients).await;

    assert!(summary.passed(), "{}", summary);
    assert_eq!(summary.results.len(), 5);
    for (result, step) in summary.results.iter().zip(Step::suite()) {
        let line = result.to_string();
        assert!(line.contains(CHECKMARK), "{}", line);
        assert!(line.contains(&format!("Test: {}", step.name())), "{}", line);
    }

    let rendered = summary.to_string();
    assert_eq!(rendered.lines().filter(|l| l.contains(CHECKMARK)).count(), 5);
    assert!(rendered.contains("This is a triumph!!!"));
}

#[tokio::test]
async fn test_steps_run_across_all_clients_first() {
    let engine = MemoryEngine::new();
    let mut clients = vec![
        client("node1", engine.clone()),
        client("node2", engine.clone()),
    ];

    let steps = [Step::CreateVolume, Step::ConfirmVolume];
    let summary = run_steps(&steps, &mut clients).await;

    let order: Vec<(Step, &str)> = summary
        .results
        .iter()
        .map(|r| (r.step, r.node.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (Step::CreateVolume, "node1"),
            (Step::CreateVolume, "node2"),
            (Step::ConfirmVolume, "node1"),
            (Step::ConfirmVolume, "node2"),
        ]
    );
}

#[tokio::test]
async fn test_failures_do_not_stop_the_run() {
    // Installing fails, so every later step for the node cascades
    let engine = MemoryEngine::new().failing(Op::InstallPlugin);
    let mut clients = vec![client("node1", engine.clone())];

    let summary = run_steps(Step::suite(), &mut clients).await;

    assert!(!summary.passed());
    assert_eq!(summary.results.len(), 5);
    assert_eq!(summary.failures().count(), 5);
    assert!(summary.to_string().contains("This is a failure!!!"));

    let confirm = &summary.results[2];
    assert_eq!(confirm.step, Step::ConfirmVolume);
    assert!(matches!(&confirm.outcome, Outcome::Failed(e) if e.contains("not found")));
}

#[tokio::test]
async fn test_one_node_failing_leaves_the_other_passing() {
    let broken = MemoryEngine::new().failing(Op::CreateVolume);
    let healthy = MemoryEngine::new();
    let mut clients = vec![client("node1", broken), client("node2", healthy.clone())];

    let summary = run_steps(Step::suite(), &mut clients).await;

    let node2_passed = summary
        .results
        .iter()
        .filter(|r| r.node == "node2")
        .all(TestResult::passed);
    assert!(node2_passed, "{}", summary);
    assert!(!summary.passed());
    assert!(healthy.state().plugins.iter().any(|p| p.name.starts_with(PLUGIN)));
}

#[tokio::test]
async fn test_empty_run_passes() {
    let mut clients: Vec<TestClient<MemoryEngine>> = Vec::new();
    let summary = run_steps(Step::suite(), &mut clients).await;

    assert!(summary.results.is_empty());
    assert!(summary.passed());
}
