//! CLI integration tests

use recommender_lib::{
    ContainerRecommendation, ResourceIdentity, ResourceRequirement, WorkloadRecommendation,
};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn wrec(store: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wrec"))
        .arg("--store-dir")
        .arg(store)
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command")
}

fn requirement(cpu: &str, memory: &str) -> ResourceRequirement {
    let mut requirement = ResourceRequirement::default();
    requirement.requests.insert("cpu".to_string(), cpu.to_string());
    requirement
        .requests
        .insert("memory".to_string(), memory.to_string());
    requirement
}

fn document(namespace: &str, name: &str, savings: Option<f64>) -> WorkloadRecommendation {
    let identity = ResourceIdentity::new("acc", "prod", namespace, name, "Deployment");
    let mut doc = WorkloadRecommendation::new(identity);
    let mut app = ContainerRecommendation::new("app");
    app.current = Some(requirement("1", "2Gi"));
    app.burstable = Some(requirement("115m", "300Mi"));
    app.guaranteed = Some(requirement("250m", "400Mi"));
    app.num_days = 6;
    doc.container_recommendations.insert("app".to_string(), app);
    doc.num_days = 6;
    doc.valid_recommendation = true;
    doc.estimated_savings = savings;
    doc.last_day_cost_available = savings.is_some();
    doc
}

fn store_with(docs: &[WorkloadRecommendation]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (i, doc) in docs.iter().enumerate() {
        let path = dir.path().join(format!("doc-{}.json", i));
        std::fs::write(path, serde_json::to_vec_pretty(doc).unwrap()).unwrap();
    }
    dir
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    let output = wrec(dir.path(), &["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Workload Recommender"), "Should show app name");
    assert!(
        stdout.contains("recommendations"),
        "Should show recommendations command"
    );
    assert!(stdout.contains("describe"), "Should show describe command");
    assert!(stdout.contains("savings"), "Should show savings command");
}

#[test]
fn test_recommendations_table() {
    let dir = store_with(&[document("shop", "checkout", Some(150.0))]);
    let output = wrec(dir.path(), &["recommendations"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Deployment/checkout"));
    assert!(stdout.contains("250m"));
    assert!(stdout.contains("400Mi"));
    assert!(stdout.contains("Total: 1 containers in 1 workloads"));
}

#[test]
fn test_recommendations_json_respects_filter() {
    let dir = store_with(&[
        document("shop", "checkout", Some(150.0)),
        document("search", "indexer", None),
    ]);
    let output = wrec(
        dir.path(),
        &["--format", "json", "recommendations", "--namespace", "search"],
    );
    assert!(output.status.success());

    let docs: Vec<WorkloadRecommendation> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].identity.name, "indexer");
}

#[test]
fn test_savings_json_summary() {
    let dir = store_with(&[
        document("shop", "checkout", Some(150.0)),
        document("shop", "cart", Some(-120.0)),
        document("search", "indexer", None),
    ]);
    let output = wrec(dir.path(), &["-f", "json", "savings"]);
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["workloads"], 3);
    assert_eq!(summary["estimated"], 2);
    assert_eq!(summary["without_cost_data"], 1);
    assert_eq!(summary["total_monthly_savings"], 30.0);
}

#[test]
fn test_describe_workload() {
    let dir = store_with(&[document("shop", "checkout", Some(150.0))]);
    let output = wrec(dir.path(), &["describe", "shop/checkout"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("checkout"));
    assert!(stdout.contains("$150.00"));
    assert!(stdout.contains("memory"));
}

#[test]
fn test_describe_unknown_workload_fails() {
    let dir = store_with(&[document("shop", "checkout", None)]);
    let output = wrec(dir.path(), &["describe", "shop/missing"]);
    assert!(!output.status.success());

    let output = wrec(dir.path(), &["describe", "no-slash"]);
    assert!(!output.status.success());
}
