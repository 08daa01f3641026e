use mvcp_config::load_policy;
use mvcp_domain::PolicyMode;

#[test]
fn load_policy_from_fixture_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.yml");
    std::fs::write(
        &path,
        r#"
name: gpu-placement
mode: enforce
rules:
  max_latency_ms: 150
  max_price_per_gb: 2.5
  min_reputation_score: 0.7
  required_capabilities: ["gpu", "mig"]
scoring:
  latency_weight: 0.5
  price_weight: 0.2
  reputation_weight: 0.3
"#,
    )
    .unwrap();

    let policy = load_policy(&path).expect("should load without error");
    assert_eq!(policy.name, "gpu-placement");
    assert_eq!(policy.mode, PolicyMode::Enforce);
    assert_eq!(policy.rules.required_capabilities, vec!["gpu", "mig"]);
}

#[test]
fn missing_file_returns_error() {
    let path = std::path::Path::new("/nonexistent/path/does/not/exist/policy.yml");
    assert!(load_policy(path).is_err());
}
