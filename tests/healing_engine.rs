//! End-to-end tests for detection, healing and the retry loop.
//!
//! The deploy collaborator is scripted, so these run without a cluster.

use std::sync::Arc;

use serde_yaml::Value;

use self_healing::{
    manifest, DeployOutcome, EngineConfig, FailureCategory, FailureDetector, FinalStatus,
    ManifestHealer, PatternCatalog, RiskLevel, RootCauseAnalyzer, ScriptedDeployer,
    SelfHealingEngine,
};

const JAVA_DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: java-spring-boot
  labels:
    app: java-spring-boot
spec:
  replicas: 3
  selector:
    matchLabels:
      app: java-spring-boot
  template:
    metadata:
      labels:
        app: java-spring-boot
    spec:
      containers:
      - name: app
        image: openjdk:17-jdk
        ports:
        - containerPort: 8080
        env:
        - name: JAVA_OPTS
          value: "-Xmx512m -Xms256m"
        resources:
          requests:
            memory: 512Mi
            cpu: "4"
          limits:
            memory: 512Mi
            cpu: "4"
"#;

const HEAP_ERROR: &str = "OutOfMemoryError: Java heap space, Exit Code: 137";

fn engine(max_retries: u32) -> SelfHealingEngine {
    SelfHealingEngine::with_config(EngineConfig {
        max_retries,
        backoff_unit_ms: 0,
        ..Default::default()
    })
    .expect("valid config")
}

fn container_field(document: &str, path: &[&str]) -> Option<Value> {
    let value = manifest::parse(document).ok()?;
    let container = manifest::get_path(&value, &["spec", "template", "spec", "containers"])?
        .get(0)?
        .clone();
    manifest::get_path(&container, path).cloned()
}

#[test]
fn empty_evidence_detects_unknown() {
    let results = FailureDetector::default().detect("", None);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].category, FailureCategory::Unknown);
    assert_eq!(results[0].confidence, 0);
}

#[test]
fn heap_exhaustion_scenario() {
    let catalog = Arc::new(PatternCatalog::default());

    let detection = FailureDetector::new(Arc::clone(&catalog)).detect(HEAP_ERROR, None);
    assert_eq!(detection[0].category, FailureCategory::OutOfMemory);
    assert!(detection[0].confidence >= 80);

    let diagnosis = RootCauseAnalyzer::new(catalog).analyze(
        FailureCategory::OutOfMemory,
        HEAP_ERROR,
        JAVA_DEPLOYMENT,
    );
    assert!(diagnosis.confidence >= 50);
    assert!(!diagnosis.evidence.is_empty());

    let mut engine = engine(3);
    let (healed, action) = engine
        .diagnose_and_heal(HEAP_ERROR, JAVA_DEPLOYMENT, None)
        .unwrap();
    assert_eq!(action.risk_level, RiskLevel::Critical);
    assert_eq!(
        container_field(&healed, &["resources", "limits", "memory"]),
        Some(Value::String("1024Mi".into()))
    );
}

#[test]
fn oom_heal_doubles_memory_exactly_once() {
    let healer = ManifestHealer::default();
    let diagnosis = RootCauseAnalyzer::new(Arc::new(PatternCatalog::default())).analyze(
        FailureCategory::OutOfMemory,
        HEAP_ERROR,
        JAVA_DEPLOYMENT,
    );
    let healed = healer.heal_out_of_memory(JAVA_DEPLOYMENT, &diagnosis).unwrap();

    assert_eq!(healed.modifications.len(), 2);
    for m in &healed.modifications {
        assert_eq!(m.old_value, Value::String("512Mi".into()));
        assert_eq!(m.new_value, Value::String("1024Mi".into()));
    }
    assert!(!healed.document.contains("2048Mi"));
    assert_eq!(
        container_field(&healed.document, &["resources", "requests", "memory"]),
        Some(Value::String("1024Mi".into()))
    );
}

#[test]
fn pending_heal_halves_cpu_each_pass() {
    let healer = ManifestHealer::default();
    let diagnosis = RootCauseAnalyzer::new(Arc::new(PatternCatalog::default())).analyze(
        FailureCategory::Pending,
        "0/3 nodes are available: insufficient cpu",
        JAVA_DEPLOYMENT,
    );

    let first = healer.heal_pending(JAVA_DEPLOYMENT, &diagnosis).unwrap();
    assert_eq!(
        container_field(&first.document, &["resources", "requests", "cpu"]),
        Some(Value::String("2".into()))
    );

    let second = healer.heal_pending(&first.document, &diagnosis).unwrap();
    assert_eq!(
        container_field(&second.document, &["resources", "requests", "cpu"]),
        Some(Value::String("1".into()))
    );

    let cpu_change = |mods: &[self_healing::Modification]| {
        mods.iter()
            .find(|m| m.field_path.ends_with("requests.cpu"))
            .cloned()
            .unwrap()
    };
    let a = cpu_change(&first.modifications);
    let b = cpu_change(&second.modifications);
    assert_ne!(a, b);
    assert_eq!(a.new_value, b.old_value);
}

#[test]
fn healing_only_touches_targeted_paths() {
    let healer = ManifestHealer::default();
    let diagnosis = RootCauseAnalyzer::new(Arc::new(PatternCatalog::default())).analyze(
        FailureCategory::OutOfMemory,
        HEAP_ERROR,
        JAVA_DEPLOYMENT,
    );
    let healed = healer.heal_out_of_memory(JAVA_DEPLOYMENT, &diagnosis).unwrap();

    let baseline = manifest::to_yaml(&manifest::parse(JAVA_DEPLOYMENT).unwrap()).unwrap();
    assert_eq!(baseline.lines().count(), healed.document.lines().count());

    let differing: Vec<(&str, &str)> = baseline
        .lines()
        .zip(healed.document.lines())
        .filter(|(a, b)| a != b)
        .map(|(a, b)| (a.trim(), b.trim()))
        .collect();
    assert_eq!(
        differing,
        vec![
            ("memory: 512Mi", "memory: 1024Mi"),
            ("memory: 512Mi", "memory: 1024Mi"),
        ]
    );
}

#[test]
fn always_failing_deploy_exhausts_retries() {
    let mut engine = engine(3);
    let mut deployer = ScriptedDeployer::always_failing(Some("OOMKilled"), HEAP_ERROR);

    let result = engine.run(JAVA_DEPLOYMENT, &mut deployer).unwrap();

    assert_eq!(result.final_status, FinalStatus::Exhausted);
    assert_eq!(result.total_attempts, 3);
    assert_eq!(result.attempts.len(), 3);
    assert_eq!(deployer.calls(), 3);
    assert_eq!(engine.audit_trail().len(), 3);
}

#[test]
fn deploy_succeeding_on_second_call() {
    let mut engine = engine(3);
    let mut deployer = ScriptedDeployer::new(vec![
        DeployOutcome::failed(Some("OOMKilled"), HEAP_ERROR),
        DeployOutcome::succeeded(),
    ]);

    let result = engine.run(JAVA_DEPLOYMENT, &mut deployer).unwrap();

    assert_eq!(result.final_status, FinalStatus::Success);
    assert_eq!(result.total_attempts, 2);
    assert_eq!(engine.audit_trail().len(), 1);
    assert_eq!(
        engine.audit_trail().entries()[0].category,
        FailureCategory::OutOfMemory
    );
    assert!(deployer.submitted()[1].contains("1024Mi"));
}

#[test]
fn each_attempt_heals_the_previous_document() {
    let mut engine = engine(3);
    let mut deployer = ScriptedDeployer::always_failing(Some("Pending"), "0/3 nodes are available: insufficient cpu");

    engine.run(JAVA_DEPLOYMENT, &mut deployer).unwrap();

    let cpus: Vec<Option<Value>> = deployer
        .submitted()
        .iter()
        .map(|doc| container_field(doc, &["resources", "requests", "cpu"]))
        .collect();
    assert_eq!(
        cpus,
        vec![
            Some(Value::String("4".into())),
            Some(Value::String("2".into())),
            Some(Value::String("1".into())),
        ]
    );
}

#[test]
fn audit_trail_exports_json() {
    let mut engine = engine(2);
    let mut deployer = ScriptedDeployer::always_failing(Some("CrashLoopBackOff"), "Back-off restarting failed container");
    engine.run(JAVA_DEPLOYMENT, &mut deployer).unwrap();

    let json: serde_json::Value = serde_json::from_str(&engine.audit_trail().to_json().unwrap()).unwrap();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["failure_type"], "CrashLoopBackOff");
    assert_eq!(entries[0]["risk_level"], "HIGH");
}
