//! Probe timing strategies.

use serde_yaml::{Mapping, Value};

use super::{set_field, Modification};
use crate::analyzer::Diagnosis;
use crate::manifest::{self, ContainerMut};

/// Handler keys a probe may use.
const HANDLERS: [&str; 4] = ["httpGet", "tcpSocket", "exec", "grpc"];

/// Window a startup probe allows before liveness checks take over.
const STARTUP_WINDOW_SECONDS: i64 = 300;
const DEFAULT_PERIOD_SECONDS: i64 = 10;

/// Reads an integer field. `Ok(None)` when absent, `Err(())` when the field
/// holds something that is not an integer.
fn read_int(probe: &Mapping, key: &str) -> Result<Option<i64>, ()> {
    match probe.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or(()),
    }
}

/// Adjusts one integer field of a probe. `compute` maps the current value
/// (absent as `None`) to the new one; `None` leaves the field alone.
fn adjust(
    probe: &mut Mapping,
    key: &str,
    path: &str,
    target: &str,
    modifications: &mut Vec<Modification>,
    compute: impl FnOnce(Option<i64>) -> Option<i64>,
) {
    let Ok(current) = read_int(probe, key) else {
        tracing::warn!(probe = target, key, "non-integer probe field left unchanged");
        return;
    };
    if let Some(new) = compute(current) {
        set_field(
            probe,
            key,
            manifest::int_value(new),
            format!("{path}.{key}"),
            target,
            modifications,
        );
    }
}

/// Delays liveness/readiness probes by 30s and adds a startup probe when
/// none exists.
///
/// The startup probe reuses the liveness (or readiness) handler, falling back
/// to a TCP check on the first container port, and allows a five minute
/// startup window at the existing probe period.
pub fn crash_loop(document: &mut Value, _diagnosis: &Diagnosis) -> Vec<Modification> {
    let mut modifications = Vec::new();

    for ContainerMut { path, name, fields } in manifest::containers_mut(document) {
        for kind in ["livenessProbe", "readinessProbe"] {
            let Some(probe) = manifest::child_mapping(fields, kind, false) else {
                continue;
            };
            adjust(
                probe,
                "initialDelaySeconds",
                &format!("{path}.{kind}"),
                &format!("{name}/{kind}"),
                &mut modifications,
                |delay| Some(delay.map_or(30, |d| d.saturating_add(30))),
            );
        }

        if fields.contains_key("startupProbe") {
            continue;
        }
        let Some(startup) = startup_probe(fields) else {
            tracing::debug!(container = %name, "no handler or port for a startup probe");
            continue;
        };
        set_field(
            fields,
            "startupProbe",
            Value::Mapping(startup),
            format!("{path}.startupProbe"),
            &format!("{name}/startupProbe"),
            &mut modifications,
        );
    }
    modifications
}

fn startup_probe(container: &Mapping) -> Option<Mapping> {
    let existing = ["livenessProbe", "readinessProbe"]
        .iter()
        .filter_map(|kind| container.get(*kind).and_then(Value::as_mapping));

    let mut period = None;
    let mut handler = None;
    for probe in existing {
        if period.is_none() {
            period = probe
                .get("periodSeconds")
                .and_then(Value::as_i64)
                .filter(|p| *p > 0);
        }
        if handler.is_none() {
            handler = HANDLERS
                .iter()
                .find_map(|key| probe.get(*key).map(|h| (*key, h.clone())));
        }
    }

    let (key, action) = match handler {
        Some(found) => found,
        None => {
            let port = container
                .get("ports")
                .and_then(Value::as_sequence)
                .and_then(|ports| ports.first())
                .and_then(|p| p.get("containerPort"))?
                .clone();
            let mut tcp = Mapping::new();
            tcp.insert("port".into(), port);
            ("tcpSocket", Value::Mapping(tcp))
        }
    };

    let period = period.unwrap_or(DEFAULT_PERIOD_SECONDS);
    let failure_threshold = STARTUP_WINDOW_SECONDS.saturating_add(period - 1) / period;

    let mut probe = Mapping::new();
    probe.insert(key.into(), action);
    probe.insert("periodSeconds".into(), manifest::int_value(period));
    probe.insert("failureThreshold".into(), manifest::int_value(failure_threshold));
    Some(probe)
}

/// Relaxes timing on every liveness, readiness and startup probe.
///
/// `initialDelaySeconds` grows by 15 and `timeoutSeconds` by 2 (at least 3).
/// `periodSeconds` and `failureThreshold` are raised to 10 and 3 only when
/// present and lower.
pub fn probe_failure(document: &mut Value, _diagnosis: &Diagnosis) -> Vec<Modification> {
    let mut modifications = Vec::new();

    for ContainerMut { path, name, fields } in manifest::containers_mut(document) {
        for kind in manifest::PROBE_KINDS {
            let Some(probe) = manifest::child_mapping(fields, kind, false) else {
                continue;
            };
            let probe_path = format!("{path}.{kind}");
            let target = format!("{name}/{kind}");

            adjust(probe, "initialDelaySeconds", &probe_path, &target, &mut modifications, |d| {
                Some(d.unwrap_or(0).saturating_add(15))
            });
            adjust(probe, "timeoutSeconds", &probe_path, &target, &mut modifications, |t| {
                Some(t.unwrap_or(1).saturating_add(2).max(3))
            });
            adjust(probe, "periodSeconds", &probe_path, &target, &mut modifications, |p| {
                p.filter(|p| *p < 10).map(|_| 10)
            });
            adjust(probe, "failureThreshold", &probe_path, &target, &mut modifications, |f| {
                f.filter(|f| *f < 3).map(|_| 3)
            });
        }
    }
    modifications
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::FailureCategory;
    use crate::healer::tests::diagnosis;

    fn container(value: &Value) -> &Value {
        manifest::get_path(value, &["spec", "template", "spec", "containers"])
            .and_then(|c| c.get(0))
            .unwrap()
    }

    const PROBED: &str = r#"
kind: Deployment
spec:
  template:
    spec:
      containers:
      - name: api
        ports:
        - containerPort: 8080
        livenessProbe:
          httpGet:
            path: /healthz
            port: 8080
          initialDelaySeconds: 10
          periodSeconds: 5
        readinessProbe:
          tcpSocket:
            port: 8080
"#;

    #[test]
    fn crash_loop_delays_probes_and_adds_startup_probe() {
        let mut value = manifest::parse(PROBED).unwrap();
        let mods = crash_loop(&mut value, &diagnosis(FailureCategory::CrashLoop));

        let c = container(&value);
        assert_eq!(c["livenessProbe"]["initialDelaySeconds"], manifest::int_value(40));
        assert_eq!(c["readinessProbe"]["initialDelaySeconds"], manifest::int_value(30));

        let startup = &c["startupProbe"];
        assert_eq!(startup["httpGet"]["path"], Value::String("/healthz".into()));
        assert_eq!(startup["periodSeconds"], manifest::int_value(5));
        assert_eq!(startup["failureThreshold"], manifest::int_value(60));

        assert_eq!(mods.len(), 3);
        assert_eq!(mods[1].old_value, Value::Null);
        assert_eq!(mods[2].field_path, "spec.template.spec.containers[0].startupProbe");
        assert_eq!(mods[2].target, "api/startupProbe");
    }

    #[test]
    fn crash_loop_falls_back_to_tcp_on_first_port() {
        let doc = "kind: Pod\nspec:\n  containers:\n  - name: w\n    ports:\n    - containerPort: 9000\n";
        let mut value = manifest::parse(doc).unwrap();
        let mods = crash_loop(&mut value, &diagnosis(FailureCategory::CrashLoop));

        assert_eq!(mods.len(), 1);
        let startup = &mods[0].new_value;
        assert_eq!(startup["tcpSocket"]["port"], manifest::int_value(9000));
        assert_eq!(startup["periodSeconds"], manifest::int_value(10));
        assert_eq!(startup["failureThreshold"], manifest::int_value(30));
    }

    #[test]
    fn crash_loop_keeps_existing_startup_probe() {
        let doc = "kind: Pod\nspec:\n  containers:\n  - name: w\n    startupProbe:\n      exec:\n        command: [true]\n";
        let mut value = manifest::parse(doc).unwrap();
        assert!(crash_loop(&mut value, &diagnosis(FailureCategory::CrashLoop)).is_empty());
    }

    #[test]
    fn probe_failure_relaxes_timing() {
        let doc = r#"
kind: Pod
spec:
  containers:
  - name: w
    readinessProbe:
      httpGet:
        path: /ready
        port: 80
      timeoutSeconds: 1
      periodSeconds: 5
      failureThreshold: 1
    startupProbe:
      tcpSocket:
        port: 80
      initialDelaySeconds: 5
      timeoutSeconds: 4
      periodSeconds: 20
"#;
        let mut value = manifest::parse(doc).unwrap();
        let mods = probe_failure(&mut value, &diagnosis(FailureCategory::ProbeFailure));

        let c = manifest::get_path(&value, &["spec", "containers"])
            .and_then(|c| c.get(0))
            .unwrap();
        let ready = &c["readinessProbe"];
        assert_eq!(ready["initialDelaySeconds"], manifest::int_value(15));
        assert_eq!(ready["timeoutSeconds"], manifest::int_value(3));
        assert_eq!(ready["periodSeconds"], manifest::int_value(10));
        assert_eq!(ready["failureThreshold"], manifest::int_value(3));

        let startup = &c["startupProbe"];
        assert_eq!(startup["initialDelaySeconds"], manifest::int_value(20));
        assert_eq!(startup["timeoutSeconds"], manifest::int_value(6));
        assert_eq!(startup["periodSeconds"], manifest::int_value(20));
        assert!(startup.get("failureThreshold").is_none());

        // 4 readiness changes + 2 startup changes.
        assert_eq!(mods.len(), 6);
        assert!(mods.iter().all(|m| m.target.starts_with("w/")));
    }

    #[test]
    fn huge_probe_values_saturate() {
        let doc = r#"
kind: Pod
spec:
  containers:
  - name: w
    livenessProbe:
      tcpSocket:
        port: 80
      initialDelaySeconds: 9223372036854775807
      timeoutSeconds: 9223372036854775807
      periodSeconds: 9223372036854775807
"#;
        let mut value = manifest::parse(doc).unwrap();
        let mods = crash_loop(&mut value, &diagnosis(FailureCategory::CrashLoop));

        // The delay is already at the maximum, so only the startup probe is added.
        assert_eq!(mods.len(), 1);
        let startup = &mods[0].new_value;
        assert_eq!(startup["periodSeconds"], manifest::int_value(i64::MAX));
        assert_eq!(startup["failureThreshold"], manifest::int_value(1));

        let mut value = manifest::parse(doc).unwrap();
        let mods = probe_failure(&mut value, &diagnosis(FailureCategory::ProbeFailure));
        assert!(mods.is_empty());
        let probe = &manifest::get_path(&value, &["spec", "containers"])
            .and_then(|c| c.get(0))
            .unwrap()["livenessProbe"];
        assert_eq!(probe["initialDelaySeconds"], manifest::int_value(i64::MAX));
    }

    #[test]
    fn probe_failure_without_probes_is_noop() {
        let doc = "kind: Pod\nspec:\n  containers:\n  - name: w\n    image: nginx:1.25\n";
        let mut value = manifest::parse(doc).unwrap();
        assert!(probe_failure(&mut value, &diagnosis(FailureCategory::ProbeFailure)).is_empty());
    }
}
