//! Diagnostic rule tables.
//!
//! Each category has five rules, one per [`RuleAngle`], listed in priority
//! order, plus a ranked list of fix suggestions with preconditions.

use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;

use super::AnalysisContext;
use crate::category::FailureCategory;
use crate::manifest::{self, ContainerRef, ImageRef};
use crate::quantity::{ByteQuantity, CpuQuantity};

/// What a rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAngle {
    /// Resource or field values present in the manifest.
    ResourceValues,
    /// Count or intensity indicators in the error text.
    Intensity,
    /// Expected fields that are missing.
    MissingField,
    /// Fields that disagree with each other or with the evidence.
    Consistency,
    /// Category-specific heuristics such as exit-code ranges.
    History,
}

/// A diagnostic rule.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Short identifier used as the evidence prefix.
    pub name: &'static str,
    pub angle: RuleAngle,
    /// Canonical explanation used as the root cause when this rule wins.
    pub explanation: &'static str,
    /// Returns evidence when the rule is satisfied.
    pub check: fn(&AnalysisContext<'_>) -> Option<String>,
}

/// A ranked remediation suggestion.
#[derive(Debug, Clone, Copy)]
pub struct FixSuggestion {
    pub text: &'static str,
    /// Whether the suggestion is consistent with the available evidence.
    pub applies: fn(&AnalysisContext<'_>) -> bool,
}

/// Fallback explanation when no rule fires.
pub fn typical_cause(category: FailureCategory) -> &'static str {
    match category {
        FailureCategory::OutOfMemory => "Container memory limit insufficient for application workload",
        FailureCategory::CrashLoop => {
            "Application crashes on startup due to configuration, dependencies, or code issues"
        }
        FailureCategory::ImagePullFailure => "Container image unavailable or inaccessible from cluster",
        FailureCategory::Pending => "Insufficient cluster resources to schedule pod",
        FailureCategory::ProbeFailure => "Health check probe failing to receive expected response",
        FailureCategory::NodeNotReady => "Node hosting the pod is unavailable",
        FailureCategory::Unknown => "Unknown cause",
    }
}

/// Rule list for a category, highest priority first.
pub fn rules_for(category: FailureCategory) -> Vec<Rule> {
    match category {
        FailureCategory::OutOfMemory => vec![
            Rule {
                name: "memory_limit_low",
                angle: RuleAngle::ResourceValues,
                explanation: "Container memory limit is too small for the application's working set",
                check: oom_small_limit,
            },
            Rule {
                name: "repeated_oom",
                angle: RuleAngle::Intensity,
                explanation: "Memory exhaustion recurs; the workload needs more headroom than allotted",
                check: oom_repeated,
            },
            Rule {
                name: "memory_limit_missing",
                angle: RuleAngle::MissingField,
                explanation: "No memory limit is declared, so the container is bounded only by node pressure",
                check: oom_missing_limit,
            },
            Rule {
                name: "heap_exceeds_limit",
                angle: RuleAngle::Consistency,
                explanation: "JVM maximum heap leaves too little room below the container memory limit",
                check: oom_heap_vs_limit,
            },
            Rule {
                name: "oom_killer_exit",
                angle: RuleAngle::History,
                explanation: "The kernel OOM killer terminated the container (SIGKILL, exit code 137)",
                check: oom_exit_code,
            },
        ],
        FailureCategory::CrashLoop => vec![
            Rule {
                name: "probe_delay_short",
                angle: RuleAngle::ResourceValues,
                explanation: "Liveness probe starts before the application finishes booting, so it is killed during startup",
                check: crash_short_probe_delay,
            },
            Rule {
                name: "restart_storm",
                angle: RuleAngle::Intensity,
                explanation: "Container restarts repeatedly; the failure is deterministic on every start",
                check: crash_restart_storm,
            },
            Rule {
                name: "missing_configuration",
                angle: RuleAngle::MissingField,
                explanation: "Application exits at startup because required environment variables or files are missing",
                check: crash_missing_configuration,
            },
            Rule {
                name: "probe_port_mismatch",
                angle: RuleAngle::Consistency,
                explanation: "Probe targets a port the container does not expose, so health checks never pass",
                check: probe_port_mismatch,
            },
            Rule {
                name: "error_exit_code",
                angle: RuleAngle::History,
                explanation: "The process exits with an error code immediately after starting",
                check: crash_exit_code,
            },
        ],
        FailureCategory::ImagePullFailure => vec![
            Rule {
                name: "mutable_tag",
                angle: RuleAngle::ResourceValues,
                explanation: "Image uses a mutable tag that may not resolve in the registry",
                check: image_mutable_tag,
            },
            Rule {
                name: "repeated_pull_failures",
                angle: RuleAngle::Intensity,
                explanation: "Pulls fail consistently; the reference is wrong rather than the registry being flaky",
                check: image_repeated_failures,
            },
            Rule {
                name: "pull_secret_missing",
                angle: RuleAngle::MissingField,
                explanation: "Registry requires credentials but no imagePullSecrets are configured",
                check: image_missing_pull_secret,
            },
            Rule {
                name: "image_not_declared",
                angle: RuleAngle::Consistency,
                explanation: "The failing image reference does not match the manifest; a stale revision may be deployed",
                check: image_not_declared,
            },
            Rule {
                name: "image_not_found",
                angle: RuleAngle::History,
                explanation: "The requested image or tag does not exist in the registry",
                check: image_not_found,
            },
        ],
        FailureCategory::Pending => vec![
            Rule {
                name: "large_requests",
                angle: RuleAngle::ResourceValues,
                explanation: "Resource requests exceed what any node can offer",
                check: pending_large_requests,
            },
            Rule {
                name: "insufficient_capacity",
                angle: RuleAngle::Intensity,
                explanation: "No node has enough free capacity for the pod's requests",
                check: pending_insufficient_capacity,
            },
            Rule {
                name: "toleration_missing",
                angle: RuleAngle::MissingField,
                explanation: "Nodes carry taints the pod does not tolerate",
                check: pending_missing_toleration,
            },
            Rule {
                name: "selector_excludes_nodes",
                angle: RuleAngle::Consistency,
                explanation: "Node selector or affinity rules exclude every available node",
                check: pending_selector_conflict,
            },
            Rule {
                name: "volume_unbound",
                angle: RuleAngle::History,
                explanation: "A PersistentVolumeClaim is unbound, blocking scheduling",
                check: pending_unbound_volume,
            },
        ],
        FailureCategory::ProbeFailure => vec![
            Rule {
                name: "probe_timeout_short",
                angle: RuleAngle::ResourceValues,
                explanation: "Probe timeout is too short for the endpoint to respond",
                check: probe_short_timeout,
            },
            Rule {
                name: "repeated_probe_failures",
                angle: RuleAngle::Intensity,
                explanation: "Probes fail repeatedly; the endpoint is consistently unavailable",
                check: probe_repeated_failures,
            },
            Rule {
                name: "initial_delay_missing",
                angle: RuleAngle::MissingField,
                explanation: "Probes begin before the application is ready because no initial delay is set",
                check: probe_missing_delay,
            },
            Rule {
                name: "probe_port_mismatch",
                angle: RuleAngle::Consistency,
                explanation: "Probe targets a port the container does not expose",
                check: probe_port_mismatch,
            },
            Rule {
                name: "endpoint_http_error",
                angle: RuleAngle::History,
                explanation: "Health endpoint answers with HTTP errors; the path is wrong or the app is unhealthy",
                check: probe_http_status,
            },
        ],
        FailureCategory::NodeNotReady => vec![
            Rule {
                name: "single_replica",
                angle: RuleAngle::ResourceValues,
                explanation: "A single replica leaves no capacity when its node fails",
                check: node_single_replica,
            },
            Rule {
                name: "multiple_nodes_down",
                angle: RuleAngle::Intensity,
                explanation: "Several nodes are unavailable at once, pointing at a cluster-level outage",
                check: node_multiple_down,
            },
            Rule {
                name: "toleration_missing",
                angle: RuleAngle::MissingField,
                explanation: "Pods have no tolerations for not-ready or unreachable nodes",
                check: node_missing_toleration,
            },
            Rule {
                name: "pinned_to_node",
                angle: RuleAngle::Consistency,
                explanation: "Pod is pinned to specific nodes and cannot move off the failed node",
                check: node_pinned,
            },
            Rule {
                name: "kubelet_silent",
                angle: RuleAngle::History,
                explanation: "The kubelet stopped reporting; the node is down or partitioned",
                check: node_kubelet_silent,
            },
        ],
        FailureCategory::Unknown => Vec::new(),
    }
}

/// Ranked fix suggestions for a category.
pub fn suggestions_for(category: FailureCategory) -> Vec<FixSuggestion> {
    match category {
        FailureCategory::OutOfMemory => vec![
            FixSuggestion {
                text: "Increase the memory limit and request by 100%",
                applies: has_memory_settings,
            },
            FixSuggestion {
                text: "Declare explicit memory requests and limits",
                applies: |ctx| oom_missing_limit(ctx).is_some(),
            },
            FixSuggestion {
                text: "Lower the JVM -Xmx so the heap fits under the container limit",
                applies: |ctx| ctx.mentions(&["-xmx", "java heap", "java.lang.outofmemoryerror"]),
            },
            FixSuggestion {
                text: "Profile the application for memory leaks",
                applies: always,
            },
        ],
        FailureCategory::CrashLoop => vec![
            FixSuggestion {
                text: "Increase liveness/readiness probe initialDelaySeconds",
                applies: |ctx| has_probe(ctx, &["livenessProbe", "readinessProbe"]),
            },
            FixSuggestion {
                text: "Add a startup probe for slow-starting applications",
                applies: |ctx| {
                    ctx.containers()
                        .iter()
                        .any(|c| c.probe("startupProbe").is_none())
                },
            },
            FixSuggestion {
                text: "Provide the missing environment variables or configuration files",
                applies: |ctx| crash_missing_configuration(ctx).is_some(),
            },
            FixSuggestion {
                text: "Inspect the previous container's logs for the crash cause",
                applies: always,
            },
        ],
        FailureCategory::ImagePullFailure => vec![
            FixSuggestion {
                text: "Verify the image name and registry",
                applies: always,
            },
            FixSuggestion {
                text: "Add imagePullSecrets for the private registry",
                applies: |ctx| ctx.mentions(AUTH_MARKERS),
            },
            FixSuggestion {
                text: "Pin an explicit image tag instead of :latest",
                applies: |ctx| image_mutable_tag(ctx).is_some(),
            },
        ],
        FailureCategory::Pending => vec![
            FixSuggestion {
                text: "Reduce memory requests",
                applies: |ctx| has_request(ctx, "memory"),
            },
            FixSuggestion {
                text: "Reduce CPU requests",
                applies: |ctx| has_request(ctx, "cpu"),
            },
            FixSuggestion {
                text: "Review node selectors and affinity rules",
                applies: |ctx| has_node_constraints(ctx) || ctx.mentions(&["selector", "affinity"]),
            },
            FixSuggestion {
                text: "Add tolerations for tainted nodes",
                applies: |ctx| ctx.mentions(&["taint"]),
            },
            FixSuggestion {
                text: "Add cluster capacity or free resources on existing nodes",
                applies: always,
            },
        ],
        FailureCategory::ProbeFailure => vec![
            FixSuggestion {
                text: "Increase probe initialDelaySeconds",
                applies: |ctx| has_probe(ctx, &manifest::PROBE_KINDS),
            },
            FixSuggestion {
                text: "Increase probe timeoutSeconds",
                applies: |ctx| has_probe(ctx, &manifest::PROBE_KINDS),
            },
            FixSuggestion {
                text: "Verify the health check path and port",
                applies: always,
            },
        ],
        FailureCategory::NodeNotReady => vec![
            FixSuggestion {
                text: "Cordon and drain the unhealthy node",
                applies: always,
            },
            FixSuggestion {
                text: "Run more than one replica",
                applies: |ctx| node_single_replica(ctx).is_some(),
            },
            FixSuggestion {
                text: "Relax nodeName/nodeSelector pinning",
                applies: |ctx| node_pinned(ctx).is_some(),
            },
        ],
        FailureCategory::Unknown => Vec::new(),
    }
}

const OOM_MARKERS: &[&str] = &[
    "oomkilled",
    "outofmemory",
    "out of memory",
    "java heap space",
    "gc overhead limit exceeded",
    "memory limit",
];

const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "authentication required",
    "pull access denied",
    "denied",
    "credentials",
];

static XMX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-Xmx(\d+)([kKmMgG])?").expect("xmx pattern is valid"));

static RESTARTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)restart\s*count:?\s*(\d+)|restarted\s+(\d+)\s+times")
        .expect("restart pattern is valid")
});

static NODES_AVAILABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)/(\d+) nodes are available").expect("nodes pattern is valid")
});

static HTTP_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)status\s*code:?\s*(\d{3})").expect("status code pattern is valid")
});

static NODE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)node\s+([a-z0-9][a-z0-9.-]*)\s+(?:is\s+)?not\s*ready")
        .expect("node name pattern is valid")
});

fn always(_: &AnalysisContext<'_>) -> bool {
    true
}

fn memory_of(container: &ContainerRef<'_>, section: &str) -> Option<ByteQuantity> {
    container
        .resource(section, "memory")
        .and_then(manifest::scalar_text)
        .and_then(|text| ByteQuantity::parse(&text))
}

fn has_memory_settings(ctx: &AnalysisContext<'_>) -> bool {
    ctx.containers()
        .iter()
        .any(|c| memory_of(c, "limits").is_some() || memory_of(c, "requests").is_some())
}

fn has_request(ctx: &AnalysisContext<'_>, resource: &str) -> bool {
    ctx.containers()
        .iter()
        .any(|c| c.resource("requests", resource).is_some())
}

fn has_probe(ctx: &AnalysisContext<'_>, kinds: &[&str]) -> bool {
    ctx.containers()
        .iter()
        .any(|c| kinds.iter().any(|k| c.probe(k).is_some()))
}

fn has_node_constraints(ctx: &AnalysisContext<'_>) -> bool {
    ctx.pod_spec().is_some_and(|spec| {
        spec.contains_key("nodeSelector") || spec.contains_key("affinity")
    })
}

fn first_line_with<'t>(text: &'t str, needles: &[&str]) -> Option<&'t str> {
    text.lines().map(str::trim).find(|line| {
        let lower = line.to_lowercase();
        needles.iter().any(|n| lower.contains(n))
    })
}

// Out of memory

fn oom_small_limit(ctx: &AnalysisContext<'_>) -> Option<String> {
    let threshold = ByteQuantity::parse("512Mi")?;
    ctx.containers().iter().find_map(|c| {
        let (section, value) = memory_of(c, "limits")
            .map(|q| ("limit", q))
            .or_else(|| memory_of(c, "requests").map(|q| ("request", q)))?;
        (value <= threshold).then(|| format!("container '{}' memory {} is {}", c.name, section, value))
    })
}

fn oom_repeated(ctx: &AnalysisContext<'_>) -> Option<String> {
    let events = ctx.count(OOM_MARKERS) + ctx.exit_codes().iter().filter(|&&c| c == 137).count();
    (events >= 2).then(|| format!("{events} memory exhaustion indicators in logs"))
}

fn oom_missing_limit(ctx: &AnalysisContext<'_>) -> Option<String> {
    ctx.containers()
        .iter()
        .find(|c| memory_of(c, "limits").is_none())
        .map(|c| format!("container '{}' declares no memory limit", c.name))
}

fn oom_heap_vs_limit(ctx: &AnalysisContext<'_>) -> Option<String> {
    for container in ctx.containers() {
        let Some(limit) = memory_of(&container, "limits") else {
            continue;
        };
        let haystack = format!(
            "{}\n{}",
            ctx.text(),
            serde_yaml::to_string(container.fields).unwrap_or_default()
        );
        let Some(caps) = XMX.captures(&haystack) else {
            continue;
        };
        let amount: u64 = caps.get(1)?.as_str().parse().ok()?;
        let factor: u64 = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
            Some("k") => 1 << 10,
            Some("m") => 1 << 20,
            Some("g") => 1 << 30,
            _ => 1,
        };
        let heap = amount.saturating_mul(factor);
        // Leave at least a quarter of the limit for metaspace, threads and buffers.
        if heap.saturating_mul(4) >= limit.bytes().saturating_mul(3) {
            return Some(format!(
                "container '{}' heap {} against memory limit {}",
                container.name,
                caps.get(0).map_or("", |m| m.as_str()),
                limit
            ));
        }
    }
    None
}

fn oom_exit_code(ctx: &AnalysisContext<'_>) -> Option<String> {
    ctx.exit_codes()
        .contains(&137)
        .then(|| "exit code 137 (SIGKILL from the OOM killer)".to_string())
}

// Crash loop

fn crash_short_probe_delay(ctx: &AnalysisContext<'_>) -> Option<String> {
    ctx.containers().iter().find_map(|c| {
        let probe = c.probe("livenessProbe")?;
        let delay = manifest::int_field(probe, "initialDelaySeconds").unwrap_or(0);
        (delay < 30).then(|| {
            format!(
                "container '{}' liveness probe starts after {}s",
                c.name, delay
            )
        })
    })
}

fn crash_restart_storm(ctx: &AnalysisContext<'_>) -> Option<String> {
    let restarts = RESTARTS
        .captures_iter(ctx.text())
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .max();
    match restarts {
        Some(n) if n >= 3 => Some(format!("container restarted {n} times")),
        _ if ctx.mentions(&["back-off restarting", "backoff restarting"]) => {
            Some("kubelet is backing off restarts".to_string())
        }
        _ => None,
    }
}

fn crash_missing_configuration(ctx: &AnalysisContext<'_>) -> Option<String> {
    first_line_with(
        ctx.text(),
        &[
            "not set",
            "missing env",
            "environment variable",
            "no such file",
            "file not found",
            "filenotfoundexception",
        ],
    )
    .map(str::to_string)
}

fn crash_exit_code(ctx: &AnalysisContext<'_>) -> Option<String> {
    let code = ctx.exit_codes().iter().copied().find(|&c| c != 0 && c != 137)?;
    let meaning = match code {
        1..=125 => "application error",
        126 => "entrypoint not executable",
        127 => "entrypoint not found",
        139 => "segmentation fault",
        143 => "terminated by SIGTERM",
        _ => "killed by signal",
    };
    Some(format!("exit code {code} ({meaning})"))
}

fn probe_port(probe: &serde_yaml::Mapping) -> Option<&Value> {
    ["httpGet", "tcpSocket", "grpc"]
        .iter()
        .find_map(|handler| probe.get(*handler).and_then(|h| h.get("port")))
}

fn probe_port_mismatch(ctx: &AnalysisContext<'_>) -> Option<String> {
    for container in ctx.containers() {
        let Some(ports) = container.fields.get("ports").and_then(Value::as_sequence) else {
            continue;
        };
        if ports.is_empty() {
            continue;
        }
        for kind in manifest::PROBE_KINDS {
            let Some(port) = container.probe(kind).and_then(probe_port) else {
                continue;
            };
            let exposed = ports.iter().any(|p| match port {
                Value::Number(n) => p.get("containerPort").and_then(Value::as_u64) == n.as_u64(),
                Value::String(name) => p.get("name").and_then(Value::as_str) == Some(name.as_str()),
                _ => true,
            });
            if !exposed {
                let shown = manifest::scalar_text(port).unwrap_or_default();
                return Some(format!(
                    "container '{}' {} targets port {} which is not declared",
                    container.name, kind, shown
                ));
            }
        }
    }
    None
}

// Image pull

fn image_mutable_tag(ctx: &AnalysisContext<'_>) -> Option<String> {
    ctx.containers().iter().find_map(|c| {
        let image = c.image()?;
        ImageRef::parse(image)?
            .is_mutable()
            .then(|| format!("container '{}' uses mutable image '{}'", c.name, image))
    })
}

fn image_repeated_failures(ctx: &AnalysisContext<'_>) -> Option<String> {
    let failures = ctx.count(&["failed to pull", "errimagepull", "back-off pulling image"]);
    (failures >= 2).then(|| format!("{failures} failed pull attempts in logs"))
}

fn image_missing_pull_secret(ctx: &AnalysisContext<'_>) -> Option<String> {
    if !ctx.mentions(AUTH_MARKERS) {
        return None;
    }
    let configured = ctx
        .pod_spec()
        .and_then(|spec| spec.get("imagePullSecrets"))
        .and_then(Value::as_sequence)
        .is_some_and(|secrets| !secrets.is_empty());
    (ctx.document().is_some() && !configured)
        .then(|| "registry denied access and no imagePullSecrets are set".to_string())
}

fn image_not_declared(ctx: &AnalysisContext<'_>) -> Option<String> {
    let declared: Vec<ImageRef> = ctx
        .containers()
        .iter()
        .filter_map(|c| c.image().and_then(ImageRef::parse))
        .collect();
    if declared.is_empty() {
        return None;
    }
    ctx.referenced_images()
        .iter()
        .filter_map(|r| ImageRef::parse(r))
        .find(|r| !declared.iter().any(|d| d.repository == r.repository))
        .map(|r| format!("pull error names '{r}', which no container declares"))
}

fn image_not_found(ctx: &AnalysisContext<'_>) -> Option<String> {
    first_line_with(
        ctx.text(),
        &["not found", "manifest unknown", "no such image", "does not exist"],
    )
    .map(str::to_string)
}

// Pending

fn pending_large_requests(ctx: &AnalysisContext<'_>) -> Option<String> {
    let memory_ceiling = ByteQuantity::parse("4Gi")?;
    let cpu_ceiling = CpuQuantity::from_millis(2000);
    ctx.containers().iter().find_map(|c| {
        let memory = memory_of(c, "requests").filter(|m| *m >= memory_ceiling);
        let cpu = c
            .resource("requests", "cpu")
            .and_then(manifest::scalar_text)
            .and_then(|t| CpuQuantity::parse(&t))
            .filter(|q| *q >= cpu_ceiling);
        match (memory, cpu) {
            (Some(m), _) => Some(format!("container '{}' requests {} memory", c.name, m)),
            (None, Some(q)) => Some(format!("container '{}' requests {} CPU", c.name, q)),
            _ => None,
        }
    })
}

fn pending_insufficient_capacity(ctx: &AnalysisContext<'_>) -> Option<String> {
    if let Some(caps) = NODES_AVAILABLE.captures(ctx.text()) {
        let available = caps.get(1)?.as_str();
        let total = caps.get(2)?.as_str();
        if available == "0" {
            return Some(format!("0/{total} nodes are available"));
        }
    }
    first_line_with(ctx.text(), &["insufficient memory", "insufficient cpu", "no nodes available"])
        .map(str::to_string)
}

fn pending_missing_toleration(ctx: &AnalysisContext<'_>) -> Option<String> {
    if !ctx.mentions(&["taint"]) {
        return None;
    }
    let tolerates = ctx
        .pod_spec()
        .is_some_and(|spec| spec.contains_key("tolerations"));
    (!tolerates).then(|| "scheduler reports taints and the pod has no tolerations".to_string())
}

fn pending_selector_conflict(ctx: &AnalysisContext<'_>) -> Option<String> {
    (has_node_constraints(ctx) && ctx.mentions(&["node selector", "affinity", "nodeselector"]))
        .then(|| "pod declares nodeSelector/affinity and the scheduler rejected nodes for it".to_string())
}

fn pending_unbound_volume(ctx: &AnalysisContext<'_>) -> Option<String> {
    first_line_with(ctx.text(), &["persistentvolumeclaim", "unbound"]).map(str::to_string)
}

// Probe failure

fn probe_short_timeout(ctx: &AnalysisContext<'_>) -> Option<String> {
    ctx.containers().iter().find_map(|c| {
        manifest::PROBE_KINDS.iter().find_map(|kind| {
            let probe = c.probe(kind)?;
            let timeout = manifest::int_field(probe, "timeoutSeconds").unwrap_or(1);
            (timeout <= 1).then(|| format!("container '{}' {} timeout is {}s", c.name, kind, timeout))
        })
    })
}

fn probe_repeated_failures(ctx: &AnalysisContext<'_>) -> Option<String> {
    let failures = ctx.count(&["probe failed"]) + ctx.count(&["unhealthy"]);
    (failures >= 2).then(|| format!("{failures} probe failures in logs"))
}

fn probe_missing_delay(ctx: &AnalysisContext<'_>) -> Option<String> {
    ctx.containers().iter().find_map(|c| {
        ["livenessProbe", "readinessProbe"].iter().find_map(|kind| {
            let probe = c.probe(kind)?;
            (!probe.contains_key("initialDelaySeconds"))
                .then(|| format!("container '{}' {} has no initialDelaySeconds", c.name, kind))
        })
    })
}

fn probe_http_status(ctx: &AnalysisContext<'_>) -> Option<String> {
    let code: u16 = HTTP_STATUS.captures(ctx.text())?.get(1)?.as_str().parse().ok()?;
    match code {
        404 => Some("health endpoint returned 404 (path not found)".to_string()),
        400..=599 => Some(format!("health endpoint returned HTTP {code}")),
        _ => None,
    }
}

// Node not ready

fn node_single_replica(ctx: &AnalysisContext<'_>) -> Option<String> {
    let doc = ctx.document()?;
    if manifest::pod_spec(doc).is_none() {
        return None;
    }
    let replicas = manifest::get_path(doc, &["spec", "replicas"])
        .and_then(Value::as_u64)
        .unwrap_or(1);
    (replicas <= 1).then(|| format!("workload runs {replicas} replica"))
}

fn node_multiple_down(ctx: &AnalysisContext<'_>) -> Option<String> {
    let mut nodes: Vec<String> = NODE_NAME
        .captures_iter(ctx.text())
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_lowercase()))
        .collect();
    nodes.sort();
    nodes.dedup();
    (nodes.len() >= 2).then(|| format!("{} nodes not ready: {}", nodes.len(), nodes.join(", ")))
}

fn node_missing_toleration(ctx: &AnalysisContext<'_>) -> Option<String> {
    let spec = ctx.pod_spec()?;
    let tolerated = spec
        .get("tolerations")
        .and_then(Value::as_sequence)
        .is_some_and(|items| {
            items.iter().any(|t| {
                t.get("key").and_then(Value::as_str).is_some_and(|k| {
                    k == "node.kubernetes.io/not-ready" || k == "node.kubernetes.io/unreachable"
                })
            })
        });
    (!tolerated).then(|| "no tolerations for node.kubernetes.io/not-ready or unreachable".to_string())
}

fn node_pinned(ctx: &AnalysisContext<'_>) -> Option<String> {
    let spec = ctx.pod_spec()?;
    ["nodeName", "nodeSelector"]
        .iter()
        .find(|key| spec.contains_key(**key))
        .map(|key| format!("pod spec sets {key}"))
}

fn node_kubelet_silent(ctx: &AnalysisContext<'_>) -> Option<String> {
    first_line_with(
        ctx.text(),
        &["kubelet stopped posting", "node.kubernetes.io/unreachable", "node is unreachable"],
    )
    .map(str::to_string)
}
