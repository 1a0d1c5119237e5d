//! Self-healing engine.
//!
//! Orchestrates detection, diagnosis and healing for one failure event, and
//! drives the bounded deploy/heal/redeploy loop against a [`Deployer`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analyzer::{Diagnosis, RootCauseAnalyzer};
use crate::audit::{AuditTrail, RemediationAction};
use crate::backoff::ExponentialBackoff;
use crate::catalog::PatternCatalog;
use crate::category::FailureCategory;
use crate::config::{EngineConfig, Validate};
use crate::deploy::Deployer;
use crate::detector::FailureDetector;
use crate::error::{Error, Result};
use crate::healer::{Healed, ManifestHealer, StrategyTable};

/// Lifecycle phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Idle,
    Detecting,
    Diagnosing,
    Healing,
    Deploying,
    Succeeded,
    /// The last deploy failed; healing follows.
    Failed,
    ExhaustedRetries,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "EXHAUSTED")]
    Exhausted,
}

/// Outcome of a single deploy attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttemptResult {
    Success,
    Failed,
}

/// One deploy attempt within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_number: u32,
    pub timestamp: DateTime<Utc>,
    /// `SUCCESS`, or `FAILED` with the reported status label.
    pub deployment_status: String,
    /// True when healing changed the document for the next attempt.
    pub healing_applied: bool,
    /// Category the failure was healed as.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failure_type: Option<FailureCategory>,
    pub result: AttemptResult,
    /// Wait before the next attempt.
    pub backoff_ms: u64,
}

/// Summary of a full self-healing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub final_status: FinalStatus,
    pub total_attempts: u32,
    pub attempts: Vec<AttemptRecord>,
    /// The last document submitted (or that would be submitted next).
    pub final_document: String,
    pub execution_time_ms: u64,
}

impl RunResult {
    /// True when the run ended with a successful deploy.
    pub fn succeeded(&self) -> bool {
        self.final_status == FinalStatus::Success
    }
}

/// Detects, diagnoses and heals deployment failures.
#[derive(Debug, Clone)]
pub struct SelfHealingEngine {
    detector: FailureDetector,
    analyzer: RootCauseAnalyzer,
    healer: ManifestHealer,
    config: EngineConfig,
    audit: AuditTrail,
    state: EngineState,
}

impl Default for SelfHealingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelfHealingEngine {
    /// Creates an engine with the built-in catalog and default configuration.
    pub fn new() -> Self {
        let catalog = Arc::new(PatternCatalog::default());
        Self {
            detector: FailureDetector::new(Arc::clone(&catalog)),
            analyzer: RootCauseAnalyzer::new(catalog),
            healer: ManifestHealer::default(),
            config: EngineConfig::default(),
            audit: AuditTrail::new(),
            state: EngineState::Idle,
        }
    }

    /// Creates an engine with `config`, rejecting invalid settings.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let warnings = config.validate().into_result()?;
        for warning in &warnings {
            tracing::warn!(%warning, "engine configuration");
        }
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Replaces the pattern catalog used for detection and analysis.
    pub fn with_catalog(mut self, catalog: Arc<PatternCatalog>) -> Self {
        self.detector = FailureDetector::new(Arc::clone(&catalog));
        self.analyzer = RootCauseAnalyzer::new(catalog);
        self
    }

    /// Replaces the healing strategy table.
    pub fn with_strategies(mut self, strategies: StrategyTable) -> Self {
        self.healer = ManifestHealer::new(strategies);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Remediation history of this engine.
    pub fn audit_trail(&self) -> &AuditTrail {
        &self.audit
    }

    fn transition(&mut self, next: EngineState) {
        tracing::debug!(from = ?self.state, to = ?next, "engine state");
        self.state = next;
    }

    /// Runs one detect/diagnose/heal pass and records it in the audit trail.
    ///
    /// Returns the healed document (the original when nothing could be
    /// changed) and the recorded action.
    pub fn diagnose_and_heal(
        &mut self,
        error_text: &str,
        document: &str,
        status_label: Option<&str>,
    ) -> Result<(String, RemediationAction)> {
        let result = self.heal_once(error_text, document, status_label);
        self.transition(EngineState::Idle);
        result
    }

    fn heal_once(
        &mut self,
        error_text: &str,
        document: &str,
        status_label: Option<&str>,
    ) -> Result<(String, RemediationAction)> {
        self.transition(EngineState::Detecting);
        let detection = self.detector.detect_top(error_text, status_label);

        self.transition(EngineState::Diagnosing);
        let diagnosis = match detection.category {
            FailureCategory::Unknown => Diagnosis::undiagnosed(error_text),
            category => self.analyzer.analyze(category, error_text, document),
        };

        self.transition(EngineState::Healing);
        let mut evidence: Vec<String> = detection
            .matched_signatures
            .iter()
            .map(|sig| format!("signature: {sig}"))
            .collect();
        evidence.extend(diagnosis.evidence.iter().cloned());

        let healed = match self.healer.heal(diagnosis.category, document, &diagnosis) {
            Ok(healed) => healed,
            Err(Error::MalformedDocument(reason)) => {
                tracing::warn!(%reason, "document could not be parsed; leaving it unchanged");
                evidence.push(format!("malformed document: {reason}"));
                Healed {
                    document: document.to_string(),
                    modifications: Vec::new(),
                }
            }
            Err(e) => {
                self.transition(EngineState::Failed);
                return Err(e);
            }
        };

        let action = RemediationAction {
            category: diagnosis.category,
            root_cause: diagnosis.root_cause,
            confidence: diagnosis.confidence,
            evidence,
            modifications: healed.modifications,
            healing_rationale: format!(
                "Applied {} remediation strategy with {}% confidence",
                diagnosis.category, diagnosis.confidence
            ),
            risk_level: diagnosis.severity,
            timestamp: Utc::now(),
        };
        tracing::info!(
            failure_type = %action.category,
            detection_confidence = detection.confidence,
            confidence = action.confidence,
            risk = %action.risk_level,
            modifications = action.modifications.len(),
            "remediation planned"
        );

        self.audit.append(action.clone());
        Ok((healed.document, action))
    }

    /// Deploys `initial_document`, healing and redeploying after each failure
    /// until a deploy succeeds or `max_retries` attempts are used.
    ///
    /// Every failed attempt is diagnosed and healed, including the last one,
    /// so an exhausted run leaves one audit entry per attempt.
    pub fn run<D>(&mut self, initial_document: &str, deployer: &mut D) -> Result<RunResult>
    where
        D: Deployer + ?Sized,
    {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let max_retries = self.config.max_retries;
        let backoff = ExponentialBackoff::new(self.config.backoff_unit(), self.config.max_backoff_units);

        let mut document = initial_document.to_string();
        let mut attempts = Vec::new();
        tracing::info!(%run_id, max_retries, "starting self-healing run");

        for attempt in 1..=max_retries {
            self.transition(EngineState::Deploying);
            tracing::info!(attempt, max_retries, "deploying");
            let outcome = deployer.deploy(&document);

            if outcome.success {
                self.transition(EngineState::Succeeded);
                tracing::info!(attempt, "deployment succeeded");
                attempts.push(AttemptRecord {
                    attempt_number: attempt,
                    timestamp: Utc::now(),
                    deployment_status: "SUCCESS".to_string(),
                    healing_applied: false,
                    failure_type: None,
                    result: AttemptResult::Success,
                    backoff_ms: 0,
                });
                return Ok(RunResult {
                    run_id,
                    final_status: FinalStatus::Success,
                    total_attempts: attempt,
                    attempts,
                    final_document: document,
                    execution_time_ms: elapsed_ms(started),
                });
            }

            self.transition(EngineState::Failed);
            let status = outcome.status_label.as_deref();
            tracing::warn!(attempt, status = status.unwrap_or("unknown"), "deployment failed");

            let (healed, action) = self.heal_once(&outcome.error_text, &document, status)?;
            let delay = if attempt < max_retries {
                backoff.delay_for_attempt(attempt)
            } else {
                Duration::ZERO
            };

            attempts.push(AttemptRecord {
                attempt_number: attempt,
                timestamp: Utc::now(),
                deployment_status: match status {
                    Some(label) => format!("FAILED - {label}"),
                    None => "FAILED".to_string(),
                },
                healing_applied: !action.modifications.is_empty(),
                failure_type: Some(action.category),
                result: AttemptResult::Failed,
                backoff_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            });
            document = healed;

            if !delay.is_zero() {
                tracing::info!(delay_ms = %delay.as_millis(), "waiting before redeploy");
                std::thread::sleep(delay);
            }
        }

        self.transition(EngineState::ExhaustedRetries);
        tracing::warn!(max_retries, "retries exhausted");
        Ok(RunResult {
            run_id,
            final_status: FinalStatus::Exhausted,
            total_attempts: max_retries,
            attempts,
            final_document: document,
            execution_time_ms: elapsed_ms(started),
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
