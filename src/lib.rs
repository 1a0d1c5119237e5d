//! Self-healing engine for Kubernetes deployments.
//!
//! Given failure evidence (error text and an optional status label) and the
//! workload manifest, the engine classifies the failure, explains it with
//! scored evidence, and rewrites the manifest to address the cause. In loop
//! mode it redeploys the healed manifest through a [`Deployer`] with
//! exponential backoff, recording every remediation in an [`AuditTrail`].

pub mod analyzer;
pub mod audit;
pub mod backoff;
pub mod catalog;
pub mod category;
pub mod config;
pub mod deploy;
pub mod detector;
pub mod engine;
pub mod error;
pub mod healer;
pub mod manifest;
pub mod quantity;

pub use analyzer::{Diagnosis, RootCauseAnalyzer};
pub use audit::{AuditTrail, RemediationAction};
pub use backoff::ExponentialBackoff;
pub use catalog::{CatalogEntry, PatternCatalog, Signature};
pub use category::{FailureCategory, RiskLevel};
pub use config::{EngineConfig, Validate, ValidationResult};
pub use deploy::{DeployOutcome, Deployer, ScriptedDeployer};
pub use detector::{DetectionResult, FailureDetector};
pub use engine::{AttemptRecord, AttemptResult, EngineState, FinalStatus, RunResult, SelfHealingEngine};
pub use error::{Error, Result};
pub use healer::{Healed, ManifestHealer, Modification, Strategy, StrategyTable};
