//! Self-heal CLI
//!
//! Diagnoses one failure and prints the remediation and the healed manifest.

use std::path::Path;

use self_healing::{EngineConfig, SelfHealingEngine};

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <manifest.yaml> <error-log> [status-label]", args[0]);
        eprintln!("\nDiagnoses a deployment failure and prints the healed manifest.");
        eprintln!("\nEnvironment variables:");
        eprintln!("  SELF_HEAL_CONFIG=<path>  TOML engine configuration");
        std::process::exit(1);
    }

    if let Err(e) = run(Path::new(&args[1]), Path::new(&args[2]), args.get(3).map(String::as_str)) {
        eprintln!("self-heal failed: {}", e);
        std::process::exit(1);
    }
}

fn run(manifest_path: &Path, log_path: &Path, status_label: Option<&str>) -> self_healing::Result<()> {
    let config = match std::env::var("SELF_HEAL_CONFIG") {
        Ok(path) => {
            tracing::info!(%path, "loading configuration");
            EngineConfig::load(path)?
        }
        Err(_) => EngineConfig::default(),
    };
    let mut engine = SelfHealingEngine::with_config(config)?;

    let manifest = std::fs::read_to_string(manifest_path)?;
    let error_log = std::fs::read_to_string(log_path)?;

    let (healed, action) = engine.diagnose_and_heal(&error_log, &manifest, status_label)?;

    println!("{}", "=".repeat(60));
    println!("Remediation: {} ({})", action.category, action.risk_level);
    println!("{}", "=".repeat(60));
    println!("{}", serde_json::to_string_pretty(&action)?);
    println!();
    println!("# Healed manifest");
    print!("{}", healed);
    if !healed.ends_with('\n') {
        println!();
    }
    Ok(())
}
