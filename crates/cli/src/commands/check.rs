//! `discovery check`: diagnose configuration before serving.

use discovery_agent::PromptAssembler;
use discovery_config::AppConfig;
use std::path::Path;

#[derive(Debug, Default)]
pub struct CheckReport {
    pub passed: Vec<String>,
    pub warnings: Vec<String>,
    pub problems: Vec<String>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Run every startup check that does not need the network.
pub fn inspect(config: &AppConfig) -> CheckReport {
    let mut report = CheckReport::default();

    match PromptAssembler::from_config(&config.prompt) {
        Ok(assembler) => report.passed.push(format!(
            "System template {} renders ({} chars)",
            config.prompt.template_path.display(),
            assembler.system_text().len()
        )),
        Err(e) => report.problems.push(e.to_string()),
    }

    if discovery_providers::build_from_config(config).default().is_some() {
        report
            .passed
            .push(format!("Provider '{}' registered", config.default_provider));
    } else {
        report
            .problems
            .push(format!("No provider registered for '{}'", config.default_provider));
    }

    if !config.has_api_key() {
        report
            .warnings
            .push("No API key set (set DISCOVERY_API_KEY or OPENAI_API_KEY)".into());
    }

    if config.email.relay_url.is_none() {
        report
            .warnings
            .push("No [email].relay_url; notifications stay in the in-process outbox".into());
    }

    report
}

pub fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Checking {}", config_path.display());

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("   ok    Config parsed and validated");
            config
        }
        Err(e) => {
            println!("   FAIL  {e}");
            return Err(e);
        }
    };

    let report = inspect(&config);
    for line in &report.passed {
        println!("   ok    {line}");
    }
    for line in &report.warnings {
        println!("   warn  {line}");
    }
    for line in &report.problems {
        println!("   FAIL  {line}");
    }

    if report.is_ok() {
        println!("\nAll checks passed");
        Ok(())
    } else {
        Err(format!("{} problem(s) found", report.problems.len()).into())
    }
}
