//! Suite Parser
//!
//! Handles loading and validating workload suite definitions from YAML
//! files. Validation catches configuration mistakes (duplicate or empty
//! unit names, missing commands) before anything is launched.

use std::collections::HashSet;
use std::error::Error;
use std::fs;

use log::{debug, info};

use super::model::Suite;

/// Loads a suite from a YAML file.
///
/// This function:
/// 1. Reads and parses the YAML file
/// 2. Validates unit names and commands
///
/// # Arguments
///
/// * `path` - Path to the suite YAML file
///
/// # Returns
///
/// * `Ok(Suite)` - Successfully loaded and validated suite
/// * `Err` - Parse or validation error
///
/// # Example
///
/// ```rust,no_run
/// use carbonrun::suite::load_suite;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let suite = load_suite("suite.yaml")?;
///     println!("Loaded {} units", suite.len());
///     Ok(())
/// }
/// ```
pub fn load_suite(path: &str) -> Result<Suite, Box<dyn Error>> {
    info!("Loading suite from: {}", path);

    let yaml_content = fs::read_to_string(path).map_err(|e| {
        format!(
            "Failed to read suite file '{}': {}. Check that the file exists and is readable.",
            path, e
        )
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    let suite: Suite = serde_yaml::from_str(&yaml_content)
        .map_err(|e| format!("Failed to parse suite YAML: {}. Check the file format.", e))?;

    validate_suite(&suite)?;

    info!(
        "Parsed suite '{}': {} units",
        suite.project,
        suite.units.len()
    );

    Ok(suite)
}

/// Validates a suite's structure.
///
/// An empty run list is valid (the session still starts and stops);
/// individual units must carry a non-empty unique name and a command.
pub fn validate_suite(suite: &Suite) -> Result<(), String> {
    let mut seen: HashSet<&str> = HashSet::new();

    for unit in &suite.units {
        if unit.name.is_empty() {
            return Err("Suite contains a unit with an empty name".to_string());
        }

        if unit.command.is_empty() {
            return Err(format!("Unit '{}' has an empty command", unit.name));
        }

        if !seen.insert(unit.name.as_str()) {
            return Err(format!("Duplicate unit name: '{}'", unit.name));
        }
    }

    Ok(())
}
